//! Top-level packet dispatch on the leading byte.

use crate::{BundleRef, Error, MessageRef, NtpTime, Result};

/// A validated OSC packet.
#[derive(Clone, Copy, Debug)]
pub enum Packet<'a> {
    Message(MessageRef<'a>),
    Bundle(BundleRef<'a>),
}

impl<'a> Packet<'a> {
    /// `/` starts a message, `#` a bundle; anything else is rejected.
    pub fn parse(buf: &'a [u8]) -> Result<Self> {
        match buf.first() {
            Some(b'/') => MessageRef::parse(buf).map(Packet::Message),
            Some(b'#') => BundleRef::parse(buf).map(Packet::Bundle),
            Some(&other) => Err(Error::UnknownPacket(other)),
            None => Err(Error::Empty),
        }
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        match self {
            Packet::Message(m) => m.as_bytes(),
            Packet::Bundle(b) => b.as_bytes(),
        }
    }

    /// The bundle time tag, or the immediate tag for a bare message.
    pub fn time(&self) -> NtpTime {
        match self {
            Packet::Message(_) => NtpTime::IMMEDIATE,
            Packet::Bundle(b) => b.time(),
        }
    }

    pub fn is_bundle(&self) -> bool {
        matches!(self, Packet::Bundle(_))
    }
}
