//! Bundle flattening.
//!
//! [`unroll`] walks a packet and hands every message to an [`UnrollHandler`] together
//! with the frame time derived from its innermost enclosing bundle's time tag.

use crate::{BundleRef, NtpTime, Packet, Result};

/// How far [`unroll`] descends into bundles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum UnrollMode {
    /// Hand the whole bundle to [`UnrollHandler::bundle`] without descending.
    None,
    /// Currently identical to [`UnrollMode::Full`].
    Partial,
    /// Descend into every nested bundle.
    #[default]
    Full,
}

/// Receives the items produced by [`unroll`].
pub trait UnrollHandler {
    /// Convert a time tag into an absolute frame time. Called once per bundle, and
    /// with [`NtpTime::IMMEDIATE`] for a bare message.
    fn timestamp(&mut self, time: NtpTime) -> u64;

    fn message(&mut self, time: u64, bytes: &[u8]);

    /// Only called in [`UnrollMode::None`].
    fn bundle(&mut self, time: u64, bytes: &[u8]) {
        let _ = (time, bytes);
    }
}

/// Validate `buf` and emit its items.
///
/// A malformed packet returns the validation error before any callback runs.
pub fn unroll<H: UnrollHandler + ?Sized>(buf: &[u8], mode: UnrollMode, handler: &mut H) -> Result<()> {
    match Packet::parse(buf)? {
        Packet::Message(msg) => {
            let time = handler.timestamp(NtpTime::IMMEDIATE);
            handler.message(time, msg.as_bytes());
        }
        Packet::Bundle(bundle) => match mode {
            UnrollMode::None => {
                let time = handler.timestamp(bundle.time());
                handler.bundle(time, bundle.as_bytes());
            }
            UnrollMode::Partial | UnrollMode::Full => walk(&bundle, handler)?,
        },
    }
    Ok(())
}

fn walk<H: UnrollHandler + ?Sized>(bundle: &BundleRef<'_>, handler: &mut H) -> Result<()> {
    let time = handler.timestamp(bundle.time());
    for element in bundle.elements() {
        if element.first() == Some(&b'#') {
            walk(&BundleRef::header(element)?, handler)?;
        } else {
            handler.message(time, element);
        }
    }
    Ok(())
}
