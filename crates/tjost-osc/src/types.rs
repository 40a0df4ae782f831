//! OSC argument data model.

use crate::NtpTime;

/// One-letter OSC type tags understood by the codec.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeTag {
    Int = b'i',
    Float = b'f',
    String = b's',
    Blob = b'b',
    True = b'T',
    False = b'F',
    Nil = b'N',
    Bang = b'I',
    Long = b'h',
    Double = b'd',
    Time = b't',
    Symbol = b'S',
    Char = b'c',
    Midi = b'm',
}

impl TypeTag {
    pub const ALL: [TypeTag; 14] = [
        TypeTag::Int,
        TypeTag::Float,
        TypeTag::String,
        TypeTag::Blob,
        TypeTag::True,
        TypeTag::False,
        TypeTag::Nil,
        TypeTag::Bang,
        TypeTag::Long,
        TypeTag::Double,
        TypeTag::Time,
        TypeTag::Symbol,
        TypeTag::Char,
        TypeTag::Midi,
    ];

    #[inline]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            b'i' => TypeTag::Int,
            b'f' => TypeTag::Float,
            b's' => TypeTag::String,
            b'b' => TypeTag::Blob,
            b'T' => TypeTag::True,
            b'F' => TypeTag::False,
            b'N' => TypeTag::Nil,
            b'I' => TypeTag::Bang,
            b'h' => TypeTag::Long,
            b'd' => TypeTag::Double,
            b't' => TypeTag::Time,
            b'S' => TypeTag::Symbol,
            b'c' => TypeTag::Char,
            b'm' => TypeTag::Midi,
            _ => return None,
        })
    }

    #[inline]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    #[inline]
    pub const fn as_char(self) -> char {
        self as u8 as char
    }

    /// Encoded width for fixed-size tags, `None` for strings, symbols and blobs.
    #[inline]
    pub const fn fixed_width(self) -> Option<usize> {
        match self {
            TypeTag::True | TypeTag::False | TypeTag::Nil | TypeTag::Bang => Some(0),
            TypeTag::Int | TypeTag::Float | TypeTag::Char | TypeTag::Midi => Some(4),
            TypeTag::Long | TypeTag::Double | TypeTag::Time => Some(8),
            TypeTag::String | TypeTag::Symbol | TypeTag::Blob => None,
        }
    }
}

/// Raw 4-byte MIDI frame carried by the `m` tag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct MidiFrame {
    pub port: u8,
    pub status: u8,
    pub data1: u8,
    pub data2: u8,
}

impl MidiFrame {
    #[inline]
    pub const fn new(port: u8, status: u8, data1: u8, data2: u8) -> Self {
        Self {
            port,
            status,
            data1,
            data2,
        }
    }

    #[inline]
    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        Self::new(bytes[0], bytes[1], bytes[2], bytes[3])
    }

    #[inline]
    pub const fn to_bytes(self) -> [u8; 4] {
        [self.port, self.status, self.data1, self.data2]
    }

    #[inline]
    pub const fn channel(self) -> u8 {
        self.status & 0x0F
    }
}

/// A decoded OSC argument.
///
/// Strings, symbols and blobs borrow from the packet they were decoded from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Argument<'a> {
    Int(i32),
    Float(f32),
    String(&'a str),
    Blob(&'a [u8]),
    True,
    False,
    Nil,
    Bang,
    Long(i64),
    Double(f64),
    Time(NtpTime),
    Symbol(&'a str),
    Char(u8),
    Midi(MidiFrame),
}

impl Argument<'_> {
    #[inline]
    pub const fn tag(&self) -> TypeTag {
        match self {
            Argument::Int(_) => TypeTag::Int,
            Argument::Float(_) => TypeTag::Float,
            Argument::String(_) => TypeTag::String,
            Argument::Blob(_) => TypeTag::Blob,
            Argument::True => TypeTag::True,
            Argument::False => TypeTag::False,
            Argument::Nil => TypeTag::Nil,
            Argument::Bang => TypeTag::Bang,
            Argument::Long(_) => TypeTag::Long,
            Argument::Double(_) => TypeTag::Double,
            Argument::Time(_) => TypeTag::Time,
            Argument::Symbol(_) => TypeTag::Symbol,
            Argument::Char(_) => TypeTag::Char,
            Argument::Midi(_) => TypeTag::Midi,
        }
    }

    /// Number of bytes this argument occupies on the wire.
    #[inline]
    pub fn encoded_len(&self) -> usize {
        match self {
            Argument::String(s) | Argument::Symbol(s) => crate::padded_len(s.len()),
            Argument::Blob(b) => crate::blob_len(b.len()),
            other => other.tag().fixed_width().unwrap_or(0),
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match *self {
            Argument::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match *self {
            Argument::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Argument::String(s) | Argument::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Argument::True => Some(true),
            Argument::False => Some(false),
            _ => None,
        }
    }
}

impl From<i32> for Argument<'_> {
    fn from(v: i32) -> Self {
        Argument::Int(v)
    }
}

impl From<f32> for Argument<'_> {
    fn from(v: f32) -> Self {
        Argument::Float(v)
    }
}

impl<'a> From<&'a str> for Argument<'a> {
    fn from(v: &'a str) -> Self {
        Argument::String(v)
    }
}

impl<'a> From<&'a [u8]> for Argument<'a> {
    fn from(v: &'a [u8]) -> Self {
        Argument::Blob(v)
    }
}

impl From<bool> for Argument<'_> {
    fn from(v: bool) -> Self {
        if v {
            Argument::True
        } else {
            Argument::False
        }
    }
}

impl From<i64> for Argument<'_> {
    fn from(v: i64) -> Self {
        Argument::Long(v)
    }
}

impl From<f64> for Argument<'_> {
    fn from(v: f64) -> Self {
        Argument::Double(v)
    }
}

impl From<NtpTime> for Argument<'_> {
    fn from(v: NtpTime) -> Self {
        Argument::Time(v)
    }
}

impl From<MidiFrame> for Argument<'_> {
    fn from(v: MidiFrame) -> Self {
        Argument::Midi(v)
    }
}
