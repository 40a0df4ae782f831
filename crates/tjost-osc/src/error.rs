//! Error types for tjost-osc.

use thiserror::Error;

/// Error type for OSC encoding, decoding and validation.
///
/// Every variant is `Copy` so it can travel through the real-time diagnostics
/// channel without allocation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("Buffer overflow: need {needed} bytes, {available} available")]
    BufferOverflow { needed: usize, available: usize },

    #[error("Truncated packet: need {needed} bytes, {available} remaining")]
    Truncated { needed: usize, available: usize },

    #[error("Empty packet")]
    Empty,

    #[error("Invalid OSC path")]
    InvalidPath,

    #[error("Invalid format string")]
    InvalidFormat,

    #[error("Unknown type tag {0:?}")]
    UnknownTag(char),

    #[error("Invalid string argument")]
    InvalidString,

    #[error("Negative blob size: {0}")]
    NegativeBlobSize(i32),

    #[error("{0} trailing bytes after last argument")]
    TrailingBytes(usize),

    #[error("Argument {index} does not match format tag '{expected}'")]
    FormatMismatch { index: usize, expected: char },

    #[error("Format declares {expected} arguments, {found} given")]
    ArgumentCount { expected: usize, found: usize },

    #[error("Invalid bundle header")]
    InvalidBundleHeader,

    #[error("Invalid bundle element length: {0}")]
    InvalidElementLength(i32),

    #[error("Bundle nesting deeper than {0} levels")]
    TooDeep(usize),

    #[error("Unrecognized packet start byte {0:#04x}")]
    UnknownPacket(u8),

    #[error("Frame length {len} exceeds maximum {max}")]
    FrameTooLarge { len: usize, max: usize },
}

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;
