//! Structural validation of untrusted buffers.
//!
//! Nothing reads a packet received from outside the process before it passes one of
//! these checks. The `validate_*` functions name the failure for diagnostics; the
//! `check_*` forms only answer yes or no.

use crate::{BundleRef, MessageRef, Packet, Result, TypeTag};

/// Deepest bundle nesting accepted from untrusted input.
pub const MAX_BUNDLE_DEPTH: usize = 16;

/// `/` followed by printable ASCII, excluding space and `#`.
pub fn is_valid_path(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.first() == Some(&b'/') && bytes.iter().all(|&b| (0x21..=0x7E).contains(&b) && b != b'#')
}

/// Printable text without space or `#`, as required of `s` and `S` arguments.
/// Non-ASCII characters are allowed as long as they are not control characters.
pub fn is_valid_string(s: &str) -> bool {
    s.chars().all(|c| !c.is_control() && c != ' ' && c != '#')
}

/// Every character is a known type tag. With `has_leading_comma` the string must
/// start with `,`, which is then skipped.
pub fn is_valid_format(format: &str, has_leading_comma: bool) -> bool {
    let tags = if has_leading_comma {
        match format.strip_prefix(',') {
            Some(tags) => tags,
            None => return false,
        }
    } else {
        format
    };
    tags.bytes().all(|b| TypeTag::from_byte(b).is_some())
}

pub fn validate_message(buf: &[u8]) -> Result<()> {
    MessageRef::parse(buf).map(drop)
}

pub fn validate_bundle(buf: &[u8]) -> Result<()> {
    BundleRef::parse(buf).map(drop)
}

pub fn validate_packet(buf: &[u8]) -> Result<()> {
    Packet::parse(buf).map(drop)
}

/// Path, format and every declared argument decode, and together they consume
/// `buf` exactly.
pub fn check_message(buf: &[u8]) -> bool {
    validate_message(buf).is_ok()
}

/// Header, then elements whose lengths exactly consume `buf`, each recursively valid.
pub fn check_bundle(buf: &[u8]) -> bool {
    validate_bundle(buf).is_ok()
}

pub fn check_packet(buf: &[u8]) -> bool {
    validate_packet(buf).is_ok()
}
