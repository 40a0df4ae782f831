//! Bounds-checked byte cursors for the OSC wire format.
//!
//! [`Writer`] and [`Reader`] never touch memory outside the slice they wrap: every
//! encode refuses with [`Error::BufferOverflow`] and every decode with
//! [`Error::Truncated`] before a single byte is moved. Scalars are big-endian,
//! strings and blobs are zero-padded to a 4-byte boundary.

use crate::{Argument, Error, MidiFrame, NtpTime, Result, TypeTag, BUNDLE_TAG};
use crate::validate::is_valid_string;

/// Encoded size of a string of `len` bytes: the bytes, a NUL, then zero padding up to
/// the next multiple of four.
#[inline]
pub const fn padded_len(len: usize) -> usize {
    (len + 4) & !3
}

/// Encoded size of a blob with `size` payload bytes, including its length prefix.
#[inline]
pub const fn blob_len(size: usize) -> usize {
    4 + ((size + 3) & !3)
}

/// Position of a bundle element length prefix awaiting its back-patch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ElementMark {
    offset: usize,
}

/// Encoding cursor over a caller-supplied buffer.
pub struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Writer<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes written so far.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn written(&self) -> &[u8] {
        &self.buf[..self.pos]
    }

    /// Move the cursor back to `pos`, discarding everything written after it.
    /// Positions ahead of the cursor are ignored.
    pub fn truncate(&mut self, pos: usize) {
        if pos < self.pos {
            self.pos = pos;
        }
    }

    /// Claim `len` bytes at the cursor.
    pub(crate) fn reserve(&mut self, len: usize) -> Result<&mut [u8]> {
        let available = self.remaining();
        if len > available {
            return Err(Error::BufferOverflow {
                needed: len,
                available,
            });
        }
        let start = self.pos;
        self.pos += len;
        Ok(&mut self.buf[start..start + len])
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.reserve(bytes.len())?.copy_from_slice(bytes);
        Ok(())
    }

    #[inline]
    pub fn put_u32(&mut self, v: u32) -> Result<()> {
        self.put_bytes(&v.to_be_bytes())
    }

    #[inline]
    pub fn put_i32(&mut self, v: i32) -> Result<()> {
        self.put_bytes(&v.to_be_bytes())
    }

    /// Writes the raw IEEE-754 bits; NaN payloads and infinities are preserved.
    #[inline]
    pub fn put_f32(&mut self, v: f32) -> Result<()> {
        self.put_u32(v.to_bits())
    }

    #[inline]
    pub fn put_u64(&mut self, v: u64) -> Result<()> {
        self.put_bytes(&v.to_be_bytes())
    }

    #[inline]
    pub fn put_i64(&mut self, v: i64) -> Result<()> {
        self.put_bytes(&v.to_be_bytes())
    }

    #[inline]
    pub fn put_f64(&mut self, v: f64) -> Result<()> {
        self.put_u64(v.to_bits())
    }

    #[inline]
    pub fn put_time(&mut self, time: NtpTime) -> Result<()> {
        self.put_u64(time.to_bits())
    }

    /// MIDI frames are copied as-is, no byte swap.
    #[inline]
    pub fn put_midi(&mut self, frame: MidiFrame) -> Result<()> {
        self.put_bytes(&frame.to_bytes())
    }

    #[inline]
    pub fn put_char(&mut self, c: u8) -> Result<()> {
        self.put_u32(u32::from(c))
    }

    /// NUL-terminated, zero-padded string. Embedded NULs are rejected since they would
    /// not survive a decode.
    pub fn put_str(&mut self, s: &str) -> Result<()> {
        let bytes = s.as_bytes();
        if bytes.contains(&0) {
            return Err(Error::InvalidString);
        }
        let slot = self.reserve(padded_len(bytes.len()))?;
        slot[..bytes.len()].copy_from_slice(bytes);
        slot[bytes.len()..].fill(0);
        Ok(())
    }

    /// A string argument: [`put_str`](Self::put_str) restricted to
    /// [`is_valid_string`] text.
    fn put_text(&mut self, s: &str) -> Result<()> {
        if !is_valid_string(s) {
            return Err(Error::InvalidString);
        }
        self.put_str(s)
    }

    pub fn put_blob(&mut self, data: &[u8]) -> Result<()> {
        let size = i32::try_from(data.len()).map_err(|_| Error::BufferOverflow {
            needed: blob_len(data.len()),
            available: self.remaining(),
        })?;
        let slot = self.reserve(blob_len(data.len()))?;
        slot[..4].copy_from_slice(&size.to_be_bytes());
        slot[4..4 + data.len()].copy_from_slice(data);
        slot[4 + data.len()..].fill(0);
        Ok(())
    }

    /// Writes the value of `arg`; its tag goes into the format string separately.
    pub fn put_argument(&mut self, arg: &Argument<'_>) -> Result<()> {
        match *arg {
            Argument::Int(v) => self.put_i32(v),
            Argument::Float(v) => self.put_f32(v),
            Argument::String(s) | Argument::Symbol(s) => self.put_text(s),
            Argument::Blob(b) => self.put_blob(b),
            Argument::True | Argument::False | Argument::Nil | Argument::Bang => Ok(()),
            Argument::Long(v) => self.put_i64(v),
            Argument::Double(v) => self.put_f64(v),
            Argument::Time(t) => self.put_time(t),
            Argument::Char(c) => self.put_char(c),
            Argument::Midi(m) => self.put_midi(m),
        }
    }

    /// `#bundle\0` followed by the time tag.
    pub fn put_bundle_header(&mut self, time: NtpTime) -> Result<()> {
        let slot = self.reserve(BUNDLE_TAG.len() + 8)?;
        slot[..8].copy_from_slice(BUNDLE_TAG);
        slot[8..].copy_from_slice(&time.to_bits().to_be_bytes());
        Ok(())
    }

    /// Reserve a bundle element length prefix, patched by [`Writer::end_element`].
    pub fn begin_element(&mut self) -> Result<ElementMark> {
        let offset = self.pos;
        self.reserve(4)?.fill(0);
        Ok(ElementMark { offset })
    }

    pub fn end_element(&mut self, mark: ElementMark) -> Result<()> {
        let len = self.pos - mark.offset - 4;
        let len = i32::try_from(len).map_err(|_| Error::InvalidElementLength(i32::MAX))?;
        self.buf[mark.offset..mark.offset + 4].copy_from_slice(&len.to_be_bytes());
        Ok(())
    }
}

/// Decoding cursor over a borrowed packet.
#[derive(Clone, Debug)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Unread bytes.
    pub fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    pub fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let available = self.remaining();
        if len > available {
            return Err(Error::Truncated {
                needed: len,
                available,
            });
        }
        let start = self.pos;
        self.pos += len;
        Ok(&self.buf[start..start + len])
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    #[inline]
    pub fn get_u32(&mut self) -> Result<u32> {
        self.take_array().map(u32::from_be_bytes)
    }

    #[inline]
    pub fn get_i32(&mut self) -> Result<i32> {
        self.take_array().map(i32::from_be_bytes)
    }

    #[inline]
    pub fn get_f32(&mut self) -> Result<f32> {
        self.get_u32().map(f32::from_bits)
    }

    #[inline]
    pub fn get_u64(&mut self) -> Result<u64> {
        self.take_array().map(u64::from_be_bytes)
    }

    #[inline]
    pub fn get_i64(&mut self) -> Result<i64> {
        self.take_array().map(i64::from_be_bytes)
    }

    #[inline]
    pub fn get_f64(&mut self) -> Result<f64> {
        self.get_u64().map(f64::from_bits)
    }

    #[inline]
    pub fn get_time(&mut self) -> Result<NtpTime> {
        self.get_u64().map(NtpTime::from_bits)
    }

    #[inline]
    pub fn get_midi(&mut self) -> Result<MidiFrame> {
        self.take_array().map(MidiFrame::from_bytes)
    }

    #[inline]
    pub fn get_char(&mut self) -> Result<u8> {
        self.get_u32().map(|v| v as u8)
    }

    /// A NUL-terminated string; the terminator must lie inside the buffer and the
    /// padded length must fit in what remains.
    pub fn get_str(&mut self) -> Result<&'a str> {
        let rest = self.rest();
        let nul = rest.iter().position(|&b| b == 0).ok_or(Error::Truncated {
            needed: rest.len() + 1,
            available: rest.len(),
        })?;
        let bytes = self.take(padded_len(nul))?;
        core::str::from_utf8(&bytes[..nul]).map_err(|_| Error::InvalidString)
    }

    fn get_text(&mut self) -> Result<&'a str> {
        let s = self.get_str()?;
        if is_valid_string(s) {
            Ok(s)
        } else {
            Err(Error::InvalidString)
        }
    }

    pub fn get_blob(&mut self) -> Result<&'a [u8]> {
        let size = self.get_i32()?;
        if size < 0 {
            return Err(Error::NegativeBlobSize(size));
        }
        let size = size as usize;
        let padded = self.take(blob_len(size) - 4)?;
        Ok(&padded[..size])
    }

    pub fn get_argument(&mut self, tag: TypeTag) -> Result<Argument<'a>> {
        Ok(match tag {
            TypeTag::Int => Argument::Int(self.get_i32()?),
            TypeTag::Float => Argument::Float(self.get_f32()?),
            TypeTag::String => Argument::String(self.get_text()?),
            TypeTag::Blob => Argument::Blob(self.get_blob()?),
            TypeTag::True => Argument::True,
            TypeTag::False => Argument::False,
            TypeTag::Nil => Argument::Nil,
            TypeTag::Bang => Argument::Bang,
            TypeTag::Long => Argument::Long(self.get_i64()?),
            TypeTag::Double => Argument::Double(self.get_f64()?),
            TypeTag::Time => Argument::Time(self.get_time()?),
            TypeTag::Symbol => Argument::Symbol(self.get_text()?),
            TypeTag::Char => Argument::Char(self.get_char()?),
            TypeTag::Midi => Argument::Midi(self.get_midi()?),
        })
    }
}
