//! OSC bundles: nested encoding and the parsed [`BundleRef`] view.

use crate::message::write_message;
use crate::{
    Argument, ElementMark, Error, MessageRef, NtpTime, Reader, Result, Writer, MAX_BUNDLE_DEPTH,
};

/// Every bundle starts with these eight bytes.
pub const BUNDLE_TAG: &[u8; 8] = b"#bundle\0";

const HEADER_LEN: usize = 16;

/// Zero-copy view over a structurally valid bundle.
#[derive(Clone, Copy, Debug)]
pub struct BundleRef<'a> {
    bytes: &'a [u8],
    time: NtpTime,
}

impl<'a> BundleRef<'a> {
    /// Parse and recursively validate `buf`.
    pub fn parse(buf: &'a [u8]) -> Result<Self> {
        Self::parse_at_depth(buf, 1)
    }

    pub(crate) fn parse_at_depth(buf: &'a [u8], depth: usize) -> Result<Self> {
        if depth > MAX_BUNDLE_DEPTH {
            return Err(Error::TooDeep(MAX_BUNDLE_DEPTH));
        }
        let bundle = Self::header(buf)?;
        let mut r = Reader::new(&buf[HEADER_LEN..]);
        while !r.is_empty() {
            let element = next_element(&mut r)?;
            match element.first() {
                Some(b'/') => {
                    MessageRef::parse(element)?;
                }
                Some(b'#') => {
                    Self::parse_at_depth(element, depth + 1)?;
                }
                Some(&other) => return Err(Error::UnknownPacket(other)),
                None => return Err(Error::Empty),
            }
        }
        Ok(bundle)
    }

    /// Read only the header. Callers must have validated the elements already.
    pub(crate) fn header(buf: &'a [u8]) -> Result<Self> {
        if buf.len() < HEADER_LEN {
            if buf.len() >= BUNDLE_TAG.len() && buf[..8] != BUNDLE_TAG[..] {
                return Err(Error::InvalidBundleHeader);
            }
            return Err(Error::Truncated {
                needed: HEADER_LEN,
                available: buf.len(),
            });
        }
        let mut r = Reader::new(buf);
        if r.take(8)? != BUNDLE_TAG {
            return Err(Error::InvalidBundleHeader);
        }
        let time = r.get_time()?;
        Ok(Self { bytes: buf, time })
    }

    #[inline]
    pub fn time(&self) -> NtpTime {
        self.time
    }

    #[inline]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Raw bytes of each element, in order.
    pub fn elements(&self) -> Elements<'a> {
        Elements {
            reader: Reader::new(&self.bytes[HEADER_LEN..]),
        }
    }
}

fn next_element<'a>(r: &mut Reader<'a>) -> Result<&'a [u8]> {
    let len = r.get_i32()?;
    if len < 0 {
        return Err(Error::InvalidElementLength(len));
    }
    r.take(len as usize)
}

/// Iterator over the raw elements of a [`BundleRef`].
#[derive(Clone, Debug)]
pub struct Elements<'a> {
    reader: Reader<'a>,
}

impl<'a> Iterator for Elements<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        if self.reader.is_empty() {
            return None;
        }
        next_element(&mut self.reader).ok()
    }
}

/// Incremental encoder for (possibly nested) bundles.
///
/// Element length prefixes are reserved when an element opens and back-patched when it
/// closes, so nothing is copied twice.
///
/// ```
/// use tjost_osc::{bundle::BundleWriter, osc_args, BundleRef, NtpTime};
///
/// let mut buf = [0u8; 128];
/// let mut w = BundleWriter::new(&mut buf);
/// w.open(NtpTime::IMMEDIATE).unwrap();
/// w.message("/a", &osc_args![1i32]).unwrap();
/// w.open(NtpTime::new(10, 0)).unwrap();
/// w.message("/b", &[]).unwrap();
/// let len = w.finish().unwrap();
///
/// let bundle = BundleRef::parse(&buf[..len]).unwrap();
/// assert_eq!(bundle.elements().count(), 2);
/// ```
pub struct BundleWriter<'a> {
    writer: Writer<'a>,
    marks: [ElementMark; MAX_BUNDLE_DEPTH],
    depth: usize,
}

impl<'a> BundleWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self {
            writer: Writer::new(buf),
            marks: [ElementMark::default(); MAX_BUNDLE_DEPTH],
            depth: 0,
        }
    }

    /// Open a bundle. The first call opens the top-level bundle, later calls open a
    /// nested element inside the innermost open bundle.
    pub fn open(&mut self, time: NtpTime) -> Result<()> {
        if self.depth == MAX_BUNDLE_DEPTH {
            return Err(Error::TooDeep(MAX_BUNDLE_DEPTH));
        }
        if self.depth == 0 && self.writer.position() != 0 {
            // top-level bundle already closed
            return Err(Error::InvalidBundleHeader);
        }
        let start = self.writer.position();
        let opened = if self.depth > 0 {
            self.writer
                .begin_element()
                .map(|mark| self.marks[self.depth] = mark)
        } else {
            Ok(())
        }
        .and_then(|()| self.writer.put_bundle_header(time));
        self.rewind_on_err(start, opened)?;
        self.depth += 1;
        Ok(())
    }

    /// Append a message element to the innermost open bundle.
    pub fn message(&mut self, path: &str, args: &[Argument<'_>]) -> Result<()> {
        if self.depth == 0 {
            return Err(Error::InvalidBundleHeader);
        }
        let start = self.writer.position();
        let written = self.writer.begin_element().and_then(|mark| {
            write_message(&mut self.writer, path, args)?;
            self.writer.end_element(mark)
        });
        self.rewind_on_err(start, written)
    }

    /// Append an already encoded packet as an element.
    pub fn element(&mut self, packet: &[u8]) -> Result<()> {
        if self.depth == 0 {
            return Err(Error::InvalidBundleHeader);
        }
        let start = self.writer.position();
        let written = self.writer.begin_element().and_then(|mark| {
            self.writer.put_bytes(packet)?;
            self.writer.end_element(mark)
        });
        self.rewind_on_err(start, written)
    }

    /// Drop a partially written element so a failed append leaves the bundle as it was.
    fn rewind_on_err(&mut self, start: usize, result: Result<()>) -> Result<()> {
        if result.is_err() {
            self.writer.truncate(start);
        }
        result
    }

    /// Close the innermost open bundle.
    pub fn close(&mut self) -> Result<()> {
        if self.depth == 0 {
            return Err(Error::InvalidBundleHeader);
        }
        self.depth -= 1;
        if self.depth > 0 {
            self.writer.end_element(self.marks[self.depth])?;
        }
        Ok(())
    }

    /// Close every open bundle and return the encoded length.
    pub fn finish(mut self) -> Result<usize> {
        while self.depth > 0 {
            self.close()?;
        }
        Ok(self.writer.position())
    }
}
