//! Length-prefix framing for byte-stream carriers (TCP, pipes, serial links).
//!
//! Every packet travels as a 4-byte big-endian length followed by the packet bytes.

use alloc::vec::Vec;

use crate::{Error, Result, Writer};

pub const FRAME_HEADER_LEN: usize = 4;

/// Write `packet` with its length prefix.
pub fn encode_frame(packet: &[u8], out: &mut Writer<'_>) -> Result<()> {
    let needed = FRAME_HEADER_LEN + packet.len();
    if needed > out.remaining() {
        return Err(Error::BufferOverflow {
            needed,
            available: out.remaining(),
        });
    }
    let len = u32::try_from(packet.len()).map_err(|_| Error::FrameTooLarge {
        len: packet.len(),
        max: u32::MAX as usize,
    })?;
    out.put_u32(len)?;
    out.put_bytes(packet)
}

/// Incremental decoder for a framed byte stream.
///
/// Feed arbitrary chunks with [`push`](Self::push) and pull complete packets with
/// [`next_frame`](Self::next_frame).
#[derive(Debug)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    start: usize,
    max_len: usize,
}

impl FrameDecoder {
    pub fn new(max_len: usize) -> Self {
        Self {
            buf: Vec::new(),
            start: 0,
            max_len,
        }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        if self.start > 0 {
            self.buf.drain(..self.start);
            self.start = 0;
        }
        self.buf.extend_from_slice(bytes);
    }

    /// The next complete frame, or `None` until more bytes arrive.
    ///
    /// A length above the configured maximum discards everything buffered: the stream
    /// cannot be resynchronised after a bad prefix.
    pub fn next_frame(&mut self) -> Result<Option<&[u8]>> {
        let pending = &self.buf[self.start..];
        if pending.len() < FRAME_HEADER_LEN {
            return Ok(None);
        }
        let available = pending.len();
        let len = u32::from_be_bytes([pending[0], pending[1], pending[2], pending[3]]) as usize;
        if len > self.max_len {
            self.clear();
            return Err(Error::FrameTooLarge {
                len,
                max: self.max_len,
            });
        }
        if available < FRAME_HEADER_LEN + len {
            return Ok(None);
        }
        let begin = self.start + FRAME_HEADER_LEN;
        self.start = begin + len;
        Ok(Some(&self.buf[begin..begin + len]))
    }

    /// Bytes received but not yet returned as frames.
    pub fn buffered(&self) -> usize {
        self.buf.len() - self.start
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.start = 0;
    }
}
