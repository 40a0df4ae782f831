//! Binary event log.
//!
//! Layout: the 8-byte magic `tjostosc`, a big-endian `u32` sample rate, then records
//! of `{delta: u32 BE, size: u32 BE, message}` where `delta` is the frame distance
//! from the previous record (from frame 0 for the first one) and `message` is a
//! validated OSC message.

use crate::{Error, Result};
use std::io::{self, Read, Write};
use tjost_osc::MessageRef;

pub const LOG_MAGIC: &[u8; 8] = b"tjostosc";

/// Largest record a reader accepts unless told otherwise.
pub const DEFAULT_MAX_RECORD: usize = 64 * 1024;

/// One logged message at an absolute frame time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub time: u64,
    pub message: Vec<u8>,
}

impl LogRecord {
    pub fn parse(&self) -> Result<MessageRef<'_>> {
        MessageRef::parse(&self.message).map_err(Error::MalformedRecord)
    }
}

pub struct LogWriter<W: Write> {
    inner: W,
    previous: u64,
    records: u64,
}

impl<W: Write> LogWriter<W> {
    /// Write the file header.
    pub fn create(mut inner: W, sample_rate: u32) -> Result<Self> {
        inner.write_all(LOG_MAGIC)?;
        inner.write_all(&sample_rate.to_be_bytes())?;
        Ok(Self {
            inner,
            previous: 0,
            records: 0,
        })
    }

    /// Append `message` at absolute frame `time`.
    ///
    /// Times must not decrease and successive records must lie within `u32::MAX`
    /// frames of each other.
    pub fn write(&mut self, time: u64, message: &[u8]) -> Result<()> {
        MessageRef::parse(message).map_err(Error::MalformedRecord)?;
        let delta = time
            .checked_sub(self.previous)
            .and_then(|d| u32::try_from(d).ok())
            .ok_or(Error::RecordTime {
                time,
                previous: self.previous,
            })?;
        let size = u32::try_from(message.len()).map_err(|_| Error::RecordTooLarge(message.len()))?;

        let mut header = [0u8; 8];
        header[..4].copy_from_slice(&delta.to_be_bytes());
        header[4..].copy_from_slice(&size.to_be_bytes());
        self.inner.write_all(&header)?;
        self.inner.write_all(message)?;
        self.previous = time;
        self.records += 1;
        Ok(())
    }

    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn into_inner(mut self) -> Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

pub struct LogReader<R: Read> {
    inner: R,
    sample_rate: u32,
    time: u64,
    max_record: usize,
    failed: bool,
}

impl<R: Read> LogReader<R> {
    /// Read and check the file header.
    pub fn open(mut inner: R) -> Result<Self> {
        let mut header = [0u8; 12];
        inner.read_exact(&mut header).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => Error::BadMagic,
            _ => Error::Io(e),
        })?;
        if &header[..8] != LOG_MAGIC {
            return Err(Error::BadMagic);
        }
        let sample_rate = u32::from_be_bytes([header[8], header[9], header[10], header[11]]);
        Ok(Self {
            inner,
            sample_rate,
            time: 0,
            max_record: DEFAULT_MAX_RECORD,
            failed: false,
        })
    }

    pub fn with_max_record(mut self, max_record: usize) -> Self {
        self.max_record = max_record;
        self
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Next record, or `None` at a clean end of file.
    ///
    /// A malformed message is consumed and reported as [`Error::MalformedRecord`], so
    /// the caller may skip it and continue.
    pub fn read_record(&mut self) -> Result<Option<LogRecord>> {
        let mut header = [0u8; 8];
        if !self.fill_or_eof(&mut header)? {
            return Ok(None);
        }
        let delta = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
        let size = u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;
        if size > self.max_record {
            return Err(Error::RecordTooLarge(size));
        }

        let mut message = vec![0u8; size];
        self.inner.read_exact(&mut message)?;
        self.time += u64::from(delta);

        MessageRef::parse(&message).map_err(Error::MalformedRecord)?;
        Ok(Some(LogRecord {
            time: self.time,
            message,
        }))
    }

    /// Fill `buf` completely. `Ok(false)` if the stream ended before the first byte.
    fn fill_or_eof(&mut self, buf: &mut [u8]) -> Result<bool> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) if filled == 0 => return Ok(false),
                Ok(0) => return Err(Error::Io(io::ErrorKind::UnexpectedEof.into())),
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(true)
    }
}

impl<R: Read> Iterator for LogReader<R> {
    type Item = Result<LogRecord>;

    /// Stops after an I/O or framing error; malformed messages are yielded and
    /// skipped.
    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.read_record() {
            Ok(record) => record.map(Ok),
            Err(e) => {
                if !matches!(e, Error::MalformedRecord(_)) {
                    self.failed = true;
                }
                Some(Err(e))
            }
        }
    }
}
