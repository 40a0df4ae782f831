//! Single-producer/single-consumer byte pipe between threads.
//!
//! Records are a 16-byte native-endian header `{dest: u32, size: u32, time: u64}`
//! followed by `size` payload bytes. The producer never blocks: a record that does
//! not fit is refused whole. The consumer only takes a record once its header and
//! its entire payload are visible, so a half-published record is never read.

use crate::{Destination, Error, PipeSignal, Result};
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

pub const PIPE_HEADER_LEN: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct RecordHeader {
    destination: Destination,
    size: usize,
    time: u64,
}

impl RecordHeader {
    fn encode(&self) -> [u8; PIPE_HEADER_LEN] {
        let mut out = [0u8; PIPE_HEADER_LEN];
        out[..4].copy_from_slice(&self.destination.to_raw().to_ne_bytes());
        out[4..8].copy_from_slice(&(self.size as u32).to_ne_bytes());
        out[8..].copy_from_slice(&self.time.to_ne_bytes());
        out
    }

    fn decode(bytes: &[u8; PIPE_HEADER_LEN]) -> Self {
        let word = |at: usize| u32::from_ne_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        let mut time = [0u8; 8];
        time.copy_from_slice(&bytes[8..]);
        Self {
            destination: Destination::from_raw(word(0)),
            size: word(4) as usize,
            time: u64::from_ne_bytes(time),
        }
    }
}

/// Create a pipe of `capacity` bytes. `signal` is raised by [`PipeProducer::flush`].
pub fn pipe(capacity: usize, signal: Arc<PipeSignal>) -> (PipeProducer, PipeConsumer) {
    let (producer, consumer) = HeapRb::<u8>::new(capacity.max(PIPE_HEADER_LEN)).split();
    (
        PipeProducer {
            producer,
            signal: Arc::clone(&signal),
            max_payload: u32::MAX as usize,
            overflows: 0,
        },
        PipeConsumer {
            consumer,
            signal,
            dropped: 0,
        },
    )
}

/// Writing end.
pub struct PipeProducer {
    producer: HeapProd<u8>,
    signal: Arc<PipeSignal>,
    max_payload: usize,
    overflows: u64,
}

impl PipeProducer {
    /// Refuse payloads larger than `max_payload` with [`Error::PayloadTooLarge`].
    pub fn with_max_payload(mut self, max_payload: usize) -> Self {
        self.max_payload = max_payload.min(u32::MAX as usize);
        self
    }

    /// Append one record. Fails without writing anything when the pipe lacks room.
    pub fn produce(&mut self, destination: Destination, time: u64, payload: &[u8]) -> Result<()> {
        if payload.len() > self.max_payload {
            return Err(Error::PayloadTooLarge {
                size: payload.len(),
                max: self.max_payload,
            });
        }
        let needed = PIPE_HEADER_LEN + payload.len();
        let available = self.producer.vacant_len();
        if needed > available {
            self.overflows += 1;
            return Err(Error::PipeOverflow { needed, available });
        }
        let header = RecordHeader {
            destination,
            size: payload.len(),
            time,
        };
        self.producer.push_slice(&header.encode());
        self.producer.push_slice(payload);
        Ok(())
    }

    /// Wake the consumer. Returns `true` if this flush sent the wakeup.
    #[inline]
    pub fn flush(&self) -> bool {
        self.signal.notify()
    }

    #[inline]
    pub fn free_space(&self) -> usize {
        self.producer.vacant_len()
    }

    /// Records refused for lack of space.
    #[inline]
    pub fn overflow_count(&self) -> u64 {
        self.overflows
    }
}

/// Reading end.
pub struct PipeConsumer {
    consumer: HeapCons<u8>,
    signal: Arc<PipeSignal>,
    dropped: u64,
}

impl PipeConsumer {
    fn peek_header(&self) -> Option<RecordHeader> {
        let (first, second) = self.consumer.as_slices();
        if first.len() + second.len() < PIPE_HEADER_LEN {
            return None;
        }
        let mut bytes = [0u8; PIPE_HEADER_LEN];
        let head = first.len().min(PIPE_HEADER_LEN);
        bytes[..head].copy_from_slice(&first[..head]);
        bytes[head..].copy_from_slice(&second[..PIPE_HEADER_LEN - head]);
        Some(RecordHeader::decode(&bytes))
    }

    /// Move complete records out of the pipe.
    ///
    /// For each record, `alloc(dest, time, size)` supplies a buffer of at least `size`
    /// bytes, or `None` to stop and leave the record in place. A buffer shorter than
    /// `size` is a failed allocation that consumed the record: the record is dropped
    /// and counted in [`dropped_count`](Self::dropped_count). The filled buffer goes
    /// to `sched`, which may break to stop after it. Returns the number of records
    /// handed to `sched`.
    pub fn consume<B, A, S>(&mut self, mut alloc: A, mut sched: S) -> usize
    where
        B: AsMut<[u8]>,
        A: FnMut(Destination, u64, usize) -> Option<B>,
        S: FnMut(Destination, u64, B) -> ControlFlow<()>,
    {
        self.signal.acknowledge();
        let mut count = 0;
        while let Some(header) = self.peek_header() {
            if self.consumer.occupied_len() < PIPE_HEADER_LEN + header.size {
                break;
            }
            let Some(mut buffer) = alloc(header.destination, header.time, header.size) else {
                break;
            };
            let target = buffer.as_mut();
            if target.len() < header.size {
                self.consumer.skip(PIPE_HEADER_LEN + header.size);
                self.dropped += 1;
                continue;
            }
            self.consumer.skip(PIPE_HEADER_LEN);
            self.consumer.pop_slice(&mut target[..header.size]);

            count += 1;
            if sched(header.destination, header.time, buffer).is_break() {
                break;
            }
        }
        count
    }

    /// Take one record into a fresh `Vec`. Allocates; meant for non-real-time readers.
    pub fn pop_record(&mut self) -> Option<(Destination, u64, Vec<u8>)> {
        let mut record = None;
        self.consume(
            |_, _, size| Some(vec![0u8; size]),
            |destination, time, payload| {
                record = Some((destination, time, payload));
                ControlFlow::Break(())
            },
        );
        record
    }

    /// Block until the producer flushes or `timeout` elapses.
    pub fn wait(&self, timeout: Duration) -> bool {
        self.signal.wait_timeout(timeout)
    }

    #[inline]
    pub fn pending_bytes(&self) -> usize {
        self.consumer.occupied_len()
    }

    /// Records dropped because `alloc` handed back a buffer too short for them.
    #[inline]
    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }
}
