//! Preallocated payload buffers for the real-time thread.
//!
//! [`PayloadPool`] hands out [`PoolBuffer`]s from per-size-class free lists and takes
//! them back when events are consumed. Nothing on that path touches the allocator
//! once the pool is warm. When a class runs low the pool raises an edge-triggered
//! request; the [`PoolReplenisher`] on the housekeeping thread allocates a batch and
//! ships it back through a lock-free ring.

use crate::{Error, PipeSignal, Result, SchedulerConfig};
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Byte buffer owned by an event payload.
///
/// The backing storage has the size of its pool class; `len` is the payload length.
#[derive(Debug)]
pub struct PoolBuffer {
    data: Box<[u8]>,
    len: usize,
}

impl PoolBuffer {
    /// Heap-allocated buffer outside any pool, sized exactly to `bytes`.
    pub fn from_slice(bytes: &[u8]) -> Self {
        Self {
            data: bytes.into(),
            len: bytes.len(),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data[..self.len]
    }

    /// Shrink the payload after encoding into a larger reservation.
    pub fn truncate(&mut self, len: usize) {
        self.len = self.len.min(len);
    }
}

impl AsRef<[u8]> for PoolBuffer {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl AsMut<[u8]> for PoolBuffer {
    fn as_mut(&mut self) -> &mut [u8] {
        self.as_mut_slice()
    }
}

struct SizeClass {
    size: usize,
    free: Vec<Box<[u8]>>,
    refills: HeapCons<Box<[u8]>>,
    requested: Arc<AtomicBool>,
}

impl SizeClass {
    fn absorb_refills(&mut self) {
        while self.free.len() < self.free.capacity() {
            match self.refills.try_pop() {
                Some(data) => self.free.push(data),
                None => break,
            }
        }
    }
}

/// Real-time side of the payload pool.
pub struct PayloadPool {
    classes: Vec<SizeClass>,
    max_payload: usize,
    low_watermark: usize,
    signal: Arc<PipeSignal>,
}

impl PayloadPool {
    /// Take a buffer able to hold `len` bytes, its payload length set to `len`.
    ///
    /// Fails with [`Error::PoolExhausted`] when `len` exceeds the largest class or the
    /// class has no free buffer left.
    pub fn alloc(&mut self, len: usize) -> Result<PoolBuffer> {
        if len > self.max_payload {
            return Err(Error::PoolExhausted { size: len });
        }
        let low_watermark = self.low_watermark;
        let Some(class) = self.classes.iter_mut().find(|c| c.size >= len) else {
            return Err(Error::PoolExhausted { size: len });
        };
        if class.free.len() <= low_watermark {
            class.absorb_refills();
        }
        let data = class.free.pop();
        let starved = data.is_none() || class.free.len() < low_watermark;
        if starved && !class.requested.swap(true, Ordering::AcqRel) {
            self.signal.notify();
        }
        match data {
            Some(data) => Ok(PoolBuffer { data, len }),
            None => Err(Error::PoolExhausted { size: len }),
        }
    }

    /// Return a buffer to its class. Buffers matching no class, or arriving when the
    /// class free list is full, are dropped.
    pub fn release(&mut self, buffer: PoolBuffer) {
        let size = buffer.data.len();
        if let Some(class) = self.classes.iter_mut().find(|c| c.size == size) {
            if class.free.len() < class.free.capacity() {
                class.free.push(buffer.data);
            }
        }
    }

    /// Free buffers in the class that would serve a `len` byte request.
    pub fn available(&self, len: usize) -> usize {
        self.classes
            .iter()
            .find(|c| c.size >= len)
            .map_or(0, |c| c.free.len())
    }

    #[inline]
    pub fn max_payload(&self) -> usize {
        self.max_payload
    }
}

struct ReplenishClass {
    size: usize,
    refills: HeapProd<Box<[u8]>>,
    requested: Arc<AtomicBool>,
}

/// Housekeeping side of the payload pool.
pub struct PoolReplenisher {
    classes: Vec<ReplenishClass>,
    batch: usize,
}

impl PoolReplenisher {
    /// Allocate a batch for every class that asked for one. Returns the number of
    /// buffers shipped.
    pub fn top_up(&mut self) -> usize {
        let mut shipped = 0;
        for class in &mut self.classes {
            if !class.requested.swap(false, Ordering::AcqRel) {
                continue;
            }
            let count = self.batch.min(class.refills.vacant_len());
            for _ in 0..count {
                let data = vec![0u8; class.size].into_boxed_slice();
                if class.refills.try_push(data).is_err() {
                    break;
                }
                shipped += 1;
            }
            tracing::debug!(class = class.size, count, "payload pool topped up");
        }
        shipped
    }

    pub fn has_requests(&self) -> bool {
        self.classes
            .iter()
            .any(|c| c.requested.load(Ordering::Acquire))
    }
}

/// Build a pool from `config`, preallocating every class. `signal` is raised when a
/// class drops under the low watermark.
pub fn payload_pool(
    config: &SchedulerConfig,
    signal: Arc<PipeSignal>,
) -> (PayloadPool, PoolReplenisher) {
    let preallocate = config.pool_preallocate;
    let ring_capacity = preallocate.max(1);
    let mut classes = Vec::with_capacity(config.pool_classes.len());
    let mut replenish = Vec::with_capacity(config.pool_classes.len());

    for &size in &config.pool_classes {
        let (producer, consumer) = HeapRb::<Box<[u8]>>::new(ring_capacity).split();
        let requested = Arc::new(AtomicBool::new(false));
        let mut free = Vec::with_capacity(preallocate + ring_capacity);
        free.extend((0..preallocate).map(|_| vec![0u8; size].into_boxed_slice()));

        classes.push(SizeClass {
            size,
            free,
            refills: consumer,
            requested: Arc::clone(&requested),
        });
        replenish.push(ReplenishClass {
            size,
            refills: producer,
            requested,
        });
    }

    let pool = PayloadPool {
        classes,
        max_payload: config.max_payload,
        low_watermark: config.pool_low_watermark,
        signal,
    };
    let replenisher = PoolReplenisher {
        classes: replenish,
        batch: preallocate.saturating_sub(config.pool_low_watermark).max(1),
    };
    (pool, replenisher)
}
