//! Scheduler configuration.

use crate::pipe::PIPE_HEADER_LEN;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Sizes and periods for the real-time scheduling machinery.
///
/// Every field has a default, so a partial serialized config fills in the rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Pending events the host queue can hold (default: 4096)
    pub queue_capacity: usize,
    /// Byte capacity of each cross-thread pipe (default: 64 KiB)
    pub pipe_capacity: usize,
    /// Largest event payload in bytes (default: 4096)
    pub max_payload: usize,
    /// Payload pool size classes, ascending (default: 64/256/1024/4096)
    pub pool_classes: Vec<usize>,
    /// Buffers allocated up front per size class (default: 256)
    pub pool_preallocate: usize,
    /// Free buffers per class below which a top-up is requested (default: 64)
    pub pool_low_watermark: usize,
    /// Diagnostics ring capacity per producer (default: 1024)
    pub diagnostics_capacity: usize,
    /// Interval between wall/media clock resamples (default: 1 s)
    pub resync_period: Duration,
    /// Largest clock step applied per resample (default: 500 ms)
    pub max_clock_correction: Duration,
    /// Largest frame accepted by stream framing (default: 64 KiB)
    pub max_frame_len: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 4096,
            pipe_capacity: 64 * 1024,
            max_payload: 4096,
            pool_classes: vec![64, 256, 1024, 4096],
            pool_preallocate: 256,
            pool_low_watermark: 64,
            diagnostics_capacity: 1024,
            resync_period: Duration::from_secs(1),
            max_clock_correction: Duration::from_millis(500),
            max_frame_len: 64 * 1024,
        }
    }
}

impl SchedulerConfig {
    /// Reject configurations the scheduler cannot run with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| -> Result<()> { Err(Error::InvalidConfig(msg.to_string())) };

        if self.queue_capacity == 0 {
            return invalid("queue_capacity must be non-zero");
        }
        if self.queue_capacity >= u32::MAX as usize {
            return invalid("queue_capacity must fit a 32-bit index");
        }
        if self.max_payload == 0 {
            return invalid("max_payload must be non-zero");
        }
        if self.max_payload > u32::MAX as usize {
            return invalid("max_payload must fit a 32-bit size");
        }
        if self.pipe_capacity < PIPE_HEADER_LEN + self.max_payload {
            return invalid("pipe_capacity must hold at least one maximum-size record");
        }
        if self.pool_classes.is_empty() || self.pool_classes[0] == 0 {
            return invalid("pool_classes must be non-empty and non-zero");
        }
        if self.pool_classes.windows(2).any(|w| w[0] >= w[1]) {
            return invalid("pool_classes must be strictly ascending");
        }
        if self.pool_classes.last().is_some_and(|&c| c < self.max_payload) {
            return invalid("largest pool class must hold max_payload");
        }
        if self.pool_low_watermark > self.pool_preallocate {
            return invalid("pool_low_watermark must not exceed pool_preallocate");
        }
        if self.diagnostics_capacity == 0 {
            return invalid("diagnostics_capacity must be non-zero");
        }
        if self.resync_period.is_zero() {
            return invalid("resync_period must be non-zero");
        }
        if self.max_frame_len == 0 {
            return invalid("max_frame_len must be non-zero");
        }
        Ok(())
    }
}
