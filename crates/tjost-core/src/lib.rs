//! Real-time scheduling kernel for OSC event streams.
//!
//! # Primary API
//!
//! - [`EventQueue`]: time-ordered arena queue drained once per period
//! - [`pipe`] / [`PipeProducer`] / [`PipeConsumer`]: SPSC byte pipe between threads
//! - [`PayloadPool`]: preallocated payload buffers with housekeeping top-up
//! - [`Timestamper`]: wall-clock time tags to absolute frame times
//! - [`ProcessContext`] / [`Module`]: what the host hands its I/O modules
//! - [`DiagnosticHub`]: lock-free fault reporting, logged off the real-time thread
//! - [`LogWriter`] / [`LogReader`]: binary event log files
//!
//! # Example
//!
//! ```ignore
//! use tjost_core::*;
//!
//! let config = SchedulerConfig::default();
//! let (mut pool, replenisher) = payload_pool(&config, Arc::new(PipeSignal::new()));
//! let mut queue = EventQueue::with_capacity(config.queue_capacity);
//! let (mut diagnostics, _rx) = diagnostics::diagnostics(config.diagnostics_capacity);
//!
//! let mut payload = pool.alloc(16)?;
//! payload.as_mut_slice().copy_from_slice(&bytes);
//! queue.schedule(Event::new(Destination::Broadcast, 480, payload))?;
//! queue.drain(0, 512, &mut diagnostics, |event| deliver(event));
//! ```

pub mod error;
pub use error::{Error, Result};

mod config;
pub use config::SchedulerConfig;

mod event;
pub use event::{Destination, Event, ModuleId, IMMEDIATE};

mod signal;
pub use signal::PipeSignal;

pub mod pool;
pub use pool::{payload_pool, PayloadPool, PoolBuffer, PoolReplenisher};

pub mod diagnostics;
pub use diagnostics::{
    Diagnostic, DiagnosticHub, DiagnosticReceiver, DiagnosticSender, SchedulerStats,
    StatsSnapshot,
};

pub mod queue;
pub use queue::{EventHandle, EventQueue, QueueFull};

pub mod pipe;
pub use pipe::{pipe, PipeConsumer, PipeProducer, PIPE_HEADER_LEN};

pub mod clock;
pub use clock::{
    ClockSync, FrameTimeline, MediaClock, MonotonicClock, SharedClockSync, SharedTimeline,
    SystemWallClock, Timestamper, WallClock,
};

mod module;
pub use module::{EventInspector, Module, ProcessContext};

pub mod logfile;
pub use logfile::{LogReader, LogRecord, LogWriter, LOG_MAGIC};

pub use std::sync::Arc;
