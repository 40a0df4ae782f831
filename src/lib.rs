//! # Tjost - Real-time OSC event host
//!
//! Schedules OSC messages and bundles for sample-accurate delivery inside an audio
//! callback.
//!
//! ## Architecture
//!
//! Tjost is an umbrella crate that coordinates:
//! - **tjost-osc** - OSC wire codec (encode, parse, validate, unroll, framing, dispatch)
//! - **tjost-core** - Scheduling kernel (event queue, pipes, payload pool, clock sync,
//!   diagnostics, log files)
//!
//! On top of those it provides the [`Host`] that runs the per-period cycle, the
//! [`PacketInjector`] that feeds it from I/O threads, and the [`Housekeeper`] thread
//! that keeps clocks and pools fresh and turns diagnostics into `tracing` events.
//!
//! ## Quick Start
//!
//! ```ignore
//! use tjost::prelude::*;
//!
//! let (mut host, mut housekeeper) = Host::builder().period(64).build()?;
//! housekeeper.start()?;
//!
//! let printer = host.add_module(Box::new(Printer));
//! host.schedule_message(Destination::Broadcast, 480, "/hello", &osc_args![1i32])?;
//!
//! loop {
//!     host.process_period();
//! }
//! ```

/// Re-export of tjost-osc for direct access
pub use tjost_osc as osc;

/// Re-export of tjost-core for direct access
pub use tjost_core as core;

pub use tjost_osc::{
    encode_message, osc_args, Argument, BundleRef, BundleWriter, FrameDecoder, MessageRef,
    MethodTable, NtpTime, Packet, UnrollMode,
};

pub use tjost_core::{
    Destination, Diagnostic, EventHandle, EventInspector, LogReader, LogRecord, LogWriter,
    MediaClock, Module, ModuleId, ProcessContext, SchedulerConfig, StatsSnapshot, WallClock,
};

mod error;
pub use error::{Error, Result};

mod builder;
mod host;
mod housekeeper;
mod injector;

pub use builder::HostBuilder;
pub use host::{Host, Routing};
pub use housekeeper::{Housekeeper, Tick};
pub use injector::PacketInjector;

/// Convenience prelude for common imports
pub mod prelude {
    pub use crate::{Host, HostBuilder, Housekeeper, PacketInjector};

    pub use crate::{Destination, Module, ModuleId, ProcessContext, SchedulerConfig};

    pub use crate::{osc_args, Argument, MessageRef, NtpTime, UnrollMode};

    pub use crate::{Error, Result};
}
