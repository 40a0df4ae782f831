//! Integration test modules for tjost
//!
//! - host: per-period scheduling and dispatch
//! - injector: cross-thread packet injection
//! - housekeeper: background maintenance
//! - logfile: event log round trip

pub mod host;
pub mod housekeeper;
pub mod injector;
pub mod logfile;
