//! Centralized error type for the tjost umbrella crate.
//!
//! Wraps both subsystem errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] tjost_core::Error),

    #[error("OSC: {0}")]
    Osc(#[from] tjost_osc::Error),

    #[error("Housekeeper already started")]
    AlreadyStarted,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
