//! Error types for tjost-core.

use crate::ModuleId;
use thiserror::Error;

/// Error type for tjost-core operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("OSC error: {0}")]
    Osc(#[from] tjost_osc::Error),

    #[error("Event queue full ({capacity} events)")]
    QueueFull { capacity: usize },

    #[error("Pipe overflow: need {needed} bytes, {available} free")]
    PipeOverflow { needed: usize, available: usize },

    #[error("Payload pool exhausted for a {size} byte payload")]
    PoolExhausted { size: usize },

    #[error("Payload of {size} bytes exceeds maximum {max}")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Unknown module: {0:?}")]
    UnknownModule(ModuleId),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Not a tjost log file")]
    BadMagic,

    #[error("Malformed log record: {0}")]
    MalformedRecord(tjost_osc::Error),

    #[error("Log record of {0} bytes exceeds maximum")]
    RecordTooLarge(usize),

    #[error("Record time {time} cannot follow {previous} in a log")]
    RecordTime { time: u64, previous: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
