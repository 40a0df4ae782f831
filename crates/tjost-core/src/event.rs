//! Scheduled events and their addressing.

use crate::PoolBuffer;
use serde::{Deserialize, Serialize};

/// Frame time meaning "as soon as possible". Drained events carrying it are
/// rewritten to the current period start.
pub const IMMEDIATE: u64 = 0;

/// Host-assigned module identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleId(pub u32);

/// Where an event is delivered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Destination {
    /// Every top-level module.
    Broadcast,
    /// Every child registered under the module.
    Module(ModuleId),
}

impl Destination {
    const BROADCAST_RAW: u32 = u32::MAX;

    /// 32-bit form used in pipe record headers.
    #[inline]
    pub fn to_raw(self) -> u32 {
        match self {
            Destination::Broadcast => Self::BROADCAST_RAW,
            Destination::Module(ModuleId(id)) => id,
        }
    }

    #[inline]
    pub fn from_raw(raw: u32) -> Self {
        if raw == Self::BROADCAST_RAW {
            Destination::Broadcast
        } else {
            Destination::Module(ModuleId(raw))
        }
    }
}

impl From<ModuleId> for Destination {
    fn from(id: ModuleId) -> Self {
        Destination::Module(id)
    }
}

/// A payload addressed to a destination at an absolute frame time.
///
/// The event owns its payload; whoever dequeues it is responsible for handing the
/// buffer back to the pool.
#[derive(Debug)]
pub struct Event {
    pub destination: Destination,
    pub time: u64,
    pub payload: PoolBuffer,
}

impl Event {
    pub fn new(destination: Destination, time: u64, payload: PoolBuffer) -> Self {
        Self {
            destination,
            time,
            payload,
        }
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        self.payload.as_slice()
    }

    #[inline]
    pub fn is_immediate(&self) -> bool {
        self.time == IMMEDIATE
    }
}
