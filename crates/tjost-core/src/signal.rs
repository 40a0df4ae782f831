//! Edge-triggered wake signal shared by a producer and a waiting consumer.

use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Wakes a consumer thread without ever blocking the notifier.
///
/// Only the first [`notify`](Self::notify) after the consumer
/// [`acknowledge`](Self::acknowledge)s sends a wakeup; later notifications coalesce
/// into it. The consumer acknowledges before it drains, so data published after the
/// drain starts always raises a fresh wakeup.
#[derive(Debug)]
pub struct PipeSignal {
    pending: AtomicBool,
    tx: Sender<()>,
    rx: Receiver<()>,
}

impl PipeSignal {
    pub fn new() -> Self {
        let (tx, rx) = bounded(1);
        Self {
            pending: AtomicBool::new(false),
            tx,
            rx,
        }
    }

    /// Raise the signal. Returns `true` if this call sent the wakeup.
    #[inline]
    pub fn notify(&self) -> bool {
        if self.pending.swap(true, Ordering::AcqRel) {
            return false;
        }
        // capacity 1: a stale wakeup already queued is just as good
        let _ = self.tx.try_send(());
        true
    }

    /// Re-arm the signal. Call before draining.
    #[inline]
    pub fn acknowledge(&self) {
        self.pending.store(false, Ordering::Release);
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Block until a wakeup arrives or `timeout` elapses. Returns whether woken.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.rx.recv_timeout(timeout).is_ok()
    }

    /// Consume a queued wakeup without blocking.
    pub fn try_wait(&self) -> bool {
        self.rx.try_recv().is_ok()
    }
}

impl Default for PipeSignal {
    fn default() -> Self {
        Self::new()
    }
}
