//! Lock-free diagnostics from the real-time thread.
//!
//! The real-time thread never logs. Faults are pushed as [`Diagnostic`] values into
//! an SPSC ring, counted in [`SchedulerStats`], and turned into `tracing` events on
//! the housekeeping thread by [`DiagnosticHub::log_pending`].

use crate::Destination;
use parking_lot::Mutex;
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A fault or notable event reported from a non-blocking context.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Diagnostic {
    /// An event reached the drain after its time; it ran at `current` instead.
    LateEvent {
        destination: Destination,
        scheduled: u64,
        current: u64,
    },
    /// The event queue arena was full.
    QueueFull { destination: Destination, time: u64 },
    /// A pipe had no room for a record.
    PipeOverflow { needed: usize, available: usize },
    /// No pool buffer could hold a payload.
    PoolExhausted { size: usize },
    /// An incoming packet failed validation and was discarded.
    MalformedPacket { error: tjost_osc::Error, len: usize },
    /// A clock resample wanted to step by `observed_us` but applied `applied_us`.
    ClockStep { observed_us: i64, applied_us: i64 },
}

impl Diagnostic {
    /// Late events are expected under load and logged at debug level; everything else
    /// is a fault.
    pub fn is_fault(&self) -> bool {
        !matches!(self, Diagnostic::LateEvent { .. })
    }
}

/// Fault counters shared by every sender of a hub.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    late_events: AtomicU64,
    queue_full: AtomicU64,
    pipe_overflows: AtomicU64,
    pool_exhausted: AtomicU64,
    malformed_packets: AtomicU64,
    clock_steps: AtomicU64,
    dropped_diagnostics: AtomicU64,
}

/// Point-in-time copy of [`SchedulerStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub late_events: u64,
    pub queue_full: u64,
    pub pipe_overflows: u64,
    pub pool_exhausted: u64,
    pub malformed_packets: u64,
    pub clock_steps: u64,
    pub dropped_diagnostics: u64,
}

impl SchedulerStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, diagnostic: &Diagnostic) {
        let counter = match diagnostic {
            Diagnostic::LateEvent { .. } => &self.late_events,
            Diagnostic::QueueFull { .. } => &self.queue_full,
            Diagnostic::PipeOverflow { .. } => &self.pipe_overflows,
            Diagnostic::PoolExhausted { .. } => &self.pool_exhausted,
            Diagnostic::MalformedPacket { .. } => &self.malformed_packets,
            Diagnostic::ClockStep { .. } => &self.clock_steps,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            late_events: self.late_events.load(Ordering::Relaxed),
            queue_full: self.queue_full.load(Ordering::Relaxed),
            pipe_overflows: self.pipe_overflows.load(Ordering::Relaxed),
            pool_exhausted: self.pool_exhausted.load(Ordering::Relaxed),
            malformed_packets: self.malformed_packets.load(Ordering::Relaxed),
            clock_steps: self.clock_steps.load(Ordering::Relaxed),
            dropped_diagnostics: self.dropped_diagnostics.load(Ordering::Relaxed),
        }
    }
}

/// Producer half, owned by exactly one thread.
pub struct DiagnosticSender {
    producer: HeapProd<Diagnostic>,
    stats: Arc<SchedulerStats>,
}

impl DiagnosticSender {
    /// Count and enqueue. Never blocks; a full ring only bumps the dropped counter.
    #[inline]
    pub fn send(&mut self, diagnostic: Diagnostic) {
        self.stats.record(&diagnostic);
        if self.producer.try_push(diagnostic).is_err() {
            self.stats.dropped_diagnostics.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn stats(&self) -> &Arc<SchedulerStats> {
        &self.stats
    }
}

/// Consumer half.
pub struct DiagnosticReceiver {
    consumer: HeapCons<Diagnostic>,
}

impl DiagnosticReceiver {
    #[inline]
    pub fn try_recv(&mut self) -> Option<Diagnostic> {
        self.consumer.try_pop()
    }

    #[inline]
    pub fn pending_count(&self) -> usize {
        self.consumer.occupied_len()
    }

    /// Emit every pending diagnostic through `tracing`. Returns how many were logged.
    pub fn log_pending(&mut self, source: &str) -> usize {
        let mut count = 0;
        while let Some(diagnostic) = self.consumer.try_pop() {
            log_diagnostic(source, &diagnostic);
            count += 1;
        }
        count
    }
}

fn log_diagnostic(source: &str, diagnostic: &Diagnostic) {
    match *diagnostic {
        Diagnostic::LateEvent {
            destination,
            scheduled,
            current,
        } => tracing::debug!(
            source,
            ?destination,
            scheduled,
            current,
            late_by = current.saturating_sub(scheduled),
            "late event clamped to period start"
        ),
        Diagnostic::QueueFull { destination, time } => {
            tracing::warn!(source, ?destination, time, "event queue full, event dropped")
        }
        Diagnostic::PipeOverflow { needed, available } => {
            tracing::warn!(source, needed, available, "pipe overflow, record dropped")
        }
        Diagnostic::PoolExhausted { size } => {
            tracing::warn!(source, size, "payload pool exhausted")
        }
        Diagnostic::MalformedPacket { error, len } => {
            tracing::warn!(source, %error, len, "malformed packet discarded")
        }
        Diagnostic::ClockStep {
            observed_us,
            applied_us,
        } => tracing::warn!(
            source,
            observed_us,
            applied_us,
            "wall clock jump clamped"
        ),
    }
}

/// Create a standalone diagnostics channel with its own counters.
pub fn diagnostics(capacity: usize) -> (DiagnosticSender, DiagnosticReceiver) {
    channel(capacity, Arc::new(SchedulerStats::new()))
}

fn channel(capacity: usize, stats: Arc<SchedulerStats>) -> (DiagnosticSender, DiagnosticReceiver) {
    let (producer, consumer) = HeapRb::new(capacity.max(1)).split();
    (
        DiagnosticSender { producer, stats },
        DiagnosticReceiver { consumer },
    )
}

/// Aggregates the receivers of every diagnostics producer in a host.
pub struct DiagnosticHub {
    receivers: Mutex<Vec<(String, DiagnosticReceiver)>>,
    stats: Arc<SchedulerStats>,
    capacity: usize,
}

impl DiagnosticHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            receivers: Mutex::new(Vec::new()),
            stats: Arc::new(SchedulerStats::new()),
            capacity,
        }
    }

    /// Register a new producer. `source` labels its log lines.
    pub fn sender(&self, source: impl Into<String>) -> DiagnosticSender {
        let (sender, receiver) = channel(self.capacity, Arc::clone(&self.stats));
        self.receivers.lock().push((source.into(), receiver));
        sender
    }

    /// Log everything pending on every registered channel.
    pub fn log_pending(&self) -> usize {
        let mut receivers = self.receivers.lock();
        receivers
            .iter_mut()
            .map(|(source, receiver)| receiver.log_pending(source))
            .sum()
    }

    /// Take everything pending without logging.
    pub fn drain(&self) -> Vec<Diagnostic> {
        let mut all = Vec::new();
        let mut receivers = self.receivers.lock();
        for (_, receiver) in receivers.iter_mut() {
            while let Some(diagnostic) = receiver.try_recv() {
                all.push(diagnostic);
            }
        }
        all
    }

    pub fn stats(&self) -> &Arc<SchedulerStats> {
        &self.stats
    }
}
