//! Background thread for everything the real-time thread must not do itself.

use crate::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tjost_core::{
    Arc, Diagnostic, DiagnosticHub, DiagnosticSender, MediaClock, PipeSignal, PoolReplenisher,
    SharedClockSync, WallClock,
};

/// What one housekeeping pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tick {
    pub resynced: bool,
    pub topped_up: usize,
    pub logged: usize,
}

pub(crate) struct HousekeeperParts {
    pub replenisher: PoolReplenisher,
    pub signal: Arc<PipeSignal>,
    pub sync: Arc<SharedClockSync>,
    pub media_clock: Arc<dyn MediaClock>,
    pub wall_clock: Arc<dyn WallClock>,
    pub hub: Arc<DiagnosticHub>,
    pub resync_period: Duration,
    pub max_correction: Duration,
}

struct State {
    replenisher: PoolReplenisher,
    signal: Arc<PipeSignal>,
    sync: Arc<SharedClockSync>,
    media_clock: Arc<dyn MediaClock>,
    wall_clock: Arc<dyn WallClock>,
    hub: Arc<DiagnosticHub>,
    diagnostics: DiagnosticSender,
    resync_period: Duration,
    max_correction: Duration,
    next_resync: Instant,
}

impl State {
    fn tick(&mut self, now: Instant) -> Tick {
        let mut tick = Tick::default();

        if now >= self.next_resync {
            if let Some((observed_us, applied_us)) =
                self.sync
                    .resync(&*self.media_clock, &*self.wall_clock, self.max_correction)
            {
                self.diagnostics.send(Diagnostic::ClockStep {
                    observed_us,
                    applied_us,
                });
            }
            self.next_resync = now + self.resync_period;
            tick.resynced = true;
        }

        self.signal.acknowledge();
        tick.topped_up = self.replenisher.top_up();
        tick.logged = self.hub.log_pending();
        tick
    }

    fn run(mut self, shutdown: Arc<AtomicBool>) {
        tracing::debug!("housekeeper started");
        while !shutdown.load(Ordering::Acquire) {
            let timeout = self.next_resync.saturating_duration_since(Instant::now());
            self.signal.wait_timeout(timeout);
            self.tick(Instant::now());
        }
        // last words from the real-time side
        self.hub.log_pending();
        tracing::debug!("housekeeper stopped");
    }
}

/// Clock resync, pool top-up and diagnostics logging.
///
/// Either [`start`](Self::start) it on its own thread, or drive it by hand with
/// [`run_once`](Self::run_once).
pub struct Housekeeper {
    state: Option<State>,
    signal: Arc<PipeSignal>,
    shutdown: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl Housekeeper {
    pub(crate) fn from_parts(parts: HousekeeperParts) -> Self {
        let HousekeeperParts {
            replenisher,
            signal,
            sync,
            media_clock,
            wall_clock,
            hub,
            resync_period,
            max_correction,
        } = parts;
        let diagnostics = hub.sender("housekeeper");
        Self {
            state: Some(State {
                replenisher,
                signal: Arc::clone(&signal),
                sync,
                media_clock,
                wall_clock,
                hub,
                diagnostics,
                resync_period,
                max_correction,
                next_resync: Instant::now() + resync_period,
            }),
            signal,
            shutdown: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }

    /// Spawn the `tjost-housekeeper` thread.
    pub fn start(&mut self) -> Result<()> {
        let state = self.state.take().ok_or(Error::AlreadyStarted)?;
        let shutdown = Arc::clone(&self.shutdown);
        let handle = thread::Builder::new()
            .name("tjost-housekeeper".into())
            .spawn(move || state.run(shutdown))?;
        self.thread_handle = Some(handle);
        Ok(())
    }

    /// One pass on the calling thread. `None` once the thread has been started.
    pub fn run_once(&mut self) -> Option<Tick> {
        self.state.as_mut().map(|state| state.tick(Instant::now()))
    }

    /// Resample the clocks on the next pass regardless of the resync period.
    pub fn force_resync(&mut self) {
        if let Some(state) = self.state.as_mut() {
            state.next_resync = Instant::now();
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle.is_some()
    }

    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        self.signal.notify();

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Housekeeper {
    fn drop(&mut self) {
        self.stop();
    }
}
