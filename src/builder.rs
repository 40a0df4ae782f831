//! Builder for configuring and constructing a [`Host`] and its [`Housekeeper`].

use crate::host::HostParts;
use crate::housekeeper::HousekeeperParts;
use crate::{Host, Housekeeper, Result};
use tjost_core::{
    payload_pool, Arc, ClockSync, DiagnosticHub, EventInspector, FrameTimeline, MediaClock,
    MonotonicClock, PipeSignal, SchedulerConfig, SharedClockSync, SharedTimeline,
    SystemWallClock, Timestamper, WallClock,
};

/// # Example
///
/// ```ignore
/// use tjost::prelude::*;
///
/// let (mut host, mut housekeeper) = Host::builder()
///     .sample_rate(48000.0)
///     .period(128)
///     .build()?;
/// housekeeper.start()?;
///
/// let synth = host.add_module(Box::new(MySynth::new()));
/// let mut injector = host.injector(Destination::Broadcast);
/// // on the network thread:
/// injector.inject(&packet)?;
/// // in the audio callback:
/// host.process(frames);
/// ```
pub struct HostBuilder {
    sample_rate: f64,
    period: usize,
    config: SchedulerConfig,
    media_clock: Option<Arc<dyn MediaClock>>,
    wall_clock: Option<Arc<dyn WallClock>>,
    inspector: Option<Box<dyn EventInspector>>,
}

impl Default for HostBuilder {
    fn default() -> Self {
        Self {
            sample_rate: 48000.0,
            period: 256,
            config: SchedulerConfig::default(),
            media_clock: None,
            wall_clock: None,
            inspector: None,
        }
    }
}

impl HostBuilder {
    /// Default: 48000
    pub fn sample_rate(mut self, sample_rate: f64) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Frames per period for [`Host::process_period`]. Default: 256
    pub fn period(mut self, frames: usize) -> Self {
        self.period = frames;
        self
    }

    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Clock the audio callback runs on. Default: [`MonotonicClock`]
    pub fn media_clock(mut self, clock: Arc<dyn MediaClock>) -> Self {
        self.media_clock = Some(clock);
        self
    }

    /// Default: [`SystemWallClock`]
    pub fn wall_clock(mut self, clock: Arc<dyn WallClock>) -> Self {
        self.wall_clock = Some(clock);
        self
    }

    /// Observe every dispatched event.
    pub fn inspector(mut self, inspector: impl EventInspector + 'static) -> Self {
        self.inspector = Some(Box::new(inspector));
        self
    }

    pub fn build(self) -> Result<(Host, Housekeeper)> {
        let Self {
            sample_rate,
            period,
            config,
            media_clock,
            wall_clock,
            inspector,
        } = self;

        config.validate()?;
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(invalid("sample_rate must be positive"));
        }
        if period == 0 {
            return Err(invalid("period must be non-zero"));
        }

        let media_clock =
            media_clock.unwrap_or_else(|| Arc::new(MonotonicClock::new()) as Arc<dyn MediaClock>);
        let wall_clock =
            wall_clock.unwrap_or_else(|| Arc::new(SystemWallClock) as Arc<dyn WallClock>);

        let sync = Arc::new(SharedClockSync::new(ClockSync::sample(
            &*media_clock,
            &*wall_clock,
        )));
        let timeline = Arc::new(SharedTimeline::new(FrameTimeline {
            frame: 0,
            media_us: media_clock.now_micros(),
            sample_rate,
        }));
        let hub = Arc::new(DiagnosticHub::new(config.diagnostics_capacity));
        let signal = Arc::new(PipeSignal::new());
        let (pool, replenisher) = payload_pool(&config, Arc::clone(&signal));

        tracing::info!(
            sample_rate,
            period,
            queue_capacity = config.queue_capacity,
            pipe_capacity = config.pipe_capacity,
            "host built"
        );

        let housekeeper = Housekeeper::from_parts(HousekeeperParts {
            replenisher,
            signal,
            sync: Arc::clone(&sync),
            media_clock: Arc::clone(&media_clock),
            wall_clock,
            hub: Arc::clone(&hub),
            resync_period: config.resync_period,
            max_correction: config.max_clock_correction,
        });
        let host = Host::from_parts(HostParts {
            config,
            sample_rate,
            period,
            pool,
            timestamper: Timestamper::new(sync, timeline),
            media_clock,
            hub,
            inspector,
        });
        Ok((host, housekeeper))
    }
}

fn invalid(msg: &str) -> crate::Error {
    tjost_core::Error::InvalidConfig(msg.to_string()).into()
}

impl Host {
    pub fn builder() -> HostBuilder {
        HostBuilder::default()
    }
}
