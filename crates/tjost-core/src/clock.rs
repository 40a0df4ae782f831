//! Wall clock to sample frame conversion.
//!
//! Bundle time tags are wall-clock NTP times; the scheduler counts sample frames. A
//! [`ClockSync`] pairs a monotonic media-clock reading with the wall clock sampled at
//! the same moment, refreshed periodically by the housekeeping thread and published
//! lock-free through [`SharedClockSync`]. The real-time thread records a
//! [`FrameTimeline`] at the start of every period. [`Timestamper`] combines both to
//! turn a time tag into an absolute frame.

use arc_swap::ArcSwap;
use atomic_float::AtomicF64;
use std::sync::atomic::{fence, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tjost_osc::NtpTime;

/// Monotonic microsecond clock driving the audio callback.
pub trait MediaClock: Send + Sync {
    fn now_micros(&self) -> u64;
}

/// Source of wall-clock time.
pub trait WallClock: Send + Sync {
    fn now(&self) -> NtpTime;
}

/// [`MediaClock`] backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaClock for MonotonicClock {
    fn now_micros(&self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }
}

/// [`WallClock`] backed by the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemWallClock;

impl WallClock for SystemWallClock {
    fn now(&self) -> NtpTime {
        NtpTime::now()
    }
}

/// Media time and wall time sampled together.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockSync {
    pub media_us: u64,
    pub wall: NtpTime,
}

impl ClockSync {
    pub fn sample(media: &dyn MediaClock, wall: &dyn WallClock) -> Self {
        Self {
            media_us: media.now_micros(),
            wall: wall.now(),
        }
    }

    /// Media time, in microseconds, at which the wall clock reads `tag`.
    #[inline]
    pub fn media_for(&self, tag: NtpTime) -> f64 {
        self.media_us as f64 + tag.secs_since(self.wall) * 1e6
    }

    /// Wall time predicted for `media_us` by this pair.
    #[inline]
    pub fn predict(&self, media_us: u64) -> NtpTime {
        self.wall
            .offset_by((media_us as f64 - self.media_us as f64) * 1e-6)
    }

    /// Build the next pair from a fresh reading.
    ///
    /// The step between predicted and observed wall time is limited to
    /// `max_correction`. Returns the new pair and, when the step was clamped, the
    /// observed step in seconds.
    pub fn resample(
        &self,
        media_us: u64,
        observed: NtpTime,
        max_correction: Duration,
    ) -> (ClockSync, Option<f64>) {
        let predicted = self.predict(media_us);
        let step = observed.secs_since(predicted);
        let max = max_correction.as_secs_f64();
        if step.abs() <= max {
            let next = ClockSync {
                media_us,
                wall: observed,
            };
            (next, None)
        } else {
            let next = ClockSync {
                media_us,
                wall: predicted.offset_by(step.clamp(-max, max)),
            };
            (next, Some(step))
        }
    }
}

/// Clock pair shared between the housekeeping writer and real-time readers.
pub struct SharedClockSync {
    inner: ArcSwap<ClockSync>,
}

impl SharedClockSync {
    pub fn new(sync: ClockSync) -> Self {
        Self {
            inner: ArcSwap::from_pointee(sync),
        }
    }

    /// Wait-free read.
    #[inline]
    pub fn load(&self) -> ClockSync {
        **self.inner.load()
    }

    pub fn store(&self, sync: ClockSync) {
        self.inner.store(Arc::new(sync));
    }

    /// Resample from the clocks and publish. Returns the clamped step, if any, as
    /// `(observed, applied)` microseconds.
    pub fn resync(
        &self,
        media: &dyn MediaClock,
        wall: &dyn WallClock,
        max_correction: Duration,
    ) -> Option<(i64, i64)> {
        let current = self.load();
        let (next, clamped) = current.resample(media.now_micros(), wall.now(), max_correction);
        self.store(next);
        clamped.map(|step| {
            let observed_us = (step * 1e6) as i64;
            let applied_us = (step.signum() * max_correction.as_secs_f64() * 1e6) as i64;
            (observed_us, applied_us)
        })
    }
}

impl std::fmt::Debug for SharedClockSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SharedClockSync").field(&self.load()).finish()
    }
}

/// Frame counter and media time captured at a period start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTimeline {
    pub frame: u64,
    pub media_us: u64,
    pub sample_rate: f64,
}

impl FrameTimeline {
    /// Absolute frame at media time `media_us`, unclamped.
    #[inline]
    pub fn frame_at(&self, media_us: f64) -> f64 {
        self.frame as f64 + (media_us - self.media_us as f64) * self.sample_rate * 1e-6
    }
}

/// [`FrameTimeline`] written by the real-time thread, read from any thread.
///
/// A sequence lock over atomics: the writer never waits, readers retry while a write
/// is in progress.
#[derive(Debug)]
pub struct SharedTimeline {
    seq: AtomicU64,
    frame: AtomicU64,
    media_us: AtomicU64,
    sample_rate: AtomicF64,
}

impl SharedTimeline {
    pub fn new(timeline: FrameTimeline) -> Self {
        Self {
            seq: AtomicU64::new(0),
            frame: AtomicU64::new(timeline.frame),
            media_us: AtomicU64::new(timeline.media_us),
            sample_rate: AtomicF64::new(timeline.sample_rate),
        }
    }

    /// Single writer only.
    pub fn store(&self, timeline: FrameTimeline) {
        let seq = self.seq.load(Ordering::Relaxed);
        self.seq.store(seq.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);
        self.frame.store(timeline.frame, Ordering::Relaxed);
        self.media_us.store(timeline.media_us, Ordering::Relaxed);
        self.sample_rate.store(timeline.sample_rate, Ordering::Relaxed);
        self.seq.store(seq.wrapping_add(2), Ordering::Release);
    }

    pub fn load(&self) -> FrameTimeline {
        loop {
            let before = self.seq.load(Ordering::Acquire);
            if before & 1 == 1 {
                std::hint::spin_loop();
                continue;
            }
            let timeline = FrameTimeline {
                frame: self.frame.load(Ordering::Relaxed),
                media_us: self.media_us.load(Ordering::Relaxed),
                sample_rate: self.sample_rate.load(Ordering::Relaxed),
            };
            fence(Ordering::Acquire);
            if self.seq.load(Ordering::Relaxed) == before {
                return timeline;
            }
        }
    }
}

/// Converts time tags to absolute frames.
#[derive(Debug, Clone)]
pub struct Timestamper {
    sync: Arc<SharedClockSync>,
    timeline: Arc<SharedTimeline>,
}

impl Timestamper {
    pub fn new(sync: Arc<SharedClockSync>, timeline: Arc<SharedTimeline>) -> Self {
        Self { sync, timeline }
    }

    /// `0` for the immediate tag; otherwise the floored frame, never below `1` so a
    /// real tag cannot be mistaken for "immediate".
    pub fn frames_for(&self, tag: NtpTime) -> u64 {
        if tag.is_immediate() {
            return crate::IMMEDIATE;
        }
        let media = self.sync.load().media_for(tag);
        let frame = self.timeline.load().frame_at(media).floor();
        if frame >= 1.0 {
            frame as u64
        } else {
            // also catches NaN
            1
        }
    }

    pub fn sync(&self) -> &Arc<SharedClockSync> {
        &self.sync
    }

    pub fn timeline(&self) -> &Arc<SharedTimeline> {
        &self.timeline
    }
}
