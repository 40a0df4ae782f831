//! Test helpers and fixtures for tjost integration tests
//!
//! Clocks are driven by hand so that time tags map to exact frames: at
//! [`TEST_SAMPLE_RATE`] one [`TEST_PERIOD`] lasts exactly one millisecond, and
//! [`TestRig::process`] advances the media clock in step with the frame counter.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tjost::core::{Event, EventInspector};
use tjost::prelude::*;
use tjost::{MediaClock, WallClock};

/// Default test sample rate
pub const TEST_SAMPLE_RATE: f64 = 48000.0;

/// One millisecond at [`TEST_SAMPLE_RATE`]
pub const TEST_PERIOD: usize = 48;

/// Wall time at media time zero
pub const BASE: NtpTime = NtpTime::new(3_900_000_000, 0);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Media clock advanced by hand.
#[derive(Debug, Default)]
pub struct ManualClock {
    micros: AtomicU64,
}

impl ManualClock {
    pub fn advance(&self, by: Duration) {
        self.micros
            .fetch_add(by.as_micros() as u64, Ordering::SeqCst);
    }
}

impl MediaClock for ManualClock {
    fn now_micros(&self) -> u64 {
        self.micros.load(Ordering::SeqCst)
    }
}

/// Wall clock set by hand.
#[derive(Debug)]
pub struct ManualWallClock {
    bits: AtomicU64,
}

impl ManualWallClock {
    pub fn new(time: NtpTime) -> Self {
        Self {
            bits: AtomicU64::new(time.to_bits()),
        }
    }

    pub fn set(&self, time: NtpTime) {
        self.bits.store(time.to_bits(), Ordering::SeqCst);
    }
}

impl WallClock for ManualWallClock {
    fn now(&self) -> NtpTime {
        NtpTime::from_bits(self.bits.load(Ordering::SeqCst))
    }
}

/// Small pools and queues so exhaustion is easy to reach.
pub fn test_config() -> SchedulerConfig {
    SchedulerConfig {
        queue_capacity: 256,
        pipe_capacity: 16 * 1024,
        pool_preallocate: 64,
        pool_low_watermark: 16,
        diagnostics_capacity: 256,
        ..Default::default()
    }
}

pub struct TestRig {
    pub host: Host,
    pub housekeeper: Housekeeper,
    pub media: Arc<ManualClock>,
    pub wall: Arc<ManualWallClock>,
}

impl TestRig {
    /// Run `frames` frames and advance the media clock to match.
    pub fn process(&mut self, frames: usize) -> usize {
        let dispatched = self.host.process(frames);
        let micros = frames as f64 * 1e6 / TEST_SAMPLE_RATE;
        self.media.advance(Duration::from_micros(micros as u64));
        dispatched
    }

    pub fn process_periods(&mut self, periods: usize) -> usize {
        (0..periods).map(|_| self.process(TEST_PERIOD)).sum()
    }
}

pub fn test_rig() -> TestRig {
    test_rig_with(test_config())
}

pub fn test_rig_with(config: SchedulerConfig) -> TestRig {
    init_tracing();
    let media = Arc::new(ManualClock::default());
    let wall = Arc::new(ManualWallClock::new(BASE));
    let (host, housekeeper) = Host::builder()
        .sample_rate(TEST_SAMPLE_RATE)
        .period(TEST_PERIOD)
        .config(config)
        .media_clock(Arc::clone(&media) as Arc<dyn MediaClock>)
        .wall_clock(Arc::clone(&wall) as Arc<dyn WallClock>)
        .build()
        .expect("Failed to build test host");
    TestRig {
        host,
        housekeeper,
        media,
        wall,
    }
}

/// Payloads a [`Recorder`] received, shared with the test body.
#[derive(Debug, Clone, Default)]
pub struct Deliveries(Arc<Mutex<Vec<(u64, Vec<u8>)>>>);

impl Deliveries {
    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn times(&self) -> Vec<u64> {
        self.0.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }

    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.0.lock().unwrap().iter().map(|(_, p)| p.clone()).collect()
    }

    /// `(time, path)` of every delivered message.
    pub fn paths(&self) -> Vec<(u64, String)> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .map(|(t, bytes)| {
                let msg = MessageRef::parse(bytes).expect("delivered payload is a message");
                (*t, msg.path().to_string())
            })
            .collect()
    }

    fn push(&self, time: u64, payload: &[u8]) {
        self.0.lock().unwrap().push((time, payload.to_vec()));
    }
}

/// Module that records every payload delivered to it.
pub struct Recorder {
    name: String,
    deliveries: Deliveries,
    torn_down: Arc<AtomicBool>,
}

impl Recorder {
    pub fn new(name: &str) -> (Box<Self>, Deliveries, Arc<AtomicBool>) {
        let deliveries = Deliveries::default();
        let torn_down = Arc::new(AtomicBool::new(false));
        let recorder = Self {
            name: name.to_string(),
            deliveries: deliveries.clone(),
            torn_down: Arc::clone(&torn_down),
        };
        (Box::new(recorder), deliveries, torn_down)
    }
}

impl Module for Recorder {
    fn name(&self) -> &str {
        &self.name
    }

    fn deliver(&mut self, time: u64, payload: &[u8]) {
        self.deliveries.push(time, payload);
    }

    fn teardown(&mut self) {
        self.torn_down.store(true, Ordering::SeqCst);
    }
}

/// Inspector copying every dispatched event.
#[derive(Debug, Clone, Default)]
pub struct Tap(Deliveries);

impl Tap {
    pub fn deliveries(&self) -> Deliveries {
        self.0.clone()
    }
}

impl EventInspector for Tap {
    fn inspect(&mut self, event: &Event) {
        self.0.push(event.time, event.bytes());
    }
}

/// Encode a single-int message.
pub fn message(path: &str, value: i32) -> Vec<u8> {
    let mut buf = [0u8; 256];
    let len = tjost::encode_message(&mut buf, path, &osc_args![value]).unwrap();
    buf[..len].to_vec()
}
