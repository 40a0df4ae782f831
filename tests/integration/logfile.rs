//! Log file tests
//!
//! Records a session through an inspector, writes it to disk and replays it into a
//! fresh host whose module dispatches through a method table.

use crate::helpers::*;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::sync::{Arc, Mutex};
use tempfile::tempdir;
use tjost::prelude::*;
use tjost::{LogReader, LogWriter, MethodTable};

#[derive(Debug, Default)]
struct Mixer {
    gain: f32,
    mutes: usize,
    unknown: usize,
}

/// Module routing delivered messages through a method table.
struct MixerModule {
    methods: MethodTable<Mixer>,
    state: Arc<Mutex<Mixer>>,
}

impl MixerModule {
    fn new() -> (Box<Self>, Arc<Mutex<Mixer>>) {
        let mut methods = MethodTable::new();
        methods
            .add(Some("/gain"), Some("f"), |mixer: &mut Mixer, _, msg| {
                if let Some(Argument::Float(gain)) = msg.arg(0) {
                    mixer.gain = gain;
                }
            })
            .add(Some("/mute"), None, |mixer: &mut Mixer, _, _| {
                mixer.mutes += 1;
            });
        let state = Arc::new(Mutex::new(Mixer::default()));
        let module = Self {
            methods,
            state: Arc::clone(&state),
        };
        (Box::new(module), state)
    }
}

impl Module for MixerModule {
    fn name(&self) -> &str {
        "mixer"
    }

    fn deliver(&mut self, time: u64, payload: &[u8]) {
        let Ok(msg) = MessageRef::parse(payload) else {
            return;
        };
        let mut state = self.state.lock().unwrap();
        if !self.methods.dispatch(&mut state, time, &msg) {
            state.unknown += 1;
        }
    }
}

#[test]
fn test_record_and_replay_session() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("session.tjost");

    // record
    let tap = Tap::default();
    let recorded = tap.deliveries();
    let (mut host, _housekeeper) = Host::builder()
        .sample_rate(TEST_SAMPLE_RATE)
        .period(TEST_PERIOD)
        .inspector(tap)
        .build()
        .unwrap();
    host.schedule_message(Destination::Broadcast, 5, "/gain", &osc_args![0.5f32])
        .unwrap();
    host.schedule_message(Destination::Broadcast, 40, "/mute", &[])
        .unwrap();
    host.schedule_message(Destination::Broadcast, 70, "/gain", &osc_args![0.25f32])
        .unwrap();
    host.schedule_message(Destination::Broadcast, 90, "/pan", &osc_args![-1.0f32])
        .unwrap();
    host.process_period();
    host.process_period();

    let mut writer =
        LogWriter::create(BufWriter::new(File::create(&path).unwrap()), 48000).unwrap();
    let times = recorded.times();
    for (time, payload) in times.iter().zip(recorded.payloads()) {
        writer.write(*time, &payload).unwrap();
    }
    assert_eq!(writer.records(), 4);
    writer.flush().unwrap();
    drop(writer);

    // replay
    let reader = LogReader::open(BufReader::new(File::open(&path).unwrap())).unwrap();
    assert_eq!(reader.sample_rate(), 48000);
    let records: Vec<_> = reader.map(|r| r.unwrap()).collect();
    assert_eq!(
        records.iter().map(|r| r.time).collect::<Vec<_>>(),
        vec![5, 40, 70, 90]
    );
    assert_eq!(records[1].parse().unwrap().path(), "/mute");

    let mut rig = test_rig();
    let (mixer, state) = MixerModule::new();
    rig.host.add_module(mixer);
    for record in &records {
        rig.host
            .schedule(Destination::Broadcast, record.time, &record.message)
            .unwrap();
    }

    rig.process(TEST_PERIOD);
    {
        let state = state.lock().unwrap();
        assert_eq!(state.gain, 0.5);
        assert_eq!(state.mutes, 1);
    }

    rig.process(TEST_PERIOD);
    let state = state.lock().unwrap();
    assert_eq!(state.gain, 0.25);
    assert_eq!(state.mutes, 1);
    assert_eq!(state.unknown, 1);
}

#[test]
fn test_writer_rejects_time_going_backwards() {
    let mut writer = LogWriter::create(Vec::new(), 48000).unwrap();
    writer.write(100, &message("/a", 1)).unwrap();
    assert!(matches!(
        writer.write(99, &message("/a", 2)),
        Err(tjost::core::Error::RecordTime {
            time: 99,
            previous: 100
        })
    ));
    assert_eq!(writer.records(), 1);
}
