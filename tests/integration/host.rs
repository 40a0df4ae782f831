//! Host scheduling and dispatch tests
//!
//! Tests time ordering, period horizons, late and immediate events, routing fan-out,
//! module lifecycle and direct packet injection.

use crate::helpers::*;
use std::sync::atomic::Ordering;
use tjost::core::IMMEDIATE;
use tjost::prelude::*;
use tjost::{BundleWriter, Diagnostic};

fn paths(entries: &[(u64, &str)]) -> Vec<(u64, String)> {
    entries.iter().map(|(t, p)| (*t, p.to_string())).collect()
}

// =============================================================================
// Ordering and horizon
// =============================================================================

#[test]
fn test_events_dispatch_in_time_order() {
    let mut rig = test_rig();
    let (recorder, log, _) = Recorder::new("rec");
    rig.host.add_module(recorder);

    for (time, path) in [(50, "/c"), (10, "/a"), (30, "/b")] {
        rig.host
            .schedule_message(Destination::Broadcast, time, path, &osc_args![0i32])
            .unwrap();
    }

    assert_eq!(rig.process(TEST_PERIOD), 2);
    assert_eq!(log.paths(), paths(&[(10, "/a"), (30, "/b")]));
    assert_eq!(rig.host.pending_events(), 1);

    assert_eq!(rig.process(TEST_PERIOD), 1);
    assert_eq!(log.paths(), paths(&[(10, "/a"), (30, "/b"), (50, "/c")]));
}

#[test]
fn test_equal_times_keep_schedule_order() {
    let mut rig = test_rig();
    let (recorder, log, _) = Recorder::new("rec");
    rig.host.add_module(recorder);

    for path in ["/first", "/second", "/third"] {
        rig.host
            .schedule_message(Destination::Broadcast, 20, path, &[])
            .unwrap();
    }
    rig.process(TEST_PERIOD);
    assert_eq!(
        log.paths(),
        paths(&[(20, "/first"), (20, "/second"), (20, "/third")])
    );
}

#[test]
fn test_event_at_horizon_waits() {
    let mut rig = test_rig();
    let (recorder, log, _) = Recorder::new("rec");
    rig.host.add_module(recorder);

    let horizon = TEST_PERIOD as u64;
    rig.host
        .schedule_message(Destination::Broadcast, horizon, "/edge", &[])
        .unwrap();

    assert_eq!(rig.process(TEST_PERIOD), 0);
    assert_eq!(rig.process(TEST_PERIOD), 1);
    assert_eq!(log.times(), vec![horizon]);
}

// =============================================================================
// Late and immediate events
// =============================================================================

#[test]
fn test_late_event_clamped_and_reported_once() {
    let mut rig = test_rig();
    let (recorder, log, _) = Recorder::new("rec");
    rig.host.add_module(recorder);
    rig.process_periods(2);

    rig.host
        .schedule_message(Destination::Broadcast, 10, "/late", &[])
        .unwrap();
    rig.process(TEST_PERIOD);

    assert_eq!(log.times(), vec![96]);
    assert_eq!(rig.host.stats().late_events, 1);
    let late: Vec<_> = rig
        .host
        .hub()
        .drain()
        .into_iter()
        .filter(|d| matches!(d, Diagnostic::LateEvent { .. }))
        .collect();
    assert_eq!(
        late,
        vec![Diagnostic::LateEvent {
            destination: Destination::Broadcast,
            scheduled: 10,
            current: 96
        }]
    );
}

#[test]
fn test_immediate_event_runs_at_period_start() {
    let mut rig = test_rig();
    let (recorder, log, _) = Recorder::new("rec");
    rig.host.add_module(recorder);
    rig.process_periods(3);

    rig.host
        .schedule_message(Destination::Broadcast, IMMEDIATE, "/now", &[])
        .unwrap();
    rig.process(TEST_PERIOD);

    assert_eq!(log.paths(), paths(&[(144, "/now")]));
    assert_eq!(rig.host.stats().late_events, 0);
}

// =============================================================================
// Routing
// =============================================================================

#[test]
fn test_fan_out_follows_routing() {
    let mut rig = test_rig();
    let (a, a_log, _) = Recorder::new("a");
    let a = rig.host.add_module(a);
    let (b, b_log, _) = Recorder::new("b");
    let b = rig.host.add_child(a, b).unwrap();
    let (c, c_log, _) = Recorder::new("c");
    rig.host.add_child(a, c).unwrap();
    let (d, d_log, _) = Recorder::new("d");
    let d = rig.host.add_module(d);

    rig.host
        .schedule_message(Destination::Module(a), 5, "/to-a", &[])
        .unwrap();
    rig.host
        .schedule_message(Destination::Broadcast, 6, "/all", &[])
        .unwrap();
    rig.process(TEST_PERIOD);

    assert_eq!(a_log.paths(), paths(&[(6, "/all")]));
    assert_eq!(b_log.paths(), paths(&[(5, "/to-a")]));
    assert_eq!(c_log.paths(), paths(&[(5, "/to-a")]));
    assert_eq!(d_log.paths(), paths(&[(6, "/all")]));

    rig.host.connect(d, b).unwrap();
    rig.host
        .schedule_message(Destination::Module(d), 60, "/to-d", &[])
        .unwrap();
    rig.process(TEST_PERIOD);
    assert_eq!(b_log.paths().last(), Some(&(60, "/to-d".to_string())));
    assert_eq!(c_log.len(), 1);
}

#[test]
fn test_unknown_modules_are_rejected() {
    let mut rig = test_rig();
    let (a, _, _) = Recorder::new("a");
    let a = rig.host.add_module(a);
    let ghost = ModuleId(99);

    assert!(matches!(
        rig.host.connect(a, ghost),
        Err(Error::Core(tjost::core::Error::UnknownModule(id))) if id == ghost
    ));
    let (b, _, _) = Recorder::new("b");
    assert!(rig.host.add_child(ghost, b).is_err());
    assert!(rig.host.remove_module(ghost).is_err());
}

// =============================================================================
// Module lifecycle
// =============================================================================

#[test]
fn test_remove_module_frees_pending_without_dispatch() {
    let mut rig = test_rig();
    let (parent, _, parent_down) = Recorder::new("parent");
    let parent = rig.host.add_module(parent);
    let (child, child_log, child_down) = Recorder::new("child");
    rig.host.add_child(parent, child).unwrap();

    rig.host
        .schedule_message(Destination::Module(parent), 100, "/x", &[])
        .unwrap();
    rig.host
        .schedule_message(Destination::Module(parent), 120, "/y", &[])
        .unwrap();
    rig.host
        .schedule_message(Destination::Broadcast, 130, "/z", &[])
        .unwrap();

    assert_eq!(rig.host.remove_module(parent).unwrap(), 2);
    assert!(parent_down.load(Ordering::SeqCst));
    assert!(!child_down.load(Ordering::SeqCst));
    assert_eq!(rig.host.pending_events(), 1);
    assert_eq!(rig.host.module_count(), 1);
    assert_eq!(rig.host.module_name(parent), None);

    rig.process_periods(4);
    assert_eq!(child_log.len(), 0);
}

#[test]
fn test_drop_tears_down_modules() {
    let mut rig = test_rig();
    let (recorder, log, down) = Recorder::new("rec");
    rig.host.add_module(recorder);
    rig.host
        .schedule_message(Destination::Broadcast, 1000, "/never", &[])
        .unwrap();

    drop(rig);
    assert!(down.load(Ordering::SeqCst));
    assert_eq!(log.len(), 0);
}

#[test]
fn test_cancel_before_dispatch() {
    let mut rig = test_rig();
    let (recorder, log, _) = Recorder::new("rec");
    rig.host.add_module(recorder);

    let keep = rig
        .host
        .schedule_message(Destination::Broadcast, 10, "/keep", &[])
        .unwrap();
    let dropped = rig
        .host
        .schedule_message(Destination::Broadcast, 20, "/drop", &[])
        .unwrap();
    assert!(rig.host.cancel(dropped));
    assert!(!rig.host.cancel(dropped));

    rig.process(TEST_PERIOD);
    assert_eq!(log.paths(), paths(&[(10, "/keep")]));
    assert!(!rig.host.cancel(keep));
}

/// Schedules a tick halfway through every period.
struct Metronome;

impl Module for Metronome {
    fn name(&self) -> &str {
        "metronome"
    }

    fn process_input(&mut self, ctx: &mut ProcessContext<'_>, frames: usize) {
        let at = ctx.frame() + frames as u64 / 2;
        let _ = ctx.schedule_message(Destination::Broadcast, at, "/tick", &[]);
    }
}

#[test]
fn test_module_input_is_dispatched_same_period() {
    let mut rig = test_rig();
    rig.host.add_module(Box::new(Metronome));
    let (recorder, log, _) = Recorder::new("rec");
    rig.host.add_module(recorder);

    rig.process_periods(3);
    assert_eq!(log.times(), vec![24, 72, 120]);
}

#[test]
fn test_inspector_sees_every_dispatch() {
    init_tracing();
    let tap = Tap::default();
    let seen = tap.deliveries();
    let (mut host, _housekeeper) = Host::builder()
        .period(TEST_PERIOD)
        .inspector(tap)
        .build()
        .unwrap();

    host.schedule_message(Destination::Broadcast, 1, "/a", &[])
        .unwrap();
    host.schedule_message(Destination::Module(ModuleId(7)), 2, "/nobody", &[])
        .unwrap();
    host.process_period();

    assert_eq!(seen.paths(), paths(&[(1, "/a"), (2, "/nobody")]));
}

// =============================================================================
// Direct injection
// =============================================================================

fn sample_bundle(buf: &mut [u8]) -> usize {
    let mut w = BundleWriter::new(buf);
    // 1/16 s after BASE: frame 3000 at 48 kHz
    w.open(BASE.offset_by(0.0625)).unwrap();
    w.message("/later", &osc_args![1i32]).unwrap();
    w.open(NtpTime::IMMEDIATE).unwrap();
    w.message("/now", &[]).unwrap();
    w.finish().unwrap()
}

#[test]
fn test_inject_bundle_at_tagged_frames() {
    let mut rig = test_rig();
    let (recorder, log, _) = Recorder::new("rec");
    rig.host.add_module(recorder);

    let mut buf = [0u8; 256];
    let len = sample_bundle(&mut buf);
    assert_eq!(rig.host.inject(&buf[..len], UnrollMode::Full).unwrap(), 2);

    rig.process(TEST_PERIOD);
    assert_eq!(log.paths(), paths(&[(0, "/now")]));

    rig.process(2928);
    assert_eq!(log.len(), 1);

    rig.process(TEST_PERIOD);
    assert_eq!(log.paths(), paths(&[(0, "/now"), (3000, "/later")]));
}

#[test]
fn test_inject_without_unrolling_keeps_bundle() {
    let mut rig = test_rig();
    let (recorder, log, _) = Recorder::new("rec");
    rig.host.add_module(recorder);

    let mut buf = [0u8; 256];
    let len = sample_bundle(&mut buf);
    assert_eq!(rig.host.inject(&buf[..len], UnrollMode::None).unwrap(), 1);

    rig.process(3024);
    assert_eq!(log.times(), vec![3000]);
    assert_eq!(log.payloads()[0], buf[..len].to_vec());
}

#[test]
fn test_inject_malformed_is_discarded() {
    let mut rig = test_rig();
    assert!(matches!(
        rig.host.inject(b"/no-terminator", UnrollMode::Full),
        Err(Error::Core(tjost::core::Error::Osc(_)))
    ));
    assert_eq!(rig.host.pending_events(), 0);
    assert_eq!(rig.host.stats().malformed_packets, 1);
}

#[test]
fn test_host_assigns_module_ids() {
    let mut rig = test_rig();
    let (first, _, _) = Recorder::new("first");
    let first = rig.host.add_module(first);
    let (second, _, _) = Recorder::new("second");
    let second = rig.host.add_child(first, second).unwrap();

    assert_ne!(first, second);
    assert_eq!(rig.host.module_name(first), Some("first"));
    assert_eq!(rig.host.module_name(second), Some("second"));
}
