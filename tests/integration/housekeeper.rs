//! Housekeeper tests
//!
//! Tests pool top-up, clock resync with step clamping, diagnostics draining and the
//! thread lifecycle.

use crate::helpers::*;
use approx::assert_relative_eq;
use std::time::Duration;
use tjost::prelude::*;
use tjost::Diagnostic;

#[test]
fn test_pool_top_up_after_watermark() {
    let config = SchedulerConfig {
        pool_preallocate: 8,
        pool_low_watermark: 4,
        ..test_config()
    };
    let mut rig = test_rig_with(config);
    let payload = message("/p", 0);

    for time in 0..6 {
        rig.host
            .schedule(Destination::Broadcast, 100 + time, &payload)
            .unwrap();
    }
    let tick = rig.housekeeper.run_once().unwrap();
    assert_eq!(tick.topped_up, 4);
    assert!(!tick.resynced);

    for time in 6..12 {
        rig.host
            .schedule(Destination::Broadcast, 100 + time, &payload)
            .unwrap();
    }
    assert!(matches!(
        rig.host.schedule(Destination::Broadcast, 200, &payload),
        Err(Error::Core(tjost::core::Error::PoolExhausted { .. }))
    ));
    assert_eq!(rig.host.stats().pool_exhausted, 1);

    // the failed allocation asked for another batch
    assert_eq!(rig.housekeeper.run_once().unwrap().topped_up, 4);
    rig.host
        .schedule(Destination::Broadcast, 200, &payload)
        .unwrap();
}

#[test]
fn test_small_drift_is_applied_whole() {
    let mut rig = test_rig();
    rig.media.advance(Duration::from_millis(1));
    rig.wall.set(BASE.offset_by(0.0012));

    rig.housekeeper.force_resync();
    assert!(rig.housekeeper.run_once().unwrap().resynced);

    let sync = rig.host.timestamper().sync().load();
    assert_eq!(sync.media_us, 1000);
    assert_eq!(sync.wall, BASE.offset_by(0.0012));
    assert_eq!(rig.host.stats().clock_steps, 0);
}

#[test]
fn test_clock_jump_is_clamped_and_reported() {
    let mut rig = test_rig();
    rig.media.advance(Duration::from_millis(1));
    rig.wall.set(BASE.offset_by(10.0));

    rig.housekeeper.force_resync();
    let tick = rig.housekeeper.run_once().unwrap();
    assert!(tick.resynced);
    assert_eq!(tick.logged, 1);
    assert_eq!(rig.host.stats().clock_steps, 1);

    // predicted BASE + 1 ms, stepped by at most 500 ms
    let sync = rig.host.timestamper().sync().load();
    assert_relative_eq!(sync.wall.secs_since(BASE), 0.501, epsilon = 1e-6);
}

#[test]
fn test_run_once_logs_real_time_faults() {
    let mut rig = test_rig();
    let (recorder, _, _) = Recorder::new("rec");
    rig.host.add_module(recorder);
    rig.process_periods(2);
    rig.host
        .schedule_message(Destination::Broadcast, 1, "/late", &[])
        .unwrap();
    rig.host.inject(b"bad!", UnrollMode::Full).unwrap_err();
    rig.process(TEST_PERIOD);

    assert_eq!(rig.housekeeper.run_once().unwrap().logged, 2);
    assert_eq!(rig.housekeeper.run_once().unwrap().logged, 0);
    assert!(rig.host.hub().drain().is_empty());
}

#[test]
fn test_thread_lifecycle() {
    let mut rig = test_rig();
    assert!(!rig.housekeeper.is_running());

    rig.housekeeper.start().unwrap();
    assert!(rig.housekeeper.is_running());
    assert!(matches!(rig.housekeeper.start(), Err(Error::AlreadyStarted)));
    assert_eq!(rig.housekeeper.run_once(), None);

    rig.host
        .schedule_message(Destination::Broadcast, 10, "/x", &[])
        .unwrap();
    rig.process(TEST_PERIOD);

    rig.housekeeper.stop();
    assert!(!rig.housekeeper.is_running());
    rig.housekeeper.stop();
}

#[test]
fn test_thread_tops_up_pool() {
    let config = SchedulerConfig {
        pool_preallocate: 8,
        pool_low_watermark: 4,
        ..test_config()
    };
    let mut rig = test_rig_with(config);
    rig.housekeeper.start().unwrap();
    let payload = message("/p", 0);

    let mut scheduled = 0;
    for _ in 0..200 {
        if rig
            .host
            .schedule(Destination::Broadcast, 1000, &payload)
            .is_ok()
        {
            scheduled += 1;
        }
        if scheduled == 12 {
            break;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(scheduled, 12);
    rig.housekeeper.stop();
}

#[test]
fn test_late_diagnostic_is_not_a_fault() {
    let late = Diagnostic::LateEvent {
        destination: Destination::Broadcast,
        scheduled: 1,
        current: 2,
    };
    assert!(!late.is_fault());
    assert!(Diagnostic::PoolExhausted { size: 8 }.is_fault());
}
