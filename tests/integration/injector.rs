//! Packet injector tests
//!
//! Tests packets crossing from an I/O thread into the host through a pipe, including
//! overflow, malformed input and length-prefixed streams.

use crate::helpers::*;
use std::thread;
use std::time::Duration;
use tjost::osc::{encode_frame, Writer};
use tjost::prelude::*;
use tjost::BundleWriter;

#[test]
fn test_injector_thread_reaches_children() {
    let mut rig = test_rig();
    let (bus, bus_log, _) = Recorder::new("bus");
    let bus = rig.host.add_module(bus);
    let (left, left_log, _) = Recorder::new("left");
    rig.host.add_child(bus, left).unwrap();
    let (right, right_log, _) = Recorder::new("right");
    rig.host.add_child(bus, right).unwrap();

    let mut injector = rig.host.injector(Destination::Module(bus));
    let sender = thread::spawn(move || {
        for i in 0..100 {
            assert_eq!(injector.inject(&message("/note", i)).unwrap(), 1);
        }
        injector
    });
    let injector = sender.join().unwrap();
    assert_eq!(injector.dropped_count(), 0);

    // more records than pool buffers: the rest waits for released ones
    rig.process_periods(3);
    assert_eq!(left_log.len(), 100);
    assert_eq!(right_log.len(), 100);
    assert_eq!(bus_log.len(), 0);

    let values: Vec<i32> = left_log
        .payloads()
        .iter()
        .map(|bytes| {
            let msg = MessageRef::parse(bytes).unwrap();
            match msg.arg(0) {
                Some(Argument::Int(v)) => v,
                other => panic!("unexpected argument {other:?}"),
            }
        })
        .collect();
    assert_eq!(values, (0..100).collect::<Vec<_>>());
}

#[test]
fn test_bundle_time_survives_pipe() {
    let mut rig = test_rig();
    let (recorder, log, _) = Recorder::new("rec");
    rig.host.add_module(recorder);
    let mut injector = rig.host.injector(Destination::Broadcast);

    let mut buf = [0u8; 128];
    let mut w = BundleWriter::new(&mut buf);
    w.open(BASE.offset_by(0.0625)).unwrap();
    w.message("/later", &[]).unwrap();
    let len = w.finish().unwrap();
    assert_eq!(injector.inject(&buf[..len]).unwrap(), 1);

    rig.process(TEST_PERIOD);
    assert_eq!(log.len(), 0);
    assert_eq!(rig.host.pending_events(), 1);

    rig.process(3000);
    assert_eq!(log.times(), vec![3000]);
}

#[test]
fn test_pipe_overflow_drops_and_reports() {
    let config = SchedulerConfig {
        max_payload: 64,
        pool_classes: vec![64],
        pipe_capacity: 160,
        ..test_config()
    };
    let mut rig = test_rig_with(config);
    let (recorder, log, _) = Recorder::new("rec");
    rig.host.add_module(recorder);
    let mut injector = rig.host.injector(Destination::Broadcast);

    // 12-byte messages make 28-byte records: five fit in 160 bytes
    let written: usize = (0..10)
        .map(|i| injector.inject(&message("/a", i)).unwrap())
        .sum();
    assert_eq!(written, 5);
    assert_eq!(injector.dropped_count(), 5);
    assert_eq!(rig.host.stats().pipe_overflows, 5);

    rig.process(TEST_PERIOD);
    assert_eq!(log.len(), 5);

    // room again once the host has drained the pipe
    assert_eq!(injector.inject(&message("/a", 10)).unwrap(), 1);
}

#[test]
fn test_oversize_payload_is_dropped() {
    let config = SchedulerConfig {
        max_payload: 64,
        pool_classes: vec![64],
        ..test_config()
    };
    let mut rig = test_rig_with(config);
    let mut injector = rig.host.injector(Destination::Broadcast);

    let blob = [7u8; 100];
    let mut buf = [0u8; 256];
    let len = tjost::encode_message(&mut buf, "/big", &[Argument::Blob(&blob)]).unwrap();

    assert_eq!(injector.inject(&buf[..len]).unwrap(), 0);
    assert_eq!(injector.dropped_count(), 1);
    assert_eq!(rig.host.stats().pool_exhausted, 1);
}

#[test]
fn test_malformed_packets_counted() {
    let mut rig = test_rig();
    let mut injector = rig.host.injector(Destination::Broadcast);

    assert!(matches!(injector.inject(b"oops"), Err(Error::Osc(_))));
    assert!(matches!(injector.inject(&[]), Err(Error::Osc(_))));
    assert_eq!(injector.malformed_count(), 2);
    assert_eq!(rig.host.stats().malformed_packets, 2);

    rig.process(TEST_PERIOD);
    assert_eq!(rig.host.pending_events(), 0);
}

#[test]
fn test_framed_stream_in_small_chunks() {
    let mut rig = test_rig();
    let (recorder, log, _) = Recorder::new("rec");
    rig.host.add_module(recorder);
    let mut injector = rig.host.injector(Destination::Broadcast);
    let mut decoder = injector.frame_decoder();

    let mut stream = [0u8; 256];
    let mut w = Writer::new(&mut stream);
    encode_frame(&message("/one", 1), &mut w).unwrap();
    encode_frame(b"junk", &mut w).unwrap();
    encode_frame(&message("/two", 2), &mut w).unwrap();
    let stream = w.written().to_vec();

    let mut written = 0;
    for chunk in stream.chunks(5) {
        decoder.push(chunk);
        written += injector.inject_frames(&mut decoder).unwrap();
    }
    assert_eq!(written, 2);
    assert_eq!(injector.malformed_count(), 1);
    assert_eq!(decoder.buffered(), 0);

    rig.process(TEST_PERIOD);
    assert_eq!(
        log.paths(),
        vec![(0, "/one".to_string()), (0, "/two".to_string())]
    );
}

#[test]
fn test_oversize_frame_poisons_stream() {
    let mut rig = test_rig();
    let mut injector = rig.host.injector(Destination::Broadcast);
    let mut decoder = injector.frame_decoder();

    decoder.push(&u32::MAX.to_be_bytes());
    decoder.push(&message("/x", 0));
    assert!(matches!(
        injector.inject_frames(&mut decoder),
        Err(Error::Osc(tjost::osc::Error::FrameTooLarge { .. }))
    ));
    assert_eq!(decoder.buffered(), 0);
}

#[test]
fn test_injectors_wake_the_host() {
    let mut rig = test_rig();
    let (recorder, log, _) = Recorder::new("rec");
    rig.host.add_module(recorder);
    let first = rig.host.injector(Destination::Broadcast);
    let second = rig.host.injector(Destination::Broadcast);
    assert!(!rig.host.wait_inbound(Duration::from_millis(1)));

    let senders: Vec<_> = [first, second]
        .into_iter()
        .enumerate()
        .map(|(i, mut injector)| {
            thread::spawn(move || injector.inject(&message("/wake", i as i32)).unwrap())
        })
        .collect();
    assert!(rig.host.wait_inbound(Duration::from_secs(5)));
    for sender in senders {
        assert_eq!(sender.join().unwrap(), 1);
    }

    rig.process(TEST_PERIOD);
    assert_eq!(log.len(), 2);
}
