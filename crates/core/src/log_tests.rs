// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

use super::*;
use parking_lot::Mutex;

fn collecting_log() -> (BuildLog, Arc<Mutex<Vec<Event>>>) {
    let bus = Bus::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    // Subscriptions outlive the dropped handle; only an explicit
    // unsubscribe removes them.
    let _sub = bus.subscribe(move |e| s.lock().push(e.clone()));
    (BuildLog::new(bus, "build-1", LogSource::Director), seen)
}

#[test]
fn publish_stamps_build_id_and_sequence() {
    let (log, seen) = collecting_log();
    log.publish(Payload::BuildStart {
        build_id: "build-1".to_string(),
    });
    log.publish(Payload::SyncPointReached {
        barrier_id: "b".to_string(),
    });
    let events = seen.lock();
    assert_eq!(events[0].meta.build_id, "build-1");
    assert_eq!(events[0].meta.sequence, 1);
    assert_eq!(events[1].meta.sequence, 2);
}

#[test]
fn republish_rejects_foreign_build() {
    let (log, _seen) = collecting_log();
    let foreign = Event {
        meta: Meta {
            build_id: "other-build".to_string(),
            sequence: 9,
            correlation: String::new(),
        },
        payload: Payload::SyncPointReached {
            barrier_id: "b".to_string(),
        },
    };
    assert!(log.republish(foreign).is_err());
}

#[test]
fn republish_assigns_fresh_local_sequence() {
    let (log, seen) = collecting_log();
    let remote = Event {
        meta: Meta {
            build_id: "build-1".to_string(),
            sequence: 1234,
            correlation: String::new(),
        },
        payload: Payload::SyncPointReached {
            barrier_id: "b".to_string(),
        },
    };
    log.republish(remote).unwrap();
    assert_eq!(seen.lock()[0].meta.sequence, 1);
}

#[test]
fn print_appends_newline_once() {
    let (log, seen) = collecting_log();
    log.print("hello");
    log.print("world\n");
    let events = seen.lock();
    match (&events[0].payload, &events[1].payload) {
        (Payload::Stdout { data: a, .. }, Payload::Stdout { data: b, .. }) => {
            assert_eq!(a, b"hello\n");
            assert_eq!(b, b"world\n");
        }
        other => panic!("unexpected payloads: {other:?}"),
    }
}

#[test]
fn with_source_tags_log_events() {
    let (log, seen) = collecting_log();
    let exec_log = log.with_source(LogSource::Exec {
        runtime_id: "r-1".to_string(),
        exec_id: "e-1".to_string(),
        system: true,
    });
    exec_log.stderr(b"oops".to_vec());
    let guard = seen.lock();
    match &guard[0].payload {
        Payload::Stderr { source, .. } => {
            assert_eq!(
                source,
                &LogSource::Exec {
                    runtime_id: "r-1".to_string(),
                    exec_id: "e-1".to_string(),
                    system: true,
                }
            );
        }
        other => panic!("unexpected payload: {other:?}"),
    }
}

#[test]
fn derived_handles_share_one_sequencer() {
    let (log, seen) = collecting_log();
    let derived = log.with_source(LogSource::Runtime {
        runtime_id: "r-1".to_string(),
    });
    log.print("a");
    derived.print("b");
    log.print("c");
    let sequences: Vec<u64> = seen.lock().iter().map(|e| e.meta.sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3]);
}
