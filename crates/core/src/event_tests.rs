// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

use super::*;
use crate::opts::RuntimeOpts;

fn event(payload: Payload) -> Event {
    Event {
        meta: Meta {
            build_id: "b-1".to_string(),
            sequence: 7,
            correlation: String::new(),
        },
        payload,
    }
}

#[test]
fn event_roundtrips_with_type_tag() {
    let ev = event(Payload::SyncPointReached {
        barrier_id: "bar-1".to_string(),
    });
    let json = serde_json::to_string(&ev).unwrap();
    assert!(json.contains(r#""type":"sync:point""#), "{json}");
    let parsed: Event = serde_json::from_str(&json).unwrap();
    assert_eq!(ev, parsed);
}

#[test]
fn exec_end_result_is_not_an_error() {
    let ev = event(Payload::ExecEnd {
        runtime_id: "r-1".to_string(),
        exec_id: "e-1".to_string(),
        status: ExecStatus::Result { exit_code: 3 },
    });
    let json = serde_json::to_string(&ev).unwrap();
    let parsed: Event = serde_json::from_str(&json).unwrap();
    match parsed.payload {
        Payload::ExecEnd { status: ExecStatus::Result { exit_code }, .. } => {
            assert_eq!(exit_code, 3)
        }
        other => panic!("unexpected payload: {other:?}"),
    }
}

#[yare::parameterized(
    open_start  = { Payload::RuntimeOpenStart { runtime_id: "r-9".into(), opts: RuntimeOpts::host() } },
    close_start = { Payload::RuntimeCloseStart { runtime_id: "r-9".into() } },
    exec_start  = { Payload::ExecStart { runtime_id: "r-9".into(), exec_id: "e".into(), opts: Default::default() } },
    import_end  = { Payload::ImportEnd { runtime_id: "r-9".into(), import_id: "i".into(), status: Status::Result } },
    stdout      = { Payload::Stdout { data: b"x".to_vec(), source: LogSource::Runtime { runtime_id: "r-9".into() } } },
    exec_stderr = { Payload::Stderr { data: b"x".to_vec(), source: LogSource::Exec { runtime_id: "r-9".into(), exec_id: "e".into(), system: false } } },
)]
fn runtime_scoped_payloads(payload: Payload) {
    assert_eq!(payload.runtime_id(), Some("r-9"));
}

#[yare::parameterized(
    build_start     = { Payload::BuildStart { build_id: "b".into() } },
    sync_point      = { Payload::SyncPointReached { barrier_id: "x".into() } },
    director_stdout = { Payload::Stdout { data: b"x".to_vec(), source: LogSource::Director } },
    tender_start    = { Payload::RuntimeTenderStart { tender_id: "t".into(), opts: RuntimeOpts::host() } },
)]
fn unscoped_payloads(payload: Payload) {
    assert_eq!(payload.runtime_id(), None);
}

#[test]
fn status_from_result() {
    let ok: Result<(), std::io::Error> = Ok(());
    assert_eq!(Status::from_result(&ok), Status::Result);
    let err: Result<(), String> = Err("boom".to_string());
    match Status::from_result(&err) {
        Status::Error { message } => assert_eq!(message, "boom"),
        Status::Result => panic!("expected error status"),
    }
}
