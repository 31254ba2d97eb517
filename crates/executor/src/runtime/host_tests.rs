// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

use super::*;
use knita_core::{Bus, Event, LogSource, Payload};
use parking_lot::Mutex;
use std::sync::Arc;

fn runtime_with_log() -> (HostRuntime, Arc<Mutex<Vec<Event>>>) {
    let bus = Bus::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    let _sub = bus.subscribe(move |e| s.lock().push(e.clone()));
    let log = BuildLog::new(bus, "b-1", LogSource::Runtime { runtime_id: "r-1".to_string() });
    let runtime = HostRuntime::new(log, &format!("test-{}", uuid::Uuid::new_v4())).unwrap();
    (runtime, seen)
}

#[tokio::test]
async fn exec_captures_exit_code_and_stdout() {
    let (runtime, seen) = runtime_with_log();

    let result = runtime
        .exec("e-1", &ExecOpts::command("/bin/sh", &["-c", "printf hi"]))
        .await
        .unwrap();
    assert_eq!(result.exit_code, 0);

    let stdout: Vec<u8> = seen
        .lock()
        .iter()
        .filter_map(|e| match &e.payload {
            Payload::Stdout {
                data,
                source: LogSource::Exec { system: false, .. },
            } => Some(data.clone()),
            _ => None,
        })
        .flatten()
        .collect();
    assert_eq!(stdout, b"hi");
    runtime.close().await.unwrap();
}

#[tokio::test]
async fn nonzero_exit_is_a_result_not_an_error() {
    let (runtime, _seen) = runtime_with_log();
    let result = runtime
        .exec("e-1", &ExecOpts::command("/bin/sh", &["-c", "exit 3"]))
        .await
        .unwrap();
    assert_eq!(result.exit_code, 3);
    runtime.close().await.unwrap();
}

#[tokio::test]
async fn spawn_failure_is_an_error() {
    let (runtime, _seen) = runtime_with_log();
    let err = runtime
        .exec("e-1", &ExecOpts::command("/definitely/not/a/binary", &[]))
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutorError::Runtime(_)), "got: {err:?}");
    runtime.close().await.unwrap();
}

#[tokio::test]
async fn env_is_merged_over_host_env() {
    let (runtime, seen) = runtime_with_log();
    let mut opts = ExecOpts::command("/bin/sh", &["-c", "printf \"$KNITA_TEST_VAR:$PATH\""]);
    opts.env = vec!["KNITA_TEST_VAR=hello".to_string()];
    runtime.exec("e-1", &opts).await.unwrap();

    let stdout: Vec<u8> = seen
        .lock()
        .iter()
        .filter_map(|e| match &e.payload {
            Payload::Stdout {
                data,
                source: LogSource::Exec { system: false, .. },
            } => Some(data.clone()),
            _ => None,
        })
        .flatten()
        .collect();
    let out = String::from_utf8(stdout).unwrap();
    assert!(out.starts_with("hello:"), "got: {out}");
    // Host env survives the merge.
    assert!(out.len() > "hello:".len(), "PATH should be inherited: {out}");
    runtime.close().await.unwrap();
}

#[tokio::test]
async fn commands_run_in_the_working_directory() {
    let (runtime, _seen) = runtime_with_log();
    let result = runtime
        .exec(
            "e-1",
            &ExecOpts::command("/bin/sh", &["-c", "printf canary > marker.txt"]),
        )
        .await
        .unwrap();
    assert_eq!(result.exit_code, 0);
    let contents = std::fs::read_to_string(runtime.directory().join("marker.txt")).unwrap();
    assert_eq!(contents, "canary");
    runtime.close().await.unwrap();
}

#[tokio::test]
async fn close_removes_the_working_directory() {
    let (runtime, _seen) = runtime_with_log();
    let dir = runtime.directory().to_path_buf();
    assert!(dir.exists());
    runtime.close().await.unwrap();
    assert!(!dir.exists());
}

#[tokio::test]
async fn system_log_line_precedes_user_output() {
    let (runtime, seen) = runtime_with_log();
    runtime
        .exec("e-1", &ExecOpts::command("/bin/sh", &["-c", "printf out"]))
        .await
        .unwrap();
    let events = seen.lock();
    let system_idx = events.iter().position(|e| {
        matches!(&e.payload, Payload::Stdout { source: LogSource::Exec { system: true, .. }, .. })
    });
    let user_idx = events.iter().position(|e| {
        matches!(&e.payload, Payload::Stdout { source: LogSource::Exec { system: false, .. }, .. })
    });
    assert!(system_idx.unwrap() < user_idx.unwrap());
    runtime.close().await.unwrap();
}
