// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

use super::*;
use crate::config::{ExecutorsConfig, LocalExecutorConfig, RemoteExecutorConfig};

fn config_with(local_disabled: bool, remotes: &[&str]) -> CliConfig {
    CliConfig {
        executors: ExecutorsConfig {
            local: LocalExecutorConfig {
                disabled: local_disabled,
                labels: Vec::new(),
            },
            remote: remotes
                .iter()
                .map(|address| RemoteExecutorConfig {
                    disabled: false,
                    address: address.to_string(),
                })
                .collect(),
        },
    }
}

#[test]
fn make_log_file_creates_under_the_knita_temp_dir() {
    let now = chrono::Utc::now();
    let path = make_log_file("knita-test-", &now).unwrap();
    assert!(path.exists());
    assert!(path
        .parent()
        .map(|p| p.ends_with("knita"))
        .unwrap_or(false));
    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn broker_defaults_to_local_without_remotes() {
    // Sanity of construction only; behavior is covered by broker and
    // director tests.
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("knita.sock");
    let broker = make_broker(&config_with(false, &[]), &socket);
    // The local broker is unusable until the socket is served; settle
    // still reports the local socket unconditionally.
    let contract = knita_wire::Contract {
        tender_id: "t".to_string(),
        contract_id: "c".to_string(),
        runtime_id: "r".to_string(),
        opts: knita_core::RuntimeOpts::host(),
        executor_info: knita_wire::ExecutorInfo { name: "local".to_string() },
        sys_info: Default::default(),
    };
    let transport = broker.settle(&contract).await.unwrap();
    assert_eq!(transport, Transport::Unix { socket_path: socket });
}

#[tokio::test]
async fn broker_uses_fixed_endpoints_with_remotes() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("knita.sock");
    let broker = make_broker(&config_with(true, &["127.0.0.1:1"]), &socket);
    // Fixed broker with a single dead remote: tenders succeed with no
    // contracts (the endpoint is dropped at init).
    let contracts = broker
        .tender("b", "t", &knita_core::RuntimeOpts::host())
        .await
        .unwrap();
    assert!(contracts.is_empty());
}

#[tokio::test]
async fn end_to_end_shell_pattern_build() {
    // The pattern is a shell script that ignores the injected env and
    // simply succeeds; it proves process launch, env injection, and
    // exit-code propagation.
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("knita.sock");
    let listener = Listener::bind(&Transport::Unix {
        socket_path: socket.clone(),
    })
    .await
    .unwrap();
    let out: Arc<parking_lot::Mutex<Box<dyn Write + Send>>> =
        Arc::new(parking_lot::Mutex::new(Box::new(Vec::new())));

    let result = run_build(
        "build-test",
        &socket,
        listener,
        &config_with(false, &[]),
        dir.path(),
        out,
        &[
            "/bin/sh".to_string(),
            "-c".to_string(),
            "test -n \"$KNITA_SOCKET\" && test \"$KNITA_BUILD_ID\" = build-test".to_string(),
        ],
    )
    .await;
    assert!(result.is_ok(), "got: {result:?}");
}

#[tokio::test]
async fn pattern_exit_code_is_propagated() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("knita.sock");
    let listener = Listener::bind(&Transport::Unix {
        socket_path: socket.clone(),
    })
    .await
    .unwrap();
    let out: Arc<parking_lot::Mutex<Box<dyn Write + Send>>> =
        Arc::new(parking_lot::Mutex::new(Box::new(Vec::new())));

    let err = run_build(
        "build-test",
        &socket,
        listener,
        &config_with(false, &[]),
        dir.path(),
        out,
        &["/bin/sh".to_string(), "-c".to_string(), "exit 7".to_string()],
    )
    .await
    .unwrap_err();
    assert_eq!(err.code, 7);
}
