// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

use super::*;

fn unix_transport(dir: &tempfile::TempDir) -> Transport {
    Transport::Unix {
        socket_path: dir.path().join("knita.sock"),
    }
}

#[tokio::test]
async fn unary_roundtrip_over_unix_socket() {
    let dir = tempfile::tempdir().unwrap();
    let listener = Listener::bind(&unix_transport(&dir)).await.unwrap();
    let client = Client::new(listener.transport().clone());

    let server = tokio::spawn(async move {
        let mut conn = listener.accept().await.unwrap();
        let req: Option<Request> = conn.recv().await.unwrap();
        assert!(matches!(req, Some(Request::Introspect)));
        conn.send(&Response::Ok).await.unwrap();
    });

    let reply = client.unary(&Request::Introspect).await.unwrap();
    assert_eq!(reply, Response::Ok);
    server.await.unwrap();
}

#[tokio::test]
async fn unary_roundtrip_over_tcp() {
    let listener = Listener::bind(&Transport::Tcp {
        address: "127.0.0.1:0".to_string(),
    })
    .await
    .unwrap();
    // The :0 port is resolved to the bound port.
    match listener.transport() {
        Transport::Tcp { address } => assert!(!address.ends_with(":0")),
        other => panic!("unexpected transport: {other:?}"),
    }
    let client = Client::new(listener.transport().clone());

    let server = tokio::spawn(async move {
        let mut conn = listener.accept().await.unwrap();
        let _req: Option<Request> = conn.recv().await.unwrap();
        conn.send(&Response::Ok).await.unwrap();
    });

    let reply = client.unary(&Request::Introspect).await.unwrap();
    assert_eq!(reply, Response::Ok);
    server.await.unwrap();
}

#[tokio::test]
async fn error_frames_surface_as_remote_errors() {
    let dir = tempfile::tempdir().unwrap();
    let listener = Listener::bind(&unix_transport(&dir)).await.unwrap();
    let client = Client::new(listener.transport().clone());

    let server = tokio::spawn(async move {
        let mut conn = listener.accept().await.unwrap();
        let _req: Option<Request> = conn.recv().await.unwrap();
        conn.send_error(ErrorKind::NotFound, "no such runtime").await.unwrap();
    });

    let err = client
        .unary(&Request::Heartbeat { runtime_id: "r-x".to_string() })
        .await
        .unwrap_err();
    match err {
        WireError::Remote { kind, message } => {
            assert_eq!(kind, ErrorKind::NotFound);
            assert_eq!(message, "no such runtime");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    server.await.unwrap();
}

#[tokio::test]
async fn streamed_frames_arrive_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let listener = Listener::bind(&unix_transport(&dir)).await.unwrap();
    let client = Client::new(listener.transport().clone());

    let server = tokio::spawn(async move {
        let mut conn = listener.accept().await.unwrap();
        let _req: Option<Request> = conn.recv().await.unwrap();
        for exit_code in 0..10 {
            conn.send(&Response::ExecResult { exit_code }).await.unwrap();
        }
        // Dropping the connection is the stream terminator.
    });

    let mut conn = client.stream(&Request::Introspect).await.unwrap();
    let mut seen = Vec::new();
    while let Some(frame) = conn.recv::<Response>().await.unwrap() {
        match frame {
            Response::ExecResult { exit_code } => seen.push(exit_code),
            other => panic!("unexpected frame: {other:?}"),
        }
    }
    assert_eq!(seen, (0..10).collect::<Vec<_>>());
    server.await.unwrap();
}

#[tokio::test]
async fn dialing_a_dead_endpoint_fails() {
    let dir = tempfile::tempdir().unwrap();
    let transport = unix_transport(&dir);
    let err = dial(&transport).await.unwrap_err();
    assert!(matches!(err, WireError::Io(_)), "got: {err:?}");
}

#[test]
fn transport_display_forms() {
    let unix = Transport::Unix { socket_path: "/tmp/k.sock".into() };
    assert_eq!(unix.to_string(), "unix:/tmp/k.sock");
    let tcp = Transport::Tcp { address: "127.0.0.1:9091".to_string() };
    assert_eq!(tcp.to_string(), "tcp://127.0.0.1:9091");
}
