// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

//! In-process stack for director tests: executor + broker + director
//! multiplexed on one Unix socket, the way the CLI wires them.

use crate::build::Build;
use crate::server::Server as DirectorServer;
use knita_broker::{serve_request as serve_broker, LocalBroker};
use knita_core::{new_id, Bus, BuildLog, Event, LogSource};
use knita_executor::{Config as ExecutorConfig, Server as ExecutorServer};
use knita_transfer::WorkFs;
use knita_wire::{Client, Listener, Request, Transport};
use parking_lot::Mutex;
use std::sync::Arc;

pub struct Fixture {
    pub build: Arc<Build>,
    pub client: Client,
    pub events: Arc<Mutex<Vec<Event>>>,
    pub work_dir: tempfile::TempDir,
    _socket_dir: tempfile::TempDir,
}

pub async fn start(labels: &[&str]) -> Fixture {
    let socket_dir = tempfile::tempdir().unwrap();
    let work_dir = tempfile::tempdir().unwrap();
    let socket_path = socket_dir.path().join("knita.sock");
    let listener = Listener::bind(&Transport::Unix {
        socket_path: socket_path.clone(),
    })
    .await
    .unwrap();
    let client = Client::new(listener.transport().clone());

    let executor = ExecutorServer::new(ExecutorConfig {
        name: "embedded".to_string(),
        labels: labels.iter().map(|l| l.to_string()).collect(),
    });
    let broker = Arc::new(LocalBroker::new(&socket_path));

    let build_id = new_id();
    let bus = Bus::new();
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let _sub = bus.subscribe(move |e| sink.lock().push(e.clone()));
    let log = BuildLog::new(bus, build_id.clone(), LogSource::Director);
    let build = Arc::new(Build::new(
        build_id,
        client.clone(),
        log,
        WorkFs::new(work_dir.path()),
    ));
    let director = Arc::new(DirectorServer::new(build.clone()));

    {
        let executor = executor.clone();
        let broker = broker.clone();
        let director = director.clone();
        tokio::spawn(async move {
            loop {
                let Ok(mut conn) = listener.accept().await else { return };
                let executor = executor.clone();
                let broker = broker.clone();
                let director = director.clone();
                tokio::spawn(async move {
                    let request = match conn.recv::<Request>().await {
                        Ok(Some(request)) => request,
                        _ => return,
                    };
                    match request {
                        r @ (Request::Tender { .. } | Request::Settle { .. }) => {
                            let _ = serve_broker(broker.as_ref(), &mut conn, r).await;
                        }
                        r @ (Request::DirectorOpen { .. }
                        | Request::DirectorExec { .. }
                        | Request::DirectorImport { .. }
                        | Request::DirectorExport { .. }
                        | Request::DirectorClose { .. }) => {
                            let _ = director.serve_request(&mut conn, r).await;
                        }
                        r => executor.serve_request(&mut conn, r).await,
                    }
                });
            }
        });
    }

    Fixture {
        build,
        client,
        events,
        work_dir,
        _socket_dir: socket_dir,
    }
}
