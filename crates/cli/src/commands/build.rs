// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

//! `knita build <pattern-command> [args…]`
//!
//! Hosts the in-process executor, broker, and director on a Unix
//! socket, launches the pattern subprocess with `KNITA_SOCKET` and
//! `KNITA_BUILD_ID` set, and fans the build log out to stdout
//! (verbose) or a log file.

use crate::config::CliConfig;
use crate::exit_error::ExitError;
use anyhow::Context;
use knita_broker::{
    serve_request as serve_broker, BrokerService, ExecutorEndpoint, FixedBroker, LocalBroker,
};
use knita_core::{new_id, Bus, BuildLog, LogSource, Payload};
use knita_director::{Build, Server as DirectorServer};
use knita_executor::{Config as ExecutorConfig, Server as ExecutorServer};
use knita_transfer::WorkFs;
use knita_wire::{Listener, Request, Transport};
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

pub async fn run(config_path: Option<&Path>, verbose: bool, pattern: &[String]) -> Result<(), ExitError> {
    let now = chrono::Utc::now();
    let build_id = new_id();

    // A non-terminal stdout always gets the raw build log.
    let verbose = verbose || !std::io::stdout().is_terminal();

    let director_log_path =
        make_log_file("knita-", &now).context("failed to create log file")?;
    let file_appender = tracing_appender::rolling::never(
        director_log_path.parent().unwrap_or(Path::new(".")),
        director_log_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "knita.log".into()),
    );
    let (writer, _guard) = tracing_appender::non_blocking(file_appender);
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "debug".into()))
        .with_writer(writer)
        .with_ansi(false)
        .try_init();

    let work = std::env::current_dir().context("failed to get current working directory")?;
    tracing::info!(directory = %work.display(), "working directory");

    let config = CliConfig::load(config_path).map_err(ExitError::from)?;

    // Build output goes to stdout in verbose mode, to a file otherwise.
    let build_log_path = if verbose {
        None
    } else {
        Some(make_log_file("knita-build-", &now).context("failed to create build log file")?)
    };
    let build_out: Arc<parking_lot::Mutex<Box<dyn Write + Send>>> = match &build_log_path {
        None => Arc::new(parking_lot::Mutex::new(Box::new(std::io::stdout()))),
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .write(true)
                .open(path)
                .with_context(|| format!("failed to open build log {}", path.display()))?;
            Arc::new(parking_lot::Mutex::new(Box::new(file)))
        }
    };

    let socket_path = std::env::temp_dir().join(format!("knita-cli-{build_id}.socket"));
    let listener = Listener::bind(&Transport::Unix {
        socket_path: socket_path.clone(),
    })
    .await
    .context("failed to listen on unix socket")?;

    let result = run_build(
        &build_id,
        &socket_path,
        listener,
        &config,
        &work,
        build_out,
        pattern,
    )
    .await;

    let _ = std::fs::remove_file(&socket_path);
    if let Some(path) = &build_log_path {
        println!("\nBuild log available at: {}", path.display());
    }
    result
}

async fn run_build(
    build_id: &str,
    socket_path: &Path,
    listener: Listener,
    config: &CliConfig,
    work: &Path,
    build_out: Arc<parking_lot::Mutex<Box<dyn Write + Send>>>,
    pattern: &[String],
) -> Result<(), ExitError> {
    let client = knita_wire::Client::new(listener.transport().clone());

    let executor = if config.executors.local.disabled {
        None
    } else {
        Some(ExecutorServer::new(ExecutorConfig {
            name: "local".to_string(),
            labels: config.executors.local.labels.clone(),
        }))
    };
    let broker = make_broker(config, socket_path);

    let bus = Bus::new();
    let build_out_sub = build_out.clone();
    let _fanout = bus.subscribe(move |event| match &event.payload {
        Payload::Stdout { data, .. } | Payload::Stderr { data, .. } => {
            let mut out = build_out_sub.lock();
            let _ = out.write_all(data);
            let _ = out.flush();
        }
        _ => {}
    });

    let log = BuildLog::new(bus, build_id, LogSource::Director);
    let build = Arc::new(Build::new(
        build_id,
        client,
        log.clone(),
        WorkFs::new(work),
    ));
    let director = Arc::new(DirectorServer::new(build.clone()));

    let cancel = CancellationToken::new();
    let accept_loop = spawn_services(
        listener,
        executor.clone(),
        broker,
        director.clone(),
        cancel.clone(),
    );

    let pattern_result = build
        .run(launch_pattern(socket_path, build_id, pattern, &log))
        .await;

    director.close_all().await;
    if let Some(executor) = &executor {
        executor.stop().await;
    }
    cancel.cancel();
    let _ = accept_loop.await;

    match pattern_result {
        Ok(0) => Ok(()),
        Ok(code) => Err(ExitError::silent(code)),
        Err(e) => Err(ExitError::fatal(format!("error running command: {e:#}"))),
    }
}

/// Local broker unless remote executors are configured; with remotes,
/// a fixed broker over every enabled endpoint (embedded one included).
fn make_broker(config: &CliConfig, socket_path: &Path) -> Arc<dyn BrokerService> {
    let remotes: Vec<ExecutorEndpoint> = config
        .executors
        .remote
        .iter()
        .filter(|r| !r.disabled && !r.address.is_empty())
        .map(|r| ExecutorEndpoint {
            name: r.address.clone(),
            transport: Transport::Tcp {
                address: r.address.clone(),
            },
        })
        .collect();
    if remotes.is_empty() && !config.executors.local.disabled {
        return Arc::new(LocalBroker::new(socket_path));
    }
    let mut endpoints = Vec::new();
    if !config.executors.local.disabled {
        endpoints.push(ExecutorEndpoint {
            name: "local".to_string(),
            transport: Transport::Unix {
                socket_path: socket_path.to_path_buf(),
            },
        });
    }
    endpoints.extend(remotes);
    Arc::new(FixedBroker::new(endpoints))
}

/// Accept loop multiplexing the three services on the CLI socket.
fn spawn_services(
    listener: Listener,
    executor: Option<ExecutorServer>,
    broker: Arc<dyn BrokerService>,
    director: Arc<DirectorServer>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let mut conn = tokio::select! {
                _ = cancel.cancelled() => return,
                accepted = listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::error!(error = %e, "accept error");
                        continue;
                    }
                },
            };
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
                        if let Err(e) = serve_broker(broker.as_ref(), &mut conn, r).await {
                            tracing::debug!(error = %e, "broker connection error");
                        }
                    }
                    r @ (Request::DirectorOpen { .. }
                    | Request::DirectorExec { .. }
                    | Request::DirectorImport { .. }
                    | Request::DirectorExport { .. }
                    | Request::DirectorClose { .. }) => {
                        if let Err(e) = director.serve_request(&mut conn, r).await {
                            tracing::debug!(error = %e, "director connection error");
                        }
                    }
                    r => match &executor {
                        Some(executor) => executor.serve_request(&mut conn, r).await,
                        None => {
                            let _ = conn
                                .send_error(
                                    knita_wire::ErrorKind::InvalidArgument,
                                    "local executor is disabled",
                                )
                                .await;
                        }
                    },
                }
            });
        }
    })
}

/// Runs the pattern subprocess with the director socket injected,
/// pumping its output into the build log. Returns the exit code.
async fn launch_pattern(
    socket_path: &Path,
    build_id: &str,
    pattern: &[String],
    log: &BuildLog,
) -> Result<i32, anyhow::Error> {
    let (name, args) = pattern
        .split_first()
        .context("empty pattern command")?;
    let mut cmd = tokio::process::Command::new(name);
    cmd.args(args)
        .env("KNITA_SOCKET", socket_path)
        .env("KNITA_BUILD_ID", build_id)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = cmd
        .spawn()
        .with_context(|| format!("failed to launch pattern {name}"))?;

    let mut pumps = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        pumps.push(pump_output(stdout, log.clone(), false));
    }
    if let Some(stderr) = child.stderr.take() {
        pumps.push(pump_output(stderr, log.clone(), true));
    }
    let status = child.wait().await.context("failed waiting for pattern")?;
    for pump in pumps {
        let _ = pump.await;
    }
    Ok(status.code().unwrap_or(1))
}

fn pump_output<R>(
    mut reader: R,
    log: BuildLog,
    stderr: bool,
) -> tokio::task::JoinHandle<()>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = [0u8; 4096];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => {
                    if stderr {
                        log.stderr(buf[..n].to_vec());
                    } else {
                        log.stdout(buf[..n].to_vec());
                    }
                }
            }
        }
    })
}

/// `${TMPDIR}/knita/<prefix><timestamp>.log`, created empty.
fn make_log_file(prefix: &str, now: &chrono::DateTime<chrono::Utc>) -> anyhow::Result<PathBuf> {
    let dir = std::env::temp_dir().join("knita");
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create log directory {}", dir.display()))?;
    let stamp = now.format("%Y%m%dT%H%M%SZ");
    let path = dir.join(format!("{prefix}{stamp}.log"));
    std::fs::File::create(&path)
        .with_context(|| format!("failed to create log file {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
#[path = "build_tests.rs"]
mod tests;
