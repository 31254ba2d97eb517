// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

//! Standalone executor binary: serves the executor RPC surface over
//! TCP for remote builds.

use clap::{Parser, Subcommand};
use knita_executor::config::ExecutorConfig;
use knita_executor::{Config, Server};
use knita_wire::{Listener, Transport};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "knita-executor", about = "Starts the Knita executor server")]
struct Cli {
    /// Path to the executor config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Prints the Knita version.
    Version,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Some(Command::Version) = cli.command {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return;
    }
    if let Err(e) = run(cli).await {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = ExecutorConfig::load(cli.config.as_deref())?;
    let transport = Transport::Tcp {
        address: config.bind_address.clone(),
    };
    let listener = Listener::bind(&transport).await?;
    tracing::info!(name = %config.name, transport = %listener.transport(), "executor listening");

    let server = Server::new(Config {
        name: config.name,
        labels: config.labels,
    });
    let cancel = CancellationToken::new();
    let serve = {
        let server = server.clone();
        let listener_cancel = cancel.clone();
        tokio::spawn(async move { server.serve(listener, listener_cancel).await })
    };

    shutdown_signal().await;
    tracing::info!("shutting down");
    cancel.cancel();
    server.stop().await;
    let _ = serve.await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut term = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            Ok(term) => term,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                let _ = ctrl_c.await;
                return;
            }
        };
        tokio::select! {
            _ = ctrl_c => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
