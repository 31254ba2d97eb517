// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

//! The broker RPC contract and its wire adapter.

use crate::BrokerError;
use async_trait::async_trait;
use knita_core::RuntimeOpts;
use knita_wire::{Connection, Contract, Request, Response, Transport, WireError};

/// Tender/Settle, independent of broker strategy.
#[async_trait]
pub trait BrokerService: Send + Sync {
    /// Returns one contract per executor willing to host the runtime.
    async fn tender(
        &self,
        build_id: &str,
        tender_id: &str,
        opts: &RuntimeOpts,
    ) -> Result<Vec<Contract>, BrokerError>;

    /// Exchanges a contract for the transport descriptor of its
    /// executor.
    async fn settle(&self, contract: &Contract) -> Result<Transport, BrokerError>;
}

/// Serves one broker request on a connection; used by hosts that
/// multiplex several services on one listener.
pub async fn serve_request(
    broker: &dyn BrokerService,
    conn: &mut Connection,
    request: Request,
) -> Result<(), WireError> {
    match request {
        Request::Tender { build_id, tender_id, opts } => {
            match broker.tender(&build_id, &tender_id, &opts).await {
                Ok(contracts) => conn.send(&Response::Contracts { contracts }).await,
                Err(e) => conn.send_error(e.kind(), e.to_string()).await,
            }
        }
        Request::Settle { contract } => match broker.settle(&contract).await {
            Ok(transport) => conn.send(&Response::Settlement { transport }).await,
            Err(e) => conn.send_error(e.kind(), e.to_string()).await,
        },
        _ => {
            conn.send_error(
                knita_wire::ErrorKind::InvalidArgument,
                "unsupported method for this service",
            )
            .await
        }
    }
}
