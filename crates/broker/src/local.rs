// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

//! Embedded broker: brokers runtimes onto the CLI's own executor.

use crate::{BrokerError, BrokerService};
use async_trait::async_trait;
use knita_core::{is_subset, new_id, RuntimeOpts};
use knita_wire::{Client, Contract, Request, Response, Transport};
use std::path::PathBuf;

/// Broker over the single executor embedded in the CLI process,
/// reachable on the CLI's own socket.
pub struct LocalBroker {
    socket_path: PathBuf,
}

impl LocalBroker {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    fn transport(&self) -> Transport {
        Transport::Unix {
            socket_path: self.socket_path.clone(),
        }
    }
}

#[async_trait]
impl BrokerService for LocalBroker {
    async fn tender(
        &self,
        _build_id: &str,
        tender_id: &str,
        opts: &RuntimeOpts,
    ) -> Result<Vec<Contract>, BrokerError> {
        tracing::info!(tender_id, "brokering runtime contract");
        let client = Client::new(self.transport());
        let intro = match client.unary(&Request::Introspect).await? {
            Response::Introspection(intro) => intro,
            other => {
                return Err(BrokerError::Internal(format!(
                    "unexpected introspection reply: {other:?}"
                )))
            }
        };
        let mut contracts = Vec::new();
        if is_subset(&opts.labels, &intro.labels) {
            contracts.push(Contract {
                tender_id: tender_id.to_string(),
                contract_id: new_id(),
                runtime_id: new_id(),
                opts: opts.clone(),
                executor_info: intro.executor_info,
                sys_info: intro.sys_info,
            });
        }
        tracing::info!(tender_id, n_contracts = contracts.len(), "brokered contracts");
        Ok(contracts)
    }

    async fn settle(&self, contract: &Contract) -> Result<Transport, BrokerError> {
        tracing::info!(contract_id = %contract.contract_id, "settled contract");
        Ok(self.transport())
    }
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
