// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

//! Fixed broker: a static, run-time-configured set of remote
//! executors.

use crate::{BrokerError, BrokerService};
use async_trait::async_trait;
use knita_core::{is_subset, new_id, RuntimeOpts};
use knita_wire::{Client, Contract, Introspection, Request, Response, Transport};
use tokio::sync::OnceCell;

/// One configured executor.
#[derive(Debug, Clone)]
pub struct ExecutorEndpoint {
    pub name: String,
    pub transport: Transport,
}

struct ExecutorState {
    id: String,
    transport: Transport,
    introspection: Introspection,
}

/// Brokers runtimes across well-known executors, dialed and
/// introspected lazily on the first tender. Executors that fail to
/// initialise are dropped with a warning, not fatal.
pub struct FixedBroker {
    endpoints: Vec<ExecutorEndpoint>,
    executors: OnceCell<Vec<ExecutorState>>,
}

impl FixedBroker {
    pub fn new(endpoints: Vec<ExecutorEndpoint>) -> Self {
        Self {
            endpoints,
            executors: OnceCell::new(),
        }
    }

    async fn init(&self) -> Vec<ExecutorState> {
        tracing::info!("initializing executors");
        let mut executors = Vec::new();
        for endpoint in &self.endpoints {
            match Self::init_executor(endpoint).await {
                Ok(state) => {
                    tracing::info!(name = %endpoint.name, "initialized executor");
                    executors.push(state);
                }
                Err(e) => {
                    tracing::warn!(
                        name = %endpoint.name,
                        error = %e,
                        "ignoring error initializing executor; executor will be unavailable to run builds"
                    );
                }
            }
        }
        executors
    }

    async fn init_executor(endpoint: &ExecutorEndpoint) -> Result<ExecutorState, BrokerError> {
        let client = Client::new(endpoint.transport.clone());
        let introspection = match client.unary(&Request::Introspect).await? {
            Response::Introspection(intro) => intro,
            other => {
                return Err(BrokerError::Internal(format!(
                    "unexpected introspection reply: {other:?}"
                )))
            }
        };
        Ok(ExecutorState {
            id: new_id(),
            transport: endpoint.transport.clone(),
            introspection,
        })
    }

    async fn executors(&self) -> &Vec<ExecutorState> {
        self.executors.get_or_init(|| self.init()).await
    }
}

#[async_trait]
impl BrokerService for FixedBroker {
    async fn tender(
        &self,
        _build_id: &str,
        tender_id: &str,
        opts: &RuntimeOpts,
    ) -> Result<Vec<Contract>, BrokerError> {
        tracing::info!(tender_id, "brokering runtime contract");
        let mut contracts = Vec::new();
        // Configuration order, so first-contract selection is stable.
        for executor in self.executors().await {
            if is_subset(&opts.labels, &executor.introspection.labels) {
                // The executor id doubles as the contract id; all a
                // settlement needs is the executor it maps back to.
                contracts.push(Contract {
                    tender_id: tender_id.to_string(),
                    contract_id: executor.id.clone(),
                    runtime_id: new_id(),
                    opts: opts.clone(),
                    executor_info: executor.introspection.executor_info.clone(),
                    sys_info: executor.introspection.sys_info.clone(),
                });
            }
        }
        tracing::info!(tender_id, n_contracts = contracts.len(), "brokered contracts");
        Ok(contracts)
    }

    async fn settle(&self, contract: &Contract) -> Result<Transport, BrokerError> {
        let executor = self
            .executors()
            .await
            .iter()
            .find(|e| e.id == contract.contract_id)
            .ok_or_else(|| {
                BrokerError::NotFound(format!("executor not found for contract {}", contract.contract_id))
            })?;
        tracing::info!(contract_id = %contract.contract_id, "settled contract");
        Ok(executor.transport.clone())
    }
}

#[cfg(test)]
#[path = "fixed_tests.rs"]
mod tests;
