// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

//! Per-build orchestration: tender, settle, dial, open.

use crate::runtime::RuntimeHandle;
use crate::DirectorError;
use knita_core::{new_id, BuildLog, Payload, RuntimeOpts, Status};
use knita_transfer::WorkFs;
use knita_wire::{Client, Contract, Request, Response, Transport};
use std::sync::Arc;

/// One build: owns the build log and acquires runtimes via the broker.
pub struct Build {
    build_id: String,
    broker: Client,
    log: BuildLog,
    local_fs: WorkFs,
}

impl Build {
    pub fn new(build_id: impl Into<String>, broker: Client, log: BuildLog, local_fs: WorkFs) -> Self {
        Self {
            build_id: build_id.into(),
            broker,
            log,
            local_fs,
        }
    }

    pub fn build_id(&self) -> &str {
        &self.build_id
    }

    pub fn log(&self) -> &BuildLog {
        &self.log
    }

    /// Runs `work`, bracketed by BuildStart/BuildEnd events.
    pub async fn run<F, T, E>(&self, work: F) -> Result<T, E>
    where
        F: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.log.publish(Payload::BuildStart {
            build_id: self.build_id.clone(),
        });
        let result = work.await;
        self.log.publish(Payload::BuildEnd {
            build_id: self.build_id.clone(),
            status: Status::from_result(&result),
        });
        result
    }

    /// The full open dance: tender, settle, dial, attach events, open.
    /// Every sub-step publishes paired start/end events; a failure
    /// publishes its End{Error} and aborts.
    pub async fn open_runtime(&self, opts: RuntimeOpts) -> Result<Arc<RuntimeHandle>, DirectorError> {
        tracing::info!(build_id = %self.build_id, "tendering runtime");
        let contracts = self.tender(&opts).await?;
        // The broker returns all bidders; take the first contract.
        let contract = contracts
            .first()
            .cloned()
            .ok_or(DirectorError::NoExecutorAvailable)?;
        tracing::info!(contract_id = %contract.contract_id, "selected runtime contract");

        let transport = self.settle(&contract).await?;
        tracing::info!(contract_id = %contract.contract_id, "settled runtime contract");
        self.log.print(selection_report(&contracts, &contract, &transport));

        let handle = RuntimeHandle::open(
            self.log.clone(),
            &self.build_id,
            contract.runtime_id.clone(),
            Client::new(transport),
            self.local_fs.clone(),
            contract.opts.clone(),
        )
        .await?;
        Ok(Arc::new(handle))
    }

    async fn tender(&self, opts: &RuntimeOpts) -> Result<Vec<Contract>, DirectorError> {
        let tender_id = new_id();
        self.log.publish(Payload::RuntimeTenderStart {
            tender_id: tender_id.clone(),
            opts: opts.clone(),
        });
        let result = self.tender_inner(&tender_id, opts).await;
        self.log.publish(Payload::RuntimeTenderEnd {
            tender_id,
            status: Status::from_result(&result),
        });
        result
    }

    async fn tender_inner(
        &self,
        tender_id: &str,
        opts: &RuntimeOpts,
    ) -> Result<Vec<Contract>, DirectorError> {
        let reply = self
            .broker
            .unary(&Request::Tender {
                build_id: self.build_id.clone(),
                tender_id: tender_id.to_string(),
                opts: opts.clone(),
            })
            .await?;
        let contracts = match reply {
            Response::Contracts { contracts } => contracts,
            other => return Err(DirectorError::UnexpectedReply(format!("{other:?}"))),
        };
        if contracts.is_empty() {
            return Err(DirectorError::NoExecutorAvailable);
        }
        Ok(contracts)
    }

    async fn settle(&self, contract: &Contract) -> Result<Transport, DirectorError> {
        self.log.publish(Payload::RuntimeSettlementStart {
            tender_id: contract.tender_id.clone(),
            contract_id: contract.contract_id.clone(),
            runtime_id: contract.runtime_id.clone(),
        });
        let result = self.settle_inner(contract).await;
        self.log.publish(Payload::RuntimeSettlementEnd {
            tender_id: contract.tender_id.clone(),
            contract_id: contract.contract_id.clone(),
            runtime_id: contract.runtime_id.clone(),
            status: Status::from_result(&result),
        });
        result
    }

    async fn settle_inner(&self, contract: &Contract) -> Result<Transport, DirectorError> {
        let reply = self
            .broker
            .unary(&Request::Settle {
                contract: contract.clone(),
            })
            .await?;
        match reply {
            Response::Settlement { transport } => Ok(transport),
            other => Err(DirectorError::UnexpectedReply(format!("{other:?}"))),
        }
    }
}

/// Concise report of the tender results for the build log.
fn selection_report(contracts: &[Contract], selected: &Contract, transport: &Transport) -> String {
    let name = selected
        .opts
        .tags
        .get("name")
        .cloned()
        .unwrap_or_else(|| selected.tender_id.clone());
    let requires = selected.opts.labels.join(",");
    let mut report = format!(
        "Eligible Executors for Runtime: {} (type={}, requires={})\n",
        name, selected.opts.runtime_type, requires
    );
    for contract in contracts {
        report.push_str(&format!(
            "  {} (os={}, arch={}, cpu={}, memory={})\n",
            contract.executor_info.name,
            contract.sys_info.os,
            contract.sys_info.arch,
            contract.sys_info.total_cpu_cores,
            contract.sys_info.total_memory,
        ));
    }
    report.push_str(&format!(
        "Selected Executor: {} ({})",
        selected.executor_info.name, transport
    ));
    report
}

#[cfg(test)]
#[path = "build_tests.rs"]
mod tests;
