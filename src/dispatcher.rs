use crate::client::ChainClient;
use crate::config::BatchConfig;
use crate::keys::{KeyError, KeySource, derive_signer};
use crate::operations::{OperationError, Operations};
use crate::recipient::select_recipient;
use crate::types::{
    Amount, CycleReport, OperationKind, OperationResult, OperationStatus, RunReport,
};
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use rand::Rng;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Errors that end a run.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no private keys found in {0}")]
    EmptyKeyList(String),
    #[error(transparent)]
    Keys(#[from] KeyError),
    #[error("no cycle completed in {passes} consecutive passes over the key list")]
    Stalled { passes: u32 },
}

/// A fatal error together with the cycles completed before it.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct Aborted {
    pub error: DispatchError,
    pub report: RunReport,
}

/// Drives key cycles until `tx_count` of them have been attempted.
pub struct Dispatcher<'a, C: ?Sized, K: ?Sized> {
    client: &'a C,
    keys: &'a K,
    config: &'a BatchConfig,
}

impl<'a, C, K> Dispatcher<'a, C, K>
where
    C: ChainClient + ?Sized,
    K: KeySource + ?Sized,
{
    pub fn new(client: &'a C, keys: &'a K, config: &'a BatchConfig) -> Self {
        Self {
            client,
            keys,
            config,
        }
    }

    pub async fn run<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<RunReport, Aborted> {
        let mut report = RunReport::default();
        match self.drive(rng, &mut report).await {
            Ok(()) => Ok(report),
            Err(error) => Err(Aborted { error, report }),
        }
    }

    async fn drive<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        report: &mut RunReport,
    ) -> Result<(), DispatchError> {
        let tx_count = self.config.tx_count;
        let mut idle_passes = 0u32;

        while report.executed < tx_count {
            // The key list may change between passes.
            let keys = self.keys.load()?;
            if keys.is_empty() {
                error!("No private keys found in {}", self.keys.describe());
                return Err(DispatchError::EmptyKeyList(self.keys.describe()));
            }
            report.passes += 1;
            let executed_before = report.executed;

            for key in &keys {
                if report.executed >= tx_count {
                    break;
                }

                let signer = match derive_signer(key) {
                    Ok(signer) => signer,
                    Err(e) => {
                        warn!("Skipping key: {}", e);
                        report.skipped_keys += 1;
                        continue;
                    }
                };
                let sender = signer.address();

                let recipient = match select_recipient(self.client, rng).await {
                    Ok(recipient) => recipient,
                    Err(e) => {
                        warn!("No recipient found for {}: {}", sender, e);
                        report.skipped_keys += 1;
                        continue;
                    }
                };

                let amount = Amount::sample(rng, self.config.amount_min, self.config.amount_max);
                let cycle = report.executed + 1;
                info!("--- TX {}/{} --- {} -> {}", cycle, tx_count, sender, recipient);

                let cycle_report = self
                    .run_cycle(cycle, &signer, recipient, amount, rng)
                    .await;
                report.cycles.push(cycle_report);
                report.executed += 1;
                info!("Progress: {}/{} cycles completed", report.executed, tx_count);

                if report.executed < tx_count {
                    sleep(self.config.pacing).await;
                }
            }

            if report.executed > executed_before {
                idle_passes = 0;
                continue;
            }
            idle_passes += 1;
            warn!(
                "Pass {} over {} keys completed no cycle",
                report.passes,
                keys.len()
            );
            if let Some(limit) = self.config.max_idle_passes {
                if idle_passes >= limit {
                    return Err(DispatchError::Stalled {
                        passes: idle_passes,
                    });
                }
            }
        }

        Ok(())
    }

    /// Runs the four operations for one key. Every failure stays inside the cycle.
    async fn run_cycle<R: Rng + ?Sized>(
        &self,
        cycle: u64,
        signer: &PrivateKeySigner,
        recipient: Address,
        amount: Amount,
        rng: &mut R,
    ) -> CycleReport {
        let ops = Operations::new(
            self.client,
            &self.config.artifacts,
            self.config.fees,
            self.config.receipts,
        );
        let mut operations = Vec::with_capacity(OperationKind::ALL.len());

        let native = ops.send_native(signer, recipient, amount).await;
        operations.push(outcome(
            OperationKind::NativeTransfer,
            native.map(OperationStatus::Submitted),
        ));

        // The write targets the contract deployed in this same cycle.
        let (deploy, write) = match ops.deploy_contract(signer).await {
            Ok(deployment) => {
                let deploy = OperationResult {
                    kind: OperationKind::Deploy,
                    status: OperationStatus::Deployed {
                        tx_hash: deployment.tx_hash,
                        address: deployment.address,
                    },
                };
                let value = rng.gen_range(1..=100);
                let write = outcome(
                    OperationKind::ContractWrite,
                    ops.write_contract(signer, deployment.address, value)
                        .await
                        .map(OperationStatus::Submitted),
                );
                (deploy, write)
            }
            Err(e) => (
                outcome(OperationKind::Deploy, Err(e)),
                OperationResult {
                    kind: OperationKind::ContractWrite,
                    status: OperationStatus::Skipped,
                },
            ),
        };
        operations.push(deploy);
        operations.push(write);

        let token = ops
            .send_token(signer, self.config.token_address, recipient, amount)
            .await;
        operations.push(outcome(
            OperationKind::TokenTransfer,
            token.map(OperationStatus::Submitted),
        ));

        CycleReport {
            cycle,
            sender: signer.address(),
            recipient,
            amount,
            operations,
        }
    }
}

fn outcome(
    kind: OperationKind,
    result: Result<OperationStatus, OperationError>,
) -> OperationResult {
    let status = match result {
        Ok(status) => status,
        Err(e) => {
            warn!("[{}] failed: {}", kind, e);
            OperationStatus::Failed(e.to_string())
        }
    };
    OperationResult { kind, status }
}
