use crate::artifacts::{ArtifactError, ArtifactPaths, IERC20, ISimpleStorage};
use crate::client::{ChainClient, ClientError, ReceiptSummary};
use crate::types::{Amount, FeeParams, OperationKind, TxIntent};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, B256, Bytes, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::SolCall;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum OperationError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error("failed to sign transaction: {0}")]
    Signing(String),
    #[error("failed to decode call result: {0}")]
    Decode(#[from] alloy::sol_types::Error),
    #[error("amount {amount} does not fit {decimals} decimals")]
    AmountOverflow { amount: Amount, decimals: u8 },
    #[error("transaction {0} reverted")]
    Reverted(B256),
    #[error("receipt for {0} has no contract address")]
    MissingContractAddress(B256),
    #[error("no receipt for {tx_hash} after {timeout:?}")]
    ReceiptTimeout { tx_hash: B256, timeout: Duration },
}

/// How long to wait for a receipt, and how often to ask.
#[derive(Debug, Clone, Copy)]
pub struct ReceiptPolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ReceiptPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            poll_interval: Duration::from_secs(1),
        }
    }
}

struct Submission {
    tx_hash: B256,
    receipt: Option<ReceiptSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deployment {
    pub tx_hash: B256,
    pub address: Address,
}

/// Builds, signs and broadcasts the four operation kinds for one sender.
pub struct Operations<'a, C: ?Sized> {
    client: &'a C,
    artifacts: &'a ArtifactPaths,
    fees: FeeParams,
    receipts: ReceiptPolicy,
}

impl<'a, C> Operations<'a, C>
where
    C: ChainClient + ?Sized,
{
    pub fn new(
        client: &'a C,
        artifacts: &'a ArtifactPaths,
        fees: FeeParams,
        receipts: ReceiptPolicy,
    ) -> Self {
        Self {
            client,
            artifacts,
            fees,
            receipts,
        }
    }

    pub async fn send_native(
        &self,
        signer: &PrivateKeySigner,
        recipient: Address,
        amount: Amount,
    ) -> Result<B256, OperationError> {
        let value = amount.to_wei().ok_or(OperationError::AmountOverflow {
            amount,
            decimals: 18,
        })?;
        let intent = self
            .intent(
                OperationKind::NativeTransfer,
                signer,
                Some(recipient),
                Some(value),
                Bytes::new(),
            )
            .await?;
        let tx_hash = self.submit(signer, intent).await?.tx_hash;
        info!("Sent {} native to {} | tx {}", amount, recipient, tx_hash);
        Ok(tx_hash)
    }

    /// Deploys the storage contract and blocks until its receipt is available.
    pub async fn deploy_contract(
        &self,
        signer: &PrivateKeySigner,
    ) -> Result<Deployment, OperationError> {
        let bytecode = self.artifacts.load_storage_deployment()?;
        let intent = self
            .intent(OperationKind::Deploy, signer, None, None, bytecode)
            .await?;
        let Submission { tx_hash, receipt } = self.submit(signer, intent).await?;
        let receipt = receipt.ok_or(OperationError::ReceiptTimeout {
            tx_hash,
            timeout: self.receipts.timeout,
        })?;
        if !receipt.success {
            return Err(OperationError::Reverted(tx_hash));
        }
        let address = receipt
            .contract_address
            .ok_or(OperationError::MissingContractAddress(tx_hash))?;

        info!(
            "Contract deployed at {} in block {:?} | tx {}",
            address, receipt.block_number, tx_hash
        );
        Ok(Deployment { tx_hash, address })
    }

    /// Calls `store(value)` on a freshly deployed storage contract.
    pub async fn write_contract(
        &self,
        signer: &PrivateKeySigner,
        contract: Address,
        value: u64,
    ) -> Result<B256, OperationError> {
        self.artifacts.check_storage_abi()?;
        let input = ISimpleStorage::storeCall {
            num: U256::from(value),
        }
        .abi_encode();
        let intent = self
            .intent(
                OperationKind::ContractWrite,
                signer,
                Some(contract),
                None,
                input.into(),
            )
            .await?;
        let tx_hash = self.submit(signer, intent).await?.tx_hash;
        info!("Stored {} in {} | tx {}", value, contract, tx_hash);
        Ok(tx_hash)
    }

    pub async fn send_token(
        &self,
        signer: &PrivateKeySigner,
        token: Address,
        recipient: Address,
        amount: Amount,
    ) -> Result<B256, OperationError> {
        self.artifacts.check_erc20()?;
        let decimals = self.token_decimals(token).await?;
        let scaled = amount
            .scale(decimals)
            .ok_or(OperationError::AmountOverflow { amount, decimals })?;

        let input = IERC20::transferCall {
            to: recipient,
            amount: scaled,
        }
        .abi_encode();
        let intent = self
            .intent(
                OperationKind::TokenTransfer,
                signer,
                Some(token),
                None,
                input.into(),
            )
            .await?;
        let tx_hash = self.submit(signer, intent).await?.tx_hash;
        info!(
            "Sent {} tokens ({} base units) to {} | tx {}",
            amount, scaled, recipient, tx_hash
        );
        Ok(tx_hash)
    }

    async fn token_decimals(&self, token: Address) -> Result<u8, OperationError> {
        let data = IERC20::decimalsCall {}.abi_encode();
        let output = self.client.call(token, data.into()).await?;
        Ok(IERC20::decimalsCall::abi_decode_returns(&output)?)
    }

    async fn intent(
        &self,
        kind: OperationKind,
        signer: &PrivateKeySigner,
        to: Option<Address>,
        value: Option<U256>,
        input: Bytes,
    ) -> Result<TxIntent, OperationError> {
        let from = signer.address();
        let nonce = self.client.get_transaction_count(from).await?;
        let chain_id = self.client.chain_id().await?;
        Ok(TxIntent {
            kind,
            from,
            to,
            value,
            input,
            nonce,
            chain_id,
            fees: self.fees,
        })
    }

    /// Signs and broadcasts. Kinds that await a receipt also block until it arrives.
    async fn submit(
        &self,
        signer: &PrivateKeySigner,
        intent: TxIntent,
    ) -> Result<Submission, OperationError> {
        debug!(
            "{} intent from {} with nonce {} and gas limit {}",
            intent.kind,
            intent.from,
            intent.nonce,
            intent.gas_limit()
        );
        let awaits_receipt = intent.kind.awaits_receipt();

        let wallet = EthereumWallet::from(signer.clone());
        let envelope = intent
            .into_request()
            .build(&wallet)
            .await
            .map_err(|e| OperationError::Signing(e.to_string()))?;

        let raw: Bytes = envelope.encoded_2718().into();
        let tx_hash = self.client.send_raw_transaction(raw).await?;

        let receipt = if awaits_receipt {
            debug!("Broadcast {}, waiting for receipt", tx_hash);
            Some(self.wait_for_receipt(tx_hash).await?)
        } else {
            None
        };
        Ok(Submission { tx_hash, receipt })
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<ReceiptSummary, OperationError> {
        let deadline = Instant::now() + self.receipts.timeout;

        loop {
            match self.client.get_transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => return Ok(receipt),
                Ok(None) => {}
                Err(e) => warn!("Error checking receipt for {}: {}", tx_hash, e),
            }

            if Instant::now() >= deadline {
                return Err(OperationError::ReceiptTimeout {
                    tx_hash,
                    timeout: self.receipts.timeout,
                });
            }
            sleep(self.receipts.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::test_utils::write_artifacts;
    use crate::client::MockChainClient;
    use alloy::consensus::{Transaction, TxEnvelope};
    use alloy::eips::eip2718::Decodable2718;
    use alloy::primitives::keccak256;
    use std::sync::{Arc, Mutex};

    const ANVIL_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn signer() -> PrivateKeySigner {
        ANVIL_KEY.parse().unwrap()
    }

    fn fast_receipts() -> ReceiptPolicy {
        ReceiptPolicy {
            timeout: Duration::from_millis(50),
            poll_interval: Duration::from_millis(1),
        }
    }

    /// Mock that accepts any broadcast and records the decoded envelopes.
    fn recording_client(nonce: u64) -> (MockChainClient, Arc<Mutex<Vec<TxEnvelope>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let log = sent.clone();
        let mut client = MockChainClient::new();
        client
            .expect_get_transaction_count()
            .returning(move |_| Ok(nonce));
        client.expect_chain_id().returning(|| Ok(31337));
        client.expect_send_raw_transaction().returning(move |raw| {
            let envelope = TxEnvelope::decode_2718(&mut raw.as_ref()).unwrap();
            log.lock().unwrap().push(envelope);
            Ok(keccak256(&raw))
        });
        (client, sent)
    }

    #[tokio::test]
    async fn native_transfer_carries_value_and_fixed_fees() {
        let (_dir, artifacts) = write_artifacts();
        let (client, sent) = recording_client(7);
        let ops = Operations::new(&client, &artifacts, FeeParams::default(), fast_receipts());

        let recipient = Address::repeat_byte(0xaa);
        ops.send_native(&signer(), recipient, Amount::from_micros(10_000))
            .await
            .unwrap();

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let tx = &sent[0];
        assert!(matches!(tx, TxEnvelope::Eip1559(_)));
        assert_eq!(tx.to(), Some(recipient));
        assert_eq!(tx.value(), U256::from(10_000_000_000_000_000u128));
        assert_eq!(tx.gas_limit(), 21_000);
        assert_eq!(tx.nonce(), 7);
        assert_eq!(tx.chain_id(), Some(31337));
        assert_eq!(tx.max_fee_per_gas(), 3_000_000_000);
        assert_eq!(tx.max_priority_fee_per_gas(), Some(1_000_000_000));
        assert!(tx.input().is_empty());
    }

    #[tokio::test]
    async fn deploy_waits_for_receipt_and_returns_address() {
        let (_dir, artifacts) = write_artifacts();
        let (mut client, sent) = recording_client(0);
        let deployed = Address::repeat_byte(0xcc);
        let mut polls = 0;
        client
            .expect_get_transaction_receipt()
            .times(3)
            .returning(move |_| {
                polls += 1;
                if polls < 3 {
                    return Ok(None);
                }
                Ok(Some(ReceiptSummary {
                    success: true,
                    contract_address: Some(deployed),
                    block_number: Some(1),
                }))
            });
        let ops = Operations::new(&client, &artifacts, FeeParams::default(), fast_receipts());

        let deployment = ops.deploy_contract(&signer()).await.unwrap();
        assert_eq!(deployment.address, deployed);

        let sent = sent.lock().unwrap();
        assert_eq!(sent[0].to(), None);
        assert_eq!(sent[0].gas_limit(), 1_500_000);
    }

    #[tokio::test]
    async fn reverted_deploy_is_an_error() {
        let (_dir, artifacts) = write_artifacts();
        let (mut client, _) = recording_client(0);
        client.expect_get_transaction_receipt().returning(|_| {
            Ok(Some(ReceiptSummary {
                success: false,
                contract_address: None,
                block_number: Some(1),
            }))
        });
        let ops = Operations::new(&client, &artifacts, FeeParams::default(), fast_receipts());

        let result = ops.deploy_contract(&signer()).await;
        assert!(matches!(result, Err(OperationError::Reverted(_))));
    }

    #[tokio::test]
    async fn deploy_times_out_without_receipt() {
        let (_dir, artifacts) = write_artifacts();
        let (mut client, _) = recording_client(0);
        client
            .expect_get_transaction_receipt()
            .returning(|_| Ok(None));
        let ops = Operations::new(&client, &artifacts, FeeParams::default(), fast_receipts());

        let result = ops.deploy_contract(&signer()).await;
        assert!(matches!(result, Err(OperationError::ReceiptTimeout { .. })));
    }

    #[tokio::test]
    async fn missing_bytecode_fails_before_any_rpc() {
        let (_dir, artifacts) = write_artifacts();
        std::fs::remove_file(&artifacts.storage_bytecode).unwrap();
        let client = MockChainClient::new();
        let ops = Operations::new(&client, &artifacts, FeeParams::default(), fast_receipts());

        let result = ops.deploy_contract(&signer()).await;
        assert!(matches!(result, Err(OperationError::Artifact(_))));
    }

    #[tokio::test]
    async fn contract_write_encodes_store_call() {
        let (_dir, artifacts) = write_artifacts();
        let (client, sent) = recording_client(3);
        let ops = Operations::new(&client, &artifacts, FeeParams::default(), fast_receipts());

        let contract = Address::repeat_byte(0xcc);
        ops.write_contract(&signer(), contract, 42).await.unwrap();

        let sent = sent.lock().unwrap();
        let tx = &sent[0];
        assert_eq!(tx.to(), Some(contract));
        assert_eq!(tx.gas_limit(), 100_000);
        let call = ISimpleStorage::storeCall::abi_decode(tx.input()).unwrap();
        assert_eq!(call.num, U256::from(42));
    }

    #[tokio::test]
    async fn token_transfer_scales_by_queried_decimals() {
        let (_dir, artifacts) = write_artifacts();
        let (mut client, sent) = recording_client(0);
        let token = Address::repeat_byte(0xee);
        client.expect_call().times(1).returning(move |to, data| {
            assert_eq!(to, token);
            assert_eq!(&data[..4], IERC20::decimalsCall::SELECTOR.as_slice());
            Ok(Bytes::from(U256::from(2u8).to_be_bytes::<32>().to_vec()))
        });
        let ops = Operations::new(&client, &artifacts, FeeParams::default(), fast_receipts());

        let recipient = Address::repeat_byte(0xaa);
        ops.send_token(&signer(), token, recipient, Amount::from_micros(1_239_999))
            .await
            .unwrap();

        let sent = sent.lock().unwrap();
        let tx = &sent[0];
        assert_eq!(tx.to(), Some(token));
        let call = IERC20::transferCall::abi_decode(tx.input()).unwrap();
        assert_eq!(call.to, recipient);
        assert_eq!(call.amount, U256::from(123u64));
    }

    #[tokio::test]
    async fn token_transfer_checks_abi_before_any_rpc() {
        let (_dir, artifacts) = write_artifacts();
        std::fs::write(&artifacts.erc20_abi, "[]").unwrap();
        let client = MockChainClient::new();
        let ops = Operations::new(&client, &artifacts, FeeParams::default(), fast_receipts());

        let result = ops
            .send_token(
                &signer(),
                Address::repeat_byte(0xee),
                Address::repeat_byte(0xaa),
                Amount::from_micros(1),
            )
            .await;
        assert!(matches!(
            result,
            Err(OperationError::Artifact(ArtifactError::MissingEntryPoint { .. }))
        ));
    }

    #[tokio::test]
    async fn broadcast_failure_is_returned() {
        let (_dir, artifacts) = write_artifacts();
        let mut client = MockChainClient::new();
        client.expect_get_transaction_count().returning(|_| Ok(0));
        client.expect_chain_id().returning(|| Ok(1));
        client
            .expect_send_raw_transaction()
            .returning(|_| Err(ClientError::MissingBlock));
        let ops = Operations::new(&client, &artifacts, FeeParams::default(), fast_receipts());

        let result = ops
            .send_native(&signer(), Address::ZERO, Amount::from_micros(1))
            .await;
        assert!(matches!(result, Err(OperationError::Client(_))));
    }
}
