use alloy::network::TransactionResponse;
use alloy::primitives::{Address, B256, Bytes};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{BlockNumberOrTag, TransactionRequest};
use alloy::transports::TransportError;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("rpc request failed: {0}")]
    Rpc(#[from] TransportError),
    #[error("latest block not available")]
    MissingBlock,
    #[error("endpoint unreachable: {0}")]
    Unreachable(String),
}

/// The part of a block the recipient selector cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSummary {
    pub number: u64,
    pub senders: Vec<Address>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptSummary {
    pub success: bool,
    pub contract_address: Option<Address>,
    pub block_number: Option<u64>,
}

/// Chain RPC capabilities consumed by the dispatcher. Signing happens locally,
/// so the client only ever sees raw signed envelopes.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn client_version(&self) -> Result<String, ClientError>;

    /// Latest block with full transaction bodies.
    async fn latest_block(&self) -> Result<BlockSummary, ClientError>;

    async fn get_transaction_count(&self, address: Address) -> Result<u64, ClientError>;

    async fn chain_id(&self) -> Result<u64, ClientError>;

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<B256, ClientError>;

    async fn get_transaction_receipt(
        &self,
        tx_hash: B256,
    ) -> Result<Option<ReceiptSummary>, ClientError>;

    /// Read-only `eth_call` against `to` with `data`.
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ClientError>;
}

/// Startup connectivity gate. Returns the node's client version, or
/// `Unreachable` when the endpoint does not answer.
pub async fn check_connection<C: ChainClient + ?Sized>(client: &C) -> Result<String, ClientError> {
    client
        .client_version()
        .await
        .map_err(|e| ClientError::Unreachable(e.to_string()))
}

pub struct AlloyChainClient {
    provider: DynProvider,
}

impl AlloyChainClient {
    pub fn new(rpc_url: Url) -> Self {
        let provider = ProviderBuilder::new().connect_http(rpc_url).erased();
        Self { provider }
    }
}

#[async_trait]
impl ChainClient for AlloyChainClient {
    async fn client_version(&self) -> Result<String, ClientError> {
        Ok(self.provider.get_client_version().await?)
    }

    async fn latest_block(&self) -> Result<BlockSummary, ClientError> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Latest)
            .full()
            .await?
            .ok_or(ClientError::MissingBlock)?;

        let senders: Vec<Address> = block.transactions.txns().map(|tx| tx.from()).collect();
        debug!(
            "Latest block {} carries {} transactions",
            block.header.number,
            senders.len()
        );

        Ok(BlockSummary {
            number: block.header.number,
            senders,
        })
    }

    async fn get_transaction_count(&self, address: Address) -> Result<u64, ClientError> {
        Ok(self.provider.get_transaction_count(address).await?)
    }

    async fn chain_id(&self) -> Result<u64, ClientError> {
        Ok(self.provider.get_chain_id().await?)
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<B256, ClientError> {
        let pending = self.provider.send_raw_transaction(&raw).await?;
        Ok(*pending.tx_hash())
    }

    async fn get_transaction_receipt(
        &self,
        tx_hash: B256,
    ) -> Result<Option<ReceiptSummary>, ClientError> {
        let receipt = self.provider.get_transaction_receipt(tx_hash).await?;
        Ok(receipt.map(|receipt| ReceiptSummary {
            success: receipt.status(),
            contract_address: receipt.contract_address,
            block_number: receipt.block_number,
        }))
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ClientError> {
        let request = TransactionRequest::default().to(to).input(data.into());
        Ok(self.provider.call(request).await?)
    }
}
