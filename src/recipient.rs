use crate::client::{ChainClient, ClientError};
use alloy::primitives::Address;
use rand::Rng;
use rand::seq::SliceRandom;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecipientError {
    #[error("latest block {0} has no transactions")]
    EmptyBlock(u64),
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Picks the sender of a uniformly sampled transaction from the latest block.
pub async fn select_recipient<C, R>(client: &C, rng: &mut R) -> Result<Address, RecipientError>
where
    C: ChainClient + ?Sized,
    R: Rng + ?Sized,
{
    let block = client.latest_block().await?;
    block
        .senders
        .choose(rng)
        .copied()
        .ok_or(RecipientError::EmptyBlock(block.number))
}
