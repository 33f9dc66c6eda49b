use crate::args::StartArgs;
use crate::artifacts::ArtifactPaths;
use crate::operations::ReceiptPolicy;
use crate::types::{FeeParams, MAX_AMOUNT};
use alloy::primitives::Address;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const SAMPLE_ENV: &str = r#"# JSON-RPC endpoint used for reads and broadcasts
RPC=http://127.0.0.1:8545

# ERC-20 token sent in every cycle
TOKEN_ADDRESS=0x0000000000000000000000000000000000000000

# Bounds of the sampled amount, used for both native and token transfers
AMOUNTMIN=0.001
AMOUNTMAX=0.01

# Number of key cycles to attempt
TX_COUNT=10

# Newline-delimited private keys
KEYS_FILE=pvkeylist.txt
"#;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid RPC url {url:?}: {source}")]
    RpcUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("invalid token address {address:?}: {source}")]
    TokenAddress {
        address: String,
        source: alloy::primitives::hex::FromHexError,
    },
    #[error("amount bounds must be finite, non-negative and at most 18446744073709 (got {min}..{max})")]
    AmountBounds { min: f64, max: f64 },
    #[error("amount min {min} exceeds amount max {max}")]
    AmountOrder { min: f64, max: f64 },
    #[error("priority fee ({priority} gwei) exceeds max fee ({max} gwei)")]
    FeeOrder { priority: u64, max: u64 },
}

/// Immutable run configuration, validated once at startup.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub rpc_url: Url,
    pub token_address: Address,
    pub amount_min: f64,
    pub amount_max: f64,
    pub tx_count: u64,
    pub keys_path: PathBuf,
    pub artifacts: ArtifactPaths,
    pub fees: FeeParams,
    pub pacing: Duration,
    pub receipts: ReceiptPolicy,
    pub max_idle_passes: Option<u32>,
    pub seed: Option<u64>,
}

impl BatchConfig {
    pub fn from_args(args: &StartArgs) -> Result<Self, ConfigError> {
        let rpc_url = Url::parse(&args.rpc).map_err(|source| ConfigError::RpcUrl {
            url: args.rpc.clone(),
            source,
        })?;

        let token_address = args
            .token_address
            .trim()
            .parse::<Address>()
            .map_err(|source| ConfigError::TokenAddress {
                address: args.token_address.clone(),
                source,
            })?;

        let (min, max) = (args.amount_min, args.amount_max);
        let in_range = |bound: f64| bound.is_finite() && (0.0..=MAX_AMOUNT).contains(&bound);
        if !in_range(min) || !in_range(max) {
            return Err(ConfigError::AmountBounds { min, max });
        }
        if min > max {
            return Err(ConfigError::AmountOrder { min, max });
        }

        if args.priority_fee_gwei > args.max_fee_gwei {
            return Err(ConfigError::FeeOrder {
                priority: args.priority_fee_gwei,
                max: args.max_fee_gwei,
            });
        }

        Ok(Self {
            rpc_url,
            token_address,
            amount_min: min,
            amount_max: max,
            tx_count: args.tx_count,
            keys_path: args.keys.clone(),
            artifacts: ArtifactPaths {
                erc20_abi: args.erc20_abi.clone(),
                storage_abi: args.storage_abi.clone(),
                storage_bytecode: args.storage_bytecode.clone(),
            },
            fees: FeeParams::from_gwei(args.max_fee_gwei, args.priority_fee_gwei),
            pacing: Duration::from_secs(args.pacing_secs),
            receipts: ReceiptPolicy {
                timeout: Duration::from_secs(args.receipt_timeout_secs),
                ..ReceiptPolicy::default()
            },
            max_idle_passes: args.max_idle_passes,
            seed: args.seed,
        })
    }
}
