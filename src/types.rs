use alloy::primitives::{Address, B256, Bytes, U256};
use alloy::rpc::types::TransactionRequest;
use rand::Rng;
use std::fmt;

/// Decimal places kept when sampling amounts.
pub const AMOUNT_DECIMALS: u32 = 6;
const MICROS_PER_UNIT: f64 = 1_000_000.0;
/// Largest amount whose micro-units still fit a `u64`.
pub const MAX_AMOUNT: f64 = (u64::MAX / 1_000_000) as f64;
const ETHER_DECIMALS: u8 = 18;
const WEI_PER_GWEI: u128 = 1_000_000_000;

/// A transfer amount rounded to six decimals, stored as integer micro-units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Amount {
    micros: u64,
}

impl Amount {
    #[cfg(test)]
    pub fn from_micros(micros: u64) -> Self {
        Self { micros }
    }

    #[cfg(test)]
    pub fn micros(&self) -> u64 {
        self.micros
    }

    /// Draws `round(uniform(min, max), 6)`, kept inside `[min, max]`.
    /// Bounds must lie in `0..=MAX_AMOUNT`.
    pub fn sample<R: Rng + ?Sized>(rng: &mut R, min: f64, max: f64) -> Self {
        let raw = if min < max {
            rng.gen_range(min..=max)
        } else {
            min
        };
        let mut micros = (raw * MICROS_PER_UNIT).round();

        // Rounding may step over a bound; pull it back when a grid point exists inside.
        let lo = (min * MICROS_PER_UNIT).ceil();
        let hi = (max * MICROS_PER_UNIT).floor();
        if lo <= hi {
            micros = micros.clamp(lo, hi);
        }
        Self {
            micros: micros as u64,
        }
    }

    /// `floor(amount * 10^decimals)` computed on the exact six-decimal value.
    pub fn scale(&self, decimals: u8) -> Option<U256> {
        let micros = U256::from(self.micros);
        let decimals = u32::from(decimals);
        if decimals >= AMOUNT_DECIMALS {
            let factor = U256::from(10u64).checked_pow(U256::from(decimals - AMOUNT_DECIMALS))?;
            micros.checked_mul(factor)
        } else {
            let divisor = U256::from(10u64).pow(U256::from(AMOUNT_DECIMALS - decimals));
            Some(micros / divisor)
        }
    }

    /// Value in wei for a native transfer.
    pub fn to_wei(&self) -> Option<U256> {
        self.scale(ETHER_DECIMALS)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = 10u64.pow(AMOUNT_DECIMALS);
        write!(f, "{}.{:06}", self.micros / unit, self.micros % unit)
    }
}

/// EIP-1559 fee fields attached to every submitted operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeParams {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

impl FeeParams {
    pub fn from_gwei(max_fee_gwei: u64, priority_fee_gwei: u64) -> Self {
        Self {
            max_fee_per_gas: u128::from(max_fee_gwei) * WEI_PER_GWEI,
            max_priority_fee_per_gas: u128::from(priority_fee_gwei) * WEI_PER_GWEI,
        }
    }
}

impl Default for FeeParams {
    fn default() -> Self {
        Self::from_gwei(3, 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    NativeTransfer,
    Deploy,
    ContractWrite,
    TokenTransfer,
}

impl OperationKind {
    pub const ALL: [OperationKind; 4] = [
        OperationKind::NativeTransfer,
        OperationKind::Deploy,
        OperationKind::ContractWrite,
        OperationKind::TokenTransfer,
    ];

    pub fn gas_limit(&self) -> u64 {
        match self {
            OperationKind::NativeTransfer => 21_000,
            OperationKind::Deploy => 1_500_000,
            OperationKind::ContractWrite | OperationKind::TokenTransfer => 100_000,
        }
    }

    /// Only deployments block on a receipt; every other kind is judged by broadcast alone.
    pub fn awaits_receipt(&self) -> bool {
        matches!(self, OperationKind::Deploy)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            OperationKind::NativeTransfer => "Native",
            OperationKind::Deploy => "Deploy",
            OperationKind::ContractWrite => "Contract Write",
            OperationKind::TokenTransfer => "Token",
        };
        f.write_str(tag)
    }
}

/// One operation before signing.
#[derive(Debug, Clone)]
pub struct TxIntent {
    pub kind: OperationKind,
    pub from: Address,
    /// `None` for contract creation.
    pub to: Option<Address>,
    pub value: Option<U256>,
    pub input: Bytes,
    pub nonce: u64,
    pub chain_id: u64,
    pub fees: FeeParams,
}

impl TxIntent {
    pub fn gas_limit(&self) -> u64 {
        self.kind.gas_limit()
    }

    pub fn into_request(self) -> TransactionRequest {
        let gas_limit = self.gas_limit();
        let mut request = TransactionRequest {
            from: Some(self.from),
            value: self.value,
            nonce: Some(self.nonce),
            chain_id: Some(self.chain_id),
            gas: Some(gas_limit),
            max_fee_per_gas: Some(self.fees.max_fee_per_gas),
            max_priority_fee_per_gas: Some(self.fees.max_priority_fee_per_gas),
            transaction_type: Some(2),
            ..Default::default()
        };
        request.to = Some(match self.to {
            Some(to) => to.into(),
            None => alloy::primitives::TxKind::Create,
        });
        if !self.input.is_empty() {
            request.input = self.input.into();
        }
        request
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    Submitted(B256),
    Deployed { tx_hash: B256, address: Address },
    Failed(String),
    Skipped,
}

impl OperationStatus {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            OperationStatus::Submitted(_) | OperationStatus::Deployed { .. }
        )
    }
}

#[derive(Debug, Clone)]
pub struct OperationResult {
    pub kind: OperationKind,
    pub status: OperationStatus,
}

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle: u64,
    pub sender: Address,
    pub recipient: Address,
    pub amount: Amount,
    pub operations: Vec<OperationResult>,
}

impl CycleReport {
    pub fn status_of(&self, kind: OperationKind) -> Option<&OperationStatus> {
        self.operations
            .iter()
            .find(|op| op.kind == kind)
            .map(|op| &op.status)
    }
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub executed: u64,
    pub passes: u64,
    pub skipped_keys: u64,
    pub cycles: Vec<CycleReport>,
}
