mod estimator;
mod oracle;

pub use estimator::{FeeEstimator, clamp_priority_fee};
pub use oracle::{
    BlockPriceOracle, BlocknativeOracle, EstimatedPrice, GasStationOracle, PolygonscanGasOracle,
    gwei, gwei_str_to_wei,
};
#[cfg(test)]
pub(crate) use estimator::tests::{offline_estimator, unreachable_estimator};

use alloy::network::TransactionBuilder;
use alloy::rpc::types::TransactionRequest;
use serde::Serialize;

/// Pricing parameters attached to an outgoing transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum FeeOverride {
    /// Single gas price (pre-London networks, fixed-price sidechains)
    Legacy { gas_price: u128 },
    /// Type 2 transaction
    Eip1559 {
        max_fee_per_gas: u128,
        max_priority_fee_per_gas: u128,
        gas_limit: u64,
    },
    /// Let the node's fillers decide
    NodeDefault,
}

impl FeeOverride {
    /// Builds an EIP-1559 override, clamping the priority fee under the max fee.
    pub fn eip1559(max_fee_per_gas: u128, max_priority_fee_per_gas: u128, gas_limit: u64) -> Self {
        Self::Eip1559 {
            max_fee_per_gas,
            max_priority_fee_per_gas: clamp_priority_fee(max_fee_per_gas, max_priority_fee_per_gas),
            gas_limit,
        }
    }

    pub fn apply(&self, tx: TransactionRequest) -> TransactionRequest {
        match *self {
            FeeOverride::Legacy { gas_price } => tx.with_gas_price(gas_price),
            FeeOverride::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
                gas_limit,
            } => {
                let mut tx = tx
                    .with_max_fee_per_gas(max_fee_per_gas)
                    .with_max_priority_fee_per_gas(max_priority_fee_per_gas)
                    .with_gas_limit(gas_limit);
                tx.transaction_type = Some(2);
                tx
            }
            FeeOverride::NodeDefault => tx,
        }
    }
}

impl std::fmt::Display for FeeOverride {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeeOverride::Legacy { gas_price } => write!(f, "gasPrice={}", gas_price),
            FeeOverride::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
                gas_limit,
            } => write!(
                f,
                "type=2 maxFeePerGas={} maxPriorityFeePerGas={} gasLimit={}",
                max_fee_per_gas, max_priority_fee_per_gas, gas_limit
            ),
            FeeOverride::NodeDefault => write!(f, "node default"),
        }
    }
}
