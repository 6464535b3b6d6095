//! Error taxonomy for the deployment core.
//!
//! Fatal errors (`FeeSource`, `DeploymentTransaction`, `Transaction`, and
//! `InsufficientBalance` on mainnet-class networks) abort the run. Verification
//! failures never leave the verification batcher; they are recorded as failed
//! outcomes instead.

use alloy::primitives::{Address, U256};
use thiserror::Error;

/// Result alias used across the library.
pub type Result<T> = std::result::Result<T, DeployError>;

/// Errors raised while deploying and managing contracts.
#[derive(Debug, Error)]
pub enum DeployError {
    /// A gas-price oracle was unreachable or returned malformed data.
    #[error("fee source error: {0}")]
    FeeSource(String),

    /// Submission or confirmation of a deployment transaction failed.
    #[error("deployment of {contract} on {network} failed (args: {args}): {reason}")]
    DeploymentTransaction {
        contract: String,
        network: String,
        args: String,
        reason: String,
    },

    /// A post-deployment transaction (initialize, transfer, ownership) failed.
    #[error("transaction {context} on {network} failed: {reason}")]
    Transaction {
        context: String,
        network: String,
        reason: String,
    },

    /// The signer does not hold enough tokens for the distribution plan.
    #[error("not enough {token} to distribute: required {required}, available {available}")]
    InsufficientBalance {
        token: String,
        required: U256,
        available: U256,
    },

    /// Explorer source verification failed.
    #[error("verification of {contract} at {address} failed: {reason}")]
    Verification {
        contract: String,
        address: Address,
        reason: String,
    },

    /// No contract is registered under the logical name.
    #[error("unknown contract: {0}")]
    UnknownContract(String),

    /// Arguments could not be normalized or coerced to the ABI types.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// A compilation artifact was missing or unreadable.
    #[error("artifact error: {0}")]
    Artifact(String),

    /// Configuration was missing or invalid.
    #[error("config error: {0}")]
    Config(String),

    /// A JSON-RPC call failed.
    #[error("rpc error: {0}")]
    Rpc(String),

    /// An orchestrator operation was called in the wrong phase.
    #[error("invalid phase: expected {expected}, found {found}")]
    InvalidPhase {
        expected: &'static str,
        found: &'static str,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl DeployError {
    /// Creates a fee source error.
    pub fn fee_source(msg: impl Into<String>) -> Self {
        Self::FeeSource(msg.into())
    }

    /// Creates an rpc error.
    pub fn rpc(msg: impl std::fmt::Display) -> Self {
        Self::Rpc(msg.to_string())
    }

    /// Creates an artifact error.
    pub fn artifact(msg: impl Into<String>) -> Self {
        Self::Artifact(msg.into())
    }

    /// Creates an invalid arguments error.
    pub fn invalid_args(msg: impl Into<String>) -> Self {
        Self::InvalidArguments(msg.into())
    }

    /// Creates a config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Returns true if the error must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Verification { .. })
    }
}
