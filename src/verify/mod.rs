//! Explorer source verification.

mod batcher;
mod etherscan;

pub use batcher::VerificationBatcher;
pub use etherscan::EtherscanVerifier;

use alloy::primitives::{Address, Bytes};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::network::Network;
use crate::registry::DeploymentRecord;

/// One contract to verify, with its constructor arguments already encoded
#[derive(Debug, Clone)]
pub struct VerificationRequest {
    pub name: String,
    pub source_name: String,
    pub address: Address,
    pub constructor_args: Vec<Value>,
    pub encoded_args: Bytes,
}

impl VerificationRequest {
    pub fn from_record(record: &DeploymentRecord) -> Result<Self> {
        let constructor_args = record.kind.verification_args().to_vec();
        let encoded_args = record.handle.encode_constructor_args(&constructor_args)?;
        Ok(Self {
            name: record.name.clone(),
            source_name: record.source_name.clone(),
            address: record.address(),
            constructor_args,
            encoded_args,
        })
    }
}

/// Result of one verification attempt, as written to the attempt log
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationOutcome {
    pub name: String,
    pub address: Address,
    pub constructor_args: Vec<Value>,
    pub passed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VerificationSummary {
    pub passed: usize,
    pub failed: usize,
    pub outcomes: IndexMap<String, VerificationOutcome>,
}

impl VerificationSummary {
    pub fn total(&self) -> usize {
        self.passed + self.failed
    }

    pub(crate) fn record(&mut self, outcome: VerificationOutcome) {
        if outcome.passed {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
        self.outcomes.insert(outcome.name.clone(), outcome);
    }
}

/// Submits source code to a block explorer and waits for its verdict.
#[async_trait]
pub trait SourceVerifier: Send + Sync {
    async fn verify(
        &self,
        request: &VerificationRequest,
        network: &Network,
        api_key: Option<&str>,
    ) -> Result<()>;
}

/// Splits `items` into consecutive batches of at most `size`, keeping order
pub fn chunk<T>(items: Vec<T>, size: usize) -> Vec<Vec<T>> {
    let size = size.max(1);
    let mut batches = Vec::with_capacity(items.len().div_ceil(size));
    let mut iter = items.into_iter().peekable();
    while iter.peek().is_some() {
        batches.push(iter.by_ref().take(size).collect());
    }
    batches
}
