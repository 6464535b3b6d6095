use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use futures::future::join_all;
use zeroize::Zeroizing;

use super::{
    SourceVerifier, VerificationOutcome, VerificationRequest, VerificationSummary, chunk,
};
use crate::config::VerificationSettings;
use crate::error::Result;
use crate::network::Network;
use crate::registry::{ContractRegistry, DeploymentRecord};

/// Verifies every registered contract in rate-limited batches.
///
/// Requests inside a batch run concurrently, batches run one after another
/// with a cooldown in between. A failed verification is recorded and never
/// stops the pass.
pub struct VerificationBatcher {
    verifier: Arc<dyn SourceVerifier>,
    settings: VerificationSettings,
    etherscan_key: Option<Zeroizing<String>>,
    polygonscan_key: Option<Zeroizing<String>>,
    attempt_log: Option<PathBuf>,
}

impl VerificationBatcher {
    pub fn new(verifier: Arc<dyn SourceVerifier>, settings: VerificationSettings) -> Self {
        Self {
            verifier,
            settings,
            etherscan_key: None,
            polygonscan_key: None,
            attempt_log: None,
        }
    }

    pub fn with_api_keys(
        mut self,
        etherscan: Option<Zeroizing<String>>,
        polygonscan: Option<Zeroizing<String>>,
    ) -> Self {
        self.etherscan_key = etherscan;
        self.polygonscan_key = polygonscan;
        self
    }

    /// Where the outcome map is written after a full pass
    pub fn with_attempt_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.attempt_log = Some(path.into());
        self
    }

    fn api_key(&self, network: &Network) -> Option<&str> {
        let key = if network.class.is_matic() {
            &self.polygonscan_key
        } else {
            &self.etherscan_key
        };
        key.as_ref().map(|k| k.as_str())
    }

    pub async fn verify_all(
        &self,
        registry: &ContractRegistry,
        network: &Network,
    ) -> Result<VerificationSummary> {
        let mut summary = VerificationSummary::default();
        if !network.class.supports_verification() {
            tracing::info!("Skipping verification on {} ({})", network, network.class);
            return Ok(summary);
        }

        let records = registry.snapshot();
        if records.is_empty() {
            return Ok(summary);
        }

        tracing::info!(
            "Waiting {}s before verifying {} contracts on {}",
            self.settings.settle_delay_secs,
            records.len(),
            network
        );
        tokio::time::sleep(self.settings.settle_delay()).await;

        let batches = chunk(records, self.settings.batch_size);
        let batch_count = batches.len();
        for (i, batch) in batches.into_iter().enumerate() {
            tracing::info!(
                "Verifying batch {}/{} ({} contracts)",
                i + 1,
                batch_count,
                batch.len()
            );
            let outcomes = join_all(batch.iter().map(|record| self.attempt(record, network))).await;
            for outcome in outcomes {
                summary.record(outcome);
            }
            tokio::time::sleep(self.settings.batch_cooldown()).await;
        }

        tracing::info!(
            "Verification finished: {} passed, {} failed",
            summary.passed,
            summary.failed
        );

        if let Some(path) = &self.attempt_log {
            fs::write(path, serde_json::to_string_pretty(&summary.outcomes)?)?;
        }

        Ok(summary)
    }

    /// Verifies one contract outside of batching
    pub async fn verify_single(&self, record: &DeploymentRecord, network: &Network) -> bool {
        if !network.class.supports_verification() {
            return false;
        }
        tokio::time::sleep(self.settings.single_delay()).await;
        self.attempt(record, network).await.passed
    }

    async fn attempt(&self, record: &DeploymentRecord, network: &Network) -> VerificationOutcome {
        let constructor_args = record.kind.verification_args().to_vec();
        let result = match VerificationRequest::from_record(record) {
            Ok(request) => {
                self.verifier
                    .verify(&request, network, self.api_key(network))
                    .await
            }
            Err(e) => Err(e),
        };

        let passed = match result {
            Ok(()) => {
                tracing::info!("Verified {} at {}", record.name, record.address());
                true
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to verify {} at {} on {}: {}",
                    record.name,
                    record.address(),
                    network,
                    e
                );
                false
            }
        };

        VerificationOutcome {
            name: record.name.clone(),
            address: record.address(),
            constructor_args,
            passed,
        }
    }
}
