//! Etherscan-compatible verification API (`verifysourcecode` + `checkverifystatus`).
//! Polygonscan and most other explorers speak the same protocol.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{SourceVerifier, VerificationRequest};
use crate::config::VerificationSettings;
use crate::contracts::ArtifactStore;
use crate::error::{DeployError, Result};
use crate::network::Network;

const PENDING: &str = "Pending in queue";

#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    message: String,
    result: String,
}

pub struct EtherscanVerifier {
    client: reqwest::Client,
    artifacts: Arc<ArtifactStore>,
    poll_interval: Duration,
    poll_attempts: u32,
}

impl EtherscanVerifier {
    pub fn new(artifacts: Arc<ArtifactStore>, settings: &VerificationSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            artifacts,
            poll_interval: settings.poll_interval(),
            poll_attempts: settings.poll_attempts,
        }
    }

    async fn submit(
        &self,
        api_url: &str,
        api_key: &str,
        request: &VerificationRequest,
    ) -> Result<String> {
        let source = self.artifacts.verification_source(&request.source_name)?;
        let source_code = serde_json::to_string(&source.standard_json_input)?;
        let address = request.address.to_string();
        let constructor_args = hex::encode(&request.encoded_args);

        let form = [
            ("apikey", api_key),
            ("module", "contract"),
            ("action", "verifysourcecode"),
            ("contractaddress", address.as_str()),
            ("sourceCode", source_code.as_str()),
            ("codeformat", "solidity-standard-json-input"),
            ("contractname", source.contract_path.as_str()),
            ("compilerversion", source.compiler_version.as_str()),
            // sic, the API misspells it
            ("constructorArguements", constructor_args.as_str()),
        ];

        let response = self
            .client
            .post(api_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| self.failed(request, format!("explorer unreachable: {e}")))?
            .error_for_status()
            .map_err(|e| self.failed(request, e.to_string()))?;

        let body: ApiResponse = response
            .json()
            .await
            .map_err(|e| self.failed(request, format!("malformed response: {e}")))?;

        if body.status != "1" {
            return Err(self.failed(request, format!("{} ({})", body.result, body.message)));
        }

        tracing::debug!("Submitted {} for verification, guid {}", request.name, body.result);
        Ok(body.result)
    }

    async fn poll(
        &self,
        api_url: &str,
        api_key: &str,
        guid: &str,
        request: &VerificationRequest,
    ) -> Result<()> {
        let query = [
            ("apikey", api_key),
            ("module", "contract"),
            ("action", "checkverifystatus"),
            ("guid", guid),
        ];

        for _ in 0..self.poll_attempts {
            tokio::time::sleep(self.poll_interval).await;

            let body: ApiResponse = self
                .client
                .get(api_url)
                .query(&query)
                .send()
                .await
                .map_err(|e| self.failed(request, format!("explorer unreachable: {e}")))?
                .json()
                .await
                .map_err(|e| self.failed(request, format!("malformed response: {e}")))?;

            if body.status == "1" {
                return Ok(());
            }
            if body.result != PENDING {
                return Err(self.failed(request, body.result));
            }
        }

        Err(self.failed(
            request,
            format!("still pending after {} checks", self.poll_attempts),
        ))
    }

    fn failed(&self, request: &VerificationRequest, reason: impl Into<String>) -> DeployError {
        DeployError::Verification {
            contract: request.name.clone(),
            address: request.address,
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl SourceVerifier for EtherscanVerifier {
    async fn verify(
        &self,
        request: &VerificationRequest,
        network: &Network,
        api_key: Option<&str>,
    ) -> Result<()> {
        let api_url = network
            .explorer_api_url()
            .ok_or_else(|| self.failed(request, format!("no explorer API for {network}")))?;
        let api_key = api_key.unwrap_or_default();

        let guid = self.submit(&api_url, api_key, request).await?;
        self.poll(&api_url, api_key, &guid, request).await
    }
}
