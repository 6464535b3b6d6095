use serde_json::Value;

use crate::chain::ChainClient;
use crate::contracts::{ArtifactStore, ContractHandle, display_args};
use crate::error::{DeployError, Result};
use crate::fees::FeeEstimator;
use crate::network::Network;
use crate::registry::{DeploymentKind, DeploymentRecord};

/// Deploys contracts one at a time from the configured signer.
///
/// Every transaction gets a freshly computed fee override and waits for its
/// receipt before returning. Failed transactions are not retried.
pub struct Deployer<'a> {
    chain: &'a dyn ChainClient,
    fees: &'a FeeEstimator,
    artifacts: &'a ArtifactStore,
    network: &'a Network,
}

impl<'a> Deployer<'a> {
    pub fn new(
        chain: &'a dyn ChainClient,
        fees: &'a FeeEstimator,
        artifacts: &'a ArtifactStore,
        network: &'a Network,
    ) -> Self {
        Self {
            chain,
            fees,
            artifacts,
            network,
        }
    }

    pub async fn deploy_plain(
        &self,
        name: &str,
        source_name: &str,
        constructor_args: Vec<Value>,
    ) -> Result<DeploymentRecord> {
        let handle = self.create(name, source_name, &constructor_args).await?;

        tracing::info!(
            "Deployed {} to {} on {} w/ args {}",
            name,
            handle.address(),
            self.network,
            display_args(&constructor_args)
        );

        Ok(DeploymentRecord {
            name: name.to_string(),
            source_name: source_name.to_string(),
            handle,
            kind: DeploymentKind::Plain { constructor_args },
        })
    }

    /// Deploys with no constructor args, then calls `initialize(init_args)`
    /// unless `init_args` is empty.
    pub async fn deploy_initializable(
        &self,
        name: &str,
        source_name: &str,
        init_args: Vec<Value>,
    ) -> Result<DeploymentRecord> {
        let handle = self.create(name, source_name, &[]).await?;
        tracing::info!(
            "Deployed {} to {} on {}",
            name,
            handle.address(),
            self.network
        );

        if init_args.is_empty() {
            tracing::info!("Skipping initialize for {}: no init args", name);
        } else {
            let calldata = handle.encode_call("initialize", &init_args)?;
            let fees = self.fees.compute_overrides(self.network, self.chain).await?;
            self.chain
                .send(handle.address(), calldata, &fees)
                .await
                .map_err(|e| self.failure(name, &init_args, e))?;

            tracing::info!(
                "Initialized {} at {} w/ args {}",
                name,
                handle.address(),
                display_args(&init_args)
            );
        }

        Ok(DeploymentRecord {
            name: name.to_string(),
            source_name: source_name.to_string(),
            handle,
            kind: DeploymentKind::Initialized { init_args },
        })
    }

    async fn create(&self, name: &str, source_name: &str, args: &[Value]) -> Result<ContractHandle> {
        let artifact = self.artifacts.load(source_name)?;
        let code = artifact.deploy_code(args)?;

        let fees = self.fees.compute_overrides(self.network, self.chain).await?;
        tracing::info!(
            "Attempting to deploy {} on {} w/ args {} ({})",
            name,
            self.network,
            display_args(args),
            fees
        );

        let address = self
            .chain
            .deploy(code, &fees)
            .await
            .map_err(|e| self.failure(name, args, e))?;

        Ok(ContractHandle::new(address, artifact.abi))
    }

    fn failure(&self, name: &str, args: &[Value], err: DeployError) -> DeployError {
        tracing::error!("Failed to deploy {} on {}: {}", name, self.network, err);
        DeployError::DeploymentTransaction {
            contract: name.to_string(),
            network: self.network.name.clone(),
            args: display_args(args),
            reason: err.to_string(),
        }
    }
}
