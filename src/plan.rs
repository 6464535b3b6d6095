//! Deployment plans: ordered TOML `[[steps]]` run against a [`DeployHelper`].
//!
//! ```toml
//! [[steps]]
//! action = "deploy"
//! name = "MyToken"
//! source = "Token"
//! args = ["TKN", "1000000000000000000000"]
//!
//! [[steps]]
//! action = "transfer_ownership"
//! contracts = ["MyToken"]
//! ```

use std::fs;
use std::path::Path;

use alloy::primitives::{Address, U256};
use eyre::WrapErr;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{DeployError, Result};
use crate::helper::DeployHelper;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    Deploy {
        name: String,
        /// Artifact name, defaults to `name`
        source: Option<String>,
        #[serde(default)]
        args: Value,
    },
    DeployInitializable {
        name: String,
        source: Option<String>,
        #[serde(default)]
        init_args: Value,
    },
    AddContract {
        name: String,
        source: Option<String>,
        address: Address,
        #[serde(default)]
        args: Value,
    },
    AddDistribution {
        recipient: String,
        /// Decimal or `0x` hex token amount
        amount: String,
    },
    Distribute {
        token: String,
    },
    TransferOwnership {
        contracts: Vec<String>,
    },
    AdvanceTime {
        seconds: u64,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DeployPlan {
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl DeployPlan {
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let content = fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read plan {:?}", path))?;
        toml::from_str(&content).wrap_err_with(|| format!("Failed to parse plan {:?}", path))
    }

    /// Runs every step in order, stopping at the first error
    pub async fn run(&self, helper: &mut DeployHelper) -> Result<()> {
        for (i, step) in self.steps.iter().enumerate() {
            tracing::debug!("Plan step {}/{}: {:?}", i + 1, self.steps.len(), step);
            run_step(step, helper).await?;
        }
        Ok(())
    }
}

async fn run_step(step: &Step, helper: &mut DeployHelper) -> Result<()> {
    match step {
        Step::Deploy { name, source, args } => {
            let source = source.as_deref().unwrap_or(name);
            helper.deploy_contract(name, source, args.clone()).await?;
        }
        Step::DeployInitializable {
            name,
            source,
            init_args,
        } => {
            let source = source.as_deref().unwrap_or(name);
            helper
                .deploy_initializable_contract(name, source, init_args.clone())
                .await?;
        }
        Step::AddContract {
            name,
            source,
            address,
            args,
        } => {
            let source = source.as_deref().unwrap_or(name);
            helper.add_contract(name, source, *address, args.clone())?;
        }
        Step::AddDistribution { recipient, amount } => {
            let amount: U256 = amount.trim().parse().map_err(|e| {
                DeployError::invalid_args(format!("invalid amount {amount:?} for {recipient}: {e}"))
            })?;
            helper.add_dist(recipient, amount);
        }
        Step::Distribute { token } => helper.distribute(token).await?,
        Step::TransferOwnership { contracts } => {
            helper
                .transfer_ownership_to_multisig_multiple(contracts)
                .await?
        }
        Step::AdvanceTime { seconds } => helper.advance_time_and_block(*seconds).await?,
    }
    Ok(())
}
