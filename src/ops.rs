//! Token distribution and ownership hand-over after deployment.

use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::sol_types::SolCall;
use indexmap::IndexMap;

use crate::chain::ChainClient;
use crate::contracts::{IERC20, IOwnable};
use crate::error::{DeployError, Result};
use crate::fees::FeeEstimator;
use crate::network::Network;
use crate::registry::ContractRegistry;

/// `recipient -> amount`, where a recipient is a registered contract name or
/// a literal address
pub type DistributionPlan = IndexMap<String, U256>;

/// Signed follow-up transactions that read the registry. Each one goes
/// through the same fee path as deployments.
pub struct PostDeploymentOps<'a> {
    chain: &'a dyn ChainClient,
    fees: &'a FeeEstimator,
    network: &'a Network,
    registry: &'a ContractRegistry,
    multisig: Option<Address>,
}

impl<'a> PostDeploymentOps<'a> {
    pub fn new(
        chain: &'a dyn ChainClient,
        fees: &'a FeeEstimator,
        network: &'a Network,
        registry: &'a ContractRegistry,
    ) -> Self {
        Self {
            chain,
            fees,
            network,
            registry,
            multisig: None,
        }
    }

    pub fn with_multisig(mut self, multisig: Option<Address>) -> Self {
        self.multisig = multisig;
        self
    }

    /// Multisig address, falling back to the signer
    pub fn multisig(&self) -> Address {
        self.multisig
            .unwrap_or_else(|| self.chain.signer_address())
    }

    /// Signed call through the fee path
    pub async fn transact(&self, to: Address, data: Bytes, context: &str) -> Result<TxHash> {
        let fees = self.fees.compute_overrides(self.network, self.chain).await?;
        let tx_hash = self.chain.send(to, data, &fees).await.map_err(|e| {
            tracing::error!("Transaction {} on {} failed: {}", context, self.network, e);
            DeployError::Transaction {
                context: context.to_string(),
                network: self.network.name.clone(),
                reason: e.to_string(),
            }
        })?;
        tracing::debug!("{} mined in {:?}", context, tx_hash);
        Ok(tx_hash)
    }

    pub async fn token_balance(&self, token: Address, holder: Address) -> Result<U256> {
        let call = IERC20::balanceOfCall { account: holder };
        let output = self.chain.call(token, call.abi_encode().into()).await?;
        if output.len() < 32 {
            return Err(DeployError::rpc(format!(
                "balanceOf on {token} returned {} bytes",
                output.len()
            )));
        }
        Ok(U256::from_be_slice(&output[..32]))
    }

    /// Compares the plan total with the signer's token balance.
    ///
    /// A shortfall is fatal on mainnet-class networks and only logged elsewhere.
    pub async fn check_enough_tokens_to_distribute(
        &self,
        token_name: &str,
        plan: &DistributionPlan,
    ) -> Result<()> {
        let token = self.registry.get(token_name)?.address();
        let required = plan
            .values()
            .fold(U256::ZERO, |total, amount| total.saturating_add(*amount));
        let available = self
            .token_balance(token, self.chain.signer_address())
            .await?;

        if available > required {
            tracing::info!(
                "{} balance exceeds distribution by {}",
                token_name,
                available - required
            );
        } else if available < required {
            let shortfall = required - available;
            if self.network.class.is_mainnet_class() {
                tracing::error!("Not enough {} to distribute: short by {}", token_name, shortfall);
                return Err(DeployError::InsufficientBalance {
                    token: token_name.to_string(),
                    required,
                    available,
                });
            }
            tracing::warn!(
                "Not enough {} to distribute: short by {} (ignored on {})",
                token_name,
                shortfall,
                self.network
            );
        }

        Ok(())
    }

    /// Transfers every planned amount, stopping at the first failed transfer.
    /// All recipients are resolved before anything is sent.
    pub async fn distribute(&self, token_name: &str, plan: &DistributionPlan) -> Result<()> {
        self.check_enough_tokens_to_distribute(token_name, plan)
            .await?;
        let token = self.registry.get(token_name)?.address();

        let transfers = plan
            .iter()
            .map(|(recipient, amount)| Ok((recipient, self.resolve_recipient(recipient)?, *amount)))
            .collect::<Result<Vec<_>>>()?;

        for (recipient, to, amount) in transfers {
            self.send_tokens(token, to, amount, &format!("{token_name} -> {recipient}"))
                .await?;
            tracing::info!("Sent {} {} to {} ({})", amount, token_name, recipient, to);
        }

        Ok(())
    }

    pub async fn send_tokens(
        &self,
        token: Address,
        to: Address,
        amount: U256,
        context: &str,
    ) -> Result<TxHash> {
        let call = IERC20::transferCall { to, amount };
        self.transact(token, call.abi_encode().into(), context).await
    }

    pub async fn transfer_ownership_to_multisig(&self, name: &str) -> Result<()> {
        let contract = self.registry.get(name)?.address();
        let new_owner = self.multisig();
        let call = IOwnable::transferOwnershipCall {
            newOwner: new_owner,
        };
        self.transact(
            contract,
            call.abi_encode().into(),
            &format!("{name}.transferOwnership"),
        )
        .await?;
        tracing::info!("Transferred ownership of {} to {}", name, new_owner);
        Ok(())
    }

    /// Sequential; stops at the first failure
    pub async fn transfer_ownership_to_multisig_multiple(&self, names: &[String]) -> Result<()> {
        for name in names {
            self.transfer_ownership_to_multisig(name).await?;
        }
        Ok(())
    }

    fn resolve_recipient(&self, recipient: &str) -> Result<Address> {
        if let Ok(record) = self.registry.get(recipient) {
            return Ok(record.address());
        }
        recipient
            .parse::<Address>()
            .map_err(|_| DeployError::UnknownContract(recipient.to_string()))
    }
}
