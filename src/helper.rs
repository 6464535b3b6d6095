//! The deployment orchestrator.
//!
//! A run moves through `Uninitialized -> Initialized -> Deploying -> PostRun
//! -> Done`. Deployment and bookkeeping calls are accepted while initialized
//! or deploying; `post_run` closes the run.

use std::fs;
use std::sync::Arc;

use alloy::primitives::{Address, Bytes, TxHash, U256};
use eyre::{WrapErr, eyre};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Value, json};

use crate::chain::{ChainClient, RpcClient, resolve_signer};
use crate::config::{AppConfig, NetworkConfig, OutputSettings};
use crate::contracts::{ArtifactStore, ContractHandle, normalize_args};
use crate::deployer::Deployer;
use crate::error::{DeployError, Result};
use crate::fees::{FeeEstimator, FeeOverride};
use crate::network::{Network, NetworkClass};
use crate::ops::{DistributionPlan, PostDeploymentOps};
use crate::project::Project;
use crate::registry::{ContractRegistry, DeploymentKind, DeploymentRecord};
use crate::verify::{EtherscanVerifier, VerificationBatcher, VerificationSummary};

const UI_LOGO: &str = "🏆🚀";
const UI_VAULT_TYPE: &str = "experimental";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Initialized,
    Deploying,
    PostRun,
    Done,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Uninitialized => "uninitialized",
            Phase::Initialized => "initialized",
            Phase::Deploying => "deploying",
            Phase::PostRun => "post-run",
            Phase::Done => "done",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Balance and block time when the run started
#[derive(Debug, Clone, Copy)]
struct StartSnapshot {
    balance: U256,
    timestamp: u64,
}

/// What `post_run` reports
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// Signer balance spent during the run, in wei
    pub total_cost: U256,
    /// Block time elapsed during the run
    pub elapsed_secs: u64,
    /// Overrides a transaction sent now would use. `None` if the fee source
    /// was unreachable.
    pub fees: Option<FeeOverride>,
    pub verification: VerificationSummary,
    /// `name -> explorer link or bare address`
    pub contracts: IndexMap<String, String>,
    pub manifest: Value,
}

pub struct DeployHelper {
    phase: Phase,
    network: Network,
    network_config: Option<NetworkConfig>,
    chain: Option<Arc<dyn ChainClient>>,
    fees: FeeEstimator,
    artifacts: Arc<ArtifactStore>,
    batcher: VerificationBatcher,
    registry: ContractRegistry,
    distribution: DistributionPlan,
    multisig: Option<Address>,
    output: OutputSettings,
    wrap_object_args: bool,
    start: Option<StartSnapshot>,
}

impl DeployHelper {
    pub fn new(
        network: Network,
        fees: FeeEstimator,
        artifacts: Arc<ArtifactStore>,
        batcher: VerificationBatcher,
    ) -> Self {
        Self {
            phase: Phase::Uninitialized,
            network,
            network_config: None,
            chain: None,
            fees,
            artifacts,
            batcher,
            registry: ContractRegistry::new(),
            distribution: DistributionPlan::new(),
            multisig: None,
            output: OutputSettings::default(),
            wrap_object_args: false,
            start: None,
        }
    }

    /// Wires fee oracles, the artifact store and the explorer verifier for
    /// `network_name` from configuration. The chain is bound by [`Self::init`].
    pub fn connect(config: &AppConfig, network_name: &str, project: &Project) -> eyre::Result<Self> {
        let network_config = config
            .network(network_name)
            .cloned()
            .ok_or_else(|| eyre!("Network {network_name} is not configured"))?;
        let network = Network::from_config(network_name, &network_config);

        let fees = FeeEstimator::from_config(config)?;
        let artifacts = Arc::new(ArtifactStore::from_project(project));

        let verifier = EtherscanVerifier::new(artifacts.clone(), &config.verification);
        let batcher = VerificationBatcher::new(Arc::new(verifier), config.verification.clone())
            .with_api_keys(
                config
                    .resolve_api_key("etherscan")
                    .wrap_err("Failed to resolve etherscan API key")?,
                config
                    .resolve_api_key("polygonscan")
                    .wrap_err("Failed to resolve polygonscan API key")?,
            )
            .with_attempt_log(project.root.join(&config.output.verify_log));

        let mut output = config.output.clone();
        output.deploy_log = project.root.join(&output.deploy_log);
        output.ui_manifest = output.ui_manifest.map(|path| project.root.join(path));

        tracing::info!(
            "Using {} project {} on {} ({})",
            project.project_type,
            project.name,
            network,
            network.class
        );

        let mut helper = Self::new(network, fees, artifacts, batcher)
            .with_multisig(config.multisig)
            .with_output(output)
            .wrap_object_args(config.deploy.wrap_object_args);
        helper.network_config = Some(network_config);
        Ok(helper)
    }

    pub fn with_multisig(mut self, multisig: Option<Address>) -> Self {
        self.multisig = multisig;
        self
    }

    pub fn with_output(mut self, output: OutputSettings) -> Self {
        self.output = output;
        self
    }

    pub fn wrap_object_args(mut self, wrap: bool) -> Self {
        self.wrap_object_args = wrap;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn registry(&self) -> &ContractRegistry {
        &self.registry
    }

    /// Resolves the signer for the active network and binds an RPC wallet
    pub async fn init(&mut self) -> eyre::Result<()> {
        self.expect_phase(&[Phase::Uninitialized])?;
        let network_config = self
            .network_config
            .as_ref()
            .ok_or_else(|| eyre!("No configuration for network {}", self.network))?;

        let signer = resolve_signer(&network_config.account)
            .wrap_err_with(|| format!("Failed to resolve signer for {}", self.network))?;
        let client = RpcClient::connect(&network_config.rpc_url, signer)
            .await
            .wrap_err_with(|| format!("Failed to connect to {}", network_config.rpc_url))?;

        self.init_with_chain(Arc::new(client)).await?;
        Ok(())
    }

    /// Binds an already-connected chain client
    pub async fn init_with_chain(&mut self, chain: Arc<dyn ChainClient>) -> Result<()> {
        self.expect_phase(&[Phase::Uninitialized])?;

        if let Some(expected) = self.network_config.as_ref().and_then(|c| c.chain_id) {
            let actual = chain.chain_id().await?;
            if actual != expected {
                return Err(DeployError::Config(format!(
                    "{} is configured for chain id {expected} but the node reports {actual}",
                    self.network
                )));
            }
        }

        let signer = chain.signer_address();
        let balance = chain.balance(signer).await?;
        let timestamp = chain.block_timestamp().await?;
        tracing::info!(
            "Deploying from {} on {} (balance {} wei)",
            signer,
            self.network,
            balance
        );

        self.chain = Some(chain);
        self.start = Some(StartSnapshot { balance, timestamp });
        self.phase = Phase::Initialized;
        Ok(())
    }

    pub async fn deploy_contract(
        &mut self,
        name: &str,
        source_name: &str,
        args: Value,
    ) -> Result<ContractHandle> {
        self.begin_deploying()?;
        let args = normalize_args(args, self.wrap_object_args)?;
        let record = self
            .deployer()?
            .deploy_plain(name, source_name, args)
            .await?;
        Ok(self.register(record))
    }

    pub async fn deploy_initializable_contract(
        &mut self,
        name: &str,
        source_name: &str,
        init_args: Value,
    ) -> Result<ContractHandle> {
        self.begin_deploying()?;
        let init_args = normalize_args(init_args, self.wrap_object_args)?;
        let record = self
            .deployer()?
            .deploy_initializable(name, source_name, init_args)
            .await?;
        Ok(self.register(record))
    }

    /// Registers a contract deployed outside this run. Non-empty `args` are
    /// taken as constructor args, otherwise the contract counts as initialized.
    pub fn add_contract(
        &mut self,
        name: &str,
        source_name: &str,
        address: Address,
        args: Value,
    ) -> Result<ContractHandle> {
        self.begin_deploying()?;
        let args = normalize_args(args, self.wrap_object_args)?;
        let abi = self.artifacts.load_abi(source_name)?;
        let kind = if args.is_empty() {
            DeploymentKind::Initialized { init_args: args }
        } else {
            DeploymentKind::Plain {
                constructor_args: args,
            }
        };

        tracing::info!("Added {} at {} on {}", name, address, self.network);
        Ok(self.register(DeploymentRecord {
            name: name.to_string(),
            source_name: source_name.to_string(),
            handle: ContractHandle::new(address, abi),
            kind,
        }))
    }

    /// Zero address for unknown names
    pub fn address_of(&self, name: &str) -> Address {
        self.registry.address_of(name)
    }

    pub fn get_contract(&self, name: &str) -> Result<&ContractHandle> {
        Ok(&self.registry.get(name)?.handle)
    }

    /// Fee override a transaction sent now would use
    pub async fn get_overrides(&self) -> Result<FeeOverride> {
        self.fees
            .compute_overrides(&self.network, self.chain()?)
            .await
    }

    pub async fn transact(&mut self, to: Address, data: Bytes) -> Result<TxHash> {
        self.begin_deploying()?;
        self.ops()?.transact(to, data, &format!("call to {to}")).await
    }

    /// Adds `amount` for `recipient` (contract name or address) to the plan.
    /// A repeated recipient replaces its earlier amount.
    pub fn add_dist(&mut self, recipient: &str, amount: U256) {
        if let Some(previous) = self.distribution.insert(recipient.to_string(), amount) {
            tracing::warn!(
                "Replacing distribution to {}: {} -> {}",
                recipient,
                previous,
                amount
            );
        }
    }

    pub fn distribution(&self) -> &DistributionPlan {
        &self.distribution
    }

    pub async fn check_enough_tokens_to_distribute(&self, token: &str) -> Result<()> {
        self.ops()?
            .check_enough_tokens_to_distribute(token, &self.distribution)
            .await
    }

    pub async fn distribute(&mut self, token: &str) -> Result<()> {
        self.begin_deploying()?;
        self.ops()?.distribute(token, &self.distribution).await
    }

    pub async fn transfer_ownership_to_multisig(&mut self, name: &str) -> Result<()> {
        self.begin_deploying()?;
        self.ops()?.transfer_ownership_to_multisig(name).await
    }

    pub async fn transfer_ownership_to_multisig_multiple(&mut self, names: &[String]) -> Result<()> {
        self.begin_deploying()?;
        self.ops()?
            .transfer_ownership_to_multisig_multiple(names)
            .await
    }

    /// `evm_increaseTime` followed by `evm_mine`. Local and forked chains only.
    pub async fn advance_time_and_block(&mut self, seconds: u64) -> Result<()> {
        self.begin_deploying()?;
        if !matches!(
            self.network.class,
            NetworkClass::Local | NetworkClass::MainnetFork
        ) {
            return Err(DeployError::invalid_args(format!(
                "cannot advance time on {} ({})",
                self.network, self.network.class
            )));
        }

        let chain = self.chain()?;
        chain.increase_time(seconds).await?;
        chain.mine_block().await?;
        tracing::info!("Advanced {} by {}s", self.network, seconds);
        Ok(())
    }

    /// Verifies one registered contract immediately
    pub async fn verify(&self, name: &str) -> Result<bool> {
        self.expect_phase(&[Phase::Initialized, Phase::Deploying])?;
        let record = self.registry.get(name)?;
        Ok(self.batcher.verify_single(record, &self.network).await)
    }

    /// Reports, verifies and writes the run's output files. A failed run
    /// stays open and `post_run` may be called again.
    pub async fn post_run(&mut self) -> Result<RunReport> {
        self.expect_phase(&[Phase::Initialized, Phase::Deploying])?;
        let previous = self.phase;
        self.phase = Phase::PostRun;

        let result = self.finish_run().await;
        self.phase = match result {
            Ok(_) => Phase::Done,
            Err(_) => previous,
        };
        result
    }

    async fn finish_run(&self) -> Result<RunReport> {
        let chain = self.chain()?;
        let start = self.start.ok_or(DeployError::InvalidPhase {
            expected: Phase::Initialized.as_str(),
            found: Phase::Uninitialized.as_str(),
        })?;

        let contracts = self.contract_links();
        for (name, link) in &contracts {
            tracing::info!("{}: {}", name, link);
        }
        fs::write(
            &self.output.deploy_log,
            serde_json::to_string_pretty(&self.registry.deploy_log())?,
        )?;

        let balance = chain.balance(chain.signer_address()).await?;
        let timestamp = chain.block_timestamp().await?;
        let total_cost = start.balance.saturating_sub(balance);
        let elapsed_secs = timestamp.saturating_sub(start.timestamp);
        tracing::info!(
            "Deployment cost {} wei over {}s of block time",
            total_cost,
            elapsed_secs
        );

        let fees = match self.fees.compute_overrides(&self.network, chain).await {
            Ok(fees) => {
                tracing::info!("Current fee overrides: {}", fees);
                Some(fees)
            }
            Err(e @ DeployError::FeeSource(_)) => {
                tracing::warn!("Could not fetch current fee overrides: {}", e);
                None
            }
            Err(e) => return Err(e),
        };

        let verification = self.batcher.verify_all(&self.registry, &self.network).await?;

        let chain_id = chain.chain_id().await?;
        let manifest = self.ui_manifest(chain_id);
        let rendered = serde_json::to_string_pretty(&manifest)?;
        match &self.output.ui_manifest {
            Some(path) => {
                fs::write(path, rendered)?;
                tracing::info!("Wrote UI manifest to {:?}", path);
            }
            None => tracing::info!("UI manifest:\n{}", rendered),
        }

        Ok(RunReport {
            total_cost,
            elapsed_secs,
            fees,
            verification,
            contracts,
            manifest,
        })
    }

    /// Deploys one contract and closes the run
    pub async fn deploy_single_contract(
        &mut self,
        name: &str,
        source_name: &str,
        args: Value,
    ) -> Result<RunReport> {
        self.deploy_contract(name, source_name, args).await?;
        self.post_run().await
    }

    fn contract_links(&self) -> IndexMap<String, String> {
        let prefix = self.network.explorer_address_prefix();
        self.registry
            .all()
            .map(|record| {
                let link = match &prefix {
                    Some(prefix) => format!("{}{}", prefix, record.address()),
                    None => record.address().to_string(),
                };
                (record.name.clone(), link)
            })
            .collect()
    }

    /// `ABI` names the artifact whose ABI file the UI loads
    fn ui_manifest(&self, chain_id: u64) -> Value {
        let manifest = self
            .registry
            .all()
            .map(|record| {
                let entry = json!({
                    "TITLE": record.name,
                    "LOGO": UI_LOGO,
                    "ABI": record.source_name,
                    "VAULT_TYPE": UI_VAULT_TYPE,
                    "ADDR": record.address(),
                    "CHAIN_ID": chain_id,
                });
                (record.name.clone(), entry)
            })
            .collect();
        Value::Object(manifest)
    }

    fn register(&mut self, record: DeploymentRecord) -> ContractHandle {
        let handle = record.handle.clone();
        self.registry.insert(record);
        handle
    }

    fn chain(&self) -> Result<&dyn ChainClient> {
        self.chain.as_deref().ok_or(DeployError::InvalidPhase {
            expected: Phase::Initialized.as_str(),
            found: self.phase.as_str(),
        })
    }

    fn deployer(&self) -> Result<Deployer<'_>> {
        Ok(Deployer::new(
            self.chain()?,
            &self.fees,
            &self.artifacts,
            &self.network,
        ))
    }

    fn ops(&self) -> Result<PostDeploymentOps<'_>> {
        Ok(
            PostDeploymentOps::new(self.chain()?, &self.fees, &self.network, &self.registry)
                .with_multisig(self.multisig),
        )
    }

    fn expect_phase(&self, allowed: &[Phase]) -> Result<()> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(DeployError::InvalidPhase {
                expected: allowed[0].as_str(),
                found: self.phase.as_str(),
            })
        }
    }

    fn begin_deploying(&mut self) -> Result<()> {
        self.expect_phase(&[Phase::Initialized, Phase::Deploying])?;
        self.phase = Phase::Deploying;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::chain::mock::{BLOCK_TIME, MockChain, TX_COST};
    use crate::config::VerificationSettings;
    use crate::deployer::tests::test_store;
    use crate::config::NetworkConfig;
    use crate::fees::{offline_estimator, unreachable_estimator};
    use crate::verify::{SourceVerifier, VerificationRequest};

    #[derive(Default)]
    struct CountingVerifier {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SourceVerifier for CountingVerifier {
        async fn verify(
            &self,
            _request: &VerificationRequest,
            _network: &Network,
            _api_key: Option<&str>,
        ) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn test_helper(network: &str, dir: &std::path::Path) -> (DeployHelper, Arc<CountingVerifier>) {
        let verifier = Arc::new(CountingVerifier::default());
        let settings = VerificationSettings {
            settle_delay_secs: 0,
            single_delay_secs: 0,
            batch_cooldown_secs: 0,
            ..Default::default()
        };
        let batcher = VerificationBatcher::new(verifier.clone(), settings)
            .with_attempt_log(dir.join("verify_attempt_log.json"));
        let output = OutputSettings {
            log_file: dir.join("log.txt"),
            deploy_log: dir.join("deploy_log.json"),
            verify_log: dir.join("verify_attempt_log.json"),
            ui_manifest: Some(dir.join("ui.json")),
        };
        let helper = DeployHelper::new(
            Network::new(network),
            offline_estimator(),
            Arc::new(test_store()),
            batcher,
        )
        .with_output(output);
        (helper, verifier)
    }

    #[tokio::test]
    async fn test_calls_before_init_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (mut helper, _) = test_helper("hardhat", dir.path());

        let err = helper
            .deploy_contract("Plain", "Plain", Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::InvalidPhase { found: "uninitialized", .. }));
        assert!(matches!(helper.post_run().await, Err(DeployError::InvalidPhase { .. })));
        assert!(helper.get_overrides().await.is_err());
    }

    #[tokio::test]
    async fn test_full_run_on_local_network() {
        let dir = tempfile::tempdir().unwrap();
        let (mut helper, verifier) = test_helper("hardhat", dir.path());
        let chain = Arc::new(MockChain::new());
        helper.init_with_chain(chain.clone()).await.unwrap();
        assert_eq!(helper.phase(), Phase::Initialized);

        let token = helper
            .deploy_contract("MyToken", "Token", json!(["TKN", 1000]))
            .await
            .unwrap();
        assert_eq!(helper.address_of("MyToken"), token.address());
        assert_eq!(helper.address_of("Nothing"), Address::ZERO);
        helper
            .deploy_initializable_contract("Vault", "Vault", json!([token.address().to_string(), 5]))
            .await
            .unwrap();
        assert_eq!(helper.phase(), Phase::Deploying);

        let report = helper.post_run().await.unwrap();
        assert_eq!(helper.phase(), Phase::Done);

        // two deployments plus one initialize
        assert_eq!(report.total_cost, U256::from(3 * TX_COST));
        assert_eq!(report.elapsed_secs, 3 * BLOCK_TIME);
        assert_eq!(report.fees, Some(FeeOverride::NodeDefault));
        assert_eq!(report.verification.total(), 0);
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 0);
        assert_eq!(report.contracts["MyToken"], token.address().to_string());

        let deploy_log: Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("deploy_log.json")).unwrap())
                .unwrap();
        assert_eq!(deploy_log["MyToken"]["args"], json!(["TKN", 1000]));
        assert_eq!(deploy_log["Vault"]["initialized"], json!(true));

        let manifest: Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("ui.json")).unwrap()).unwrap();
        assert_eq!(manifest["Vault"]["VAULT_TYPE"], json!("experimental"));
        assert_eq!(manifest["Vault"]["CHAIN_ID"], json!(31337));
        assert_eq!(manifest["MyToken"]["TITLE"], json!("MyToken"));
        assert_eq!(manifest["MyToken"]["ABI"], json!("Token"));
        assert_eq!(report.manifest, manifest);

        assert!(helper.deploy_contract("Plain", "Plain", Value::Null).await.is_err());
    }

    #[tokio::test]
    async fn test_post_run_verifies_on_testnet() {
        let dir = tempfile::tempdir().unwrap();
        let (mut helper, verifier) = test_helper("goerli", dir.path());
        helper
            .init_with_chain(Arc::new(MockChain::new()))
            .await
            .unwrap();

        helper
            .deploy_contract("A", "Plain", Value::Null)
            .await
            .unwrap();
        helper
            .deploy_contract("B", "Plain", json!([]))
            .await
            .unwrap();

        let report = helper.post_run().await.unwrap();
        assert_eq!(report.verification.passed, 2);
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 2);
        assert!(report.contracts["A"].starts_with("https://goerli.etherscan.io/address/"));
        assert!(matches!(report.fees, Some(FeeOverride::Eip1559 { .. })));
        assert!(dir.path().join("verify_attempt_log.json").exists());
    }

    #[tokio::test]
    async fn test_add_contract_kind_from_args() {
        let dir = tempfile::tempdir().unwrap();
        let (mut helper, _) = test_helper("hardhat", dir.path());
        helper
            .init_with_chain(Arc::new(MockChain::new()))
            .await
            .unwrap();

        let existing = Address::repeat_byte(0x42);
        helper
            .add_contract("Old", "Token", existing, json!(["TKN", 1]))
            .unwrap();
        helper
            .add_contract("Proxy", "Vault", existing, Value::Null)
            .unwrap();

        assert_eq!(helper.get_contract("Old").unwrap().address(), existing);
        assert!(!helper.registry().get("Old").unwrap().kind.is_initialized());
        assert!(helper.registry().get("Proxy").unwrap().kind.is_initialized());
        assert!(helper.add_contract("X", "Missing", existing, Value::Null).is_err());
    }

    #[tokio::test]
    async fn test_redeploy_replaces_record() {
        let dir = tempfile::tempdir().unwrap();
        let (mut helper, _) = test_helper("hardhat", dir.path());
        helper
            .init_with_chain(Arc::new(MockChain::new()))
            .await
            .unwrap();

        let first = helper
            .deploy_contract("Thing", "Plain", Value::Null)
            .await
            .unwrap();
        let second = helper
            .deploy_initializable_contract("Thing", "Vault", Value::Null)
            .await
            .unwrap();

        assert_ne!(first.address(), second.address());
        assert_eq!(helper.registry().len(), 1);
        let record = helper.registry().get("Thing").unwrap();
        assert_eq!(record.source_name, "Vault");
        assert!(record.kind.is_initialized());
    }

    #[tokio::test]
    async fn test_object_args_need_opt_in() {
        let dir = tempfile::tempdir().unwrap();
        let (mut helper, _) = test_helper("hardhat", dir.path());
        helper
            .init_with_chain(Arc::new(MockChain::new()))
            .await
            .unwrap();

        let err = helper
            .deploy_contract("T", "Token", json!({"symbol": "TKN", "supply": 1}))
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn test_distribution_and_ownership() {
        let dir = tempfile::tempdir().unwrap();
        let (helper, _) = test_helper("hardhat", dir.path());
        let multisig = Address::repeat_byte(0x99);
        let mut helper = helper.with_multisig(Some(multisig));
        let chain = Arc::new(MockChain::new());
        helper.init_with_chain(chain.clone()).await.unwrap();

        let token = helper
            .deploy_contract("MyToken", "Token", json!(["TKN", 100]))
            .await
            .unwrap();
        chain.set_token_balance(token.address(), U256::from(100));

        helper.add_dist("0x00000000000000000000000000000000000000aa", U256::from(30));
        helper.add_dist("MyToken", U256::from(20));
        helper.add_dist("MyToken", U256::from(70));
        assert_eq!(helper.distribution().len(), 2);

        helper.check_enough_tokens_to_distribute("MyToken").await.unwrap();
        helper.distribute("MyToken").await.unwrap();
        helper
            .transfer_ownership_to_multisig("MyToken")
            .await
            .unwrap();

        let sent = chain.sent();
        assert_eq!(sent.len(), 3);
        assert!(sent.iter().all(|tx| tx.to == token.address()));
    }

    #[tokio::test]
    async fn test_advance_time_only_on_local_chains() {
        let dir = tempfile::tempdir().unwrap();
        let (mut helper, _) = test_helper("hardhat", dir.path());
        helper
            .init_with_chain(Arc::new(MockChain::new()))
            .await
            .unwrap();
        helper.advance_time_and_block(3600).await.unwrap();
        let report = helper.post_run().await.unwrap();
        assert_eq!(report.elapsed_secs, 3600 + BLOCK_TIME);

        let (mut helper, _) = test_helper("mainnet", dir.path());
        helper
            .init_with_chain(Arc::new(MockChain::new()))
            .await
            .unwrap();
        assert!(helper.advance_time_and_block(60).await.is_err());
    }

    #[tokio::test]
    async fn test_deploy_single_contract_and_transact() {
        let dir = tempfile::tempdir().unwrap();
        let (mut helper, _) = test_helper("hardhat", dir.path());
        let chain = Arc::new(MockChain::new());
        helper.init_with_chain(chain.clone()).await.unwrap();

        helper
            .transact(Address::repeat_byte(0x05), Bytes::from_static(&[1, 2, 3]))
            .await
            .unwrap();
        assert_eq!(chain.sent()[0].data.as_ref(), &[1, 2, 3]);

        let report = helper
            .deploy_single_contract("Only", "Plain", Value::Null)
            .await
            .unwrap();
        assert_eq!(report.contracts.len(), 1);
        assert_eq!(helper.phase(), Phase::Done);
    }

    #[tokio::test]
    async fn test_post_run_survives_fee_source_outage() {
        let dir = tempfile::tempdir().unwrap();
        let (helper, verifier) = test_helper("mainnet", dir.path());
        let mut helper = DeployHelper {
            fees: unreachable_estimator(),
            ..helper
        };
        helper
            .init_with_chain(Arc::new(MockChain::new()))
            .await
            .unwrap();
        helper
            .add_contract("Old", "Plain", Address::repeat_byte(0x42), Value::Null)
            .unwrap();

        let report = helper.post_run().await.unwrap();
        assert_eq!(helper.phase(), Phase::Done);
        assert_eq!(report.fees, None);
        assert_eq!(report.verification.passed, 1);
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 1);
        assert!(dir.path().join("deploy_log.json").exists());
    }

    #[tokio::test]
    async fn test_failed_post_run_can_be_retried() {
        let dir = tempfile::tempdir().unwrap();
        let (helper, _) = test_helper("hardhat", dir.path());
        let output = OutputSettings {
            deploy_log: dir.path().join("missing").join("deploy_log.json"),
            ..OutputSettings::default()
        };
        let mut helper = helper.with_output(output);
        helper
            .init_with_chain(Arc::new(MockChain::new()))
            .await
            .unwrap();
        helper
            .deploy_contract("A", "Plain", Value::Null)
            .await
            .unwrap();

        assert!(matches!(helper.post_run().await, Err(DeployError::Io(_))));
        assert_eq!(helper.phase(), Phase::Deploying);

        fs::create_dir(dir.path().join("missing")).unwrap();
        helper.post_run().await.unwrap();
        assert_eq!(helper.phase(), Phase::Done);
        assert!(dir.path().join("missing").join("deploy_log.json").exists());
    }

    #[tokio::test]
    async fn test_manifest_kept_in_report_without_path() {
        let dir = tempfile::tempdir().unwrap();
        let (helper, _) = test_helper("hardhat", dir.path());
        let output = OutputSettings {
            deploy_log: dir.path().join("deploy_log.json"),
            ..OutputSettings::default()
        };
        let mut helper = helper.with_output(output);
        helper
            .init_with_chain(Arc::new(MockChain::new()))
            .await
            .unwrap();
        helper
            .deploy_contract("A", "Plain", Value::Null)
            .await
            .unwrap();

        let report = helper.post_run().await.unwrap();
        assert_eq!(report.manifest["A"]["ABI"], json!("Plain"));
        assert!(!dir.path().join("ui.json").exists());
    }

    #[tokio::test]
    async fn test_chain_id_must_match_config() {
        let dir = tempfile::tempdir().unwrap();
        let (mut helper, _) = test_helper("mainnet", dir.path());
        helper.network_config = Some(NetworkConfig {
            chain_id: Some(1),
            ..Default::default()
        });

        let err = helper
            .init_with_chain(Arc::new(MockChain::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::Config(_)));
        assert_eq!(helper.phase(), Phase::Uninitialized);

        helper.network_config = Some(NetworkConfig {
            chain_id: Some(31337),
            ..Default::default()
        });
        helper
            .init_with_chain(Arc::new(MockChain::new()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_deploy_with_array_and_struct_args() {
        let dir = tempfile::tempdir().unwrap();
        let (helper, _) = test_helper("hardhat", dir.path());
        let mut helper = helper.wrap_object_args(true);
        helper
            .init_with_chain(Arc::new(MockChain::new()))
            .await
            .unwrap();

        helper
            .deploy_contract(
                "Roster",
                "Roster",
                json!([[
                    "0x0000000000000000000000000000000000000001",
                    "0x0000000000000000000000000000000000000002"
                ]]),
            )
            .await
            .unwrap();
        helper
            .deploy_initializable_contract(
                "Pool",
                "Pool",
                json!({"owner": "0x0000000000000000000000000000000000000003", "cap": 10}),
            )
            .await
            .unwrap();

        let pool = helper.registry().get("Pool").unwrap();
        assert_eq!(pool.kind.args().len(), 1);
        assert!(pool.kind.args()[0].is_object());
    }
}
