use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use alloy::primitives::Address;
use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::KeychainManager;
use crate::network::NetworkClass;

const CONFIG_DIR: &str = "deploy-helper";
const CONFIG_FILE: &str = "config.toml";
const PROJECT_CONFIG_FILE: &str = "deploy.toml";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub networks: HashMap<String, NetworkConfig>,

    #[serde(default)]
    pub api_keys: HashMap<String, String>,

    #[serde(default)]
    pub fees: FeeSettings,

    #[serde(default)]
    pub verification: VerificationSettings,

    #[serde(default)]
    pub output: OutputSettings,

    #[serde(default)]
    pub deploy: DeploySettings,

    /// Receiver of contract ownership after deployment. Defaults to the signer.
    pub multisig: Option<Address>,

    #[serde(skip)]
    config_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub rpc_url: String,
    /// Checked against the node's chain id when the run starts.
    pub chain_id: Option<u64>,
    /// Overrides the class derived from the network name.
    pub class: Option<NetworkClass>,
    /// Fixed legacy gas price in wei. TOML integers stop at `i64`.
    pub gas_price: Option<u64>,
    pub explorer_url: Option<String>,
    pub explorer_api_url: Option<String>,
    #[serde(default)]
    pub account: AccountConfig,
}

/// Signer for a network. Values may be literal, `env:VAR` or `keychain:entry`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountConfig {
    pub private_key: Option<String>,
    pub mnemonic: Option<String>,
    #[serde(default)]
    pub mnemonic_index: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeSettings {
    /// Floor applied to oracle prices on Matic-family networks.
    pub min_gas_price_gwei: u64,
    pub max_fee_per_gas_gwei: u64,
    pub max_priority_fee_per_gas_gwei: u64,
    pub gas_limit: u64,
    /// Minimum confidence of a block-price tier to be considered.
    pub confidence_min: u32,
    pub blocknative_url: String,
    pub polygonscan_url: String,
}

impl Default for FeeSettings {
    fn default() -> Self {
        Self {
            min_gas_price_gwei: 100,
            max_fee_per_gas_gwei: 10,
            max_priority_fee_per_gas_gwei: 3,
            gas_limit: 10_000_000,
            confidence_min: 80,
            blocknative_url: "https://api.blocknative.com/gasprices/blockprices".to_string(),
            polygonscan_url: "https://api.polygonscan.com/api".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationSettings {
    pub batch_size: usize,
    pub settle_delay_secs: u64,
    pub single_delay_secs: u64,
    pub batch_cooldown_secs: u64,
    pub poll_interval_secs: u64,
    pub poll_attempts: u32,
}

impl Default for VerificationSettings {
    fn default() -> Self {
        Self {
            batch_size: 5,
            settle_delay_secs: 20,
            single_delay_secs: 10,
            batch_cooldown_secs: 2,
            poll_interval_secs: 5,
            poll_attempts: 12,
        }
    }
}

impl VerificationSettings {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }

    pub fn single_delay(&self) -> Duration {
        Duration::from_secs(self.single_delay_secs)
    }

    pub fn batch_cooldown(&self) -> Duration {
        Duration::from_secs(self.batch_cooldown_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub log_file: PathBuf,
    pub deploy_log: PathBuf,
    pub verify_log: PathBuf,
    pub ui_manifest: Option<PathBuf>,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            log_file: PathBuf::from("log.txt"),
            deploy_log: PathBuf::from("deploy_log.json"),
            verify_log: PathBuf::from("verify_attempt_log.json"),
            ui_manifest: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploySettings {
    /// Wrap a single plain-object argument into a one-element argument list.
    pub wrap_object_args: bool,
}

impl AppConfig {
    /// Load `deploy.toml` from the project root, falling back to the user config
    pub fn load(project_root: &Path) -> Result<Self> {
        let project_config = project_root.join(PROJECT_CONFIG_FILE);
        if project_config.exists() {
            return Self::load_from(&project_config);
        }

        let config_path = Self::default_config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self {
                config_path: Some(config_path),
                ..Default::default()
            })
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: AppConfig =
            toml::from_str(&content).wrap_err("Failed to parse config file")?;

        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Get the config file path
    pub fn config_path(&self) -> Option<PathBuf> {
        self.config_path.clone().or_else(|| Self::default_config_path().ok())
    }

    fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| eyre::eyre!("Could not determine config directory"))?;

        Ok(config_dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    pub fn network(&self, name: &str) -> Option<&NetworkConfig> {
        self.networks.get(name)
    }

    /// Resolve an API key by name. Missing keys resolve to `None`.
    pub fn resolve_api_key(&self, name: &str) -> Result<Option<Zeroizing<String>>> {
        match self.api_keys.get(name) {
            Some(value) => resolve_secret(value),
            None => Ok(None),
        }
    }
}

/// Resolve a secret reference: `keychain:<entry>`, `env:<VAR>` or a literal value
pub fn resolve_secret(value: &str) -> Result<Option<Zeroizing<String>>> {
    if let Some(keychain_ref) = value.strip_prefix("keychain:") {
        KeychainManager::new().get_zeroizing(keychain_ref)
    } else if let Some(env_var) = value.strip_prefix("env:") {
        Ok(std::env::var(env_var).ok().map(Zeroizing::new))
    } else {
        Ok(Some(Zeroizing::new(value.to_string())))
    }
}
