//! Network identity and classification.
//!
//! Every branch on "which kind of chain is this" goes through
//! [`NetworkClass::classify`]; nothing else compares network names.

use serde::{Deserialize, Serialize};

use crate::config::NetworkConfig;

/// Fee model and verification rules that apply to a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NetworkClass {
    /// In-process ephemeral chain
    Local,
    /// Local fork of mainnet that must behave like mainnet
    MainnetFork,
    EthereumMainnet,
    EthereumTestnet,
    /// Polygon family
    Matic,
    Other,
}

impl NetworkClass {
    pub const ALL: [NetworkClass; 6] = [
        Self::Local,
        Self::MainnetFork,
        Self::EthereumMainnet,
        Self::EthereumTestnet,
        Self::Matic,
        Self::Other,
    ];

    pub fn classify(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "hardhat" | "anvil" => Self::Local,
            "localhost" => Self::MainnetFork,
            "mainnet" => Self::EthereumMainnet,
            "rinkeby" | "goerli" | "ropsten" | "sepolia" => Self::EthereumTestnet,
            "matic" | "mumbai" | "polygon" | "amoy" => Self::Matic,
            _ => Self::Other,
        }
    }

    /// Networks with EIP-1559 fee fields and Etherscan verification
    pub fn is_ethereum(&self) -> bool {
        matches!(self, Self::EthereumMainnet | Self::EthereumTestnet)
    }

    pub fn is_matic(&self) -> bool {
        matches!(self, Self::Matic)
    }

    /// Networks where balance shortfalls are fatal
    pub fn is_mainnet_class(&self) -> bool {
        matches!(self, Self::EthereumMainnet | Self::MainnetFork)
    }

    pub fn supports_verification(&self) -> bool {
        self.is_ethereum() || self.is_matic()
    }
}

impl std::fmt::Display for NetworkClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkClass::Local => write!(f, "local"),
            NetworkClass::MainnetFork => write!(f, "mainnet-fork"),
            NetworkClass::EthereumMainnet => write!(f, "ethereum-mainnet"),
            NetworkClass::EthereumTestnet => write!(f, "ethereum-testnet"),
            NetworkClass::Matic => write!(f, "matic"),
            NetworkClass::Other => write!(f, "other"),
        }
    }
}

/// The active network, fixed for the whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    pub name: String,
    pub class: NetworkClass,
    /// Fixed legacy gas price in wei, if configured
    pub gas_price: Option<u128>,
    pub explorer_url: Option<String>,
    pub explorer_api_url: Option<String>,
}

impl Network {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            class: NetworkClass::classify(&name),
            name,
            gas_price: None,
            explorer_url: None,
            explorer_api_url: None,
        }
    }

    pub fn from_config(name: &str, config: &NetworkConfig) -> Self {
        let mut network = Self::new(name);
        if let Some(class) = config.class {
            network.class = class;
        }
        network.gas_price = config.gas_price.map(u128::from);
        network.explorer_url = config.explorer_url.clone();
        network.explorer_api_url = config.explorer_api_url.clone();
        network
    }

    pub fn with_gas_price(mut self, gas_price: u128) -> Self {
        self.gas_price = Some(gas_price);
        self
    }

    /// Prefix for human-facing contract links in the final report
    pub fn explorer_address_prefix(&self) -> Option<String> {
        if let Some(url) = &self.explorer_url {
            return Some(format!("{}/address/", url.trim_end_matches('/')));
        }
        match self.class {
            NetworkClass::EthereumMainnet => Some("https://etherscan.io/address/".to_string()),
            NetworkClass::EthereumTestnet => {
                Some(format!("https://{}.etherscan.io/address/", self.name))
            }
            _ => None,
        }
    }

    /// Etherscan-compatible API endpoint used for source verification
    pub fn explorer_api_url(&self) -> Option<String> {
        if let Some(url) = &self.explorer_api_url {
            return Some(url.clone());
        }
        match (self.class, self.name.as_str()) {
            (NetworkClass::EthereumMainnet, _) => Some("https://api.etherscan.io/api".to_string()),
            (NetworkClass::EthereumTestnet, name) => {
                Some(format!("https://api-{}.etherscan.io/api", name))
            }
            (NetworkClass::Matic, "mumbai" | "amoy") => {
                Some("https://api-testnet.polygonscan.com/api".to_string())
            }
            (NetworkClass::Matic, _) => Some("https://api.polygonscan.com/api".to_string()),
            _ => None,
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
