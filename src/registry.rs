//! Registry of deployed contracts, keyed by logical name.

use alloy::primitives::Address;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::contracts::{ContractHandle, display_args};
use crate::error::{DeployError, Result};

/// How a contract was brought up
#[derive(Debug, Clone, PartialEq)]
pub enum DeploymentKind {
    Plain { constructor_args: Vec<Value> },
    /// Deployed without constructor args, then `initialize(init_args)`
    Initialized { init_args: Vec<Value> },
}

impl DeploymentKind {
    pub fn args(&self) -> &[Value] {
        match self {
            DeploymentKind::Plain { constructor_args } => constructor_args,
            DeploymentKind::Initialized { init_args } => init_args,
        }
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self, DeploymentKind::Initialized { .. })
    }

    /// Constructor args the explorer must see. Initialized contracts were
    /// created with none.
    pub fn verification_args(&self) -> &[Value] {
        match self {
            DeploymentKind::Plain { constructor_args } => constructor_args,
            DeploymentKind::Initialized { .. } => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentRecord {
    pub name: String,
    /// Artifact the contract was compiled from
    pub source_name: String,
    pub handle: ContractHandle,
    pub kind: DeploymentKind,
}

impl DeploymentRecord {
    pub fn address(&self) -> Address {
        self.handle.address()
    }

    pub(crate) fn log_entry(&self) -> DeployLogEntry {
        DeployLogEntry {
            address: self.address(),
            args: self.kind.args().to_vec(),
            initialized: self.kind.is_initialized(),
            src_name: self.source_name.clone(),
        }
    }
}

/// One entry of `deploy_log.json`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DeployLogEntry {
    pub address: Address,
    pub args: Vec<Value>,
    pub initialized: bool,
    pub src_name: String,
}

/// Insertion-ordered `name -> record` map.
///
/// Re-registering a name replaces the whole record but keeps the name's
/// original position in reports.
#[derive(Debug, Default, Clone)]
pub struct ContractRegistry {
    records: IndexMap<String, DeploymentRecord>,
}

impl ContractRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the replaced record, if any
    pub fn insert(&mut self, record: DeploymentRecord) -> Option<DeploymentRecord> {
        let previous = self.records.insert(record.name.clone(), record);
        if let Some(old) = &previous {
            tracing::warn!(
                "Replacing registry entry {} (was {} with args {})",
                old.name,
                old.address(),
                display_args(old.kind.args())
            );
        }
        previous
    }

    pub fn get(&self, name: &str) -> Result<&DeploymentRecord> {
        self.records
            .get(name)
            .ok_or_else(|| DeployError::UnknownContract(name.to_string()))
    }

    /// Zero address for unknown names
    pub fn address_of(&self, name: &str) -> Address {
        self.records
            .get(name)
            .map(DeploymentRecord::address)
            .unwrap_or(Address::ZERO)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    pub fn all(&self) -> impl Iterator<Item = &DeploymentRecord> {
        self.records.values()
    }

    /// Owned copy of every record, in registration order
    pub fn snapshot(&self) -> Vec<DeploymentRecord> {
        self.records.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub(crate) fn deploy_log(&self) -> IndexMap<String, DeployLogEntry> {
        self.records
            .iter()
            .map(|(name, record)| (name.clone(), record.log_entry()))
            .collect()
    }
}
