//! Deploys smart contracts with network-aware fee overrides, keeps a registry
//! of what was deployed and verifies the sources on block explorers in
//! rate-limited batches.

pub mod chain;
pub mod config;
pub mod contracts;
pub mod deployer;
pub mod error;
pub mod fees;
pub mod helper;
pub mod network;
pub mod ops;
pub mod plan;
pub mod project;
pub mod registry;
pub mod verify;

pub use error::{DeployError, Result};
pub use helper::{DeployHelper, Phase, RunReport};
pub use network::{Network, NetworkClass};
pub use plan::DeployPlan;
pub use registry::{ContractRegistry, DeploymentKind, DeploymentRecord};
