mod keychain;
mod settings;

pub use keychain::KeychainManager;
pub use settings::{
    AccountConfig, AppConfig, DeploySettings, FeeSettings, NetworkConfig, OutputSettings,
    VerificationSettings, resolve_secret,
};
