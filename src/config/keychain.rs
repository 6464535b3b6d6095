use eyre::{Result, WrapErr};
use keyring::Entry;
use zeroize::Zeroizing;

const SERVICE_NAME: &str = "deploy-helper";

/// Read access to deployer secrets kept in the OS keychain
pub struct KeychainManager {
    service: String,
}

impl KeychainManager {
    pub fn new() -> Self {
        Self {
            service: SERVICE_NAME.to_string(),
        }
    }

    /// Store a secret (signer key, mnemonic or explorer API key)
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let entry = Entry::new(&self.service, key)
            .wrap_err_with(|| format!("Failed to create keychain entry for {}", key))?;

        entry
            .set_password(value)
            .wrap_err_with(|| format!("Failed to store secret for {}", key))?;

        tracing::info!("Stored secret in keychain: {}", key);
        Ok(())
    }

    /// Retrieve a secret, zeroized on drop. Missing entries resolve to `None`.
    pub fn get_zeroizing(&self, key: &str) -> Result<Option<Zeroizing<String>>> {
        let entry = Entry::new(&self.service, key)
            .wrap_err_with(|| format!("Failed to access keychain entry for {}", key))?;

        match entry.get_password() {
            Ok(password) => Ok(Some(Zeroizing::new(password))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).wrap_err_with(|| format!("Failed to retrieve secret for {}", key)),
        }
    }
}

impl Default for KeychainManager {
    fn default() -> Self {
        Self::new()
    }
}
