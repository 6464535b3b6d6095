use alloy::signers::local::{MnemonicBuilder, PrivateKeySigner, coins_bip39::English};
use eyre::{Result, WrapErr, eyre};

use crate::config::{AccountConfig, resolve_secret};

/// Resolve the deployer key for a network: a direct private key wins,
/// otherwise the key is derived from the mnemonic at `mnemonic_index`.
pub fn resolve_signer(account: &AccountConfig) -> Result<PrivateKeySigner> {
    if let Some(reference) = &account.private_key {
        let key = resolve_secret(reference)?
            .ok_or_else(|| eyre!("Private key reference {} did not resolve", reference))?;
        return parse_private_key(key.as_str());
    }

    if let Some(reference) = &account.mnemonic {
        let phrase = resolve_secret(reference)?
            .ok_or_else(|| eyre!("Mnemonic reference {} did not resolve", reference))?;
        return MnemonicBuilder::<English>::default()
            .phrase(phrase.as_str())
            .index(account.mnemonic_index)
            .wrap_err("Invalid mnemonic index")?
            .build()
            .wrap_err("Failed to derive key from mnemonic");
    }

    Err(eyre!("No private key or mnemonic configured"))
}

fn parse_private_key(key: &str) -> Result<PrivateKeySigner> {
    let clean_key = key.trim().strip_prefix("0x").unwrap_or(key.trim());
    if clean_key.len() != 64 || !clean_key.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(eyre!(
            "Invalid private key format: expected 64 hex characters"
        ));
    }
    clean_key.parse().wrap_err("Failed to parse private key")
}
