mod client;
#[cfg(test)]
pub(crate) mod mock;
mod signer;

pub use client::{ChainClient, REQUIRED_CONFIRMATIONS, RpcClient};
pub use signer::resolve_signer;
