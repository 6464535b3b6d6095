use alloy::{
    eips::BlockNumberOrTag,
    network::{EthereumWallet, TransactionBuilder},
    primitives::{Address, Bytes, TxHash, U256},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::{TransactionReceipt, TransactionRequest},
    signers::local::PrivateKeySigner,
};
use async_trait::async_trait;

use crate::error::{DeployError, Result};
use crate::fees::FeeOverride;

/// Confirmations awaited before a transaction counts as final.
pub const REQUIRED_CONFIRMATIONS: u64 = 1;

/// Signed access to a chain for a single funded account.
///
/// Every mutating call waits for [`REQUIRED_CONFIRMATIONS`] and fails if the
/// transaction reverted. Calls are never issued concurrently from one signer.
#[async_trait]
pub trait ChainClient: Send + Sync {
    fn signer_address(&self) -> Address;

    async fn chain_id(&self) -> Result<u64>;

    async fn balance(&self, address: Address) -> Result<U256>;

    /// Current network gas price in wei
    async fn gas_price(&self) -> Result<u128>;

    /// Timestamp of the latest block
    async fn block_timestamp(&self) -> Result<u64>;

    /// Submits a contract creation and returns the deployed address.
    async fn deploy(&self, code: Bytes, fees: &FeeOverride) -> Result<Address>;

    /// Submits a call to `to` and returns the mined transaction hash.
    async fn send(&self, to: Address, data: Bytes, fees: &FeeOverride) -> Result<TxHash>;

    /// Read-only call
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes>;

    /// `evm_increaseTime`, local chains only
    async fn increase_time(&self, seconds: u64) -> Result<()>;

    /// `evm_mine`, local chains only
    async fn mine_block(&self) -> Result<()>;
}

/// [`ChainClient`] backed by an alloy HTTP provider with a local wallet
pub struct RpcClient {
    provider: DynProvider,
    signer: Address,
}

impl RpcClient {
    pub async fn connect(rpc_url: &str, signer: PrivateKeySigner) -> Result<Self> {
        let address = signer.address();
        let wallet = EthereumWallet::from(signer);

        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .connect(rpc_url)
            .await
            .map_err(|e| DeployError::rpc(format!("failed to connect to {rpc_url}: {e}")))?
            .erased();

        Ok(Self {
            provider,
            signer: address,
        })
    }

    async fn submit(&self, tx: TransactionRequest) -> Result<TransactionReceipt> {
        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| DeployError::rpc(format!("failed to send transaction: {e}")))?;

        let tx_hash = *pending.tx_hash();
        tracing::debug!("Submitted transaction {:?}", tx_hash);

        let receipt = pending
            .with_required_confirmations(REQUIRED_CONFIRMATIONS)
            .get_receipt()
            .await
            .map_err(|e| DeployError::rpc(format!("failed to confirm {tx_hash:?}: {e}")))?;

        if !receipt.status() {
            return Err(DeployError::rpc(format!("transaction {tx_hash:?} reverted")));
        }

        Ok(receipt)
    }
}

#[async_trait]
impl ChainClient for RpcClient {
    fn signer_address(&self) -> Address {
        self.signer
    }

    async fn chain_id(&self) -> Result<u64> {
        self.provider.get_chain_id().await.map_err(DeployError::rpc)
    }

    async fn balance(&self, address: Address) -> Result<U256> {
        self.provider
            .get_balance(address)
            .await
            .map_err(DeployError::rpc)
    }

    async fn gas_price(&self) -> Result<u128> {
        self.provider.get_gas_price().await.map_err(DeployError::rpc)
    }

    async fn block_timestamp(&self) -> Result<u64> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Latest)
            .await
            .map_err(DeployError::rpc)?
            .ok_or_else(|| DeployError::rpc("latest block not found"))?;

        Ok(block.header.timestamp)
    }

    async fn deploy(&self, code: Bytes, fees: &FeeOverride) -> Result<Address> {
        let tx = fees.apply(TransactionRequest::default().with_deploy_code(code));
        let receipt = self.submit(tx).await?;

        receipt.contract_address.ok_or_else(|| {
            DeployError::rpc(format!(
                "receipt {:?} has no contract address",
                receipt.transaction_hash
            ))
        })
    }

    async fn send(&self, to: Address, data: Bytes, fees: &FeeOverride) -> Result<TxHash> {
        let tx = fees.apply(TransactionRequest::default().with_to(to).with_input(data));
        let receipt = self.submit(tx).await?;
        Ok(receipt.transaction_hash)
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes> {
        let tx = TransactionRequest::default().with_to(to).with_input(data);
        self.provider.call(tx).await.map_err(DeployError::rpc)
    }

    async fn increase_time(&self, seconds: u64) -> Result<()> {
        self.provider
            .raw_request::<_, serde_json::Value>("evm_increaseTime".into(), (seconds,))
            .await
            .map_err(DeployError::rpc)?;
        Ok(())
    }

    async fn mine_block(&self) -> Result<()> {
        self.provider
            .raw_request::<_, serde_json::Value>("evm_mine".into(), Vec::<u64>::new())
            .await
            .map_err(DeployError::rpc)?;
        Ok(())
    }
}
