//! In-memory [`ChainClient`] for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use alloy::primitives::{Address, B256, Bytes, TxHash, U256, keccak256};
use async_trait::async_trait;

use super::ChainClient;
use crate::error::{DeployError, Result};
use crate::fees::FeeOverride;

#[derive(Debug, Clone)]
pub struct SentTx {
    pub to: Address,
    pub data: Bytes,
    pub fees: FeeOverride,
}

#[derive(Debug, Default)]
struct MockState {
    nonce: u64,
    balance: U256,
    gas_price: u128,
    timestamp: u64,
    deployments: Vec<(Bytes, FeeOverride)>,
    sent: Vec<SentTx>,
    call_results: HashMap<Address, Bytes>,
    fail_deploy_at: Option<usize>,
    fail_send_at: Option<usize>,
    rpc_calls: usize,
}

pub struct MockChain {
    signer: Address,
    state: Mutex<MockState>,
}

/// Wei charged per mined transaction
pub const TX_COST: u64 = 1_000;
/// Seconds between mined blocks
pub const BLOCK_TIME: u64 = 12;

impl MockChain {
    pub fn new() -> Self {
        Self {
            signer: Address::repeat_byte(0x11),
            state: Mutex::new(MockState {
                balance: U256::from(1_000_000_000u64),
                gas_price: 2_000_000_000,
                timestamp: 1_700_000_000,
                ..Default::default()
            }),
        }
    }

    pub fn with_gas_price(self, gas_price: u128) -> Self {
        self.state.lock().unwrap().gas_price = gas_price;
        self
    }

    pub fn fail_deploy_at(self, index: usize) -> Self {
        self.state.lock().unwrap().fail_deploy_at = Some(index);
        self
    }

    pub fn fail_send_at(self, index: usize) -> Self {
        self.state.lock().unwrap().fail_send_at = Some(index);
        self
    }

    /// Make `balanceOf` on `token` return `amount`
    pub fn set_token_balance(&self, token: Address, amount: U256) {
        let encoded = Bytes::from(amount.to_be_bytes::<32>().to_vec());
        self.state.lock().unwrap().call_results.insert(token, encoded);
    }

    pub fn deployments(&self) -> Vec<(Bytes, FeeOverride)> {
        self.state.lock().unwrap().deployments.clone()
    }

    pub fn sent(&self) -> Vec<SentTx> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn rpc_calls(&self) -> usize {
        self.state.lock().unwrap().rpc_calls
    }

    /// Address the next deployment will land on
    pub fn next_address(&self) -> Address {
        self.signer.create(self.state.lock().unwrap().nonce)
    }

    fn mine(state: &mut MockState) -> u64 {
        let nonce = state.nonce;
        state.nonce += 1;
        state.balance = state.balance.saturating_sub(U256::from(TX_COST));
        state.timestamp += BLOCK_TIME;
        nonce
    }
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChainClient for MockChain {
    fn signer_address(&self) -> Address {
        self.signer
    }

    async fn chain_id(&self) -> Result<u64> {
        self.state.lock().unwrap().rpc_calls += 1;
        Ok(31337)
    }

    async fn balance(&self, _address: Address) -> Result<U256> {
        let mut state = self.state.lock().unwrap();
        state.rpc_calls += 1;
        Ok(state.balance)
    }

    async fn gas_price(&self) -> Result<u128> {
        let mut state = self.state.lock().unwrap();
        state.rpc_calls += 1;
        Ok(state.gas_price)
    }

    async fn block_timestamp(&self) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        state.rpc_calls += 1;
        Ok(state.timestamp)
    }

    async fn deploy(&self, code: Bytes, fees: &FeeOverride) -> Result<Address> {
        let mut state = self.state.lock().unwrap();
        state.rpc_calls += 1;
        if state.fail_deploy_at == Some(state.deployments.len()) {
            state.deployments.push((code, *fees));
            return Err(DeployError::rpc("transaction reverted"));
        }
        state.deployments.push((code, *fees));
        let nonce = Self::mine(&mut state);
        Ok(self.signer.create(nonce))
    }

    async fn send(&self, to: Address, data: Bytes, fees: &FeeOverride) -> Result<TxHash> {
        let mut state = self.state.lock().unwrap();
        state.rpc_calls += 1;
        let failed = state.fail_send_at == Some(state.sent.len());
        state.sent.push(SentTx {
            to,
            data: data.clone(),
            fees: *fees,
        });
        if failed {
            return Err(DeployError::rpc("transaction reverted"));
        }
        let nonce = Self::mine(&mut state);
        let hash: B256 = keccak256([data.as_ref(), &nonce.to_be_bytes()].concat());
        Ok(hash)
    }

    async fn call(&self, to: Address, _data: Bytes) -> Result<Bytes> {
        let mut state = self.state.lock().unwrap();
        state.rpc_calls += 1;
        state
            .call_results
            .get(&to)
            .cloned()
            .ok_or_else(|| DeployError::rpc(format!("execution reverted at {to}")))
    }

    async fn increase_time(&self, seconds: u64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.rpc_calls += 1;
        state.timestamp += seconds;
        Ok(())
    }

    async fn mine_block(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.rpc_calls += 1;
        state.timestamp += BLOCK_TIME;
        Ok(())
    }
}
