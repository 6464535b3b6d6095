//! External gas-price oracles.
//!
//! Both oracles are HTTP GET endpoints. Any transport failure, non-success
//! status or unexpected body shape surfaces as [`DeployError::FeeSource`].

use alloy::primitives::utils::parse_units;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use zeroize::Zeroizing;

use crate::error::{DeployError, Result};

/// Converts whole gwei to wei.
pub fn gwei(amount: u64) -> u128 {
    u128::from(amount) * 1_000_000_000
}

/// Parses a decimal gwei amount (e.g. `"31.5"`) into wei.
pub fn gwei_str_to_wei(amount: &str) -> Result<u128> {
    let parsed = parse_units(amount.trim(), "gwei")
        .map_err(|e| DeployError::fee_source(format!("invalid gwei amount {amount:?}: {e}")))?;
    if parsed.is_negative() {
        return Err(DeployError::fee_source(format!("negative gas price {amount:?}")));
    }
    u128::try_from(parsed.get_absolute())
        .map_err(|_| DeployError::fee_source(format!("gas price {amount:?} out of range")))
}

fn gwei_f64_to_wei(amount: f64) -> Result<u128> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(DeployError::fee_source(format!("invalid gas price {amount}")));
    }
    gwei_str_to_wei(&format!("{amount:.9}"))
}

/// One confidence tier of a block price estimate.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimatedPrice {
    pub confidence: u32,
    /// Gwei
    pub max_priority_fee_per_gas: f64,
    /// Gwei
    pub max_fee_per_gas: f64,
}

impl EstimatedPrice {
    pub fn max_fee_per_gas_wei(&self) -> Result<u128> {
        gwei_f64_to_wei(self.max_fee_per_gas)
    }

    pub fn max_priority_fee_per_gas_wei(&self) -> Result<u128> {
        gwei_f64_to_wei(self.max_priority_fee_per_gas)
    }
}

/// Tiered EIP-1559 fee estimates for the next block.
#[async_trait]
pub trait BlockPriceOracle: Send + Sync {
    async fn estimated_prices(&self) -> Result<Vec<EstimatedPrice>>;
}

/// Single gas price for Matic-family networks.
#[async_trait]
pub trait GasStationOracle: Send + Sync {
    /// Fast tier, in wei
    async fn fast_gas_price(&self) -> Result<u128>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockPricesResponse {
    block_prices: Vec<BlockPrice>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockPrice {
    estimated_prices: Vec<EstimatedPrice>,
}

/// Blocknative `gasprices/blockprices` client
pub struct BlocknativeOracle {
    client: reqwest::Client,
    url: String,
    api_key: Option<Zeroizing<String>>,
}

impl BlocknativeOracle {
    pub fn new(url: impl Into<String>, api_key: Option<Zeroizing<String>>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            api_key,
        }
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(key) = &self.api_key {
            let value = HeaderValue::from_str(key.as_str())
                .map_err(|e| DeployError::fee_source(format!("invalid blocknative key: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }
}

#[async_trait]
impl BlockPriceOracle for BlocknativeOracle {
    async fn estimated_prices(&self) -> Result<Vec<EstimatedPrice>> {
        let response = self
            .client
            .get(&self.url)
            .headers(self.headers()?)
            .send()
            .await
            .map_err(|e| DeployError::fee_source(format!("blocknative unreachable: {e}")))?
            .error_for_status()
            .map_err(|e| DeployError::fee_source(format!("blocknative error: {e}")))?;

        let body: BlockPricesResponse = response
            .json()
            .await
            .map_err(|e| DeployError::fee_source(format!("malformed blocknative response: {e}")))?;

        body.block_prices
            .into_iter()
            .next()
            .map(|block| block.estimated_prices)
            .ok_or_else(|| DeployError::fee_source("blocknative returned no block prices"))
    }
}

#[derive(Debug, Deserialize)]
struct GasOracleResponse {
    result: GasOracleResult,
}

#[derive(Debug, Deserialize)]
struct GasOracleResult {
    #[serde(rename = "FastGasPrice")]
    fast_gas_price: String,
}

/// Polygonscan `gastracker/gasoracle` client
pub struct PolygonscanGasOracle {
    client: reqwest::Client,
    url: String,
    api_key: Option<Zeroizing<String>>,
}

impl PolygonscanGasOracle {
    pub fn new(url: impl Into<String>, api_key: Option<Zeroizing<String>>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            api_key,
        }
    }
}

#[async_trait]
impl GasStationOracle for PolygonscanGasOracle {
    async fn fast_gas_price(&self) -> Result<u128> {
        let api_key = self.api_key.as_ref().map(|k| k.as_str()).unwrap_or_default();
        let params = [
            ("module", "gastracker"),
            ("action", "gasoracle"),
            ("apikey", api_key),
        ];

        let response = self
            .client
            .get(&self.url)
            .query(&params)
            .send()
            .await
            .map_err(|e| DeployError::fee_source(format!("polygonscan unreachable: {e}")))?
            .error_for_status()
            .map_err(|e| DeployError::fee_source(format!("polygonscan error: {e}")))?;

        // An invalid key yields a string `result`, which fails here
        let body: GasOracleResponse = response
            .json()
            .await
            .map_err(|e| DeployError::fee_source(format!("malformed gas oracle response: {e}")))?;

        gwei_str_to_wei(&body.result.fast_gas_price)
    }
}
