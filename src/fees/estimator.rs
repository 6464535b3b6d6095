use std::sync::Arc;

use eyre::WrapErr;

use super::oracle::{
    BlockPriceOracle, BlocknativeOracle, GasStationOracle, PolygonscanGasOracle, gwei,
};
use super::FeeOverride;
use crate::chain::ChainClient;
use crate::config::{AppConfig, FeeSettings};
use crate::error::{DeployError, Result};
use crate::network::{Network, NetworkClass};

/// Keep `priority <= max_fee`; an inverted pair drops the tip to `max_fee - 1`.
pub fn clamp_priority_fee(max_fee_per_gas: u128, max_priority_fee_per_gas: u128) -> u128 {
    if max_fee_per_gas < max_priority_fee_per_gas {
        max_fee_per_gas.saturating_sub(1)
    } else {
        max_priority_fee_per_gas
    }
}

/// Computes a fresh [`FeeOverride`] for every transaction.
pub struct FeeEstimator {
    settings: FeeSettings,
    block_prices: Arc<dyn BlockPriceOracle>,
    gas_station: Arc<dyn GasStationOracle>,
}

impl FeeEstimator {
    pub fn new(
        settings: FeeSettings,
        block_prices: Arc<dyn BlockPriceOracle>,
        gas_station: Arc<dyn GasStationOracle>,
    ) -> Self {
        Self {
            settings,
            block_prices,
            gas_station,
        }
    }

    /// Wire the Blocknative and Polygonscan oracles from configuration
    pub fn from_config(config: &AppConfig) -> eyre::Result<Self> {
        let blocknative_key = config
            .resolve_api_key("blocknative")
            .wrap_err("Failed to resolve blocknative API key")?;
        let polygonscan_key = config
            .resolve_api_key("polygonscan")
            .wrap_err("Failed to resolve polygonscan API key")?;

        Ok(Self::new(
            config.fees.clone(),
            Arc::new(BlocknativeOracle::new(
                config.fees.blocknative_url.clone(),
                blocknative_key,
            )),
            Arc::new(PolygonscanGasOracle::new(
                config.fees.polygonscan_url.clone(),
                polygonscan_key,
            )),
        ))
    }

    pub fn settings(&self) -> &FeeSettings {
        &self.settings
    }

    pub async fn compute_overrides(
        &self,
        network: &Network,
        chain: &dyn ChainClient,
    ) -> Result<FeeOverride> {
        if !network.class.is_ethereum() {
            if let Some(gas_price) = network.gas_price {
                return Ok(FeeOverride::Legacy { gas_price });
            }
            if network.class.is_matic() {
                return self.matic_overrides().await;
            }
            return Ok(FeeOverride::NodeDefault);
        }

        // (max fee, priority fee)
        let mut candidate = (
            gwei(self.settings.max_fee_per_gas_gwei),
            gwei(self.settings.max_priority_fee_per_gas_gwei),
        );

        if network.class == NetworkClass::EthereumMainnet {
            candidate = self.block_price_tier().await?;
        } else {
            candidate.0 = chain.gas_price().await.map_err(|e| {
                DeployError::fee_source(format!("failed to read base fee on {network}: {e}"))
            })?;
        }

        let fees = FeeOverride::eip1559(candidate.0, candidate.1, self.settings.gas_limit);
        tracing::debug!("Fee override on {}: {}", network, fees);
        Ok(fees)
    }

    async fn matic_overrides(&self) -> Result<FeeOverride> {
        let floor = gwei(self.settings.min_gas_price_gwei);
        let quoted = self.gas_station.fast_gas_price().await?;
        if quoted < floor {
            tracing::info!(
                "Matic gas price {} below floor, using {} gwei",
                quoted,
                self.settings.min_gas_price_gwei
            );
        }
        Ok(FeeOverride::Legacy {
            gas_price: quoted.max(floor),
        })
    }

    /// Cheapest tier whose confidence clears the threshold, as (max fee, priority fee)
    async fn block_price_tier(&self) -> Result<(u128, u128)> {
        let prices = self.block_prices.estimated_prices().await?;
        let tier = prices
            .iter()
            .filter(|p| p.confidence >= self.settings.confidence_min)
            .min_by_key(|p| p.confidence)
            .ok_or_else(|| {
                DeployError::fee_source(format!(
                    "no block price tier with confidence >= {}",
                    self.settings.confidence_min
                ))
            })?;

        tracing::debug!("Selected block price tier with confidence {}", tier.confidence);
        Ok((
            tier.max_fee_per_gas_wei()?,
            tier.max_priority_fee_per_gas_wei()?,
        ))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::chain::mock::MockChain;
    use crate::fees::EstimatedPrice;

    #[derive(Default)]
    pub(crate) struct StubBlockPrices {
        pub prices: Vec<EstimatedPrice>,
        pub fail: bool,
        pub calls: AtomicUsize,
    }

    #[async_trait]
    impl BlockPriceOracle for StubBlockPrices {
        async fn estimated_prices(&self) -> Result<Vec<EstimatedPrice>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(DeployError::fee_source("oracle unreachable"));
            }
            Ok(self.prices.clone())
        }
    }

    #[derive(Default)]
    pub(crate) struct StubGasStation {
        pub price: u128,
        pub calls: AtomicUsize,
    }

    #[async_trait]
    impl GasStationOracle for StubGasStation {
        async fn fast_gas_price(&self) -> Result<u128> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.price)
        }
    }

    fn tier(confidence: u32, priority: f64, max_fee: f64) -> EstimatedPrice {
        EstimatedPrice {
            confidence,
            max_priority_fee_per_gas: priority,
            max_fee_per_gas: max_fee,
        }
    }

    fn mainnet_tiers() -> Vec<EstimatedPrice> {
        vec![
            tier(99, 2.0, 50.0),
            tier(95, 1.8, 45.0),
            tier(90, 1.6, 42.0),
            tier(80, 1.5, 40.0),
            tier(70, 1.0, 30.0),
        ]
    }

    fn estimator(
        block_prices: Arc<StubBlockPrices>,
        gas_station: Arc<StubGasStation>,
    ) -> FeeEstimator {
        FeeEstimator::new(FeeSettings::default(), block_prices, gas_station)
    }

    /// Estimator whose oracles are never expected to be hit
    pub(crate) fn offline_estimator() -> FeeEstimator {
        estimator(Arc::default(), Arc::default())
    }

    /// Estimator whose block-price oracle is down
    pub(crate) fn unreachable_estimator() -> FeeEstimator {
        let block_prices = StubBlockPrices {
            fail: true,
            ..Default::default()
        };
        estimator(Arc::new(block_prices), Arc::default())
    }

    #[test]
    fn test_clamp_holds_for_all_pairs() {
        let samples = [0u128, 1, 2, 3, 1_000, gwei(3), gwei(10), u128::MAX];
        for max_fee in samples {
            for priority in samples {
                let clamped = clamp_priority_fee(max_fee, priority);
                assert!(clamped <= max_fee, "max={max_fee} priority={priority}");
                if priority <= max_fee {
                    assert_eq!(clamped, priority);
                }
            }
        }
        assert_eq!(clamp_priority_fee(5, 5), 5);
        assert_eq!(clamp_priority_fee(5, 6), 4);
    }

    #[tokio::test]
    async fn test_fixed_gas_price_makes_no_network_calls() {
        let block_prices = Arc::new(StubBlockPrices::default());
        let gas_station = Arc::new(StubGasStation::default());
        let fees = estimator(block_prices.clone(), gas_station.clone());
        let chain = MockChain::new();

        for name in ["bsc", "matic", "hardhat", "localhost"] {
            let network = Network::new(name).with_gas_price(7_000_000_000);
            let result = fees.compute_overrides(&network, &chain).await.unwrap();
            assert_eq!(result, FeeOverride::Legacy { gas_price: 7_000_000_000 });
        }

        assert_eq!(block_prices.calls.load(Ordering::SeqCst), 0);
        assert_eq!(gas_station.calls.load(Ordering::SeqCst), 0);
        assert_eq!(chain.rpc_calls(), 0);
    }

    #[tokio::test]
    async fn test_matic_applies_floor() {
        let gas_station = Arc::new(StubGasStation {
            price: gwei(30),
            ..Default::default()
        });
        let fees = estimator(Arc::default(), gas_station.clone());
        let chain = MockChain::new();

        let result = fees
            .compute_overrides(&Network::new("matic"), &chain)
            .await
            .unwrap();
        assert_eq!(result, FeeOverride::Legacy { gas_price: gwei(100) });
        assert_eq!(gas_station.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_matic_above_floor_kept() {
        let gas_station = Arc::new(StubGasStation {
            price: gwei(150) + 1,
            ..Default::default()
        });
        let fees = estimator(Arc::default(), gas_station);

        let result = fees
            .compute_overrides(&Network::new("mumbai"), &MockChain::new())
            .await
            .unwrap();
        assert_eq!(result, FeeOverride::Legacy { gas_price: gwei(150) + 1 });
    }

    #[tokio::test]
    async fn test_other_network_without_price_uses_node_default() {
        let fees = offline_estimator();
        let result = fees
            .compute_overrides(&Network::new("hardhat"), &MockChain::new())
            .await
            .unwrap();
        assert_eq!(result, FeeOverride::NodeDefault);
    }

    #[tokio::test]
    async fn test_mainnet_selects_cheapest_qualifying_tier() {
        let block_prices = Arc::new(StubBlockPrices {
            prices: mainnet_tiers(),
            ..Default::default()
        });
        let fees = estimator(block_prices, Arc::default());
        let chain = MockChain::new();

        let result = fees
            .compute_overrides(&Network::new("mainnet"), &chain)
            .await
            .unwrap();
        assert_eq!(
            result,
            FeeOverride::Eip1559 {
                max_fee_per_gas: gwei(40),
                max_priority_fee_per_gas: 1_500_000_000,
                gas_limit: 10_000_000,
            }
        );
        assert_eq!(chain.rpc_calls(), 0);
    }

    #[tokio::test]
    async fn test_mainnet_without_qualifying_tier_fails() {
        let block_prices = Arc::new(StubBlockPrices {
            prices: vec![tier(70, 1.0, 30.0)],
            ..Default::default()
        });
        let fees = estimator(block_prices, Arc::default());

        let err = fees
            .compute_overrides(&Network::new("mainnet"), &MockChain::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::FeeSource(_)));
    }

    #[tokio::test]
    async fn test_mainnet_oracle_failure_propagates() {
        let block_prices = Arc::new(StubBlockPrices {
            fail: true,
            ..Default::default()
        });
        let fees = estimator(block_prices, Arc::default());

        let err = fees
            .compute_overrides(&Network::new("mainnet"), &MockChain::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::FeeSource(_)));
    }

    #[tokio::test]
    async fn test_testnet_uses_node_gas_price_and_clamps() {
        let fees = offline_estimator();
        let chain = MockChain::new().with_gas_price(gwei(2));

        let result = fees
            .compute_overrides(&Network::new("goerli"), &chain)
            .await
            .unwrap();
        assert_eq!(
            result,
            FeeOverride::Eip1559 {
                max_fee_per_gas: gwei(2),
                max_priority_fee_per_gas: gwei(2) - 1,
                gas_limit: 10_000_000,
            }
        );
    }

    #[tokio::test]
    async fn test_testnet_keeps_default_priority_when_base_fee_high() {
        let fees = offline_estimator();
        let chain = MockChain::new().with_gas_price(gwei(25));

        let result = fees
            .compute_overrides(&Network::new("sepolia"), &chain)
            .await
            .unwrap();
        assert_eq!(result, FeeOverride::eip1559(gwei(25), gwei(3), 10_000_000));
    }

    #[tokio::test]
    async fn test_ethereum_ignores_fixed_gas_price() {
        let fees = offline_estimator();
        let chain = MockChain::new().with_gas_price(gwei(20));
        let network = Network::new("goerli").with_gas_price(1);

        let result = fees.compute_overrides(&network, &chain).await.unwrap();
        assert!(matches!(result, FeeOverride::Eip1559 { .. }));
    }
}
