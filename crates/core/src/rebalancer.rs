//! Swap-back of native-asset liquidation proceeds into the reference asset.

use alloy::primitives::{Address, B256};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::contracts::LiquidateEvent;
use crate::swap::SwapEngine;

/// What the rebalancer did with a liquidation's proceeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebalanceOutcome {
    /// Disabled, or the proceeds are not in the native asset
    Skipped,
    /// No usable reference price for the native asset
    NoPrice,
    Swapped(B256),
    Failed(String),
}

pub struct Rebalancer {
    swap: Arc<dyn SwapEngine>,
    native_asset: Address,
    reference_asset: Address,
    enabled: bool,
}

impl Rebalancer {
    pub fn new(
        swap: Arc<dyn SwapEngine>,
        native_asset: Address,
        reference_asset: Address,
        enabled: bool,
    ) -> Self {
        Self {
            swap,
            native_asset,
            reference_asset,
            enabled,
        }
    }

    /// Whether the proceeds of `event` are something this rebalancer converts.
    pub fn applies_to(&self, event: &LiquidateEvent) -> bool {
        self.enabled
            && event.collateral_token == self.native_asset
            && !event.collateral_withdraw_amount.is_zero()
    }

    /// Convert the withdrawn collateral to the reference asset, paying out to
    /// `identity`. Never fails; problems are logged.
    pub async fn rebalance(&self, identity: Address, event: &LiquidateEvent) -> RebalanceOutcome {
        if !self.applies_to(event) {
            return RebalanceOutcome::Skipped;
        }

        let price = match self.swap.reference_prices().await {
            Ok(prices) => prices.get(&self.native_asset).copied(),
            Err(e) => {
                warn!(error = %e, "Reference price lookup failed");
                None
            }
        };
        match price {
            Some(price) if !price.is_zero() => {
                debug!(price = %price, "Native asset reference price");
            }
            _ => {
                warn!(asset = %self.native_asset, "No reference price, skipping swap-back");
                return RebalanceOutcome::NoPrice;
            }
        }

        let amount = event.collateral_withdraw_amount;
        match self
            .swap
            .swap(amount, self.native_asset, self.reference_asset, identity)
            .await
        {
            Ok(tx_hash) => {
                info!(
                    identity = %identity,
                    amount = %amount,
                    tx_hash = %tx_hash,
                    "Swapped liquidation proceeds to reference asset"
                );
                RebalanceOutcome::Swapped(tx_hash)
            }
            Err(e) => {
                warn!(identity = %identity, amount = %amount, error = %e, "Swap-back failed");
                RebalanceOutcome::Failed(format!("{e:#}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{self, FakeSwap};
    use alloy::primitives::U256;

    fn event(collateral: Address) -> LiquidateEvent {
        LiquidateEvent {
            user: Address::with_last_byte(0x11),
            liquidator: testkit::WALLET,
            loan_id: testkit::loan(1),
            lender: Address::with_last_byte(0x44),
            loan_token: testkit::REFERENCE,
            collateral_token: collateral,
            repay_amount: U256::from(100u64),
            collateral_withdraw_amount: U256::from(120u64),
            collateral_to_loan_rate: U256::from(1u64),
            current_margin: U256::ZERO,
        }
    }

    #[tokio::test]
    async fn test_swaps_native_proceeds() {
        let swap = Arc::new(FakeSwap::default());
        swap.set_price(testkit::NATIVE, U256::from(2_000u64));
        let rebalancer = Rebalancer::new(swap.clone(), testkit::NATIVE, testkit::REFERENCE, true);

        let outcome = rebalancer.rebalance(testkit::WALLET, &event(testkit::NATIVE)).await;

        assert!(matches!(outcome, RebalanceOutcome::Swapped(_)));
        let swaps = swap.swaps();
        assert_eq!(swaps.len(), 1);
        assert_eq!(swaps[0].source, testkit::NATIVE);
        assert_eq!(swaps[0].dest, testkit::REFERENCE);
        assert_eq!(swaps[0].amount, U256::from(120u64));
        assert_eq!(swaps[0].beneficiary, testkit::WALLET);
    }

    #[tokio::test]
    async fn test_token_proceeds_skipped() {
        let swap = Arc::new(FakeSwap::default());
        let rebalancer = Rebalancer::new(swap.clone(), testkit::NATIVE, testkit::REFERENCE, true);

        let outcome = rebalancer
            .rebalance(testkit::WALLET, &event(Address::with_last_byte(0x66)))
            .await;

        assert_eq!(outcome, RebalanceOutcome::Skipped);
        assert!(swap.swaps().is_empty());
    }

    #[tokio::test]
    async fn test_missing_price_aborts() {
        let swap = Arc::new(FakeSwap::default());
        let rebalancer = Rebalancer::new(swap.clone(), testkit::NATIVE, testkit::REFERENCE, true);

        let outcome = rebalancer.rebalance(testkit::WALLET, &event(testkit::NATIVE)).await;

        assert_eq!(outcome, RebalanceOutcome::NoPrice);
        assert!(swap.swaps().is_empty());
    }

    #[tokio::test]
    async fn test_swap_failure_is_reported_not_raised() {
        let swap = Arc::new(FakeSwap::default());
        swap.set_price(testkit::NATIVE, U256::from(2_000u64));
        swap.fail_swaps();
        let rebalancer = Rebalancer::new(swap.clone(), testkit::NATIVE, testkit::REFERENCE, true);

        let outcome = rebalancer.rebalance(testkit::WALLET, &event(testkit::NATIVE)).await;

        assert!(matches!(outcome, RebalanceOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn test_disabled() {
        let swap = Arc::new(FakeSwap::default());
        swap.set_price(testkit::NATIVE, U256::from(2_000u64));
        let rebalancer = Rebalancer::new(swap.clone(), testkit::NATIVE, testkit::REFERENCE, false);

        let outcome = rebalancer.rebalance(testkit::WALLET, &event(testkit::NATIVE)).await;

        assert_eq!(outcome, RebalanceOutcome::Skipped);
    }
}
