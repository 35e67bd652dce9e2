//! Swap engine used for swap-back and profit realization.

use alloy::primitives::{Address, B256, U256};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// Ordered assets (and pool anchors) a conversion passes through.
pub type ConversionPath = Vec<Address>;

/// Swap and price-discovery engine.
#[async_trait]
pub trait SwapEngine: Send + Sync {
    /// Price of each known asset in the reference asset (WAD-scaled).
    async fn reference_prices(&self) -> Result<HashMap<Address, U256>>;

    /// Conversion path between two assets, `None` if they are not connected.
    async fn conversion_path(&self, from: Address, to: Address) -> Result<Option<ConversionPath>>;

    /// Convert `amount` of `source` into `dest`, paying out to `beneficiary`.
    /// Resolves once the swap transaction is confirmed.
    async fn swap(
        &self,
        amount: U256,
        source: Address,
        dest: Address,
        beneficiary: Address,
    ) -> Result<B256>;
}
