//! Legacy gas pricing.
//!
//! The node's gas price is scaled by a multiplier and capped. The last price
//! handed out is cached for logging and for callers that want a recent value
//! without an RPC round trip.

use std::sync::atomic::{AtomicU64, Ordering};

/// Legacy (single `gas_price`) pricing strategy.
#[derive(Debug)]
pub struct LegacyGasStrategy {
    /// Maximum gas price in wei.
    max_gas_price: u128,
    /// Multiplier applied to the node's quote.
    multiplier: f64,
    /// Last price handed out (atomic for thread-safety).
    cached_gas_price: AtomicU64,
}

impl LegacyGasStrategy {
    /// # Arguments
    /// * `max_gas_price` - Maximum allowed gas price in wei
    /// * `multiplier` - Factor applied to the node's gas price (1.0 = as quoted)
    pub fn new(max_gas_price: u128, multiplier: f64) -> Self {
        Self {
            max_gas_price,
            multiplier: if multiplier.is_finite() && multiplier > 0.0 {
                multiplier
            } else {
                1.0
            },
            cached_gas_price: AtomicU64::new(0),
        }
    }

    /// From gwei values as they appear in the configuration.
    pub fn from_gwei(max_gas_price_gwei: f64, multiplier: f64) -> Self {
        Self::new((max_gas_price_gwei * 1e9) as u128, multiplier)
    }

    /// Price to bid given the node's quote. Updates the cache.
    pub fn price(&self, node_price: u128) -> u128 {
        let scaled = (node_price as f64 * self.multiplier) as u128;
        let capped = scaled.min(self.max_gas_price);
        self.update_cache(capped);
        capped
    }

    /// Get the cached gas price.
    pub fn cached_gas_price(&self) -> u128 {
        self.cached_gas_price.load(Ordering::Relaxed) as u128
    }

    /// Update the cached gas price.
    pub fn update_cache(&self, gas_price: u128) {
        let capped = gas_price.min(self.max_gas_price).min(u64::MAX as u128);
        self.cached_gas_price.store(capped as u64, Ordering::Relaxed);
    }

    pub fn strategy_name(&self) -> &'static str {
        "Legacy"
    }
}
