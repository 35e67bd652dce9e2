//! Shared state and collaborators handed to every keeper component.

use alloy::primitives::Address;
use std::sync::Arc;
use std::time::Duration;

use crate::audit::AuditStore;
use crate::chain::ChainClient;
use crate::config::BotConfig;
use crate::identity::IdentityAllocator;
use crate::notify::Notifier;
use crate::position::PositionBook;
use crate::retry::RetryTracker;
use crate::swap::SwapEngine;

/// Runtime parameters of the liquidation engine.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Lending protocol contract
    pub protocol: Address,
    pub native_asset: Address,
    /// Asset native proceeds are swapped back into
    pub reference_asset: Address,
    pub gas_limit: u64,
    pub confirmation_timeout: Duration,
    /// Sleep between scheduler cycles
    pub scan_interval: Duration,
    /// Pause after each dispatch
    pub dispatch_throttle: Duration,
    pub monitor_interval: Duration,
    pub monitor_page_size: u64,
    pub rebalance_enabled: bool,
}

impl EngineSettings {
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            protocol: config.network.protocol,
            native_asset: config.network.native_asset,
            reference_asset: config.network.reference_asset,
            gas_limit: config.liquidation.gas_limit,
            confirmation_timeout: config.liquidation.confirmation_timeout(),
            scan_interval: config.scanner.scan_interval(),
            dispatch_throttle: config.scanner.dispatch_throttle(),
            monitor_interval: config.scanner.monitor_interval(),
            monitor_page_size: config.scanner.monitor_page_size,
            rebalance_enabled: config.rebalance.enabled,
        }
    }
}

/// Working set, retry state and collaborators, shared by `Arc`.
pub struct KeeperContext {
    pub book: PositionBook,
    pub retries: RetryTracker,
    pub allocator: Arc<dyn IdentityAllocator>,
    pub chain: Arc<dyn ChainClient>,
    pub swap: Arc<dyn SwapEngine>,
    pub notifier: Arc<dyn Notifier>,
    pub audit_store: Arc<dyn AuditStore>,
    pub settings: EngineSettings,
}

impl KeeperContext {
    pub fn new(
        settings: EngineSettings,
        allocator: Arc<dyn IdentityAllocator>,
        chain: Arc<dyn ChainClient>,
        swap: Arc<dyn SwapEngine>,
        notifier: Arc<dyn Notifier>,
        audit_store: Arc<dyn AuditStore>,
    ) -> Self {
        Self {
            book: PositionBook::new(),
            retries: RetryTracker::new(),
            allocator,
            chain,
            swap,
            notifier,
            audit_store,
            settings,
        }
    }
}
