//! Keeper configuration.
//!
//! - Runtime parameters (profiles, timing, gas, follow-up)
//! - Network endpoints and contract addresses

mod bot;
mod network;

pub use bot::{AuditConfig, BotConfig, LiquidationConfig, RebalanceConfig, ScannerConfig};
pub use network::{NetworkConfig, NATIVE_ASSET_PLACEHOLDER};
