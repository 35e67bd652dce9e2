//! Keeper configuration with profile support.
//!
//! Values come from a named profile (`KEEPER_PROFILE`) or a TOML file
//! (`KEEPER_CONFIG`). Missing fields fall back to the defaults below.

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use super::network::NetworkConfig;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Profile name (for logging/identification)
    #[serde(default = "default_profile_name")]
    pub profile: String,

    /// Scan loop and position monitor timing
    #[serde(default)]
    pub scanner: ScannerConfig,

    /// Liquidation transaction parameters
    #[serde(default)]
    pub liquidation: LiquidationConfig,

    /// Swap-back of native proceeds
    #[serde(default)]
    pub rebalance: RebalanceConfig,

    #[serde(default)]
    pub audit: AuditConfig,

    #[serde(default)]
    pub network: NetworkConfig,
}

fn default_profile_name() -> String {
    "default".to_string()
}

/// Scan loop and monitor timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Sleep between scan cycles (seconds)
    #[serde(default = "default_scan_interval")]
    pub scan_interval_secs: u64,

    /// Pause after each dispatch (milliseconds)
    #[serde(default = "default_dispatch_throttle")]
    pub dispatch_throttle_ms: u64,

    /// Unsafe-loan sweep interval (seconds)
    #[serde(default = "default_monitor_interval")]
    pub monitor_interval_secs: u64,

    /// Loans fetched per `getActiveLoans` page
    #[serde(default = "default_monitor_page_size")]
    pub monitor_page_size: u64,
}

fn default_scan_interval() -> u64 {
    30
}
fn default_dispatch_throttle() -> u64 {
    1000
}
fn default_monitor_interval() -> u64 {
    60
}
fn default_monitor_page_size() -> u64 {
    100
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: default_scan_interval(),
            dispatch_throttle_ms: default_dispatch_throttle(),
            monitor_interval_secs: default_monitor_interval(),
            monitor_page_size: default_monitor_page_size(),
        }
    }
}

impl ScannerConfig {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }
    pub fn dispatch_throttle(&self) -> Duration {
        Duration::from_millis(self.dispatch_throttle_ms)
    }
    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_interval_secs)
    }
}

/// Liquidation transaction parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationConfig {
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,

    /// How long to wait for a receipt before treating the attempt as failed
    #[serde(default = "default_confirmation_timeout")]
    pub confirmation_timeout_secs: u64,

    /// Receipt polling interval (milliseconds)
    #[serde(default = "default_receipt_poll")]
    pub receipt_poll_ms: u64,

    /// Gas price cap (gwei)
    #[serde(default = "default_max_gas_price")]
    pub max_gas_price_gwei: f64,

    /// Multiplier on the node's gas price
    #[serde(default = "default_gas_multiplier")]
    pub gas_price_multiplier: f64,
}

fn default_gas_limit() -> u64 {
    2_500_000
}
fn default_confirmation_timeout() -> u64 {
    600
}
fn default_receipt_poll() -> u64 {
    2000
}
fn default_max_gas_price() -> f64 {
    1.0
}
fn default_gas_multiplier() -> f64 {
    1.0
}

impl Default for LiquidationConfig {
    fn default() -> Self {
        Self {
            gas_limit: default_gas_limit(),
            confirmation_timeout_secs: default_confirmation_timeout(),
            receipt_poll_ms: default_receipt_poll(),
            max_gas_price_gwei: default_max_gas_price(),
            gas_price_multiplier: default_gas_multiplier(),
        }
    }
}

impl LiquidationConfig {
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }
    pub fn receipt_poll(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_ms)
    }
    /// Gas price cap in wei.
    pub fn max_gas_price_wei(&self) -> u128 {
        (self.max_gas_price_gwei * 1e9) as u128
    }
}

/// Swap-back configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebalanceConfig {
    #[serde(default = "default_rebalance_enabled")]
    pub enabled: bool,

    /// Accepted shortfall against the quoted return (basis points)
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u16,
}

fn default_rebalance_enabled() -> bool {
    true
}
fn default_slippage_bps() -> u16 {
    100
}

impl Default for RebalanceConfig {
    fn default() -> Self {
        Self {
            enabled: default_rebalance_enabled(),
            slippage_bps: default_slippage_bps(),
        }
    }
}

/// Audit log location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_audit_path")]
    pub path: String,
}

fn default_audit_path() -> String {
    "liquidations.jsonl".to_string()
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            path: default_audit_path(),
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            profile: default_profile_name(),
            scanner: ScannerConfig::default(),
            liquidation: LiquidationConfig::default(),
            rebalance: RebalanceConfig::default(),
            audit: AuditConfig::default(),
            network: NetworkConfig::default(),
        }
    }
}

impl BotConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self =
            toml::from_str(&content).with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    /// Fast cycles, short timeouts and no swap-back.
    pub fn testing() -> Self {
        Self {
            profile: "testing".to_string(),
            scanner: ScannerConfig {
                scan_interval_secs: 5,
                dispatch_throttle_ms: 250,
                monitor_interval_secs: 10,
                monitor_page_size: 50,
            },
            liquidation: LiquidationConfig {
                confirmation_timeout_secs: 120,
                receipt_poll_ms: 500,
                ..Default::default()
            },
            rebalance: RebalanceConfig {
                enabled: false,
                slippage_bps: 500,
            },
            audit: AuditConfig {
                path: "liquidations.testing.jsonl".to_string(),
            },
            network: NetworkConfig::default(),
        }
    }

    /// Conservative gas, tight slippage.
    pub fn production() -> Self {
        Self {
            profile: "production".to_string(),
            scanner: ScannerConfig::default(),
            liquidation: LiquidationConfig {
                max_gas_price_gwei: 5.0,
                gas_price_multiplier: 1.1,
                ..Default::default()
            },
            rebalance: RebalanceConfig {
                enabled: true,
                slippage_bps: 50,
            },
            audit: AuditConfig::default(),
            network: NetworkConfig::default(),
        }
    }

    /// Profile from `KEEPER_PROFILE`, or default.
    /// Supported values: testing, production
    pub fn from_profile_env() -> Self {
        let profile = std::env::var("KEEPER_PROFILE").unwrap_or_else(|_| "default".to_string());
        Self::for_profile(&profile)
    }

    pub fn for_profile(profile: &str) -> Self {
        match profile.to_lowercase().as_str() {
            "testing" | "test" => Self::testing(),
            "production" | "prod" => Self::production(),
            _ => Self::default(),
        }
    }

    /// `KEEPER_CONFIG` file if set, else the `KEEPER_PROFILE` profile.
    pub fn from_env() -> anyhow::Result<Self> {
        match std::env::var("KEEPER_CONFIG") {
            Ok(path) => Self::from_file(path),
            Err(_) => Ok(Self::from_profile_env()),
        }
    }

    /// Reject configurations the keeper cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        let missing = self.network.missing_addresses();
        if !missing.is_empty() {
            bail!("network addresses not configured: {}", missing.join(", "));
        }
        if self.network.rpc_url.is_empty() {
            bail!("network.rpc_url is empty");
        }
        if self.liquidation.gas_limit == 0 {
            bail!("liquidation.gas_limit must be positive");
        }
        if self.liquidation.confirmation_timeout_secs == 0 {
            bail!("liquidation.confirmation_timeout_secs must be positive");
        }
        if self.liquidation.max_gas_price_gwei <= 0.0 {
            bail!("liquidation.max_gas_price_gwei must be positive");
        }
        if self.scanner.monitor_page_size == 0 {
            bail!("scanner.monitor_page_size must be positive");
        }
        Ok(())
    }

    /// Log the current configuration.
    pub fn log_config(&self) {
        tracing::info!(profile = %self.profile, "Keeper configuration loaded");
        tracing::info!(
            rpc = %self.network.rpc_url,
            chain_id = self.network.chain_id,
            protocol = %self.network.protocol,
            swap_network = %self.network.swap_network,
            reference_asset = %self.network.reference_asset,
            "Network"
        );
        tracing::info!(
            scan_interval_secs = self.scanner.scan_interval_secs,
            dispatch_throttle_ms = self.scanner.dispatch_throttle_ms,
            monitor_interval_secs = self.scanner.monitor_interval_secs,
            "Scanner timing"
        );
        tracing::info!(
            gas_limit = self.liquidation.gas_limit,
            max_gas_price_gwei = self.liquidation.max_gas_price_gwei,
            confirmation_timeout_secs = self.liquidation.confirmation_timeout_secs,
            "Liquidation parameters"
        );
        tracing::info!(
            rebalance = self.rebalance.enabled,
            slippage_bps = self.rebalance.slippage_bps,
            audit_path = %self.audit.path,
            "Follow-up"
        );
    }
}
