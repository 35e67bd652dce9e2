//! Chain endpoints and contract addresses.

use alloy::primitives::{address, Address};
use serde::{Deserialize, Serialize};

/// Placeholder address the swap network uses for the chain's native asset.
pub const NATIVE_ASSET_PLACEHOLDER: Address = address!("EeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE");

/// Network configuration.
///
/// Wallet keys and notifier credentials are never part of this file; they are
/// read from the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// HTTP RPC endpoint
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    #[serde(default = "default_chain_id")]
    pub chain_id: u64,

    /// Lending protocol contract
    #[serde(default)]
    pub protocol: Address,

    /// Swap network (conversion path router)
    #[serde(default)]
    pub swap_network: Address,

    #[serde(default = "default_native_asset")]
    pub native_asset: Address,

    /// Asset native proceeds are converted into
    #[serde(default)]
    pub reference_asset: Address,

    /// Assets priced against the reference asset
    #[serde(default)]
    pub price_assets: Vec<Address>,
}

fn default_rpc_url() -> String {
    "http://127.0.0.1:8545".to_string()
}
fn default_chain_id() -> u64 {
    1
}
fn default_native_asset() -> Address {
    NATIVE_ASSET_PLACEHOLDER
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            chain_id: default_chain_id(),
            protocol: Address::ZERO,
            swap_network: Address::ZERO,
            native_asset: default_native_asset(),
            reference_asset: Address::ZERO,
            price_assets: Vec::new(),
        }
    }
}

impl NetworkConfig {
    /// Names of required addresses that are still unset.
    pub fn missing_addresses(&self) -> Vec<&'static str> {
        [
            ("protocol", self.protocol),
            ("swap_network", self.swap_network),
            ("native_asset", self.native_asset),
            ("reference_asset", self.reference_asset),
        ]
        .into_iter()
        .filter(|(_, addr)| addr.is_zero())
        .map(|(name, _)| name)
        .collect()
    }
}
