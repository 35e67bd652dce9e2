//! Keeper chain adapters.
//!
//! This crate provides the alloy-backed implementations of the keeper's
//! collaborator traits:
//! - `RpcChainClient`: HTTP provider with multi-key signing and receipt polling
//! - `WalletPool`: funded wallet allocator with per-loan reservations
//! - `SwapNetwork`: conversion-path swap engine and reference pricing
//! - Legacy gas pricing with a configurable cap

mod contracts;
pub mod gas;
mod provider;
mod swap_network;
mod wallets;

pub use contracts::{ISwapNetwork, IERC20};
pub use gas::LegacyGasStrategy;
pub use provider::{RpcChainClient, RpcChainClientBuilder};
pub use swap_network::{min_return, SwapNetwork};
pub use wallets::WalletPool;
