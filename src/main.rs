//! Liquidation Keeper
//!
//! Watches a lending protocol for unsafe loans and liquidates them from a
//! pool of funded wallets.
//! Features:
//! - Non-blocking dispatch with per-wallet reservation
//! - Retry tracking with quarantine after repeated failures
//! - Swap-back of native proceeds and a JSON-lines audit log
//! - Telegram alerts

use std::sync::Arc;

use alloy::primitives::U256;
use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use keeper_api::{LogNotifier, TelegramNotifier};
use keeper_chain::{LegacyGasStrategy, RpcChainClientBuilder, SwapNetwork, WalletPool};
use keeper_core::{
    BotConfig, EngineSettings, JsonlAuditStore, KeeperContext, Notifier, PositionMonitor,
    Scheduler,
};

/// Environment variable names.
mod env {
    /// Comma-separated wallet private keys
    pub const PRIVATE_KEYS: &str = "KEEPER_PRIVATE_KEYS";
    /// Overrides `network.rpc_url`
    pub const RPC_URL: &str = "KEEPER_RPC_URL";
    pub const TELEGRAM_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
    pub const TELEGRAM_CHAT_ID: &str = "TELEGRAM_CHAT_ID";
}

#[tokio::main]
async fn main() -> Result<()> {
    // Print startup banner
    print_banner();

    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,keeper_core=debug,keeper_chain=debug")),
        )
        .init();

    // KEEPER_CONFIG (TOML file) or KEEPER_PROFILE: testing, production
    let mut config = BotConfig::from_env()?;
    if let Ok(rpc_url) = std::env::var(env::RPC_URL) {
        config.network.rpc_url = rpc_url;
    }
    config.validate()?;
    config.log_config();

    let secrets = load_secrets()?;

    let (scheduler, monitor) = initialize_components(&config, secrets).await?;

    // Populate the working set before the first cycle
    match monitor.sweep().await {
        Ok(report) => info!(unsafe_loans = report.added, "Initial sweep complete"),
        Err(e) => warn!(error = %e, "Initial sweep failed, monitor will retry"),
    }

    let monitor_handle = tokio::spawn(async move { monitor.run().await });

    info!("Starting scan loop...");
    tokio::select! {
        _ = scheduler.run() => {}
        result = monitor_handle => {
            error!(?result, "Position monitor stopped");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
        }
    }

    Ok(())
}

/// Secrets read from the environment only.
struct Secrets {
    private_keys: Vec<String>,
    telegram: Option<(String, String)>,
}

fn load_secrets() -> Result<Secrets> {
    let keys = std::env::var(env::PRIVATE_KEYS)
        .map_err(|_| anyhow::anyhow!("Missing env var: {}", env::PRIVATE_KEYS))?;
    let private_keys: Vec<String> = keys
        .split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .collect();

    let telegram = match (
        std::env::var(env::TELEGRAM_BOT_TOKEN),
        std::env::var(env::TELEGRAM_CHAT_ID),
    ) {
        (Ok(token), Ok(chat_id)) => Some((token, chat_id)),
        _ => None,
    };

    Ok(Secrets {
        private_keys,
        telegram,
    })
}

async fn initialize_components(
    config: &BotConfig,
    secrets: Secrets,
) -> Result<(Scheduler, PositionMonitor)> {
    info!("Initializing components...");
    let network = &config.network;

    // Chain client (signing for every configured wallet)
    let chain = Arc::new(
        RpcChainClientBuilder::new(&network.rpc_url, network.chain_id)
            .protocol(network.protocol)
            .native_asset(network.native_asset)
            .gas_strategy(LegacyGasStrategy::from_gwei(
                config.liquidation.max_gas_price_gwei,
                config.liquidation.gas_price_multiplier,
            ))
            .receipt_poll(config.liquidation.receipt_poll())
            .build(&secrets.private_keys)
            .await
            .context("initializing chain client")?,
    );

    // Wallet pool (native balances keep enough for gas at the price cap)
    let gas_reserve = U256::from(config.liquidation.gas_limit)
        * U256::from(config.liquidation.max_gas_price_wei());
    let wallets = Arc::new(WalletPool::new(
        chain.clone(),
        chain.signers().to_vec(),
        network.native_asset,
        gas_reserve,
    ));
    info!(
        wallets = wallets.wallets().len(),
        gas_reserve = %gas_reserve,
        "Wallet pool initialized"
    );

    // Swap network
    let swap = Arc::new(
        SwapNetwork::new(
            chain.clone(),
            &network.rpc_url,
            network.swap_network,
            network.native_asset,
            network.reference_asset,
        )?
        .with_price_assets(network.price_assets.clone())
        .with_slippage_bps(config.rebalance.slippage_bps),
    );

    // Notifier
    let notifier: Arc<dyn Notifier> = match secrets.telegram {
        Some((token, chat_id)) => {
            info!("Telegram notifications enabled");
            Arc::new(TelegramNotifier::new(token, chat_id))
        }
        None => {
            warn!("Telegram not configured, alerts go to the log only");
            Arc::new(LogNotifier)
        }
    };

    // Audit store
    let audit_store = Arc::new(
        JsonlAuditStore::open(&config.audit.path)
            .await
            .context("opening audit log")?,
    );
    info!(path = %config.audit.path, "Audit log opened");

    let ctx = Arc::new(KeeperContext::new(
        EngineSettings::from_config(config),
        wallets,
        chain,
        swap,
        notifier,
        audit_store,
    ));

    info!("All components initialized");

    Ok((Scheduler::new(ctx.clone()), PositionMonitor::new(ctx)))
}

/// Print startup banner.
fn print_banner() {
    println!(
        r#"
    ╦╔═┌─┐┌─┐┌─┐┌─┐┬─┐
    ╠╩╗├┤ ├┤ ├─┘├┤ ├┬┘
    ╩ ╩└─┘└─┘┴  └─┘┴└─
    Liquidation Keeper v0.1.0
    "#
    );
}
