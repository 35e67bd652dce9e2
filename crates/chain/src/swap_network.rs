//! Swap engine over an on-chain conversion-path network.

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::providers::ProviderBuilder;
use alloy::sol_types::SolCall;
use alloy::transports::http::reqwest::Url;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use keeper_core::u256_math::{apply_basis_points, WAD};
use keeper_core::{ConversionPath, SwapEngine};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::contracts::{ISwapNetwork, IERC20};
use crate::provider::RpcChainClient;

/// Concurrent rate queries when pricing assets.
const PRICE_CONCURRENCY: usize = 4;

/// Minimum acceptable return for a quote after slippage.
pub fn min_return(quoted: U256, slippage_bps: u16) -> U256 {
    apply_basis_points(quoted, slippage_bps)
}

pub struct SwapNetwork {
    client: Arc<RpcChainClient>,
    url: Url,
    network: Address,
    native_asset: Address,
    reference_asset: Address,
    /// Assets priced by `reference_prices`, besides the native asset
    price_assets: Vec<Address>,
    slippage_bps: u16,
    /// Conversion paths by (source, target)
    paths: DashMap<(Address, Address), ConversionPath>,
}

impl SwapNetwork {
    pub fn new(
        client: Arc<RpcChainClient>,
        rpc_url: &str,
        network: Address,
        native_asset: Address,
        reference_asset: Address,
    ) -> Result<Self> {
        Ok(Self {
            client,
            url: rpc_url
                .parse()
                .with_context(|| format!("invalid rpc url {rpc_url}"))?,
            network,
            native_asset,
            reference_asset,
            price_assets: Vec::new(),
            slippage_bps: 100,
            paths: DashMap::new(),
        })
    }

    pub fn with_price_assets(mut self, assets: Vec<Address>) -> Self {
        self.price_assets = assets;
        self
    }

    pub fn with_slippage_bps(mut self, slippage_bps: u16) -> Self {
        self.slippage_bps = slippage_bps;
        self
    }

    /// Quote `amount` along `path`.
    pub async fn rate(&self, path: &ConversionPath, amount: U256) -> Result<U256> {
        let provider = ProviderBuilder::new().on_http(self.url.clone());
        let network = ISwapNetwork::new(self.network, &provider);
        Ok(network.rateByPath(path.clone(), amount).call().await?._0)
    }

    /// Make sure the network may pull `amount` of `token` from `owner`.
    async fn ensure_allowance(&self, owner: Address, token: Address, amount: U256) -> Result<()> {
        let provider = ProviderBuilder::new().on_http(self.url.clone());
        let allowance = IERC20::new(token, &provider)
            .allowance(owner, self.network)
            .call()
            .await?
            ._0;
        if allowance >= amount {
            return Ok(());
        }

        let approve = IERC20::approveCall {
            spender: self.network,
            amount,
        };
        let tx_hash = self
            .client
            .send_and_confirm(owner, token, Bytes::from(approve.abi_encode()), U256::ZERO)
            .await
            .context("approving swap network")?;
        debug!(owner = %owner, token = %token, tx_hash = %tx_hash, "Swap network approved");
        Ok(())
    }

    async fn price_of(&self, asset: Address) -> Result<Option<U256>> {
        if asset == self.reference_asset {
            return Ok(Some(WAD));
        }
        match self.conversion_path(asset, self.reference_asset).await? {
            Some(path) => Ok(Some(self.rate(&path, WAD).await?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl SwapEngine for SwapNetwork {
    async fn reference_prices(&self) -> Result<HashMap<Address, U256>> {
        let mut assets = vec![self.native_asset];
        assets.extend(self.price_assets.iter().copied().filter(|a| *a != self.native_asset));

        let results: Vec<(Address, Result<Option<U256>>)> = stream::iter(assets)
            .map(|asset| async move { (asset, self.price_of(asset).await) })
            .buffer_unordered(PRICE_CONCURRENCY)
            .collect()
            .await;

        let mut prices = HashMap::with_capacity(results.len());
        for (asset, result) in results {
            match result {
                Ok(Some(price)) => {
                    prices.insert(asset, price);
                }
                Ok(None) => debug!(asset = %asset, "No conversion path to reference asset"),
                Err(e) => warn!(asset = %asset, error = %e, "Price query failed"),
            }
        }
        Ok(prices)
    }

    async fn conversion_path(&self, from: Address, to: Address) -> Result<Option<ConversionPath>> {
        if let Some(path) = self.paths.get(&(from, to)) {
            return Ok(Some(path.clone()));
        }

        let provider = ProviderBuilder::new().on_http(self.url.clone());
        let network = ISwapNetwork::new(self.network, &provider);
        let path = network.conversionPath(from, to).call().await?._0;
        if path.is_empty() {
            return Ok(None);
        }

        self.paths.insert((from, to), path.clone());
        Ok(Some(path))
    }

    #[instrument(skip(self), fields(network = %self.network))]
    async fn swap(
        &self,
        amount: U256,
        source: Address,
        dest: Address,
        beneficiary: Address,
    ) -> Result<B256> {
        if amount.is_zero() {
            bail!("nothing to swap");
        }
        let Some(path) = self.conversion_path(source, dest).await? else {
            bail!("no conversion path from {source} to {dest}");
        };

        let quoted = self.rate(&path, amount).await?;
        let minimum = min_return(quoted, self.slippage_bps);

        let value = if source == self.native_asset {
            amount
        } else {
            self.ensure_allowance(beneficiary, source, amount).await?;
            U256::ZERO
        };

        let call = ISwapNetwork::convertByPathCall {
            path,
            amount,
            minReturn: minimum,
            beneficiary,
            affiliateAccount: Address::ZERO,
            affiliateFee: U256::ZERO,
        };
        let tx_hash = self
            .client
            .send_and_confirm(beneficiary, self.network, Bytes::from(call.abi_encode()), value)
            .await?;

        info!(
            amount = %amount,
            quoted = %quoted,
            min_return = %minimum,
            tx_hash = %tx_hash,
            "Conversion confirmed"
        );
        Ok(tx_hash)
    }
}
