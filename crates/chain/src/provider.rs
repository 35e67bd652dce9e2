//! Alloy-backed chain client.
//!
//! One HTTP endpoint serves reads and writes. Every configured private key is
//! registered on a single `EthereumWallet`, and the signer is picked by the
//! transaction's `from` address.

use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::http::reqwest::Url;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use keeper_core::contracts::ILendingProtocol;
use keeper_core::{ChainClient, LiquidationTx, LoanId, PositionStatus, TxReceipt};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::contracts::IERC20;
use crate::gas::LegacyGasStrategy;

/// Default receipt polling interval.
const DEFAULT_RECEIPT_POLL: Duration = Duration::from_secs(2);

/// Builder for [`RpcChainClient`].
pub struct RpcChainClientBuilder {
    rpc_url: String,
    chain_id: u64,
    protocol: Address,
    native_asset: Address,
    gas: Option<LegacyGasStrategy>,
    receipt_poll: Duration,
}

impl RpcChainClientBuilder {
    pub fn new(rpc_url: impl Into<String>, chain_id: u64) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            chain_id,
            protocol: Address::ZERO,
            native_asset: Address::ZERO,
            gas: None,
            receipt_poll: DEFAULT_RECEIPT_POLL,
        }
    }

    /// Lending protocol contract.
    pub fn protocol(mut self, protocol: Address) -> Self {
        self.protocol = protocol;
        self
    }

    /// Address standing for the native asset in balance queries.
    pub fn native_asset(mut self, native_asset: Address) -> Self {
        self.native_asset = native_asset;
        self
    }

    pub fn gas_strategy(mut self, gas: LegacyGasStrategy) -> Self {
        self.gas = Some(gas);
        self
    }

    pub fn receipt_poll(mut self, interval: Duration) -> Self {
        self.receipt_poll = interval;
        self
    }

    /// Parse the signing keys and check the endpoint serves the expected chain.
    pub async fn build(self, private_keys: &[String]) -> Result<RpcChainClient> {
        let url: Url = self
            .rpc_url
            .parse()
            .with_context(|| format!("invalid rpc url {}", self.rpc_url))?;

        let mut signers = Vec::with_capacity(private_keys.len());
        let mut wallet: Option<EthereumWallet> = None;
        for (index, key) in private_keys.iter().enumerate() {
            // Parse private key (with or without 0x prefix)
            let signer: PrivateKeySigner = key
                .trim()
                .trim_start_matches("0x")
                .parse()
                .with_context(|| format!("invalid private key #{index}"))?;
            signers.push(signer.address());
            match wallet.as_mut() {
                Some(wallet) => wallet.register_signer(signer),
                None => wallet = Some(EthereumWallet::from(signer)),
            }
        }
        let Some(wallet) = wallet else {
            bail!("no private keys configured");
        };

        let provider = ProviderBuilder::new().on_http(url.clone());
        let chain_id = provider.get_chain_id().await.context("querying chain id")?;
        if chain_id != self.chain_id {
            bail!("rpc serves chain {chain_id}, expected {}", self.chain_id);
        }

        let gas = self
            .gas
            .unwrap_or_else(|| LegacyGasStrategy::from_gwei(1.0, 1.0));

        info!(
            chain_id,
            wallets = signers.len(),
            protocol = %self.protocol,
            gas_strategy = gas.strategy_name(),
            "Chain client initialized"
        );

        Ok(RpcChainClient {
            url,
            chain_id,
            protocol: self.protocol,
            native_asset: self.native_asset,
            wallet,
            signers,
            gas,
            receipt_poll: self.receipt_poll,
        })
    }
}

/// Chain client over a single HTTP endpoint.
pub struct RpcChainClient {
    url: Url,
    chain_id: u64,
    protocol: Address,
    native_asset: Address,
    wallet: EthereumWallet,
    signers: Vec<Address>,
    gas: LegacyGasStrategy,
    receipt_poll: Duration,
}

impl RpcChainClient {
    /// Addresses of all configured signers, in key order.
    pub fn signers(&self) -> &[Address] {
        &self.signers
    }

    fn ensure_signer(&self, from: Address) -> Result<()> {
        if !self.signers.contains(&from) {
            bail!("no signing key for {from}");
        }
        Ok(())
    }

    /// Send a call from one of the configured wallets and wait for it to be
    /// mined. Gas limit is estimated by the node.
    pub async fn send_and_confirm(
        &self,
        from: Address,
        to: Address,
        input: Bytes,
        value: U256,
    ) -> Result<B256> {
        self.ensure_signer(from)?;
        let gas_price = self.gas_price().await?;

        let tx = TransactionRequest::default()
            .with_from(from)
            .with_to(to)
            .with_input(input)
            .with_value(value)
            .with_gas_price(gas_price)
            .with_chain_id(self.chain_id);

        let provider = ProviderBuilder::new()
            .wallet(self.wallet.clone())
            .on_http(self.url.clone());
        let pending = provider.send_transaction(tx).await?;
        let tx_hash = *pending.tx_hash();
        debug!(tx_hash = %tx_hash, from = %from, to = %to, "Transaction submitted, waiting for confirmation");

        let receipt = pending.get_receipt().await?;
        if !receipt.status() {
            bail!("transaction {tx_hash} reverted");
        }
        Ok(tx_hash)
    }
}

fn to_receipt(receipt: TransactionReceipt) -> TxReceipt {
    TxReceipt {
        tx_hash: receipt.transaction_hash,
        success: receipt.status(),
        block_number: receipt.block_number,
        gas_used: receipt.gas_used,
        logs: receipt
            .inner
            .logs()
            .iter()
            .map(|log| log.inner.clone())
            .collect(),
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn pending_nonce(&self, address: Address) -> Result<u64> {
        let provider = ProviderBuilder::new().on_http(self.url.clone());
        let nonce = provider.get_transaction_count(address).pending().await?;
        Ok(nonce)
    }

    async fn gas_price(&self) -> Result<u128> {
        let provider = ProviderBuilder::new().on_http(self.url.clone());
        let node_price = provider.get_gas_price().await?;
        Ok(self.gas.price(node_price))
    }

    async fn submit(&self, tx: LiquidationTx) -> Result<B256> {
        self.ensure_signer(tx.from)?;

        let request = TransactionRequest::default()
            .with_from(tx.from)
            .with_to(tx.to)
            .with_input(tx.input)
            .with_value(tx.value)
            .with_nonce(tx.nonce)
            .with_gas_limit(tx.gas_limit)
            .with_gas_price(tx.gas_price)
            .with_chain_id(self.chain_id);

        let provider = ProviderBuilder::new()
            .wallet(self.wallet.clone())
            .on_http(self.url.clone());
        let pending = provider.send_transaction(request).await?;
        let tx_hash = *pending.tx_hash();

        debug!(
            tx_hash = %tx_hash,
            from = %tx.from,
            nonce = tx.nonce,
            gas_price_gwei = tx.gas_price / 1_000_000_000,
            "Transaction accepted by node"
        );
        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<TxReceipt> {
        loop {
            match self.receipt(tx_hash).await {
                Ok(Some(receipt)) => return Ok(receipt),
                Ok(None) => {}
                Err(e) => warn!(tx_hash = %tx_hash, error = %e, "Receipt poll failed"),
            }
            tokio::time::sleep(self.receipt_poll).await;
        }
    }

    async fn receipt(&self, tx_hash: B256) -> Result<Option<TxReceipt>> {
        let provider = ProviderBuilder::new().on_http(self.url.clone());
        let receipt = provider.get_transaction_receipt(tx_hash).await?;
        Ok(receipt.map(to_receipt))
    }

    async fn query_position(&self, loan_id: LoanId) -> Result<PositionStatus> {
        let provider = ProviderBuilder::new().on_http(self.url.clone());
        let protocol = ILendingProtocol::new(self.protocol, &provider);
        let loan = protocol.getLoan(loan_id).call().await?._0;
        Ok(PositionStatus::from(loan))
    }

    async fn token_balance(&self, owner: Address, asset: Address) -> Result<U256> {
        let provider = ProviderBuilder::new().on_http(self.url.clone());
        if asset == self.native_asset {
            return Ok(provider.get_balance(owner).await?);
        }
        let token = IERC20::new(asset, &provider);
        Ok(token.balanceOf(owner).call().await?._0)
    }

    async fn active_loans(&self, start: u64, count: u64) -> Result<Vec<PositionStatus>> {
        let provider = ProviderBuilder::new().on_http(self.url.clone());
        let protocol = ILendingProtocol::new(self.protocol, &provider);
        let loans = protocol
            .getActiveLoans(U256::from(start), U256::from(count), true)
            .call()
            .await?
            ._0;
        Ok(loans.into_iter().map(PositionStatus::from).collect())
    }
}

impl std::fmt::Debug for RpcChainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcChainClient")
            .field("url", &self.url.as_str())
            .field("chain_id", &self.chain_id)
            .field("protocol", &self.protocol)
            .field("signers", &self.signers)
            .field("gas_strategy", &self.gas.strategy_name())
            .finish_non_exhaustive()
    }
}
