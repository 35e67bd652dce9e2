//! Pool of funded keeper wallets.
//!
//! A wallet reserved for a loan is not handed out again until it is
//! released. Allocation takes the first free wallet whose balance covers the
//! request, otherwise the free wallet with the largest balance, which may be
//! empty.
//!
//! Native balances are reported net of a gas reserve, since a native
//! liquidation attaches the repaid amount as value and still pays for gas.

use alloy::primitives::{Address, U256};
use anyhow::{bail, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::join_all;
use keeper_core::{ChainClient, ExecutionIdentity, IdentityAllocator, LoanId, Purpose};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct WalletPool {
    chain: Arc<dyn ChainClient>,
    wallets: Vec<Address>,
    native_asset: Address,
    /// Held back from native balances (gas limit at the maximum gas price)
    gas_reserve: U256,
    /// wallet -> what it is reserved for
    reservations: DashMap<Address, (Purpose, LoanId)>,
}

impl WalletPool {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        wallets: Vec<Address>,
        native_asset: Address,
        gas_reserve: U256,
    ) -> Self {
        Self {
            chain,
            wallets,
            native_asset,
            gas_reserve,
            reservations: DashMap::new(),
        }
    }

    pub fn wallets(&self) -> &[Address] {
        &self.wallets
    }

    /// Number of wallets currently reserved.
    pub fn reserved_count(&self) -> usize {
        self.reservations.len()
    }

    fn free_wallets(&self) -> Vec<Address> {
        self.wallets
            .iter()
            .copied()
            .filter(|wallet| !self.reservations.contains_key(wallet))
            .collect()
    }

    /// Part of `balance` that can be spent on the liquidation itself.
    fn spendable(&self, asset: Address, balance: U256) -> U256 {
        if asset == self.native_asset {
            balance.saturating_sub(self.gas_reserve)
        } else {
            balance
        }
    }
}

#[async_trait]
impl IdentityAllocator for WalletPool {
    async fn allocate(
        &self,
        purpose: Purpose,
        min_amount: U256,
        asset: Address,
    ) -> Result<Option<ExecutionIdentity>> {
        let free = self.free_wallets();
        if free.is_empty() {
            debug!(%purpose, reserved = self.reserved_count(), "All wallets reserved");
            return Ok(None);
        }

        let balances = join_all(
            free.iter()
                .map(|wallet| self.chain.token_balance(*wallet, asset)),
        )
        .await;

        let mut funded: Vec<(Address, U256)> = Vec::with_capacity(free.len());
        for (wallet, balance) in free.into_iter().zip(balances) {
            match balance {
                Ok(balance) => funded.push((wallet, self.spendable(asset, balance))),
                Err(e) => warn!(wallet = %wallet, asset = %asset, error = %e, "Balance query failed"),
            }
        }
        if funded.is_empty() {
            bail!("no wallet balance could be read for {asset}");
        }

        let chosen = funded
            .iter()
            .find(|(_, balance)| *balance >= min_amount)
            .or_else(|| funded.iter().max_by_key(|(_, balance)| *balance))
            .copied();

        Ok(chosen.map(|(address, available)| {
            debug!(%purpose, wallet = %address, available = %available, "Wallet allocated");
            ExecutionIdentity {
                address,
                asset,
                available,
            }
        }))
    }

    async fn has_pending(&self, loan_id: &LoanId) -> bool {
        self.reservations
            .iter()
            .any(|entry| entry.value().1 == *loan_id)
    }

    async fn reserve(&self, purpose: Purpose, identity: Address, loan_id: LoanId) {
        if let Some((_, previous)) = self.reservations.insert(identity, (purpose, loan_id)) {
            warn!(wallet = %identity, previous = %previous, loan_id = %loan_id, "Wallet was already reserved");
        }
    }

    async fn release(&self, purpose: Purpose, identity: Address, loan_id: LoanId) {
        let removed = self
            .reservations
            .remove_if(&identity, |_, (held_for, held_loan)| {
                *held_for == purpose && *held_loan == loan_id
            });
        if removed.is_none() {
            warn!(wallet = %identity, loan_id = %loan_id, "Release of a wallet not reserved for this loan");
        }
    }
}
