//! Funded execution identities (wallets) and their allocator.
//!
//! Reservation state belongs to the allocator. The keeper asks for a wallet,
//! reserves it for a loan at dispatch, and releases it exactly once when the
//! attempt resolves.

use alloy::primitives::{Address, U256};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::position::LoanId;

/// What a wallet is being used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Purpose {
    Liquidation,
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Purpose::Liquidation => f.write_str("liquidation"),
        }
    }
}

/// A wallet handed out by the allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionIdentity {
    pub address: Address,
    /// Asset the balance is denominated in
    pub asset: Address,
    /// Spendable balance at allocation time
    pub available: U256,
}

/// Allocator of funded wallets.
#[async_trait]
pub trait IdentityAllocator: Send + Sync {
    /// Find a free wallet holding `asset`, ideally at least `min_amount`.
    ///
    /// `None` means no wallet is free. A returned wallet may hold less than
    /// `min_amount`, including nothing at all.
    async fn allocate(
        &self,
        purpose: Purpose,
        min_amount: U256,
        asset: Address,
    ) -> Result<Option<ExecutionIdentity>>;

    /// Whether some wallet is currently reserved for this loan.
    async fn has_pending(&self, loan_id: &LoanId) -> bool;

    /// Mark `identity` as in use for `loan_id`.
    async fn reserve(&self, purpose: Purpose, identity: Address, loan_id: LoanId);

    /// Return `identity` to the pool.
    async fn release(&self, purpose: Purpose, identity: Address, loan_id: LoanId);
}
