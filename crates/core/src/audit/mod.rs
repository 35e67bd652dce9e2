//! Profit-annotated audit records for confirmed liquidations.
//!
//! A record is written only when the receipt carries a well-formed
//! `Liquidate` event and the collateral can be routed back to the borrowed
//! asset along a path of the expected length. Anything else drops the record
//! without raising an alert.

mod store;

pub use store::JsonlAuditStore;

use alloy::primitives::{Address, B256, I256, U256};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::chain::ChainClient;
use crate::contracts::{find_liquidate_event, LiquidateEvent};
use crate::error::AuditError;
use crate::position::LoanId;
use crate::swap::SwapEngine;
use crate::u256_math;

/// Conversion path length when the borrowed asset is native.
pub const NATIVE_PATH_HOPS: usize = 3;

/// Conversion path length for token loans.
pub const TOKEN_PATH_HOPS: usize = 5;

/// Direction of the liquidated position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    /// Borrowed the reference asset against volatile collateral
    Long,
    Short,
}

impl PositionSide {
    pub fn from_loan_token(loan_token: Address, reference_asset: Address) -> Self {
        if loan_token == reference_asset {
            Self::Long
        } else {
            Self::Short
        }
    }
}

/// Persisted record of one successful liquidation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub liquidator: Address,
    pub user: Address,
    pub loan_id: LoanId,
    pub side: PositionSide,
    pub loan_token: Address,
    pub collateral_token: Address,
    pub repay_amount: U256,
    pub collateral_withdraw_amount: U256,
    /// Price-feed estimate in collateral units
    pub profit: I256,
    /// Borrowed-asset balance change across the collateral conversion
    pub realized_profit: I256,
    pub tx_hash: B256,
    pub recorded_at: DateTime<Utc>,
}

/// Append-only audit storage.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Persist a record and return its id.
    async fn append(&self, record: AuditRecord) -> Result<u64>;
}

/// Expected conversion path length for a loan token.
pub fn expected_hops(loan_token: Address, native_asset: Address) -> usize {
    if loan_token == native_asset {
        NATIVE_PATH_HOPS
    } else {
        TOKEN_PATH_HOPS
    }
}

/// Profit implied by the protocol's own price feed, in collateral units:
/// withdrawn collateral minus the repaid amount converted at the event's rate.
pub fn price_feed_profit(event: &LiquidateEvent) -> Option<I256> {
    let repaid = u256_math::loan_to_collateral(event.repay_amount, event.collateral_to_loan_rate)?;
    Some(u256_math::signed_delta(event.collateral_withdraw_amount, repaid))
}

/// Builds and stores audit records for confirmed liquidations.
pub struct AuditLogger {
    chain: Arc<dyn ChainClient>,
    swap: Arc<dyn SwapEngine>,
    store: Arc<dyn AuditStore>,
    native_asset: Address,
    reference_asset: Address,
}

impl AuditLogger {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        swap: Arc<dyn SwapEngine>,
        store: Arc<dyn AuditStore>,
        native_asset: Address,
        reference_asset: Address,
    ) -> Self {
        Self {
            chain,
            swap,
            store,
            native_asset,
            reference_asset,
        }
    }

    /// Decode the liquidation in `tx_hash`, realize the collateral and
    /// persist the record.
    #[instrument(skip(self), fields(tx_hash = %tx_hash, loan_id = %loan_id))]
    pub async fn record(&self, tx_hash: B256, loan_id: LoanId) -> Result<AuditRecord, AuditError> {
        let receipt = self
            .chain
            .receipt(tx_hash)
            .await
            .ok()
            .flatten()
            .ok_or(AuditError::ReceiptMissing(tx_hash))?;

        let event = find_liquidate_event(&receipt.logs, loan_id)
            .ok_or(AuditError::NoEvent { tx_hash, loan_id })?;
        if let Some(field) = event.missing_field() {
            return Err(AuditError::MalformedEvent(field));
        }

        let path = self
            .swap
            .conversion_path(event.collateral_token, event.loan_token)
            .await
            .ok()
            .flatten()
            .ok_or(AuditError::NoPath {
                from: event.collateral_token,
                to: event.loan_token,
            })?;

        let expected = expected_hops(event.loan_token, self.native_asset);
        if path.len() != expected {
            return Err(AuditError::PathMismatch {
                expected,
                actual: path.len(),
            });
        }

        let realized_profit = self.realize_collateral(&event).await?;
        let profit = price_feed_profit(&event).unwrap_or(realized_profit);

        debug!(
            realized = %realized_profit,
            price_feed = %profit,
            "Liquidation profit computed"
        );

        let record = AuditRecord {
            liquidator: event.liquidator,
            user: event.user,
            loan_id: event.loan_id,
            side: PositionSide::from_loan_token(event.loan_token, self.reference_asset),
            loan_token: event.loan_token,
            collateral_token: event.collateral_token,
            repay_amount: event.repay_amount,
            collateral_withdraw_amount: event.collateral_withdraw_amount,
            profit,
            realized_profit,
            tx_hash,
            recorded_at: Utc::now(),
        };

        let id = self
            .store
            .append(record.clone())
            .await
            .map_err(|e| AuditError::Persist(format!("{e:#}")))?;

        info!(
            id,
            liquidator = %record.liquidator,
            user = %record.user,
            side = ?record.side,
            profit = %record.profit,
            "Audit record stored"
        );
        Ok(record)
    }

    /// Convert the withdrawn collateral into the borrowed asset and return
    /// the liquidator's balance change.
    async fn realize_collateral(&self, event: &LiquidateEvent) -> Result<I256, AuditError> {
        let before = self
            .chain
            .token_balance(event.liquidator, event.loan_token)
            .await
            .map_err(|e| AuditError::BalanceBefore(format!("{e:#}")))?;

        self.swap
            .swap(
                event.collateral_withdraw_amount,
                event.collateral_token,
                event.loan_token,
                event.liquidator,
            )
            .await
            .map_err(|e| AuditError::Conversion(format!("{e:#}")))?;

        let after = self
            .chain
            .token_balance(event.liquidator, event.loan_token)
            .await
            .map_err(|e| AuditError::BalanceAfter(format!("{e:#}")))?;

        Ok(u256_math::signed_delta(after, before))
    }
}
