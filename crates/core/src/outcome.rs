//! Reaction to the eventual result of a dispatched liquidation.
//!
//! Exactly one of [`OutcomeHandler::on_success`] and
//! [`OutcomeHandler::on_failure`] runs per attempt, and each releases the
//! wallet once. After a success the wallet stays reserved until the audit
//! conversion and swap-back, which send from the same wallet, are done.

use alloy::primitives::{Address, B256, U256};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::audit::AuditLogger;
use crate::chain::TxReceipt;
use crate::context::KeeperContext;
use crate::contracts::find_liquidate_event;
use crate::error::LiquidationError;
use crate::identity::Purpose;
use crate::position::{LoanId, Position};
use crate::rebalancer::Rebalancer;

/// One liquidation transaction being built and dispatched.
#[derive(Debug, Clone)]
pub struct LiquidationAttempt {
    pub position: Position,
    /// Wallet sending the transaction and receiving the collateral
    pub identity: Address,
    pub amount: U256,
    pub nonce: u64,
}

impl LiquidationAttempt {
    pub fn loan_id(&self) -> LoanId {
        self.position.loan_id
    }
}

/// How an attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Liquidated { tx_hash: B256 },
    /// Failed while the loan is still liquidatable. Operators are alerted.
    Spurious { failures: u32 },
    /// Failed because someone else already closed the loan
    Stale { failures: u32 },
    /// Failed and the loan status could not be re-read
    Unverified { failures: u32 },
}

pub struct OutcomeHandler {
    ctx: Arc<KeeperContext>,
    rebalancer: Rebalancer,
    audit: AuditLogger,
}

impl OutcomeHandler {
    pub fn new(ctx: Arc<KeeperContext>) -> Self {
        let settings = &ctx.settings;
        let rebalancer = Rebalancer::new(
            ctx.swap.clone(),
            settings.native_asset,
            settings.reference_asset,
            settings.rebalance_enabled,
        );
        let audit = AuditLogger::new(
            ctx.chain.clone(),
            ctx.swap.clone(),
            ctx.audit_store.clone(),
            settings.native_asset,
            settings.reference_asset,
        );
        Self {
            ctx,
            rebalancer,
            audit,
        }
    }

    #[instrument(skip_all, fields(loan_id = %attempt.loan_id(), tx_hash = %receipt.tx_hash))]
    pub async fn on_success(&self, attempt: &LiquidationAttempt, receipt: TxReceipt) -> AttemptOutcome {
        let loan_id = attempt.loan_id();
        let tx_hash = receipt.tx_hash;

        self.ctx.retries.record_success(&loan_id);

        info!(
            identity = %attempt.identity,
            amount = %attempt.amount,
            block = ?receipt.block_number,
            gas_used = receipt.gas_used,
            "Liquidation confirmed"
        );
        self.ctx
            .notifier
            .notify(&format!(
                "Liquidated loan {loan_id}\nwallet: {}\namount: {}\ntx: {tx_hash}",
                attempt.identity, attempt.amount
            ))
            .await;

        self.follow_up(attempt, &receipt).await;
        self.ctx
            .allocator
            .release(Purpose::Liquidation, attempt.identity, loan_id)
            .await;

        AttemptOutcome::Liquidated { tx_hash }
    }

    /// Audit the liquidation, then swap native proceeds back if the audit
    /// did not already convert them.
    async fn follow_up(&self, attempt: &LiquidationAttempt, receipt: &TxReceipt) {
        let loan_id = attempt.loan_id();

        let converted = match self.audit.record(receipt.tx_hash, loan_id).await {
            Ok(_) => true,
            Err(e) => {
                debug!(reason = %e, "Audit record not written");
                e.proceeds_converted()
            }
        };
        if converted {
            return;
        }

        if let Some(event) = find_liquidate_event(&receipt.logs, loan_id) {
            let outcome = self.rebalancer.rebalance(attempt.identity, &event).await;
            debug!(?outcome, "Rebalance finished");
        }
    }

    #[instrument(skip_all, fields(loan_id = %attempt.loan_id(), error = %error))]
    pub async fn on_failure(&self, attempt: &LiquidationAttempt, error: LiquidationError) -> AttemptOutcome {
        let loan_id = attempt.loan_id();

        self.ctx
            .allocator
            .release(Purpose::Liquidation, attempt.identity, loan_id)
            .await;
        let failures = self.ctx.retries.record_failure(loan_id);

        match self.ctx.chain.query_position(loan_id).await {
            Ok(status) if status.is_liquidatable() => {
                warn!(
                    failures,
                    max_liquidatable = %status.max_liquidatable,
                    "Liquidation failed but loan is still liquidatable"
                );
                self.ctx
                    .notifier
                    .notify(&format!(
                        "Liquidation of loan {loan_id} failed: {error}\n\
                         Still liquidatable (max {}), failures: {failures}.\n\
                         Manual review recommended.",
                        status.max_liquidatable
                    ))
                    .await;
                AttemptOutcome::Spurious { failures }
            }
            Ok(_) => {
                debug!(failures, "Loan already closed, failure absorbed");
                AttemptOutcome::Stale { failures }
            }
            Err(e) => {
                warn!(failures, query_error = %e, "Could not re-check loan after failure");
                self.ctx
                    .notifier
                    .notify(&format!(
                        "Liquidation of loan {loan_id} failed: {error}\n\
                         Status re-check failed ({e}), failures: {failures}.\n\
                         Manual review recommended."
                    ))
                    .await;
                AttemptOutcome::Unverified { failures }
            }
        }
    }
}
