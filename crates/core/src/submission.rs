//! Building and dispatching liquidation transactions.
//!
//! `dispatch` returns as soon as the node accepts the transaction. Waiting
//! for the receipt and everything after it runs in a spawned task.

use alloy::primitives::{B256, U256};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use crate::chain::LiquidationTx;
use crate::context::KeeperContext;
use crate::contracts::encode_liquidate;
use crate::error::LiquidationError;
use crate::identity::Purpose;
use crate::outcome::{AttemptOutcome, LiquidationAttempt, OutcomeHandler};

pub struct SubmissionEngine {
    ctx: Arc<KeeperContext>,
    outcome: Arc<OutcomeHandler>,
}

impl SubmissionEngine {
    pub fn new(ctx: Arc<KeeperContext>, outcome: Arc<OutcomeHandler>) -> Self {
        Self { ctx, outcome }
    }

    /// Build the `liquidate` transaction for an attempt. Native loans are
    /// repaid with attached value.
    pub fn build_tx(&self, attempt: &LiquidationAttempt, gas_price: u128) -> LiquidationTx {
        let value = if attempt.position.is_native {
            attempt.amount
        } else {
            U256::ZERO
        };
        LiquidationTx {
            from: attempt.identity,
            to: self.ctx.settings.protocol,
            input: encode_liquidate(attempt.loan_id(), attempt.identity, attempt.amount),
            value,
            nonce: attempt.nonce,
            gas_price,
            gas_limit: self.ctx.settings.gas_limit,
        }
    }

    /// Reserve the wallet, drop the position from the working set and
    /// broadcast. The returned handle resolves with the final outcome.
    #[instrument(
        skip_all,
        fields(
            loan_id = %attempt.loan_id(),
            identity = %attempt.identity,
            amount = %attempt.amount,
            nonce = attempt.nonce
        )
    )]
    pub async fn dispatch(&self, attempt: LiquidationAttempt) -> JoinHandle<AttemptOutcome> {
        let loan_id = attempt.loan_id();
        self.ctx
            .allocator
            .reserve(Purpose::Liquidation, attempt.identity, loan_id)
            .await;
        self.ctx.book.remove(&loan_id);

        let ctx = self.ctx.clone();
        let outcome = self.outcome.clone();

        match self.broadcast(&attempt).await {
            Ok(tx_hash) => {
                info!(tx_hash = %tx_hash, "Liquidation broadcast");
                tokio::spawn(confirm(ctx, outcome, attempt, tx_hash))
            }
            Err(error) => {
                warn!(error = %error, "Liquidation not broadcast");
                tokio::spawn(async move { outcome.on_failure(&attempt, error).await })
            }
        }
    }

    async fn broadcast(&self, attempt: &LiquidationAttempt) -> Result<B256, LiquidationError> {
        let gas_price = self
            .ctx
            .chain
            .gas_price()
            .await
            .map_err(|e| LiquidationError::Rejected(format!("gas price unavailable: {e:#}")))?;

        let tx = self.build_tx(attempt, gas_price);
        self.ctx
            .chain
            .submit(tx)
            .await
            .map_err(|e| LiquidationError::Rejected(format!("{e:#}")))
    }
}

/// Wait for the receipt, bounded by the confirmation timeout, and hand the
/// result to the outcome handler.
async fn confirm(
    ctx: Arc<KeeperContext>,
    outcome: Arc<OutcomeHandler>,
    attempt: LiquidationAttempt,
    tx_hash: B256,
) -> AttemptOutcome {
    let waited = ctx.settings.confirmation_timeout;
    match tokio::time::timeout(waited, ctx.chain.wait_for_receipt(tx_hash)).await {
        Ok(Ok(receipt)) if receipt.success => outcome.on_success(&attempt, receipt).await,
        Ok(Ok(_)) => {
            outcome
                .on_failure(&attempt, LiquidationError::Reverted(tx_hash))
                .await
        }
        Ok(Err(e)) => {
            let error = LiquidationError::ConfirmationFailed {
                tx_hash,
                reason: format!("{e:#}"),
            };
            outcome.on_failure(&attempt, error).await
        }
        Err(_) => {
            outcome
                .on_failure(&attempt, LiquidationError::ConfirmationTimeout { tx_hash, waited })
                .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::ILendingProtocol;
    use crate::position::Position;
    use crate::testkit::{self, Harness, ReceiptMode};
    use alloy::sol_types::SolCall;
    use std::time::Duration;

    fn engine(harness: &Harness) -> (Arc<KeeperContext>, SubmissionEngine) {
        let ctx = harness.context();
        let outcome = Arc::new(OutcomeHandler::new(ctx.clone()));
        (ctx.clone(), SubmissionEngine::new(ctx, outcome))
    }

    fn attempt(loan_token: alloy::primitives::Address) -> LiquidationAttempt {
        LiquidationAttempt {
            position: Position::new(
                testkit::loan(1),
                loan_token,
                testkit::COLLATERAL,
                U256::from(100u64),
                testkit::NATIVE,
            ),
            identity: testkit::WALLET,
            amount: U256::from(60u64),
            nonce: 9,
        }
    }

    #[test]
    fn test_build_tx_token_loan() {
        let harness = Harness::new();
        let (_, engine) = engine(&harness);

        let tx = engine.build_tx(&attempt(testkit::REFERENCE), 5);

        assert_eq!(tx.value, U256::ZERO);
        assert_eq!(tx.to, testkit::PROTOCOL);
        assert_eq!(tx.from, testkit::WALLET);
        assert_eq!(tx.nonce, 9);
        assert_eq!(tx.gas_price, 5);

        let call = ILendingProtocol::liquidateCall::abi_decode(&tx.input, true).unwrap();
        assert_eq!(call.loanId, testkit::loan(1));
        assert_eq!(call.receiver, testkit::WALLET);
        assert_eq!(call.closeAmount, U256::from(60u64));
    }

    #[test]
    fn test_build_tx_native_loan_attaches_value() {
        let harness = Harness::new();
        let (_, engine) = engine(&harness);

        let tx = engine.build_tx(&attempt(testkit::NATIVE), 5);

        assert_eq!(tx.value, U256::from(60u64));
    }

    #[tokio::test]
    async fn test_dispatch_removes_position_before_confirmation() {
        let harness = Harness::new();
        harness.chain.set_mode(ReceiptMode::Hold);
        let (ctx, engine) = engine(&harness);
        let attempt = attempt(testkit::REFERENCE);
        ctx.book.upsert(attempt.position.clone());

        let handle = engine.dispatch(attempt.clone()).await;

        assert!(!ctx.book.contains(&attempt.loan_id()));
        assert_eq!(harness.allocator.reserved(), vec![(testkit::WALLET, attempt.loan_id())]);
        assert!(ctx.allocator.has_pending(&attempt.loan_id()).await);
        assert_eq!(harness.chain.submitted().len(), 1);
        assert!(!handle.is_finished());
        handle.abort();
    }

    #[tokio::test]
    async fn test_rejected_broadcast_takes_failure_path() {
        let harness = Harness::new();
        harness.chain.reject_submissions();
        let (ctx, engine) = engine(&harness);
        let attempt = attempt(testkit::REFERENCE);
        ctx.book.upsert(attempt.position.clone());

        let outcome = engine.dispatch(attempt.clone()).await.await.unwrap();

        assert_eq!(outcome, AttemptOutcome::Stale { failures: 1 });
        assert!(!ctx.book.contains(&attempt.loan_id()));
        assert_eq!(harness.allocator.released().len(), 1);
        assert!(!ctx.allocator.has_pending(&attempt.loan_id()).await);
    }

    #[tokio::test]
    async fn test_gas_price_failure_takes_failure_path() {
        let harness = Harness::new();
        harness.chain.fail_gas_price();
        let (ctx, engine) = engine(&harness);
        let attempt = attempt(testkit::REFERENCE);
        harness.chain.set_status(attempt.loan_id(), U256::from(100u64));

        let outcome = engine.dispatch(attempt.clone()).await.await.unwrap();

        assert_eq!(outcome, AttemptOutcome::Spurious { failures: 1 });
        assert!(harness.chain.submitted().is_empty());
        assert_eq!(ctx.retries.failures(&attempt.loan_id()), 1);
        assert_eq!(harness.notifier.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_reverted_transaction_increments_retries() {
        let harness = Harness::new();
        harness.chain.set_mode(ReceiptMode::Revert);
        let (ctx, engine) = engine(&harness);
        let attempt = attempt(testkit::REFERENCE);

        let outcome = engine.dispatch(attempt.clone()).await.await.unwrap();

        assert_eq!(outcome, AttemptOutcome::Stale { failures: 1 });
        assert_eq!(ctx.retries.failures(&attempt.loan_id()), 1);
    }

    #[tokio::test]
    async fn test_confirmed_transaction_succeeds() {
        let harness = Harness::new();
        let (ctx, engine) = engine(&harness);
        let attempt = attempt(testkit::REFERENCE);
        ctx.retries.record_failure(attempt.loan_id());

        let outcome = engine.dispatch(attempt.clone()).await.await.unwrap();

        assert!(matches!(outcome, AttemptOutcome::Liquidated { .. }));
        assert_eq!(ctx.retries.failures(&attempt.loan_id()), 0);
        assert_eq!(harness.allocator.released().len(), 1);
    }

    #[tokio::test]
    async fn test_confirmation_timeout_is_a_failure() {
        let harness = Harness::new();
        harness.chain.set_mode(ReceiptMode::Hold);
        let mut settings = Harness::settings();
        settings.confirmation_timeout = Duration::from_millis(20);
        let ctx = harness.context_with(settings, harness.notifier.clone());
        let engine = SubmissionEngine::new(ctx.clone(), Arc::new(OutcomeHandler::new(ctx.clone())));
        let attempt = attempt(testkit::REFERENCE);

        let outcome = engine.dispatch(attempt.clone()).await.await.unwrap();

        assert_eq!(outcome, AttemptOutcome::Stale { failures: 1 });
        assert_eq!(harness.allocator.released().len(), 1);
    }
}
