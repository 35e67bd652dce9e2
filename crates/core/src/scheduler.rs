//! Top-level scan loop.
//!
//! Each cycle walks a snapshot of the working set in order. A position is
//! skipped while a wallet is reserved for it or while it is quarantined.
//! Everything else gets a wallet, a nonce and a dispatch, followed by a short
//! pause. The loop never stops on a per-position error.

use alloy::primitives::U256;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::context::KeeperContext;
use crate::error::LiquidationError;
use crate::identity::Purpose;
use crate::outcome::{AttemptOutcome, LiquidationAttempt, OutcomeHandler};
use crate::position::{LoanId, Position};
use crate::submission::SubmissionEngine;

/// Summary of one pass over the working set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub dispatched: Vec<LoanId>,
    pub skipped_pending: usize,
    pub skipped_quarantined: usize,
    pub no_identity: usize,
    /// Allocation or nonce lookups that errored
    pub failed: usize,
    /// A wallet with zero balance was handed out and the cycle stopped
    pub funds_exhausted: bool,
}

enum Step {
    Dispatched(JoinHandle<AttemptOutcome>),
    Pending,
    Quarantined,
    NoIdentity,
    Failed,
    FundsExhausted,
}

pub struct Scheduler {
    ctx: Arc<KeeperContext>,
    submission: SubmissionEngine,
}

impl Scheduler {
    pub fn new(ctx: Arc<KeeperContext>) -> Self {
        let outcome = Arc::new(OutcomeHandler::new(ctx.clone()));
        let submission = SubmissionEngine::new(ctx.clone(), outcome);
        Self { ctx, submission }
    }

    /// Run cycles forever, sleeping the scan interval between them.
    pub async fn run(&self) {
        info!(
            scan_interval = ?self.ctx.settings.scan_interval,
            throttle = ?self.ctx.settings.dispatch_throttle,
            "Scheduler started"
        );
        loop {
            self.run_cycle().await;
            tokio::time::sleep(self.ctx.settings.scan_interval).await;
        }
    }

    /// One pass over the working set. Dispatched attempts keep running in
    /// the background.
    pub async fn run_cycle(&self) -> CycleReport {
        self.cycle().await.0
    }

    pub(crate) async fn cycle(&self) -> (CycleReport, Vec<JoinHandle<AttemptOutcome>>) {
        let positions = self.ctx.book.snapshot();
        let mut report = CycleReport::default();
        let mut handles = Vec::new();

        for position in positions {
            match self.process(&position).await {
                Step::Dispatched(handle) => {
                    report.dispatched.push(position.loan_id);
                    handles.push(handle);
                    if !self.ctx.settings.dispatch_throttle.is_zero() {
                        tokio::time::sleep(self.ctx.settings.dispatch_throttle).await;
                    }
                }
                Step::Pending => report.skipped_pending += 1,
                Step::Quarantined => report.skipped_quarantined += 1,
                Step::NoIdentity => report.no_identity += 1,
                Step::Failed => report.failed += 1,
                Step::FundsExhausted => {
                    report.funds_exhausted = true;
                    break;
                }
            }
        }

        info!(
            dispatched = report.dispatched.len(),
            pending = report.skipped_pending,
            quarantined = report.skipped_quarantined,
            no_identity = report.no_identity,
            failed = report.failed,
            funds_exhausted = report.funds_exhausted,
            "Scan cycle complete"
        );
        (report, handles)
    }

    async fn process(&self, position: &Position) -> Step {
        let loan_id = position.loan_id;

        if self.ctx.allocator.has_pending(&loan_id).await {
            debug!(loan_id = %loan_id, "Allocation pending, skipping");
            return Step::Pending;
        }
        if self.ctx.retries.is_quarantined(&loan_id) {
            debug!(
                loan_id = %loan_id,
                failures = self.ctx.retries.failures(&loan_id),
                "Quarantined, skipping"
            );
            return Step::Quarantined;
        }

        let identity = match self
            .ctx
            .allocator
            .allocate(Purpose::Liquidation, position.max_liquidatable, position.loan_token)
            .await
        {
            Ok(Some(identity)) => identity,
            Ok(None) => {
                let error = LiquidationError::AllocationUnavailable {
                    asset: position.loan_token,
                    required: position.max_liquidatable,
                };
                warn!(loan_id = %loan_id, %error, "No funded wallet");
                self.ctx
                    .notifier
                    .notify(&format!("Loan {loan_id}: {error}"))
                    .await;
                return Step::NoIdentity;
            }
            Err(e) => {
                warn!(loan_id = %loan_id, error = %e, "Wallet allocation failed");
                return Step::Failed;
            }
        };

        if identity.available == U256::ZERO {
            warn!(
                loan_id = %loan_id,
                identity = %identity.address,
                "Allocated wallet is empty, funds exhausted"
            );
            return Step::FundsExhausted;
        }

        let nonce = match self.ctx.chain.pending_nonce(identity.address).await {
            Ok(nonce) => nonce,
            Err(e) => {
                warn!(identity = %identity.address, error = %e, "Nonce lookup failed");
                return Step::Failed;
            }
        };

        let attempt = LiquidationAttempt {
            position: position.clone(),
            identity: identity.address,
            amount: position.liquidate_amount(identity.available),
            nonce,
        };
        Step::Dispatched(self.submission.dispatch(attempt).await)
    }
}
