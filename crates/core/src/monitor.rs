//! Feeds the working set from the protocol's own list of unsafe loans.
//!
//! The protocol is paged through `active_loans` on every sweep. Loans still
//! reported unsafe are upserted (this is how a position dispatched earlier
//! comes back), loans no longer reported are dropped.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::context::KeeperContext;
use crate::position::Position;

/// Result of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub seen: usize,
    pub added: usize,
    pub dropped: usize,
}

pub struct PositionMonitor {
    ctx: Arc<KeeperContext>,
}

impl PositionMonitor {
    pub fn new(ctx: Arc<KeeperContext>) -> Self {
        Self { ctx }
    }

    /// Sweep forever at the monitor interval.
    pub async fn run(&self) {
        info!(interval = ?self.ctx.settings.monitor_interval, "Position monitor started");
        loop {
            if let Err(e) = self.sweep().await {
                warn!(error = %e, "Position sweep failed");
            }
            tokio::time::sleep(self.ctx.settings.monitor_interval).await;
        }
    }

    /// Page through all unsafe loans and reconcile the working set.
    ///
    /// A failed page leaves the working set untouched.
    pub async fn sweep(&self) -> anyhow::Result<SweepReport> {
        let settings = &self.ctx.settings;
        let page_size = settings.monitor_page_size.max(1);
        let mut loans = Vec::new();
        let mut start = 0u64;

        loop {
            let page = self.ctx.chain.active_loans(start, page_size).await?;
            let fetched = page.len() as u64;
            loans.extend(page);
            if fetched < page_size {
                break;
            }
            start += page_size;
        }

        let mut report = SweepReport {
            seen: loans.len(),
            ..Default::default()
        };
        let mut unsafe_ids = HashSet::with_capacity(loans.len());

        for status in loans.into_iter().filter(|status| status.is_liquidatable()) {
            unsafe_ids.insert(status.loan_id);
            let position = Position::new(
                status.loan_id,
                status.loan_token,
                status.collateral_token,
                status.max_liquidatable,
                settings.native_asset,
            );
            if self.ctx.book.upsert(position) {
                report.added += 1;
            }
        }

        report.dropped = self.ctx.book.retain(|p| unsafe_ids.contains(&p.loan_id));

        debug!(
            seen = report.seen,
            added = report.added,
            dropped = report.dropped,
            working_set = self.ctx.book.len(),
            "Position sweep complete"
        );
        Ok(report)
    }
}
