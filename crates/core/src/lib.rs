//! Liquidation keeper core.
//!
//! This crate provides the liquidation engine and the contracts it consumes:
//! - Working set of candidate positions and per-loan retry/quarantine state
//! - Collaborator traits (chain client, wallet allocator, swap engine,
//!   notifier, audit store)
//! - Submission engine and outcome handler
//! - Swap-back rebalancer and profit-annotated audit log
//! - Scan scheduler and unsafe-loan monitor
//! - Profile/TOML configuration

pub mod audit;
mod chain;
pub mod config;
mod context;
pub mod contracts;
mod error;
mod identity;
mod monitor;
mod notify;
mod outcome;
mod position;
mod rebalancer;
mod retry;
mod scheduler;
mod submission;
mod swap;
pub mod u256_math;

#[cfg(test)]
mod testkit;

pub use audit::{AuditLogger, AuditRecord, AuditStore, JsonlAuditStore, PositionSide};
pub use chain::{ChainClient, LiquidationTx, PositionStatus, TxReceipt};
pub use config::BotConfig;
pub use context::{EngineSettings, KeeperContext};
pub use contracts::LiquidateEvent;
pub use error::{AuditError, LiquidationError};
pub use identity::{ExecutionIdentity, IdentityAllocator, Purpose};
pub use monitor::{PositionMonitor, SweepReport};
pub use notify::Notifier;
pub use outcome::{AttemptOutcome, LiquidationAttempt, OutcomeHandler};
pub use position::{LoanId, Position, PositionBook};
pub use rebalancer::{RebalanceOutcome, Rebalancer};
pub use retry::{is_quarantined, RetryTracker, QUARANTINE_THRESHOLD};
pub use scheduler::{CycleReport, Scheduler};
pub use submission::SubmissionEngine;
pub use swap::{ConversionPath, SwapEngine};
