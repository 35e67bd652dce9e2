//! Failure taxonomy for liquidation attempts and audit records.

use alloy::primitives::{Address, B256, U256};
use std::time::Duration;
use thiserror::Error;

/// Why a liquidation attempt did not succeed.
///
/// Every variant except `AllocationUnavailable` is routed through the
/// failure path of the outcome handler, which re-queries the loan to tell a
/// lost race apart from an already-resolved position.
#[derive(Debug, Clone, Error)]
pub enum LiquidationError {
    #[error("no funded wallet for {required} of {asset}")]
    AllocationUnavailable { asset: Address, required: U256 },

    #[error("transaction rejected before broadcast: {0}")]
    Rejected(String),

    #[error("transaction {0} reverted")]
    Reverted(B256),

    #[error("transaction {tx_hash} not confirmed after {waited:?}")]
    ConfirmationTimeout { tx_hash: B256, waited: Duration },

    #[error("confirmation of {tx_hash} failed: {reason}")]
    ConfirmationFailed { tx_hash: B256, reason: String },
}

impl LiquidationError {
    /// Transaction hash, when the attempt got as far as broadcast.
    pub fn tx_hash(&self) -> Option<B256> {
        match self {
            Self::Reverted(hash) => Some(*hash),
            Self::ConfirmationTimeout { tx_hash, .. } | Self::ConfirmationFailed { tx_hash, .. } => {
                Some(*tx_hash)
            }
            Self::AllocationUnavailable { .. } | Self::Rejected(_) => None,
        }
    }
}

/// Reasons an audit record is not written.
///
/// None of these affect how the liquidation itself is classified.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("receipt for {0} not found")]
    ReceiptMissing(B256),

    #[error("no Liquidate event for loan {loan_id} in {tx_hash}")]
    NoEvent { tx_hash: B256, loan_id: B256 },

    #[error("Liquidate event has no {0}")]
    MalformedEvent(&'static str),

    #[error("no conversion path from {from} to {to}")]
    NoPath { from: Address, to: Address },

    #[error("conversion path has {actual} hops, expected {expected}")]
    PathMismatch { expected: usize, actual: usize },

    #[error("balance query failed: {0}")]
    BalanceBefore(String),

    #[error("collateral conversion failed: {0}")]
    Conversion(String),

    #[error("balance query after conversion failed: {0}")]
    BalanceAfter(String),

    #[error("audit store rejected record: {0}")]
    Persist(String),
}

impl AuditError {
    /// Whether the withdrawn collateral was already converted when the
    /// audit step stopped.
    pub fn proceeds_converted(&self) -> bool {
        matches!(self, Self::BalanceAfter(_) | Self::Persist(_))
    }
}
