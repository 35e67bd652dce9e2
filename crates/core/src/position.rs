//! Liquidation candidates and the working set the scheduler walks.

use alloy::primitives::{Address, B256, U256};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::u256_math;

/// Loan identifier on the lending protocol.
pub type LoanId = B256;

/// An under-collateralized loan that may be liquidated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Loan identifier
    pub loan_id: LoanId,
    /// Borrowed asset (repaid by the liquidator)
    pub loan_token: Address,
    /// Collateral asset (seized by the liquidator)
    pub collateral_token: Address,
    /// Maximum amount of the loan that can currently be closed
    pub max_liquidatable: U256,
    /// Borrowed asset is the chain's native asset
    pub is_native: bool,
}

impl Position {
    /// Create a position, deriving `is_native` from the chain's native asset.
    pub fn new(
        loan_id: LoanId,
        loan_token: Address,
        collateral_token: Address,
        max_liquidatable: U256,
        native_asset: Address,
    ) -> Self {
        Self {
            loan_id,
            loan_token,
            collateral_token,
            max_liquidatable,
            is_native: loan_token == native_asset,
        }
    }

    /// Amount to close given what the allocated wallet holds.
    #[inline]
    pub fn liquidate_amount(&self, available: U256) -> U256 {
        u256_math::min(self.max_liquidatable, available)
    }
}

/// Working set of liquidation candidates.
///
/// Insertion order is preserved: the scheduler walks positions first-come,
/// and an update to an existing loan keeps its slot.
#[derive(Debug, Default)]
pub struct PositionBook {
    positions: RwLock<Vec<Position>>,
}

impl PositionBook {
    /// Create an empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update a position. Returns true if the loan was not present.
    pub fn upsert(&self, position: Position) -> bool {
        let mut positions = self.positions.write();
        match positions.iter_mut().find(|p| p.loan_id == position.loan_id) {
            Some(existing) => {
                *existing = position;
                false
            }
            None => {
                positions.push(position);
                true
            }
        }
    }

    /// Remove a position by loan id.
    pub fn remove(&self, loan_id: &LoanId) -> Option<Position> {
        let mut positions = self.positions.write();
        let index = positions.iter().position(|p| &p.loan_id == loan_id)?;
        Some(positions.remove(index))
    }

    /// Keep only positions matching the predicate. Returns how many were dropped.
    pub fn retain<F>(&self, mut keep: F) -> usize
    where
        F: FnMut(&Position) -> bool,
    {
        let mut positions = self.positions.write();
        let before = positions.len();
        positions.retain(|p| keep(p));
        before - positions.len()
    }

    /// Get a position by loan id.
    pub fn get(&self, loan_id: &LoanId) -> Option<Position> {
        self.positions
            .read()
            .iter()
            .find(|p| &p.loan_id == loan_id)
            .cloned()
    }

    /// Check whether a loan is in the book.
    pub fn contains(&self, loan_id: &LoanId) -> bool {
        self.positions.read().iter().any(|p| &p.loan_id == loan_id)
    }

    /// Copy of the current set, in order.
    pub fn snapshot(&self) -> Vec<Position> {
        self.positions.read().clone()
    }

    pub fn len(&self) -> usize {
        self.positions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.read().is_empty()
    }
}
