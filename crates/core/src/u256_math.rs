//! U256 helpers for liquidation amounts and profit figures.
//!
//! Amounts stay in native U256 units end to end; signed results use I256 so
//! a loss is representable without a separate flag.

use alloy::primitives::{I256, U256};

/// WAD constant: 1e18 for 18-decimal fixed-point arithmetic
pub const WAD: U256 = U256::from_limbs([1_000_000_000_000_000_000u64, 0, 0, 0]);

/// Basis points denominator (10000 = 100%)
pub const BPS_DENOMINATOR: U256 = U256::from_limbs([10000u64, 0, 0, 0]);

/// Apply basis points reduction (e.g., for slippage).
/// Returns: value * (10000 - basis_points) / 10000
///
/// Example: apply_basis_points(1000, 100) = 990 (1% reduction)
#[inline(always)]
pub fn apply_basis_points(value: U256, basis_points: u16) -> U256 {
    let factor = U256::from(10000u16.saturating_sub(basis_points));
    value.saturating_mul(factor) / BPS_DENOMINATOR
}

/// Signed difference `after - before`.
///
/// Inputs above 2^255 are not meaningful token amounts and wrap.
pub fn signed_delta(after: U256, before: U256) -> I256 {
    if after >= before {
        I256::from_raw(after - before)
    } else {
        -I256::from_raw(before - after)
    }
}

/// Convert an amount of the loan token into collateral units using a
/// WAD-scaled collateral-to-loan rate.
///
/// Returns `None` for a zero rate or on overflow.
pub fn loan_to_collateral(amount: U256, collateral_to_loan_rate: U256) -> Option<U256> {
    if collateral_to_loan_rate.is_zero() {
        return None;
    }
    amount
        .checked_mul(WAD)
        .map(|scaled| scaled / collateral_to_loan_rate)
}

/// Smaller of two U256 values.
#[inline(always)]
pub fn min(a: U256, b: U256) -> U256 {
    if a < b {
        a
    } else {
        b
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_basis_points() {
        let amount = U256::from(1000u64);
        assert_eq!(apply_basis_points(amount, 100), U256::from(990u64));
        assert_eq!(apply_basis_points(amount, 1000), U256::from(900u64));
        assert_eq!(apply_basis_points(amount, 20_000), U256::ZERO);
    }

    #[test]
    fn test_signed_delta() {
        let gain = signed_delta(U256::from(1500u64), U256::from(1000u64));
        assert_eq!(gain, I256::try_from(500i64).unwrap());

        let loss = signed_delta(U256::from(1000u64), U256::from(1500u64));
        assert_eq!(loss, I256::try_from(-500i64).unwrap());
        assert!(loss.is_negative());

        assert_eq!(signed_delta(U256::from(7u64), U256::from(7u64)), I256::ZERO);
    }

    #[test]
    fn test_loan_to_collateral() {
        // 2 loan units per collateral unit
        let rate = WAD * U256::from(2u64);
        assert_eq!(
            loan_to_collateral(U256::from(100u64), rate),
            Some(U256::from(50u64))
        );
        assert_eq!(loan_to_collateral(U256::from(100u64), U256::ZERO), None);
        assert_eq!(loan_to_collateral(U256::MAX, WAD), None);
    }

    #[test]
    fn test_min() {
        assert_eq!(min(U256::from(100u64), U256::from(60u64)), U256::from(60u64));
        assert_eq!(min(U256::from(5u64), U256::from(60u64)), U256::from(5u64));
    }
}
