//! Lending protocol ABI and `Liquidate` event decoding.
//!
//! The interface covers only what the keeper touches: the liquidation entry
//! point, loan queries, and the event emitted on a successful liquidation.

use alloy::primitives::{Address, Bytes, Log, U256};
use alloy::sol;
use alloy::sol_types::{SolCall, SolEvent};

use crate::chain::PositionStatus;
use crate::position::LoanId;

sol! {
    /// Loan snapshot returned by the protocol's loan views
    #[derive(Debug)]
    struct LoanReturnData {
        bytes32 loanId;
        address loanToken;
        address collateralToken;
        uint256 principal;
        uint256 collateral;
        uint256 interestOwedPerDay;
        uint256 interestDepositRemaining;
        uint256 startRate;
        uint256 startMargin;
        uint256 maintenanceMargin;
        uint256 currentMargin;
        uint256 maxLoanTerm;
        uint256 endTimestamp;
        uint256 maxLiquidatable;
        uint256 maxSeizable;
    }

    /// Lending protocol interface (subset for liquidation)
    #[sol(rpc)]
    #[derive(Debug)]
    interface ILendingProtocol {
        event Liquidate(
            address indexed user,
            address indexed liquidator,
            bytes32 indexed loanId,
            address lender,
            address loanToken,
            address collateralToken,
            uint256 repayAmount,
            uint256 collateralWithdrawAmount,
            uint256 collateralToLoanRate,
            uint256 currentMargin
        );

        function liquidate(
            bytes32 loanId,
            address receiver,
            uint256 closeAmount
        ) external payable returns (uint256 loanCloseAmount, uint256 seizedAmount, address seizedToken);

        function getLoan(bytes32 loanId) external view returns (LoanReturnData memory);

        function getActiveLoans(
            uint256 start,
            uint256 count,
            bool unsafeOnly
        ) external view returns (LoanReturnData[] memory);
    }
}

impl From<LoanReturnData> for PositionStatus {
    fn from(loan: LoanReturnData) -> Self {
        Self {
            loan_id: loan.loanId,
            loan_token: loan.loanToken,
            collateral_token: loan.collateralToken,
            max_liquidatable: loan.maxLiquidatable,
            max_seizable: loan.maxSeizable,
        }
    }
}

/// Encode a `liquidate` call. Seized collateral is sent to `receiver`.
pub fn encode_liquidate(loan_id: LoanId, receiver: Address, close_amount: U256) -> Bytes {
    let call = ILendingProtocol::liquidateCall {
        loanId: loan_id,
        receiver,
        closeAmount: close_amount,
    };
    Bytes::from(call.abi_encode())
}

/// Decoded `Liquidate` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidateEvent {
    pub user: Address,
    pub liquidator: Address,
    pub loan_id: LoanId,
    pub lender: Address,
    pub loan_token: Address,
    pub collateral_token: Address,
    pub repay_amount: U256,
    pub collateral_withdraw_amount: U256,
    pub collateral_to_loan_rate: U256,
    pub current_margin: U256,
}

impl From<ILendingProtocol::Liquidate> for LiquidateEvent {
    fn from(event: ILendingProtocol::Liquidate) -> Self {
        Self {
            user: event.user,
            liquidator: event.liquidator,
            loan_id: event.loanId,
            lender: event.lender,
            loan_token: event.loanToken,
            collateral_token: event.collateralToken,
            repay_amount: event.repayAmount,
            collateral_withdraw_amount: event.collateralWithdrawAmount,
            collateral_to_loan_rate: event.collateralToLoanRate,
            current_margin: event.currentMargin,
        }
    }
}

impl LiquidateEvent {
    /// Name of the first identifying field that is unset, if any.
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.user.is_zero() {
            Some("user")
        } else if self.liquidator.is_zero() {
            Some("liquidator")
        } else if self.loan_id.is_zero() {
            Some("loanId")
        } else {
            None
        }
    }
}

/// Decode every `Liquidate` event in a receipt's logs, in log order.
///
/// Logs from other events or with malformed data are skipped.
pub fn decode_liquidate_events(logs: &[Log]) -> Vec<LiquidateEvent> {
    logs.iter()
        .filter_map(|log| ILendingProtocol::Liquidate::decode_log(log, true).ok())
        .map(|decoded| LiquidateEvent::from(decoded.data))
        .collect()
}

/// Pick the event for `loan_id`. With several matches the first wins.
pub fn find_liquidate_event(logs: &[Log], loan_id: LoanId) -> Option<LiquidateEvent> {
    let mut matching = decode_liquidate_events(logs)
        .into_iter()
        .filter(|event| event.loan_id == loan_id);
    let first = matching.next()?;
    let extra = matching.count();
    if extra > 0 {
        tracing::warn!(
            loan_id = %loan_id,
            extra,
            "Multiple Liquidate events for loan, using the first"
        );
    }
    Some(first)
}

#[cfg(test)]
pub(crate) fn encode_liquidate_log(protocol: Address, event: &LiquidateEvent) -> Log {
    let sol_event = ILendingProtocol::Liquidate {
        user: event.user,
        liquidator: event.liquidator,
        loanId: event.loan_id,
        lender: event.lender,
        loanToken: event.loan_token,
        collateralToken: event.collateral_token,
        repayAmount: event.repay_amount,
        collateralWithdrawAmount: event.collateral_withdraw_amount,
        collateralToLoanRate: event.collateral_to_loan_rate,
        currentMargin: event.current_margin,
    };
    Log {
        address: protocol,
        data: sol_event.encode_log_data(),
    }
}
