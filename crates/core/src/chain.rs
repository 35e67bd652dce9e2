//! Chain access required by the keeper.
//!
//! `submit` returns as soon as the node accepts the transaction; the outcome
//! is observed separately through `wait_for_receipt`, so the scheduler never
//! blocks on confirmation.

use alloy::primitives::{Address, Bytes, Log, B256, U256};
use anyhow::Result;
use async_trait::async_trait;

use crate::position::LoanId;

/// Fully specified liquidation transaction, ready to sign and send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidationTx {
    /// Sending wallet (must be one of the client's signers)
    pub from: Address,
    /// Protocol contract
    pub to: Address,
    /// ABI-encoded call
    pub input: Bytes,
    /// Native value attached
    pub value: U256,
    pub nonce: u64,
    /// Legacy gas price in wei
    pub gas_price: u128,
    pub gas_limit: u64,
}

/// Receipt fields the keeper reads.
#[derive(Debug, Clone)]
pub struct TxReceipt {
    pub tx_hash: B256,
    /// Execution status (false = reverted)
    pub success: bool,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    /// Emitted logs, in order
    pub logs: Vec<Log>,
}

/// Authoritative on-chain view of a loan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionStatus {
    pub loan_id: LoanId,
    pub loan_token: Address,
    pub collateral_token: Address,
    pub max_liquidatable: U256,
    pub max_seizable: U256,
}

impl PositionStatus {
    /// Whether anything is still left to liquidate.
    pub fn is_liquidatable(&self) -> bool {
        !self.max_liquidatable.is_zero()
    }
}

/// Chain RPC client.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Next nonce for `address`, counting pending transactions.
    async fn pending_nonce(&self, address: Address) -> Result<u64>;

    /// Current gas price in wei.
    async fn gas_price(&self) -> Result<u128>;

    /// Sign and broadcast. Returns once the node has accepted the transaction.
    async fn submit(&self, tx: LiquidationTx) -> Result<B256>;

    /// Wait until the transaction is mined and return its receipt.
    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<TxReceipt>;

    /// Fetch a receipt if the transaction has been mined.
    async fn receipt(&self, tx_hash: B256) -> Result<Option<TxReceipt>>;

    /// Current on-chain status of a loan.
    async fn query_position(&self, loan_id: LoanId) -> Result<PositionStatus>;

    /// Balance of `owner` in `asset` (the native asset reads the account balance).
    async fn token_balance(&self, owner: Address, asset: Address) -> Result<U256>;

    /// Page through loans the protocol reports as unsafe.
    async fn active_loans(&self, start: u64, count: u64) -> Result<Vec<PositionStatus>>;
}
