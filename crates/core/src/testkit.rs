//! In-memory collaborators for unit tests.

use alloy::primitives::{Address, Log, B256, U256};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use crate::audit::{AuditRecord, AuditStore};
use crate::chain::{ChainClient, LiquidationTx, PositionStatus, TxReceipt};
use crate::context::{EngineSettings, KeeperContext};
use crate::contracts::{encode_liquidate_log, LiquidateEvent};
use crate::identity::{ExecutionIdentity, IdentityAllocator, Purpose};
use crate::notify::Notifier;
use crate::position::LoanId;
use crate::swap::{ConversionPath, SwapEngine};

pub const WALLET: Address = Address::with_last_byte(0xa1);
pub const PROTOCOL: Address = Address::with_last_byte(0xc0);
pub const COLLATERAL: Address = Address::with_last_byte(0xcc);
pub const REFERENCE: Address = Address::with_last_byte(0xdd);
pub const NATIVE: Address = Address::with_last_byte(0xee);

pub fn loan(n: u8) -> LoanId {
    B256::with_last_byte(n)
}

/// `WALLET` holding `available` of the reference asset.
pub fn identity(available: u64) -> ExecutionIdentity {
    ExecutionIdentity {
        address: WALLET,
        asset: REFERENCE,
        available: U256::from(available),
    }
}

fn hash(n: u64) -> B256 {
    B256::from(U256::from(n))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReceiptMode {
    /// Submissions are mined successfully
    #[default]
    Success,
    Revert,
    /// Submissions never get a receipt
    Hold,
}

#[derive(Default)]
struct ChainState {
    next_hash: u64,
    mode: ReceiptMode,
    reject_submit: bool,
    gas_price_error: bool,
    status_error: bool,
    nonce_failures: usize,
    receipts: HashMap<B256, TxReceipt>,
    submitted: Vec<LiquidationTx>,
    statuses: HashMap<LoanId, PositionStatus>,
    nonces: HashMap<Address, u64>,
    balances: VecDeque<U256>,
    active: Vec<PositionStatus>,
}

impl ChainState {
    fn mine(&mut self, success: bool, logs: Vec<Log>) -> B256 {
        self.next_hash += 1;
        let tx_hash = hash(self.next_hash);
        self.receipts.insert(
            tx_hash,
            TxReceipt {
                tx_hash,
                success,
                block_number: Some(self.next_hash),
                gas_used: 21_000,
                logs,
            },
        );
        tx_hash
    }
}

#[derive(Default)]
pub struct FakeChain {
    state: Mutex<ChainState>,
}

impl FakeChain {
    pub fn set_mode(&self, mode: ReceiptMode) {
        self.state.lock().mode = mode;
    }

    pub fn reject_submissions(&self) {
        self.state.lock().reject_submit = true;
    }

    pub fn fail_gas_price(&self) {
        self.state.lock().gas_price_error = true;
    }

    pub fn fail_status_queries(&self) {
        self.state.lock().status_error = true;
    }

    pub fn set_status(&self, loan_id: LoanId, max_liquidatable: U256) {
        self.state.lock().statuses.insert(
            loan_id,
            PositionStatus {
                loan_id,
                loan_token: REFERENCE,
                collateral_token: COLLATERAL,
                max_liquidatable,
                max_seizable: max_liquidatable,
            },
        );
    }

    /// The next `count` nonce lookups fail.
    pub fn fail_nonce_lookups(&self, count: usize) {
        self.state.lock().nonce_failures = count;
    }

    pub fn set_nonce(&self, address: Address, nonce: u64) {
        self.state.lock().nonces.insert(address, nonce);
    }

    /// Balances returned by successive `token_balance` calls.
    pub fn script_balances<const N: usize>(&self, balances: [u64; N]) {
        self.state.lock().balances = balances.into_iter().map(U256::from).collect();
    }

    pub fn set_active_loans(&self, loans: Vec<PositionStatus>) {
        self.state.lock().active = loans;
    }

    /// A mined transaction whose receipt carries `event`.
    pub fn mined_with_event(&self, event: &LiquidateEvent) -> B256 {
        let log = encode_liquidate_log(PROTOCOL, event);
        self.state.lock().mine(true, vec![log])
    }

    pub fn mined_without_logs(&self) -> B256 {
        self.state.lock().mine(true, Vec::new())
    }

    pub fn receipt_of(&self, tx_hash: B256) -> TxReceipt {
        self.state.lock().receipts[&tx_hash].clone()
    }

    pub fn submitted(&self) -> Vec<LiquidationTx> {
        self.state.lock().submitted.clone()
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    async fn pending_nonce(&self, address: Address) -> Result<u64> {
        let mut state = self.state.lock();
        if state.nonce_failures > 0 {
            state.nonce_failures -= 1;
            return Err(anyhow!("eth_getTransactionCount timed out"));
        }
        Ok(state.nonces.get(&address).copied().unwrap_or(0))
    }

    async fn gas_price(&self) -> Result<u128> {
        if self.state.lock().gas_price_error {
            return Err(anyhow!("rpc unavailable"));
        }
        Ok(1_000_000_000)
    }

    async fn submit(&self, tx: LiquidationTx) -> Result<B256> {
        let mut state = self.state.lock();
        if state.reject_submit {
            return Err(anyhow!("nonce too low"));
        }
        state.submitted.push(tx);
        let tx_hash = match state.mode {
            ReceiptMode::Success => state.mine(true, Vec::new()),
            ReceiptMode::Revert => state.mine(false, Vec::new()),
            ReceiptMode::Hold => {
                state.next_hash += 1;
                hash(state.next_hash)
            }
        };
        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<TxReceipt> {
        let receipt = self.state.lock().receipts.get(&tx_hash).cloned();
        match receipt {
            Some(receipt) => Ok(receipt),
            None => std::future::pending().await,
        }
    }

    async fn receipt(&self, tx_hash: B256) -> Result<Option<TxReceipt>> {
        Ok(self.state.lock().receipts.get(&tx_hash).cloned())
    }

    async fn query_position(&self, loan_id: LoanId) -> Result<PositionStatus> {
        let state = self.state.lock();
        if state.status_error {
            return Err(anyhow!("getLoan reverted"));
        }
        Ok(state.statuses.get(&loan_id).cloned().unwrap_or(PositionStatus {
            loan_id,
            loan_token: REFERENCE,
            collateral_token: COLLATERAL,
            max_liquidatable: U256::ZERO,
            max_seizable: U256::ZERO,
        }))
    }

    async fn token_balance(&self, _owner: Address, _asset: Address) -> Result<U256> {
        Ok(self.state.lock().balances.pop_front().unwrap_or_default())
    }

    async fn active_loans(&self, start: u64, count: u64) -> Result<Vec<PositionStatus>> {
        let state = self.state.lock();
        Ok(state
            .active
            .iter()
            .skip(start as usize)
            .take(count as usize)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
struct AllocatorState {
    scripted: VecDeque<Option<ExecutionIdentity>>,
    failures: usize,
    pending: HashSet<LoanId>,
    allocate_calls: Vec<(U256, Address)>,
    reserved: Vec<(Address, LoanId)>,
    released: Vec<(Address, LoanId)>,
}

/// Allocator returning scripted results. Reserved loans stay pending until
/// released.
#[derive(Default)]
pub struct FakeAllocator {
    state: Mutex<AllocatorState>,
}

impl FakeAllocator {
    pub fn script<I>(&self, results: I)
    where
        I: IntoIterator<Item = Option<ExecutionIdentity>>,
    {
        self.state.lock().scripted = results.into_iter().collect();
    }

    /// The next `count` allocations fail without consuming a scripted result.
    pub fn fail_allocations(&self, count: usize) {
        self.state.lock().failures = count;
    }

    pub fn mark_pending(&self, loan_id: LoanId) {
        self.state.lock().pending.insert(loan_id);
    }

    pub fn allocate_calls(&self) -> Vec<(U256, Address)> {
        self.state.lock().allocate_calls.clone()
    }

    pub fn reserved(&self) -> Vec<(Address, LoanId)> {
        self.state.lock().reserved.clone()
    }

    pub fn released(&self) -> Vec<(Address, LoanId)> {
        self.state.lock().released.clone()
    }
}

#[async_trait]
impl IdentityAllocator for FakeAllocator {
    async fn allocate(
        &self,
        _purpose: Purpose,
        min_amount: U256,
        asset: Address,
    ) -> Result<Option<ExecutionIdentity>> {
        let mut state = self.state.lock();
        state.allocate_calls.push((min_amount, asset));
        if state.failures > 0 {
            state.failures -= 1;
            return Err(anyhow!("no wallet balance could be read"));
        }
        Ok(state.scripted.pop_front().flatten())
    }

    async fn has_pending(&self, loan_id: &LoanId) -> bool {
        self.state.lock().pending.contains(loan_id)
    }

    async fn reserve(&self, _purpose: Purpose, identity: Address, loan_id: LoanId) {
        let mut state = self.state.lock();
        state.pending.insert(loan_id);
        state.reserved.push((identity, loan_id));
    }

    async fn release(&self, _purpose: Purpose, identity: Address, loan_id: LoanId) {
        let mut state = self.state.lock();
        state.pending.remove(&loan_id);
        state.released.push((identity, loan_id));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapCall {
    pub amount: U256,
    pub source: Address,
    pub dest: Address,
    pub beneficiary: Address,
}

#[derive(Default)]
struct SwapState {
    prices: HashMap<Address, U256>,
    paths: HashMap<(Address, Address), ConversionPath>,
    swaps: Vec<SwapCall>,
    fail: bool,
}

#[derive(Default)]
pub struct FakeSwap {
    state: Mutex<SwapState>,
}

impl FakeSwap {
    pub fn set_price(&self, asset: Address, price: U256) {
        self.state.lock().prices.insert(asset, price);
    }

    /// Connect `from` to `to` with a path of `hops` entries.
    pub fn set_path(&self, from: Address, to: Address, hops: usize) {
        let mut path = vec![from];
        path.extend((1..hops.saturating_sub(1)).map(|i| Address::with_last_byte(0x70 + i as u8)));
        path.push(to);
        self.state.lock().paths.insert((from, to), path);
    }

    pub fn fail_swaps(&self) {
        self.state.lock().fail = true;
    }

    pub fn swaps(&self) -> Vec<SwapCall> {
        self.state.lock().swaps.clone()
    }
}

#[async_trait]
impl SwapEngine for FakeSwap {
    async fn reference_prices(&self) -> Result<HashMap<Address, U256>> {
        Ok(self.state.lock().prices.clone())
    }

    async fn conversion_path(&self, from: Address, to: Address) -> Result<Option<ConversionPath>> {
        Ok(self.state.lock().paths.get(&(from, to)).cloned())
    }

    async fn swap(
        &self,
        amount: U256,
        source: Address,
        dest: Address,
        beneficiary: Address,
    ) -> Result<B256> {
        let mut state = self.state.lock();
        if state.fail {
            return Err(anyhow!("conversion reverted"));
        }
        state.swaps.push(SwapCall {
            amount,
            source,
            dest,
            beneficiary,
        });
        Ok(hash(0xf000 + state.swaps.len() as u64))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }
}

#[derive(Default)]
pub struct MemoryAuditStore {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditStore {
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn append(&self, record: AuditRecord) -> Result<u64> {
        let mut records = self.records.lock();
        records.push(record);
        Ok(records.len() as u64)
    }
}

/// All fakes wired together.
pub struct Harness {
    pub chain: Arc<FakeChain>,
    pub allocator: Arc<FakeAllocator>,
    pub swap: Arc<FakeSwap>,
    pub notifier: Arc<RecordingNotifier>,
    pub store: Arc<MemoryAuditStore>,
    pub collateral: Address,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            chain: Arc::default(),
            allocator: Arc::default(),
            swap: Arc::default(),
            notifier: Arc::default(),
            store: Arc::default(),
            collateral: COLLATERAL,
        }
    }

    pub fn settings() -> EngineSettings {
        EngineSettings {
            protocol: PROTOCOL,
            native_asset: NATIVE,
            reference_asset: REFERENCE,
            gas_limit: 2_500_000,
            confirmation_timeout: Duration::from_secs(5),
            scan_interval: Duration::ZERO,
            dispatch_throttle: Duration::ZERO,
            monitor_interval: Duration::ZERO,
            monitor_page_size: 100,
            rebalance_enabled: true,
        }
    }

    pub fn context(&self) -> Arc<KeeperContext> {
        self.context_with(Self::settings(), self.notifier.clone())
    }

    pub fn context_with_notifier(&self, notifier: Arc<dyn Notifier>) -> Arc<KeeperContext> {
        self.context_with(Self::settings(), notifier)
    }

    pub fn context_with(
        &self,
        settings: EngineSettings,
        notifier: Arc<dyn Notifier>,
    ) -> Arc<KeeperContext> {
        Arc::new(KeeperContext::new(
            settings,
            self.allocator.clone(),
            self.chain.clone(),
            self.swap.clone(),
            notifier,
            self.store.clone(),
        ))
    }
}
