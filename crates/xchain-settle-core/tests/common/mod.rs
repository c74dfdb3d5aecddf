#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use alloy::primitives::{address, keccak256, Address, Bytes, B256, U256};
use alloy::sol_types::{SolCall, SolEvent, SolValue};

use xchain_settle_core::contracts::{IMessageTransmitter, ISettlement, ITokenMessenger, IERC20};
use xchain_settle_core::{
    payment_supersedes, BurnCheckpoint, ChainConfig, ChainReadPort, ChainRegistry, ClockPort,
    FeeQuote, Orchestrator, PaymentWriteBack, PortError, ProviderPort, ReceiptLog,
    RecordStorePort, SettlementRequest, SettlementTarget, TargetStatus, TransferPolicy,
    TransferRequest, TxReceipt, TxRequest, VerifierMessage, VerifierPort, VerifierStatus,
    WriteBackOutcome,
};

pub const CHAIN_A: u64 = 1001;
pub const CHAIN_B: u64 = 2002;
pub const CHAIN_C: u64 = 3003;
pub const DOMAIN_A: u32 = 0;
pub const DOMAIN_B: u32 = 6;
pub const DOMAIN_C: u32 = 3;

pub const OWNER: Address = address!("1000000000000000000000000000000000000001");
pub const RECIPIENT: Address = address!("2000000000000000000000000000000000000002");
pub const OTHER_PAYER: Address = address!("3000000000000000000000000000000000000003");
pub const TOKEN_A: Address = address!("aaaa00000000000000000000000000000000000a");
pub const TOKEN_B: Address = address!("bbbb00000000000000000000000000000000000b");
pub const TOKEN_C: Address = address!("cccc00000000000000000000000000000000000c");
pub const BURN_CONTRACT: Address = address!("8FE6B999Dc680CcFDD5Bf7EB0974218be2542DAA");
pub const RELAY_CONTRACT: Address = address!("E737e5cEBEEBa77EFE34D4aa090756590b1CE275");
pub const SETTLEMENT_CONTRACT: Address = address!("5e77000000000000000000000000000000000005");

pub const TARGET_ID: &str = "inv-42";

/// 10.000000 units of a 6-decimal token.
pub fn ten_units() -> U256 {
    U256::from(10_000_000u64)
}

pub fn one_eth() -> U256 {
    U256::from(1_000_000_000_000_000_000u128)
}

pub fn burn_hash() -> B256 {
    B256::repeat_byte(0xaa)
}

pub fn mint_hash() -> B256 {
    B256::repeat_byte(0xbb)
}

pub fn onchain_target_id() -> B256 {
    keccak256(TARGET_ID.as_bytes())
}

pub fn attestation_hex() -> String {
    format!("0x{}", "ab".repeat(130))
}

pub fn domain_of(chain_id: u64) -> u32 {
    match chain_id {
        CHAIN_A => DOMAIN_A,
        CHAIN_B => DOMAIN_B,
        _ => DOMAIN_C,
    }
}

fn chain_config(chain_id: u64, token: Address) -> ChainConfig {
    ChainConfig {
        chain_id,
        name: format!("chain-{chain_id}"),
        verifier_domain_id: domain_of(chain_id),
        token_address: token,
        burn_contract_address: BURN_CONTRACT,
        relay_contract_address: RELAY_CONTRACT,
        node_endpoint: format!("http://node-{chain_id}.invalid"),
        explorer_url: format!("https://explorer-{chain_id}.invalid/"),
    }
}

/// A and B route to each other; C is configured but unrouted.
pub fn registry() -> ChainRegistry {
    ChainRegistry::new(
        vec![
            chain_config(CHAIN_A, TOKEN_A),
            chain_config(CHAIN_B, TOKEN_B),
            chain_config(CHAIN_C, TOKEN_C),
        ],
        [(CHAIN_A, CHAIN_B), (CHAIN_B, CHAIN_A)],
    )
    .expect("test registry")
}

fn token_of(chain_id: u64) -> Address {
    match chain_id {
        CHAIN_A => TOKEN_A,
        CHAIN_B => TOKEN_B,
        _ => TOKEN_C,
    }
}

/// A burn message laid out like the one the relay contract emits: fixed
/// header, then a body naming token, recipient and amount.
pub fn burn_message(source_domain: u32, destination_domain: u32, recipient: Address, amount: U256) -> Bytes {
    let mut m = Vec::new();
    m.extend_from_slice(&1u32.to_be_bytes());
    m.extend_from_slice(&source_domain.to_be_bytes());
    m.extend_from_slice(&destination_domain.to_be_bytes());
    m.extend_from_slice(B256::ZERO.as_slice());
    m.extend_from_slice(BURN_CONTRACT.into_word().as_slice());
    m.extend_from_slice(BURN_CONTRACT.into_word().as_slice());
    m.extend_from_slice(B256::ZERO.as_slice());
    m.extend_from_slice(&1_000u32.to_be_bytes());
    m.extend_from_slice(&0u32.to_be_bytes());
    m.extend_from_slice(&1u32.to_be_bytes());
    m.extend_from_slice(TOKEN_A.into_word().as_slice());
    m.extend_from_slice(recipient.into_word().as_slice());
    m.extend_from_slice(&amount.to_be_bytes::<32>());
    Bytes::from(m)
}

/// The verifier's copy of a burn message: nonce and executed finality filled in.
pub fn attested_copy(message: &Bytes) -> Bytes {
    let mut m = message.to_vec();
    m[12..44].copy_from_slice(B256::repeat_byte(0x07).as_slice());
    m[144..148].copy_from_slice(&1_000u32.to_be_bytes());
    Bytes::from(m)
}

#[derive(Debug, Default)]
pub struct TestClock {
    now: AtomicU64,
    sleeps: Mutex<Vec<u64>>,
}

impl TestClock {
    pub fn sleeps(&self) -> Vec<u64> {
        self.sleeps.lock().expect("sleeps lock").clone()
    }
}

impl ClockPort for TestClock {
    fn now_ms(&self) -> Result<u64, PortError> {
        Ok(self.now.fetch_add(1, Ordering::SeqCst) + 1_760_000_000_000)
    }

    fn sleep_ms(&self, ms: u64) {
        self.sleeps.lock().expect("sleeps lock").push(ms);
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxKind {
    Approve,
    Burn,
    Mint,
    Settle,
    Other,
}

#[derive(Debug, Clone)]
pub struct SentTx {
    pub chain_id: u64,
    pub to: Address,
    pub kind: TxKind,
    pub hash: B256,
}

pub struct ChainState {
    pub accounts: Vec<Address>,
    pub active_chain: u64,
    pub switch_delay_polls: u32,
    pending_switch: Option<(u64, u32)>,
    pub ignore_switch: bool,
    pub native: HashMap<u64, U256>,
    pub token_balance: HashMap<u64, U256>,
    pub allowances: HashMap<(u64, Address), U256>,
    pub sent: Vec<SentTx>,
    pub reads: usize,
    pub receipts: HashMap<B256, TxReceipt>,
    /// Kinds whose receipts are held back until `release_receipts`.
    pub withhold: HashSet<TxKind>,
    withheld: HashMap<B256, TxReceipt>,
    pub scripted_hashes: VecDeque<B256>,
    tx_seq: u64,
    pub last_burn_message: Option<Bytes>,
    pub omit_burn_event: bool,
    pub burn_revert: Option<String>,
    pub mint_revert: Option<String>,
    pub settle_revert: bool,
    pub settle_emits_event: bool,
    pub settle_event_payer: Address,
    pub mint_hook: Option<MintHook>,
}

/// Store update applied when a mint lands, to simulate a target settled
/// elsewhere in the meantime.
pub type MintHook = (FakeStore, String, TargetStatus);

impl Default for ChainState {
    fn default() -> Self {
        Self {
            accounts: vec![OWNER],
            active_chain: CHAIN_A,
            switch_delay_polls: 0,
            pending_switch: None,
            ignore_switch: false,
            native: HashMap::from([(CHAIN_A, one_eth()), (CHAIN_B, one_eth()), (CHAIN_C, one_eth())]),
            token_balance: HashMap::from([(CHAIN_A, ten_units() * U256::from(100u8))]),
            allowances: HashMap::new(),
            sent: Vec::new(),
            reads: 0,
            receipts: HashMap::new(),
            withhold: HashSet::new(),
            withheld: HashMap::new(),
            scripted_hashes: VecDeque::new(),
            tx_seq: 0,
            last_burn_message: None,
            omit_burn_event: false,
            burn_revert: None,
            mint_revert: None,
            settle_revert: false,
            settle_emits_event: true,
            settle_event_payer: OWNER,
            mint_hook: None,
        }
    }
}

/// Wallet and node in one: transactions sent through the provider side
/// produce receipts the reader side serves.
#[derive(Clone, Default)]
pub struct FakeChain {
    inner: Arc<Mutex<ChainState>>,
}

impl FakeChain {
    pub fn with<T>(&self, f: impl FnOnce(&mut ChainState) -> T) -> T {
        let mut g = self.inner.lock().expect("chain lock");
        f(&mut g)
    }

    pub fn sent(&self) -> Vec<SentTx> {
        self.with(|s| s.sent.clone())
    }

    pub fn sent_of(&self, kind: TxKind) -> usize {
        self.with(|s| s.sent.iter().filter(|tx| tx.kind == kind).count())
    }

    pub fn active_chain(&self) -> u64 {
        self.with(|s| s.active_chain)
    }

    pub fn last_burn_message(&self) -> Option<Bytes> {
        self.with(|s| s.last_burn_message.clone())
    }

    pub fn withhold_receipts(&self, kind: TxKind) {
        self.with(|s| {
            s.withhold.insert(kind);
        })
    }

    /// Publish every held-back receipt and stop holding new ones.
    pub fn release_receipts(&self) {
        self.with(|s| {
            s.withhold.clear();
            let withheld = std::mem::take(&mut s.withheld);
            s.receipts.extend(withheld);
        })
    }

    /// Put a reverted burn receipt on chain A.
    pub fn seed_reverted_burn(&self, tx_hash: B256) {
        self.with(|s| {
            s.receipts.insert(
                tx_hash,
                TxReceipt {
                    transaction_hash: tx_hash,
                    success: false,
                    block_number: Some(1),
                    logs: Vec::new(),
                },
            );
        })
    }

    /// Put a confirmed burn receipt on chain A as if it had been sent
    /// earlier by another process.
    pub fn seed_burn(&self, tx_hash: B256, recipient: Address, amount: U256, destination_domain: u32) {
        self.with(|s| {
            let (logs, message) = burn_logs(DOMAIN_A, destination_domain, recipient, amount, U256::from(14_000u64));
            s.last_burn_message = Some(message);
            s.receipts.insert(
                tx_hash,
                TxReceipt {
                    transaction_hash: tx_hash,
                    success: true,
                    block_number: Some(1),
                    logs,
                },
            );
        })
    }
}

fn burn_logs(
    source_domain: u32,
    destination_domain: u32,
    recipient: Address,
    amount: U256,
    max_fee: U256,
) -> (Vec<ReceiptLog>, Bytes) {
    let message = burn_message(source_domain, destination_domain, recipient, amount);
    let burn_event = ITokenMessenger::DepositForBurn {
        burnToken: TOKEN_A,
        amount,
        depositor: OWNER,
        mintRecipient: recipient.into_word(),
        destinationDomain: destination_domain,
        destinationTokenMessenger: BURN_CONTRACT.into_word(),
        destinationCaller: B256::ZERO,
        maxFee: max_fee,
        minFinalityThreshold: 1_000,
        hookData: Bytes::new(),
    }
    .encode_log_data();
    let sent_event = IMessageTransmitter::MessageSent {
        message: message.clone(),
    }
    .encode_log_data();
    let logs = vec![
        ReceiptLog {
            address: RELAY_CONTRACT,
            topics: sent_event.topics().to_vec(),
            data: sent_event.data.clone(),
        },
        ReceiptLog {
            address: BURN_CONTRACT,
            topics: burn_event.topics().to_vec(),
            data: burn_event.data.clone(),
        },
    ];
    (logs, message)
}

pub fn settled_log(target: B256, payer: Address, amount: U256) -> ReceiptLog {
    let event = ISettlement::PaymentSettled {
        targetId: target,
        payer,
        amount,
    }
    .encode_log_data();
    ReceiptLog {
        address: SETTLEMENT_CONTRACT,
        topics: event.topics().to_vec(),
        data: event.data.clone(),
    }
}

impl ChainState {
    fn next_hash(&mut self) -> B256 {
        if let Some(hash) = self.scripted_hashes.pop_front() {
            return hash;
        }
        self.tx_seq += 1;
        B256::left_padding_from(&self.tx_seq.to_be_bytes())
    }

    fn finish(&mut self, kind: TxKind, to: Address, success: bool, logs: Vec<ReceiptLog>) -> B256 {
        let hash = self.next_hash();
        self.sent.push(SentTx {
            chain_id: self.active_chain,
            to,
            kind,
            hash,
        });
        let receipt = TxReceipt {
            transaction_hash: hash,
            success,
            block_number: Some(1),
            logs,
        };
        if self.withhold.contains(&kind) {
            self.withheld.insert(hash, receipt);
        } else {
            self.receipts.insert(hash, receipt);
        }
        hash
    }
}

impl ProviderPort for FakeChain {
    fn request_accounts(&self) -> Result<Vec<Address>, PortError> {
        Ok(self.with(|s| s.accounts.clone()))
    }

    fn chain_id(&self) -> Result<u64, PortError> {
        Ok(self.with(|s| {
            if let Some((target, remaining)) = s.pending_switch {
                if remaining == 0 {
                    s.active_chain = target;
                    s.pending_switch = None;
                } else {
                    s.pending_switch = Some((target, remaining - 1));
                }
            }
            s.active_chain
        }))
    }

    fn switch_chain(&self, chain_id: u64) -> Result<(), PortError> {
        self.with(|s| {
            if s.ignore_switch {
                return;
            }
            if s.switch_delay_polls == 0 {
                s.active_chain = chain_id;
            } else {
                s.pending_switch = Some((chain_id, s.switch_delay_polls));
            }
        });
        Ok(())
    }

    fn send_transaction(&self, tx: &TxRequest) -> Result<B256, PortError> {
        let selector: [u8; 4] = tx
            .data
            .get(..4)
            .and_then(|s| s.try_into().ok())
            .unwrap_or_default();
        let sent = self.with(|s: &mut ChainState| -> Result<(B256, Option<MintHook>), PortError> {
            let chain_id = s.active_chain;
            if selector == IERC20::approveCall::SELECTOR {
                let call = IERC20::approveCall::abi_decode(&tx.data, true)
                    .map_err(|e| PortError::Validation(e.to_string()))?;
                s.allowances.insert((chain_id, call.spender), call.amount);
                return Ok((s.finish(TxKind::Approve, tx.to, true, Vec::new()), None));
            }
            if selector == ITokenMessenger::depositForBurnCall::SELECTOR {
                if let Some(reason) = s.burn_revert.clone() {
                    return Err(PortError::Reverted(reason));
                }
                let call = ITokenMessenger::depositForBurnCall::abi_decode(&tx.data, true)
                    .map_err(|e| PortError::Validation(e.to_string()))?;
                let recipient = Address::from_word(call.mintRecipient);
                let (mut logs, message) = burn_logs(
                    domain_of(chain_id),
                    call.destinationDomain,
                    recipient,
                    call.amount,
                    call.maxFee,
                );
                if s.omit_burn_event {
                    logs.retain(|log| log.address != BURN_CONTRACT);
                }
                s.last_burn_message = Some(message);
                if let Some(balance) = s.token_balance.get_mut(&chain_id) {
                    *balance = balance.saturating_sub(call.amount);
                }
                return Ok((s.finish(TxKind::Burn, tx.to, true, logs), None));
            }
            if selector == IMessageTransmitter::receiveMessageCall::SELECTOR {
                let success = s.mint_revert.is_none();
                let hash = s.finish(TxKind::Mint, tx.to, success, Vec::new());
                return Ok((hash, if success { s.mint_hook.clone() } else { None }));
            }
            if tx.to == SETTLEMENT_CONTRACT {
                let logs = if s.settle_emits_event && !s.settle_revert {
                    vec![settled_log(onchain_target_id(), s.settle_event_payer, ten_units())]
                } else {
                    Vec::new()
                };
                let success = !s.settle_revert;
                return Ok((s.finish(TxKind::Settle, tx.to, success, logs), None));
            }
            Ok((s.finish(TxKind::Other, tx.to, true, Vec::new()), None))
        })?;
        let (hash, hook) = sent;
        if let Some((store, target_id, status)) = hook {
            store.set_status(&target_id, status);
        }
        Ok(hash)
    }
}

impl ChainReadPort for FakeChain {
    fn native_balance(&self, chain_id: u64, _address: Address) -> Result<U256, PortError> {
        Ok(self.with(|s| {
            s.reads += 1;
            s.native.get(&chain_id).copied().unwrap_or_default()
        }))
    }

    fn call(&self, chain_id: u64, tx: &TxRequest) -> Result<Bytes, PortError> {
        self.with(|s: &mut ChainState| -> Result<Bytes, PortError> {
            s.reads += 1;
            let selector = tx.data.get(..4).unwrap_or_default();
            if selector == IERC20::balanceOfCall::SELECTOR {
                let balance = s.token_balance.get(&chain_id).copied().unwrap_or_default();
                return Ok(Bytes::from(balance.abi_encode()));
            }
            if selector == IERC20::allowanceCall::SELECTOR {
                let call = IERC20::allowanceCall::abi_decode(&tx.data, true)
                    .map_err(|e| PortError::Validation(e.to_string()))?;
                let allowance = s
                    .allowances
                    .get(&(chain_id, call.spender))
                    .copied()
                    .unwrap_or_default();
                return Ok(Bytes::from(allowance.abi_encode()));
            }
            if selector == IMessageTransmitter::receiveMessageCall::SELECTOR {
                return match &s.mint_revert {
                    Some(reason) => Err(PortError::Reverted(reason.clone())),
                    None => Ok(Bytes::from(true.abi_encode())),
                };
            }
            Err(PortError::NotFound(format!("no fake handler for call to {}", tx.to)))
        })
    }

    fn transaction_receipt(&self, _chain_id: u64, tx_hash: B256) -> Result<Option<TxReceipt>, PortError> {
        Ok(self.with(|s| s.receipts.get(&tx_hash).cloned()))
    }
}

#[derive(Debug, Clone)]
pub enum VerifierStep {
    NotIndexed,
    Pending,
    Malformed,
    Unreachable,
    Complete,
    CompleteWith(String),
}

#[derive(Default)]
struct VerifierState {
    script: VecDeque<VerifierStep>,
    fallback: Option<VerifierStep>,
    calls: u32,
    quotes: Option<Vec<FeeQuote>>,
    quote_calls: u32,
}

/// Answers from the burn message the fake chain last emitted, following a
/// script of per-call outcomes.
#[derive(Clone)]
pub struct FakeVerifier {
    chain: FakeChain,
    inner: Arc<Mutex<VerifierState>>,
}

impl FakeVerifier {
    pub fn new(chain: FakeChain) -> Self {
        Self {
            chain,
            inner: Arc::new(Mutex::new(VerifierState::default())),
        }
    }

    pub fn script(&self, steps: impl IntoIterator<Item = VerifierStep>) {
        self.inner.lock().expect("verifier lock").script.extend(steps);
    }

    /// Outcome once the script runs out (default: complete).
    pub fn then_always(&self, step: VerifierStep) {
        self.inner.lock().expect("verifier lock").fallback = Some(step);
    }

    pub fn set_quotes(&self, quotes: Option<Vec<FeeQuote>>) {
        self.inner.lock().expect("verifier lock").quotes = quotes;
    }

    pub fn calls(&self) -> u32 {
        self.inner.lock().expect("verifier lock").calls
    }
}

impl VerifierPort for FakeVerifier {
    fn messages(&self, _source_domain: u32, _tx_hash: B256) -> Result<Vec<VerifierMessage>, PortError> {
        let step = {
            let mut g = self.inner.lock().expect("verifier lock");
            g.calls += 1;
            g.script
                .pop_front()
                .or_else(|| g.fallback.clone())
                .unwrap_or(VerifierStep::Complete)
        };
        let Some(message) = self.chain.last_burn_message() else {
            return Ok(Vec::new());
        };
        let attested = alloy::hex::encode_prefixed(attested_copy(&message));
        let entry = |status, attestation: Option<String>, message: String| VerifierMessage {
            message,
            event_nonce: Some("7".to_owned()),
            status,
            attestation,
        };
        match step {
            VerifierStep::NotIndexed => Ok(Vec::new()),
            VerifierStep::Unreachable => Err(PortError::Transport("connection refused".to_owned())),
            VerifierStep::Malformed => Ok(vec![entry(
                VerifierStatus::Complete,
                Some(attestation_hex()),
                "0x".to_owned(),
            )]),
            VerifierStep::Pending => Ok(vec![entry(
                VerifierStatus::PendingConfirmations,
                Some("PENDING".to_owned()),
                attested,
            )]),
            VerifierStep::Complete => Ok(vec![entry(
                VerifierStatus::Complete,
                Some(attestation_hex()),
                attested,
            )]),
            VerifierStep::CompleteWith(raw) => Ok(vec![entry(VerifierStatus::Complete, Some(raw), attested)]),
        }
    }

    fn fee_quotes(&self, _source_domain: u32, _destination_domain: u32) -> Result<Vec<FeeQuote>, PortError> {
        let mut g = self.inner.lock().expect("verifier lock");
        g.quote_calls += 1;
        g.quotes
            .clone()
            .ok_or_else(|| PortError::Transport("fee service unavailable".to_owned()))
    }
}

#[derive(Debug, Clone)]
pub struct StoredTarget {
    pub target: SettlementTarget,
    pub payment: Option<PaymentWriteBack>,
    pub checkpoint: Option<BurnCheckpoint>,
}

#[derive(Default)]
struct StoreState {
    records: HashMap<String, StoredTarget>,
    fail_payment_writes: bool,
    payment_writes: u32,
}

/// Record store with the same conditional update rule a real store applies.
#[derive(Clone, Default)]
pub struct FakeStore {
    inner: Arc<Mutex<StoreState>>,
}

impl std::fmt::Debug for FakeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FakeStore")
    }
}

impl FakeStore {
    pub fn with_pending_target(required_allowance: U256) -> Self {
        let store = Self::default();
        store.inner.lock().expect("store lock").records.insert(
            TARGET_ID.to_owned(),
            StoredTarget {
                target: SettlementTarget {
                    id: TARGET_ID.to_owned(),
                    current_status: TargetStatus::Pending,
                    required_allowance_amount: required_allowance,
                },
                payment: None,
                checkpoint: None,
            },
        );
        store
    }

    pub fn set_status(&self, target_id: &str, status: TargetStatus) {
        if let Some(record) = self.inner.lock().expect("store lock").records.get_mut(target_id) {
            record.target.current_status = status;
        }
    }

    pub fn fail_payment_writes(&self) {
        self.inner.lock().expect("store lock").fail_payment_writes = true;
    }

    pub fn record(&self, target_id: &str) -> Option<StoredTarget> {
        self.inner.lock().expect("store lock").records.get(target_id).cloned()
    }

    pub fn payment_writes(&self) -> u32 {
        self.inner.lock().expect("store lock").payment_writes
    }
}

impl RecordStorePort for FakeStore {
    fn get_target(&self, target_id: &str) -> Result<Option<SettlementTarget>, PortError> {
        Ok(self.record(target_id).map(|r| r.target))
    }

    fn apply_payment(&self, write: &PaymentWriteBack) -> Result<WriteBackOutcome, PortError> {
        let mut g = self.inner.lock().expect("store lock");
        g.payment_writes += 1;
        if g.fail_payment_writes {
            return Err(PortError::Transport("store offline".to_owned()));
        }
        let record = g
            .records
            .get_mut(&write.target_id)
            .ok_or_else(|| PortError::NotFound(write.target_id.clone()))?;
        let existing = record.payment.as_ref().map(|p| p.source);
        if !payment_supersedes(write.source, existing) {
            return Ok(WriteBackOutcome::Skipped {
                existing: existing.unwrap_or(write.source),
            });
        }
        record.payment = Some(write.clone());
        record.target.current_status = TargetStatus::Paid;
        Ok(WriteBackOutcome::Applied { replaced: existing })
    }

    fn save_checkpoint(&self, target_id: &str, checkpoint: &BurnCheckpoint) -> Result<(), PortError> {
        let mut g = self.inner.lock().expect("store lock");
        let record = g
            .records
            .get_mut(target_id)
            .ok_or_else(|| PortError::NotFound(target_id.to_owned()))?;
        record.checkpoint = Some(checkpoint.clone());
        Ok(())
    }
}

pub type TestOrchestrator = Orchestrator<FakeChain, FakeChain, FakeVerifier, FakeStore, TestClock>;

pub struct Harness {
    pub orch: TestOrchestrator,
    pub chain: FakeChain,
    pub verifier: FakeVerifier,
    pub store: FakeStore,
}

pub fn harness() -> Harness {
    harness_with(FakeStore::default(), TransferPolicy::default())
}

pub fn harness_with(store: FakeStore, policy: TransferPolicy) -> Harness {
    let chain = FakeChain::default();
    let verifier = FakeVerifier::new(chain.clone());
    let orch = Orchestrator::new(
        registry(),
        policy,
        chain.clone(),
        chain.clone(),
        verifier.clone(),
        store.clone(),
        TestClock::default(),
    );
    Harness {
        orch,
        chain,
        verifier,
        store,
    }
}

pub fn transfer_request() -> TransferRequest {
    TransferRequest {
        source_chain_id: CHAIN_A,
        destination_chain_id: CHAIN_B,
        amount: ten_units(),
        recipient: Some(RECIPIENT),
        settlement: None,
    }
}

pub fn settlement_request() -> SettlementRequest {
    SettlementRequest {
        target_id: TARGET_ID.to_owned(),
        onchain_id: onchain_target_id(),
        contract: SETTLEMENT_CONTRACT,
        calldata: Bytes::from(vec![0x12, 0x34, 0x56, 0x78]),
        payer_hint: None,
    }
}

pub fn settlement_transfer_request() -> TransferRequest {
    TransferRequest {
        recipient: Some(OWNER),
        settlement: Some(settlement_request()),
        ..transfer_request()
    }
}

/// Store holding one pending target that needs a full-amount allowance.
pub fn seed_store() -> FakeStore {
    FakeStore::with_pending_target(ten_units())
}
