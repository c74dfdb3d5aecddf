use alloy::primitives::{keccak256, Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

use crate::error::TransferError;
use crate::fees::FeeEstimate;
use crate::state_machine::{StateTransition, TransferState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimestampMs(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Static per-chain configuration, loaded once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainConfig {
    pub chain_id: u64,
    pub name: String,
    pub verifier_domain_id: u32,
    pub token_address: Address,
    pub burn_contract_address: Address,
    pub relay_contract_address: Address,
    pub node_endpoint: String,
    pub explorer_url: String,
}

impl ChainConfig {
    pub fn tx_url(&self, tx_hash: B256) -> String {
        format!("{}/tx/{tx_hash}", self.explorer_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxRequest {
    pub from: Option<Address>,
    pub to: Address,
    pub data: Bytes,
    pub value: Option<U256>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub transaction_hash: B256,
    pub success: bool,
    pub block_number: Option<u64>,
    pub logs: Vec<ReceiptLog>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutcome {
    pub tx_hash: B256,
    pub receipt: TxReceipt,
}

/// The minimal state captured right after a confirmed burn. Holding it is
/// enough to finish the transfer without touching the source chain again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BurnCheckpoint {
    pub burn_tx_hash: B256,
    pub message_bytes: Bytes,
    pub message_hash: B256,
}

impl BurnCheckpoint {
    pub fn from_message(burn_tx_hash: B256, message_bytes: Bytes) -> Self {
        let message_hash = keccak256(&message_bytes);
        Self {
            burn_tx_hash,
            message_bytes,
            message_hash,
        }
    }
}

const MIN_ATTESTATION_HEX_LEN: usize = 130;

/// A verifier-signed attestation. Only constructible from a value that is
/// `0x`-prefixed hex covering at least one 65-byte signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Attestation(Bytes);

impl Attestation {
    pub fn parse(raw: &str) -> Result<Self, TransferError> {
        let trimmed = raw.trim();
        let invalid = || TransferError::AttestationInvalid {
            value: truncate(trimmed, 24),
        };
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("pending") {
            return Err(invalid());
        }
        let Some(hex_part) = trimmed.strip_prefix("0x") else {
            return Err(invalid());
        };
        if hex_part.len() < MIN_ATTESTATION_HEX_LEN || hex_part.len() % 2 != 0 {
            return Err(invalid());
        }
        let bytes = alloy::hex::decode(hex_part).map_err(|_| invalid())?;
        Ok(Self(Bytes::from(bytes)))
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.0
    }
}

impl TryFrom<String> for Attestation {
    type Error = TransferError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Attestation> for String {
    fn from(value: Attestation) -> Self {
        alloy::hex::encode_prefixed(&value.0)
    }
}

fn truncate(raw: &str, max: usize) -> String {
    if raw.chars().count() <= max {
        raw.to_owned()
    } else {
        format!("{}...", raw.chars().take(max).collect::<String>())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    Pending,
    Paid,
    Expired,
    Cancelled,
}

impl std::fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            TargetStatus::Pending => "pending",
            TargetStatus::Paid => "paid",
            TargetStatus::Expired => "expired",
            TargetStatus::Cancelled => "cancelled",
        })
    }
}

/// An invoice or subscription charge held by the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementTarget {
    pub id: String,
    pub current_status: TargetStatus,
    pub required_allowance_amount: U256,
}

/// What the caller wants settled once funds land on the destination chain.
/// `calldata` is opaque to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementRequest {
    pub target_id: String,
    pub onchain_id: B256,
    pub contract: Address,
    pub calldata: Bytes,
    pub payer_hint: Option<Address>,
}

/// Where a recorded payer identity came from. Ordered weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayerSource {
    CallerSupplied,
    ReceiptDecoded,
    EventObserved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentWriteBack {
    pub target_id: String,
    pub payer: Address,
    pub source: PayerSource,
    pub tx_hash: B256,
    pub amount: Option<U256>,
    pub observed_at_ms: TimestampMs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WriteBackOutcome {
    Applied { replaced: Option<PayerSource> },
    Skipped { existing: PayerSource },
    /// Another writer updated the record first; what it wrote is unknown.
    Contended,
}

/// Decide whether an incoming payer identity may overwrite the recorded one.
pub fn payment_supersedes(incoming: PayerSource, existing: Option<PayerSource>) -> bool {
    existing.map_or(true, |existing| incoming >= existing)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub source_chain_id: u64,
    pub destination_chain_id: u64,
    pub amount: U256,
    pub recipient: Option<Address>,
    pub settlement: Option<SettlementRequest>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelSafety {
    Safe,
    MustResume { burn_tx_hash: B256 },
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferSession {
    pub id: SessionId,
    pub source_chain_id: u64,
    pub destination_chain_id: u64,
    pub amount: U256,
    pub recipient: Address,
    pub settlement: Option<SettlementRequest>,
    pub state: TransferState,
    checkpoint: Option<BurnCheckpoint>,
    pub nonce: Option<String>,
    pub attested_message: Option<Bytes>,
    pub attestation: Option<Attestation>,
    pub max_fee: Option<FeeEstimate>,
    pub approval_tx_hash: Option<B256>,
    /// Sent but not yet confirmed. Cleared once the receipt settles it.
    #[serde(default)]
    pub pending_burn_tx_hash: Option<B256>,
    #[serde(default)]
    pub pending_mint_tx_hash: Option<B256>,
    #[serde(default)]
    pub pending_settlement_tx_hash: Option<B256>,
    pub mint_tx_hash: Option<B256>,
    /// The relay reported the message as already received, by us or by
    /// another relayer.
    #[serde(default)]
    pub mint_already_executed: bool,
    pub destination_approval_tx_hash: Option<B256>,
    pub settlement_tx_hash: Option<B256>,
    pub write_back: Option<WriteBackOutcome>,
    pub write_back_error: Option<TransferError>,
    pub last_error: Option<TransferError>,
    pub transitions: Vec<StateTransition>,
    pub created_at_ms: TimestampMs,
    pub updated_at_ms: TimestampMs,
}

impl TransferSession {
    pub fn new(id: SessionId, request: TransferRequest, recipient: Address, now: TimestampMs) -> Self {
        Self {
            id,
            source_chain_id: request.source_chain_id,
            destination_chain_id: request.destination_chain_id,
            amount: request.amount,
            recipient,
            settlement: request.settlement,
            state: TransferState::Idle,
            checkpoint: None,
            nonce: None,
            attested_message: None,
            attestation: None,
            max_fee: None,
            approval_tx_hash: None,
            pending_burn_tx_hash: None,
            pending_mint_tx_hash: None,
            pending_settlement_tx_hash: None,
            mint_tx_hash: None,
            mint_already_executed: false,
            destination_approval_tx_hash: None,
            settlement_tx_hash: None,
            write_back: None,
            write_back_error: None,
            last_error: None,
            transitions: Vec::new(),
            created_at_ms: now,
            updated_at_ms: now,
        }
    }

    pub fn checkpoint(&self) -> Option<&BurnCheckpoint> {
        self.checkpoint.as_ref()
    }

    /// The checkpoint is write-once; a second, different checkpoint is refused.
    pub(crate) fn record_checkpoint(&mut self, checkpoint: BurnCheckpoint) -> Result<(), TransferError> {
        match &self.checkpoint {
            Some(existing) if *existing == checkpoint => Ok(()),
            Some(existing) => Err(TransferError::invalid(format!(
                "session already holds checkpoint for burn {}",
                existing.burn_tx_hash
            ))),
            None => {
                self.checkpoint = Some(checkpoint);
                self.pending_burn_tx_hash = None;
                Ok(())
            }
        }
    }

    /// Funds have reached the destination chain.
    pub fn is_minted(&self) -> bool {
        self.mint_tx_hash.is_some() || self.mint_already_executed
    }

    /// Message bytes to relay on the destination chain: the verifier's copy
    /// when known (it carries the assigned nonce), else the burn receipt's.
    pub fn relay_message(&self) -> Option<&Bytes> {
        self.attested_message
            .as_ref()
            .or_else(|| self.checkpoint.as_ref().map(|c| &c.message_bytes))
    }

    pub fn cancel_safety(&self) -> CancelSafety {
        if self.state == TransferState::Success {
            return CancelSafety::Completed;
        }
        if self.is_minted() {
            return CancelSafety::Safe;
        }
        let burn_tx_hash = self
            .checkpoint
            .as_ref()
            .map(|checkpoint| checkpoint.burn_tx_hash)
            .or(self.pending_burn_tx_hash);
        match burn_tx_hash {
            Some(burn_tx_hash) => CancelSafety::MustResume { burn_tx_hash },
            None => CancelSafety::Safe,
        }
    }

    pub(crate) fn clear(&mut self, now: TimestampMs) {
        self.state = TransferState::Idle;
        self.checkpoint = None;
        self.nonce = None;
        self.attested_message = None;
        self.attestation = None;
        self.max_fee = None;
        self.approval_tx_hash = None;
        self.pending_burn_tx_hash = None;
        self.pending_mint_tx_hash = None;
        self.pending_settlement_tx_hash = None;
        self.mint_tx_hash = None;
        self.mint_already_executed = false;
        self.destination_approval_tx_hash = None;
        self.settlement_tx_hash = None;
        self.write_back = None;
        self.write_back_error = None;
        self.last_error = None;
        self.transitions.clear();
        self.updated_at_ms = now;
    }
}
