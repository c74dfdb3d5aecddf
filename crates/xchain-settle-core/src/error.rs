use alloy::primitives::{B256, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::TargetStatus;
use crate::fees::FeeSource;
use crate::state_machine::{TransferAction, TransferState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MintRevertReason {
    AlreadyExecuted,
    InvalidAttestation,
    InvalidMessage,
    Paused,
    Unknown { detail: String },
}

impl MintRevertReason {
    /// Classify a relay revert string.
    pub fn classify(reason: &str) -> Self {
        let lower = reason.to_ascii_lowercase();
        if lower.contains("nonce already used") || lower.contains("already received") {
            MintRevertReason::AlreadyExecuted
        } else if lower.contains("paused") {
            MintRevertReason::Paused
        } else if lower.contains("attestation") || lower.contains("signature") {
            MintRevertReason::InvalidAttestation
        } else if lower.contains("message")
            || lower.contains("domain")
            || lower.contains("caller")
        {
            MintRevertReason::InvalidMessage
        } else {
            MintRevertReason::Unknown {
                detail: reason.to_owned(),
            }
        }
    }
}

impl std::fmt::Display for MintRevertReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MintRevertReason::AlreadyExecuted => f.write_str("message already executed"),
            MintRevertReason::InvalidAttestation => f.write_str("invalid attestation"),
            MintRevertReason::InvalidMessage => f.write_str("invalid message"),
            MintRevertReason::Paused => f.write_str("relay contract paused"),
            MintRevertReason::Unknown { detail } => write!(f, "unknown ({detail})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ChainNotFound,
    UnsupportedRoute,
    InvalidRequest,
    InsufficientGas,
    InsufficientTokenBalance,
    ApprovalFailed,
    BurnReverted,
    BurnEventNotFound,
    AttestationTimeout,
    AttestationInvalid,
    ChainSwitchTimeout,
    ChainContextMismatch,
    ReceiptTimeout,
    MintReverted,
    SettlementPreconditionFailed,
    SettlementReverted,
    StoreWriteFailed,
    Transport,
    IllegalTransition,
    NothingToResume,
    MustResume,
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransferError {
    #[error("no chain configuration for chain id {chain_id}")]
    ChainNotFound { chain_id: u64 },
    #[error("route {source_chain_id} -> {destination_chain_id} is not supported")]
    UnsupportedRoute {
        source_chain_id: u64,
        destination_chain_id: u64,
    },
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },
    #[error("insufficient native balance on chain {chain_id}: have {balance}, need at least {required}")]
    InsufficientGas {
        chain_id: u64,
        balance: U256,
        required: U256,
    },
    #[error("insufficient token balance on chain {chain_id}: have {balance}, need {required}")]
    InsufficientTokenBalance {
        chain_id: u64,
        balance: U256,
        required: U256,
    },
    #[error("token approval failed on chain {chain_id} (tx {tx_hash:?}): {reason}")]
    ApprovalFailed {
        chain_id: u64,
        tx_hash: Option<B256>,
        reason: String,
    },
    #[error("burn reverted (tx {tx_hash:?}): {reason}{}", fee_note(.fee_source))]
    BurnReverted {
        tx_hash: Option<B256>,
        /// Unknown when the burn was sent outside this session.
        fee_source: Option<FeeSource>,
        reason: String,
    },
    #[error("burn receipt {tx_hash} succeeded but carries no decodable burn event")]
    BurnEventNotFound { tx_hash: B256 },
    #[error("attestation not available after {attempts} attempts; recover with burn tx {tx_hash}")]
    AttestationTimeout { tx_hash: B256, attempts: u32 },
    #[error("attestation value rejected: {value:?}")]
    AttestationInvalid { value: String },
    #[error("wallet is on chain {current}, switch to chain {required} was not confirmed in time")]
    ChainSwitchTimeout { current: u64, required: u64 },
    #[error("wallet is on chain {current} but chain {required} is required; switch networks and retry")]
    ChainContextMismatch { current: u64, required: u64 },
    #[error("no receipt for tx {tx_hash} on chain {chain_id} within the polling window")]
    ReceiptTimeout { chain_id: u64, tx_hash: B256 },
    #[error("mint reverted (tx {tx_hash:?}): {reason}")]
    MintReverted {
        tx_hash: Option<B256>,
        reason: MintRevertReason,
    },
    #[error("settlement target {target_id} is {observed_status}, expected pending")]
    SettlementPreconditionFailed {
        target_id: String,
        observed_status: TargetStatus,
    },
    #[error("settlement reverted (tx {tx_hash:?}): {reason}")]
    SettlementReverted {
        tx_hash: Option<B256>,
        reason: String,
    },
    #[error("record store write for {target_id} failed: {reason}")]
    StoreWriteFailed { target_id: String, reason: String },
    #[error("{step} failed: {message}")]
    Transport { step: String, message: String },
    #[error("illegal transfer transition: {from:?} --{action:?}-->")]
    IllegalTransition {
        from: TransferState,
        action: TransferAction,
    },
    #[error("session has no burn checkpoint to resume from")]
    NothingToResume,
    #[error("burn {burn_tx_hash} was submitted; session must be resumed, not reset")]
    MustResume { burn_tx_hash: B256 },
}

fn fee_note(fee_source: &Option<FeeSource>) -> String {
    fee_source
        .map(|source| format!("; max fee source: {source}"))
        .unwrap_or_default()
}

impl TransferError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransferError::ChainNotFound { .. } => ErrorKind::ChainNotFound,
            TransferError::UnsupportedRoute { .. } => ErrorKind::UnsupportedRoute,
            TransferError::InvalidRequest { .. } => ErrorKind::InvalidRequest,
            TransferError::InsufficientGas { .. } => ErrorKind::InsufficientGas,
            TransferError::InsufficientTokenBalance { .. } => ErrorKind::InsufficientTokenBalance,
            TransferError::ApprovalFailed { .. } => ErrorKind::ApprovalFailed,
            TransferError::BurnReverted { .. } => ErrorKind::BurnReverted,
            TransferError::BurnEventNotFound { .. } => ErrorKind::BurnEventNotFound,
            TransferError::AttestationTimeout { .. } => ErrorKind::AttestationTimeout,
            TransferError::AttestationInvalid { .. } => ErrorKind::AttestationInvalid,
            TransferError::ChainSwitchTimeout { .. } => ErrorKind::ChainSwitchTimeout,
            TransferError::ChainContextMismatch { .. } => ErrorKind::ChainContextMismatch,
            TransferError::ReceiptTimeout { .. } => ErrorKind::ReceiptTimeout,
            TransferError::MintReverted { .. } => ErrorKind::MintReverted,
            TransferError::SettlementPreconditionFailed { .. } => {
                ErrorKind::SettlementPreconditionFailed
            }
            TransferError::SettlementReverted { .. } => ErrorKind::SettlementReverted,
            TransferError::StoreWriteFailed { .. } => ErrorKind::StoreWriteFailed,
            TransferError::Transport { .. } => ErrorKind::Transport,
            TransferError::IllegalTransition { .. } => ErrorKind::IllegalTransition,
            TransferError::NothingToResume => ErrorKind::NothingToResume,
            TransferError::MustResume { .. } => ErrorKind::MustResume,
        }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        TransferError::InvalidRequest {
            reason: reason.into(),
        }
    }

    pub(crate) fn transport(step: &str, err: impl std::fmt::Display) -> Self {
        TransferError::Transport {
            step: step.to_owned(),
            message: err.to_string(),
        }
    }
}
