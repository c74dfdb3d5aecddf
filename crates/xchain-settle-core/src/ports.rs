use std::sync::Arc;

use alloy::primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{
    BurnCheckpoint, PaymentWriteBack, SettlementTarget, TxReceipt, TxRequest, WriteBackOutcome,
};

#[derive(Debug, Error)]
pub enum PortError {
    #[error("port not implemented: {0}")]
    NotImplemented(&'static str),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("policy violation: {0}")]
    Policy(String),
    #[error("execution reverted: {0}")]
    Reverted(String),
}

/// The wallet: owns the active execution context and signs transactions.
pub trait ProviderPort {
    fn request_accounts(&self) -> Result<Vec<Address>, PortError>;
    fn chain_id(&self) -> Result<u64, PortError>;
    /// Ask the wallet to change its active chain. Completion is observed
    /// through `chain_id`, not through this call returning.
    fn switch_chain(&self, chain_id: u64) -> Result<(), PortError>;
    fn send_transaction(&self, tx: &TxRequest) -> Result<B256, PortError>;
}

/// Read-only node access, addressed by chain id.
pub trait ChainReadPort {
    fn native_balance(&self, chain_id: u64, address: Address) -> Result<U256, PortError>;
    fn call(&self, chain_id: u64, tx: &TxRequest) -> Result<Bytes, PortError>;
    fn transaction_receipt(
        &self,
        chain_id: u64,
        tx_hash: B256,
    ) -> Result<Option<TxReceipt>, PortError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifierStatus {
    Complete,
    PendingConfirmations,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifierMessage {
    #[serde(default)]
    pub message: String,
    #[serde(default, alias = "nonce")]
    pub event_nonce: Option<String>,
    pub status: VerifierStatus,
    #[serde(default)]
    pub attestation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeQuote {
    pub finality_threshold: u32,
    /// Basis points; the service may return fractional values.
    pub minimum_fee: f64,
}

pub trait VerifierPort {
    /// Messages emitted by `tx_hash`. An empty list means the service has
    /// not indexed the transaction yet.
    fn messages(&self, source_domain: u32, tx_hash: B256) -> Result<Vec<VerifierMessage>, PortError>;
    fn fee_quotes(
        &self,
        source_domain: u32,
        destination_domain: u32,
    ) -> Result<Vec<FeeQuote>, PortError>;
}

pub trait RecordStorePort {
    fn get_target(&self, target_id: &str) -> Result<Option<SettlementTarget>, PortError>;
    /// Conditionally record a payment in one step: applied when no payer is
    /// recorded yet or the incoming source ranks at least as high.
    fn apply_payment(&self, write: &PaymentWriteBack) -> Result<WriteBackOutcome, PortError>;
    fn save_checkpoint(&self, target_id: &str, checkpoint: &BurnCheckpoint) -> Result<(), PortError>;
}

pub trait ClockPort {
    fn now_ms(&self) -> Result<u64, PortError>;
    fn sleep_ms(&self, ms: u64);
}

impl<T: RecordStorePort + ?Sized> RecordStorePort for Arc<T> {
    fn get_target(&self, target_id: &str) -> Result<Option<SettlementTarget>, PortError> {
        (**self).get_target(target_id)
    }

    fn apply_payment(&self, write: &PaymentWriteBack) -> Result<WriteBackOutcome, PortError> {
        (**self).apply_payment(write)
    }

    fn save_checkpoint(&self, target_id: &str, checkpoint: &BurnCheckpoint) -> Result<(), PortError> {
        (**self).save_checkpoint(target_id, checkpoint)
    }
}

impl<T: ClockPort + ?Sized> ClockPort for Arc<T> {
    fn now_ms(&self) -> Result<u64, PortError> {
        (**self).now_ms()
    }

    fn sleep_ms(&self, ms: u64) {
        (**self).sleep_ms(ms)
    }
}
