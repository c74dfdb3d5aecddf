use alloy::primitives::{Address, B256, U256};
use alloy::sol_types::SolEvent;
use tracing::{debug, info};

use crate::contracts::ISettlement;
use crate::domain::{
    BurnCheckpoint, PayerSource, PaymentWriteBack, ReceiptLog, SettlementRequest,
    SettlementTarget, TargetStatus, TimestampMs, TxReceipt, WriteBackOutcome,
};
use crate::error::TransferError;
use crate::ports::{ClockPort, PortError, RecordStorePort};

/// Reads settlement targets and records payments. Both the direct
/// post-receipt path and an event listener write through `apply_payment`.
pub struct SettlementBridge<S, C> {
    store: S,
    clock: C,
}

impl<S, C> SettlementBridge<S, C>
where
    S: RecordStorePort,
    C: ClockPort,
{
    pub fn new(store: S, clock: C) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn load_target(&self, target_id: &str) -> Result<SettlementTarget, TransferError> {
        self.store
            .get_target(target_id)
            .map_err(|err| TransferError::transport("load_target", err))?
            .ok_or_else(|| TransferError::invalid(format!("settlement target {target_id} not found")))
    }

    pub fn ensure_pending(&self, target_id: &str) -> Result<SettlementTarget, TransferError> {
        let target = self.load_target(target_id)?;
        if target.current_status != TargetStatus::Pending {
            return Err(TransferError::SettlementPreconditionFailed {
                target_id: target_id.to_owned(),
                observed_status: target.current_status,
            });
        }
        Ok(target)
    }

    pub fn persist_checkpoint(
        &self,
        target_id: &str,
        checkpoint: &BurnCheckpoint,
    ) -> Result<(), TransferError> {
        self.store
            .save_checkpoint(target_id, checkpoint)
            .map_err(|err| TransferError::StoreWriteFailed {
                target_id: target_id.to_owned(),
                reason: err.to_string(),
            })
    }

    /// Record the payment confirmed by our own settlement receipt. The payer
    /// comes from the receipt's settlement event when it decodes, else from
    /// the caller.
    pub fn record_settlement(
        &self,
        request: &SettlementRequest,
        receipt: &TxReceipt,
        fallback_payer: Address,
    ) -> Result<WriteBackOutcome, TransferError> {
        let decoded = receipt
            .logs
            .iter()
            .find_map(|log| decode_settled(request, log));
        let (payer, amount, source) = match decoded {
            Some((payer, amount)) => (payer, Some(amount), PayerSource::ReceiptDecoded),
            None => (
                request.payer_hint.unwrap_or(fallback_payer),
                None,
                PayerSource::CallerSupplied,
            ),
        };
        let write = PaymentWriteBack {
            target_id: request.target_id.clone(),
            payer,
            source,
            tx_hash: receipt.transaction_hash,
            amount,
            observed_at_ms: self.now()?,
        };
        self.apply_observed_payment(&write)
    }

    /// Listener entry point: decode a settlement event and record it with
    /// event precedence. Logs for other contracts or targets are ignored.
    pub fn observe_settlement_log(
        &self,
        request: &SettlementRequest,
        log: &ReceiptLog,
        tx_hash: B256,
    ) -> Result<Option<WriteBackOutcome>, TransferError> {
        let Some((payer, amount)) = decode_settled(request, log) else {
            return Ok(None);
        };
        let write = PaymentWriteBack {
            target_id: request.target_id.clone(),
            payer,
            source: PayerSource::EventObserved,
            tx_hash,
            amount: Some(amount),
            observed_at_ms: self.now()?,
        };
        self.apply_observed_payment(&write).map(Some)
    }

    pub fn apply_observed_payment(
        &self,
        write: &PaymentWriteBack,
    ) -> Result<WriteBackOutcome, TransferError> {
        match self.store.apply_payment(write) {
            Ok(outcome) => {
                info!(target_id = %write.target_id, payer = %write.payer, source = ?write.source, ?outcome, "payment write-back");
                Ok(outcome)
            }
            Err(PortError::Conflict(detail)) => {
                debug!(target_id = %write.target_id, %detail, "concurrent write-back already landed");
                Ok(WriteBackOutcome::Contended)
            }
            Err(err) => Err(TransferError::StoreWriteFailed {
                target_id: write.target_id.clone(),
                reason: err.to_string(),
            }),
        }
    }

    fn now(&self) -> Result<TimestampMs, TransferError> {
        self.clock
            .now_ms()
            .map(TimestampMs)
            .map_err(|err| TransferError::transport("clock", err))
    }
}

fn decode_settled(request: &SettlementRequest, log: &ReceiptLog) -> Option<(Address, U256)> {
    if log.address != request.contract {
        return None;
    }
    let event =
        ISettlement::PaymentSettled::decode_raw_log(log.topics.iter().copied(), &log.data, true)
            .ok()?;
    (event.targetId == request.onchain_id).then_some((event.payer, event.amount))
}
