use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use alloy::primitives::{Address, B256};
use tracing::{info, warn};

use crate::attestation::{AttestationClient, AttestedMessage};
use crate::contracts::MessageHeader;
use crate::domain::{
    BurnCheckpoint, CancelSafety, ChainConfig, SessionId, SettlementRequest, TimestampMs,
    TransferRequest, TransferSession,
};
use crate::error::{ErrorKind, MintRevertReason, TransferError};
use crate::fees::{estimate_max_fee, FeeEstimate};
use crate::gateway::{BurnOutcome, BurnParams, ChainGateway};
use crate::policy::TransferPolicy;
use crate::ports::{ChainReadPort, ClockPort, ProviderPort, RecordStorePort, VerifierPort};
use crate::registry::ChainRegistry;
use crate::settlement::SettlementBridge;
use crate::state_machine::{
    action_reason, transfer_transition, StateTransition, TransferAction, TransferState,
};

/// Drives one transfer session at a time through approval, burn,
/// attestation, mint and the optional settlement.
pub struct Orchestrator<P, R, V, S, C>
where
    P: ProviderPort,
    R: ChainReadPort,
    V: VerifierPort,
    S: RecordStorePort,
    C: ClockPort,
{
    pub registry: ChainRegistry,
    pub policy: TransferPolicy,
    pub gateway: ChainGateway<P, R, Arc<C>>,
    pub attestation: AttestationClient<V, Arc<C>>,
    pub settlement: SettlementBridge<S, Arc<C>>,
    pub clock: Arc<C>,
    session_seq: AtomicU64,
}

impl<P, R, V, S, C> Orchestrator<P, R, V, S, C>
where
    P: ProviderPort,
    R: ChainReadPort,
    V: VerifierPort,
    S: RecordStorePort,
    C: ClockPort,
{
    pub fn new(
        registry: ChainRegistry,
        policy: TransferPolicy,
        provider: P,
        reader: R,
        verifier: V,
        store: S,
        clock: C,
    ) -> Self {
        let clock = Arc::new(clock);
        Self {
            registry,
            policy,
            gateway: ChainGateway::new(provider, reader, Arc::clone(&clock), policy),
            attestation: AttestationClient::new(verifier, Arc::clone(&clock), policy.attestation),
            settlement: SettlementBridge::new(store, Arc::clone(&clock)),
            clock,
            session_seq: AtomicU64::new(0),
        }
    }

    /// Validate a request and create an idle session for it. No chain or
    /// wallet state is touched beyond reading the active account.
    pub fn open(&self, request: TransferRequest) -> Result<TransferSession, TransferError> {
        self.registry
            .route(request.source_chain_id, request.destination_chain_id)?;
        if request.amount.is_zero() {
            return Err(TransferError::invalid("amount must be greater than zero"));
        }
        if let Some(settlement) = &request.settlement {
            if settlement.target_id.trim().is_empty() {
                return Err(TransferError::invalid("settlement target id is empty"));
            }
        }
        let recipient = match request.recipient {
            Some(recipient) => recipient,
            None => self.gateway.active_account()?,
        };
        if recipient == Address::ZERO {
            return Err(TransferError::invalid("recipient is the zero address"));
        }
        let now = self.now()?;
        let seq = self.session_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let id = SessionId(format!("xfer-{}-{seq}", now.0));
        info!(session = %id, source = request.source_chain_id, destination = request.destination_chain_id, amount = %request.amount, "transfer session opened");
        Ok(TransferSession::new(id, request, recipient, now))
    }

    /// Run a fresh session from `idle` as far as it goes. Any step failure
    /// leaves the session in `error` with `last_error` set.
    pub fn start(&self, session: &mut TransferSession) -> Result<(), TransferError> {
        if session.state != TransferState::Idle || has_burn(session) {
            return Err(TransferError::IllegalTransition {
                from: session.state,
                action: TransferAction::Begin,
            });
        }
        let result = self.run_from_idle(session);
        self.conclude(session, result)
    }

    /// Continue an errored session from its burn checkpoint, or from a burn
    /// that was sent but never confirmed. Approval and burn are never
    /// repeated; a mint or settlement already sent is confirmed, not resent.
    pub fn resume(&self, session: &mut TransferSession) -> Result<(), TransferError> {
        if session.state != TransferState::Error {
            return Err(TransferError::IllegalTransition {
                from: session.state,
                action: TransferAction::Resume,
            });
        }
        if !has_burn(session) {
            return Err(TransferError::NothingToResume);
        }
        let result = self.run_resume(session);
        self.conclude(session, result)
    }

    /// Rebuild a session's checkpoint from the receipt of a burn that was
    /// already confirmed, then carry on from attestation retrieval.
    pub fn recover_from_burn(
        &self,
        session: &mut TransferSession,
        burn_tx_hash: B256,
    ) -> Result<(), TransferError> {
        if session.state != TransferState::Idle || has_burn(session) {
            return Err(TransferError::IllegalTransition {
                from: session.state,
                action: TransferAction::Recover,
            });
        }
        let result = self.run_recovery(session, burn_tx_hash);
        self.conclude(session, result)
    }

    /// Return a session to `idle`. Refused while burned funds are waiting to
    /// be minted.
    pub fn reset(&self, session: &mut TransferSession) -> Result<(), TransferError> {
        if let CancelSafety::MustResume { burn_tx_hash } = session.cancel_safety() {
            warn!(session = %session.id, %burn_tx_hash, "reset refused after burn");
            return Err(TransferError::MustResume { burn_tx_hash });
        }
        transfer_transition(session.state, TransferAction::Reset)?;
        let now = self.now()?;
        session.clear(now);
        info!(session = %session.id, "transfer session reset");
        Ok(())
    }

    fn run_from_idle(&self, session: &mut TransferSession) -> Result<(), TransferError> {
        let (source, destination) = self
            .registry
            .route(session.source_chain_id, session.destination_chain_id)?;
        let owner = self.gateway.active_account()?;

        self.gateway.ensure_gas(source.chain_id, owner)?;
        self.gateway.ensure_gas(destination.chain_id, owner)?;
        let balance = self.gateway.token_balance(source, owner)?;
        if balance < session.amount {
            return Err(TransferError::InsufficientTokenBalance {
                chain_id: source.chain_id,
                balance,
                required: session.amount,
            });
        }
        if let Some(settlement) = &session.settlement {
            self.settlement.ensure_pending(&settlement.target_id)?;
        }

        let quotes = match self
            .attestation
            .fee_quotes(source.verifier_domain_id, destination.verifier_domain_id)
        {
            Ok(quotes) => quotes,
            Err(err) => {
                warn!(session = %session.id, error = %err, "fee quote unavailable, using fallback estimate");
                Vec::new()
            }
        };
        let fee = estimate_max_fee(session.amount, &quotes, &self.policy.fees)?;
        info!(session = %session.id, max_fee = %fee.max_fee, source = %fee.source, "max fee estimated");
        session.max_fee = Some(fee);

        self.advance(session, TransferAction::Begin)?;
        self.gateway.switch_to(source.chain_id)?;
        let allowance =
            self.gateway
                .token_allowance(source, owner, source.burn_contract_address)?;
        if allowance < session.amount {
            let approval = self
                .gateway
                .approve_max(source, owner, source.burn_contract_address)?;
            session.approval_tx_hash = Some(approval.tx_hash);
        }

        self.advance(session, TransferAction::SubmitBurn)?;
        let params = BurnParams {
            owner,
            amount: session.amount,
            destination_domain: destination.verifier_domain_id,
            mint_recipient: session.recipient,
        };
        let burn_tx_hash = self.gateway.submit_burn(source, &params, &fee)?;
        session.pending_burn_tx_hash = Some(burn_tx_hash);
        let burn = self.confirm_submitted_burn(session, source, burn_tx_hash, Some(&fee))?;
        self.capture_checkpoint(session, burn.checkpoint)?;
        info!(session = %session.id, tx_hash = %burn.tx_hash, url = %source.tx_url(burn.tx_hash), "burn confirmed");

        let fast = session
            .checkpoint()
            .and_then(|checkpoint| self.attestation.try_once(checkpoint, source.verifier_domain_id));
        match fast {
            Some(attested) => {
                apply_attested(session, attested);
                self.advance(session, TransferAction::AttestationFastPath)?;
            }
            None => {
                self.advance(session, TransferAction::BurnConfirmed)?;
                self.await_attestation(session, source)?;
            }
        }
        self.mint_and_settle(session, destination, owner)
    }

    fn run_resume(&self, session: &mut TransferSession) -> Result<(), TransferError> {
        let (source, destination) = self
            .registry
            .route(session.source_chain_id, session.destination_chain_id)?;
        let owner = self.gateway.active_account()?;

        if session.is_minted() {
            let Some(settlement) = session.settlement.clone() else {
                return Err(TransferError::NothingToResume);
            };
            self.advance(session, TransferAction::ResumeSettlement)?;
            self.gateway.switch_to(destination.chain_id)?;
            return self.approve_and_settle(session, destination, owner, &settlement);
        }

        if let (None, Some(burn_tx_hash)) = (session.checkpoint(), session.pending_burn_tx_hash) {
            let fee = session.max_fee;
            let burn = self.confirm_submitted_burn(session, source, burn_tx_hash, fee.as_ref())?;
            self.capture_checkpoint(session, burn.checkpoint)?;
            info!(session = %session.id, tx_hash = %burn_tx_hash, "pending burn confirmed on resume");
        }
        self.gateway.ensure_gas(destination.chain_id, owner)?;
        self.advance(session, TransferAction::Resume)?;
        self.await_attestation(session, source)?;
        self.mint_and_settle(session, destination, owner)
    }

    fn run_recovery(
        &self,
        session: &mut TransferSession,
        burn_tx_hash: B256,
    ) -> Result<(), TransferError> {
        let (source, destination) = self
            .registry
            .route(session.source_chain_id, session.destination_chain_id)?;
        let owner = self.gateway.active_account()?;
        self.gateway.ensure_gas(destination.chain_id, owner)?;

        let BurnOutcome {
            checkpoint, event, ..
        } = self.gateway.confirm_burn(source, burn_tx_hash, None)?;
        if event.destinationDomain != destination.verifier_domain_id {
            return Err(TransferError::invalid(format!(
                "burn {burn_tx_hash} targets domain {}, session destination is domain {}",
                event.destinationDomain, destination.verifier_domain_id
            )));
        }
        session.amount = event.amount;
        session.recipient = Address::from_word(event.mintRecipient);
        self.capture_checkpoint(session, checkpoint)?;
        info!(session = %session.id, tx_hash = %burn_tx_hash, "checkpoint recovered from burn receipt");

        self.advance(session, TransferAction::Recover)?;
        self.await_attestation(session, source)?;
        self.mint_and_settle(session, destination, owner)
    }

    /// In `waiting_attestation`: reuse an attestation already held by the
    /// session, otherwise poll the verifier for one.
    fn await_attestation(
        &self,
        session: &mut TransferSession,
        source: &ChainConfig,
    ) -> Result<(), TransferError> {
        if session.attestation.is_none() || session.attested_message.is_none() {
            let checkpoint = session
                .checkpoint()
                .cloned()
                .ok_or(TransferError::NothingToResume)?;
            let attested = self
                .attestation
                .fetch_attestation(&checkpoint, source.verifier_domain_id)?;
            apply_attested(session, attested);
        }
        self.advance(session, TransferAction::AttestationReady)
    }

    /// In `minting`: relay the attested message, then either finish or move
    /// on to settlement.
    fn mint_and_settle(
        &self,
        session: &mut TransferSession,
        destination: &ChainConfig,
        owner: Address,
    ) -> Result<(), TransferError> {
        self.gateway.switch_to(destination.chain_id)?;
        self.relay(session, destination, owner)?;

        let Some(settlement) = session.settlement.clone() else {
            return self.advance(session, TransferAction::TransferComplete);
        };
        let target = self.settlement.load_target(&settlement.target_id)?;
        let allowance = self
            .gateway
            .token_allowance(destination, owner, settlement.contract)?;
        if allowance < target.required_allowance_amount {
            self.advance(session, TransferAction::MintConfirmedNeedsApproval)?;
            self.approve_and_settle(session, destination, owner, &settlement)
        } else {
            self.advance(session, TransferAction::MintConfirmed)?;
            self.pay(session, destination, owner, &settlement)
        }
    }

    /// Relay the attested message, settling a mint sent earlier before
    /// sending another. The relay accepts a message once, so a replay it
    /// reports as already received means the funds have landed.
    fn relay(
        &self,
        session: &mut TransferSession,
        destination: &ChainConfig,
        owner: Address,
    ) -> Result<(), TransferError> {
        let (Some(message), Some(attestation)) =
            (session.relay_message().cloned(), session.attestation.clone())
        else {
            return Err(TransferError::NothingToResume);
        };
        let earlier = match session.pending_mint_tx_hash {
            Some(tx_hash) => {
                match self
                    .gateway
                    .confirm_mint(destination, owner, &message, &attestation, tx_hash)
                {
                    Err(TransferError::ReceiptTimeout { .. }) => {
                        warn!(session = %session.id, %tx_hash, "earlier mint still unconfirmed, relaying again");
                        None
                    }
                    result => Some(result),
                }
            }
            None => None,
        };
        let result = match earlier {
            Some(result) => result,
            None => {
                let tx_hash = self
                    .gateway
                    .submit_mint(destination, owner, &message, &attestation);
                tx_hash.and_then(|tx_hash| {
                    session.pending_mint_tx_hash = Some(tx_hash);
                    self.gateway
                        .confirm_mint(destination, owner, &message, &attestation, tx_hash)
                })
            }
        };

        match result {
            Ok(mint) => {
                session.pending_mint_tx_hash = None;
                session.mint_tx_hash = Some(mint.tx_hash);
                info!(session = %session.id, tx_hash = %mint.tx_hash, url = %destination.tx_url(mint.tx_hash), "mint confirmed");
                Ok(())
            }
            Err(TransferError::MintReverted {
                tx_hash,
                reason: MintRevertReason::AlreadyExecuted,
            }) => {
                session.pending_mint_tx_hash = None;
                session.mint_already_executed = true;
                warn!(session = %session.id, ?tx_hash, "relay already received the message, treating as minted");
                Ok(())
            }
            Err(err) => {
                if err.kind() == ErrorKind::MintReverted {
                    session.pending_mint_tx_hash = None;
                }
                Err(err)
            }
        }
    }

    /// In `approving_destination`: approve the settlement contract only if
    /// the allowance is still short, then pay.
    fn approve_and_settle(
        &self,
        session: &mut TransferSession,
        destination: &ChainConfig,
        owner: Address,
        settlement: &SettlementRequest,
    ) -> Result<(), TransferError> {
        let target = self.settlement.load_target(&settlement.target_id)?;
        let allowance = self
            .gateway
            .token_allowance(destination, owner, settlement.contract)?;
        if allowance < target.required_allowance_amount {
            let approval = self
                .gateway
                .approve_max(destination, owner, settlement.contract)?;
            session.destination_approval_tx_hash = Some(approval.tx_hash);
        }
        self.advance(session, TransferAction::DestinationApproved)?;
        self.pay(session, destination, owner, settlement)
    }

    /// In `paying`: re-check the target, settle, then record the payment.
    /// A settlement sent earlier is only ever confirmed, never resent. A
    /// failed record write is kept on the session and does not undo success.
    fn pay(
        &self,
        session: &mut TransferSession,
        destination: &ChainConfig,
        owner: Address,
        settlement: &SettlementRequest,
    ) -> Result<(), TransferError> {
        let outcome = match session.pending_settlement_tx_hash {
            Some(tx_hash) => {
                info!(session = %session.id, %tx_hash, "confirming settlement sent earlier");
                self.gateway.confirm_settlement(destination, tx_hash)
            }
            None => {
                self.settlement.ensure_pending(&settlement.target_id)?;
                let tx_hash = self.gateway.submit_settlement(
                    destination,
                    owner,
                    settlement.contract,
                    &settlement.calldata,
                )?;
                session.pending_settlement_tx_hash = Some(tx_hash);
                self.gateway.confirm_settlement(destination, tx_hash)
            }
        };
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                if err.kind() == ErrorKind::SettlementReverted {
                    session.pending_settlement_tx_hash = None;
                }
                return Err(err);
            }
        };
        session.pending_settlement_tx_hash = None;
        session.settlement_tx_hash = Some(outcome.tx_hash);
        info!(session = %session.id, tx_hash = %outcome.tx_hash, target_id = %settlement.target_id, "settlement confirmed");

        match self
            .settlement
            .record_settlement(settlement, &outcome.receipt, owner)
        {
            Ok(write_back) => session.write_back = Some(write_back),
            Err(err) => {
                warn!(session = %session.id, target_id = %settlement.target_id, error = %err, "payment write-back failed, settlement stands");
                session.write_back_error = Some(err);
            }
        }
        self.advance(session, TransferAction::SettlementConfirmed)
    }

    /// Wait for a burn this session sent. A reverted burn moved no funds, so
    /// it no longer blocks a reset.
    fn confirm_submitted_burn(
        &self,
        session: &mut TransferSession,
        source: &ChainConfig,
        tx_hash: B256,
        fee: Option<&FeeEstimate>,
    ) -> Result<BurnOutcome, TransferError> {
        let result = self.gateway.confirm_burn(source, tx_hash, fee);
        if let Err(err) = &result {
            if err.kind() == ErrorKind::BurnReverted {
                session.pending_burn_tx_hash = None;
            }
        }
        result
    }

    fn capture_checkpoint(
        &self,
        session: &mut TransferSession,
        checkpoint: BurnCheckpoint,
    ) -> Result<(), TransferError> {
        if let Some(header) = MessageHeader::parse(&checkpoint.message_bytes) {
            if !header.nonce.is_zero() {
                session.nonce = Some(header.nonce.to_string());
            }
        }
        session.record_checkpoint(checkpoint.clone())?;
        session.updated_at_ms = self.now()?;

        if !self.policy.persist_checkpoint {
            return Ok(());
        }
        if let Some(settlement) = &session.settlement {
            if let Err(err) = self
                .settlement
                .persist_checkpoint(&settlement.target_id, &checkpoint)
            {
                warn!(session = %session.id, error = %err, "checkpoint side-channel write failed");
            }
        }
        Ok(())
    }

    fn advance(
        &self,
        session: &mut TransferSession,
        action: TransferAction,
    ) -> Result<(), TransferError> {
        let next = transfer_transition(session.state, action)?;
        let now = self.now()?;
        self.record(session, next, action, now);
        Ok(())
    }

    fn conclude(
        &self,
        session: &mut TransferSession,
        result: Result<(), TransferError>,
    ) -> Result<(), TransferError> {
        let Err(err) = result else {
            return Ok(());
        };
        warn!(session = %session.id, state = ?session.state, kind = ?err.kind(), error = %err, "transfer step failed");
        if let Ok(next) = transfer_transition(session.state, TransferAction::Fail) {
            let now = self.now().unwrap_or(session.updated_at_ms);
            self.record(session, next, TransferAction::Fail, now);
        }
        session.last_error = Some(err.clone());
        Err(err)
    }

    fn record(
        &self,
        session: &mut TransferSession,
        next: TransferState,
        action: TransferAction,
        now: TimestampMs,
    ) {
        let reason = action_reason(action);
        info!(session = %session.id, from = ?session.state, to = ?next, reason, "transfer transition");
        session.transitions.push(StateTransition {
            from: session.state,
            to: next,
            reason: reason.to_owned(),
            at_ms: now,
        });
        session.state = next;
        session.updated_at_ms = now;
    }

    fn now(&self) -> Result<TimestampMs, TransferError> {
        self.clock
            .now_ms()
            .map(TimestampMs)
            .map_err(|err| TransferError::transport("clock", err))
    }
}

fn has_burn(session: &TransferSession) -> bool {
    session.checkpoint().is_some() || session.pending_burn_tx_hash.is_some()
}

fn apply_attested(session: &mut TransferSession, attested: AttestedMessage) {
    if attested.nonce.is_some() {
        session.nonce = attested.nonce;
    }
    session.attested_message = Some(attested.message_bytes);
    session.attestation = Some(attested.attestation);
}
