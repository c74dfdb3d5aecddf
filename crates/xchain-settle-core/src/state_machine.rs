use serde::{Deserialize, Serialize};

use crate::domain::TimestampMs;
use crate::error::TransferError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferState {
    Idle,
    Approving,
    Burning,
    WaitingAttestation,
    Minting,
    ApprovingDestination,
    Paying,
    Success,
    Error,
}

impl TransferState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TransferState::Success | TransferState::Error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferAction {
    Begin,
    SubmitBurn,
    BurnConfirmed,
    AttestationFastPath,
    AttestationReady,
    MintConfirmed,
    MintConfirmedNeedsApproval,
    TransferComplete,
    DestinationApproved,
    SettlementConfirmed,
    Fail,
    Resume,
    ResumeSettlement,
    Recover,
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateTransition {
    pub from: TransferState,
    pub to: TransferState,
    pub reason: String,
    pub at_ms: TimestampMs,
}

pub fn transfer_transition(
    state: TransferState,
    action: TransferAction,
) -> Result<TransferState, TransferError> {
    use TransferAction as A;
    use TransferState as S;

    let next = match (state, action) {
        (S::Idle, A::Begin) => S::Approving,
        (S::Approving, A::SubmitBurn) => S::Burning,
        (S::Burning, A::BurnConfirmed) => S::WaitingAttestation,
        (S::Burning, A::AttestationFastPath) => S::Minting,
        (S::WaitingAttestation, A::AttestationReady) => S::Minting,
        (S::Minting, A::MintConfirmedNeedsApproval) => S::ApprovingDestination,
        (S::Minting, A::MintConfirmed) => S::Paying,
        (S::Minting, A::TransferComplete) => S::Success,
        (S::ApprovingDestination, A::DestinationApproved) => S::Paying,
        (S::Paying, A::SettlementConfirmed) => S::Success,
        (s, A::Fail) if !s.is_terminal() => S::Error,
        (S::Error, A::Resume) => S::WaitingAttestation,
        (S::Error, A::ResumeSettlement) => S::ApprovingDestination,
        (S::Idle, A::Recover) => S::WaitingAttestation,
        (S::Idle | S::Error | S::Success, A::Reset) => S::Idle,
        (from, action) => return Err(TransferError::IllegalTransition { from, action }),
    };
    Ok(next)
}

pub fn action_reason(action: TransferAction) -> &'static str {
    match action {
        TransferAction::Begin => "preflight_passed",
        TransferAction::SubmitBurn => "source_allowance_ready",
        TransferAction::BurnConfirmed => "burn_confirmed",
        TransferAction::AttestationFastPath => "attestation_with_burn",
        TransferAction::AttestationReady => "attestation_ready",
        TransferAction::MintConfirmed => "mint_confirmed",
        TransferAction::MintConfirmedNeedsApproval => "mint_confirmed_allowance_low",
        TransferAction::TransferComplete => "transfer_complete",
        TransferAction::DestinationApproved => "destination_approved",
        TransferAction::SettlementConfirmed => "settlement_confirmed",
        TransferAction::Fail => "step_failed",
        TransferAction::Resume => "resumed_from_checkpoint",
        TransferAction::ResumeSettlement => "resumed_after_mint",
        TransferAction::Recover => "recovered_from_burn",
        TransferAction::Reset => "reset",
    }
}
