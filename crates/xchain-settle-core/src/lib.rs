pub mod attestation;
pub mod contracts;
pub mod domain;
pub mod error;
pub mod fees;
pub mod gateway;
pub mod orchestrator;
pub mod policy;
pub mod ports;
pub mod registry;
pub mod settlement;
pub mod state_machine;

pub use attestation::{AttestationClient, AttestedMessage, FetchedMessage};
pub use domain::{
    payment_supersedes, Attestation, BurnCheckpoint, CancelSafety, ChainConfig, PayerSource,
    PaymentWriteBack, ReceiptLog, SessionId, SettlementRequest, SettlementTarget, TargetStatus,
    TimestampMs, TransferRequest, TransferSession, TxOutcome, TxReceipt, TxRequest,
    WriteBackOutcome,
};
pub use error::{ErrorKind, MintRevertReason, TransferError};
pub use fees::{estimate_max_fee, fallback_max_fee, FeeEstimate, FeeSource};
pub use gateway::{BurnOutcome, BurnParams, ChainGateway};
pub use orchestrator::Orchestrator;
pub use policy::{FeePolicy, PollPolicy, TransferPolicy};
pub use ports::{
    ChainReadPort, ClockPort, FeeQuote, PortError, ProviderPort, RecordStorePort, VerifierMessage,
    VerifierPort, VerifierStatus,
};
pub use registry::{ChainRegistry, RegistryError};
pub use settlement::SettlementBridge;
pub use state_machine::{transfer_transition, StateTransition, TransferAction, TransferState};
