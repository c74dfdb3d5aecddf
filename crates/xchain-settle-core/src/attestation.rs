use alloy::primitives::{keccak256, Bytes, B256};
use tracing::{debug, warn};

use crate::contracts::{same_burn_message, MessageHeader};
use crate::domain::{Attestation, BurnCheckpoint};
use crate::error::TransferError;
use crate::policy::PollPolicy;
use crate::ports::{ClockPort, FeeQuote, VerifierMessage, VerifierPort, VerifierStatus};

/// A burn message as the verifier service reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedMessage {
    pub message_bytes: Bytes,
    pub message_hash: B256,
    pub nonce: Option<String>,
    pub attestation: Option<Attestation>,
}

/// A message paired with a validated attestation, ready to relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestedMessage {
    pub message_bytes: Bytes,
    pub nonce: Option<String>,
    pub attestation: Attestation,
}

enum Poll<T> {
    Ready(T),
    NotIndexed,
    Pending,
}

pub struct AttestationClient<V, C> {
    verifier: V,
    clock: C,
    policy: PollPolicy,
}

impl<V, C> AttestationClient<V, C>
where
    V: VerifierPort,
    C: ClockPort,
{
    pub fn new(verifier: V, clock: C, policy: PollPolicy) -> Self {
        Self {
            verifier,
            clock,
            policy,
        }
    }

    /// Poll until the service has indexed a well-formed message for `tx_hash`.
    /// The attestation, if already present and valid, rides along.
    pub fn fetch_message(
        &self,
        tx_hash: B256,
        source_domain: u32,
    ) -> Result<FetchedMessage, TransferError> {
        self.poll(tx_hash, || {
            let messages = self.query(tx_hash, source_domain)?;
            let Some((bytes, entry)) = messages.into_iter().next() else {
                return Some(Poll::NotIndexed);
            };
            let attestation = entry
                .attestation
                .as_deref()
                .and_then(|raw| Attestation::parse(raw).ok());
            Some(Poll::Ready(FetchedMessage {
                message_hash: keccak256(&bytes),
                message_bytes: bytes,
                nonce: entry.event_nonce,
                attestation,
            }))
        })
    }

    /// Poll until the message matching `checkpoint` carries a complete,
    /// well-formed attestation.
    pub fn fetch_attestation(
        &self,
        checkpoint: &BurnCheckpoint,
        source_domain: u32,
    ) -> Result<AttestedMessage, TransferError> {
        self.poll(checkpoint.burn_tx_hash, || {
            self.attempt(checkpoint, source_domain)
        })
    }

    /// One attempt, no waiting. Used right after the burn to catch an
    /// attestation that is already available.
    pub fn try_once(&self, checkpoint: &BurnCheckpoint, source_domain: u32) -> Option<AttestedMessage> {
        match self.attempt(checkpoint, source_domain) {
            Some(Poll::Ready(attested)) => Some(attested),
            _ => None,
        }
    }

    pub fn fee_quotes(
        &self,
        source_domain: u32,
        destination_domain: u32,
    ) -> Result<Vec<FeeQuote>, TransferError> {
        self.verifier
            .fee_quotes(source_domain, destination_domain)
            .map_err(|err| TransferError::transport("fee_quote", err))
    }

    fn attempt(&self, checkpoint: &BurnCheckpoint, source_domain: u32) -> Option<Poll<AttestedMessage>> {
        let messages = self.query(checkpoint.burn_tx_hash, source_domain)?;
        let single = messages.len() == 1;
        let matched = messages.into_iter().find(|(bytes, _)| {
            single || same_burn_message(&checkpoint.message_bytes, bytes)
        });
        let Some((bytes, entry)) = matched else {
            return Some(Poll::NotIndexed);
        };
        if entry.status != VerifierStatus::Complete {
            return Some(Poll::Pending);
        }
        match entry.attestation.as_deref().map(Attestation::parse) {
            Some(Ok(attestation)) => Some(Poll::Ready(AttestedMessage {
                message_bytes: bytes,
                nonce: entry.event_nonce,
                attestation,
            })),
            Some(Err(err)) => {
                debug!(tx_hash = %checkpoint.burn_tx_hash, error = %err, "attestation not usable yet");
                Some(Poll::Pending)
            }
            None => Some(Poll::Pending),
        }
    }

    /// Fetch and keep only messages with a parseable header. `None` means the
    /// request itself failed and the attempt should be retried.
    fn query(&self, tx_hash: B256, source_domain: u32) -> Option<Vec<(Bytes, VerifierMessage)>> {
        match self.verifier.messages(source_domain, tx_hash) {
            Ok(messages) => Some(
                messages
                    .into_iter()
                    .filter_map(|entry| {
                        let bytes = decode_message(&entry.message)?;
                        Some((bytes, entry))
                    })
                    .collect(),
            ),
            Err(err) => {
                warn!(%tx_hash, source_domain, error = %err, "verifier request failed");
                None
            }
        }
    }

    fn poll<T>(
        &self,
        tx_hash: B256,
        mut attempt: impl FnMut() -> Option<Poll<T>>,
    ) -> Result<T, TransferError> {
        let attempts = self.policy.max_attempts;
        for n in 0..attempts {
            let delay = match attempt() {
                Some(Poll::Ready(value)) => return Ok(value),
                Some(Poll::Pending) => {
                    debug!(%tx_hash, attempt = n + 1, "attestation pending confirmations");
                    self.policy.pending_delay_after(n)
                }
                Some(Poll::NotIndexed) | None => {
                    debug!(%tx_hash, attempt = n + 1, "burn message not indexed yet");
                    self.policy.delay_after(n)
                }
            };
            if n + 1 < attempts {
                self.clock.sleep_ms(delay);
            }
        }
        warn!(%tx_hash, attempts, "attestation polling exhausted");
        Err(TransferError::AttestationTimeout { tx_hash, attempts })
    }
}

fn decode_message(raw: &str) -> Option<Bytes> {
    let bytes = alloy::hex::decode(raw.trim()).ok()?;
    MessageHeader::parse(&bytes)?;
    Some(Bytes::from(bytes))
}
