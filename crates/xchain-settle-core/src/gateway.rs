use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol_types::{SolCall, SolEvent};
use tracing::{debug, info, warn};

use crate::contracts::{address_to_bytes32, IMessageTransmitter, ITokenMessenger, IERC20};
use crate::domain::{Attestation, BurnCheckpoint, ChainConfig, TxOutcome, TxReceipt, TxRequest};
use crate::error::{MintRevertReason, TransferError};
use crate::fees::FeeEstimate;
use crate::policy::TransferPolicy;
use crate::ports::{ChainReadPort, ClockPort, PortError, ProviderPort};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurnParams {
    pub owner: Address,
    pub amount: U256,
    pub destination_domain: u32,
    pub mint_recipient: Address,
}

#[derive(Debug, Clone)]
pub struct BurnOutcome {
    pub tx_hash: B256,
    pub checkpoint: BurnCheckpoint,
    pub event: ITokenMessenger::DepositForBurn,
}

/// Chain-scoped reads and writes. Writes go through the wallet, which only
/// ever acts on its active chain; reads go straight to the chain's node.
pub struct ChainGateway<P, R, C> {
    provider: P,
    reader: R,
    clock: C,
    policy: TransferPolicy,
}

impl<P, R, C> ChainGateway<P, R, C>
where
    P: ProviderPort,
    R: ChainReadPort,
    C: ClockPort,
{
    pub fn new(provider: P, reader: R, clock: C, policy: TransferPolicy) -> Self {
        Self {
            provider,
            reader,
            clock,
            policy,
        }
    }

    pub fn active_account(&self) -> Result<Address, TransferError> {
        let accounts = self
            .provider
            .request_accounts()
            .map_err(|err| TransferError::transport("request_accounts", err))?;
        accounts
            .first()
            .copied()
            .ok_or_else(|| TransferError::invalid("wallet exposes no account"))
    }

    pub fn native_balance(&self, chain_id: u64, address: Address) -> Result<U256, TransferError> {
        self.reader
            .native_balance(chain_id, address)
            .map_err(|err| TransferError::transport("native_balance", err))
    }

    pub fn ensure_gas(&self, chain_id: u64, address: Address) -> Result<(), TransferError> {
        let balance = self.native_balance(chain_id, address)?;
        let required = self.policy.min_native_balance_wei;
        if balance < required {
            return Err(TransferError::InsufficientGas {
                chain_id,
                balance,
                required,
            });
        }
        Ok(())
    }

    pub fn token_balance(&self, chain: &ChainConfig, owner: Address) -> Result<U256, TransferError> {
        let data = IERC20::balanceOfCall { account: owner }.abi_encode();
        let raw = self.read(chain.chain_id, chain.token_address, data, "token_balance")?;
        let decoded = IERC20::balanceOfCall::abi_decode_returns(&raw, true)
            .map_err(|err| TransferError::transport("token_balance", err))?;
        Ok(decoded._0)
    }

    pub fn token_allowance(
        &self,
        chain: &ChainConfig,
        owner: Address,
        spender: Address,
    ) -> Result<U256, TransferError> {
        let data = IERC20::allowanceCall { owner, spender }.abi_encode();
        let raw = self.read(chain.chain_id, chain.token_address, data, "token_allowance")?;
        let decoded = IERC20::allowanceCall::abi_decode_returns(&raw, true)
            .map_err(|err| TransferError::transport("token_allowance", err))?;
        Ok(decoded._0)
    }

    /// Approve an unlimited allowance for `spender` on the chain's token.
    pub fn approve_max(
        &self,
        chain: &ChainConfig,
        owner: Address,
        spender: Address,
    ) -> Result<TxOutcome, TransferError> {
        self.ensure_context(chain.chain_id)?;
        let data = IERC20::approveCall {
            spender,
            amount: U256::MAX,
        }
        .abi_encode();
        let failed = |tx_hash, reason: String| TransferError::ApprovalFailed {
            chain_id: chain.chain_id,
            tx_hash,
            reason,
        };
        let tx_hash = self
            .provider
            .send_transaction(&tx(owner, chain.token_address, data))
            .map_err(|err| failed(None, err.to_string()))?;
        info!(chain_id = chain.chain_id, %tx_hash, %spender, "approval submitted");
        let receipt = self.wait_for_receipt(chain.chain_id, tx_hash)?;
        if !receipt.success {
            return Err(failed(Some(tx_hash), "approval transaction reverted".to_owned()));
        }
        Ok(TxOutcome { tx_hash, receipt })
    }

    /// Send the burn. The hash is returned before any receipt exists, so
    /// the caller can record it first.
    pub fn submit_burn(
        &self,
        source: &ChainConfig,
        params: &BurnParams,
        fee: &FeeEstimate,
    ) -> Result<B256, TransferError> {
        self.ensure_context(source.chain_id)?;
        let data = ITokenMessenger::depositForBurnCall {
            amount: params.amount,
            destinationDomain: params.destination_domain,
            mintRecipient: address_to_bytes32(params.mint_recipient),
            burnToken: source.token_address,
            destinationCaller: B256::ZERO,
            maxFee: fee.max_fee,
            minFinalityThreshold: self.policy.fees.min_finality_threshold,
        }
        .abi_encode();
        let tx_hash = self
            .provider
            .send_transaction(&tx(params.owner, source.burn_contract_address, data))
            .map_err(|err| burn_reverted(None, Some(fee), err.to_string()))?;
        info!(chain_id = source.chain_id, %tx_hash, amount = %params.amount, max_fee = %fee.max_fee, "burn submitted");
        Ok(tx_hash)
    }

    /// Wait for a submitted burn and decode its event. `fee` is `None` when
    /// the burn was sent by someone else.
    pub fn confirm_burn(
        &self,
        source: &ChainConfig,
        tx_hash: B256,
        fee: Option<&FeeEstimate>,
    ) -> Result<BurnOutcome, TransferError> {
        let receipt = self.wait_for_receipt(source.chain_id, tx_hash)?;
        if !receipt.success {
            return Err(burn_reverted(
                Some(tx_hash),
                fee,
                "burn transaction reverted".to_owned(),
            ));
        }
        let (checkpoint, event) = self.decode_burn_receipt(source, &receipt)?;
        Ok(BurnOutcome {
            tx_hash,
            checkpoint,
            event,
        })
    }

    /// Pull the burn event and the emitted message out of a burn receipt.
    fn decode_burn_receipt(
        &self,
        source: &ChainConfig,
        receipt: &TxReceipt,
    ) -> Result<(BurnCheckpoint, ITokenMessenger::DepositForBurn), TransferError> {
        let not_found = || TransferError::BurnEventNotFound {
            tx_hash: receipt.transaction_hash,
        };
        let event = receipt
            .logs
            .iter()
            .filter(|log| log.address == source.burn_contract_address)
            .find_map(|log| {
                ITokenMessenger::DepositForBurn::decode_raw_log(
                    log.topics.iter().copied(),
                    &log.data,
                    true,
                )
                .ok()
            })
            .ok_or_else(not_found)?;
        let message = receipt
            .logs
            .iter()
            .filter(|log| log.address == source.relay_contract_address)
            .find_map(|log| {
                IMessageTransmitter::MessageSent::decode_raw_log(
                    log.topics.iter().copied(),
                    &log.data,
                    true,
                )
                .ok()
            })
            .ok_or_else(not_found)?;
        let checkpoint =
            BurnCheckpoint::from_message(receipt.transaction_hash, message.message.clone());
        Ok((checkpoint, event))
    }

    /// Ask the wallet to move to `chain_id` and wait until it reports it.
    pub fn switch_to(&self, chain_id: u64) -> Result<(), TransferError> {
        let mut current = self.current_chain()?;
        if current == chain_id {
            return Ok(());
        }
        info!(from = current, to = chain_id, "requesting chain switch");
        self.provider
            .switch_chain(chain_id)
            .map_err(|err| TransferError::transport("switch_chain", err))?;
        let poll = self.policy.chain_switch;
        for attempt in 0..poll.max_attempts {
            current = self.current_chain()?;
            if current == chain_id {
                return Ok(());
            }
            debug!(current, required = chain_id, attempt = attempt + 1, "waiting for chain switch");
            self.clock.sleep_ms(poll.delay_after(attempt));
        }
        Err(TransferError::ChainSwitchTimeout {
            current,
            required: chain_id,
        })
    }

    /// Refuse to go on unless the wallet is on `required` right now.
    pub fn ensure_context(&self, required: u64) -> Result<(), TransferError> {
        let current = self.current_chain()?;
        if current != required {
            return Err(TransferError::ChainContextMismatch { current, required });
        }
        Ok(())
    }

    /// Relay the attested message. A send the node already rejects is
    /// classified straight away.
    pub fn submit_mint(
        &self,
        destination: &ChainConfig,
        owner: Address,
        message: &Bytes,
        attestation: &Attestation,
    ) -> Result<B256, TransferError> {
        self.ensure_context(destination.chain_id)?;
        let request = mint_request(destination, owner, message, attestation);
        match self.provider.send_transaction(&request) {
            Ok(tx_hash) => {
                info!(chain_id = destination.chain_id, %tx_hash, "mint submitted");
                Ok(tx_hash)
            }
            Err(err) => Err(TransferError::MintReverted {
                tx_hash: None,
                reason: self.classify_mint_failure(destination.chain_id, &request, err),
            }),
        }
    }

    /// Wait for a submitted mint. A reverted receipt is replayed as a call to
    /// learn why.
    pub fn confirm_mint(
        &self,
        destination: &ChainConfig,
        owner: Address,
        message: &Bytes,
        attestation: &Attestation,
        tx_hash: B256,
    ) -> Result<TxOutcome, TransferError> {
        let receipt = self.wait_for_receipt(destination.chain_id, tx_hash)?;
        if !receipt.success {
            let request = mint_request(destination, owner, message, attestation);
            let reason = match self.reader.call(destination.chain_id, &request) {
                Err(PortError::Reverted(reason)) => MintRevertReason::classify(&reason),
                Err(err) => MintRevertReason::Unknown {
                    detail: err.to_string(),
                },
                Ok(_) => MintRevertReason::Unknown {
                    detail: "reverted without a reproducible reason".to_owned(),
                },
            };
            return Err(TransferError::MintReverted {
                tx_hash: Some(tx_hash),
                reason,
            });
        }
        Ok(TxOutcome { tx_hash, receipt })
    }

    /// Submit an opaque settlement call. Revert reasons pass through as-is.
    pub fn submit_settlement(
        &self,
        chain: &ChainConfig,
        owner: Address,
        contract: Address,
        calldata: &Bytes,
    ) -> Result<B256, TransferError> {
        self.ensure_context(chain.chain_id)?;
        let tx_hash = self
            .provider
            .send_transaction(&tx(owner, contract, calldata.to_vec()))
            .map_err(|err| TransferError::SettlementReverted {
                tx_hash: None,
                reason: err.to_string(),
            })?;
        info!(chain_id = chain.chain_id, %tx_hash, %contract, "settlement submitted");
        Ok(tx_hash)
    }

    pub fn confirm_settlement(
        &self,
        chain: &ChainConfig,
        tx_hash: B256,
    ) -> Result<TxOutcome, TransferError> {
        let receipt = self.wait_for_receipt(chain.chain_id, tx_hash)?;
        if !receipt.success {
            return Err(TransferError::SettlementReverted {
                tx_hash: Some(tx_hash),
                reason: "settlement transaction reverted".to_owned(),
            });
        }
        Ok(TxOutcome { tx_hash, receipt })
    }

    pub fn wait_for_receipt(&self, chain_id: u64, tx_hash: B256) -> Result<TxReceipt, TransferError> {
        let poll = self.policy.receipt;
        for attempt in 0..poll.max_attempts {
            match self.reader.transaction_receipt(chain_id, tx_hash) {
                Ok(Some(receipt)) => return Ok(receipt),
                Ok(None) => debug!(chain_id, %tx_hash, attempt = attempt + 1, "receipt not available yet"),
                Err(err) => warn!(chain_id, %tx_hash, error = %err, "receipt lookup failed"),
            }
            if attempt + 1 < poll.max_attempts {
                self.clock.sleep_ms(poll.delay_after(attempt));
            }
        }
        Err(TransferError::ReceiptTimeout { chain_id, tx_hash })
    }

    fn current_chain(&self) -> Result<u64, TransferError> {
        self.provider
            .chain_id()
            .map_err(|err| TransferError::transport("chain_id", err))
    }

    fn read(
        &self,
        chain_id: u64,
        to: Address,
        data: Vec<u8>,
        step: &str,
    ) -> Result<Bytes, TransferError> {
        let request = TxRequest {
            from: None,
            to,
            data: Bytes::from(data),
            value: None,
        };
        self.reader
            .call(chain_id, &request)
            .map_err(|err| TransferError::transport(step, err))
    }

    fn classify_mint_failure(&self, chain_id: u64, request: &TxRequest, err: PortError) -> MintRevertReason {
        if let PortError::Reverted(reason) = &err {
            return MintRevertReason::classify(reason);
        }
        match self.reader.call(chain_id, request) {
            Err(PortError::Reverted(reason)) => MintRevertReason::classify(&reason),
            _ => MintRevertReason::Unknown {
                detail: err.to_string(),
            },
        }
    }
}

fn burn_reverted(tx_hash: Option<B256>, fee: Option<&FeeEstimate>, reason: String) -> TransferError {
    if let Some(fee) = fee.filter(|fee| fee.source.is_fallback()) {
        warn!(?tx_hash, max_fee = %fee.max_fee, "burn failed with a fallback max fee");
    }
    TransferError::BurnReverted {
        tx_hash,
        fee_source: fee.map(|fee| fee.source),
        reason,
    }
}

fn mint_request(
    destination: &ChainConfig,
    owner: Address,
    message: &Bytes,
    attestation: &Attestation,
) -> TxRequest {
    tx(
        owner,
        destination.relay_contract_address,
        IMessageTransmitter::receiveMessageCall {
            message: message.clone(),
            attestation: attestation.as_bytes().clone(),
        }
        .abi_encode(),
    )
}

fn tx(from: Address, to: Address, data: Vec<u8>) -> TxRequest {
    TxRequest {
        from: Some(from),
        to,
        data: Bytes::from(data),
        value: None,
    }
}
