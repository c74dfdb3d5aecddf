//! ABI bindings for the token, burn, relay and settlement contracts, plus
//! parsing of the burn message header.

use alloy::primitives::{keccak256, Address, B256};
use alloy::sol;

sol! {
    #[derive(Debug, PartialEq, Eq)]
    interface IERC20 {
        function approve(address spender, uint256 amount) external returns (bool);
        function allowance(address owner, address spender) external view returns (uint256);
        function balanceOf(address account) external view returns (uint256);
    }

    #[derive(Debug, PartialEq, Eq)]
    interface ITokenMessenger {
        event DepositForBurn(
            address indexed burnToken,
            uint256 amount,
            address indexed depositor,
            bytes32 mintRecipient,
            uint32 destinationDomain,
            bytes32 destinationTokenMessenger,
            bytes32 destinationCaller,
            uint256 maxFee,
            uint32 indexed minFinalityThreshold,
            bytes hookData
        );

        function depositForBurn(
            uint256 amount,
            uint32 destinationDomain,
            bytes32 mintRecipient,
            address burnToken,
            bytes32 destinationCaller,
            uint256 maxFee,
            uint32 minFinalityThreshold
        ) external;
    }

    #[derive(Debug, PartialEq, Eq)]
    interface IMessageTransmitter {
        event MessageSent(bytes message);

        function receiveMessage(bytes message, bytes attestation) external returns (bool success);
    }

    /// Emitted by settlement contracts once a target is paid.
    #[derive(Debug, PartialEq, Eq)]
    interface ISettlement {
        event PaymentSettled(bytes32 indexed targetId, address indexed payer, uint256 amount);
    }
}

const VERSION: usize = 0;
const SOURCE_DOMAIN: usize = 4;
const DESTINATION_DOMAIN: usize = 8;
const NONCE: usize = 12;
const SENDER: usize = 44;
const RECIPIENT: usize = 76;
const DESTINATION_CALLER: usize = 108;
const MIN_FINALITY: usize = 140;
const FINALITY_EXECUTED: usize = 144;
pub const MESSAGE_HEADER_LEN: usize = 148;

/// Fixed-layout header of a burn message as emitted on the source chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub version: u32,
    pub source_domain: u32,
    pub destination_domain: u32,
    pub nonce: B256,
    pub sender: B256,
    pub recipient: B256,
    pub destination_caller: B256,
    pub min_finality_threshold: u32,
    pub finality_threshold_executed: u32,
}

impl MessageHeader {
    /// Returns `None` when the message is too short to carry a header.
    pub fn parse(message: &[u8]) -> Option<Self> {
        if message.len() < MESSAGE_HEADER_LEN {
            return None;
        }
        Some(Self {
            version: read_u32(message, VERSION),
            source_domain: read_u32(message, SOURCE_DOMAIN),
            destination_domain: read_u32(message, DESTINATION_DOMAIN),
            nonce: B256::from_slice(&message[NONCE..SENDER]),
            sender: B256::from_slice(&message[SENDER..RECIPIENT]),
            recipient: B256::from_slice(&message[RECIPIENT..DESTINATION_CALLER]),
            destination_caller: B256::from_slice(&message[DESTINATION_CALLER..MIN_FINALITY]),
            min_finality_threshold: read_u32(message, MIN_FINALITY),
            finality_threshold_executed: read_u32(message, FINALITY_EXECUTED),
        })
    }
}

fn read_u32(message: &[u8], offset: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&message[offset..offset + 4]);
    u32::from_be_bytes(word)
}

/// Whether `candidate` is the verifier's copy of the burn message `emitted`.
/// The verifier fills in the nonce and the executed finality, so those two
/// fields are ignored when the hashes differ.
pub fn same_burn_message(emitted: &[u8], candidate: &[u8]) -> bool {
    if keccak256(emitted) == keccak256(candidate) {
        return true;
    }
    if emitted.len() != candidate.len() || emitted.len() < MESSAGE_HEADER_LEN {
        return false;
    }
    emitted[..NONCE] == candidate[..NONCE]
        && emitted[SENDER..FINALITY_EXECUTED] == candidate[SENDER..FINALITY_EXECUTED]
        && emitted[MESSAGE_HEADER_LEN..] == candidate[MESSAGE_HEADER_LEN..]
}

/// Left-pad an address into the 32-byte form the burn contract expects.
pub fn address_to_bytes32(address: Address) -> B256 {
    address.into_word()
}
