//! Data model shared by the gateway, the matcher and the report writer.

use serde::{Serialize, Serializer};
use std::fmt;

use crate::abi::{self, Address, Bytes32, ZERO_BYTES32};

// ============================================================================
// ON-CHAIN RECORDS
// ============================================================================

/// Lifecycle state of a proposal on the destination bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "u8")]
pub enum ProposalStatus {
    Inactive,
    Active,
    Passed,
    /// Terminal state: the transfer was executed on the destination chain
    Executed,
    Cancelled,
    /// A code this auditor does not know about; never treated as resolved
    Unknown(u8),
}

impl ProposalStatus {
    /// Status code of an executed proposal
    pub const RESOLVED_CODE: u8 = 3;

    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Inactive,
            1 => Self::Active,
            2 => Self::Passed,
            3 => Self::Executed,
            4 => Self::Cancelled,
            other => Self::Unknown(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Inactive => 0,
            Self::Active => 1,
            Self::Passed => 2,
            Self::Executed => 3,
            Self::Cancelled => 4,
            Self::Unknown(code) => code,
        }
    }

    pub fn is_resolved(self) -> bool {
        self.code() == Self::RESOLVED_CODE
    }
}

impl From<ProposalStatus> for u8 {
    fn from(status: ProposalStatus) -> Self {
        status.code()
    }
}

/// Destination chain view of a proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    pub resource_id: Bytes32,
    pub data_hash: Bytes32,
    pub yes_votes: Vec<Address>,
    pub no_votes: Vec<Address>,
    pub status: ProposalStatus,
    pub proposed_block: u64,
}

impl Proposal {
    /// The bridge returns an all-zero resource ID when no proposal is stored
    pub fn exists(&self) -> bool {
        self.resource_id != ZERO_BYTES32
    }
}

/// A deposit as recorded on the origin chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deposit {
    pub nonce: u64,
    pub destination_chain_id: u8,
    pub record: Vec<u8>,
}

/// Decoded payload of a Deposit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepositEventArgs {
    pub resource_id: Bytes32,
    pub destination_chain_id: u8,
}

/// A Deposit event found in the origin chain's log for a given nonce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositEvent {
    pub nonce: u64,
    pub block_number: u64,
    /// `None` when the log could not be decoded, so its contents cannot be checked
    pub args: Option<DepositEventArgs>,
}

// ============================================================================
// DIAGNOSTICS
// ============================================================================

/// What the origin chain's event log says about a deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginBlockStatus {
    /// Exactly one consistent event, emitted at this block
    Resolved(u64),
    /// One event at this block, but without decodable arguments
    Unverified(u64),
    /// No event with this nonce (towards the expected destination)
    NotFound,
    /// This many events towards the expected destination share the nonce
    Ambiguous(usize),
    ResourceMismatch { expected: Bytes32, got: Bytes32 },
    ChainMismatch { expected: u8, got: u8 },
}

impl OriginBlockStatus {
    /// Block number of the matched event, for the outcomes that have one
    pub fn block_number(&self) -> Option<u64> {
        match self {
            Self::Resolved(block) | Self::Unverified(block) => Some(*block),
            _ => None,
        }
    }
}

impl fmt::Display for OriginBlockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolved(block) => write!(f, "{}", block),
            Self::Unverified(block) => write!(f, "{} (unverified)", block),
            Self::NotFound => write!(f, "Deposit not found on Origin Chain"),
            Self::Ambiguous(count) => write!(
                f,
                "Multiple Deposit events ({}) with the same nonce found on the Origin Chain",
                count
            ),
            Self::ResourceMismatch { expected, got } => write!(
                f,
                "Resource ID of Deposit event doesn't match Proposal, expected {} but got {}",
                abi::to_hex(expected),
                abi::to_hex(got)
            ),
            Self::ChainMismatch { expected, got } => write!(
                f,
                "destinationChainID in Deposit event doesn't match expected {} got {}",
                expected, got
            ),
        }
    }
}

/// A deposit whose proposal is missing its execution, as written to the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationResult {
    pub origin: String,
    pub destination: String,
    pub nonce: u64,
    #[serde(rename = "proposal_resource_id", serialize_with = "serialize_hex")]
    pub resource_id: Bytes32,
    #[serde(rename = "proposal_dataHash", serialize_with = "serialize_hex")]
    pub data_hash: Bytes32,
    #[serde(rename = "proposal_yes_votes_count")]
    pub yes_vote_count: usize,
    #[serde(rename = "proposal_no_votes_count")]
    pub no_vote_count: usize,
    /// Comma-joined checksummed addresses
    #[serde(rename = "proposal_yes_votes")]
    pub yes_votes: String,
    #[serde(rename = "proposal_no_votes")]
    pub no_votes: String,
    #[serde(rename = "proposal_status")]
    pub status: ProposalStatus,
    #[serde(rename = "proposal_proposed_block")]
    pub proposed_block: u64,
    #[serde(rename = "origin_block_number", serialize_with = "serialize_display")]
    pub origin_block: OriginBlockStatus,
}

impl ReconciliationResult {
    pub fn new(
        origin: &str,
        destination: &str,
        nonce: u64,
        proposal: &Proposal,
        origin_block: OriginBlockStatus,
    ) -> Self {
        Self {
            origin: origin.to_string(),
            destination: destination.to_string(),
            nonce,
            resource_id: proposal.resource_id,
            data_hash: proposal.data_hash,
            yes_vote_count: proposal.yes_votes.len(),
            no_vote_count: proposal.no_votes.len(),
            yes_votes: join_votes(&proposal.yes_votes),
            no_votes: join_votes(&proposal.no_votes),
            status: proposal.status,
            proposed_block: proposal.proposed_block,
            origin_block,
        }
    }
}

/// A nonce that could not be classified because a gateway call failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NonceFailure {
    pub nonce: u64,
    pub error: String,
}

fn join_votes(votes: &[Address]) -> String {
    votes
        .iter()
        .map(abi::checksum_address)
        .collect::<Vec<_>>()
        .join(",")
}

fn serialize_hex<S: Serializer>(value: &Bytes32, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&abi::to_hex(value))
}

fn serialize_display<S: Serializer>(
    value: &OriginBlockStatus,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}
