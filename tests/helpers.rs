//! Shared test helpers
//!
//! The module is organized into several categories:
//! - **Constants**: Dummy chain IDs, addresses and resource IDs
//! - **Model Builders**: Functions to create endpoints, pairs, proposals and events
//! - **Mock Gateway**: In-memory `ChainGateway` used by engine and driver tests
//! - **ABI Encoders**: Functions to build contract return data for mock JSON-RPC servers

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use proposal_auditor::abi::{self, Address, Bytes32, ZERO_BYTES32};
use proposal_auditor::config::{ChainConfig, ChainEndpoint, Config};
use proposal_auditor::gateway::ChainGateway;
use proposal_auditor::reconciler::{
    ChainPair, DepositEvent, DepositEventArgs, Proposal, ProposalStatus,
};
use serde_json::json;
use url::Url;
use wiremock::ResponseTemplate;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Bridge chain ID of the dummy origin chain
pub const ETH_CHAIN_ID: u8 = 1;

/// Bridge chain ID of the dummy destination chain
pub const MTR_CHAIN_ID: u8 = 3;

/// Bridge chain ID of a third chain, used for wrongly-routed deposits
pub const BSC_CHAIN_ID: u8 = 4;

/// Dummy bridge contract address
pub const DUMMY_BRIDGE_ADDR: &str = "0x00000000000000000000000000000000000000b1";

/// Dummy handler contract address
pub const DUMMY_HANDLER: Address = [0x42; 20];

/// Dummy resource ID carried by proposals and events
pub const DUMMY_RESOURCE_ID: Bytes32 = [0x0a; 32];

/// Dummy relayer address voting on proposals
pub const DUMMY_RELAYER_A: Address = [0xa1; 20];

/// Second dummy relayer address
#[allow(dead_code)]
pub const DUMMY_RELAYER_B: Address = [0xb2; 20];

// ============================================================================
// MODEL BUILDERS
// ============================================================================

/// Builds a resolved chain endpoint
#[allow(dead_code)]
pub fn endpoint(id: &str, name: &str, chain_id: u8) -> ChainEndpoint {
    ChainEndpoint {
        id: id.to_string(),
        name: name.to_string(),
        chain_id,
        rpc_url: Url::parse("http://127.0.0.1:8545").unwrap(),
        bridge_address: abi::parse_address(DUMMY_BRIDGE_ADDR).unwrap(),
        handler_address: DUMMY_HANDLER,
        start_block: 0,
        deployment_block: 0,
    }
}

/// Builds the Ethereum -> Meter pair with the given cutoff block
#[allow(dead_code)]
pub fn eth_to_mtr(start_origin_block: u64) -> ChainPair {
    let mut pair = ChainPair::new(
        endpoint("eth", "Ethereum", ETH_CHAIN_ID),
        endpoint("mtr", "Meter", MTR_CHAIN_ID),
    );
    pair.start_origin_block = start_origin_block;
    pair
}

/// Builds a chain configuration entry with an inline RPC URL
#[allow(dead_code)]
pub fn chain_config(id: &str, name: &str, chain_id: u8) -> ChainConfig {
    ChainConfig {
        id: id.to_string(),
        name: name.to_string(),
        chain_id,
        rpc_url: Some("http://127.0.0.1:8545".to_string()),
        rpc_url_env: None,
        bridge_address: DUMMY_BRIDGE_ADDR.to_string(),
        handler_address: abi::to_hex(&DUMMY_HANDLER),
        start_block: 0,
        deployment_block: 0,
    }
}

/// Builds a configuration with Ethereum, Meter and Bsc
#[allow(dead_code)]
pub fn three_chain_config() -> Config {
    Config {
        chains: vec![
            chain_config("eth", "Ethereum", ETH_CHAIN_ID),
            chain_config("mtr", "Meter", MTR_CHAIN_ID),
            chain_config("bsc", "Bsc", BSC_CHAIN_ID),
        ],
        audit: Default::default(),
    }
}

/// Builds a proposal with one yes vote and the given status
#[allow(dead_code)]
pub fn proposal(status: ProposalStatus) -> Proposal {
    Proposal {
        resource_id: DUMMY_RESOURCE_ID,
        data_hash: [0x0d; 32],
        yes_votes: vec![DUMMY_RELAYER_A],
        no_votes: vec![],
        status,
        proposed_block: 900,
    }
}

/// Builds a proposal as returned when none exists
#[allow(dead_code)]
pub fn missing_proposal() -> Proposal {
    Proposal {
        resource_id: ZERO_BYTES32,
        data_hash: ZERO_BYTES32,
        yes_votes: vec![],
        no_votes: vec![],
        status: ProposalStatus::Inactive,
        proposed_block: 0,
    }
}

/// Builds a decodable Deposit event
#[allow(dead_code)]
pub fn deposit_event(nonce: u64, block_number: u64, destination_chain_id: u8) -> DepositEvent {
    DepositEvent {
        nonce,
        block_number,
        args: Some(DepositEventArgs {
            resource_id: DUMMY_RESOURCE_ID,
            destination_chain_id,
        }),
    }
}

/// Deposit record bytes used for a nonce
#[allow(dead_code)]
pub fn record_for(nonce: u64) -> Vec<u8> {
    let mut record = vec![0xde, 0xad];
    record.extend_from_slice(&nonce.to_be_bytes());
    record
}

// ============================================================================
// MOCK GATEWAY
// ============================================================================

/// In-memory bridge contract.
///
/// Proposals are only returned when the lookup hash matches the one derived from
/// the registered deposit record and handler, like the real contract.
#[derive(Default)]
pub struct MockGateway {
    deposit_counts: HashMap<u8, u64>,
    records: HashMap<(u64, u8), Vec<u8>>,
    proposals: HashMap<(u8, u64, Bytes32), Proposal>,
    events: HashMap<u64, Vec<DepositEvent>>,
    failing_nonces: HashSet<u64>,
    unreachable: bool,
    /// Nonces whose Deposit events were queried, in call order
    pub event_queries: Mutex<Vec<u64>>,
}

#[allow(dead_code)]
impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deposit_count(mut self, destination_chain_id: u8, count: u64) -> Self {
        self.deposit_counts.insert(destination_chain_id, count);
        self
    }

    /// Registers a deposit record on this (origin) gateway
    pub fn with_record(mut self, nonce: u64, destination_chain_id: u8) -> Self {
        self.records
            .insert((nonce, destination_chain_id), record_for(nonce));
        self
    }

    /// Registers a proposal on this (destination) gateway
    pub fn with_proposal(mut self, origin_chain_id: u8, nonce: u64, proposal: Proposal) -> Self {
        let hash = abi::proposal_lookup_hash(&DUMMY_HANDLER, &record_for(nonce));
        self.proposals.insert((origin_chain_id, nonce, hash), proposal);
        self
    }

    /// Registers Deposit events on this (origin) gateway
    pub fn with_events(mut self, nonce: u64, events: Vec<DepositEvent>) -> Self {
        self.events.insert(nonce, events);
        self
    }

    /// Makes every call for `nonce` fail
    pub fn failing_nonce(mut self, nonce: u64) -> Self {
        self.failing_nonces.insert(nonce);
        self
    }

    /// Makes every call fail
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub fn queried_events(&self) -> Vec<u64> {
        let mut queried = self.event_queries.lock().unwrap().clone();
        queried.sort_unstable();
        queried
    }

    fn check(&self, nonce: Option<u64>) -> anyhow::Result<()> {
        if self.unreachable {
            anyhow::bail!("connection refused");
        }
        if let Some(nonce) = nonce {
            if self.failing_nonces.contains(&nonce) {
                anyhow::bail!("request for nonce {} timed out", nonce);
            }
        }
        Ok(())
    }
}

impl ChainGateway for MockGateway {
    async fn latest_block(&self) -> anyhow::Result<u64> {
        self.check(None)?;
        Ok(1_000)
    }

    async fn deposit_count(&self, destination_chain_id: u8) -> anyhow::Result<u64> {
        self.check(None)?;
        self.deposit_counts
            .get(&destination_chain_id)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("execution reverted"))
    }

    async fn deposit_record(&self, nonce: u64, destination_chain_id: u8) -> anyhow::Result<Vec<u8>> {
        self.check(Some(nonce))?;
        Ok(self
            .records
            .get(&(nonce, destination_chain_id))
            .cloned()
            .unwrap_or_default())
    }

    async fn proposal(
        &self,
        origin_chain_id: u8,
        nonce: u64,
        lookup_hash: Bytes32,
    ) -> anyhow::Result<Proposal> {
        self.check(Some(nonce))?;
        Ok(self
            .proposals
            .get(&(origin_chain_id, nonce, lookup_hash))
            .cloned()
            .unwrap_or_else(missing_proposal))
    }

    async fn deposit_events(&self, nonce: u64) -> anyhow::Result<Vec<DepositEvent>> {
        self.check(Some(nonce))?;
        self.event_queries.lock().unwrap().push(nonce);
        Ok(self.events.get(&nonce).cloned().unwrap_or_default())
    }
}

// ============================================================================
// ABI ENCODERS
// ============================================================================

/// Encodes the return data of a function returning `bytes`
#[allow(dead_code)]
pub fn encode_bytes_return(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&abi::encode_uint(32));
    out.extend_from_slice(&abi::encode_uint(bytes.len() as u64));
    out.extend_from_slice(bytes);
    let padding = (32 - bytes.len() % 32) % 32;
    out.extend(std::iter::repeat(0u8).take(padding));
    out
}

/// Encodes the return data of `getProposal`
#[allow(dead_code)]
pub fn encode_proposal_return(proposal: &Proposal) -> Vec<u8> {
    let head_len = 6 * 32;
    let yes_offset = head_len;
    let no_offset = head_len + 32 * (1 + proposal.yes_votes.len());

    let mut out = Vec::new();
    out.extend_from_slice(&abi::encode_uint(32));
    out.extend_from_slice(&proposal.resource_id);
    out.extend_from_slice(&proposal.data_hash);
    out.extend_from_slice(&abi::encode_uint(yes_offset as u64));
    out.extend_from_slice(&abi::encode_uint(no_offset as u64));
    out.extend_from_slice(&abi::encode_uint(proposal.status.code().into()));
    out.extend_from_slice(&abi::encode_uint(proposal.proposed_block));
    for votes in [&proposal.yes_votes, &proposal.no_votes] {
        out.extend_from_slice(&abi::encode_uint(votes.len() as u64));
        for vote in votes.iter() {
            out.extend_from_slice(&abi::encode_address(vote));
        }
    }
    out
}

/// JSON-RPC success response carrying `result`
#[allow(dead_code)]
pub fn rpc_result(result: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "jsonrpc": "2.0",
        "result": result,
        "id": 1
    }))
}

/// JSON-RPC success response carrying hex-encoded return data
#[allow(dead_code)]
pub fn rpc_hex_result(data: &[u8]) -> ResponseTemplate {
    rpc_result(json!(abi::to_hex(data)))
}
