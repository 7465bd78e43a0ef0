//! Bridge Gateway Module
//!
//! Read-only access to one chain's bridge contract. The reconciliation engine
//! only talks to chains through the [`ChainGateway`] trait; [`EvmBridgeGateway`]
//! implements it over EVM JSON-RPC for ChainBridge-style contracts.

use anyhow::{Context, Result};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::abi::{self, Bytes32, WORD};
use crate::config::{AuditConfig, ChainEndpoint};
use crate::evm_client::{parse_quantity, EvmClient, EvmLog};
use crate::reconciler::types::{DepositEvent, DepositEventArgs, Proposal, ProposalStatus};

/// `_depositCounts(uint8 destinationChainID) returns (uint64)`
pub const DEPOSIT_COUNTS_SIG: &str = "_depositCounts(uint8)";
/// `_depositRecords(uint64 depositNonce, uint8 destinationChainID) returns (bytes)`
pub const DEPOSIT_RECORDS_SIG: &str = "_depositRecords(uint64,uint8)";
/// `getProposal(uint8 originChainID, uint64 depositNonce, bytes32 dataHash) returns (Proposal)`
pub const GET_PROPOSAL_SIG: &str = "getProposal(uint8,uint64,bytes32)";
/// `Deposit(uint8 indexed destinationChainID, bytes32 indexed resourceID, uint64 indexed depositNonce)`
pub const DEPOSIT_EVENT_SIG: &str = "Deposit(uint8,bytes32,uint64)";

// ============================================================================
// GATEWAY CONTRACT
// ============================================================================

/// Read-only view of a bridge contract on one chain.
///
/// Every call may fail with a transient transport error; a missing proposal is
/// not an error and comes back with an all-zero resource ID.
pub trait ChainGateway: Send + Sync {
    /// Latest block number, used to check the chain is reachable
    fn latest_block(&self) -> impl Future<Output = Result<u64>> + Send;

    /// Number of deposits ever made towards `destination_chain_id`
    fn deposit_count(&self, destination_chain_id: u8) -> impl Future<Output = Result<u64>> + Send;

    /// Raw deposit record for a nonce towards `destination_chain_id`
    fn deposit_record(
        &self,
        nonce: u64,
        destination_chain_id: u8,
    ) -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// Proposal stored for a deposit coming from `origin_chain_id`
    fn proposal(
        &self,
        origin_chain_id: u8,
        nonce: u64,
        lookup_hash: Bytes32,
    ) -> impl Future<Output = Result<Proposal>> + Send;

    /// Every Deposit event carrying `nonce`, over the chain's whole history
    fn deposit_events(&self, nonce: u64) -> impl Future<Output = Result<Vec<DepositEvent>>> + Send;
}

// ============================================================================
// EVM IMPLEMENTATION
// ============================================================================

/// [`ChainGateway`] over a ChainBridge contract reached via EVM JSON-RPC.
#[derive(Debug, Clone)]
pub struct EvmBridgeGateway {
    client: EvmClient,
    chain: String,
    deployment_block: u64,
    max_retries: u32,
    retry_backoff: Duration,
}

impl EvmBridgeGateway {
    /// Creates a gateway for a resolved chain endpoint
    ///
    /// # Arguments
    ///
    /// * `endpoint` - Chain whose bridge contract is queried
    /// * `audit` - Timeout and retry settings
    pub fn new(endpoint: &ChainEndpoint, audit: &AuditConfig) -> Result<Self> {
        let client = EvmClient::new(
            endpoint.rpc_url.as_str(),
            endpoint.bridge_address,
            audit.request_timeout(),
        )
        .with_context(|| format!("Failed to create EVM client for chain {}", endpoint.id))?;

        Ok(Self {
            client,
            chain: endpoint.name.clone(),
            deployment_block: endpoint.deployment_block,
            max_retries: audit.max_retries,
            retry_backoff: audit.retry_backoff(),
        })
    }

    /// Runs `op`, retrying failures with a linear backoff.
    async fn with_retries<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        "{} on {} failed (attempt {}/{}): {:#}",
                        what,
                        self.chain,
                        attempt,
                        self.max_retries + 1,
                        e
                    );
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("{} on {} failed", what, self.chain))
                }
            }
        }
    }
}

impl ChainGateway for EvmBridgeGateway {
    async fn latest_block(&self) -> Result<u64> {
        self.with_retries("eth_blockNumber", || self.client.get_block_number())
            .await
    }

    async fn deposit_count(&self, destination_chain_id: u8) -> Result<u64> {
        let calldata = abi::encode_call(
            DEPOSIT_COUNTS_SIG,
            &[abi::encode_uint(destination_chain_id.into())],
        );
        let data = self
            .with_retries("_depositCounts", || self.client.call(&calldata))
            .await?;
        abi::decode_u64(abi::word_at(&data, 0)?).context("Failed to decode _depositCounts result")
    }

    async fn deposit_record(&self, nonce: u64, destination_chain_id: u8) -> Result<Vec<u8>> {
        let calldata = abi::encode_call(
            DEPOSIT_RECORDS_SIG,
            &[
                abi::encode_uint(nonce),
                abi::encode_uint(destination_chain_id.into()),
            ],
        );
        let data = self
            .with_retries("_depositRecords", || self.client.call(&calldata))
            .await?;
        abi::decode_bytes_return(&data).context("Failed to decode _depositRecords result")
    }

    async fn proposal(&self, origin_chain_id: u8, nonce: u64, lookup_hash: Bytes32) -> Result<Proposal> {
        let calldata = abi::encode_call(
            GET_PROPOSAL_SIG,
            &[
                abi::encode_uint(origin_chain_id.into()),
                abi::encode_uint(nonce),
                lookup_hash,
            ],
        );
        let data = self
            .with_retries("getProposal", || self.client.call(&calldata))
            .await?;
        decode_proposal(&data).context("Failed to decode getProposal result")
    }

    async fn deposit_events(&self, nonce: u64) -> Result<Vec<DepositEvent>> {
        let topics = [
            Some(abi::event_topic(DEPOSIT_EVENT_SIG)),
            None,
            None,
            Some(abi::encode_uint(nonce)),
        ];
        let logs = self
            .with_retries("eth_getLogs(Deposit)", || {
                self.client.get_logs(&topics, self.deployment_block, None)
            })
            .await?;

        logs.iter()
            .map(|log| deposit_event_from_log(nonce, log))
            .collect()
    }
}

// ============================================================================
// DECODING
// ============================================================================

/// Decodes the `Proposal` tuple returned by `getProposal`.
///
/// Layout: an offset to the tuple, then six head words (`_resourceID`,
/// `_dataHash`, offset of `_yesVotes`, offset of `_noVotes`, `_status`,
/// `_proposedBlock`) followed by the two address arrays.
pub fn decode_proposal(data: &[u8]) -> Result<Proposal> {
    let base = abi::follow_offset(data, 0, 0)?;
    let head_at = |index: usize| -> Result<usize> {
        base.checked_add(WORD * index)
            .context("ABI offset overflows")
    };
    let head = |index: usize| abi::word_at(data, head_at(index)?);

    let yes_start = abi::follow_offset(data, base, head_at(2)?)?;
    let no_start = abi::follow_offset(data, base, head_at(3)?)?;

    Ok(Proposal {
        resource_id: abi::decode_bytes32(head(0)?)?,
        data_hash: abi::decode_bytes32(head(1)?)?,
        yes_votes: abi::decode_address_array_at(data, yes_start)?,
        no_votes: abi::decode_address_array_at(data, no_start)?,
        status: ProposalStatus::from_code(abi::decode_u8(head(4)?)?),
        proposed_block: abi::decode_u64(head(5)?)?,
    })
}

/// Converts a raw Deposit log into a [`DepositEvent`].
///
/// The block number must parse; the indexed arguments are optional, a log whose
/// topics cannot be decoded yields an event without arguments.
fn deposit_event_from_log(nonce: u64, log: &EvmLog) -> Result<DepositEvent> {
    let block_number = parse_quantity(&log.block_number)
        .with_context(|| format!("Deposit log {} has an invalid block number", log.transaction_hash))?;

    Ok(DepositEvent {
        nonce,
        block_number,
        args: decode_deposit_args(&log.topics),
    })
}

fn decode_deposit_args(topics: &[String]) -> Option<DepositEventArgs> {
    if topics.len() != 4 {
        return None;
    }
    let destination = abi::parse_bytes32(&topics[1]).ok()?;
    let resource_id = abi::parse_bytes32(&topics[2]).ok()?;

    Some(DepositEventArgs {
        resource_id,
        destination_chain_id: abi::decode_u8(&destination).ok()?,
    })
}
