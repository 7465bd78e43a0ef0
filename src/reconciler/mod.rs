//! Reconciliation Module
//!
//! Scans every deposit nonce of one (origin, destination) pair and reports the
//! deposits whose proposal exists on the destination chain but was never executed.
//!
//! For each nonce the engine reads the deposit record on the origin chain, derives
//! the proposal lookup hash, reads the proposal on the destination chain and, when
//! the proposal is stuck, locates the matching Deposit event on the origin chain.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::abi;
use crate::config::ChainEndpoint;
use crate::gateway::ChainGateway;

pub mod matcher;
pub mod types;

pub use matcher::{is_before_cutoff, match_deposit_event};
pub use types::{
    Deposit, DepositEvent, DepositEventArgs, NonceFailure, OriginBlockStatus, Proposal,
    ProposalStatus, ReconciliationResult,
};

/// Nonces inspected concurrently per pair unless configured otherwise
pub const DEFAULT_CONCURRENCY: usize = 4;

// ============================================================================
// PAIR DEFINITION AND OUTCOME
// ============================================================================

/// One direction of the bridge between two chains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainPair {
    pub origin: ChainEndpoint,
    pub destination: ChainEndpoint,
    /// Deposits whose origin event is older than this block are not reported
    pub start_origin_block: u64,
}

impl ChainPair {
    /// Builds the pair, taking the cutoff from the origin chain's configuration
    pub fn new(origin: ChainEndpoint, destination: ChainEndpoint) -> Self {
        let start_origin_block = origin.start_block;
        Self {
            origin,
            destination,
            start_origin_block,
        }
    }
}

/// Everything the engine learned about one pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairOutcome {
    /// Number of nonces scanned
    pub total_deposits: u64,
    /// Reportable deposits, sorted by nonce
    pub results: Vec<ReconciliationResult>,
    /// Nonces that could not be classified, sorted by nonce
    pub failures: Vec<NonceFailure>,
}

/// Failures that abort a whole pair.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error("failed to set up gateway for {chain}: {cause:#}")]
    Gateway { chain: String, cause: anyhow::Error },

    #[error("failed to read deposit count from {origin}: {cause:#}")]
    DepositCount { origin: String, cause: anyhow::Error },

    #[error("destination {destination} is unreachable: {cause:#}")]
    DestinationUnreachable {
        destination: String,
        cause: anyhow::Error,
    },

    #[error("pair disabled: {0}")]
    Disabled(String),

    #[error("pair task aborted: {0}")]
    TaskAborted(String),
}

// ============================================================================
// RECONCILIATION ENGINE
// ============================================================================

/// Scans one chain pair through a bounded pool of concurrent nonce lookups.
pub struct ReconciliationEngine<G> {
    origin: Arc<G>,
    destination: Arc<G>,
    concurrency: usize,
}

impl<G: ChainGateway> ReconciliationEngine<G> {
    /// Creates an engine over the origin and destination gateways.
    ///
    /// A `concurrency` of zero is raised to one.
    pub fn new(origin: Arc<G>, destination: Arc<G>, concurrency: usize) -> Self {
        Self {
            origin,
            destination,
            concurrency: concurrency.max(1),
        }
    }

    /// Reconciles every deposit nonce of `pair`.
    ///
    /// Per-nonce gateway failures are collected in [`PairOutcome::failures`] and do
    /// not stop the scan. Only failing to reach either chain up front aborts the pair.
    ///
    /// # Returns
    ///
    /// * `Ok(PairOutcome)` - Results and failures for every nonce in `[0, count)`
    /// * `Err(ReconcileError)` - The pair could not be scanned at all
    pub async fn reconcile(&self, pair: &ChainPair) -> Result<PairOutcome, ReconcileError> {
        let total_deposits = self
            .origin
            .deposit_count(pair.destination.chain_id)
            .await
            .map_err(|cause| ReconcileError::DepositCount {
                origin: pair.origin.name.clone(),
                cause,
            })?;

        self.destination
            .latest_block()
            .await
            .map_err(|cause| ReconcileError::DestinationUnreachable {
                destination: pair.destination.name.clone(),
                cause,
            })?;

        info!("Searching through {} deposits", total_deposits);

        let shared_pair = Arc::new(pair.clone());
        let outcomes: Vec<(u64, anyhow::Result<Option<ReconciliationResult>>)> =
            stream::iter(0..total_deposits)
                .map(|nonce| {
                    let origin = Arc::clone(&self.origin);
                    let destination = Arc::clone(&self.destination);
                    let pair = Arc::clone(&shared_pair);
                    async move {
                        let result = inspect_nonce(&*origin, &*destination, &pair, nonce).await;
                        (nonce, result)
                    }
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

        let mut outcome = PairOutcome {
            total_deposits,
            ..Default::default()
        };
        for (nonce, result) in outcomes {
            match result {
                Ok(Some(report)) => outcome.results.push(report),
                Ok(None) => {}
                Err(e) => {
                    warn!(nonce, "Nonce could not be inspected: {:#}", e);
                    outcome.failures.push(NonceFailure {
                        nonce,
                        error: format!("{:#}", e),
                    });
                }
            }
        }
        outcome.results.sort_by_key(|r| r.nonce);
        outcome.failures.sort_by_key(|f| f.nonce);

        info!(
            "Finished: {} reportable, {} failed out of {} deposits",
            outcome.results.len(),
            outcome.failures.len(),
            total_deposits
        );
        Ok(outcome)
    }
}

/// Classifies a single nonce; `Ok(None)` means nothing to report.
async fn inspect_nonce<G: ChainGateway>(
    origin: &G,
    destination: &G,
    pair: &ChainPair,
    nonce: u64,
) -> anyhow::Result<Option<ReconciliationResult>> {
    debug!(nonce, "Grabbing deposit record");
    let deposit = Deposit {
        nonce,
        destination_chain_id: pair.destination.chain_id,
        record: origin
            .deposit_record(nonce, pair.destination.chain_id)
            .await?,
    };

    let lookup_hash = abi::proposal_lookup_hash(&pair.destination.handler_address, &deposit.record);
    debug!(nonce, hash = %abi::to_hex(&lookup_hash), "Grabbing proposal");
    let proposal = destination
        .proposal(pair.origin.chain_id, nonce, lookup_hash)
        .await?;

    if !proposal.exists() {
        debug!(nonce, "No proposal found, skipping");
        return Ok(None);
    }
    if proposal.status.is_resolved() {
        debug!(nonce, "Proposal executed, skipping");
        return Ok(None);
    }

    debug!(nonce, "Grabbing Deposit events");
    let events = origin.deposit_events(nonce).await?;
    let origin_block = match_deposit_event(&events, deposit.destination_chain_id, &proposal);

    if is_before_cutoff(&origin_block, pair.start_origin_block) {
        debug!(
            nonce,
            "Deposit event occurred before block {}, skipping", pair.start_origin_block
        );
        return Ok(None);
    }

    info!(
        nonce,
        status = proposal.status.code(),
        "Proposal not executed: {}",
        origin_block
    );
    Ok(Some(ReconciliationResult::new(
        &pair.origin.name,
        &pair.destination.name,
        nonce,
        &proposal,
        origin_block,
    )))
}
