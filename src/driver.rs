//! Audit Driver
//!
//! Builds one gateway per configured chain, runs every ordered chain pair as its
//! own task and folds the pair outcomes into one report group per unordered pair.
//! A pair that fails never prevents the other pairs from being reported.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, info_span, Instrument};

use crate::config::{group_name, ChainConfig, ChainEndpoint, Config};
use crate::gateway::{ChainGateway, EvmBridgeGateway};
use crate::reconciler::{ChainPair, PairOutcome, ReconcileError, ReconciliationEngine};
use crate::report::{AuditFailure, ReportGroup, ReportWriter};

// ============================================================================
// PAIR JOBS AND REPORTS
// ============================================================================

/// Identifies one direction of the bridge in logs and reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairLabel {
    pub origin_id: String,
    pub origin_name: String,
    pub destination_id: String,
    pub destination_name: String,
}

impl PairLabel {
    pub fn new(origin: &ChainConfig, destination: &ChainConfig) -> Self {
        Self {
            origin_id: origin.id.clone(),
            origin_name: origin.name.clone(),
            destination_id: destination.id.clone(),
            destination_name: destination.name.clone(),
        }
    }

    pub fn from_endpoints(origin: &ChainEndpoint, destination: &ChainEndpoint) -> Self {
        Self {
            origin_id: origin.id.clone(),
            origin_name: origin.name.clone(),
            destination_id: destination.id.clone(),
            destination_name: destination.name.clone(),
        }
    }

    /// Report group both directions between these chains belong to
    pub fn group(&self) -> String {
        group_name(&self.origin_id, &self.destination_id)
    }
}

impl fmt::Display for PairLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.origin_name, self.destination_name)
    }
}

/// A pair ready to be scanned.
pub struct PairJob<G> {
    pub pair: ChainPair,
    pub origin: Arc<G>,
    pub destination: Arc<G>,
}

/// Outcome of one pair, successful or not.
#[derive(Debug)]
pub struct PairReport {
    pub label: PairLabel,
    pub outcome: Result<PairOutcome, ReconcileError>,
}

// ============================================================================
// RUNNING PAIRS
// ============================================================================

/// Builds EVM gateways for every chain and the jobs for every ordered pair.
///
/// Chains whose endpoint cannot be resolved produce a failed [`PairReport`] for
/// each pair they take part in; the remaining pairs are returned as jobs.
pub fn build_jobs(config: &Config) -> (Vec<PairJob<EvmBridgeGateway>>, Vec<PairReport>) {
    let gateways: BTreeMap<&str, Result<(ChainEndpoint, Arc<EvmBridgeGateway>), ReconcileError>> =
        config
            .chains
            .iter()
            .map(|chain| (chain.id.as_str(), connect_chain(chain, config)))
            .collect();

    let mut jobs = Vec::new();
    let mut failed = Vec::new();
    for (origin, destination) in config.ordered_pairs() {
        match (&gateways[origin.id.as_str()], &gateways[destination.id.as_str()]) {
            (Ok((origin_endpoint, origin_gateway)), Ok((destination_endpoint, destination_gateway))) => {
                jobs.push(PairJob {
                    pair: ChainPair::new(origin_endpoint.clone(), destination_endpoint.clone()),
                    origin: Arc::clone(origin_gateway),
                    destination: Arc::clone(destination_gateway),
                });
            }
            (origin_result, destination_result) => {
                let label = PairLabel::new(origin, destination);
                let reason = [origin_result, destination_result]
                    .into_iter()
                    .filter_map(|r| r.as_ref().err())
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join("; ");
                error!("[{}] Pair disabled by configuration error: {}", label, reason);
                failed.push(PairReport {
                    label,
                    outcome: Err(ReconcileError::Disabled(reason)),
                });
            }
        }
    }

    (jobs, failed)
}

fn connect_chain(
    chain: &ChainConfig,
    config: &Config,
) -> Result<(ChainEndpoint, Arc<EvmBridgeGateway>), ReconcileError> {
    let endpoint = chain.endpoint()?;
    let gateway = EvmBridgeGateway::new(&endpoint, &config.audit).map_err(|cause| {
        ReconcileError::Gateway {
            chain: chain.id.clone(),
            cause,
        }
    })?;
    Ok((endpoint, Arc::new(gateway)))
}

/// Runs every job as an independent task and waits for all of them.
///
/// Reports come back in job order regardless of completion order.
pub async fn run_pairs<G>(jobs: Vec<PairJob<G>>, concurrency: usize) -> Vec<PairReport>
where
    G: ChainGateway + 'static,
{
    let handles: Vec<_> = jobs
        .into_iter()
        .map(|job| {
            let label = PairLabel::from_endpoints(&job.pair.origin, &job.pair.destination);
            let span = info_span!(
                "pair",
                origin = %job.pair.origin.name,
                destination = %job.pair.destination.name
            );
            let handle = tokio::spawn(
                async move {
                    let engine = ReconciliationEngine::new(job.origin, job.destination, concurrency);
                    engine.reconcile(&job.pair).await
                }
                .instrument(span),
            );
            (label, handle)
        })
        .collect();

    let mut reports = Vec::with_capacity(handles.len());
    for (label, handle) in handles {
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(e) => Err(ReconcileError::TaskAborted(e.to_string())),
        };
        if let Err(e) = &outcome {
            error!("[{}] Pair failed: {}", label, e);
        }
        reports.push(PairReport { label, outcome });
    }
    reports
}

/// Folds pair reports into one group per unordered chain pair.
///
/// Groups are ordered by name; within a group, results keep the order of the
/// reports they came from. Failed pairs contribute a failure row without a nonce.
pub fn group_reports(reports: Vec<PairReport>) -> Vec<ReportGroup> {
    let mut groups: BTreeMap<String, ReportGroup> = BTreeMap::new();

    for report in reports {
        let name = report.label.group();
        let group = groups
            .entry(name.clone())
            .or_insert_with(|| ReportGroup::new(name));

        match report.outcome {
            Ok(outcome) => {
                group.results.extend(outcome.results);
                group
                    .failures
                    .extend(outcome.failures.into_iter().map(|failure| AuditFailure {
                        origin: report.label.origin_name.clone(),
                        destination: report.label.destination_name.clone(),
                        nonce: Some(failure.nonce),
                        error: failure.error,
                    }));
            }
            Err(e) => group.failures.push(AuditFailure {
                origin: report.label.origin_name.clone(),
                destination: report.label.destination_name.clone(),
                nonce: None,
                error: e.to_string(),
            }),
        }
    }

    groups.into_values().collect()
}

/// Summary of a full audit run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AuditSummary {
    pub groups_written: usize,
    /// Groups whose report files could not be written
    pub groups_failed: usize,
    pub results: usize,
    pub nonce_failures: usize,
    pub failed_pairs: usize,
}

impl AuditSummary {
    /// True when every pair was scanned and every report was written
    pub fn is_complete(&self) -> bool {
        self.failed_pairs == 0 && self.groups_failed == 0
    }
}

/// Audits every chain pair in `config` and writes one report per group.
pub async fn run(config: &Config) -> anyhow::Result<AuditSummary> {
    let (jobs, mut reports) = build_jobs(config);
    info!(
        "Auditing {} chain pairs ({} disabled by configuration)",
        jobs.len() + reports.len(),
        reports.len()
    );

    reports.extend(run_pairs(jobs, config.audit.concurrency).await);
    let failed_pairs = reports.iter().filter(|r| r.outcome.is_err()).count();

    info!("Collecting all data");
    let writer = ReportWriter::new(&config.audit.output_dir);
    let mut summary = write_groups(&writer, &group_reports(reports));
    summary.failed_pairs = failed_pairs;
    Ok(summary)
}

/// Writes every group, carrying on past groups that cannot be written.
pub fn write_groups(writer: &ReportWriter, groups: &[ReportGroup]) -> AuditSummary {
    let mut summary = AuditSummary::default();
    for group in groups {
        if let Err(e) = writer.write(group) {
            error!("Failed to write report group {}: {:#}", group.name, e);
            summary.groups_failed += 1;
            continue;
        }
        summary.groups_written += 1;
        summary.results += group.results.len();
        summary.nonce_failures += group.failures.iter().filter(|f| f.nonce.is_some()).count();
    }
    summary
}
