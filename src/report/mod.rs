//! Report Module
//!
//! Writes the findings of one report group (both directions between two chains)
//! to `<output_dir>/<group>.json` and `<output_dir>/<group>.csv`. Deposits that
//! could not be classified go to `<output_dir>/<group>.failures.json`.
//! Existing files are overwritten on every run.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::reconciler::ReconciliationResult;

/// CSV column titles, in output order
pub const CSV_HEADERS: [&str; 11] = [
    "Origin",
    "Destination",
    "Resource ID",
    "Data Hash",
    "Yes Vote Count",
    "No Vote Count",
    "Yes Votes",
    "No Votes",
    "Status",
    "Proposed Block",
    "Deposit Block Number",
];

// ============================================================================
// REPORT DATA
// ============================================================================

/// A deposit or pair that could not be audited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditFailure {
    pub origin: String,
    pub destination: String,
    /// `None` when the whole pair failed
    pub nonce: Option<u64>,
    pub error: String,
}

/// Everything reported for one unordered chain pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportGroup {
    /// File stem, e.g. "eth-mtr"
    pub name: String,
    pub results: Vec<ReconciliationResult>,
    pub failures: Vec<AuditFailure>,
}

impl ReportGroup {
    pub fn new(name: String) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }
}

/// Paths written for one group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenReport {
    pub json: PathBuf,
    pub csv: PathBuf,
    pub failures: Option<PathBuf>,
}

// ============================================================================
// REPORT WRITER
// ============================================================================

/// Writes report groups below a fixed output directory.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    output_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    /// Writes the JSON and CSV reports (and the failures file, if any) for `group`.
    ///
    /// # Returns
    ///
    /// * `Ok(WrittenReport)` - Paths of the files written
    /// * `Err(anyhow::Error)` - The output directory or a file could not be written
    pub fn write(&self, group: &ReportGroup) -> Result<WrittenReport> {
        fs::create_dir_all(&self.output_dir).with_context(|| {
            format!(
                "Failed to create output directory {}",
                self.output_dir.display()
            )
        })?;

        let json = self.output_dir.join(format!("{}.json", group.name));
        info!("Writing {} JSON file", json.display());
        write_json(&json, &group.results)?;

        let csv = self.output_dir.join(format!("{}.csv", group.name));
        info!("Writing {} CSV file", csv.display());
        write_csv(&csv, &group.results)?;

        let failures = if group.failures.is_empty() {
            None
        } else {
            let path = self.output_dir.join(format!("{}.failures.json", group.name));
            info!(
                "Writing {} ({} failures)",
                path.display(),
                group.failures.len()
            );
            write_json(&path, &group.failures)?;
            Some(path)
        };

        Ok(WrittenReport {
            json,
            csv,
            failures,
        })
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize report")?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

/// Writes results as CSV; the header row is written even when there are no results.
fn write_csv(path: &Path, results: &[ReconciliationResult]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    writer.write_record(CSV_HEADERS)?;
    for result in results {
        writer.write_record(csv_row(result))?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))
}

fn csv_row(result: &ReconciliationResult) -> [String; 11] {
    [
        result.origin.clone(),
        result.destination.clone(),
        crate::abi::to_hex(&result.resource_id),
        crate::abi::to_hex(&result.data_hash),
        result.yes_vote_count.to_string(),
        result.no_vote_count.to_string(),
        result.yes_votes.clone(),
        result.no_votes.clone(),
        result.status.code().to_string(),
        result.proposed_block.to_string(),
        result.origin_block.to_string(),
    ]
}
