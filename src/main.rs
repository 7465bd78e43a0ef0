//! Bridge Proposal Auditor
//!
//! Scans every deposit made through the bridge between each pair of configured
//! chains and reports the deposits whose proposal on the destination chain was
//! never executed, together with what the origin chain's event log says about them.
//!
//! ## Overview
//!
//! For every ordered chain pair the auditor:
//! 1. Reads the number of deposits made towards the destination
//! 2. Looks up each deposit's proposal on the destination chain
//! 3. Cross-checks stuck proposals against the origin chain's Deposit events
//! 4. Writes JSON and CSV reports grouped per pair of chains
//!
//! The auditor only reads chain state; it never submits transactions.

use anyhow::Result;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use proposal_auditor::config::{self, Config, CONFIG_PATH_ENV, DEFAULT_ENV_FILE};
use proposal_auditor::driver;

// ============================================================================
// MAIN APPLICATION ENTRY POINT
// ============================================================================

/// Main application entry point.
///
/// This function:
/// 1. Loads `.env` (if present) and initializes logging and tracing
/// 2. Loads configuration from TOML file
/// 3. Audits every chain pair
/// 4. Writes the reports and exits non-zero if any pair failed
#[tokio::main]
async fn main() -> Result<()> {
    let env_file_loaded = config::load_env_file(DEFAULT_ENV_FILE);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        println!("Bridge Proposal Auditor");
        println!();
        println!("Usage: proposal-auditor [OPTIONS]");
        println!();
        println!("Options:");
        println!("  --config <path>   Use custom config file path");
        println!("  --help, -h        Show this help message");
        println!();
        println!("Environment variables:");
        println!("  {}     Path to config file (used when --config is absent)", CONFIG_PATH_ENV);
        println!("  RUST_LOG                Log filter (default: info)");
        println!();
        println!("Variables named by rpc_url_env may also be set in {}.", DEFAULT_ENV_FILE);
        return Ok(());
    }

    let config_path = args
        .iter()
        .position(|arg| arg == "--config")
        .and_then(|i| args.get(i + 1))
        .map(String::as_str);

    info!("Starting Bridge Proposal Auditor");
    if env_file_loaded {
        info!("Loaded environment from {}", DEFAULT_ENV_FILE);
    }
    let config = Config::load(config_path)?;
    info!(
        "Configuration loaded: {} chains, output directory '{}'",
        config.chains.len(),
        config.audit.output_dir
    );

    let summary = driver::run(&config).await?;
    info!(
        "Wrote {} report groups with {} results ({} nonces could not be inspected)",
        summary.groups_written, summary.results, summary.nonce_failures
    );

    if !summary.is_complete() {
        error!(
            "{} chain pairs failed (see the .failures.json reports), {} report groups could not be written",
            summary.failed_pairs, summary.groups_failed
        );
        anyhow::bail!(
            "{} chain pairs failed, {} report groups not written",
            summary.failed_pairs,
            summary.groups_failed
        );
    }

    Ok(())
}
