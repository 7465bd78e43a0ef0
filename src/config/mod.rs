//! Configuration Management Module
//!
//! This module handles loading and validating configuration for the proposal auditor.
//! Configuration lists every chain that participates in the bridge (RPC endpoint,
//! bridge and handler contracts, bridge chain ID) plus run-wide audit settings.
//! Chain pairs are derived from the chain list, never declared by hand.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::abi::{self, Address};
use crate::reconciler::DEFAULT_CONCURRENCY;

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/auditor.toml";

/// Environment variable that overrides the configuration file location
pub const CONFIG_PATH_ENV: &str = "AUDITOR_CONFIG_PATH";

/// Dotenv file read at startup, typically holding the `rpc_url_env` variables
pub const DEFAULT_ENV_FILE: &str = ".env";

// ============================================================================
// CONFIGURATION STRUCTURES
// ============================================================================

/// Main configuration structure containing all auditor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Every chain connected by the bridge
    pub chains: Vec<ChainConfig>,
    /// Run-wide audit settings (output location, concurrency, RPC behaviour)
    #[serde(default)]
    pub audit: AuditConfig,
}

/// Configuration for one chain connected by the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Short identifier used in report file names (e.g. "eth")
    pub id: String,
    /// Human-readable name used in report rows (e.g. "Ethereum")
    pub name: String,
    /// Bridge chain ID (the contract stores it as uint8)
    pub chain_id: u8,
    /// RPC endpoint URL; takes precedence over `rpc_url_env`
    #[serde(default)]
    pub rpc_url: Option<String>,
    /// Name of the environment variable holding the RPC endpoint URL
    #[serde(default)]
    pub rpc_url_env: Option<String>,
    /// Address of the bridge contract on this chain
    pub bridge_address: String,
    /// Address of the handler contract on this chain
    pub handler_address: String,
    /// Deposits whose origin event is older than this block are not reported
    /// when this chain is the origin
    #[serde(default)]
    pub start_block: u64,
    /// First block searched for Deposit events (0 scans the whole history)
    #[serde(default)]
    pub deployment_block: u64,
}

/// Run-wide audit settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Directory reports are written to
    pub output_dir: String,
    /// Maximum number of nonces inspected concurrently per chain pair
    pub concurrency: usize,
    /// Timeout for a single RPC request in milliseconds
    pub request_timeout_ms: u64,
    /// Number of times a failed RPC call is retried
    pub max_retries: u32,
    /// Base delay between retries in milliseconds (multiplied by the attempt number)
    pub retry_backoff_ms: u64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            output_dir: "result".to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            request_timeout_ms: 30_000,
            max_retries: 2,
            retry_backoff_ms: 500,
        }
    }
}

impl AuditConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

// ============================================================================
// RESOLVED ENDPOINTS
// ============================================================================

/// A chain's configuration after every field has been parsed and checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEndpoint {
    pub id: String,
    pub name: String,
    pub chain_id: u8,
    pub rpc_url: Url,
    pub bridge_address: Address,
    pub handler_address: Address,
    pub start_block: u64,
    pub deployment_block: u64,
}

/// Errors raised while resolving a single chain's endpoint.
///
/// These only disable the chain pairs that involve the affected chain.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("chain '{chain}' has neither rpc_url nor rpc_url_env configured")]
    MissingRpcUrl { chain: String },

    #[error("chain '{chain}' reads its RPC URL from ${var}, which is not set")]
    MissingEnvVar { chain: String, var: String },

    #[error("chain '{chain}' has an invalid RPC URL '{url}': {reason}")]
    InvalidUrl {
        chain: String,
        url: String,
        reason: url::ParseError,
    },

    #[error("chain '{chain}' has an invalid {field} '{value}'")]
    InvalidAddress {
        chain: String,
        field: &'static str,
        value: String,
    },
}

impl ChainConfig {
    /// Resolves the RPC URL and contract addresses of this chain.
    ///
    /// # Returns
    ///
    /// * `Ok(ChainEndpoint)` - Every field parsed
    /// * `Err(ConfigError)` - Missing or malformed endpoint data
    pub fn endpoint(&self) -> Result<ChainEndpoint, ConfigError> {
        let raw_url = match (&self.rpc_url, &self.rpc_url_env) {
            (Some(url), _) => url.clone(),
            (None, Some(var)) => std::env::var(var).map_err(|_| ConfigError::MissingEnvVar {
                chain: self.id.clone(),
                var: var.clone(),
            })?,
            (None, None) => {
                return Err(ConfigError::MissingRpcUrl {
                    chain: self.id.clone(),
                })
            }
        };

        let rpc_url = Url::parse(&raw_url).map_err(|reason| ConfigError::InvalidUrl {
            chain: self.id.clone(),
            url: raw_url.clone(),
            reason,
        })?;

        Ok(ChainEndpoint {
            id: self.id.clone(),
            name: self.name.clone(),
            chain_id: self.chain_id,
            rpc_url,
            bridge_address: self.parse_address("bridge_address", &self.bridge_address)?,
            handler_address: self.parse_address("handler_address", &self.handler_address)?,
            start_block: self.start_block,
            deployment_block: self.deployment_block,
        })
    }

    fn parse_address(&self, field: &'static str, value: &str) -> Result<Address, ConfigError> {
        abi::parse_address(value).map_err(|_| ConfigError::InvalidAddress {
            chain: self.id.clone(),
            field,
            value: value.to_string(),
        })
    }
}

// ============================================================================
// CONFIGURATION LOADING AND MANAGEMENT
// ============================================================================

impl Config {
    /// Loads configuration from the TOML file.
    ///
    /// The path is taken from `path` when given, else from `AUDITOR_CONFIG_PATH`,
    /// else `config/auditor.toml`.
    ///
    /// # Returns
    ///
    /// - `Ok(Config)` - Successfully loaded and validated configuration
    /// - `Err(anyhow::Error)` - Failed to load configuration or file doesn't exist
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        let config_path = match path {
            Some(p) => p.to_string(),
            None => std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string()),
        };

        if std::path::Path::new(&config_path).exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_toml_str(&content)
        } else {
            Err(anyhow::anyhow!(
                "Configuration file '{}' not found. Please copy the template:\n\
                cp config/auditor.template.toml config/auditor.toml\n\
                Then edit config/auditor.toml with your actual values.",
                config_path
            ))
        }
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants that span the whole file.
    ///
    /// Per-chain endpoint problems are deliberately left to [`ChainConfig::endpoint`]
    /// so that one broken chain does not stop the others from being audited.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.chains.len() < 2 {
            anyhow::bail!(
                "At least two chains are required to form a bridge pair, got {}",
                self.chains.len()
            );
        }

        let mut ids = HashSet::new();
        let mut chain_ids = HashSet::new();
        for chain in &self.chains {
            if chain.id.is_empty() {
                anyhow::bail!("Chain '{}' has an empty id", chain.name);
            }
            if !ids.insert(chain.id.as_str()) {
                anyhow::bail!("Duplicate chain id '{}'", chain.id);
            }
            if !chain_ids.insert(chain.chain_id) {
                anyhow::bail!(
                    "Duplicate bridge chain_id {} (chain '{}')",
                    chain.chain_id,
                    chain.id
                );
            }
        }

        if self.audit.concurrency == 0 {
            anyhow::bail!("audit.concurrency must be at least 1");
        }

        Ok(())
    }

    /// Returns every ordered (origin, destination) pair of distinct chains,
    /// in configuration order.
    pub fn ordered_pairs(&self) -> Vec<(&ChainConfig, &ChainConfig)> {
        self.chains
            .iter()
            .flat_map(|origin| {
                self.chains
                    .iter()
                    .filter(move |destination| destination.id != origin.id)
                    .map(move |destination| (origin, destination))
            })
            .collect()
    }
}

/// Loads variables from a dotenv file into the process environment.
///
/// Variables already set in the environment win. Returns false when the file
/// does not exist or cannot be parsed.
pub fn load_env_file(path: impl AsRef<std::path::Path>) -> bool {
    dotenvy::from_path(path.as_ref()).is_ok()
}

/// Name of the report group covering both directions between two chains.
///
/// Independent of argument order, so `group_name("mtr", "eth") == "eth-mtr"`.
pub fn group_name(a: &str, b: &str) -> String {
    if a <= b {
        format!("{}-{}", a, b)
    } else {
        format!("{}-{}", b, a)
    }
}
