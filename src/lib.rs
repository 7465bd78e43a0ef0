//! Bridge Proposal Auditor Library
//!
//! This crate audits cross-chain bridge deposits: for every pair of chains connected
//! by a bridge contract it finds deposits whose proposal on the destination chain is
//! stuck or inconsistent with the origin chain, and writes a report for manual triage.

pub mod abi;
pub mod config;
pub mod driver;
pub mod evm_client;
pub mod gateway;
pub mod reconciler;
pub mod report;

// Re-export commonly used types
pub use config::{AuditConfig, ChainConfig, ChainEndpoint, Config, ConfigError};
pub use gateway::{ChainGateway, EvmBridgeGateway};
pub use reconciler::{
    ChainPair, OriginBlockStatus, PairOutcome, ReconcileError, ReconciliationEngine,
    ReconciliationResult,
};
pub use report::{ReportGroup, ReportWriter};
