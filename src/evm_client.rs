//! EVM Client Module
//!
//! This module provides a client for communicating with EVM-compatible blockchain nodes
//! via their JSON-RPC API. It handles read-only contract calls and event log queries
//! against a single contract.

use anyhow::{Context, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::abi::{self, Address, Bytes32};

// ============================================================================
// API RESPONSE STRUCTURES
// ============================================================================

/// EVM JSON-RPC request wrapper
#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: Vec<serde_json::Value>,
    id: u64,
}

/// EVM JSON-RPC response wrapper
#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    #[allow(dead_code)]
    jsonrpc: String,
    result: Option<T>,
    error: Option<JsonRpcError>,
    #[allow(dead_code)]
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

/// EVM event log entry
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EvmLog {
    /// Address of the contract that emitted the event
    pub address: String,
    /// Array of topics (indexed event parameters)
    pub topics: Vec<String>,
    /// Event data (non-indexed parameters)
    pub data: String,
    /// Block number (JSON-RPC uses camelCase: blockNumber)
    #[serde(rename = "blockNumber")]
    pub block_number: String,
    /// Transaction hash (JSON-RPC uses camelCase: transactionHash)
    #[serde(rename = "transactionHash")]
    pub transaction_hash: String,
    /// Log index (JSON-RPC uses camelCase: logIndex)
    #[serde(rename = "logIndex")]
    pub log_index: String,
}

/// Topic filter entry: `None` matches any value at that position
pub type TopicFilter = Option<Bytes32>;

// ============================================================================
// EVM CLIENT IMPLEMENTATION
// ============================================================================

/// Client for communicating with EVM-compatible blockchain nodes via JSON-RPC
#[derive(Debug, Clone)]
pub struct EvmClient {
    /// HTTP client for making requests
    client: Client,
    /// Base URL of the EVM node (e.g., "http://127.0.0.1:8545")
    base_url: String,
    /// Contract all calls and log queries are addressed to
    contract_address: Address,
}

impl EvmClient {
    /// Creates a new EVM client for the given node URL
    ///
    /// # Arguments
    ///
    /// * `node_url` - Base URL of the EVM node (e.g., "http://127.0.0.1:8545")
    /// * `contract_address` - Address of the contract to query
    /// * `timeout` - Per-request timeout
    ///
    /// # Returns
    ///
    /// * `Ok(EvmClient)` - Successfully created client
    /// * `Err(anyhow::Error)` - Failed to create client
    pub fn new(node_url: &str, contract_address: Address, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: node_url.to_string(),
            contract_address,
        })
    }

    /// Sends one JSON-RPC request and unwraps the `result` field.
    ///
    /// A JSON-RPC `error` object is turned into an `Err`; a missing `result`
    /// deserializes as `None` so callers can decide whether that is an error.
    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<Option<T>> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: 1,
        };

        let response: JsonRpcResponse<T> = self
            .client
            .post(&self.base_url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to send {} request to {}", method, self.base_url))?
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response from {}", method, self.base_url))?;

        if let Some(error) = response.error {
            return Err(anyhow::anyhow!(
                "JSON-RPC error from {}: {} (code: {})",
                self.base_url,
                error.message,
                error.code
            ));
        }

        Ok(response.result)
    }

    /// Executes a read-only call against the contract at the latest block
    ///
    /// # Arguments
    ///
    /// * `calldata` - ABI-encoded selector and arguments
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<u8>)` - Raw return data
    /// * `Err(anyhow::Error)` - Transport, RPC or hex decoding failure
    pub async fn call(&self, calldata: &[u8]) -> Result<Vec<u8>> {
        let params = vec![
            serde_json::json!({
                "to": abi::to_hex(&self.contract_address),
                "data": abi::to_hex(calldata),
            }),
            serde_json::json!("latest"),
        ];

        let result: String = self
            .request("eth_call", params)
            .await?
            .ok_or_else(|| anyhow::anyhow!("No result in eth_call response"))?;

        abi::parse_hex(&result).context("Failed to decode eth_call return data")
    }

    /// Queries the contract's event logs
    ///
    /// # Arguments
    ///
    /// * `topics` - Topic filter; `None` entries match any value
    /// * `from_block` - First block to search
    /// * `to_block` - Last block to search ("latest" if None)
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<EvmLog>)` - Matching logs in chain order
    /// * `Err(anyhow::Error)` - Failed to query logs
    pub async fn get_logs(
        &self,
        topics: &[TopicFilter],
        from_block: u64,
        to_block: Option<u64>,
    ) -> Result<Vec<EvmLog>> {
        let topics: Vec<serde_json::Value> = topics
            .iter()
            .map(|topic| match topic {
                Some(value) => serde_json::json!(abi::to_hex(value)),
                None => serde_json::Value::Null,
            })
            .collect();

        let to_block_str = to_block
            .map(|n| format!("0x{:x}", n))
            .unwrap_or_else(|| "latest".to_string());

        let filter = serde_json::json!({
            "address": abi::to_hex(&self.contract_address),
            "topics": topics,
            "fromBlock": format!("0x{:x}", from_block),
            "toBlock": to_block_str,
        });

        let logs: Option<Vec<EvmLog>> = self.request("eth_getLogs", vec![filter]).await?;
        Ok(logs.unwrap_or_default())
    }

    /// Gets the current block number
    ///
    /// # Returns
    ///
    /// * `Ok(u64)` - Current block number
    /// * `Err(anyhow::Error)` - Failed to query block number
    pub async fn get_block_number(&self) -> Result<u64> {
        let block_number_hex: String = self
            .request("eth_blockNumber", vec![])
            .await?
            .ok_or_else(|| anyhow::anyhow!("No result in eth_blockNumber response"))?;

        parse_quantity(&block_number_hex).context("Failed to parse block number")
    }
}

/// Parses a JSON-RPC hex quantity such as "0x1b4"
pub fn parse_quantity(value: &str) -> Result<u64> {
    u64::from_str_radix(value.strip_prefix("0x").unwrap_or(value), 16)
        .with_context(|| format!("Invalid hex quantity: {}", value))
}
