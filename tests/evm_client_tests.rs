//! Unit tests for the EVM JSON-RPC client
//!
//! These tests run the client against a mock JSON-RPC server and verify the
//! request bodies it sends and how responses and RPC errors are handled.

use std::time::Duration;

use proposal_auditor::abi;
use proposal_auditor::evm_client::{parse_quantity, EvmClient};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[path = "mod.rs"]
mod test_helpers;
use test_helpers::{rpc_hex_result, rpc_result, DUMMY_BRIDGE_ADDR};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Start a mock server and a client addressed to the dummy bridge contract
async fn setup() -> (MockServer, EvmClient) {
    let mock_server = MockServer::start().await;
    let client = EvmClient::new(
        &mock_server.uri(),
        abi::parse_address(DUMMY_BRIDGE_ADDR).unwrap(),
        Duration::from_secs(5),
    )
    .expect("Failed to create EvmClient");
    (mock_server, client)
}

/// Body of the single request received by the mock server
async fn only_request_body(mock_server: &MockServer) -> serde_json::Value {
    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    serde_json::from_slice(&requests[0].body).unwrap()
}

// ============================================================================
// TESTS
// ============================================================================

/// Test that eth_call sends the contract address and calldata and decodes the result
#[tokio::test]
async fn test_call_success() {
    let (mock_server, client) = setup().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_call" })))
        .respond_with(rpc_hex_result(&[0xca, 0xfe]))
        .mount(&mock_server)
        .await;

    let data = client.call(&[0x12, 0x34]).await.expect("call should succeed");
    assert_eq!(data, vec![0xca, 0xfe]);

    let body = only_request_body(&mock_server).await;
    assert_eq!(body["params"][0]["to"], json!(DUMMY_BRIDGE_ADDR));
    assert_eq!(body["params"][0]["data"], json!("0x1234"));
    assert_eq!(body["params"][1], json!("latest"));
}

/// Test that a JSON-RPC error object is turned into an error
/// Why: A reverted call must never be mistaken for empty return data
#[tokio::test]
async fn test_call_rpc_error() {
    let (mock_server, client) = setup().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "error": { "code": -32000, "message": "execution reverted" },
            "id": 1
        })))
        .mount(&mock_server)
        .await;

    let err = client.call(&[0x00]).await.unwrap_err();
    assert!(err.to_string().contains("execution reverted"), "got: {}", err);
}

/// Test that a non-JSON response body is reported as a parse failure
#[tokio::test]
async fn test_call_invalid_response() {
    let (mock_server, client) = setup().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&mock_server)
        .await;

    let err = client.call(&[0x00]).await.unwrap_err();
    assert!(err.to_string().contains("Failed to parse eth_call response"), "got: {}", err);
}

/// Test that eth_blockNumber is parsed from its hex quantity
#[tokio::test]
async fn test_get_block_number() {
    let (mock_server, client) = setup().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_blockNumber" })))
        .respond_with(rpc_result(json!("0x1b4")))
        .mount(&mock_server)
        .await;

    assert_eq!(client.get_block_number().await.unwrap(), 436);
}

/// Test the eth_getLogs filter built from topics and block range
/// Why: Wildcard topics must be sent as null to match any value
#[tokio::test]
async fn test_get_logs_filter() {
    let (mock_server, client) = setup().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_getLogs" })))
        .respond_with(rpc_result(json!([{
            "address": DUMMY_BRIDGE_ADDR,
            "topics": ["0x01"],
            "data": "0x",
            "blockNumber": "0x10",
            "transactionHash": "0xabc",
            "logIndex": "0x0"
        }])))
        .mount(&mock_server)
        .await;

    let topic = [0x11u8; 32];
    let logs = client
        .get_logs(&[Some(topic), None], 256, None)
        .await
        .expect("get_logs should succeed");

    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].block_number, "0x10");

    let body = only_request_body(&mock_server).await;
    let filter = &body["params"][0];
    assert_eq!(filter["address"], json!(DUMMY_BRIDGE_ADDR));
    assert_eq!(filter["topics"], json!([abi::to_hex(&topic), null]));
    assert_eq!(filter["fromBlock"], json!("0x100"));
    assert_eq!(filter["toBlock"], json!("latest"));
}

/// Test that a null eth_getLogs result is treated as no logs
#[tokio::test]
async fn test_get_logs_null_result() {
    let (mock_server, client) = setup().await;
    Mock::given(method("POST"))
        .respond_with(rpc_result(json!(null)))
        .mount(&mock_server)
        .await;

    let logs = client.get_logs(&[], 0, Some(10)).await.unwrap();
    assert!(logs.is_empty());
}

/// Test hex quantity parsing
#[test]
fn test_parse_quantity() {
    assert_eq!(parse_quantity("0x0").unwrap(), 0);
    assert_eq!(parse_quantity("0xff").unwrap(), 255);
    assert!(parse_quantity("0xzz").is_err());
}
