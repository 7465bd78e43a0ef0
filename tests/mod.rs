//! Test module organization
//!
//! This module re-exports test helpers for use in test files.

mod helpers;

#[allow(unused_imports)]
pub use helpers::{
    chain_config, deposit_event, encode_bytes_return, encode_proposal_return, endpoint,
    eth_to_mtr, missing_proposal, proposal, record_for, rpc_hex_result, rpc_result,
    three_chain_config, MockGateway, BSC_CHAIN_ID, DUMMY_BRIDGE_ADDR, DUMMY_HANDLER,
    DUMMY_RELAYER_A, DUMMY_RELAYER_B, DUMMY_RESOURCE_ID, ETH_CHAIN_ID, MTR_CHAIN_ID,
};
