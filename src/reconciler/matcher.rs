//! Deposit event matching
//!
//! Decides which Deposit event in the origin chain's log belongs to a nonce and
//! whether it agrees with the proposal found on the destination chain.

use super::types::{DepositEvent, OriginBlockStatus, Proposal};

/// Classifies the Deposit events found for one nonce.
///
/// A single event is checked against the proposal as-is. When several events
/// share the nonce, only those addressed to `expected_destination` are
/// considered; a lone survivor is then checked like a single event.
///
/// # Arguments
///
/// * `events` - Every Deposit event on the origin chain carrying the nonce
/// * `expected_destination` - Bridge chain ID of the destination being audited
/// * `proposal` - Proposal already fetched from the destination chain
pub fn match_deposit_event(
    events: &[DepositEvent],
    expected_destination: u8,
    proposal: &Proposal,
) -> OriginBlockStatus {
    match events {
        [] => OriginBlockStatus::NotFound,
        [event] => verify_event(event, expected_destination, proposal),
        _ => {
            let survivors: Vec<&DepositEvent> = events
                .iter()
                .filter(|event| {
                    event
                        .args
                        .is_some_and(|args| args.destination_chain_id == expected_destination)
                })
                .collect();

            match survivors.as_slice() {
                [] => OriginBlockStatus::NotFound,
                [event] => verify_event(event, expected_destination, proposal),
                many => OriginBlockStatus::Ambiguous(many.len()),
            }
        }
    }
}

fn verify_event(
    event: &DepositEvent,
    expected_destination: u8,
    proposal: &Proposal,
) -> OriginBlockStatus {
    let Some(args) = event.args else {
        return OriginBlockStatus::Unverified(event.block_number);
    };

    if args.resource_id != proposal.resource_id {
        OriginBlockStatus::ResourceMismatch {
            expected: proposal.resource_id,
            got: args.resource_id,
        }
    } else if args.destination_chain_id != expected_destination {
        OriginBlockStatus::ChainMismatch {
            expected: expected_destination,
            got: args.destination_chain_id,
        }
    } else {
        OriginBlockStatus::Resolved(event.block_number)
    }
}

/// Returns true when the matched event predates the audit window.
///
/// Only outcomes carrying a block number can fall outside the window; missing,
/// ambiguous and mismatched deposits are always reported.
pub fn is_before_cutoff(status: &OriginBlockStatus, start_origin_block: u64) -> bool {
    status
        .block_number()
        .is_some_and(|block| block < start_origin_block)
}
