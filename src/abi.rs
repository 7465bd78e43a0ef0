//! Solidity ABI Helpers
//!
//! Word-level codec for the handful of bridge contract calls the auditor makes.
//! Every static value occupies one 32-byte big-endian word; dynamic values
//! (`bytes`, `address[]`, tuples containing them) are reached through offsets
//! that are relative to the start of the enclosing tuple.

use anyhow::{Context, Result};
use sha3::{Digest, Keccak256};

/// 20-byte EVM account or contract address
pub type Address = [u8; 20];

/// 32-byte word (resource IDs, data hashes, event topics)
pub type Bytes32 = [u8; 32];

/// Size of one ABI word in bytes
pub const WORD: usize = 32;

/// All-zero word; a proposal carrying this resource ID does not exist
pub const ZERO_BYTES32: Bytes32 = [0u8; WORD];

// ============================================================================
// HASHING
// ============================================================================

/// Computes keccak256 over arbitrary bytes
pub fn keccak256(data: &[u8]) -> Bytes32 {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Returns the 4-byte function selector for a canonical signature such as
/// `"_depositCounts(uint8)"`.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Returns topic 0 for a canonical event signature.
///
/// Indexed parameters do not change the signature, only the types matter.
pub fn event_topic(signature: &str) -> Bytes32 {
    keccak256(signature.as_bytes())
}

/// Computes the key under which a destination bridge stores a proposal.
///
/// The bridge hashes the Solidity packed encoding of the destination handler
/// address followed by the raw deposit record, i.e.
/// `keccak256(abi.encodePacked(handler, record))`.
///
/// # Arguments
///
/// * `handler` - Handler contract address on the destination chain
/// * `record` - Raw deposit record bytes read from the origin chain
///
/// # Returns
///
/// The 32-byte lookup hash passed to `getProposal`
pub fn proposal_lookup_hash(handler: &Address, record: &[u8]) -> Bytes32 {
    let mut packed = Vec::with_capacity(handler.len() + record.len());
    packed.extend_from_slice(handler);
    packed.extend_from_slice(record);
    keccak256(&packed)
}

// ============================================================================
// ENCODING
// ============================================================================

/// Left-pads an unsigned integer into one ABI word
pub fn encode_uint(value: u64) -> Bytes32 {
    let mut word = ZERO_BYTES32;
    word[WORD - 8..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Left-pads an address into one ABI word
pub fn encode_address(address: &Address) -> Bytes32 {
    let mut word = ZERO_BYTES32;
    word[WORD - 20..].copy_from_slice(address);
    word
}

/// Builds calldata for a function whose arguments are all static words.
pub fn encode_call(signature: &str, args: &[Bytes32]) -> Vec<u8> {
    let mut calldata = Vec::with_capacity(4 + args.len() * WORD);
    calldata.extend_from_slice(&selector(signature));
    for arg in args {
        calldata.extend_from_slice(arg);
    }
    calldata
}

// ============================================================================
// DECODING
// ============================================================================

/// Returns the word starting at byte `offset`
pub fn word_at(data: &[u8], offset: usize) -> Result<&[u8]> {
    offset
        .checked_add(WORD)
        .and_then(|end| data.get(offset..end))
        .with_context(|| {
            format!(
                "ABI data too short: need word at offset {} but only {} bytes available",
                offset,
                data.len()
            )
        })
}

/// Decodes an unsigned integer word that must fit in a `u64`
pub fn decode_u64(word: &[u8]) -> Result<u64> {
    if word.len() != WORD {
        anyhow::bail!("ABI word must be {} bytes, got {}", WORD, word.len());
    }
    if word[..WORD - 8].iter().any(|b| *b != 0) {
        anyhow::bail!("ABI value 0x{} does not fit in u64", hex::encode(word));
    }
    let mut tail = [0u8; 8];
    tail.copy_from_slice(&word[WORD - 8..]);
    Ok(u64::from_be_bytes(tail))
}

/// Decodes an unsigned integer word that must fit in a `u8` (bridge chain IDs, enums)
pub fn decode_u8(word: &[u8]) -> Result<u8> {
    let value = decode_u64(word)?;
    u8::try_from(value).with_context(|| format!("ABI value {} does not fit in u8", value))
}

/// Decodes an offset or length word
fn decode_usize(word: &[u8]) -> Result<usize> {
    let value = decode_u64(word)?;
    usize::try_from(value).with_context(|| format!("ABI offset {} does not fit in usize", value))
}

/// Decodes a left-padded address word
pub fn decode_address(word: &[u8]) -> Result<Address> {
    if word.len() != WORD {
        anyhow::bail!("ABI word must be {} bytes, got {}", WORD, word.len());
    }
    if word[..WORD - 20].iter().any(|b| *b != 0) {
        anyhow::bail!("ABI word 0x{} is not a padded address", hex::encode(word));
    }
    let mut address = [0u8; 20];
    address.copy_from_slice(&word[WORD - 20..]);
    Ok(address)
}

/// Copies one word into a fixed array
pub fn decode_bytes32(word: &[u8]) -> Result<Bytes32> {
    word.try_into()
        .with_context(|| format!("ABI word must be {} bytes, got {}", WORD, word.len()))
}

/// Follows the offset stored at `head` (relative to `base`) and returns the
/// absolute position of the dynamic value it points at.
pub fn follow_offset(data: &[u8], base: usize, head: usize) -> Result<usize> {
    let relative = decode_usize(word_at(data, head)?)?;
    base.checked_add(relative)
        .context("ABI offset overflows")
}

/// Decodes a dynamic `bytes` value whose length word sits at `start`
pub fn decode_bytes_at(data: &[u8], start: usize) -> Result<Vec<u8>> {
    let len = decode_usize(word_at(data, start)?)?;
    let body = start + WORD;
    body.checked_add(len)
        .and_then(|end| data.get(body..end))
        .map(|bytes| bytes.to_vec())
        .with_context(|| format!("ABI bytes value of length {} runs past end of data", len))
}

/// Decodes the return data of a function returning a single `bytes` value
pub fn decode_bytes_return(data: &[u8]) -> Result<Vec<u8>> {
    let start = follow_offset(data, 0, 0)?;
    decode_bytes_at(data, start)
}

/// Decodes an `address[]` whose length word sits at `start`
pub fn decode_address_array_at(data: &[u8], start: usize) -> Result<Vec<Address>> {
    let len = decode_usize(word_at(data, start)?)?;
    (0..len)
        .map(|i| decode_address(word_at(data, start + WORD * (i + 1))?))
        .collect()
}

// ============================================================================
// HEX FORMATTING
// ============================================================================

/// Formats bytes as a 0x-prefixed lowercase hex string
pub fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Parses a 0x-prefixed (or bare) hex string into bytes
pub fn parse_hex(value: &str) -> Result<Vec<u8>> {
    let trimmed = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(trimmed).with_context(|| format!("Invalid hex string: {}", value))
}

/// Parses a 20-byte hex address
pub fn parse_address(value: &str) -> Result<Address> {
    let bytes = parse_hex(value)?;
    bytes
        .as_slice()
        .try_into()
        .with_context(|| format!("Address {} must be 20 bytes, got {}", value, bytes.len()))
}

/// Parses a 32-byte hex word
pub fn parse_bytes32(value: &str) -> Result<Bytes32> {
    let bytes = parse_hex(value)?;
    decode_bytes32(&bytes)
}

/// Formats an address with the EIP-55 mixed-case checksum
pub fn checksum_address(address: &Address) -> String {
    let lower = hex::encode(address);
    let hash = keccak256(lower.as_bytes());

    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = if i % 2 == 0 {
            hash[i / 2] >> 4
        } else {
            hash[i / 2] & 0x0f
        };
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}
