use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{GENESIS_DETAILS, GENESIS_PREVIOUS_HASH, GENESIS_TIMESTAMP};
use crate::record::Record;

/// A single block in the chain holding a sealed batch of records.
///
/// Field names on the wire follow the peer protocol (`transactions`,
/// `previousHash`), so a block decoded from a peer hashes exactly like the
/// one that was sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub index: u64,
    pub timestamp: String, // RFC 3339 (UTC), advisory only
    #[serde(rename = "transactions")]
    pub records: Vec<Record>,
    pub previous_hash: String,
    pub hash: String, // Cached hash of the block
    pub nonce: u64,   // Proof-of-Work nonce
}

impl Block {
    /// The genesis block: fixed sentinel record, timestamp and nonce, so every
    /// node builds the same base block.
    pub fn genesis() -> Self {
        let mut block = Self {
            index: 0,
            timestamp: GENESIS_TIMESTAMP.to_string(),
            records: vec![Record::new(0.0, GENESIS_DETAILS)],
            previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
            hash: String::new(),
            nonce: 0,
        };
        block.hash = block.compute_hash();
        block
    }

    /// Create an unsealed successor of `predecessor`, stamped with the current
    /// time and `nonce = 0`. The cached hash is computed but not mined.
    pub fn next(predecessor: &Block, records: Vec<Record>) -> Self {
        let mut block = Self {
            index: predecessor.index + 1,
            timestamp: now_timestamp(),
            records,
            previous_hash: predecessor.hash.clone(),
            hash: String::new(),
            nonce: 0,
        };
        block.hash = block.compute_hash();
        block
    }

    /// SHA-256 over `index:timestamp:records:previous_hash:nonce`, hex encoded.
    /// Records are serialized as JSON in their declared field order, which
    /// keeps the preimage canonical.
    pub fn compute_hash(&self) -> String {
        let records_json =
            serde_json::to_string(&self.records).expect("records are plain data and always serialize");
        let preimage = format!(
            "{}:{}:{}:{}:{}",
            self.index, self.timestamp, records_json, self.previous_hash, self.nonce
        );
        let mut hasher = Sha256::new();
        hasher.update(preimage.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// True when the cached hash matches the content.
    pub fn is_sealed(&self) -> bool {
        self.hash == self.compute_hash()
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0 && self.previous_hash == GENESIS_PREVIOUS_HASH
    }
}

/// Whether `hash` starts with at least `difficulty` `'0'` hex characters.
pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    let difficulty = difficulty as usize;
    hash.len() >= difficulty && hash.bytes().take(difficulty).all(|b| b == b'0')
}

/// Current UTC time with nanosecond precision.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)
}
