pub mod block;
pub mod model;

pub use block::{Block, meets_difficulty, now_timestamp};
pub use model::{Blockchain, SharedChain, lock_chain, shared};

/// Proof-of-Work difficulty (number of leading zero hex characters).
pub const DIFFICULTY: u32 = 4;

/// Records sealed into every mined block.
pub const BATCH_SIZE: usize = 3;

/// `previous_hash` sentinel of the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Label of the genesis sentinel record.
pub const GENESIS_DETAILS: &str = "Genesis Block";

/// Fixed genesis timestamp (genesis must be identical on every node).
pub const GENESIS_TIMESTAMP: &str = "1970-01-01T00:00:00Z";
