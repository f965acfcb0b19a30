use log::{debug, warn};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{Block, meets_difficulty};

/// Chain handle shared between the HTTP handlers (readers) and the node's
/// mining round (the single writer).
pub type SharedChain = Arc<Mutex<Blockchain>>;

/// Wrap a chain for sharing.
pub fn shared(chain: Blockchain) -> SharedChain {
    Arc::new(Mutex::new(chain))
}

/// Lock the chain, recovering the guard if a previous holder panicked.
/// `Blockchain` only mutates through `append`, which pushes a fully
/// validated block in one step, so a poisoned chain is still consistent.
pub fn lock_chain(chain: &SharedChain) -> MutexGuard<'_, Blockchain> {
    match chain.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("chain mutex was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

/// Simple in-memory, append-only blockchain with Proof-of-Work.
#[derive(Debug)]
pub struct Blockchain {
    chain: Vec<Block>,
    difficulty: u32,
}

impl Blockchain {
    /// Initialize a new blockchain with the genesis block.
    pub fn new(difficulty: u32) -> Self {
        Self {
            chain: vec![Block::genesis()],
            difficulty,
        }
    }

    /// Return the last block in the chain.
    pub fn tip(&self) -> &Block {
        // `chain` starts with genesis and is never truncated.
        &self.chain[self.chain.len() - 1]
    }

    /// Check `candidate` as the direct successor of `predecessor`: linkage,
    /// hash integrity and Proof-of-Work. Any failing check rejects it.
    pub fn is_valid(&self, candidate: &Block, predecessor: &Block) -> bool {
        if predecessor.index + 1 != candidate.index {
            debug!(
                "reject block #{}: expected index {}",
                candidate.index,
                predecessor.index + 1
            );
            return false;
        }
        if predecessor.hash != candidate.previous_hash {
            debug!(
                "reject block #{}: previous_hash {} does not link to {}",
                candidate.index, candidate.previous_hash, predecessor.hash
            );
            return false;
        }
        if !candidate.is_sealed() {
            debug!(
                "reject block #{}: hash {} does not match its content",
                candidate.index, candidate.hash
            );
            return false;
        }
        if !meets_difficulty(&candidate.hash, self.difficulty) {
            debug!(
                "reject block #{}: hash {} misses difficulty {}",
                candidate.index, candidate.hash, self.difficulty
            );
            return false;
        }
        true
    }

    /// Append `candidate` if it is a valid successor of the current tip.
    /// Returns false and leaves the chain untouched otherwise.
    pub fn append(&mut self, candidate: Block) -> bool {
        if !self.is_valid(&candidate, self.tip()) {
            return false;
        }
        debug!("append block #{} hash={}", candidate.index, candidate.hash);
        self.chain.push(candidate);
        true
    }

    /// Validate the entire chain: genesis integrity, then every link.
    pub fn is_valid_chain(&self) -> bool {
        let Some(genesis) = self.chain.first() else {
            return false;
        };
        if !genesis.is_genesis() || !genesis.is_sealed() {
            return false;
        }
        self.chain
            .windows(2)
            .all(|pair| self.is_valid(&pair[1], &pair[0]))
    }

    pub fn blocks(&self) -> &[Block] {
        &self.chain
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }
}
