use log::trace;

use super::{CancelFlag, MineError};
use crate::blockchain::{Block, meets_difficulty};
use crate::record::Record;

/// One Proof-of-Work search. Stateless apart from the nonce of the block it
/// is currently working on.
#[derive(Debug, Clone, Copy)]
pub struct Miner {
    id: usize,
}

impl Miner {
    pub fn new(id: usize) -> Self {
        Self { id }
    }

    /// Build the successor of `predecessor` holding `records` and search
    /// nonces from 0 until its hash meets `difficulty`.
    ///
    /// The timestamp is captured once, when the search starts. `cancel` is
    /// checked before every hash attempt.
    pub fn solve(
        &self,
        records: &[Record],
        predecessor: &Block,
        difficulty: u32,
        cancel: &CancelFlag,
    ) -> Result<Block, MineError> {
        let candidate = Block::next(predecessor, records.to_vec());
        self.search(candidate, difficulty, cancel)
    }

    fn search(
        &self,
        mut block: Block,
        difficulty: u32,
        cancel: &CancelFlag,
    ) -> Result<Block, MineError> {
        loop {
            if cancel.is_cancelled() {
                trace!("miner {} stopped at nonce {}", self.id, block.nonce);
                return Err(MineError::Cancelled);
            }
            block.hash = block.compute_hash();
            if meets_difficulty(&block.hash, difficulty) {
                return Ok(block);
            }
            block.nonce = block
                .nonce
                .checked_add(1)
                .ok_or(MineError::NonceExhausted { index: block.index })?;
        }
    }
}
