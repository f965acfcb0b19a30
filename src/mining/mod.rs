pub mod cancel;
pub mod coordinator;
pub mod miner;

pub use cancel::CancelFlag;
pub use coordinator::race_mine;
pub use miner::Miner;

use thiserror::Error;

/// Concurrent Proof-of-Work searches started per mining round.
pub const MINER_WORKERS: usize = 3;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MineError {
    #[error("mining cancelled before a solution was found")]
    Cancelled,

    #[error("nonce space exhausted for block #{index} without meeting difficulty")]
    NonceExhausted { index: u64 },

    #[error("mining race needs at least one worker")]
    NoWorkers,

    #[error("miner worker {0} panicked")]
    WorkerPanicked(usize),
}
