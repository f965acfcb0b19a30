//! Mining round orchestration.
//!
//! A round moves through `CollectingBatch -> Mining -> Ratifying` and ends
//! `Accepted` or `Rejected`. `Node::run_round` takes `&mut self`, so one node
//! never runs two rounds at once, and it is the only caller of
//! `Blockchain::append`.

pub mod runner;

pub use runner::Runner;

use log::{error, info, warn};
use std::mem;
use thiserror::Error;
use tokio::task;
use uuid::Uuid;

use crate::blockchain::{BATCH_SIZE, Block, SharedChain, lock_chain};
use crate::consensus::{Ratification, RatificationClient};
use crate::mining::{CancelFlag, MINER_WORKERS, MineError, race_mine};
use crate::record::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    CollectingBatch,
    Mining,
    Ratifying,
    Accepted,
    Rejected,
}

/// How a completed round ended.
#[derive(Debug)]
pub enum RoundOutcome {
    Accepted {
        round_id: Uuid,
        block: Block,
        ratification: Ratification,
    },
    Rejected {
        round_id: Uuid,
        block: Block,
        ratification: Ratification,
    },
}

impl RoundOutcome {
    pub fn round_id(&self) -> Uuid {
        match self {
            RoundOutcome::Accepted { round_id, .. } | RoundOutcome::Rejected { round_id, .. } => {
                *round_id
            }
        }
    }

    pub fn block(&self) -> &Block {
        match self {
            RoundOutcome::Accepted { block, .. } | RoundOutcome::Rejected { block, .. } => block,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, RoundOutcome::Accepted { .. })
    }
}

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("pending batch is full ({0} records), run a round first")]
    BufferFull(usize),

    #[error("a mining round is already in progress")]
    RoundInProgress,

    #[error("record prediction must be a finite number, got {0}")]
    NonFiniteRecord(f64),

    #[error("batch incomplete: {have}/{need} records buffered")]
    BatchIncomplete { have: usize, need: usize },

    #[error("round {round_id}: mining failed: {source}")]
    Mining { round_id: Uuid, source: MineError },

    #[error("round {round_id}: mining task failed: {reason}")]
    MiningTask { round_id: Uuid, reason: String },

    #[error(
        "round {round_id}: block #{index} was ratified but no longer extends local tip #{tip_index} (stale tip)"
    )]
    StaleTip {
        round_id: Uuid,
        index: u64,
        tip_index: u64,
    },
}

/// A ledger node: one chain, a pending batch, and the peers that ratify
/// what it mines.
pub struct Node {
    chain: SharedChain,
    peers: Vec<String>,
    ratifier: RatificationClient,
    pending: Vec<Record>,
    state: RoundState,
    workers: usize,
    cancel: CancelFlag,
}

impl Node {
    pub fn new(chain: SharedChain, peers: Vec<String>, ratifier: RatificationClient) -> Self {
        Self {
            chain,
            peers,
            ratifier,
            pending: Vec::with_capacity(BATCH_SIZE),
            state: RoundState::CollectingBatch,
            workers: MINER_WORKERS,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Flag that aborts an in-flight mining race and stops the runner.
    pub fn cancel_handle(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn chain(&self) -> SharedChain {
        self.chain.clone()
    }

    pub fn state(&self) -> RoundState {
        self.state
    }

    pub fn pending(&self) -> &[Record] {
        &self.pending
    }

    pub fn remaining_capacity(&self) -> usize {
        BATCH_SIZE - self.pending.len()
    }

    pub fn batch_ready(&self) -> bool {
        self.pending.len() == BATCH_SIZE
    }

    /// Buffer one record. Returns true once the batch is full.
    pub fn submit(&mut self, record: Record) -> Result<bool, NodeError> {
        match self.state {
            RoundState::Mining | RoundState::Ratifying => return Err(NodeError::RoundInProgress),
            RoundState::Accepted | RoundState::Rejected => {
                self.state = RoundState::CollectingBatch;
            }
            RoundState::CollectingBatch => {}
        }
        if self.batch_ready() {
            return Err(NodeError::BufferFull(BATCH_SIZE));
        }
        if !record.prediction.is_finite() {
            return Err(NodeError::NonFiniteRecord(record.prediction));
        }
        self.pending.push(record);
        Ok(self.batch_ready())
    }

    /// Mine the full pending batch, ask peers to ratify the winner, and
    /// append it locally on a majority.
    ///
    /// The batch is consumed whatever the outcome; a rejected or failed
    /// round is not replayed. Dropping the returned future cancels the
    /// round's miners and leaves the node `Rejected`.
    pub async fn run_round(&mut self) -> Result<RoundOutcome, NodeError> {
        if matches!(self.state, RoundState::Mining | RoundState::Ratifying) {
            return Err(NodeError::RoundInProgress);
        }
        if !self.batch_ready() {
            return Err(NodeError::BatchIncomplete {
                have: self.pending.len(),
                need: BATCH_SIZE,
            });
        }

        let round_id = Uuid::new_v4();
        let batch = mem::take(&mut self.pending);
        let (predecessor, difficulty) = {
            let bc = lock_chain(&self.chain);
            (bc.tip().clone(), bc.difficulty())
        };

        let mut round = RoundGuard::new(round_id, &mut self.state, self.cancel.child());
        round.enter(RoundState::Mining);
        info!(
            "round {round_id}: mining block #{} with {} workers (difficulty {difficulty})",
            predecessor.index + 1,
            self.workers
        );
        let workers = self.workers;
        let cancel = round.cancel.clone();
        let mined = task::spawn_blocking(move || {
            race_mine(&batch, &predecessor, difficulty, workers, &cancel)
        })
        .await;

        let candidate = match mined {
            Ok(Ok(block)) => block,
            Ok(Err(source)) => {
                round.finish(RoundState::Rejected);
                warn!("round {round_id}: mining failed: {source}");
                return Err(NodeError::Mining { round_id, source });
            }
            Err(e) => {
                round.finish(RoundState::Rejected);
                error!("round {round_id}: mining task failed: {e}");
                return Err(NodeError::MiningTask {
                    round_id,
                    reason: e.to_string(),
                });
            }
        };

        round.enter(RoundState::Ratifying);
        info!(
            "round {round_id}: block #{} mined (nonce={}, hash={}), requesting ratification from {} peer(s)",
            candidate.index,
            candidate.nonce,
            candidate.hash,
            self.peers.len()
        );
        let ratification = self.ratifier.ratify(&candidate, &self.peers).await;

        if !ratification.accepted() {
            round.finish(RoundState::Rejected);
            warn!(
                "round {round_id}: block #{} rejected by peers: {ratification}",
                candidate.index
            );
            return Ok(RoundOutcome::Rejected {
                round_id,
                block: candidate,
                ratification,
            });
        }

        let appended = {
            let mut bc = lock_chain(&self.chain);
            if bc.append(candidate.clone()) {
                Ok(bc.len())
            } else {
                Err(bc.tip().index)
            }
        };

        match appended {
            Ok(length) => {
                round.finish(RoundState::Accepted);
                info!(
                    "round {round_id}: block #{} accepted ({ratification}), chain length {length}",
                    candidate.index
                );
                Ok(RoundOutcome::Accepted {
                    round_id,
                    block: candidate,
                    ratification,
                })
            }
            Err(tip_index) => {
                round.finish(RoundState::Rejected);
                error!(
                    "round {round_id}: block #{} ratified but failed local validation against tip #{tip_index}, dropping it",
                    candidate.index
                );
                Err(NodeError::StaleTip {
                    round_id,
                    index: candidate.index,
                    tip_index,
                })
            }
        }
    }
}

/// Owns the node state for the length of one round. If the round future is
/// dropped before `finish`, the round's miners are cancelled and the node
/// falls back to `Rejected`.
struct RoundGuard<'a> {
    round_id: Uuid,
    state: &'a mut RoundState,
    cancel: CancelFlag,
    finished: bool,
}

impl<'a> RoundGuard<'a> {
    fn new(round_id: Uuid, state: &'a mut RoundState, cancel: CancelFlag) -> Self {
        Self {
            round_id,
            state,
            cancel,
            finished: false,
        }
    }

    fn enter(&mut self, state: RoundState) {
        *self.state = state;
    }

    fn finish(&mut self, state: RoundState) {
        *self.state = state;
        self.finished = true;
    }
}

impl Drop for RoundGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        warn!(
            "round {}: abandoned while {:?}, cancelling its miners",
            self.round_id, self.state
        );
        self.cancel.cancel();
        *self.state = RoundState::Rejected;
    }
}
