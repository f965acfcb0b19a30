use log::debug;
use std::sync::mpsc;
use std::thread;

use super::{CancelFlag, MineError, Miner};
use crate::blockchain::Block;
use crate::record::Record;

/// Race `workers` miners on the same input and return the first solution.
///
/// Every worker runs on its own OS thread with a flag derived from `cancel`.
/// The first worker to solve publishes its block and cancels the round, the
/// others stop at their next attempt and whatever they found is dropped.
/// Returns only once every worker thread has exited.
pub fn race_mine(
    records: &[Record],
    predecessor: &Block,
    difficulty: u32,
    workers: usize,
    cancel: &CancelFlag,
) -> Result<Block, MineError> {
    if workers == 0 {
        return Err(MineError::NoWorkers);
    }

    let round = cancel.child();
    let (winner_tx, winner_rx) = mpsc::sync_channel::<Block>(1);

    let failures: Vec<MineError> = thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|id| {
                let winner_tx = winner_tx.clone();
                let round = &round;
                scope.spawn(move || {
                    let miner = Miner::new(id);
                    match miner.solve(records, predecessor, difficulty, round) {
                        Ok(block) => {
                            // Slot already taken means another worker won.
                            if winner_tx.try_send(block).is_ok() {
                                debug!("miner {id} won the race");
                                round.cancel();
                            }
                            None
                        }
                        Err(err) => Some(err),
                    }
                })
            })
            .collect();

        handles
            .into_iter()
            .enumerate()
            .filter_map(|(id, handle)| match handle.join() {
                Ok(outcome) => outcome,
                Err(_) => Some(MineError::WorkerPanicked(id)),
            })
            .collect()
    });

    if let Ok(block) = winner_rx.try_recv() {
        return Ok(block);
    }
    if cancel.is_cancelled() {
        return Err(MineError::Cancelled);
    }
    Err(failures
        .into_iter()
        .find(|e| *e != MineError::Cancelled)
        .unwrap_or(MineError::Cancelled))
}

#[cfg(test)]
mod tests {
    use super::race_mine;
    use crate::blockchain::Blockchain;
    use crate::mining::{CancelFlag, MineError};
    use crate::record::Record;

    fn batch() -> Vec<Record> {
        vec![
            Record::new(0.1, "Prediction for Row 1"),
            Record::new(0.2, "Prediction for Row 2"),
            Record::new(0.3, "Prediction for Row 3"),
        ]
    }

    #[test]
    fn any_worker_count_yields_a_valid_block() {
        let bc = Blockchain::new(2);
        for workers in [1, 2, 4, 8] {
            let block = race_mine(&batch(), bc.tip(), 2, workers, &CancelFlag::new()).unwrap();
            assert!(bc.is_valid(&block, bc.tip()), "workers={workers}");
        }
    }

    #[test]
    fn winner_does_not_cancel_the_caller() {
        let bc = Blockchain::new(1);
        let cancel = CancelFlag::new();
        race_mine(&batch(), bc.tip(), 1, 3, &cancel).unwrap();
        assert!(!cancel.is_cancelled());
    }

    #[test]
    fn zero_workers_is_an_error() {
        let bc = Blockchain::new(1);
        let err = race_mine(&batch(), bc.tip(), 1, 0, &CancelFlag::new()).unwrap_err();
        assert_eq!(err, MineError::NoWorkers);
    }

    #[test]
    fn caller_cancellation_aborts_an_unsolvable_race() {
        let bc = Blockchain::new(64);
        let cancel = CancelFlag::new();
        let trigger = cancel.clone();
        let stopper = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(50));
            trigger.cancel();
        });
        let err = race_mine(&batch(), bc.tip(), 64, 3, &cancel).unwrap_err();
        stopper.join().unwrap();
        assert_eq!(err, MineError::Cancelled);
    }
}
