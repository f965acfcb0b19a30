use log::{debug, warn};
use std::time::Duration;
use tokio::time;

use super::{Node, NodeError, RoundOutcome};
use crate::blockchain::BATCH_SIZE;
use crate::producer::BatchProducer;

/// Wait after a failed producer call before asking again.
pub const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Wait after a producer call that yielded nothing.
pub const IDLE_DELAY: Duration = Duration::from_secs(1);

/// Feeds a node from a producer and runs a round whenever a batch is full.
#[derive(Debug, Clone)]
pub struct Runner {
    retry_delay: Duration,
    idle_delay: Duration,
    max_rounds: Option<usize>,
}

impl Default for Runner {
    fn default() -> Self {
        Self {
            retry_delay: RETRY_DELAY,
            idle_delay: IDLE_DELAY,
            max_rounds: None,
        }
    }
}

impl Runner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delays(mut self, retry: Duration, idle: Duration) -> Self {
        self.retry_delay = retry;
        self.idle_delay = idle;
        self
    }

    /// Stop after this many rounds (accepted, rejected or failed).
    pub fn with_max_rounds(mut self, max_rounds: Option<usize>) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Drive `node` until its cancel flag is set or the round limit is
    /// reached. Returns the number of rounds run.
    pub async fn run<P: BatchProducer>(&self, node: &mut Node, producer: &mut P) -> usize {
        let shutdown = node.cancel_handle();
        let mut rounds = 0;

        while !shutdown.is_cancelled() {
            if self.max_rounds.is_some_and(|max| rounds >= max) {
                break;
            }

            if !node.batch_ready() {
                match producer.produce().await {
                    Err(e) => {
                        warn!("producer failed, retrying in {:?}: {e}", self.retry_delay);
                        time::sleep(self.retry_delay).await;
                        continue;
                    }
                    Ok(records) if records.is_empty() => {
                        debug!("producer returned no records");
                        time::sleep(self.idle_delay).await;
                        continue;
                    }
                    Ok(records) => {
                        let offered = records.len();
                        let accepted = offered.min(node.remaining_capacity());
                        for record in records.into_iter().take(accepted) {
                            if let Err(e) = node.submit(record) {
                                warn!("record not buffered: {e}");
                            }
                        }
                        if accepted < offered {
                            warn!("batch full, dropped {} surplus record(s)", offered - accepted);
                        }
                        debug!("pending batch {}/{BATCH_SIZE}", node.pending().len());
                    }
                }
            }

            if node.batch_ready() {
                rounds += 1;
                report(node.run_round().await);
            }
        }

        rounds
    }
}

/// `run_round` already logs how each round ended; only errors it does not
/// report itself are surfaced here.
fn report(result: Result<RoundOutcome, NodeError>) {
    match result {
        Ok(outcome) => debug!(
            "round {} finished (accepted={})",
            outcome.round_id(),
            outcome.is_accepted()
        ),
        Err(
            NodeError::Mining { .. } | NodeError::MiningTask { .. } | NodeError::StaleTip { .. },
        ) => {}
        Err(e) => warn!("round not run: {e}"),
    }
}
