use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{BatchProducer, ProducerError};
use crate::blockchain::BATCH_SIZE;
use crate::record::Record;

/// Dev/demo producer: random predictions, no external process.
#[derive(Debug)]
pub struct SyntheticProducer {
    rng: StdRng,
    per_run: usize,
    produced: usize,
}

impl SyntheticProducer {
    pub fn new(per_run: usize) -> Self {
        Self::with_rng(StdRng::from_entropy(), per_run)
    }

    pub fn seeded(seed: u64, per_run: usize) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed), per_run)
    }

    fn with_rng(rng: StdRng, per_run: usize) -> Self {
        Self {
            rng,
            per_run: per_run.clamp(1, BATCH_SIZE),
            produced: 0,
        }
    }
}

impl BatchProducer for SyntheticProducer {
    async fn produce(&mut self) -> Result<Vec<Record>, ProducerError> {
        let records = (0..self.per_run)
            .map(|_| {
                self.produced += 1;
                let value: f64 = self.rng.gen_range(0.0..100.0);
                Record::new(value, format!("Synthetic prediction {}", self.produced))
            })
            .collect();
        Ok(records)
    }
}
