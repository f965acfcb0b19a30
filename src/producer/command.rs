use log::{debug, warn};
use tokio::process::Command;

use super::{BatchProducer, ProducerError};
use crate::blockchain::BATCH_SIZE;
use crate::config::NodeConfig;
use crate::record::Record;

/// Runs an external prediction program and turns the numbers it prints into
/// records, one per stdout line.
#[derive(Debug, Clone)]
pub struct CommandProducer {
    program: String,
    args: Vec<String>,
    per_run: usize,
}

impl CommandProducer {
    /// `per_run` is clamped to `1..=BATCH_SIZE`.
    pub fn new(program: impl Into<String>, args: Vec<String>, per_run: usize) -> Self {
        Self {
            program: program.into(),
            args,
            per_run: per_run.clamp(1, BATCH_SIZE),
        }
    }

    /// `<program> <script> <dataset_cid> <model_cid> <scaler_cid>`
    pub fn from_config(config: &NodeConfig) -> Self {
        let ids = &config.artifacts;
        Self::new(
            config.predict_program.clone(),
            vec![
                config.predict_script.clone(),
                ids.dataset_cid.clone(),
                ids.model_cid.clone(),
                ids.scaler_cid.clone(),
            ],
            config.records_per_run,
        )
    }

    pub fn per_run(&self) -> usize {
        self.per_run
    }
}

impl BatchProducer for CommandProducer {
    async fn produce(&mut self) -> Result<Vec<Record>, ProducerError> {
        debug!("running producer `{}` {:?}", self.program, self.args);
        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .await
            .map_err(|source| ProducerError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            warn!("producer `{}` failed:\n{}", self.program, combined.trim_end());
            return Err(ProducerError::Exited {
                program: self.program.clone(),
                code: output.status.code(),
                output: combined.trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_predictions(&stdout, self.per_run))
    }
}

/// Take up to `limit` numeric lines from `output`. Each record is labelled
/// with the 1-based line it came from. Blank, non-numeric and non-finite
/// (`NaN`, `inf`) lines are skipped.
pub fn parse_predictions(output: &str, limit: usize) -> Vec<Record> {
    output
        .lines()
        .enumerate()
        .filter_map(|(i, line)| {
            let value = line.trim().parse::<f64>().ok().filter(|v| v.is_finite())?;
            Some(Record::new(value, format!("Prediction for Row {}", i + 1)))
        })
        .take(limit)
        .collect()
}
