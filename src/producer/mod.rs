//! Sources of records for the pending batch.
//!
//! Producers are external collaborators: the node only needs a list of
//! `(prediction, details)` pairs per call. An empty list is normal and
//! means nothing new is available yet.

pub mod command;
pub mod synthetic;

pub use command::{CommandProducer, parse_predictions};
pub use synthetic::SyntheticProducer;

use std::io;
use thiserror::Error;

use crate::record::Record;

#[derive(Error, Debug)]
pub enum ProducerError {
    #[error("failed to start `{program}`: {source}")]
    Spawn { program: String, source: io::Error },

    #[error("`{program}` exited with code {code:?}: {output}")]
    Exited {
        program: String,
        code: Option<i32>,
        output: String,
    },
}

/// Yields zero or more records per call. Errors are recoverable: the caller
/// decides whether to retry.
#[allow(async_fn_in_trait)]
pub trait BatchProducer {
    async fn produce(&mut self) -> Result<Vec<Record>, ProducerError>;
}
