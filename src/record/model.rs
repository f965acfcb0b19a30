use serde::{Deserialize, Serialize};

/// An application payload committed to the chain.
///
/// The node never interprets it: a numeric `prediction` and a free-text
/// `details` label, serialized in that field order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub prediction: f64,
    pub details: String,
}

impl Record {
    pub fn new(prediction: f64, details: impl Into<String>) -> Self {
        Self {
            prediction,
            details: details.into(),
        }
    }
}
