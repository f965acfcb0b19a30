pub mod ratify;

pub use ratify::{PEER_TIMEOUT, PeerVote, Ratification, RatificationClient, tally};

use serde::{Deserialize, Serialize};

/// Path of the peer validation endpoint.
pub const VALIDATE_PATH: &str = "/validate";

/// Verdict a peer returns for a candidate block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Valid,
    Invalid,
}

/// Body of a `/validate` response: `{"status": "valid" | "invalid"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResponse {
    pub status: ValidationStatus,
}

impl ValidationResponse {
    pub fn valid() -> Self {
        Self {
            status: ValidationStatus::Valid,
        }
    }

    pub fn invalid() -> Self {
        Self {
            status: ValidationStatus::Invalid,
        }
    }
}
