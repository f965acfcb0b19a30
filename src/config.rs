//! Node configuration from the environment (and `.env`, loaded in `main`).

use std::env;
use std::path::PathBuf;
use thiserror::Error;

use crate::fetch::DEFAULT_GATEWAY;

const DEFAULT_DATASET_CID: &str = "bafkreifkzuwvvohltv4loy5kfgagfhlawrkpjbscbh2qsrz7v6vdy666ae";
const DEFAULT_MODEL_CID: &str = "bafkreihnj6a5xfcjetmej3mcr4xg364je6vrzbolzz6fmtoxu46ldqlhgm";
const DEFAULT_SCALER_CID: &str = "bafkreibo2eo3lx2talokcz6hx44i2e4qxh2vn2tkge52m7vouv2bvqjt3m";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("unknown producer {0:?} (expected \"command\" or \"synthetic\")")]
    UnknownProducer(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerKind {
    Command,
    Synthetic,
}

/// Content identifiers of the artifacts the prediction program works from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactIds {
    pub dataset_cid: String,
    pub model_cid: String,
    pub scaler_cid: String,
}

impl ArtifactIds {
    /// `(cid, local file name)` pairs for prefetching.
    pub fn files(&self) -> [(&str, &'static str); 3] {
        [
            (self.dataset_cid.as_str(), "dataset.csv"),
            (self.model_cid.as_str(), "model.pkl"),
            (self.scaler_cid.as_str(), "scaler.pkl"),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeConfig {
    pub host: String,
    pub port: u16,
    pub peers: Vec<String>,
    pub producer: ProducerKind,
    pub predict_program: String,
    pub predict_script: String,
    pub artifacts: ArtifactIds,
    pub records_per_run: usize,
    pub gateway_url: String,
    pub artifact_dir: Option<PathBuf>,
    /// `None` runs rounds until shutdown.
    pub rounds: Option<usize>,
}

impl NodeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str, default: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let port = parse_number("PORT", &get("PORT", "8080"))?;
        let records_per_run = parse_number("RECORDS_PER_RUN", &get("RECORDS_PER_RUN", "1"))?;
        let rounds: usize = parse_number("ROUNDS", &get("ROUNDS", "0"))?;

        let producer = match get("PRODUCER", "command").to_ascii_lowercase().as_str() {
            "command" => ProducerKind::Command,
            "synthetic" => ProducerKind::Synthetic,
            other => return Err(ConfigError::UnknownProducer(other.to_string())),
        };

        let artifact_dir = lookup("ARTIFACT_DIR")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            host: get("HOST", "127.0.0.1"),
            port,
            peers: parse_peers(&lookup("PEERS").unwrap_or_default()),
            producer,
            predict_program: get("PREDICT_PROGRAM", "python"),
            predict_script: get("PREDICT_SCRIPT", "predict.py"),
            artifacts: ArtifactIds {
                dataset_cid: get("DATASET_CID", DEFAULT_DATASET_CID),
                model_cid: get("MODEL_CID", DEFAULT_MODEL_CID),
                scaler_cid: get("SCALER_CID", DEFAULT_SCALER_CID),
            },
            records_per_run,
            gateway_url: get("GATEWAY_URL", DEFAULT_GATEWAY),
            artifact_dir,
            rounds: (rounds > 0).then_some(rounds),
        })
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
    })
}

/// Split a comma-separated peer list into base URLs: blanks are dropped, a
/// missing scheme becomes `http://` and trailing slashes are removed.
pub fn parse_peers(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            let p = p.trim_end_matches('/');
            if p.contains("://") {
                p.to_string()
            } else {
                format!("http://{p}")
            }
        })
        .collect()
}
