use log::{debug, info, warn};
use reqwest::header::CONTENT_TYPE;
use std::fmt;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time;

use super::{VALIDATE_PATH, ValidationResponse, ValidationStatus};
use crate::blockchain::Block;

/// Upper bound for a single peer's validation call.
pub const PEER_TIMEOUT: Duration = Duration::from_secs(5);

/// How one peer answered a ratification request. Only `Valid` is a yes vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerVote {
    Valid,
    Invalid,
    Timeout,
    Unreachable(String),
    BadResponse(String),
}

impl PeerVote {
    pub fn is_valid(&self) -> bool {
        matches!(self, PeerVote::Valid)
    }
}

impl fmt::Display for PeerVote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerVote::Valid => write!(f, "valid"),
            PeerVote::Invalid => write!(f, "invalid"),
            PeerVote::Timeout => write!(f, "timed out (counted as no)"),
            PeerVote::Unreachable(reason) => write!(f, "unreachable (counted as no): {reason}"),
            PeerVote::BadResponse(reason) => write!(f, "bad response (counted as no): {reason}"),
        }
    }
}

/// Simple majority: strictly more than half of the peers. No peers means
/// single-node mode, which always accepts.
pub fn tally(approvals: usize, peer_count: usize) -> bool {
    peer_count == 0 || approvals * 2 > peer_count
}

/// Votes collected for one candidate, in peer-list order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ratification {
    votes: Vec<(String, PeerVote)>,
}

impl Ratification {
    pub fn votes(&self) -> &[(String, PeerVote)] {
        &self.votes
    }

    pub fn approvals(&self) -> usize {
        self.votes.iter().filter(|(_, v)| v.is_valid()).count()
    }

    pub fn accepted(&self) -> bool {
        tally(self.approvals(), self.votes.len())
    }
}

impl fmt::Display for Ratification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.votes.is_empty() {
            return write!(f, "no peers configured, accepted in single-node mode");
        }
        write!(
            f,
            "{}/{} peers voted valid (majority needs {})",
            self.approvals(),
            self.votes.len(),
            self.votes.len() / 2 + 1
        )?;
        for (peer, vote) in &self.votes {
            write!(f, "; {peer}: {vote}")?;
        }
        Ok(())
    }
}

/// Asks every peer's validation endpoint about a candidate and tallies the
/// answers.
#[derive(Debug, Clone)]
pub struct RatificationClient {
    http: reqwest::Client,
    timeout: Duration,
}

impl RatificationClient {
    pub fn new() -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            timeout: PEER_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send `candidate` to all `peers` concurrently and wait for every
    /// answer (or its timeout). Errors and timeouts count as no votes.
    pub async fn ratify(&self, candidate: &Block, peers: &[String]) -> Ratification {
        if peers.is_empty() {
            debug!("no peers, block #{} auto-accepted", candidate.index);
            return Ratification { votes: Vec::new() };
        }

        let body = match serde_json::to_vec(candidate) {
            Ok(body) => body,
            Err(e) => {
                warn!("cannot encode block #{} for peers: {e}", candidate.index);
                let votes = peers
                    .iter()
                    .map(|p| (p.clone(), PeerVote::Unreachable(format!("encode failed: {e}"))))
                    .collect();
                return Ratification { votes };
            }
        };

        // Overwritten by each call's result; a call that dies stays a no vote.
        let mut votes: Vec<(String, PeerVote)> = peers
            .iter()
            .map(|p| (p.clone(), PeerVote::Unreachable("vote task aborted".into())))
            .collect();

        let mut calls = JoinSet::new();
        for (slot, peer) in peers.iter().enumerate() {
            let http = self.http.clone();
            let url = format!("{}{}", peer.trim_end_matches('/'), VALIDATE_PATH);
            let body = body.clone();
            let timeout = self.timeout;
            calls.spawn(async move {
                let vote = time::timeout(timeout, request_vote(&http, &url, body))
                    .await
                    .unwrap_or(PeerVote::Timeout);
                (slot, vote)
            });
        }

        while let Some(joined) = calls.join_next().await {
            match joined {
                Ok((slot, vote)) => {
                    debug!("peer {} voted {vote}", votes[slot].0);
                    votes[slot].1 = vote;
                }
                Err(e) => warn!("ratification call failed: {e}"),
            }
        }

        let ratification = Ratification { votes };
        info!(
            "ratification of block #{}: {}",
            candidate.index, ratification
        );
        ratification
    }
}

async fn request_vote(http: &reqwest::Client, url: &str, body: Vec<u8>) -> PeerVote {
    let resp = match http
        .post(url)
        .header(CONTENT_TYPE, "application/json")
        .body(body)
        .send()
        .await
    {
        Ok(resp) => resp,
        Err(e) => return PeerVote::Unreachable(e.to_string()),
    };

    let status = resp.status();
    if !status.is_success() {
        return PeerVote::BadResponse(format!("HTTP {status}"));
    }

    match resp.json::<ValidationResponse>().await {
        Ok(ValidationResponse {
            status: ValidationStatus::Valid,
        }) => PeerVote::Valid,
        Ok(_) => PeerVote::Invalid,
        Err(e) => PeerVote::BadResponse(format!("undecodable body: {e}")),
    }
}
