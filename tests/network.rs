// tests/network.rs
//
// Multi-node behaviour over real HTTP: every peer is an actix server bound to
// an ephemeral port on 127.0.0.1.

use std::time::{Duration, Instant};

use actix_web::http::StatusCode;
use actix_web::{App, HttpResponse, HttpServer, web};

use ledger_node::api::{self, AppState};
use ledger_node::blockchain::{Block, Blockchain, SharedChain, lock_chain, shared};
use ledger_node::consensus::{PeerVote, RatificationClient, ValidationResponse};
use ledger_node::fetch::{ContentFetcher, FetchError};
use ledger_node::mining::{CancelFlag, Miner};
use ledger_node::node::{Node, NodeError, RoundOutcome, RoundState};
use ledger_node::record::Record;

fn spawn_server<F>(configure: F) -> String
where
    F: Fn(&mut web::ServiceConfig) + Send + Clone + 'static,
{
    let server = HttpServer::new(move || App::new().configure(configure.clone()))
        .workers(1)
        .disable_signals()
        .bind(("127.0.0.1", 0))
        .expect("bind ephemeral port");
    let addr = server.addrs()[0];
    actix_web::rt::spawn(server.run());
    format!("http://{addr}")
}

/// A full peer node serving `/validate` against its own chain.
fn spawn_peer(chain: SharedChain) -> String {
    let state = web::Data::new(AppState::new(chain));
    spawn_server(move |cfg| {
        cfg.app_data(state.clone());
        api::init_routes(cfg);
    })
}

/// A peer that always answers `/validate` the same way, after `delay`.
fn spawn_stub(status: u16, body: &'static str, delay: Duration) -> String {
    spawn_server(move |cfg| {
        cfg.route(
            "/validate",
            web::post().to(move || async move {
                tokio::time::sleep(delay).await;
                HttpResponse::build(StatusCode::from_u16(status).unwrap())
                    .content_type("application/json")
                    .body(body)
            }),
        );
    })
}

const VALID: &str = r#"{"status":"valid"}"#;
const INVALID: &str = r#"{"status":"invalid"}"#;

fn batch() -> Vec<Record> {
    (1..=3)
        .map(|i| Record::new(60.0 + i as f64, format!("Prediction for Row {i}")))
        .collect()
}

fn fill(node: &mut Node) {
    for r in batch() {
        node.submit(r).unwrap();
    }
}

fn mine(chain: &SharedChain) -> Block {
    let bc = lock_chain(chain);
    Miner::new(0)
        .solve(&batch(), bc.tip(), bc.difficulty(), &CancelFlag::new())
        .unwrap()
}

fn client() -> RatificationClient {
    RatificationClient::new().unwrap()
}

#[actix_web::test]
async fn majority_of_real_peers_accepts_and_only_the_miner_appends() {
    let peer_chains: Vec<SharedChain> = (0..3).map(|_| shared(Blockchain::new(2))).collect();
    let peers: Vec<String> = peer_chains.iter().cloned().map(spawn_peer).collect();

    let mut node = Node::new(shared(Blockchain::new(2)), peers, client());
    fill(&mut node);

    let outcome = node.run_round().await.unwrap();
    match &outcome {
        RoundOutcome::Accepted { ratification, .. } => {
            assert_eq!(ratification.approvals(), 3);
        }
        other => panic!("expected acceptance, got {other:?}"),
    }
    assert_eq!(node.state(), RoundState::Accepted);
    assert_eq!(lock_chain(&node.chain()).len(), 2);

    // Validation is read-only on the peers.
    for chain in &peer_chains {
        assert_eq!(lock_chain(chain).len(), 1);
    }
}

#[actix_web::test]
async fn insufficient_work_is_rejected_by_every_peer() {
    let peers: Vec<String> = (0..3)
        .map(|_| spawn_peer(shared(Blockchain::new(2))))
        .collect();
    let local = shared(Blockchain::new(2));

    let mut candidate = {
        let bc = lock_chain(&local);
        Miner::new(0)
            .solve(&batch(), bc.tip(), 0, &CancelFlag::new())
            .unwrap()
    };
    while candidate.hash.starts_with("00") {
        candidate.nonce += 1;
        candidate.hash = candidate.compute_hash();
    }

    let ratification = client().ratify(&candidate, &peers).await;
    assert!(!ratification.accepted());
    assert!(
        ratification
            .votes()
            .iter()
            .all(|(_, vote)| *vote == PeerVote::Invalid)
    );
    assert_eq!(lock_chain(&local).len(), 1);
}

#[actix_web::test]
async fn peers_on_another_tip_reject_the_round() {
    let peer_chains: Vec<SharedChain> = (0..3).map(|_| shared(Blockchain::new(1))).collect();
    for chain in &peer_chains {
        let block = mine(chain);
        assert!(lock_chain(chain).append(block));
    }
    let peers: Vec<String> = peer_chains.iter().cloned().map(spawn_peer).collect();

    let mut node = Node::new(shared(Blockchain::new(1)), peers, client());
    fill(&mut node);

    let outcome = node.run_round().await.unwrap();
    assert!(!outcome.is_accepted());
    assert_eq!(node.state(), RoundState::Rejected);
    assert_eq!(lock_chain(&node.chain()).len(), 1);
    // The batch is gone; the node collects a fresh one.
    assert!(node.pending().is_empty());
}

#[actix_web::test]
async fn two_of_three_is_a_majority() {
    let peers = vec![
        spawn_stub(200, VALID, Duration::ZERO),
        spawn_stub(200, VALID, Duration::ZERO),
        spawn_stub(200, INVALID, Duration::ZERO),
    ];
    let r = client().ratify(&Block::genesis(), &peers).await;
    assert_eq!(r.approvals(), 2);
    assert!(r.accepted());
}

#[actix_web::test]
async fn even_split_is_a_rejection() {
    let peers = vec![
        spawn_stub(200, VALID, Duration::ZERO),
        spawn_stub(200, INVALID, Duration::ZERO),
    ];
    let r = client().ratify(&Block::genesis(), &peers).await;
    assert_eq!(r.approvals(), 1);
    assert!(!r.accepted());
}

#[actix_web::test]
async fn errors_and_timeouts_count_as_no_votes() {
    let peers = vec![
        spawn_stub(200, VALID, Duration::ZERO),
        spawn_stub(200, VALID, Duration::from_secs(3)),
        spawn_stub(500, VALID, Duration::ZERO),
        spawn_stub(200, "not json", Duration::ZERO),
        "http://127.0.0.1:1".to_string(),
    ];
    let ratifier = client().with_timeout(Duration::from_millis(300));

    let started = Instant::now();
    let r = ratifier.ratify(&Block::genesis(), &peers).await;
    assert!(started.elapsed() < Duration::from_secs(2));

    let votes: Vec<&PeerVote> = r.votes().iter().map(|(_, v)| v).collect();
    assert_eq!(*votes[0], PeerVote::Valid);
    assert_eq!(*votes[1], PeerVote::Timeout);
    assert!(matches!(votes[2], PeerVote::BadResponse(_)));
    assert!(matches!(votes[3], PeerVote::BadResponse(_)));
    assert!(matches!(votes[4], PeerVote::Unreachable(_)));
    assert_eq!(r.approvals(), 1);
    assert!(!r.accepted());
}

#[actix_web::test]
async fn tip_moving_during_ratification_is_a_stale_tip_failure() {
    let local = shared(Blockchain::new(1));

    // This peer appends to the miner's own chain before voting yes, so the
    // ratified candidate no longer extends the tip.
    let intruder_chain = local.clone();
    let peer = spawn_server(move |cfg| {
        let chain = intruder_chain.clone();
        cfg.route(
            "/validate",
            web::post().to(move || {
                let chain = chain.clone();
                async move {
                    {
                        let mut bc = lock_chain(&chain);
                        let intruder = Miner::new(9)
                            .solve(
                                &[Record::new(-1.0, "intruder")],
                                bc.tip(),
                                bc.difficulty(),
                                &CancelFlag::new(),
                            )
                            .unwrap();
                        assert!(bc.append(intruder));
                    }
                    HttpResponse::Ok().json(ValidationResponse::valid())
                }
            }),
        );
    });

    let mut node = Node::new(local.clone(), vec![peer], client());
    fill(&mut node);

    let err = node.run_round().await.unwrap_err();
    assert!(
        matches!(err, NodeError::StaleTip { index: 1, tip_index: 1, .. }),
        "{err}"
    );
    assert_eq!(node.state(), RoundState::Rejected);

    let bc = lock_chain(&local);
    assert_eq!(bc.len(), 2);
    assert_eq!(bc.tip().records[0].details, "intruder");
}

fn spawn_gateway() -> String {
    let base = spawn_server(|cfg| {
        cfg.route(
            "/ipfs/{cid}",
            web::get().to(|cid: web::Path<String>| async move {
                if cid.as_str() == "missing" {
                    HttpResponse::NotFound().finish()
                } else {
                    HttpResponse::Ok().body(format!("artifact {cid}"))
                }
            }),
        );
    });
    format!("{base}/ipfs")
}

#[actix_web::test]
async fn fetch_writes_artifact_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("model.pkl");
    let fetcher = ContentFetcher::new(spawn_gateway()).unwrap();

    let written = fetcher.fetch("bafymodel", &dest).await.unwrap();
    assert_eq!(written, "artifact bafymodel".len() as u64);
    assert_eq!(std::fs::read_to_string(&dest).unwrap(), "artifact bafymodel");
}

#[actix_web::test]
async fn fetch_separates_gateway_and_filesystem_failures() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = ContentFetcher::new(spawn_gateway()).unwrap();

    let err = fetcher
        .fetch("missing", &dir.path().join("dataset.csv"))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Status { status: 404, .. }), "{err}");

    let err = fetcher
        .fetch("bafydataset", &dir.path().join("no-such-dir").join("dataset.csv"))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Write { .. }), "{err}");
}
