use actix_web::{App, HttpServer, web};
use anyhow::Context;
use dotenvy::dotenv;
use log::{info, warn};
use std::path::Path;

use ledger_node::api::{self, AppState};
use ledger_node::blockchain::{Blockchain, DIFFICULTY, shared};
use ledger_node::config::{NodeConfig, ProducerKind};
use ledger_node::consensus::RatificationClient;
use ledger_node::fetch::ContentFetcher;
use ledger_node::node::{Node, Runner};
use ledger_node::producer::{CommandProducer, SyntheticProducer};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv();
    env_logger::init();

    let config = NodeConfig::from_env().context("invalid node configuration")?;
    info!(
        "⛓️ Starting ledger node at http://{}:{} with {} peer(s)",
        config.host,
        config.port,
        config.peers.len()
    );

    let chain = shared(Blockchain::new(DIFFICULTY));
    let state = web::Data::new(AppState::new(chain.clone()));

    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(api::init_routes)
    })
    .bind((config.host.as_str(), config.port))
    .with_context(|| format!("cannot bind {}:{}", config.host, config.port))?
    .run();
    let server_handle = server.handle();
    let server_task = actix_web::rt::spawn(server);

    if let Some(dir) = &config.artifact_dir {
        prefetch_artifacts(&config, dir).await;
    }

    let ratifier = RatificationClient::new().context("cannot build peer HTTP client")?;
    let mut node = Node::new(chain, config.peers.clone(), ratifier);

    let shutdown = node.cancel_handle();
    actix_web::rt::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            shutdown.cancel();
        }
    });

    let runner = Runner::new().with_max_rounds(config.rounds);
    let rounds = match config.producer {
        ProducerKind::Command => {
            let mut producer = CommandProducer::from_config(&config);
            runner.run(&mut node, &mut producer).await
        }
        ProducerKind::Synthetic => {
            let mut producer = SyntheticProducer::new(config.records_per_run);
            runner.run(&mut node, &mut producer).await
        }
    };
    info!("node stopped after {rounds} round(s)");

    server_handle.stop(true).await;
    server_task
        .await
        .context("HTTP server task failed")?
        .context("HTTP server error")?;
    Ok(())
}

/// Download the producer's dataset/model/scaler into `dir`. Failures are
/// reported but do not stop the node: the producer may still have them.
async fn prefetch_artifacts(config: &NodeConfig, dir: &Path) {
    let fetcher = match ContentFetcher::new(config.gateway_url.clone()) {
        Ok(f) => f,
        Err(e) => {
            warn!("artifact prefetch disabled: {e}");
            return;
        }
    };
    if let Err(e) = tokio::fs::create_dir_all(dir).await {
        warn!("cannot create artifact dir {}: {e}", dir.display());
        return;
    }
    for (cid, file) in config.artifacts.files() {
        if let Err(e) = fetcher.fetch(cid, &dir.join(file)).await {
            warn!("artifact prefetch failed: {e}");
        }
    }
}
