// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Hub Node
//!
//! Entry point for the `hub-node` binary. Parses CLI arguments, initializes
//! logging and metrics, opens the Hub, serves the HTTP API, and runs the
//! periodic sync loop against the configured peers.
//!
//! The binary supports three subcommands:
//!
//! - `run`: start the Hub
//! - `status`: query a running Hub's status endpoint
//! - `version`: print build version information

mod api;
mod cli;
mod logging;
mod metrics;
mod peer;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::signal;
use tokio::sync::watch;

use hub_protocol::sync::SyncPeer;
use hub_protocol::Hub;

use cli::{Commands, HubNodeCli};
use metrics::NodeMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = HubNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Status(args) => query_status(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the Hub: storage, trie rebuild, API server, metrics endpoint,
/// and the sync loop.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(logging::DEFAULT_DIRECTIVE, args.log_format());

    tracing::info!(
        http_port = args.http_port,
        metrics_port = args.metrics_port,
        peers = args.peers.len(),
        data_dir = %args.data_dir.display(),
        "starting hub-node"
    );

    // --- Persistent storage ---
    let db_path = args.db_path();
    std::fs::create_dir_all(&db_path)
        .with_context(|| format!("failed to create database directory: {}", db_path.display()))?;

    let hub = Arc::new(
        Hub::open(args.hub_config())
            .with_context(|| format!("failed to open hub at {}", db_path.display()))?,
    );
    hub.start().context("failed to start hub")?;

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new().context("failed to register metrics")?);
    node_metrics
        .trie_items
        .set(hub.sync_engine().trie().items() as i64);

    // --- Application state ---
    let app_state = api::AppState {
        version: env!("CARGO_PKG_VERSION").to_string(),
        hub: Arc::clone(&hub),
        metrics: Arc::clone(&node_metrics),
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.http_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {}", api_addr))?;
    tracing::info!(addr = %api_addr, "HTTP API listening");

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!(addr = %metrics_addr, "metrics server listening");

    // --- Sync loop ---
    let client = peer::http_client().context("failed to build HTTP client")?;
    let peers: Vec<NamedPeer> = args
        .peers
        .iter()
        .map(|addr| {
            let peer: Box<dyn SyncPeer> = Box::new(peer::http_peer(&client, addr));
            (addr.clone(), peer)
        })
        .collect();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sync_loop = tokio::spawn(sync_loop(
        Arc::clone(&hub),
        peers,
        Duration::from_secs(args.sync_interval_secs.max(1)),
        Arc::clone(&node_metrics),
        shutdown_rx,
    ));

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!(error = %e, "API server error");
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!(error = %e, "metrics server error");
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    let _ = shutdown_tx.send(true);
    if let Err(e) = sync_loop.await {
        tracing::warn!(error = %e, "sync loop ended abnormally");
    }
    hub.stop().await.context("failed to stop hub")?;
    tracing::info!("hub-node stopped");
    Ok(())
}

/// A sync peer and the address it is logged under.
type NamedPeer = (String, Box<dyn SyncPeer>);

/// Sync against each peer in turn, every `interval`, until `shutdown`
/// flips to true. A round in flight is dropped as soon as `shutdown` fires.
async fn sync_loop(
    hub: Arc<Hub>,
    peers: Vec<NamedPeer>,
    interval: Duration,
    metrics: Arc<NodeMetrics>,
    mut shutdown: watch::Receiver<bool>,
) {
    if peers.is_empty() {
        tracing::info!("no peers configured, sync loop idle");
    }
    let mut ticker = tokio::time::interval(interval);

    'rounds: loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }

        for (addr, peer) in &peers {
            let addr = addr.as_str();
            let started = Instant::now();
            let outcome = tokio::select! {
                outcome = hub.sync_with_peer(peer.as_ref()) => outcome,
                _ = shutdown.changed() => {
                    tracing::info!(peer = addr, "shutdown during sync, round abandoned");
                    break 'rounds;
                }
            };
            match outcome {
                Ok(Some(stats)) => {
                    metrics.record_sync(&stats);
                    metrics
                        .sync_duration_seconds
                        .observe(started.elapsed().as_secs_f64());
                    tracing::info!(
                        peer = addr,
                        merged = stats.messages_merged,
                        failed = stats.messages_failed,
                        "synced with peer"
                    );
                }
                Ok(None) => tracing::debug!(peer = addr, "already in sync"),
                Err(e) => {
                    metrics.sync_failures_total.inc();
                    tracing::warn!(peer = addr, error = %e, "sync with peer failed");
                }
            }
            metrics
                .trie_items
                .set(hub.sync_engine().trie().items() as i64);

            if *shutdown.borrow() {
                break 'rounds;
            }
        }
    }
    tracing::debug!("sync loop stopped");
}

/// Queries a running Hub's status endpoint and prints the result.
async fn query_status(args: cli::StatusArgs) -> Result<()> {
    let client = peer::http_client().context("failed to build HTTP client")?;
    let url = format!("{}/status", peer::base_url(&args.url));
    let response = client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("failed to query {}", url))?;
    let status = response.status();
    if !status.is_success() {
        anyhow::bail!("{} answered HTTP {}", url, status);
    }
    let body = peer::read_limited(response, peer::MAX_RESPONSE_BYTES)
        .await
        .map_err(anyhow::Error::msg)?;
    println!("{}", String::from_utf8_lossy(&body));
    Ok(())
}

fn print_version() {
    println!("hub-node {}", env!("CARGO_PKG_VERSION"));
    println!("rustc    {}", option_env!("RUSTC_VERSION").unwrap_or("unknown"));
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hub_protocol::message::{MessageBody, MessageData, SignerBody};
    use hub_protocol::sync::{SyncRequest, SyncResponse, SyncTransport, TransportPeer};
    use hub_protocol::{HubError, HubResult, Message};

    // -- Helpers ------------------------------------------------------------

    fn running_hub() -> Arc<Hub> {
        let hub = Arc::new(Hub::in_memory().unwrap());
        hub.start().unwrap();
        hub
    }

    /// Answers snapshots from `remote`, then never answers again.
    struct Stalling {
        remote: Arc<Hub>,
    }

    #[async_trait]
    impl SyncTransport for Stalling {
        async fn send(&self, request: SyncRequest) -> HubResult<SyncResponse> {
            if let SyncRequest::GetSnapshot { .. } = request {
                return Ok(self.remote.handle_sync_request(request));
            }
            tokio::time::sleep(Duration::from_secs(3_600)).await;
            Err(HubError::Unavailable("stalled".to_string()))
        }
    }

    // -- Tests --------------------------------------------------------------

    #[tokio::test]
    async fn sync_loop_exits_on_shutdown() {
        let hub = running_hub();
        let metrics = Arc::new(NodeMetrics::new().unwrap());
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(sync_loop(
            hub,
            Vec::new(),
            Duration::from_secs(3600),
            metrics,
            rx,
        ));
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("sync loop should stop")
            .unwrap();
    }

    #[tokio::test]
    async fn unreachable_peer_counts_a_failure() {
        let hub = running_hub();
        let metrics = Arc::new(NodeMetrics::new().unwrap());
        let (tx, rx) = watch::channel(false);

        // Reserve a port, then free it so nothing listens there.
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().to_string()
        };
        let peer: Box<dyn SyncPeer> =
            Box::new(peer::http_peer(&peer::http_client().unwrap(), &addr));
        let handle = tokio::spawn(sync_loop(
            hub,
            vec![(addr, peer)],
            Duration::from_secs(3600),
            Arc::clone(&metrics),
            rx,
        ));

        for _ in 0..100 {
            if metrics.sync_failures_total.get() > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(metrics.sync_failures_total.get(), 1);
        tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_abandons_sync_in_flight() {
        let remote = running_hub();
        let grant = Message::new(
            MessageData {
                fid: 1,
                timestamp: 1,
                body: MessageBody::SignerAdd(SignerBody { signer: [0xA1; 32] }),
            },
            [0xC0; 32],
        )
        .unwrap();
        remote.submit_message(&grant).unwrap();

        let hub = running_hub();
        let metrics = Arc::new(NodeMetrics::new().unwrap());
        let (tx, rx) = watch::channel(false);
        let peer: Box<dyn SyncPeer> = Box::new(TransportPeer::new(Stalling { remote }));
        let handle = tokio::spawn(sync_loop(
            Arc::clone(&hub),
            vec![("stalling".to_string(), peer)],
            Duration::from_secs(3600),
            Arc::clone(&metrics),
            rx,
        ));

        for _ in 0..100 {
            if hub.sync_engine().is_syncing() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(hub.sync_engine().is_syncing());

        // Well inside the default request timeout.
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("sync loop should abandon the round")
            .unwrap();
        assert!(!hub.sync_engine().is_syncing());
        assert_eq!(metrics.sync_failures_total.get(), 0);
        hub.stop().await.unwrap();
    }
}
