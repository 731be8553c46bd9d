//! # Prometheus Metrics
//!
//! Operational metrics for the Hub, scraped at `/metrics` on the metrics
//! port. Everything is registered in a private registry under the `hub`
//! namespace.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

use hub_protocol::sync::SyncStats;

#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Messages accepted through `POST /messages`.
    pub messages_submitted_total: IntCounter,
    /// Messages rejected through `POST /messages`, by error code.
    pub messages_rejected_total: IntCounterVec,
    /// Sync rounds that ran against a peer.
    pub sync_runs_total: IntCounter,
    /// Sync rounds that failed before completing.
    pub sync_failures_total: IntCounter,
    /// Messages merged while syncing.
    pub sync_messages_merged_total: IntCounter,
    /// Records currently in the sync trie.
    pub trie_items: IntGauge,
    /// Wall-clock duration of a sync round.
    pub sync_duration_seconds: Histogram,
}

impl NodeMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("hub".into()), None)?;

        let messages_submitted_total = IntCounter::new(
            "messages_submitted_total",
            "Messages merged through the HTTP API",
        )?;
        registry.register(Box::new(messages_submitted_total.clone()))?;

        let messages_rejected_total = IntCounterVec::new(
            Opts::new(
                "messages_rejected_total",
                "Messages rejected through the HTTP API, by error code",
            ),
            &["code"],
        )?;
        registry.register(Box::new(messages_rejected_total.clone()))?;

        let sync_runs_total = IntCounter::new("sync_runs_total", "Sync rounds run against peers")?;
        registry.register(Box::new(sync_runs_total.clone()))?;

        let sync_failures_total =
            IntCounter::new("sync_failures_total", "Sync rounds that failed")?;
        registry.register(Box::new(sync_failures_total.clone()))?;

        let sync_messages_merged_total = IntCounter::new(
            "sync_messages_merged_total",
            "Messages merged from peers during sync",
        )?;
        registry.register(Box::new(sync_messages_merged_total.clone()))?;

        let trie_items = IntGauge::new("trie_items", "Records in the sync trie")?;
        registry.register(Box::new(trie_items.clone()))?;

        let sync_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("sync_duration_seconds", "Duration of one sync round in seconds")
                .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        )?;
        registry.register(Box::new(sync_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            messages_submitted_total,
            messages_rejected_total,
            sync_runs_total,
            sync_failures_total,
            sync_messages_merged_total,
            trie_items,
            sync_duration_seconds,
        })
    }

    pub fn record_sync(&self, stats: &SyncStats) {
        self.sync_runs_total.inc();
        self.sync_messages_merged_total
            .inc_by(stats.messages_merged as u64);
    }

    /// Render all metrics in the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics`.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
