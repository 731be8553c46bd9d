//! # HTTP Sync Transport
//!
//! Carries `SyncRequest`s to a remote Hub's `POST /sync` endpoint as JSON.
//! Wrapped in a `TransportPeer`, it lets the local sync engine treat a
//! remote Hub as a `SyncPeer`.
//!
//! All peers share one pooled `reqwest::Client`, so connections are kept
//! alive across the many small requests of a sync round. Response bodies
//! are read chunk by chunk and abandoned past `MAX_RESPONSE_BYTES`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;

use hub_protocol::sync::{SyncRequest, SyncResponse, SyncTransport, TransportPeer};
use hub_protocol::{HubError, HubResult};

/// Largest response body accepted from a peer. A full page of messages
/// stays well below this.
pub const MAX_RESPONSE_BYTES: usize = 32 * 1024 * 1024;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Build the client shared by every peer.
pub fn http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .pool_idle_timeout(POOL_IDLE_TIMEOUT)
        .user_agent(concat!("hub-node/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// A remote Hub reached through its HTTP API.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client, addr: &str) -> Self {
        Self {
            client,
            base_url: base_url(addr),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Sync peer backed by a remote Hub.
pub type HttpPeer = TransportPeer<HttpTransport>;

pub fn http_peer(client: &reqwest::Client, addr: &str) -> HttpPeer {
    TransportPeer::new(HttpTransport::new(client.clone(), addr))
}

#[async_trait]
impl SyncTransport for HttpTransport {
    async fn send(&self, request: SyncRequest) -> HubResult<SyncResponse> {
        let body = serde_json::to_vec(&request)
            .map_err(|e| HubError::Unavailable(format!("failed to encode request: {}", e)))?;
        let url = format!("{}/sync", self.base_url);
        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| HubError::Unavailable(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HubError::Unavailable(format!(
                "{} answered with HTTP {}",
                url, status
            )));
        }
        let body = read_limited(response, MAX_RESPONSE_BYTES)
            .await
            .map_err(|e| HubError::Unavailable(format!("{}: {}", url, e)))?;
        serde_json::from_slice(&body)
            .map_err(|e| HubError::Unavailable(format!("malformed sync response: {}", e)))
    }
}

/// Read a response body, failing once it grows past `limit` bytes.
pub async fn read_limited(mut response: reqwest::Response, limit: usize) -> Result<Vec<u8>, String> {
    if let Some(len) = response.content_length() {
        if len > limit as u64 {
            return Err(format!("response of {} bytes exceeds {} byte limit", len, limit));
        }
    }
    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(|e| e.to_string())? {
        if body.len() + chunk.len() > limit {
            return Err(format!("response exceeds {} byte limit", limit));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

/// `host:port` or a full `http(s)://` URL, without a trailing slash.
pub fn base_url(addr: &str) -> String {
    let addr = addr.trim_end_matches('/');
    if addr.starts_with("http://") || addr.starts_with("https://") {
        addr.to_string()
    } else {
        format!("http://{}", addr)
    }
}
