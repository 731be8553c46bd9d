//! # Hub
//!
//! The top-level runtime entity: one database, the stores over it, and the
//! sync engine mirroring them into a trie. The node binary owns one `Hub`
//! and wires it to HTTP and to its peers.
//!
//! ```text
//! open() -> start() -> [Running: submit / serve / sync] -> stop() -> Stopped
//! ```
//!
//! `start` rebuilds the trie from the stores, so a Hub reopened on an
//! existing database resumes with the same root digest it had before.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{HubError, HubResult};
use crate::message::Message;
use crate::storage::{Engine, HubDb, StoreConfig, StoreEvent};
use crate::sync::{SyncConfig, SyncEngine, SyncPeer, SyncRequest, SyncResponse, SyncStats};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct HubConfig {
    /// Database directory; `None` keeps everything in a temporary database.
    pub db_path: Option<PathBuf>,
    pub store: StoreConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HubStatus {
    /// Opened but not started, or stopped.
    Stopped,
    Running,
}

// ---------------------------------------------------------------------------
// Hub
// ---------------------------------------------------------------------------

pub struct Hub {
    db: Arc<HubDb>,
    sync_engine: Arc<SyncEngine>,
    status: RwLock<HubStatus>,
}

impl Hub {
    pub fn open(config: HubConfig) -> HubResult<Self> {
        let db = match &config.db_path {
            Some(path) => HubDb::open(path)?,
            None => HubDb::open_temporary()?,
        };
        let db = Arc::new(db);
        let engine = Arc::new(Engine::new(Arc::clone(&db), &config.store));
        let sync_engine = Arc::new(SyncEngine::new(engine, config.sync));
        Ok(Self {
            db,
            sync_engine,
            status: RwLock::new(HubStatus::Stopped),
        })
    }

    /// A Hub over a temporary database with default limits.
    pub fn in_memory() -> HubResult<Self> {
        Self::open(HubConfig::default())
    }

    pub fn start(&self) -> HubResult<()> {
        self.sync_engine.initialize()?;
        *self.status.write() = HubStatus::Running;
        info!(items = self.sync_engine.trie().items(), "hub started");
        Ok(())
    }

    /// Interrupt any running sync and flush the database.
    pub async fn stop(&self) -> HubResult<()> {
        *self.status.write() = HubStatus::Stopped;
        self.sync_engine.stop().await;
        self.db.flush()?;
        info!("hub stopped");
        Ok(())
    }

    pub fn status(&self) -> HubStatus {
        *self.status.read()
    }

    pub fn db(&self) -> &Arc<HubDb> {
        &self.db
    }

    pub fn engine(&self) -> &Arc<Engine> {
        self.sync_engine.engine()
    }

    pub fn sync_engine(&self) -> &Arc<SyncEngine> {
        &self.sync_engine
    }

    // -- Operations -------------------------------------------------------------

    pub fn submit_message(&self, message: &Message) -> HubResult<Vec<StoreEvent>> {
        self.sync_engine.submit_message(message)
    }

    pub fn handle_sync_request(&self, request: SyncRequest) -> SyncResponse {
        self.sync_engine.process_sync_request(request)
    }

    /// One reconciliation round against `peer`. `Ok(None)` when the peer's
    /// snapshot already matches ours.
    pub async fn sync_with_peer(&self, peer: &dyn SyncPeer) -> HubResult<Option<SyncStats>> {
        if self.status() != HubStatus::Running {
            return Err(HubError::Unavailable("hub is not running".to_string()));
        }
        let ours = self.sync_engine.snapshot();
        let theirs = peer.get_snapshot_by_prefix(&ours.prefix).await?;
        if !self.sync_engine.should_sync(&theirs.excluded_hashes) {
            debug!("peer snapshot matches ours");
            return Ok(None);
        }
        self.sync_engine
            .perform_sync(&theirs.excluded_hashes, peer)
            .await
            .map(Some)
    }
}
