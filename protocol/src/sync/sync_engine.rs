//! # Sync Engine
//!
//! Keeps the Hub's Merkle trie in step with its stores and reconciles the
//! trie against peers. Two Hubs that hold the same messages hold identical
//! tries, so reconciliation is a top-down digest comparison that only walks
//! into subtrees where the peers disagree.
//!
//! ## Protocol Overview
//!
//! ```text
//! Local Hub                                   Peer
//! ─────────                                   ────
//!   │  GetSnapshot { our snapshot prefix }     │
//!   │─────────────────────────────────────────>│
//!   │  Snapshot { excluded_hashes, ... }       │
//!   │<─────────────────────────────────────────│
//!   │  (divergence prefix computed locally)    │
//!   │  GetSyncMetadataByPrefix { prefix }      │   repeated for every child
//!   │─────────────────────────────────────────>│   whose digest differs,
//!   │  SyncMetadata(node + children)           │   until a subtree is small
//!   │<─────────────────────────────────────────│
//!   │  GetAllSyncIdsByPrefix { prefix }        │
//!   │─────────────────────────────────────────>│
//!   │  SyncIds(...)                            │
//!   │<─────────────────────────────────────────│
//!   │  GetAllMessagesBySyncIds { missing }     │   in chunks, oldest first
//!   │─────────────────────────────────────────>│
//!   │  Messages(...)                           │
//!   │<─────────────────────────────────────────│
//! ```
//!
//! ## Design Decisions
//!
//! - **The trie is a mirror.** It changes only by applying the events the
//!   stores return. `submit_message` holds the trie write lock across the
//!   merge and the event application, so trie mutations land in the same
//!   order as store commits and every merge in the Hub is serialized.
//!
//! - **One sync at a time.** `perform_sync` claims an atomic flag and
//!   releases it on every exit path through a guard. A second caller gets
//!   `Unavailable` instead of waiting.
//!
//! - **Bounded fan-out.** The recursive walk runs sibling branches
//!   concurrently, but every peer request first takes a permit from one
//!   semaphore shared by the whole walk, and is cut off by a timeout.
//!
//! - **Failures stay local.** A failed metadata or id fetch drops that
//!   subtree for this round; a failed merge is counted and skipped. The
//!   next round notices whatever is still divergent.
//!
//! - **Transport-agnostic.** `process_sync_request` answers the server side
//!   of the protocol; the engine itself implements `SyncTransport`, so two
//!   in-process Hubs can sync without a network.

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{join_all, BoxFuture};
use parking_lot::{RwLock, RwLockReadGuard};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::{
    HASHES_PER_FETCH, MAX_CONCURRENT_SYNC_REQUESTS, MAX_VALUES_RETURNED_PER_CALL,
    SYNC_INTERRUPT_TIMEOUT, SYNC_REQUEST_TIMEOUT, SYNC_THRESHOLD_SECS,
};
use crate::crypto::Hash160;
use crate::error::{HubError, HubResult};
use crate::message::{farcaster_time, Fid, Message};
use crate::storage::{Engine, StoreEvent};
use crate::sync::merkle_trie::MerkleTrie;
use crate::sync::peer::{SyncPeer, SyncTransport};
use crate::sync::sync_id::{timestamp_prefix, SyncId};
use crate::sync::trie_node::{NodeMetadata, TrieSnapshot};

// ---------------------------------------------------------------------------
// Sync Request / Response
// ---------------------------------------------------------------------------

/// Requests one Hub sends another while reconciling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncRequest {
    /// "What does your trie look like along this path?"
    GetSnapshot { prefix: Vec<u8> },

    /// "Give me the digest and count of this node and its children."
    GetSyncMetadataByPrefix { prefix: Vec<u8> },

    /// "List every sync id under this prefix." Capped per call.
    GetAllSyncIdsByPrefix { prefix: Vec<u8> },

    /// "Send me these messages." Ids the peer no longer holds are skipped.
    GetAllMessagesBySyncIds { sync_ids: Vec<SyncId> },

    /// "Send me every signer grant and revocation of this fid."
    GetAllSignerMessagesByFid { fid: Fid },
}

/// Responses, one per request. Failures travel in-band as `Error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncResponse {
    Snapshot(TrieSnapshot),
    /// `None` when the peer has no node at the prefix.
    SyncMetadata(Option<NodeMetadata>),
    SyncIds(Vec<SyncId>),
    Messages(Vec<Message>),
    Error { code: String, message: String },
}

impl SyncResponse {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Snapshot(_) => "snapshot",
            Self::SyncMetadata(_) => "sync_metadata",
            Self::SyncIds(_) => "sync_ids",
            Self::Messages(_) => "messages",
            Self::Error { .. } => "error",
        }
    }

    fn error(e: &HubError) -> Self {
        Self::Error {
            code: e.code(),
            message: e.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// SyncConfig
// ---------------------------------------------------------------------------

/// Tuning knobs for reconciliation.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Snapshots are taken at the current time floored to a multiple of
    /// this, leaving in-flight writes out of the comparison.
    pub sync_threshold_secs: u32,

    /// A subtree with at most this many messages has all its ids fetched in
    /// one request; also the chunk size of message fetches. Capped at
    /// `MAX_VALUES_RETURNED_PER_CALL`, the most a peer answers per call.
    pub hashes_per_fetch: usize,

    /// Peer requests in flight at once across the whole recursive walk.
    pub max_concurrent_requests: usize,

    /// Per-request timeout; an expired request counts as `Unavailable`.
    pub request_timeout: Duration,

    /// How long `stop` waits for an active sync to drain.
    pub interrupt_timeout: Duration,
}

impl SyncConfig {
    /// `hashes_per_fetch` clamped into `1..=MAX_VALUES_RETURNED_PER_CALL`.
    pub fn fetch_batch(&self) -> usize {
        self.hashes_per_fetch.clamp(1, MAX_VALUES_RETURNED_PER_CALL)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sync_threshold_secs: SYNC_THRESHOLD_SECS,
            hashes_per_fetch: HASHES_PER_FETCH,
            max_concurrent_requests: MAX_CONCURRENT_SYNC_REQUESTS,
            request_timeout: SYNC_REQUEST_TIMEOUT,
            interrupt_timeout: SYNC_INTERRUPT_TIMEOUT,
        }
    }
}

// ---------------------------------------------------------------------------
// SyncStats
// ---------------------------------------------------------------------------

/// What one `perform_sync` round did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    /// Ids the peer holds that we did not.
    pub ids_fetched: usize,
    /// Messages merged, signer messages fetched for retries included.
    pub messages_merged: usize,
    /// Messages rejected by the stores or lost to failed fetches. Messages
    /// already present are not counted.
    pub messages_failed: usize,
    /// Fids whose signer messages were fetched to unblock a merge.
    pub signer_retries: usize,
}

// ---------------------------------------------------------------------------
// SyncEngine
// ---------------------------------------------------------------------------

/// Clears the in-progress flag however `perform_sync` exits.
struct SyncingGuard<'a>(&'a AtomicBool);

impl Drop for SyncingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct SyncEngine {
    engine: Arc<Engine>,
    trie: RwLock<MerkleTrie>,
    config: SyncConfig,
    syncing: AtomicBool,
    interrupted: AtomicBool,
}

impl SyncEngine {
    pub fn new(engine: Arc<Engine>, mut config: SyncConfig) -> Self {
        if config.hashes_per_fetch != config.fetch_batch() {
            warn!(
                requested = config.hashes_per_fetch,
                max = MAX_VALUES_RETURNED_PER_CALL,
                "hashes_per_fetch out of range, clamped"
            );
            config.hashes_per_fetch = config.fetch_batch();
        }
        Self {
            engine,
            trie: RwLock::new(MerkleTrie::new()),
            config,
            syncing: AtomicBool::new(false),
            interrupted: AtomicBool::new(false),
        }
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Read access to the trie. Merges block while the guard is held.
    pub fn trie(&self) -> RwLockReadGuard<'_, MerkleTrie> {
        self.trie.read()
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    // -- Lifecycle ------------------------------------------------------------

    /// Rebuild the trie from every stored message and accept syncs again.
    pub fn initialize(&self) -> HubResult<()> {
        let mut trie = self.trie.write();
        let mut rebuilt = MerkleTrie::new();
        for message in self.engine.get_all_messages()? {
            rebuilt.insert(&SyncId::from_message(&message));
        }
        *trie = rebuilt;
        self.interrupted.store(false, Ordering::Release);
        info!(
            items = trie.items(),
            root = %hex::encode(trie.root_hash()),
            "sync trie initialized"
        );
        Ok(())
    }

    /// Interrupt an active sync and wait, bounded, for it to drain.
    pub async fn stop(&self) {
        self.interrupted.store(true, Ordering::Release);
        let drained = tokio::time::timeout(self.config.interrupt_timeout, async {
            while self.is_syncing() {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await;
        if drained.is_err() {
            warn!(
                timeout = ?self.config.interrupt_timeout,
                "sync did not stop in time"
            );
        }
    }

    // -- Merge path -------------------------------------------------------------

    /// Merge a message into the stores and mirror the result into the trie.
    pub fn submit_message(&self, message: &Message) -> HubResult<Vec<StoreEvent>> {
        let mut trie = self.trie.write();
        let events = self.engine.merge_message(message)?;
        for event in &events {
            apply_event(&mut trie, event);
        }
        Ok(events)
    }

    // -- Local views ------------------------------------------------------------

    /// Now, floored to a multiple of the sync threshold.
    pub fn snapshot_timestamp(&self) -> u32 {
        // A clock before the network epoch snapshots at zero.
        let now = farcaster_time().unwrap_or_default();
        let threshold = self.config.sync_threshold_secs.max(1);
        now / threshold * threshold
    }

    pub fn snapshot(&self) -> TrieSnapshot {
        self.snapshot_at(self.snapshot_timestamp())
    }

    pub fn snapshot_at(&self, timestamp: u32) -> TrieSnapshot {
        self.trie.read().get_snapshot(&timestamp_prefix(timestamp))
    }

    /// True when the peer's excluded hashes differ from ours and no sync is
    /// already running.
    pub fn should_sync(&self, their_excluded_hashes: &[Hash160]) -> bool {
        if self.is_syncing() {
            debug!("sync already in progress");
            return false;
        }
        self.snapshot().excluded_hashes != their_excluded_hashes
    }

    pub fn get_trie_node_metadata(&self, prefix: &[u8]) -> Option<NodeMetadata> {
        self.trie.read().get_node_metadata(prefix)
    }

    pub fn get_ids_by_prefix(&self, prefix: &[u8]) -> Vec<SyncId> {
        self.trie.read().get_all_values(prefix)
    }

    // -- Server side ------------------------------------------------------------

    /// Answer one reconciliation request from a peer. Read-only.
    pub fn process_sync_request(&self, request: SyncRequest) -> SyncResponse {
        match request {
            SyncRequest::GetSnapshot { prefix } => {
                SyncResponse::Snapshot(self.trie.read().get_snapshot(&prefix))
            }

            SyncRequest::GetSyncMetadataByPrefix { prefix } => {
                SyncResponse::SyncMetadata(self.get_trie_node_metadata(&prefix))
            }

            SyncRequest::GetAllSyncIdsByPrefix { prefix } => {
                SyncResponse::SyncIds(self.get_ids_by_prefix(&prefix))
            }

            SyncRequest::GetAllMessagesBySyncIds { mut sync_ids } => {
                sync_ids.truncate(MAX_VALUES_RETURNED_PER_CALL);
                match self.engine.get_messages_by_sync_ids(&sync_ids) {
                    Ok(messages) => SyncResponse::Messages(messages),
                    Err(e) => SyncResponse::error(&e),
                }
            }

            SyncRequest::GetAllSignerMessagesByFid { fid } => {
                match self.engine.get_all_signer_messages_by_fid(fid) {
                    Ok(messages) => SyncResponse::Messages(messages),
                    Err(e) => SyncResponse::error(&e),
                }
            }
        }
    }

    // -- Client side --------------------------------------------------------------

    /// Pull everything `peer` holds that we lack, starting from where our
    /// snapshot and the peer's excluded hashes diverge.
    ///
    /// # Errors
    ///
    /// `Unavailable` if another sync is running or the engine was stopped.
    /// Peer and merge failures inside the round are logged and counted in
    /// the returned stats instead.
    pub async fn perform_sync(
        &self,
        their_excluded_hashes: &[Hash160],
        peer: &dyn SyncPeer,
    ) -> HubResult<SyncStats> {
        if self
            .syncing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(HubError::Unavailable("sync already in progress".to_string()));
        }
        let _guard = SyncingGuard(&self.syncing);

        if self.interrupted.load(Ordering::Acquire) {
            return Err(HubError::Unavailable("sync engine is stopped".to_string()));
        }

        let snapshot = self.snapshot();
        let divergence_prefix = self
            .trie
            .read()
            .get_divergence_prefix(&snapshot.prefix, their_excluded_hashes);
        info!(
            prefix = %String::from_utf8_lossy(&divergence_prefix),
            "starting sync"
        );

        let permits = Semaphore::new(self.config.max_concurrent_requests.max(1));
        let mut missing = self
            .fetch_missing_sync_ids(divergence_prefix, peer, &permits)
            .await;
        missing.sort();
        missing.dedup();

        let mut stats = SyncStats {
            ids_fetched: missing.len(),
            ..SyncStats::default()
        };
        self.fetch_and_merge(&missing, peer, &permits, &mut stats).await;

        info!(
            ids = stats.ids_fetched,
            merged = stats.messages_merged,
            failed = stats.messages_failed,
            signer_retries = stats.signer_retries,
            "sync complete"
        );
        Ok(stats)
    }

    /// Walk the peer's trie under `prefix`, descending only into children
    /// whose digest differs from ours, and collect the ids we lack.
    fn fetch_missing_sync_ids<'a>(
        &'a self,
        prefix: Vec<u8>,
        peer: &'a dyn SyncPeer,
        permits: &'a Semaphore,
    ) -> BoxFuture<'a, Vec<SyncId>> {
        Box::pin(async move {
            let theirs = match self
                .request(permits, peer.get_sync_metadata_by_prefix(&prefix))
                .await
            {
                Ok(Some(node)) => node,
                Ok(None) => return Vec::new(),
                Err(e) => {
                    warn!(
                        prefix = %String::from_utf8_lossy(&prefix),
                        error = %e,
                        "failed to fetch sync metadata"
                    );
                    return Vec::new();
                }
            };

            if theirs.num_messages <= self.config.hashes_per_fetch {
                match self
                    .request(permits, peer.get_all_sync_ids_by_prefix(&prefix))
                    .await
                {
                    // A short list means the peer capped its answer; the
                    // children are walked instead, unless there are none.
                    Ok(ids) if ids.len() >= theirs.num_messages || theirs.children.is_empty() => {
                        let trie = self.trie.read();
                        return ids.into_iter().filter(|id| !trie.exists(id)).collect();
                    }
                    Ok(ids) => {
                        debug!(
                            prefix = %String::from_utf8_lossy(&prefix),
                            expected = theirs.num_messages,
                            received = ids.len(),
                            "sync id list truncated, descending"
                        );
                    }
                    Err(e) => {
                        warn!(
                            prefix = %String::from_utf8_lossy(&prefix),
                            expected = theirs.num_messages,
                            error = %e,
                            "failed to fetch sync ids"
                        );
                        return Vec::new();
                    }
                }
            }

            let ours = self.get_trie_node_metadata(&prefix);
            let branches = theirs
                .children
                .iter()
                .filter(|child| {
                    let our_hash = ours
                        .as_ref()
                        .zip(child.prefix.last())
                        .and_then(|(node, &ch)| node.child(ch))
                        .map(|c| c.hash);
                    our_hash != Some(child.hash)
                })
                .map(|child| self.fetch_missing_sync_ids(child.prefix.clone(), peer, permits));

            join_all(branches).await.into_iter().flatten().collect()
        })
    }

    /// Fetch `ids` in chunks, oldest first, and merge them. A merge that
    /// fails for an unknown signer triggers one fetch of that fid's signer
    /// messages and one retry.
    async fn fetch_and_merge(
        &self,
        ids: &[SyncId],
        peer: &dyn SyncPeer,
        permits: &Semaphore,
        stats: &mut SyncStats,
    ) {
        let mut signer_synced: HashSet<Fid> = HashSet::new();

        for chunk in ids.chunks(self.config.hashes_per_fetch) {
            if self.interrupted.load(Ordering::Acquire) {
                warn!("sync interrupted");
                return;
            }

            let mut messages = match self
                .request(permits, peer.get_all_messages_by_sync_ids(chunk))
                .await
            {
                Ok(messages) => messages,
                Err(e) => {
                    warn!(count = chunk.len(), error = %e, "failed to fetch messages");
                    stats.messages_failed += chunk.len();
                    continue;
                }
            };
            let missing = chunk.len().saturating_sub(messages.len());
            if missing > 0 {
                debug!(requested = chunk.len(), missing, "peer returned fewer messages than asked");
                stats.messages_failed += missing;
            }
            messages.sort_by_key(SyncId::from_message);

            for message in messages {
                match self.submit_message(&message) {
                    Ok(_) => stats.messages_merged += 1,
                    // Arrived meanwhile, e.g. with a signer retry.
                    Err(HubError::Duplicate(_)) => {}
                    Err(e) if e.is_unknown_signer() && signer_synced.insert(message.fid()) => {
                        stats.signer_retries += 1;
                        self.sync_signers(message.fid(), peer, permits, stats).await;
                        match self.submit_message(&message) {
                            Ok(_) => stats.messages_merged += 1,
                            Err(e) => self.record_failure(&message, &e, stats),
                        }
                    }
                    Err(e) => self.record_failure(&message, &e, stats),
                }
            }
        }
    }

    async fn sync_signers(
        &self,
        fid: Fid,
        peer: &dyn SyncPeer,
        permits: &Semaphore,
        stats: &mut SyncStats,
    ) {
        let mut messages = match self
            .request(permits, peer.get_all_signer_messages_by_fid(fid))
            .await
        {
            Ok(messages) => messages,
            Err(e) => {
                warn!(fid, error = %e, "failed to fetch signer messages");
                return;
            }
        };
        messages.sort_by_key(SyncId::from_message);
        for message in messages {
            // Already-known signer messages come back as duplicates.
            if self.submit_message(&message).is_ok() {
                stats.messages_merged += 1;
            }
        }
    }

    fn record_failure(&self, message: &Message, error: &HubError, stats: &mut SyncStats) {
        debug!(
            fid = message.fid(),
            sync_id = %SyncId::from_message(message),
            error = %error,
            "failed to merge synced message"
        );
        stats.messages_failed += 1;
    }

    /// Issue one peer request under the shared permit and timeout.
    async fn request<T>(
        &self,
        permits: &Semaphore,
        request: impl Future<Output = HubResult<T>>,
    ) -> HubResult<T> {
        if self.interrupted.load(Ordering::Acquire) {
            return Err(HubError::Unavailable("sync interrupted".to_string()));
        }
        let _permit = permits
            .acquire()
            .await
            .map_err(|_| HubError::Unavailable("sync request limiter closed".to_string()))?;
        match tokio::time::timeout(self.config.request_timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(HubError::Unavailable(format!(
                "peer request timed out after {:?}",
                self.config.request_timeout
            ))),
        }
    }
}

/// Mirror one store event into the trie.
fn apply_event(trie: &mut MerkleTrie, event: &StoreEvent) {
    match event {
        StoreEvent::MergeMessage {
            message,
            deleted_messages,
        } => {
            for deleted in deleted_messages {
                trie.delete(&SyncId::from_message(deleted));
            }
            trie.insert(&SyncId::from_message(message));
        }
        StoreEvent::PruneMessage { message } | StoreEvent::RevokeMessage { message } => {
            trie.delete(&SyncId::from_message(message));
        }
    }
}

#[async_trait]
impl SyncTransport for SyncEngine {
    async fn send(&self, request: SyncRequest) -> HubResult<SyncResponse> {
        Ok(self.process_sync_request(request))
    }
}
