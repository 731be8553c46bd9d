//! The other side of a sync.
//!
//! `SyncPeer` is what the sync engine's client half consumes. Anything that
//! can carry a `SyncRequest` to another Hub and bring back its
//! `SyncResponse` implements `SyncTransport`; `TransportPeer` turns such a
//! transport into a peer by checking that each response has the expected
//! shape.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{HubError, HubResult};
use crate::message::{Fid, Message};
use crate::sync::sync_engine::{SyncRequest, SyncResponse};
use crate::sync::sync_id::SyncId;
use crate::sync::trie_node::{NodeMetadata, TrieSnapshot};

/// Read-only view of a remote Hub's trie and messages.
#[async_trait]
pub trait SyncPeer: Send + Sync {
    async fn get_snapshot_by_prefix(&self, prefix: &[u8]) -> HubResult<TrieSnapshot>;

    async fn get_sync_metadata_by_prefix(&self, prefix: &[u8]) -> HubResult<Option<NodeMetadata>>;

    async fn get_all_sync_ids_by_prefix(&self, prefix: &[u8]) -> HubResult<Vec<SyncId>>;

    async fn get_all_messages_by_sync_ids(&self, sync_ids: &[SyncId]) -> HubResult<Vec<Message>>;

    async fn get_all_signer_messages_by_fid(&self, fid: Fid) -> HubResult<Vec<Message>>;
}

/// One request, one response.
#[async_trait]
pub trait SyncTransport: Send + Sync {
    async fn send(&self, request: SyncRequest) -> HubResult<SyncResponse>;
}

#[async_trait]
impl<T: SyncTransport + ?Sized> SyncTransport for Arc<T> {
    async fn send(&self, request: SyncRequest) -> HubResult<SyncResponse> {
        (**self).send(request).await
    }
}

// ---------------------------------------------------------------------------
// TransportPeer
// ---------------------------------------------------------------------------

pub struct TransportPeer<T> {
    transport: T,
}

impl<T: SyncTransport> TransportPeer<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

/// Map an in-band error or a mismatched variant to `Unavailable`.
fn unexpected(expected: &str, response: SyncResponse) -> HubError {
    match response {
        SyncResponse::Error { code, message } => {
            HubError::Unavailable(format!("peer failed ({}): {}", code, message))
        }
        other => HubError::Unavailable(format!(
            "expected {} from peer, got {}",
            expected,
            other.kind()
        )),
    }
}

#[async_trait]
impl<T: SyncTransport> SyncPeer for TransportPeer<T> {
    async fn get_snapshot_by_prefix(&self, prefix: &[u8]) -> HubResult<TrieSnapshot> {
        let request = SyncRequest::GetSnapshot {
            prefix: prefix.to_vec(),
        };
        match self.transport.send(request).await? {
            SyncResponse::Snapshot(snapshot) => Ok(snapshot),
            other => Err(unexpected("snapshot", other)),
        }
    }

    async fn get_sync_metadata_by_prefix(&self, prefix: &[u8]) -> HubResult<Option<NodeMetadata>> {
        let request = SyncRequest::GetSyncMetadataByPrefix {
            prefix: prefix.to_vec(),
        };
        match self.transport.send(request).await? {
            SyncResponse::SyncMetadata(metadata) => Ok(metadata),
            other => Err(unexpected("sync metadata", other)),
        }
    }

    async fn get_all_sync_ids_by_prefix(&self, prefix: &[u8]) -> HubResult<Vec<SyncId>> {
        let request = SyncRequest::GetAllSyncIdsByPrefix {
            prefix: prefix.to_vec(),
        };
        match self.transport.send(request).await? {
            SyncResponse::SyncIds(ids) => Ok(ids),
            other => Err(unexpected("sync ids", other)),
        }
    }

    async fn get_all_messages_by_sync_ids(&self, sync_ids: &[SyncId]) -> HubResult<Vec<Message>> {
        let request = SyncRequest::GetAllMessagesBySyncIds {
            sync_ids: sync_ids.to_vec(),
        };
        match self.transport.send(request).await? {
            SyncResponse::Messages(messages) => Ok(messages),
            other => Err(unexpected("messages", other)),
        }
    }

    async fn get_all_signer_messages_by_fid(&self, fid: Fid) -> HubResult<Vec<Message>> {
        match self
            .transport
            .send(SyncRequest::GetAllSignerMessagesByFid { fid })
            .await?
        {
            SyncResponse::Messages(messages) => Ok(messages),
            other => Err(unexpected("messages", other)),
        }
    }
}
