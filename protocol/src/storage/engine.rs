//! # Engine
//!
//! Aggregates the six entity stores over one database handle and applies
//! the rules that span them:
//!
//! 1. **Signer authorization.** Every non-signer message must be signed by
//!    a key with a winning `SignerAdd` for the same fid. Otherwise the merge
//!    fails with `bad_request.unknown_signer`, which the sync engine treats
//!    as "fetch this fid's signer messages and retry".
//! 2. **Revocation.** Merging a `SignerRemove` deletes everything the
//!    revoked key signed for that fid, in every non-signer store.
//! 3. **Pruning.** After each merge the fid's set in the target store is
//!    pruned back to its configured limit.
//!
//! Each call returns the full list of `StoreEvent`s it caused, in commit
//! order, so the caller can mirror them into the trie.
//!
//! The engine does not serialize merges across stores by itself. The sync
//! engine funnels every merge through one lock, which keeps the signer
//! check and the merge it guards from interleaving with a revocation.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::{
    CAST_PRUNE_LIMIT, FOLLOW_PRUNE_LIMIT, REACTION_PRUNE_LIMIT, SIGNER_PRUNE_LIMIT,
    USER_DATA_PRUNE_LIMIT, VERIFICATION_PRUNE_LIMIT,
};
use crate::error::{BadRequestKind, HubError, HubResult};
use crate::message::{Fid, Message, MessageBody, SignerKey};
use crate::storage::db::{HubDb, IterateOptions};
use crate::storage::events::StoreEvent;
use crate::storage::keys::{self, RootPrefix};
use crate::storage::stores::{
    CastStore, FollowStore, ReactionStore, SignerStore, Store, StoreKind, UserDataStore,
    VerificationStore,
};
use crate::sync::sync_id::SyncId;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Per-fid size limits of each store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub cast_prune_limit: usize,
    pub reaction_prune_limit: usize,
    pub follow_prune_limit: usize,
    pub verification_prune_limit: usize,
    pub signer_prune_limit: usize,
    pub user_data_prune_limit: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cast_prune_limit: CAST_PRUNE_LIMIT,
            reaction_prune_limit: REACTION_PRUNE_LIMIT,
            follow_prune_limit: FOLLOW_PRUNE_LIMIT,
            verification_prune_limit: VERIFICATION_PRUNE_LIMIT,
            signer_prune_limit: SIGNER_PRUNE_LIMIT,
            user_data_prune_limit: USER_DATA_PRUNE_LIMIT,
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct Engine {
    db: Arc<HubDb>,
    casts: CastStore,
    reactions: ReactionStore,
    follows: FollowStore,
    verifications: VerificationStore,
    signers: SignerStore,
    user_data: UserDataStore,
}

impl Engine {
    pub fn new(db: Arc<HubDb>, config: &StoreConfig) -> Self {
        Self {
            casts: CastStore::new(Arc::clone(&db), config.cast_prune_limit),
            reactions: ReactionStore::new(Arc::clone(&db), config.reaction_prune_limit),
            follows: FollowStore::new(Arc::clone(&db), config.follow_prune_limit),
            verifications: VerificationStore::new(
                Arc::clone(&db),
                config.verification_prune_limit,
            ),
            signers: SignerStore::new(Arc::clone(&db), config.signer_prune_limit),
            user_data: UserDataStore::new(Arc::clone(&db), config.user_data_prune_limit),
            db,
        }
    }

    pub fn db(&self) -> &Arc<HubDb> {
        &self.db
    }

    pub fn casts(&self) -> &CastStore {
        &self.casts
    }

    pub fn reactions(&self) -> &ReactionStore {
        &self.reactions
    }

    pub fn follows(&self) -> &FollowStore {
        &self.follows
    }

    pub fn verifications(&self) -> &VerificationStore {
        &self.verifications
    }

    pub fn signers(&self) -> &SignerStore {
        &self.signers
    }

    pub fn user_data(&self) -> &UserDataStore {
        &self.user_data
    }

    // -- Merge ----------------------------------------------------------------

    /// Merge one message and return every event it caused.
    pub fn merge_message(&self, message: &Message) -> HubResult<Vec<StoreEvent>> {
        match &message.data.body {
            MessageBody::SignerAdd(_) => merge_and_prune(&self.signers, message),
            MessageBody::SignerRemove(body) => {
                let mut events = merge_and_prune(&self.signers, message)?;
                events.extend(self.revoke_signer(message.fid(), &body.signer)?);
                Ok(events)
            }
            MessageBody::CastAdd(_) | MessageBody::CastRemove(_) => {
                self.authorize(message)?;
                merge_and_prune(&self.casts, message)
            }
            MessageBody::ReactionAdd(_) | MessageBody::ReactionRemove(_) => {
                self.authorize(message)?;
                merge_and_prune(&self.reactions, message)
            }
            MessageBody::FollowAdd(_) | MessageBody::FollowRemove(_) => {
                self.authorize(message)?;
                merge_and_prune(&self.follows, message)
            }
            MessageBody::VerificationAddEthAddress(_) | MessageBody::VerificationRemove(_) => {
                self.authorize(message)?;
                merge_and_prune(&self.verifications, message)
            }
            MessageBody::UserDataAdd(_) => {
                self.authorize(message)?;
                merge_and_prune(&self.user_data, message)
            }
        }
    }

    /// Merge a batch; each message succeeds or fails on its own.
    pub fn merge_messages(&self, messages: &[Message]) -> Vec<HubResult<Vec<StoreEvent>>> {
        messages.iter().map(|m| self.merge_message(m)).collect()
    }

    fn authorize(&self, message: &Message) -> HubResult<()> {
        if self.signers.is_active_signer(message.fid(), &message.signer)? {
            return Ok(());
        }
        Err(HubError::bad_request(
            BadRequestKind::UnknownSigner,
            format!(
                "signer {} is not active for fid {}",
                hex::encode(message.signer),
                message.fid()
            ),
        ))
    }

    fn revoke_signer(&self, fid: Fid, signer: &SignerKey) -> HubResult<Vec<StoreEvent>> {
        let mut events = self.casts.revoke_messages_by_signer(fid, signer)?;
        events.extend(self.reactions.revoke_messages_by_signer(fid, signer)?);
        events.extend(self.follows.revoke_messages_by_signer(fid, signer)?);
        events.extend(self.verifications.revoke_messages_by_signer(fid, signer)?);
        events.extend(self.user_data.revoke_messages_by_signer(fid, signer)?);
        if !events.is_empty() {
            debug!(fid, revoked = events.len(), "revoked messages of removed signer");
        }
        Ok(events)
    }

    // -- Reads ------------------------------------------------------------------

    /// Every stored message of every fid, in key order.
    pub fn get_all_messages(&self) -> HubResult<Vec<Message>> {
        let prefix = [RootPrefix::User as u8];
        let mut messages = Vec::new();
        for entry in self.db.iterate_prefix(&prefix, IterateOptions::default()) {
            let (key, value) = entry?;
            if keys::is_message_key(&key) {
                messages.push(Message::decode(&value)?);
            }
        }
        Ok(messages)
    }

    pub fn get_all_signer_messages_by_fid(&self, fid: Fid) -> HubResult<Vec<Message>> {
        self.signers.get_all_messages_by_fid(fid)
    }

    /// Look up stored messages by sync id. Ids with no stored message
    /// (pruned, revoked or superseded since they were advertised) are
    /// skipped.
    pub fn get_messages_by_sync_ids(&self, sync_ids: &[SyncId]) -> HubResult<Vec<Message>> {
        let mut messages = Vec::with_capacity(sync_ids.len());
        for sync_id in sync_ids {
            let Some(primary_key) = self.db.get(&keys::message_by_hash_key(&sync_id.hash()))?
            else {
                continue;
            };
            let Some(bytes) = self.db.get(&primary_key)? else {
                continue;
            };
            let message = Message::decode(&bytes)?;
            if SyncId::from_message(&message) == *sync_id {
                messages.push(message);
            }
        }
        Ok(messages)
    }
}

/// Merge into `store`, then prune the author's set back under its limit.
fn merge_and_prune<K: StoreKind>(
    store: &Store<K>,
    message: &Message,
) -> HubResult<Vec<StoreEvent>> {
    let mut events = vec![store.merge(message)?];
    // The merge is committed; a failed prune only delays trimming.
    match store.prune_messages(message.fid()) {
        Ok(pruned) => events.extend(pruned),
        Err(e) => warn!(store = store.name(), fid = message.fid(), error = %e, "prune failed"),
    }
    Ok(events)
}
