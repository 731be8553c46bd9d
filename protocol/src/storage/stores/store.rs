//! # Generic CRDT Store
//!
//! Every entity store is a two-phase set (or, for user data, an add-only
//! set) keyed per fid by a *slot*: the thing a message is about, such as the
//! followed fid or the reacted-to cast. At most one message wins a slot at a
//! time. `Store<K>` owns that rule once and each entity plugs in a
//! `StoreKind` describing its slots and indices.
//!
//! ## Persisted layout per merged message
//!
//! ```text
//! [User] fid [K::MESSAGE_POSTFIX] sync_id        -> encoded message
//! [User] fid [K::ADDS_POSTFIX | REMOVES] target  -> sync_id   (slot winner)
//! [User] fid [BySigner] signer [postfix] sync_id -> ()
//! [MessagesByHash] hash                          -> primary key
//! secondary / owner index entries (adds only)
//! ```
//!
//! All of it is written (and the loser's entries deleted) in one atomic
//! batch, so a reader never observes a half-merged slot.
//!
//! ## Design Decisions
//!
//! - **One ordering everywhere.** `message_compare` ranks by timestamp,
//!   then Remove above Add, then hash bytes. Merge, prune and the
//!   cross-fid owner check all use it.
//! - **Exact equality is a duplicate.** The same message merged twice
//!   returns `Duplicate` in every store, never a silent success.
//! - **Per-fid serialization.** Read-compare-write runs under a mutex from
//!   a `DashMap` keyed by fid. Stores whose indices span fids take a
//!   store-wide mutex instead.

use std::cmp::Ordering;
use std::marker::PhantomData;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{BadRequestKind, HubError, HubResult};
use crate::message::{Fid, Message, MessageBody, SignerKey};
use crate::storage::db::{HubDb, IterateOptions, WriteBatch};
use crate::storage::events::StoreEvent;
use crate::storage::keys::{self, UserPostfix};
use crate::sync::sync_id::SyncId;

/// Value of pure index entries; the key carries everything.
const EMPTY: [u8; 0] = [];

// ---------------------------------------------------------------------------
// StoreKind
// ---------------------------------------------------------------------------

/// Which half of a two-phase set a message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Add,
    Remove,
}

/// The entity-specific half of a store.
pub trait StoreKind: Send + Sync + 'static {
    /// Name used in logs and error messages.
    const NAME: &'static str;
    /// Postfix of the primary records (adds and removes share it).
    const MESSAGE_POSTFIX: UserPostfix;
    const ADDS_POSTFIX: UserPostfix;
    /// `None` for add-only sets.
    const REMOVES_POSTFIX: Option<UserPostfix>;
    /// A remove beats an add for the same slot regardless of timestamps.
    const REMOVE_ALWAYS_WINS: bool = false;
    /// Merges touch index entries owned by other fids.
    const SERIALIZE_ACROSS_FIDS: bool = false;

    /// `None` when the body is not one of this store's kinds.
    fn side(body: &MessageBody) -> Option<Side>;

    /// Slot key of the message within its fid.
    fn target(message: &Message) -> Option<Vec<u8>>;

    /// Global secondary index entries written for a winning add.
    fn secondary_index_keys(_message: &Message, _sync_id: &SyncId) -> Vec<Vec<u8>> {
        Vec::new()
    }

    /// Key of a store-wide uniqueness index: at most one fid owns it.
    fn owner_key(_body: &MessageBody) -> Option<Vec<u8>> {
        None
    }
}

/// Total order over messages competing for one slot.
pub fn message_compare(a: &Message, b: &Message) -> Ordering {
    a.timestamp()
        .cmp(&b.timestamp())
        .then_with(|| a.is_remove().cmp(&b.is_remove()))
        .then_with(|| a.hash.cmp(&b.hash))
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

pub struct Store<K: StoreKind> {
    db: Arc<HubDb>,
    prune_limit: usize,
    fid_locks: DashMap<Fid, Arc<Mutex<()>>>,
    store_lock: Mutex<()>,
    _kind: PhantomData<fn() -> K>,
}

impl<K: StoreKind> Store<K> {
    pub fn new(db: Arc<HubDb>, prune_limit: usize) -> Self {
        Self {
            db,
            prune_limit,
            fid_locks: DashMap::new(),
            store_lock: Mutex::new(()),
            _kind: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        K::NAME
    }

    pub fn prune_limit(&self) -> usize {
        self.prune_limit
    }

    pub(crate) fn db(&self) -> &HubDb {
        &self.db
    }

    /// Run `f` with this store's merge lock for `fid` held.
    fn with_lock<R>(&self, fid: Fid, f: impl FnOnce() -> R) -> R {
        if K::SERIALIZE_ACROSS_FIDS {
            let _guard = self.store_lock.lock();
            return f();
        }
        // Clone the Arc out so the shard lock is released before we block.
        let lock = self.fid_locks.entry(fid).or_default().clone();
        let _guard = lock.lock();
        f()
    }

    // -- Merge ----------------------------------------------------------------

    /// Merge one message, returning the `MergeMessage` event on success.
    ///
    /// # Errors
    ///
    /// - `BadRequest(InvalidMessageType)` if the kind belongs to another store.
    /// - `BadRequest(Prunable)` if the add would be pruned immediately.
    /// - `Conflict` if the current winner ranks higher.
    /// - `Duplicate` if this exact message is already merged.
    pub fn merge(&self, message: &Message) -> HubResult<StoreEvent> {
        self.with_lock(message.fid(), || self.merge_locked(message))
    }

    fn merge_locked(&self, message: &Message) -> HubResult<StoreEvent> {
        let side = Self::side_of(message)?;
        let target = Self::target_of(message)?;
        let fid = message.fid();
        let sync_id = SyncId::from_message(message);

        if side == Side::Add && self.is_prunable(message)? {
            return Err(HubError::bad_request(
                BadRequestKind::Prunable,
                format!("{} add {} is older than every kept add", K::NAME, sync_id),
            ));
        }

        let mut batch = self.db.transaction();
        let mut deleted = Vec::new();

        let mut slots = vec![K::ADDS_POSTFIX];
        slots.extend(K::REMOVES_POSTFIX);
        for postfix in slots {
            if let Some(existing) = self.winner(fid, postfix, &target)? {
                Self::resolve(&existing, message)?;
                self.delete_ops(&mut batch, &existing)?;
                deleted.push(existing);
            }
        }

        if side == Side::Add {
            if let Some(existing) = self.foreign_owner(message)? {
                Self::resolve(&existing, message)?;
                self.delete_ops(&mut batch, &existing)?;
                deleted.push(existing);
            }
        }

        self.put_ops(&mut batch, message, side, &target, &sync_id)?;
        self.db.commit(batch)?;

        debug!(
            store = K::NAME,
            fid,
            sync_id = %sync_id,
            deleted = deleted.len(),
            "merged message"
        );
        Ok(StoreEvent::MergeMessage {
            message: message.clone(),
            deleted_messages: deleted,
        })
    }

    /// Ok when `incoming` supersedes `existing`.
    fn resolve(existing: &Message, incoming: &Message) -> HubResult<()> {
        if K::REMOVE_ALWAYS_WINS && existing.is_remove() != incoming.is_remove() {
            return if existing.is_remove() {
                Err(HubError::Conflict(format!(
                    "{} add arrived after its remove",
                    K::NAME
                )))
            } else {
                Ok(())
            };
        }
        match message_compare(existing, incoming) {
            Ordering::Less => Ok(()),
            Ordering::Equal => Err(HubError::Duplicate(format!(
                "{} message {} already merged",
                K::NAME,
                SyncId::from_message(incoming)
            ))),
            Ordering::Greater => Err(HubError::Conflict(format!(
                "{} message {} ranks below the current winner",
                K::NAME,
                SyncId::from_message(incoming)
            ))),
        }
    }

    /// The winning add of another fid holding the same owner key.
    fn foreign_owner(&self, message: &Message) -> HubResult<Option<Message>> {
        let Some(owner_key) = K::owner_key(&message.data.body) else {
            return Ok(None);
        };
        let Some(raw) = self.db.get(&owner_key)? else {
            return Ok(None);
        };
        let owner = keys::decode_fid(&raw)?;
        if owner == message.fid() {
            return Ok(None);
        }
        let target = Self::target_of(message)?;
        self.winner(owner, K::ADDS_POSTFIX, &target)
    }

    // -- Batch helpers ----------------------------------------------------------

    fn put_ops(
        &self,
        batch: &mut WriteBatch,
        message: &Message,
        side: Side,
        target: &[u8],
        sync_id: &SyncId,
    ) -> HubResult<()> {
        let fid = message.fid();
        let primary_key = keys::message_key(fid, K::MESSAGE_POSTFIX, sync_id);
        batch.put(keys::message_by_hash_key(&message.hash), &primary_key);
        batch.put(primary_key, message.encode()?);
        batch.put(
            keys::index_key(fid, Self::index_postfix(side)?, target),
            sync_id.as_bytes(),
        );
        batch.put(
            keys::by_signer_key(fid, &message.signer, K::MESSAGE_POSTFIX, sync_id),
            EMPTY,
        );
        if side == Side::Add {
            for key in K::secondary_index_keys(message, sync_id) {
                batch.put(key, EMPTY);
            }
            if let Some(owner_key) = K::owner_key(&message.data.body) {
                batch.put(owner_key, keys::encode_fid(fid));
            }
        }
        Ok(())
    }

    /// Queue removal of every entry a stored winner owns.
    fn delete_ops(&self, batch: &mut WriteBatch, message: &Message) -> HubResult<()> {
        let fid = message.fid();
        let side = Self::side_of(message)?;
        let target = Self::target_of(message)?;
        let sync_id = SyncId::from_message(message);
        batch.delete(keys::message_key(fid, K::MESSAGE_POSTFIX, &sync_id));
        batch.delete(keys::message_by_hash_key(&message.hash));
        batch.delete(keys::index_key(fid, Self::index_postfix(side)?, &target));
        batch.delete(keys::by_signer_key(
            fid,
            &message.signer,
            K::MESSAGE_POSTFIX,
            &sync_id,
        ));
        if side == Side::Add {
            for key in K::secondary_index_keys(message, &sync_id) {
                batch.delete(key);
            }
            if let Some(owner_key) = K::owner_key(&message.data.body) {
                batch.delete(owner_key);
            }
        }
        Ok(())
    }

    fn side_of(message: &Message) -> HubResult<Side> {
        K::side(&message.data.body).ok_or_else(|| Self::wrong_type(message))
    }

    fn target_of(message: &Message) -> HubResult<Vec<u8>> {
        K::target(message).ok_or_else(|| Self::wrong_type(message))
    }

    fn index_postfix(side: Side) -> HubResult<UserPostfix> {
        match side {
            Side::Add => Ok(K::ADDS_POSTFIX),
            Side::Remove => K::REMOVES_POSTFIX.ok_or_else(|| {
                HubError::bad_request(
                    BadRequestKind::InvalidMessageType,
                    format!("{} store does not accept removes", K::NAME),
                )
            }),
        }
    }

    fn wrong_type(message: &Message) -> HubError {
        HubError::bad_request(
            BadRequestKind::InvalidMessageType,
            format!("{} does not belong in the {} store", message.message_type(), K::NAME),
        )
    }

    // -- Lookups --------------------------------------------------------------

    /// Current winner of a slot, if any.
    fn winner(&self, fid: Fid, postfix: UserPostfix, target: &[u8]) -> HubResult<Option<Message>> {
        let Some(raw) = self.db.get(&keys::index_key(fid, postfix, target))? else {
            return Ok(None);
        };
        let sync_id = SyncId::parse(&raw)
            .map_err(|e| HubError::Unavailable(format!("corrupt {} index: {}", K::NAME, e)))?;
        match self.get_message(fid, &sync_id) {
            Ok(message) => Ok(Some(message)),
            Err(HubError::NotFound(_)) => Err(HubError::Unavailable(format!(
                "{} index points at missing record {}",
                K::NAME,
                sync_id
            ))),
            Err(e) => Err(e),
        }
    }

    pub fn get_message(&self, fid: Fid, sync_id: &SyncId) -> HubResult<Message> {
        match self.db.get(&keys::message_key(fid, K::MESSAGE_POSTFIX, sync_id))? {
            Some(bytes) => Message::decode(&bytes),
            None => Err(HubError::NotFound(format!("{} message {}", K::NAME, sync_id))),
        }
    }

    /// Winning add for `(fid, target)`.
    pub fn get_add(&self, fid: Fid, target: &[u8]) -> HubResult<Message> {
        self.winner(fid, K::ADDS_POSTFIX, target)?
            .ok_or_else(|| HubError::NotFound(format!("no {} add for fid {}", K::NAME, fid)))
    }

    /// Winning remove for `(fid, target)`.
    pub fn get_remove(&self, fid: Fid, target: &[u8]) -> HubResult<Message> {
        let not_found = || HubError::NotFound(format!("no {} remove for fid {}", K::NAME, fid));
        let postfix = K::REMOVES_POSTFIX.ok_or_else(not_found)?;
        self.winner(fid, postfix, target)?.ok_or_else(not_found)
    }

    /// Every stored message of `fid`, oldest first.
    pub fn get_all_messages_by_fid(&self, fid: Fid) -> HubResult<Vec<Message>> {
        let prefix = keys::user_postfix_prefix(fid, K::MESSAGE_POSTFIX);
        self.db
            .iterate_prefix(&prefix, IterateOptions::default())
            .map(|entry| {
                let (_, value) = entry?;
                Message::decode(&value)
            })
            .collect()
    }

    pub fn get_adds_by_fid(&self, fid: Fid) -> HubResult<Vec<Message>> {
        Ok(self
            .get_all_messages_by_fid(fid)?
            .into_iter()
            .filter(|m| K::side(&m.data.body) == Some(Side::Add))
            .collect())
    }

    pub fn get_removes_by_fid(&self, fid: Fid) -> HubResult<Vec<Message>> {
        Ok(self
            .get_all_messages_by_fid(fid)?
            .into_iter()
            .filter(|m| K::side(&m.data.body) == Some(Side::Remove))
            .collect())
    }

    /// Messages of `fid` in this store signed by `signer`, oldest first.
    pub fn get_messages_by_signer(&self, fid: Fid, signer: &SignerKey) -> HubResult<Vec<Message>> {
        let prefix = keys::by_signer_prefix(fid, signer, K::MESSAGE_POSTFIX);
        let mut messages = Vec::new();
        for entry in self.db.iterate_prefix(&prefix, IterateOptions::default()) {
            let (key, _) = entry?;
            let sync_id = keys::parse_sync_id_tail(&key)?;
            messages.push(self.get_message(fid, &sync_id)?);
        }
        Ok(messages)
    }

    /// Resolve a global index range into the messages it points at.
    pub(crate) fn get_by_global_prefix(&self, prefix: &[u8]) -> HubResult<Vec<Message>> {
        let mut messages = Vec::new();
        for entry in self.db.iterate_prefix(prefix, IterateOptions::default()) {
            let (key, _) = entry?;
            let (fid, sync_id) = keys::parse_global_index_tail(&key)?;
            messages.push(self.get_message(fid, &sync_id)?);
        }
        Ok(messages)
    }

    /// Sync ids of the fid's current adds, oldest first.
    fn add_sync_ids(&self, fid: Fid) -> HubResult<Vec<SyncId>> {
        let prefix = keys::user_postfix_prefix(fid, K::ADDS_POSTFIX);
        let mut ids = self
            .db
            .iterate_prefix(&prefix, IterateOptions::default())
            .map(|entry| {
                let (_, value) = entry?;
                SyncId::parse(&value).map_err(|e| {
                    HubError::Unavailable(format!("corrupt {} index: {}", K::NAME, e))
                })
            })
            .collect::<HubResult<Vec<_>>>()?;
        ids.sort();
        Ok(ids)
    }

    // -- Pruning and revocation -----------------------------------------------------

    /// True when the fid's add set is full and `message` is older than all
    /// of it, so it would be pruned right after merging.
    pub fn is_prunable(&self, message: &Message) -> HubResult<bool> {
        let ids = self.add_sync_ids(message.fid())?;
        if ids.len() < self.prune_limit {
            return Ok(false);
        }
        Ok(match ids.first() {
            Some(oldest) => SyncId::from_message(message) < *oldest,
            None => false,
        })
    }

    /// Drop the fid's oldest adds until at most `prune_limit` remain.
    pub fn prune_messages(&self, fid: Fid) -> HubResult<Vec<StoreEvent>> {
        self.with_lock(fid, || {
            let ids = self.add_sync_ids(fid)?;
            if ids.len() <= self.prune_limit {
                return Ok(Vec::new());
            }
            let excess = ids.len() - self.prune_limit;
            let mut batch = self.db.transaction();
            let mut events = Vec::with_capacity(excess);
            for sync_id in &ids[..excess] {
                let message = self.get_message(fid, sync_id)?;
                self.delete_ops(&mut batch, &message)?;
                events.push(StoreEvent::PruneMessage { message });
            }
            self.db.commit(batch)?;
            debug!(store = K::NAME, fid, pruned = events.len(), "pruned messages");
            Ok(events)
        })
    }

    /// Drop every message of `fid` signed by `signer`.
    pub fn revoke_messages_by_signer(
        &self,
        fid: Fid,
        signer: &SignerKey,
    ) -> HubResult<Vec<StoreEvent>> {
        self.with_lock(fid, || {
            let messages = self.get_messages_by_signer(fid, signer)?;
            if messages.is_empty() {
                return Ok(Vec::new());
            }
            let mut batch = self.db.transaction();
            for message in &messages {
                self.delete_ops(&mut batch, message)?;
            }
            self.db.commit(batch)?;
            debug!(store = K::NAME, fid, revoked = messages.len(), "revoked messages");
            Ok(messages
                .into_iter()
                .map(|message| StoreEvent::RevokeMessage { message })
                .collect())
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::stores::follow::FollowStore;
    use crate::storage::stores::reaction::ReactionStore;
    use crate::testing::*;

    // -- Helpers ------------------------------------------------------------

    fn follows(limit: usize) -> FollowStore {
        FollowStore::new(temp_db(), limit)
    }

    fn target(fid: Fid) -> Vec<u8> {
        keys::encode_fid(fid).to_vec()
    }

    // -- 1. Ordering ----------------------------------------------------------

    #[test]
    fn compare_orders_by_time_then_kind_then_hash() {
        let early = follow_add(1, 100, 2);
        let late = follow_add(1, 101, 2);
        assert_eq!(message_compare(&early, &late), Ordering::Less);

        let add = follow_add(1, 100, 2);
        let remove = follow_remove(1, 100, 2);
        assert_eq!(message_compare(&remove, &add), Ordering::Greater);

        assert_eq!(message_compare(&add, &add.clone()), Ordering::Equal);
    }

    // -- 2. Merge ---------------------------------------------------------------

    #[test]
    fn merged_add_is_the_winner() {
        let store = follows(100);
        let msg = follow_add(1, 100, 2);
        let event = store.merge(&msg).unwrap();
        assert!(matches!(event, StoreEvent::MergeMessage { ref deleted_messages, .. } if deleted_messages.is_empty()));
        assert_eq!(store.get_add(1, &target(2)).unwrap(), msg);
        assert!(matches!(store.get_remove(1, &target(2)), Err(HubError::NotFound(_))));
    }

    #[test]
    fn same_message_twice_is_duplicate() {
        let store = follows(100);
        let msg = follow_add(1, 100, 2);
        store.merge(&msg).unwrap();
        let err = store.merge(&msg).unwrap_err();
        assert!(matches!(err, HubError::Duplicate(_)));
    }

    #[test]
    fn older_message_conflicts() {
        let store = follows(100);
        store.merge(&follow_add(1, 200, 2)).unwrap();
        let err = store.merge(&follow_remove(1, 100, 2)).unwrap_err();
        assert!(matches!(err, HubError::Conflict(_)));
        assert_eq!(store.get_add(1, &target(2)).unwrap().timestamp(), 200);
    }

    #[test]
    fn newer_message_supersedes_and_reports_loser() {
        let store = follows(100);
        let old = follow_add(1, 100, 2);
        store.merge(&old).unwrap();
        let remove = follow_remove(1, 150, 2);
        match store.merge(&remove).unwrap() {
            StoreEvent::MergeMessage { deleted_messages, .. } => {
                assert_eq!(deleted_messages, vec![old.clone()])
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(store.get_add(1, &target(2)).is_err());
        assert_eq!(store.get_remove(1, &target(2)).unwrap(), remove);
        // The loser's primary record is gone too.
        assert!(store
            .get_message(1, &SyncId::from_message(&old))
            .is_err());
    }

    #[test]
    fn remove_wins_timestamp_tie_in_either_order() {
        for add_first in [true, false] {
            let store = follows(100);
            let add = follow_add(1, 100, 2);
            let remove = follow_remove(1, 100, 2);
            if add_first {
                store.merge(&add).unwrap();
                store.merge(&remove).unwrap();
            } else {
                store.merge(&remove).unwrap();
                assert!(matches!(store.merge(&add), Err(HubError::Conflict(_))));
            }
            assert_eq!(store.get_remove(1, &target(2)).unwrap(), remove);
            assert!(store.get_add(1, &target(2)).is_err());
        }
    }

    #[test]
    fn later_add_beats_earlier_remove() {
        let store = follows(100);
        store.merge(&follow_remove(1, 100, 2)).unwrap();
        store.merge(&follow_add(1, 101, 2)).unwrap();
        assert!(store.get_add(1, &target(2)).is_ok());
        assert!(store.get_remove(1, &target(2)).is_err());
    }

    #[test]
    fn foreign_kind_is_rejected() {
        let store = follows(100);
        let err = store.merge(&cast_add(1, 100, "hello")).unwrap_err();
        assert_eq!(err.code(), "bad_request.invalid_message_type");
    }

    #[test]
    fn superseding_leaves_no_stale_keys() {
        let store = follows(100);
        store.merge(&follow_add(1, 100, 2)).unwrap();
        let keys_after_first = store.db().len();
        store.merge(&follow_add(1, 101, 2)).unwrap();
        store.merge(&follow_remove(1, 102, 2)).unwrap();
        // message + hash + slot index + by-signer + target index for an
        // add; a remove has no target index entry.
        assert_eq!(keys_after_first, 5);
        assert_eq!(store.db().len(), 4);
    }

    // -- 3. Queries -------------------------------------------------------------

    #[test]
    fn adds_and_removes_by_fid_are_split_and_ordered() {
        let store = follows(100);
        store.merge(&follow_add(1, 300, 4)).unwrap();
        store.merge(&follow_add(1, 100, 2)).unwrap();
        store.merge(&follow_remove(1, 200, 3)).unwrap();
        store.merge(&follow_add(9, 50, 2)).unwrap();

        let adds: Vec<u32> = store.get_adds_by_fid(1).unwrap().iter().map(|m| m.timestamp()).collect();
        assert_eq!(adds, vec![100, 300]);
        assert_eq!(store.get_removes_by_fid(1).unwrap().len(), 1);
        assert_eq!(store.get_all_messages_by_fid(1).unwrap().len(), 3);
    }

    // -- 4. Pruning ---------------------------------------------------------------

    #[test]
    fn prune_drops_oldest_adds() {
        let store = follows(2);
        for (ts, target_fid) in [(100, 2), (300, 3), (200, 4)] {
            store.merge(&follow_add(1, ts, target_fid)).unwrap();
        }
        let events = store.prune_messages(1).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message().timestamp(), 100);
        assert_eq!(store.get_adds_by_fid(1).unwrap().len(), 2);
        assert!(store.prune_messages(1).unwrap().is_empty());
    }

    #[test]
    fn prune_ignores_removes() {
        let store = follows(1);
        store.merge(&follow_remove(1, 50, 7)).unwrap();
        store.merge(&follow_add(1, 100, 2)).unwrap();
        assert!(store.prune_messages(1).unwrap().is_empty());
        assert_eq!(store.get_all_messages_by_fid(1).unwrap().len(), 2);
    }

    #[test]
    fn add_older_than_full_set_is_prunable() {
        let store = follows(2);
        store.merge(&follow_add(1, 200, 2)).unwrap();
        store.merge(&follow_add(1, 300, 3)).unwrap();

        let err = store.merge(&follow_add(1, 100, 4)).unwrap_err();
        assert_eq!(err.code(), "bad_request.prunable");
        // Newer adds are still accepted; the caller prunes afterwards.
        store.merge(&follow_add(1, 400, 5)).unwrap();
    }

    // -- 5. Revocation ------------------------------------------------------------

    #[test]
    fn revoke_by_signer_stays_within_store() {
        let db = temp_db();
        let follow_store = FollowStore::new(Arc::clone(&db), 100);
        let reaction_store = ReactionStore::new(Arc::clone(&db), 100);
        let other = [9u8; 32];

        follow_store.merge(&follow_add(1, 100, 2)).unwrap();
        follow_store
            .merge(&with_signer(follow_add(1, 101, 3), other))
            .unwrap();
        reaction_store.merge(&like(1, 102, cast_id(5, 1))).unwrap();

        let events = follow_store.revoke_messages_by_signer(1, &SIGNER).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), "revoke");
        assert!(follow_store.get_add(1, &target(2)).is_err());
        assert!(follow_store.get_add(1, &target(3)).is_ok());
        assert_eq!(reaction_store.get_messages_by_signer(1, &SIGNER).unwrap().len(), 1);
    }

    // -- 6. Concurrency -----------------------------------------------------------

    #[test]
    fn concurrent_merges_to_one_slot_keep_highest() {
        use std::thread;

        let store = Arc::new(follows(100));
        let messages: Vec<Message> = (0..16)
            .map(|i| {
                if i % 3 == 0 {
                    follow_remove(1, 100 + i, 2)
                } else {
                    follow_add(1, 100 + i, 2)
                }
            })
            .collect();
        let best = messages
            .iter()
            .max_by(|a, b| message_compare(a, b))
            .cloned()
            .unwrap();

        let handles: Vec<_> = messages
            .into_iter()
            .map(|m| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let _ = store.merge(&m);
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("merge thread should not panic");
        }

        let stored = store.get_all_messages_by_fid(1).unwrap();
        assert_eq!(stored, vec![best]);
    }
}
