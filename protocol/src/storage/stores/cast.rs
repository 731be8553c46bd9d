//! # Cast Store
//!
//! Casts are the one entity where a remove is final: once a cast hash has
//! been removed, no add for it can win again, whatever its timestamp. The
//! slot is the cast's own hash, so an add and its remove meet in the same
//! slot even though only the remove carries the hash in its body.
//!
//! Two global indices hang off every live cast: replies by parent cast and
//! mentions by mentioned fid.

use crate::error::HubResult;
use crate::message::{CastId, Fid, Message, MessageBody, MessageHash};
use crate::storage::keys::{self, RootPrefix, UserPostfix};
use crate::storage::stores::store::{Side, Store, StoreKind};
use crate::sync::sync_id::SyncId;

pub struct CastKind;

pub type CastStore = Store<CastKind>;

impl StoreKind for CastKind {
    const NAME: &'static str = "cast";
    const MESSAGE_POSTFIX: UserPostfix = UserPostfix::CastMessage;
    const ADDS_POSTFIX: UserPostfix = UserPostfix::CastAdds;
    const REMOVES_POSTFIX: Option<UserPostfix> = Some(UserPostfix::CastRemoves);
    const REMOVE_ALWAYS_WINS: bool = true;

    fn side(body: &MessageBody) -> Option<Side> {
        match body {
            MessageBody::CastAdd(_) => Some(Side::Add),
            MessageBody::CastRemove(_) => Some(Side::Remove),
            _ => None,
        }
    }

    fn target(message: &Message) -> Option<Vec<u8>> {
        match &message.data.body {
            MessageBody::CastAdd(_) => Some(message.hash.to_vec()),
            MessageBody::CastRemove(b) => Some(b.target_hash.to_vec()),
            _ => None,
        }
    }

    fn secondary_index_keys(message: &Message, sync_id: &SyncId) -> Vec<Vec<u8>> {
        let MessageBody::CastAdd(body) = &message.data.body else {
            return Vec::new();
        };
        let fid = message.fid();
        let mut index = Vec::new();
        if let Some(parent) = &body.parent {
            index.push(keys::global_index_key(
                RootPrefix::CastsByParent,
                &keys::cast_id_key(parent),
                fid,
                sync_id,
            ));
        }
        let mut mentions = body.mentions.clone();
        mentions.sort_unstable();
        mentions.dedup();
        for mention in mentions {
            index.push(keys::global_index_key(
                RootPrefix::CastsByMention,
                &keys::encode_fid(mention),
                fid,
                sync_id,
            ));
        }
        index
    }
}

impl Store<CastKind> {
    pub fn get_cast_add(&self, fid: Fid, hash: &MessageHash) -> HubResult<Message> {
        self.get_add(fid, hash)
    }

    pub fn get_cast_remove(&self, fid: Fid, hash: &MessageHash) -> HubResult<Message> {
        self.get_remove(fid, hash)
    }

    /// Live replies to `parent`, oldest first within each author.
    pub fn get_casts_by_parent(&self, parent: &CastId) -> HubResult<Vec<Message>> {
        let prefix = keys::global_index_prefix(RootPrefix::CastsByParent, &keys::cast_id_key(parent));
        self.get_by_global_prefix(&prefix)
    }

    pub fn get_casts_by_mention(&self, mention: Fid) -> HubResult<Vec<Message>> {
        let prefix = keys::global_index_prefix(RootPrefix::CastsByMention, &keys::encode_fid(mention));
        self.get_by_global_prefix(&prefix)
    }
}
