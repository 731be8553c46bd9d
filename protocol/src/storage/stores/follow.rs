//! Follow store: one slot per followed fid.

use crate::error::HubResult;
use crate::message::{Fid, Message, MessageBody};
use crate::storage::keys::{self, RootPrefix, UserPostfix};
use crate::storage::stores::store::{Side, Store, StoreKind};
use crate::sync::sync_id::SyncId;

pub struct FollowKind;

pub type FollowStore = Store<FollowKind>;

impl StoreKind for FollowKind {
    const NAME: &'static str = "follow";
    const MESSAGE_POSTFIX: UserPostfix = UserPostfix::FollowMessage;
    const ADDS_POSTFIX: UserPostfix = UserPostfix::FollowAdds;
    const REMOVES_POSTFIX: Option<UserPostfix> = Some(UserPostfix::FollowRemoves);

    fn side(body: &MessageBody) -> Option<Side> {
        match body {
            MessageBody::FollowAdd(_) => Some(Side::Add),
            MessageBody::FollowRemove(_) => Some(Side::Remove),
            _ => None,
        }
    }

    fn target(message: &Message) -> Option<Vec<u8>> {
        match &message.data.body {
            MessageBody::FollowAdd(b) | MessageBody::FollowRemove(b) => {
                Some(keys::encode_fid(b.target_fid).to_vec())
            }
            _ => None,
        }
    }

    fn secondary_index_keys(message: &Message, sync_id: &SyncId) -> Vec<Vec<u8>> {
        match &message.data.body {
            MessageBody::FollowAdd(b) => vec![keys::global_index_key(
                RootPrefix::FollowsByTarget,
                &keys::encode_fid(b.target_fid),
                message.fid(),
                sync_id,
            )],
            _ => Vec::new(),
        }
    }
}

impl Store<FollowKind> {
    pub fn get_follow_add(&self, fid: Fid, target_fid: Fid) -> HubResult<Message> {
        self.get_add(fid, &keys::encode_fid(target_fid))
    }

    pub fn get_follow_remove(&self, fid: Fid, target_fid: Fid) -> HubResult<Message> {
        self.get_remove(fid, &keys::encode_fid(target_fid))
    }

    /// Winning follow adds pointing at `target_fid`, across all followers.
    pub fn get_follows_by_target(&self, target_fid: Fid) -> HubResult<Vec<Message>> {
        let prefix =
            keys::global_index_prefix(RootPrefix::FollowsByTarget, &keys::encode_fid(target_fid));
        self.get_by_global_prefix(&prefix)
    }
}
