//! Reaction store: one slot per `(reaction type, target cast)`.

use crate::error::HubResult;
use crate::message::{CastId, Fid, Message, MessageBody, ReactionBody, ReactionType};
use crate::storage::keys::{self, RootPrefix, UserPostfix};
use crate::storage::stores::store::{Side, Store, StoreKind};
use crate::sync::sync_id::SyncId;

pub struct ReactionKind;

pub type ReactionStore = Store<ReactionKind>;

fn slot(reaction_type: ReactionType, target: &CastId) -> Vec<u8> {
    let mut key = vec![reaction_type.as_byte()];
    key.extend(keys::cast_id_key(target));
    key
}

impl StoreKind for ReactionKind {
    const NAME: &'static str = "reaction";
    const MESSAGE_POSTFIX: UserPostfix = UserPostfix::ReactionMessage;
    const ADDS_POSTFIX: UserPostfix = UserPostfix::ReactionAdds;
    const REMOVES_POSTFIX: Option<UserPostfix> = Some(UserPostfix::ReactionRemoves);

    fn side(body: &MessageBody) -> Option<Side> {
        match body {
            MessageBody::ReactionAdd(_) => Some(Side::Add),
            MessageBody::ReactionRemove(_) => Some(Side::Remove),
            _ => None,
        }
    }

    fn target(message: &Message) -> Option<Vec<u8>> {
        match &message.data.body {
            MessageBody::ReactionAdd(ReactionBody {
                reaction_type,
                target,
            })
            | MessageBody::ReactionRemove(ReactionBody {
                reaction_type,
                target,
            }) => Some(slot(*reaction_type, target)),
            _ => None,
        }
    }

    fn secondary_index_keys(message: &Message, sync_id: &SyncId) -> Vec<Vec<u8>> {
        match &message.data.body {
            MessageBody::ReactionAdd(b) => vec![keys::global_index_key(
                RootPrefix::ReactionsByTarget,
                &keys::cast_id_key(&b.target),
                message.fid(),
                sync_id,
            )],
            _ => Vec::new(),
        }
    }
}

impl Store<ReactionKind> {
    pub fn get_reaction_add(
        &self,
        fid: Fid,
        reaction_type: ReactionType,
        target: &CastId,
    ) -> HubResult<Message> {
        self.get_add(fid, &slot(reaction_type, target))
    }

    pub fn get_reaction_remove(
        &self,
        fid: Fid,
        reaction_type: ReactionType,
        target: &CastId,
    ) -> HubResult<Message> {
        self.get_remove(fid, &slot(reaction_type, target))
    }

    /// Winning reactions to `target`, optionally of one type only.
    pub fn get_reactions_by_target(
        &self,
        target: &CastId,
        reaction_type: Option<ReactionType>,
    ) -> HubResult<Vec<Message>> {
        let prefix =
            keys::global_index_prefix(RootPrefix::ReactionsByTarget, &keys::cast_id_key(target));
        let reactions = self.get_by_global_prefix(&prefix)?;
        Ok(match reaction_type {
            None => reactions,
            Some(wanted) => reactions
                .into_iter()
                .filter(|m| {
                    matches!(&m.data.body, MessageBody::ReactionAdd(b) if b.reaction_type == wanted)
                })
                .collect(),
        })
    }
}
