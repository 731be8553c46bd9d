//! Message factories shared by the unit tests.

use std::sync::Arc;

use crate::message::*;
use crate::storage::db::HubDb;

/// Signer attached to every factory-built message.
pub(crate) const SIGNER: SignerKey = [7u8; 32];

pub(crate) fn temp_db() -> Arc<HubDb> {
    Arc::new(HubDb::open_temporary().expect("temporary db"))
}

pub(crate) fn message(fid: Fid, timestamp: u32, body: MessageBody) -> Message {
    Message::new(
        MessageData {
            fid,
            timestamp,
            body,
        },
        SIGNER,
    )
    .expect("message encodes")
}

/// Re-sign a factory message with another key; the hash is unchanged.
pub(crate) fn with_signer(mut message: Message, signer: SignerKey) -> Message {
    message.signer = signer;
    message
}

pub(crate) fn cast_id(fid: Fid, seed: u8) -> CastId {
    CastId {
        fid,
        hash: [seed; 20],
    }
}

pub(crate) fn cast_add(fid: Fid, timestamp: u32, text: &str) -> Message {
    cast_add_with(fid, timestamp, text, Vec::new(), None)
}

pub(crate) fn cast_add_with(
    fid: Fid,
    timestamp: u32,
    text: &str,
    mentions: Vec<Fid>,
    parent: Option<CastId>,
) -> Message {
    message(
        fid,
        timestamp,
        MessageBody::CastAdd(CastAddBody {
            text: text.to_string(),
            embeds: Vec::new(),
            mentions,
            parent,
        }),
    )
}

pub(crate) fn cast_remove(fid: Fid, timestamp: u32, target_hash: MessageHash) -> Message {
    message(
        fid,
        timestamp,
        MessageBody::CastRemove(CastRemoveBody { target_hash }),
    )
}

pub(crate) fn like(fid: Fid, timestamp: u32, target: CastId) -> Message {
    message(
        fid,
        timestamp,
        MessageBody::ReactionAdd(ReactionBody {
            reaction_type: ReactionType::Like,
            target,
        }),
    )
}

pub(crate) fn reaction(
    fid: Fid,
    timestamp: u32,
    reaction_type: ReactionType,
    target: CastId,
    remove: bool,
) -> Message {
    let body = ReactionBody {
        reaction_type,
        target,
    };
    let body = if remove {
        MessageBody::ReactionRemove(body)
    } else {
        MessageBody::ReactionAdd(body)
    };
    message(fid, timestamp, body)
}

pub(crate) fn follow_add(fid: Fid, timestamp: u32, target_fid: Fid) -> Message {
    message(fid, timestamp, MessageBody::FollowAdd(FollowBody { target_fid }))
}

pub(crate) fn follow_remove(fid: Fid, timestamp: u32, target_fid: Fid) -> Message {
    message(
        fid,
        timestamp,
        MessageBody::FollowRemove(FollowBody { target_fid }),
    )
}

pub(crate) fn verification_add(fid: Fid, timestamp: u32, address: EthAddress) -> Message {
    message(
        fid,
        timestamp,
        MessageBody::VerificationAddEthAddress(VerificationAddBody {
            address,
            eth_signature: vec![0xEE; 65],
            block_hash: [0xBB; 32],
        }),
    )
}

pub(crate) fn verification_remove(fid: Fid, timestamp: u32, address: EthAddress) -> Message {
    message(
        fid,
        timestamp,
        MessageBody::VerificationRemove(VerificationRemoveBody { address }),
    )
}

/// Custody-signed signer grant.
pub(crate) fn signer_add(fid: Fid, timestamp: u32, signer: SignerKey) -> Message {
    message(fid, timestamp, MessageBody::SignerAdd(SignerBody { signer }))
}

pub(crate) fn signer_remove(fid: Fid, timestamp: u32, signer: SignerKey) -> Message {
    message(fid, timestamp, MessageBody::SignerRemove(SignerBody { signer }))
}

pub(crate) fn user_data(
    fid: Fid,
    timestamp: u32,
    data_type: UserDataType,
    value: &str,
) -> Message {
    message(
        fid,
        timestamp,
        MessageBody::UserDataAdd(UserDataBody {
            data_type,
            value: value.to_string(),
        }),
    )
}
