//! Shared builders for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use hub_protocol::message::*;
use hub_protocol::sync::{SyncEngine, TransportPeer};
use hub_protocol::Hub;

pub const CUSTODY: SignerKey = [0xC0; 32];
pub const DELEGATE: SignerKey = [0xD1; 32];

pub fn message(fid: Fid, timestamp: u32, body: MessageBody, signer: SignerKey) -> Message {
    Message::new(
        MessageData {
            fid,
            timestamp,
            body,
        },
        signer,
    )
    .expect("message encodes")
}

/// Custody grant of `DELEGATE` for `fid`.
pub fn grant(fid: Fid, timestamp: u32) -> Message {
    message(
        fid,
        timestamp,
        MessageBody::SignerAdd(SignerBody { signer: DELEGATE }),
        CUSTODY,
    )
}

pub fn revoke(fid: Fid, timestamp: u32) -> Message {
    message(
        fid,
        timestamp,
        MessageBody::SignerRemove(SignerBody { signer: DELEGATE }),
        CUSTODY,
    )
}

pub fn cast(fid: Fid, timestamp: u32, text: &str) -> Message {
    cast_with(fid, timestamp, text, Vec::new(), None)
}

pub fn cast_with(
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
        DELEGATE,
    )
}

pub fn cast_remove(fid: Fid, timestamp: u32, target_hash: MessageHash) -> Message {
    message(
        fid,
        timestamp,
        MessageBody::CastRemove(CastRemoveBody { target_hash }),
        DELEGATE,
    )
}

pub fn like(fid: Fid, timestamp: u32, target: CastId) -> Message {
    message(
        fid,
        timestamp,
        MessageBody::ReactionAdd(ReactionBody {
            reaction_type: ReactionType::Like,
            target,
        }),
        DELEGATE,
    )
}

pub fn follow(fid: Fid, timestamp: u32, target_fid: Fid, remove: bool) -> Message {
    let body = FollowBody { target_fid };
    let body = if remove {
        MessageBody::FollowRemove(body)
    } else {
        MessageBody::FollowAdd(body)
    };
    message(fid, timestamp, body, DELEGATE)
}

pub fn verify(fid: Fid, timestamp: u32, address: EthAddress) -> Message {
    message(
        fid,
        timestamp,
        MessageBody::VerificationAddEthAddress(VerificationAddBody {
            address,
            eth_signature: vec![0x5A; 65],
            block_hash: [0x0B; 32],
        }),
        DELEGATE,
    )
}

pub fn profile(fid: Fid, timestamp: u32, data_type: UserDataType, value: &str) -> Message {
    message(
        fid,
        timestamp,
        MessageBody::UserDataAdd(UserDataBody {
            data_type,
            value: value.to_string(),
        }),
        DELEGATE,
    )
}

pub fn cast_id_of(message: &Message) -> CastId {
    CastId {
        fid: message.fid(),
        hash: message.hash,
    }
}

pub fn running_hub() -> Hub {
    let hub = Hub::in_memory().expect("in-memory hub");
    hub.start().expect("hub starts");
    hub
}

pub fn submit_all(hub: &Hub, messages: &[Message]) {
    for m in messages {
        hub.submit_message(m).expect("message merges");
    }
}

pub fn peer_of(hub: &Hub) -> TransportPeer<Arc<SyncEngine>> {
    TransportPeer::new(Arc::clone(hub.sync_engine()))
}
