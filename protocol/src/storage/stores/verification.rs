//! # Verification Store
//!
//! An Ethereum address can be verified by many fids over time but owned by
//! only one at once. Besides the usual per-fid slot, the store keeps a
//! store-wide `address -> fid` owner index; an incoming add for an address
//! owned by another fid competes with that fid's winning add under the same
//! ordering as a same-fid merge. Because a merge may delete another fid's
//! records, merges take the store-wide lock.
//!
//! A superseded add leaves no tombstone. Once the winning fid removes its
//! verification the owner entry is gone, and the superseded add merges
//! again if a peer still holds it. Every Hub ends up with the same set
//! whatever order the messages arrived in: a Hub that saw the release
//! before the older claim keeps that claim, and sync hands it to the rest.
//! A tombstone would make such a Hub and its peers disagree forever.

use crate::error::{HubError, HubResult};
use crate::message::{EthAddress, Fid, Message, MessageBody};
use crate::storage::keys::{self, UserPostfix};
use crate::storage::stores::store::{Side, Store, StoreKind};

pub struct VerificationKind;

pub type VerificationStore = Store<VerificationKind>;

impl StoreKind for VerificationKind {
    const NAME: &'static str = "verification";
    const MESSAGE_POSTFIX: UserPostfix = UserPostfix::VerificationMessage;
    const ADDS_POSTFIX: UserPostfix = UserPostfix::VerificationAdds;
    const REMOVES_POSTFIX: Option<UserPostfix> = Some(UserPostfix::VerificationRemoves);
    const SERIALIZE_ACROSS_FIDS: bool = true;

    fn side(body: &MessageBody) -> Option<Side> {
        match body {
            MessageBody::VerificationAddEthAddress(_) => Some(Side::Add),
            MessageBody::VerificationRemove(_) => Some(Side::Remove),
            _ => None,
        }
    }

    fn target(message: &Message) -> Option<Vec<u8>> {
        match &message.data.body {
            MessageBody::VerificationAddEthAddress(b) => Some(b.address.to_vec()),
            MessageBody::VerificationRemove(b) => Some(b.address.to_vec()),
            _ => None,
        }
    }

    fn owner_key(body: &MessageBody) -> Option<Vec<u8>> {
        match body {
            MessageBody::VerificationAddEthAddress(b) => {
                Some(keys::verification_owner_key(&b.address))
            }
            _ => None,
        }
    }
}

impl Store<VerificationKind> {
    pub fn get_verification_add(&self, fid: Fid, address: &EthAddress) -> HubResult<Message> {
        self.get_add(fid, address)
    }

    pub fn get_verification_remove(&self, fid: Fid, address: &EthAddress) -> HubResult<Message> {
        self.get_remove(fid, address)
    }

    /// The fid currently holding a winning verification of `address`.
    pub fn get_verification_owner(&self, address: &EthAddress) -> HubResult<Fid> {
        match self.db().get(&keys::verification_owner_key(address))? {
            Some(raw) => Ok(keys::decode_fid(&raw)?),
            None => Err(HubError::NotFound(format!(
                "no owner for address 0x{}",
                hex::encode(address)
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::events::StoreEvent;
    use crate::testing::*;

    const ADDRESS: EthAddress = [0xA1; 20];

    fn store() -> VerificationStore {
        VerificationStore::new(temp_db(), 50)
    }

    fn stored(store: &VerificationStore) -> Vec<Message> {
        let mut all = store.get_all_messages_by_fid(1).unwrap();
        all.extend(store.get_all_messages_by_fid(2).unwrap());
        all.sort_by_key(|m| m.hash);
        all
    }

    #[test]
    fn newer_claim_from_other_fid_takes_address() {
        let store = store();
        let first = verification_add(1, 100, ADDRESS);
        store.merge(&first).unwrap();
        assert_eq!(store.get_verification_owner(&ADDRESS).unwrap(), 1);

        match store.merge(&verification_add(2, 200, ADDRESS)).unwrap() {
            StoreEvent::MergeMessage { deleted_messages, .. } => {
                assert_eq!(deleted_messages, vec![first])
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(store.get_verification_owner(&ADDRESS).unwrap(), 2);
        assert!(store.get_verification_add(1, &ADDRESS).is_err());
    }

    #[test]
    fn older_claim_from_other_fid_conflicts() {
        let store = store();
        store.merge(&verification_add(1, 200, ADDRESS)).unwrap();
        let err = store.merge(&verification_add(2, 100, ADDRESS)).unwrap_err();
        assert!(matches!(err, HubError::Conflict(_)));
        assert_eq!(store.get_verification_owner(&ADDRESS).unwrap(), 1);
    }

    #[test]
    fn remove_releases_ownership() {
        let store = store();
        store.merge(&verification_add(1, 100, ADDRESS)).unwrap();
        store.merge(&verification_remove(1, 150, ADDRESS)).unwrap();
        assert!(matches!(
            store.get_verification_owner(&ADDRESS),
            Err(HubError::NotFound(_))
        ));
        // Any fid may claim it again, even with an older timestamp.
        store.merge(&verification_add(2, 120, ADDRESS)).unwrap();
        assert_eq!(store.get_verification_owner(&ADDRESS).unwrap(), 2);
    }

    #[test]
    fn superseded_claim_returns_after_release() {
        let store = store();
        let superseded = verification_add(1, 100, ADDRESS);
        store.merge(&superseded).unwrap();
        store.merge(&verification_add(2, 200, ADDRESS)).unwrap();
        store.merge(&verification_remove(2, 300, ADDRESS)).unwrap();
        assert!(store.get_verification_add(1, &ADDRESS).is_err());

        // A peer that merged the release first still holds it.
        store.merge(&superseded).unwrap();
        assert_eq!(store.get_verification_owner(&ADDRESS).unwrap(), 1);
    }

    #[test]
    fn every_arrival_order_converges() {
        let older = verification_add(1, 100, ADDRESS);
        let newer = verification_add(2, 200, ADDRESS);
        let release = verification_remove(2, 300, ADDRESS);
        let orders = [
            [&older, &newer, &release],
            [&older, &release, &newer],
            [&newer, &older, &release],
            [&newer, &release, &older],
            [&release, &older, &newer],
            [&release, &newer, &older],
        ];

        let mut outcomes = Vec::new();
        for order in orders {
            let store = store();
            // The second pass is what a sync round re-offers.
            for _ in 0..2 {
                for message in order {
                    let _ = store.merge(message);
                }
            }
            outcomes.push(stored(&store));
        }

        let mut expected = vec![older.clone(), release.clone()];
        expected.sort_by_key(|m| m.hash);
        for outcome in outcomes {
            assert_eq!(outcome, expected);
        }
    }
}
