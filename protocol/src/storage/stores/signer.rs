//! Signer store: the custody-authored grants and revocations of delegate
//! keys. A fid's other messages are only accepted while their signer has a
//! winning `SignerAdd` here.

use crate::error::{HubError, HubResult};
use crate::message::{Fid, Message, MessageBody, SignerKey};
use crate::storage::keys::UserPostfix;
use crate::storage::stores::store::{Side, Store, StoreKind};

pub struct SignerKind;

pub type SignerStore = Store<SignerKind>;

impl StoreKind for SignerKind {
    const NAME: &'static str = "signer";
    const MESSAGE_POSTFIX: UserPostfix = UserPostfix::SignerMessage;
    const ADDS_POSTFIX: UserPostfix = UserPostfix::SignerAdds;
    const REMOVES_POSTFIX: Option<UserPostfix> = Some(UserPostfix::SignerRemoves);

    fn side(body: &MessageBody) -> Option<Side> {
        match body {
            MessageBody::SignerAdd(_) => Some(Side::Add),
            MessageBody::SignerRemove(_) => Some(Side::Remove),
            _ => None,
        }
    }

    fn target(message: &Message) -> Option<Vec<u8>> {
        match &message.data.body {
            MessageBody::SignerAdd(b) | MessageBody::SignerRemove(b) => Some(b.signer.to_vec()),
            _ => None,
        }
    }
}

impl Store<SignerKind> {
    pub fn get_signer_add(&self, fid: Fid, signer: &SignerKey) -> HubResult<Message> {
        self.get_add(fid, signer)
    }

    pub fn get_signer_remove(&self, fid: Fid, signer: &SignerKey) -> HubResult<Message> {
        self.get_remove(fid, signer)
    }

    pub fn is_active_signer(&self, fid: Fid, signer: &SignerKey) -> HubResult<bool> {
        match self.get_signer_add(fid, signer) {
            Ok(_) => Ok(true),
            Err(HubError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;

    const DELEGATE: SignerKey = [0x42; 32];

    #[test]
    fn grant_then_revoke() {
        let store = SignerStore::new(temp_db(), 100);
        assert!(!store.is_active_signer(1, &DELEGATE).unwrap());

        store.merge(&signer_add(1, 100, DELEGATE)).unwrap();
        assert!(store.is_active_signer(1, &DELEGATE).unwrap());
        assert!(!store.is_active_signer(2, &DELEGATE).unwrap());

        store.merge(&signer_remove(1, 200, DELEGATE)).unwrap();
        assert!(!store.is_active_signer(1, &DELEGATE).unwrap());
        assert!(store.get_signer_remove(1, &DELEGATE).is_ok());
    }

    #[test]
    fn stale_grant_does_not_resurrect() {
        let store = SignerStore::new(temp_db(), 100);
        store.merge(&signer_remove(1, 200, DELEGATE)).unwrap();
        assert!(store.merge(&signer_add(1, 150, DELEGATE)).is_err());
        assert!(!store.is_active_signer(1, &DELEGATE).unwrap());
    }
}
