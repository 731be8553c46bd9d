//! User-data store: an add-only, last-writer-wins register per profile
//! field.

use crate::error::HubResult;
use crate::message::{Fid, Message, MessageBody, UserDataType};
use crate::storage::keys::UserPostfix;
use crate::storage::stores::store::{Side, Store, StoreKind};

pub struct UserDataKind;

pub type UserDataStore = Store<UserDataKind>;

impl StoreKind for UserDataKind {
    const NAME: &'static str = "user_data";
    const MESSAGE_POSTFIX: UserPostfix = UserPostfix::UserDataMessage;
    const ADDS_POSTFIX: UserPostfix = UserPostfix::UserDataAdds;
    const REMOVES_POSTFIX: Option<UserPostfix> = None;

    fn side(body: &MessageBody) -> Option<Side> {
        match body {
            MessageBody::UserDataAdd(_) => Some(Side::Add),
            _ => None,
        }
    }

    fn target(message: &Message) -> Option<Vec<u8>> {
        match &message.data.body {
            MessageBody::UserDataAdd(b) => Some(vec![b.data_type.as_byte()]),
            _ => None,
        }
    }
}

impl Store<UserDataKind> {
    pub fn get_user_data(&self, fid: Fid, data_type: UserDataType) -> HubResult<Message> {
        self.get_add(fid, &[data_type.as_byte()])
    }

    pub fn get_user_data_by_fid(&self, fid: Fid) -> HubResult<Vec<Message>> {
        self.get_adds_by_fid(fid)
    }
}
