//! CRDT stores, one per entity, all built on the generic [`Store`].

pub mod cast;
pub mod follow;
pub mod reaction;
pub mod signer;
pub mod store;
pub mod user_data;
pub mod verification;

pub use cast::CastStore;
pub use follow::FollowStore;
pub use reaction::ReactionStore;
pub use signer::SignerStore;
pub use store::{message_compare, Side, Store, StoreKind};
pub use user_data::UserDataStore;
pub use verification::VerificationStore;
