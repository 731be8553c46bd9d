//! # Cryptographic Primitives
//!
//! Only hashing lives here. Signature schemes are absent: the
//! Hub treats a message's signer key as an opaque identifier and leaves
//! signature checks to whoever hands it the message.

pub mod hash;

pub use hash::{blake3_160, blake3_160_multi, empty_hash, Hash160};
