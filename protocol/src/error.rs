//! # Hub Errors
//!
//! One taxonomy shared by the stores, the trie and the sync engine. The
//! variants are chosen by what the caller should do next, not by where the
//! failure happened:
//!
//! | Variant       | Meaning                                   | Retry?          |
//! |---------------|-------------------------------------------|-----------------|
//! | `BadRequest`  | malformed message, wrong kind, no signer  | no              |
//! | `NotFound`    | no winner for a slot, no node for prefix  | no              |
//! | `Conflict`    | an existing winner ranks higher           | no              |
//! | `Duplicate`   | the exact same message is already merged  | no              |
//! | `Unavailable` | storage or network I/O failed             | yes, backoff    |

use std::fmt;

use crate::storage::db::DbError;

// ---------------------------------------------------------------------------
// BadRequestKind
// ---------------------------------------------------------------------------

/// Sub-kind of a rejected request, used for logging and for the sync driver
/// to recognize the one recoverable case (`UnknownSigner`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BadRequestKind {
    /// The message kind does not belong to the store it was sent to.
    InvalidMessageType,
    /// A structural check on the message failed.
    Validation,
    /// The signer is not an active delegate of the message's fid.
    UnknownSigner,
    /// The message would be pruned immediately after merging.
    Prunable,
    /// A sync id had the wrong length or an out-of-alphabet character.
    InvalidSyncId,
}

impl BadRequestKind {
    fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidMessageType => "invalid_message_type",
            Self::Validation => "validation_failure",
            Self::UnknownSigner => "unknown_signer",
            Self::Prunable => "prunable",
            Self::InvalidSyncId => "invalid_sync_id",
        }
    }
}

impl fmt::Display for BadRequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// HubError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HubError {
    #[error("bad request ({kind}): {message}")]
    BadRequest {
        kind: BadRequestKind,
        message: String,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("duplicate: {0}")]
    Duplicate(String),

    #[error("unavailable: {0}")]
    Unavailable(String),
}

pub type HubResult<T> = Result<T, HubError>;

impl HubError {
    pub fn bad_request(kind: BadRequestKind, message: impl Into<String>) -> Self {
        Self::BadRequest {
            kind,
            message: message.into(),
        }
    }

    /// Stable dotted error code, e.g. `bad_request.unknown_signer`.
    pub fn code(&self) -> String {
        match self {
            Self::BadRequest { kind, .. } => format!("bad_request.{}", kind),
            Self::NotFound(_) => "not_found".to_string(),
            Self::Conflict(_) => "bad_request.conflict".to_string(),
            Self::Duplicate(_) => "bad_request.duplicate".to_string(),
            Self::Unavailable(_) => "unavailable".to_string(),
        }
    }

    /// True when the same request may succeed later without changes.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    pub fn is_unknown_signer(&self) -> bool {
        matches!(
            self,
            Self::BadRequest {
                kind: BadRequestKind::UnknownSigner,
                ..
            }
        )
    }
}

impl From<DbError> for HubError {
    fn from(e: DbError) -> Self {
        Self::Unavailable(e.to_string())
    }
}
