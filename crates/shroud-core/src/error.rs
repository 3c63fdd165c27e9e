use thiserror::Error;

use crate::types::FileId;

pub type ShroudResult<T> = Result<T, ShroudError>;

/// Request-level failures surfaced to callers of the vault.
///
/// Cryptographic variants carry no cause: a wrong master key, a flipped bit
/// and a truncated blob all look the same from the outside.
#[derive(Debug, Error)]
pub enum ShroudError {
    #[error("key unwrap failed")]
    KeyUnwrap,

    #[error("decryption failed")]
    Decryption,

    #[error("only the owner can share this file")]
    NotOwner,

    #[error("recipient user not found: {0}")]
    RecipientNotFound(String),

    #[error("file is already shared with this recipient")]
    DuplicateGrant,

    #[error("file not found: {0}")]
    NotFound(FileId),

    #[error("access denied")]
    AccessDenied,

    #[error("username already exists: {0}")]
    UsernameTaken(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("secrets error: {0}")]
    Secrets(String),

    #[error("config error: {0}")]
    Config(String),
}

impl ShroudError {
    /// True for failures that mean "this requester may not see the bytes",
    /// as opposed to infrastructure problems.
    pub fn is_denial(&self) -> bool {
        matches!(
            self,
            ShroudError::AccessDenied | ShroudError::KeyUnwrap | ShroudError::Decryption
        )
    }
}
