//! Repository traits
//!
//! Implementations must enforce uniqueness themselves at insert time:
//! `insert_user` fails with `UsernameTaken`, `insert_grant` with
//! `DuplicateGrant`. Callers never check-then-insert.

use shroud_core::{EncryptedFileRecord, FileId, ShareGrant, ShroudResult, User, UserId};

pub trait UserStore: Send + Sync {
    fn insert_user(&self, user: &User) -> ShroudResult<()>;
    fn user(&self, id: UserId) -> ShroudResult<Option<User>>;
    fn user_by_name(&self, username: &str) -> ShroudResult<Option<User>>;
}

pub trait FileStore: Send + Sync {
    fn insert_file(&self, record: &EncryptedFileRecord) -> ShroudResult<()>;
    fn file(&self, id: FileId) -> ShroudResult<Option<EncryptedFileRecord>>;
    /// Files uploaded by `owner`, oldest first.
    fn files_owned_by(&self, owner: UserId) -> ShroudResult<Vec<EncryptedFileRecord>>;
}

pub trait GrantStore: Send + Sync {
    fn insert_grant(&self, grant: &ShareGrant) -> ShroudResult<()>;
    fn grant_exists(&self, file: FileId, recipient: UserId) -> ShroudResult<bool>;
    /// Grants naming `recipient`, oldest first.
    fn grants_for_recipient(&self, recipient: UserId) -> ShroudResult<Vec<ShareGrant>>;
    fn grants_for_file(&self, file: FileId) -> ShroudResult<Vec<ShareGrant>>;
}
