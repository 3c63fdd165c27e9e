pub mod config;
pub mod error;
pub mod filename;
pub mod types;

pub use error::{ShroudError, ShroudResult};
pub use filename::secure_filename;
pub use types::{EncryptedFileRecord, FileId, GrantId, ShareGrant, User, UserId};
