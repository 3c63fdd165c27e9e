//! shroud-storage: ciphertext blobs behind an OpenDAL operator
//!
//! Only ciphertext ever reaches this crate. Blob keys are
//! `{prefix}/{24 hex}_{sanitized name}.enc`; the random component keeps two
//! uploads of the same name from colliding.

pub mod blob;
pub mod health;
pub mod operator;

pub use blob::{BlobStore, StoredBlob};
pub use health::{check_health, is_healthy};
pub use operator::build_operator;
