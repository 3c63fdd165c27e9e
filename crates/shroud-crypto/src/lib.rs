//! shroud-crypto: envelope encryption for uploaded files
//!
//! Key hierarchy:
//! ```text
//! Master Key (256-bit, supplied by a KeyProvider, never generated here)
//!   └── File Key (per-file, 256-bit random, wrapped by the master key)
//!       └── Payload AEAD: XChaCha20-Poly1305 (key=file_key, nonce=random_192bit)
//! ```
//!
//! Both layers are authenticated and carry their nonce inline, so a stored
//! wrapped key and a stored ciphertext are each self-contained.

pub mod cipher;
pub mod error;
pub mod keys;

pub use cipher::{decrypt, encrypt};
pub use error::CryptoError;
pub use keys::{generate_file_key, unwrap_key, wrap_key, FileKey, MasterKey};

/// Size of master and file keys in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an XChaCha20-Poly1305 nonce (192-bit)
pub const NONCE_SIZE: usize = 24;

/// Size of a Poly1305 authentication tag
pub const TAG_SIZE: usize = 16;

/// Size of a wrapped file key: nonce + key + tag
pub const WRAPPED_KEY_SIZE: usize = NONCE_SIZE + KEY_SIZE + TAG_SIZE;
