use shroud_core::ShroudError;
use thiserror::Error;

/// Cryptographic failures. Variants never say *why* authentication failed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid key length: expected {expected} bytes, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("encryption failed")]
    Encryption,

    #[error("key unwrap failed")]
    KeyUnwrap,

    #[error("decryption failed")]
    Decryption,
}

impl From<CryptoError> for ShroudError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::KeyUnwrap => ShroudError::KeyUnwrap,
            CryptoError::Decryption => ShroudError::Decryption,
            CryptoError::InvalidKeyLength { .. } => ShroudError::Secrets(e.to_string()),
            // chacha20poly1305 only refuses payloads beyond its length limit
            CryptoError::Encryption => ShroudError::InvalidInput(e.to_string()),
        }
    }
}
