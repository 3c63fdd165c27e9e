//! Whole-file XChaCha20-Poly1305 encryption/decryption
//!
//! Encrypted payload format (binary):
//! ```text
//! [24 bytes: random nonce][N bytes: ciphertext][16 bytes: Poly1305 tag]
//! AAD = "shroud-file-v1"
//! ```
//!
//! Every call to `encrypt` draws a new file key, so no key is ever shared by
//! two uploads.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;

use crate::error::CryptoError;
use crate::keys::{generate_file_key, FileKey};
use crate::{NONCE_SIZE, TAG_SIZE};

const FILE_AAD: &[u8] = b"shroud-file-v1";

/// Encrypt a whole payload under a freshly generated file key.
///
/// Returns `([24-byte nonce][ciphertext][16-byte tag], file_key)`. The key is
/// only ever persisted after wrapping.
pub fn encrypt(plaintext: &[u8]) -> Result<(Vec<u8>, FileKey), CryptoError> {
    let file_key = generate_file_key();
    let ciphertext = seal(&file_key, plaintext)?;
    Ok((ciphertext, file_key))
}

/// Decrypt a payload produced by `encrypt`.
///
/// The tag is verified before any plaintext is produced; a wrong key, a
/// truncated blob or a flipped bit all yield `CryptoError::Decryption`.
pub fn decrypt(encrypted: &[u8], file_key: &FileKey) -> Result<Vec<u8>, CryptoError> {
    if encrypted.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::Decryption);
    }

    let (nonce_bytes, ciphertext) = encrypted.split_at(NONCE_SIZE);
    let nonce = XNonce::from_slice(nonce_bytes);
    let cipher = XChaCha20Poly1305::new(file_key.as_bytes().into());

    cipher
        .decrypt(
            nonce,
            Payload {
                msg: ciphertext,
                aad: FILE_AAD,
            },
        )
        .map_err(|_| CryptoError::Decryption)
}

fn seal(file_key: &FileKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = XChaCha20Poly1305::new(file_key.as_bytes().into());

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = XNonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad: FILE_AAD,
            },
        )
        .map_err(|_| CryptoError::Encryption)?;

    let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);
    Ok(result)
}
