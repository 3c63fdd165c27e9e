//! Master key providers
//!
//! A provider only knows where the key text lives. Reading happens on every
//! `master_key()` call so a rotated file or env var is picked up on restart
//! without caching plaintext key material in the provider.

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine as _;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use std::path::PathBuf;
use zeroize::Zeroize;

use shroud_core::{ShroudError, ShroudResult};
use shroud_crypto::{MasterKey, KEY_SIZE};

use crate::keychain;

/// Source of the process-wide master key.
///
/// `Debug` output must never include key material.
pub trait KeyProvider: Send + Sync + std::fmt::Debug {
    /// Load and decode the master key.
    fn master_key(&self) -> ShroudResult<MasterKey>;

    /// Human-readable description of where the key came from, for logs.
    /// Never contains key material.
    fn source(&self) -> String;
}

/// Decode base64 key text (standard or URL-safe alphabet) into a master key.
///
/// Surrounding whitespace is ignored; anything that does not decode to
/// exactly 32 bytes is rejected.
pub fn decode_master_key(text: &SecretString) -> ShroudResult<MasterKey> {
    let trimmed = text.expose_secret().trim();
    if trimmed.is_empty() {
        return Err(ShroudError::Secrets("master key is empty".into()));
    }

    let mut bytes = STANDARD
        .decode(trimmed)
        .or_else(|_| URL_SAFE.decode(trimmed))
        .map_err(|_| ShroudError::Secrets("master key is not valid base64".into()))?;

    let key = MasterKey::from_slice(&bytes);
    bytes.zeroize();
    key.map_err(ShroudError::from)
}

/// Encode a master key as standard base64 text.
pub fn encode_master_key(key: &MasterKey) -> SecretString {
    SecretString::from(STANDARD.encode(key.as_bytes()))
}

/// Generate a random master key, for `shroud keygen`.
pub fn generate_master_key() -> MasterKey {
    let mut bytes = [0u8; KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut bytes);
    let key = MasterKey::from_bytes(bytes);
    bytes.zeroize();
    key
}

/// Reads the key from an environment variable.
#[derive(Debug, Clone)]
pub struct EnvKeyProvider {
    var: String,
}

impl EnvKeyProvider {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }

    /// True when the variable is set to something non-blank.
    pub fn is_set(&self) -> bool {
        std::env::var(&self.var)
            .map(|v| !v.trim().is_empty())
            .unwrap_or(false)
    }
}

impl KeyProvider for EnvKeyProvider {
    fn master_key(&self) -> ShroudResult<MasterKey> {
        let text = std::env::var(&self.var)
            .map(SecretString::from)
            .map_err(|_| ShroudError::Secrets(format!("${} is not set", self.var)))?;
        decode_master_key(&text)
    }

    fn source(&self) -> String {
        format!("env:{}", self.var)
    }
}

/// Reads the key from a file (systemd credential or configured key file).
#[derive(Debug, Clone)]
pub struct FileKeyProvider {
    path: PathBuf,
    label: &'static str,
}

impl FileKeyProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            label: "file",
        }
    }

    pub(crate) fn systemd(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            label: "systemd",
        }
    }
}

impl KeyProvider for FileKeyProvider {
    fn master_key(&self) -> ShroudResult<MasterKey> {
        let text = std::fs::read_to_string(&self.path)
            .map(SecretString::from)
            .map_err(|e| {
                ShroudError::Secrets(format!("reading master key {}: {e}", self.path.display()))
            })?;
        decode_master_key(&text)
    }

    fn source(&self) -> String {
        format!("{}:{}", self.label, self.path.display())
    }
}

/// Reads the key from the platform keychain.
#[derive(Debug, Clone)]
pub struct KeychainKeyProvider {
    entry: String,
}

impl KeychainKeyProvider {
    pub fn new(entry: impl Into<String>) -> Self {
        Self {
            entry: entry.into(),
        }
    }
}

impl Default for KeychainKeyProvider {
    fn default() -> Self {
        Self::new(keychain::keys::MASTER_KEY)
    }
}

impl KeyProvider for KeychainKeyProvider {
    fn master_key(&self) -> ShroudResult<MasterKey> {
        let text = keychain::get_secret(&self.entry)?.ok_or_else(|| {
            ShroudError::Secrets(format!("no keychain entry '{}'", self.entry))
        })?;
        decode_master_key(&text)
    }

    fn source(&self) -> String {
        format!("keychain:{}", self.entry)
    }
}

/// A fixed key held in memory. Used for tests and the opt-in dev key.
#[derive(Clone)]
pub struct StaticKeyProvider {
    key: MasterKey,
    label: String,
}

impl StaticKeyProvider {
    pub fn new(key: MasterKey, label: impl Into<String>) -> Self {
        Self {
            key,
            label: label.into(),
        }
    }
}

impl std::fmt::Debug for StaticKeyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticKeyProvider")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

impl KeyProvider for StaticKeyProvider {
    fn master_key(&self) -> ShroudResult<MasterKey> {
        Ok(self.key.clone())
    }

    fn source(&self) -> String {
        format!("static:{}", self.label)
    }
}
