//! Platform keychain storage for the master key.
//!
//! Uses the `keyring` crate for cross-platform access:
//! - macOS: Keychain Services
//! - Linux: GNOME Keyring / Secret Service (D-Bus)
//! - Windows: Credential Manager (DPAPI)

use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroize;

use shroud_core::{ShroudError, ShroudResult};

const SERVICE_NAME: &str = "shroud";

fn entry(key_name: &str) -> ShroudResult<keyring::Entry> {
    keyring::Entry::new(SERVICE_NAME, key_name)
        .map_err(|e| ShroudError::Secrets(format!("keychain entry creation: {e}")))
}

/// Store a secret in the platform keychain.
pub fn store_secret(key_name: &str, secret: &SecretString) -> ShroudResult<()> {
    entry(key_name)?
        .set_password(secret.expose_secret())
        .map_err(|e| ShroudError::Secrets(format!("keychain store for '{key_name}': {e}")))?;
    tracing::debug!(key = key_name, "stored secret in platform keychain");
    Ok(())
}

/// Retrieve a secret from the platform keychain.
pub fn get_secret(key_name: &str) -> ShroudResult<Option<SecretString>> {
    match entry(key_name)?.get_password() {
        Ok(mut password) => {
            let secret = SecretString::from(password.clone());
            password.zeroize();
            Ok(Some(secret))
        }
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(ShroudError::Secrets(format!(
            "keychain get for '{key_name}': {e}"
        ))),
    }
}

/// Well-known keychain key names
pub mod keys {
    /// The master key (base64)
    pub const MASTER_KEY: &str = "master-key";
}
