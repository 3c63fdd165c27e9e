//! Master key discovery chain

use std::path::{Path, PathBuf};

use secrecy::SecretString;
use shroud_core::config::{expand_tilde, SecretsConfig};
use shroud_core::{ShroudError, ShroudResult};

use crate::keychain;
use crate::provider::{
    decode_master_key, EnvKeyProvider, FileKeyProvider, KeyProvider, KeychainKeyProvider,
    StaticKeyProvider,
};

/// Well-known development master key. Anyone can read it from the source, so
/// it protects nothing; it is only used when `allow_dev_key` is set.
pub const DEV_MASTER_KEY_B64: &str = "l5kxo283omKhDYK2bZhYta+XriPpmiioxEafzRHKkRk=";

/// File name looked up under `$CREDENTIALS_DIRECTORY`.
const CREDENTIAL_NAME: &str = "shroud-master-key";

/// Discover the master key provider using the priority chain:
///   1. $CREDENTIALS_DIRECTORY/shroud-master-key  (systemd credential injection)
///   2. the env var named by `config.master_key_env`
///   3. `config.master_key_file`
///   4. platform keychain (if `config.keychain`)
///   5. development key (if `config.allow_dev_key`, with a warning)
///
/// The returned provider has loaded the key once, so a malformed key fails here
/// instead of on the first upload.
pub fn discover(config: &SecretsConfig) -> ShroudResult<Box<dyn KeyProvider>> {
    let credentials_dir = std::env::var_os("CREDENTIALS_DIRECTORY").map(PathBuf::from);
    discover_from(config, credentials_dir.as_deref())
}

fn discover_from(
    config: &SecretsConfig,
    credentials_dir: Option<&Path>,
) -> ShroudResult<Box<dyn KeyProvider>> {
    let provider = find_provider(config, credentials_dir)?;
    provider.master_key()?;
    tracing::info!(source = %provider.source(), "master key loaded");
    Ok(provider)
}

fn find_provider(
    config: &SecretsConfig,
    credentials_dir: Option<&Path>,
) -> ShroudResult<Box<dyn KeyProvider>> {
    // 1. systemd credentials directory
    if let Some(dir) = credentials_dir {
        let path = dir.join(CREDENTIAL_NAME);
        if path.exists() {
            return Ok(Box::new(FileKeyProvider::systemd(path)));
        }
    }

    // 2. env var
    let env = EnvKeyProvider::new(&config.master_key_env);
    if env.is_set() {
        return Ok(Box::new(env));
    }

    // 3. configured key file
    if let Some(path) = &config.master_key_file {
        let expanded = expand_tilde(path);
        if expanded.exists() {
            return Ok(Box::new(FileKeyProvider::new(expanded)));
        }
        tracing::warn!(path = %expanded.display(), "configured master key file does not exist");
    }

    // 4. platform keychain
    if config.keychain {
        match keychain::get_secret(keychain::keys::MASTER_KEY) {
            Ok(Some(_)) => return Ok(Box::new(KeychainKeyProvider::default())),
            Ok(None) => tracing::debug!("no master key in platform keychain"),
            Err(e) => tracing::warn!("keychain lookup failed: {e}"),
        }
    }

    // 5. development key
    if config.allow_dev_key {
        tracing::warn!(
            "using the built-in DEVELOPMENT master key; files stored now are readable \
             by anyone with the source. Set ${} for real use",
            config.master_key_env
        );
        let key = decode_master_key(&SecretString::from(DEV_MASTER_KEY_B64.to_string()))?;
        return Ok(Box::new(StaticKeyProvider::new(key, "development")));
    }

    Err(ShroudError::Secrets(format!(
        "no master key found. Tried: $CREDENTIALS_DIRECTORY/{CREDENTIAL_NAME}, ${}, \
         secrets.master_key_file{}. Run: shroud keygen",
        config.master_key_env,
        if config.keychain { ", platform keychain" } else { "" },
    )))
}
