//! shroud-secrets: where the master key comes from
//!
//! Master key discovery chain (in order of precedence):
//!   1. $CREDENTIALS_DIRECTORY/shroud-master-key  (systemd LoadCredentialEncrypted)
//!   2. the env var named by `secrets.master_key_env` (default $SHROUD_MASTER_KEY)
//!   3. `secrets.master_key_file`
//!   4. the platform keychain, when `secrets.keychain = true`
//!   5. the built-in development key, only when `secrets.allow_dev_key = true`
//!
//! Every source holds the key as base64 text of exactly 32 bytes.

pub mod identity;
pub mod keychain;
pub mod provider;

pub use identity::{discover, DEV_MASTER_KEY_B64};
pub use provider::{
    decode_master_key, encode_master_key, generate_master_key, EnvKeyProvider, FileKeyProvider,
    KeyProvider, KeychainKeyProvider, StaticKeyProvider,
};
