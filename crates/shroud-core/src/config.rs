use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ShroudError, ShroudResult};

/// Top-level configuration (loaded from shroud.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShroudConfig {
    pub log: LogConfig,
    pub storage: StorageConfig,
    pub ledger: LedgerConfig,
    pub secrets: SecretsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

/// Which OpenDAL service holds the ciphertext blobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Local directory under `root`
    Fs,
    /// Process memory (tests, dry runs)
    Memory,
    /// Any S3-compatible endpoint
    S3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Root directory for the fs backend
    pub root: PathBuf,
    /// Key prefix for ciphertext blobs (default: uploads)
    pub prefix: String,
    /// S3 endpoint
    pub endpoint: String,
    /// S3 region (default: us-east-1)
    pub region: String,
    /// S3 bucket name
    pub bucket: String,
    /// Refuse plaintext HTTP S3 endpoints
    pub enforce_tls: bool,
    /// Check the stored BLAKE3 hash of each blob before decrypting it
    pub verify_content_hash: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// SQLite database holding users, file records and grants.
    /// `:memory:` keeps everything in process.
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretsConfig {
    /// Environment variable holding the base64 master key
    pub master_key_env: String,
    /// File holding the base64 master key
    pub master_key_file: Option<PathBuf>,
    /// Look the master key up in the platform keychain
    pub keychain: bool,
    /// Fall back to the built-in development key. Never enable in production.
    pub allow_dev_key: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Fs,
            root: PathBuf::from("~/.local/share/shroud/blobs"),
            prefix: "uploads".into(),
            endpoint: "http://localhost:8333".into(),
            region: "us-east-1".into(),
            bucket: "shroud".into(),
            enforce_tls: false,
            verify_content_hash: true,
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("~/.local/share/shroud/ledger.db"),
        }
    }
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            master_key_env: "SHROUD_MASTER_KEY".into(),
            master_key_file: None,
            keychain: false,
            allow_dev_key: false,
        }
    }
}

impl ShroudConfig {
    /// Load configuration from a TOML file, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> ShroudResult<Self> {
        if !path.exists() {
            tracing::warn!("config file not found: {}  (using defaults)", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| ShroudError::Config(format!("reading {}: {e}", path.display())))?;
        toml::from_str(&content)
            .map_err(|e| ShroudError::Config(format!("parsing {}: {e}", path.display())))
    }
}

/// Expand a leading `~/` to `$HOME`.
pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(rest) = path.to_str().and_then(|s| s.strip_prefix("~/")) {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        return PathBuf::from(home).join(rest);
    }
    path.to_path_buf()
}
