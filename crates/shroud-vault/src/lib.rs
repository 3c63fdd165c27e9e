//! shroud-vault: the two operations callers actually need
//!
//! - `store_protected`: encrypt under a fresh file key, wrap that key under
//!   the master key, write the ciphertext, record ownership
//! - `retrieve_protected`: check the read gate, then unwrap and decrypt
//!
//! Plus the bookkeeping around them: user registration, sharing, and the two
//! dashboard listings (my files, files shared with me).

use std::sync::Arc;

use serde::Serialize;

use shroud_core::config::{expand_tilde, ShroudConfig};
use shroud_core::types::unix_now;
use shroud_core::{
    secure_filename, EncryptedFileRecord, FileId, ShareGrant, ShroudError, ShroudResult, User,
    UserId,
};
use shroud_crypto::{decrypt, encrypt, unwrap_key, wrap_key, MasterKey};
use shroud_ledger::{AccessLedger, FileStore, GrantStore, SqliteLedger, UserStore};
use shroud_secrets::KeyProvider;
use shroud_storage::{check_health, BlobStore};

/// Plaintext handed back to an authorized reader.
pub struct RevealedFile {
    pub original_name: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for RevealedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevealedFile")
            .field("original_name", &self.original_name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// A file someone else shared with the requester.
#[derive(Debug, Clone, Serialize)]
pub struct SharedFile {
    pub record: EncryptedFileRecord,
    pub sender: User,
}

/// Envelope-encrypted file vault.
///
/// Holds the master key for its whole lifetime; `Send + Sync`, share it
/// behind an `Arc`.
pub struct Vault {
    master: MasterKey,
    key_source: String,
    blobs: BlobStore,
    users: Arc<dyn UserStore>,
    files: Arc<dyn FileStore>,
    grants: Arc<dyn GrantStore>,
    access: AccessLedger,
}

impl Vault {
    /// Load the master key from `keys` once and wire up the stores.
    pub fn new(
        keys: &dyn KeyProvider,
        blobs: BlobStore,
        users: Arc<dyn UserStore>,
        files: Arc<dyn FileStore>,
        grants: Arc<dyn GrantStore>,
    ) -> ShroudResult<Self> {
        let master = keys.master_key()?;
        let access = AccessLedger::new(users.clone(), grants.clone());
        Ok(Self {
            master,
            key_source: keys.source(),
            blobs,
            users,
            files,
            grants,
            access,
        })
    }

    /// One store implementing all three repositories.
    pub fn with_ledger<L>(keys: &dyn KeyProvider, blobs: BlobStore, ledger: Arc<L>) -> ShroudResult<Self>
    where
        L: UserStore + FileStore + GrantStore + 'static,
    {
        Self::new(keys, blobs, ledger.clone(), ledger.clone(), ledger)
    }

    /// Discover the master key, build the blob store and open the SQLite
    /// ledger named by `config`.
    pub fn from_config(config: &ShroudConfig) -> ShroudResult<Self> {
        let keys = shroud_secrets::discover(&config.secrets)?;
        let blobs = BlobStore::from_config(&config.storage)?;
        let ledger = Arc::new(SqliteLedger::open(&expand_tilde(&config.ledger.path))?);
        Self::with_ledger(keys.as_ref(), blobs, ledger)
    }

    /// Where the master key came from (never the key itself).
    pub fn key_source(&self) -> &str {
        &self.key_source
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    /// Lists the blob store root.
    pub async fn health(&self) -> ShroudResult<()> {
        check_health(self.blobs.operator()).await
    }

    // ── Users ────────────────────────────────────────────────────────────

    pub fn register_user(&self, username: &str) -> ShroudResult<User> {
        let username = username.trim();
        if username.is_empty() {
            return Err(ShroudError::InvalidInput("username is empty".into()));
        }
        let user = User::new(username);
        self.users.insert_user(&user)?;
        tracing::info!(user_id = %user.id, username = %user.username, "user registered");
        Ok(user)
    }

    pub fn user_by_name(&self, username: &str) -> ShroudResult<Option<User>> {
        self.users.user_by_name(username.trim())
    }

    // ── Files ────────────────────────────────────────────────────────────

    /// Encrypt `raw` for `owner` and persist it.
    ///
    /// The ciphertext is written before the record; if the record insert
    /// fails the blob is removed again, so a record never exists without its
    /// wrapped key and no orphan ciphertext is left behind.
    pub async fn store_protected(
        &self,
        owner: UserId,
        original_name: &str,
        raw: &[u8],
    ) -> ShroudResult<EncryptedFileRecord> {
        let name = secure_filename(original_name);
        if name.is_empty() {
            return Err(ShroudError::InvalidInput(format!(
                "file name {original_name:?} is empty after sanitizing"
            )));
        }
        if self.users.user(owner)?.is_none() {
            return Err(ShroudError::InvalidInput(format!("unknown user {owner}")));
        }

        let (ciphertext, file_key) = encrypt(raw)?;
        let wrapped_key = wrap_key(&self.master, &file_key)?;
        drop(file_key);

        let blob = self.blobs.put(&name, ciphertext).await?;
        let record = EncryptedFileRecord {
            id: FileId::new(),
            owner_id: owner,
            original_name: name,
            ciphertext_location: blob.location,
            wrapped_key,
            size: raw.len() as u64,
            content_hash: blob.content_hash,
            created_at: unix_now(),
        };

        if let Err(e) = self.files.insert_file(&record) {
            if let Err(cleanup) = self.blobs.delete(&record.ciphertext_location).await {
                tracing::warn!(
                    location = %record.ciphertext_location,
                    "orphan blob left behind: {cleanup}"
                );
            }
            return Err(e);
        }

        tracing::info!(
            file_id = %record.id,
            owner = %owner,
            size = record.size,
            "file encrypted and stored"
        );
        Ok(record)
    }

    /// Decrypt a file for `requester` if they own it or hold a grant.
    pub async fn retrieve_protected(
        &self,
        file_id: FileId,
        requester: UserId,
    ) -> ShroudResult<RevealedFile> {
        let record = self.record(file_id)?;

        if !self.access.can_read(&record, requester)? {
            tracing::warn!(%file_id, %requester, "read denied");
            return Err(ShroudError::AccessDenied);
        }

        let ciphertext = self
            .blobs
            .get(&record.ciphertext_location, &record.content_hash)
            .await?;
        let file_key = unwrap_key(&self.master, &record.wrapped_key)?;
        let bytes = decrypt(&ciphertext, &file_key)?;

        tracing::debug!(%file_id, %requester, size = bytes.len(), "file revealed");
        Ok(RevealedFile {
            original_name: record.original_name,
            bytes,
        })
    }

    /// Let the owner of `file_id` grant read access to `recipient_username`.
    pub fn share(
        &self,
        file_id: FileId,
        requester: UserId,
        recipient_username: &str,
    ) -> ShroudResult<ShareGrant> {
        let record = self.record(file_id)?;
        self.access.grant_share(&record, requester, recipient_username)
    }

    /// Files uploaded by `user`, oldest first.
    pub fn owned_files(&self, user: UserId) -> ShroudResult<Vec<EncryptedFileRecord>> {
        self.files.files_owned_by(user)
    }

    /// Files other users shared with `user`, with who shared them. Grants
    /// whose file or sender no longer resolves are skipped.
    pub fn shared_with(&self, user: UserId) -> ShroudResult<Vec<SharedFile>> {
        let mut shared = Vec::new();
        for grant in self.grants.grants_for_recipient(user)? {
            let (Some(record), Some(sender)) =
                (self.files.file(grant.file_id)?, self.users.user(grant.sender_id)?)
            else {
                continue;
            };
            shared.push(SharedFile { record, sender });
        }
        Ok(shared)
    }

    fn record(&self, file_id: FileId) -> ShroudResult<EncryptedFileRecord> {
        self.files
            .file(file_id)?
            .ok_or(ShroudError::NotFound(file_id))
    }
}
