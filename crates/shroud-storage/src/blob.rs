//! Ciphertext blobs with a BLAKE3 integrity check

use opendal::{ErrorKind, Operator};
use rand::RngCore;
use shroud_core::config::StorageConfig;
use shroud_core::{ShroudError, ShroudResult};

use crate::operator::build_operator;

/// Where a blob landed and the BLAKE3 hash of what was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub location: String,
    pub content_hash: String,
}

/// Ciphertext blob store.
///
/// Blobs are write-once: `put` always picks a fresh location, so an existing
/// blob is never overwritten.
#[derive(Clone)]
pub struct BlobStore {
    op: Operator,
    prefix: String,
    verify: bool,
}

impl BlobStore {
    pub fn new(op: Operator, prefix: impl Into<String>) -> Self {
        Self {
            op,
            prefix: prefix.into().trim_matches('/').to_string(),
            verify: true,
        }
    }

    /// Toggle the BLAKE3 check in `get`.
    pub fn with_verification(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn from_config(storage: &StorageConfig) -> ShroudResult<Self> {
        let op = build_operator(storage)?;
        Ok(Self::new(op, storage.prefix.clone()).with_verification(storage.verify_content_hash))
    }

    pub fn operator(&self) -> &Operator {
        &self.op
    }

    /// Fresh blob key for a sanitized name: 12 random bytes, hex encoded.
    fn location_for(&self, name: &str) -> String {
        let mut raw = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut raw);
        let token: String = raw.iter().map(|b| format!("{b:02x}")).collect();
        let file = format!("{token}_{name}.enc");
        if self.prefix.is_empty() {
            file
        } else {
            format!("{}/{file}", self.prefix)
        }
    }

    /// Write ciphertext under a new location.
    pub async fn put(&self, name: &str, ciphertext: Vec<u8>) -> ShroudResult<StoredBlob> {
        let location = self.location_for(name);
        let content_hash = blake3::hash(&ciphertext).to_hex().to_string();
        let size = ciphertext.len();

        self.op
            .write(&location, ciphertext)
            .await
            .map_err(|e| ShroudError::Storage(format!("writing {location}: {e}")))?;

        tracing::debug!(%location, size, hash = %content_hash, "stored blob");
        Ok(StoredBlob {
            location,
            content_hash,
        })
    }

    /// Read a blob back. With verification on, bytes whose BLAKE3 hash does not
    /// match `expected_hash` are refused before anyone tries to decrypt them.
    pub async fn get(&self, location: &str, expected_hash: &str) -> ShroudResult<Vec<u8>> {
        let buf = self.op.read(location).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                ShroudError::Storage(format!("blob missing: {location}"))
            } else {
                ShroudError::Storage(format!("reading {location}: {e}"))
            }
        })?;
        let bytes = buf.to_vec();

        if self.verify && !expected_hash.is_empty() {
            let actual = blake3::hash(&bytes).to_hex();
            if actual.as_str() != expected_hash {
                tracing::warn!(%location, "blob content hash mismatch");
                return Err(ShroudError::Storage(format!(
                    "content hash mismatch for {location}"
                )));
            }
        }
        Ok(bytes)
    }

    /// Remove a blob. Missing blobs are not an error.
    pub async fn delete(&self, location: &str) -> ShroudResult<()> {
        self.op
            .delete(location)
            .await
            .map_err(|e| ShroudError::Storage(format!("deleting {location}: {e}")))
    }

    /// True when a blob exists at `location`.
    pub async fn exists(&self, location: &str) -> ShroudResult<bool> {
        self.op
            .exists(location)
            .await
            .map_err(|e| ShroudError::Storage(format!("stat {location}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_store() -> BlobStore {
        let op = Operator::new(opendal::services::Memory::default())
            .expect("memory operator")
            .finish();
        BlobStore::new(op, "uploads")
    }

    #[tokio::test]
    async fn put_then_get() {
        let store = memory_store();
        let blob = store.put("notes.txt", b"ciphertext".to_vec()).await.unwrap();

        assert!(blob.location.starts_with("uploads/"));
        assert!(blob.location.ends_with("_notes.txt.enc"));
        assert_eq!(blob.content_hash, blake3::hash(b"ciphertext").to_hex().to_string());

        let bytes = store.get(&blob.location, &blob.content_hash).await.unwrap();
        assert_eq!(bytes, b"ciphertext");
    }

    #[tokio::test]
    async fn location_shape() {
        let store = memory_store();
        let blob = store.put("a.bin", vec![1, 2, 3]).await.unwrap();
        let file = blob.location.strip_prefix("uploads/").unwrap();
        let (token, rest) = file.split_once('_').unwrap();
        assert_eq!(token.len(), 24);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(rest, "a.bin.enc");
    }

    #[tokio::test]
    async fn same_name_never_collides() {
        let store = memory_store();
        let a = store.put("same.txt", b"one".to_vec()).await.unwrap();
        let b = store.put("same.txt", b"two".to_vec()).await.unwrap();
        assert_ne!(a.location, b.location);
        assert_eq!(store.get(&a.location, &a.content_hash).await.unwrap(), b"one");
    }

    #[tokio::test]
    async fn missing_blob_is_storage_error() {
        let store = memory_store();
        let err = store.get("uploads/nope.enc", "").await.unwrap_err();
        assert!(matches!(err, ShroudError::Storage(_)));
    }

    #[tokio::test]
    async fn hash_mismatch_is_rejected() {
        let store = memory_store();
        let blob = store.put("x", b"original".to_vec()).await.unwrap();
        store
            .operator()
            .write(&blob.location, b"tampered".to_vec())
            .await
            .unwrap();

        let err = store.get(&blob.location, &blob.content_hash).await.unwrap_err();
        assert!(err.to_string().contains("content hash mismatch"));
    }

    #[tokio::test]
    async fn verification_can_be_disabled() {
        let store = memory_store().with_verification(false);
        let blob = store.put("x", b"original".to_vec()).await.unwrap();
        store
            .operator()
            .write(&blob.location, b"tampered".to_vec())
            .await
            .unwrap();

        assert_eq!(
            store.get(&blob.location, &blob.content_hash).await.unwrap(),
            b"tampered"
        );
    }

    #[tokio::test]
    async fn delete_removes_blob() {
        let store = memory_store();
        let blob = store.put("gone", b"bytes".to_vec()).await.unwrap();
        assert!(store.exists(&blob.location).await.unwrap());

        store.delete(&blob.location).await.unwrap();
        assert!(!store.exists(&blob.location).await.unwrap());
        store.delete(&blob.location).await.unwrap();
    }

    #[tokio::test]
    async fn empty_prefix() {
        let op = Operator::new(opendal::services::Memory::default())
            .unwrap()
            .finish();
        let store = BlobStore::new(op, "/");
        let blob = store.put("f", vec![0]).await.unwrap();
        assert!(!blob.location.contains('/'));
    }
}
