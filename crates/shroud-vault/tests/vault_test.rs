//! End-to-end vault tests over the OpenDAL memory backend.

use std::sync::Arc;

use opendal::Operator;
use shroud_core::{EncryptedFileRecord, FileId, ShroudError, ShroudResult, User, UserId};
use shroud_crypto::{MasterKey, WRAPPED_KEY_SIZE};
use shroud_ledger::{FileStore, MemoryLedger, SqliteLedger, UserStore};
use shroud_secrets::StaticKeyProvider;
use shroud_storage::BlobStore;
use shroud_vault::Vault;

fn memory_blobs() -> BlobStore {
    let op = Operator::new(opendal::services::Memory::default())
        .expect("memory operator")
        .finish();
    BlobStore::new(op, "uploads")
}

fn keys(byte: u8) -> StaticKeyProvider {
    StaticKeyProvider::new(MasterKey::from_bytes([byte; 32]), "test")
}

fn vault_on(blobs: BlobStore, ledger: Arc<MemoryLedger>, key_byte: u8) -> Vault {
    Vault::with_ledger(&keys(key_byte), blobs, ledger).unwrap()
}

fn test_vault() -> Vault {
    vault_on(memory_blobs(), Arc::new(MemoryLedger::new()), 42)
}

#[tokio::test]
async fn hello_world_owner_and_stranger() {
    let vault = test_vault();
    let alice = vault.register_user("alice").unwrap();
    let mallory = vault.register_user("mallory").unwrap();

    let record = vault
        .store_protected(alice.id, "greeting.txt", b"hello world")
        .await
        .unwrap();

    assert_eq!(record.owner_id, alice.id);
    assert_eq!(record.size, 11);
    assert_eq!(record.wrapped_key.len(), WRAPPED_KEY_SIZE);

    let stored = vault
        .blobs()
        .get(&record.ciphertext_location, &record.content_hash)
        .await
        .unwrap();
    assert_eq!(stored.len(), 24 + 11 + 16);
    assert!(!stored.windows(11).any(|w| w == b"hello world"));

    let revealed = vault.retrieve_protected(record.id, alice.id).await.unwrap();
    assert_eq!(revealed.bytes, b"hello world");
    assert_eq!(revealed.original_name, "greeting.txt");

    let err = vault
        .retrieve_protected(record.id, mallory.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ShroudError::AccessDenied));
}

#[tokio::test]
async fn empty_file_roundtrip() {
    let vault = test_vault();
    let alice = vault.register_user("alice").unwrap();
    let record = vault.store_protected(alice.id, "empty", b"").await.unwrap();

    assert_eq!(record.size, 0);
    let revealed = vault.retrieve_protected(record.id, alice.id).await.unwrap();
    assert!(revealed.bytes.is_empty());
}

#[tokio::test]
async fn share_then_recipient_reads() {
    let vault = test_vault();
    let alice = vault.register_user("alice").unwrap();
    let bob = vault.register_user("bob").unwrap();
    let record = vault
        .store_protected(alice.id, "plan.md", b"the plan")
        .await
        .unwrap();

    assert!(matches!(
        vault.retrieve_protected(record.id, bob.id).await.unwrap_err(),
        ShroudError::AccessDenied
    ));

    let grant = vault.share(record.id, alice.id, "bob").unwrap();
    assert_eq!(grant.recipient_id, bob.id);

    let revealed = vault.retrieve_protected(record.id, bob.id).await.unwrap();
    assert_eq!(revealed.bytes, b"the plan");

    let shared = vault.shared_with(bob.id).unwrap();
    assert_eq!(shared.len(), 1);
    assert_eq!(shared[0].record.id, record.id);
    assert_eq!(shared[0].sender.username, "alice");
    assert!(vault.shared_with(alice.id).unwrap().is_empty());
}

#[tokio::test]
async fn no_transitive_sharing() {
    let vault = test_vault();
    let alice = vault.register_user("alice").unwrap();
    let bob = vault.register_user("bob").unwrap();
    let carol = vault.register_user("carol").unwrap();
    let record = vault.store_protected(alice.id, "f", b"x").await.unwrap();
    vault.share(record.id, alice.id, "bob").unwrap();

    assert!(matches!(
        vault.share(record.id, bob.id, "carol").unwrap_err(),
        ShroudError::NotOwner
    ));
    assert!(matches!(
        vault.retrieve_protected(record.id, carol.id).await.unwrap_err(),
        ShroudError::AccessDenied
    ));
}

#[tokio::test]
async fn share_errors() {
    let vault = test_vault();
    let alice = vault.register_user("alice").unwrap();
    vault.register_user("bob").unwrap();
    let record = vault.store_protected(alice.id, "f", b"x").await.unwrap();

    assert!(matches!(
        vault.share(record.id, alice.id, "nobody").unwrap_err(),
        ShroudError::RecipientNotFound(_)
    ));
    assert!(matches!(
        vault.share(FileId::new(), alice.id, "bob").unwrap_err(),
        ShroudError::NotFound(_)
    ));

    vault.share(record.id, alice.id, "bob").unwrap();
    assert!(matches!(
        vault.share(record.id, alice.id, "bob").unwrap_err(),
        ShroudError::DuplicateGrant
    ));
    assert_eq!(vault.shared_with(vault.user_by_name("bob").unwrap().unwrap().id).unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_file_is_not_found() {
    let vault = test_vault();
    let alice = vault.register_user("alice").unwrap();
    let missing = FileId::new();
    let err = vault.retrieve_protected(missing, alice.id).await.unwrap_err();
    assert!(matches!(err, ShroudError::NotFound(id) if id == missing));
}

#[tokio::test]
async fn wrong_master_key_fails_closed() {
    let blobs = memory_blobs();
    let ledger = Arc::new(MemoryLedger::new());
    let writer = vault_on(blobs.clone(), ledger.clone(), 1);
    let reader = vault_on(blobs, ledger, 2);

    let alice = writer.register_user("alice").unwrap();
    let record = writer.store_protected(alice.id, "f", b"secret").await.unwrap();

    let err = reader.retrieve_protected(record.id, alice.id).await.unwrap_err();
    assert!(matches!(err, ShroudError::KeyUnwrap));
}

async fn tamper(vault: &Vault, record: &EncryptedFileRecord) {
    let op = vault.blobs().operator();
    let mut bytes = op.read(&record.ciphertext_location).await.unwrap().to_vec();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    op.write(&record.ciphertext_location, bytes).await.unwrap();
}

#[tokio::test]
async fn tampered_blob_with_hash_check_is_storage_error() {
    let vault = test_vault();
    let alice = vault.register_user("alice").unwrap();
    let record = vault.store_protected(alice.id, "f", b"payload").await.unwrap();
    tamper(&vault, &record).await;

    let err = vault.retrieve_protected(record.id, alice.id).await.unwrap_err();
    assert!(matches!(err, ShroudError::Storage(_)));
}

#[tokio::test]
async fn tampered_blob_without_hash_check_is_decryption_error() {
    let blobs = memory_blobs().with_verification(false);
    let vault = vault_on(blobs, Arc::new(MemoryLedger::new()), 42);
    let alice = vault.register_user("alice").unwrap();
    let record = vault.store_protected(alice.id, "f", b"payload").await.unwrap();
    tamper(&vault, &record).await;

    let err = vault.retrieve_protected(record.id, alice.id).await.unwrap_err();
    assert!(matches!(err, ShroudError::Decryption));
}

#[tokio::test]
async fn names_are_sanitized_and_empty_rejected() {
    let vault = test_vault();
    let alice = vault.register_user("alice").unwrap();

    let record = vault
        .store_protected(alice.id, "../../etc/my passwd", b"x")
        .await
        .unwrap();
    assert_eq!(record.original_name, "etc_my_passwd");
    assert!(record.ciphertext_location.ends_with("_etc_my_passwd.enc"));

    let err = vault.store_protected(alice.id, "../..", b"x").await.unwrap_err();
    assert!(matches!(err, ShroudError::InvalidInput(_)));
}

#[tokio::test]
async fn unknown_owner_and_blank_username_rejected() {
    let vault = test_vault();
    assert!(matches!(
        vault.store_protected(UserId::new(), "f", b"x").await.unwrap_err(),
        ShroudError::InvalidInput(_)
    ));
    assert!(matches!(
        vault.register_user("  ").unwrap_err(),
        ShroudError::InvalidInput(_)
    ));
    vault.register_user("alice").unwrap();
    assert!(matches!(
        vault.register_user("alice").unwrap_err(),
        ShroudError::UsernameTaken(_)
    ));
}

#[tokio::test]
async fn owned_files_lists_only_mine() {
    let vault = test_vault();
    let alice = vault.register_user("alice").unwrap();
    let bob = vault.register_user("bob").unwrap();
    let a1 = vault.store_protected(alice.id, "a1", b"1").await.unwrap();
    let a2 = vault.store_protected(alice.id, "a2", b"2").await.unwrap();
    vault.store_protected(bob.id, "b1", b"3").await.unwrap();

    let ids: Vec<_> = vault
        .owned_files(alice.id)
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec![a1.id, a2.id]);
}

/// File store whose inserts always fail, to exercise blob cleanup.
struct RefusingFiles;

impl FileStore for RefusingFiles {
    fn insert_file(&self, _record: &EncryptedFileRecord) -> ShroudResult<()> {
        Err(ShroudError::Storage("disk full".into()))
    }

    fn file(&self, _id: FileId) -> ShroudResult<Option<EncryptedFileRecord>> {
        Ok(None)
    }

    fn files_owned_by(&self, _owner: UserId) -> ShroudResult<Vec<EncryptedFileRecord>> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn failed_record_insert_removes_blob() {
    let blobs = memory_blobs();
    let ledger = Arc::new(MemoryLedger::new());
    let alice = User::new("alice");
    ledger.insert_user(&alice).unwrap();

    let vault = Vault::new(
        &keys(42),
        blobs.clone(),
        ledger.clone(),
        Arc::new(RefusingFiles),
        ledger,
    )
    .unwrap();

    let err = vault
        .store_protected(alice.id, "doomed.txt", b"bytes")
        .await
        .unwrap_err();
    assert!(matches!(err, ShroudError::Storage(_)));

    let leftovers = blobs.operator().list("uploads/").await.unwrap();
    assert!(
        leftovers.iter().all(|e| !e.path().ends_with(".enc")),
        "orphan ciphertext left behind"
    );
}

#[tokio::test]
async fn sqlite_backed_vault_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("ledger.db");
    let blobs = memory_blobs();

    let (alice_id, file_id) = {
        let vault =
            Vault::with_ledger(&keys(7), blobs.clone(), Arc::new(SqliteLedger::open(&db).unwrap()))
                .unwrap();
        let alice = vault.register_user("alice").unwrap();
        let record = vault.store_protected(alice.id, "keep.txt", b"persisted").await.unwrap();
        (alice.id, record.id)
    };

    let vault =
        Vault::with_ledger(&keys(7), blobs, Arc::new(SqliteLedger::open(&db).unwrap())).unwrap();
    let revealed = vault.retrieve_protected(file_id, alice_id).await.unwrap();
    assert_eq!(revealed.bytes, b"persisted");
}
