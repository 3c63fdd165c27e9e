//! Racing share requests for the same (file, recipient) pair must leave
//! exactly one grant, whichever store backs the ledger.

use std::sync::Arc;
use std::thread;

use shroud_core::{EncryptedFileRecord, FileId, ShroudError, User};
use shroud_ledger::{AccessLedger, FileStore, GrantStore, MemoryLedger, SqliteLedger, UserStore};

const RACERS: usize = 16;

fn seed<S: UserStore + FileStore>(store: &S) -> EncryptedFileRecord {
    let alice = User::new("alice");
    store.insert_user(&alice).unwrap();
    store.insert_user(&User::new("bob")).unwrap();
    let record = EncryptedFileRecord {
        id: FileId::new(),
        owner_id: alice.id,
        original_name: "report.pdf".into(),
        ciphertext_location: "uploads/aaaaaaaaaaaaaaaaaaaaaaaa_report.pdf.enc".into(),
        wrapped_key: vec![1u8; 72],
        size: 4,
        content_hash: String::new(),
        created_at: 1,
    };
    store.insert_file(&record).unwrap();
    record
}

fn race(access: AccessLedger, record: EncryptedFileRecord) -> (usize, usize) {
    let handles: Vec<_> = (0..RACERS)
        .map(|_| {
            let access = access.clone();
            let record = record.clone();
            thread::spawn(move || access.grant_share(&record, record.owner_id, "bob"))
        })
        .collect();

    let mut ok = 0;
    let mut duplicate = 0;
    for h in handles {
        match h.join().unwrap() {
            Ok(_) => ok += 1,
            Err(ShroudError::DuplicateGrant) => duplicate += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    (ok, duplicate)
}

#[test]
fn memory_ledger_keeps_one_grant() {
    let ledger = Arc::new(MemoryLedger::new());
    let record = seed(ledger.as_ref());
    let access = AccessLedger::new(ledger.clone(), ledger.clone());

    assert_eq!(race(access, record.clone()), (1, RACERS - 1));
    assert_eq!(ledger.grants_for_file(record.id).unwrap().len(), 1);
}

#[test]
fn sqlite_ledger_keeps_one_grant() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Arc::new(SqliteLedger::open(&dir.path().join("ledger.db")).unwrap());
    let record = seed(ledger.as_ref());
    let access = AccessLedger::new(ledger.clone(), ledger.clone());

    assert_eq!(race(access, record.clone()), (1, RACERS - 1));
    assert_eq!(ledger.grants_for_file(record.id).unwrap().len(), 1);
}
