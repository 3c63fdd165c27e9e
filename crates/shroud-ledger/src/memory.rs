//! In-memory repositories

use std::sync::{Mutex, MutexGuard};

use shroud_core::{
    EncryptedFileRecord, FileId, ShareGrant, ShroudError, ShroudResult, User, UserId,
};

use crate::store::{FileStore, GrantStore, UserStore};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    files: Vec<EncryptedFileRecord>,
    grants: Vec<ShareGrant>,
}

/// All three repositories in one struct. Every uniqueness check and the
/// insert it guards happen under the same lock.
#[derive(Default)]
pub struct MemoryLedger {
    tables: Mutex<Tables>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> ShroudResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| ShroudError::Storage("memory ledger lock poisoned".into()))
    }
}

impl UserStore for MemoryLedger {
    fn insert_user(&self, user: &User) -> ShroudResult<()> {
        let mut t = self.lock()?;
        if t.users.iter().any(|u| u.username == user.username) {
            return Err(ShroudError::UsernameTaken(user.username.clone()));
        }
        t.users.push(user.clone());
        Ok(())
    }

    fn user(&self, id: UserId) -> ShroudResult<Option<User>> {
        Ok(self.lock()?.users.iter().find(|u| u.id == id).cloned())
    }

    fn user_by_name(&self, username: &str) -> ShroudResult<Option<User>> {
        Ok(self
            .lock()?
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }
}

impl FileStore for MemoryLedger {
    fn insert_file(&self, record: &EncryptedFileRecord) -> ShroudResult<()> {
        let mut t = self.lock()?;
        if t.files.iter().any(|f| f.id == record.id) {
            return Err(ShroudError::Storage(format!("duplicate file id {}", record.id)));
        }
        t.files.push(record.clone());
        Ok(())
    }

    fn file(&self, id: FileId) -> ShroudResult<Option<EncryptedFileRecord>> {
        Ok(self.lock()?.files.iter().find(|f| f.id == id).cloned())
    }

    fn files_owned_by(&self, owner: UserId) -> ShroudResult<Vec<EncryptedFileRecord>> {
        Ok(self
            .lock()?
            .files
            .iter()
            .filter(|f| f.owner_id == owner)
            .cloned()
            .collect())
    }
}

impl GrantStore for MemoryLedger {
    fn insert_grant(&self, grant: &ShareGrant) -> ShroudResult<()> {
        let mut t = self.lock()?;
        if t
            .grants
            .iter()
            .any(|g| g.file_id == grant.file_id && g.recipient_id == grant.recipient_id)
        {
            return Err(ShroudError::DuplicateGrant);
        }
        t.grants.push(grant.clone());
        Ok(())
    }

    fn grant_exists(&self, file: FileId, recipient: UserId) -> ShroudResult<bool> {
        Ok(self
            .lock()?
            .grants
            .iter()
            .any(|g| g.file_id == file && g.recipient_id == recipient))
    }

    fn grants_for_recipient(&self, recipient: UserId) -> ShroudResult<Vec<ShareGrant>> {
        Ok(self
            .lock()?
            .grants
            .iter()
            .filter(|g| g.recipient_id == recipient)
            .cloned()
            .collect())
    }

    fn grants_for_file(&self, file: FileId) -> ShroudResult<Vec<ShareGrant>> {
        Ok(self
            .lock()?
            .grants
            .iter()
            .filter(|g| g.file_id == file)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_username_rejected() {
        let ledger = MemoryLedger::new();
        ledger.insert_user(&User::new("alice")).unwrap();
        let err = ledger.insert_user(&User::new("alice")).unwrap_err();
        assert!(matches!(err, ShroudError::UsernameTaken(name) if name == "alice"));
    }

    #[test]
    fn duplicate_grant_leaves_one_row() {
        let ledger = MemoryLedger::new();
        let (file, sender, recipient) = (FileId::new(), UserId::new(), UserId::new());

        ledger.insert_grant(&ShareGrant::new(file, sender, recipient)).unwrap();
        let err = ledger
            .insert_grant(&ShareGrant::new(file, sender, recipient))
            .unwrap_err();

        assert!(matches!(err, ShroudError::DuplicateGrant));
        assert_eq!(ledger.grants_for_file(file).unwrap().len(), 1);
        assert!(ledger.grant_exists(file, recipient).unwrap());
        assert!(!ledger.grant_exists(file, sender).unwrap());
    }
}
