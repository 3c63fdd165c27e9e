//! Read gate and share authorization

use std::sync::Arc;

use shroud_core::{EncryptedFileRecord, ShareGrant, ShroudError, ShroudResult, UserId};

use crate::store::{GrantStore, UserStore};

/// Ownership and grant checks over the user and grant repositories.
///
/// Never touches ciphertext or key material: sharing is pure metadata.
#[derive(Clone)]
pub struct AccessLedger {
    users: Arc<dyn UserStore>,
    grants: Arc<dyn GrantStore>,
}

impl AccessLedger {
    pub fn new(users: Arc<dyn UserStore>, grants: Arc<dyn GrantStore>) -> Self {
        Self { users, grants }
    }

    /// True iff `requester` owns `record` or holds a grant for it.
    pub fn can_read(&self, record: &EncryptedFileRecord, requester: UserId) -> ShroudResult<bool> {
        if record.owner_id == requester {
            return Ok(true);
        }
        self.grants.grant_exists(record.id, requester)
    }

    /// Let the owner of `record` extend read access to `recipient_username`.
    ///
    /// Checked in order: ownership (`NotOwner`, which also rules out
    /// resharing by a recipient), blank name (`InvalidInput`), unknown user
    /// (`RecipientNotFound`), sharing with oneself (`InvalidInput`). A second
    /// grant for the same recipient is rejected by the store with
    /// `DuplicateGrant`.
    pub fn grant_share(
        &self,
        record: &EncryptedFileRecord,
        requester: UserId,
        recipient_username: &str,
    ) -> ShroudResult<ShareGrant> {
        if record.owner_id != requester {
            return Err(ShroudError::NotOwner);
        }

        let username = recipient_username.trim();
        if username.is_empty() {
            return Err(ShroudError::InvalidInput("recipient username is empty".into()));
        }

        let recipient = self
            .users
            .user_by_name(username)?
            .ok_or_else(|| ShroudError::RecipientNotFound(username.to_string()))?;

        if recipient.id == record.owner_id {
            return Err(ShroudError::InvalidInput(
                "cannot share a file with its owner".into(),
            ));
        }

        let grant = ShareGrant::new(record.id, requester, recipient.id);
        self.grants.insert_grant(&grant)?;

        tracing::info!(
            file_id = %record.id,
            sender = %requester,
            recipient = %recipient.id,
            "share granted"
        );
        Ok(grant)
    }
}
