use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh random (v4) identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

uuid_id!(
    /// Identifier of a registered user
    UserId
);
uuid_id!(
    /// Identifier of an encrypted file record
    FileId
);
uuid_id!(
    /// Identifier of a share grant
    GrantId
);

/// A registered user. Usernames are unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    /// Unix timestamp of registration
    pub created_at: u64,
}

impl User {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            id: UserId::new(),
            username: username.into(),
            created_at: unix_now(),
        }
    }
}

/// Metadata for one uploaded file. Immutable once inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedFileRecord {
    pub id: FileId,
    pub owner_id: UserId,
    /// Sanitized name supplied at upload time
    pub original_name: String,
    /// Blob store path holding the ciphertext
    pub ciphertext_location: String,
    /// File key wrapped under the master key
    #[serde(with = "hex_bytes")]
    pub wrapped_key: Vec<u8>,
    /// Plaintext length in bytes
    pub size: u64,
    /// BLAKE3 of the ciphertext at rest (hex)
    pub content_hash: String,
    /// Unix timestamp of upload
    pub created_at: u64,
}

/// Read authorization extended by a file owner to another user.
///
/// `(file_id, recipient_id)` is unique across all grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareGrant {
    pub id: GrantId,
    pub file_id: FileId,
    pub sender_id: UserId,
    pub recipient_id: UserId,
    pub created_at: u64,
}

impl ShareGrant {
    pub fn new(file_id: FileId, sender_id: UserId, recipient_id: UserId) -> Self {
        Self {
            id: GrantId::new(),
            file_id,
            sender_id,
            recipient_id,
            created_at: unix_now(),
        }
    }
}

/// Current time as Unix seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

mod hex_bytes {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
        s.serialize_str(&hex)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let hex = String::deserialize(d)?;
        if !hex.is_ascii() {
            return Err(D::Error::custom("hex string contains non-ASCII characters"));
        }
        if hex.len() % 2 != 0 {
            return Err(D::Error::custom("odd-length hex string"));
        }
        hex.as_bytes()
            .chunks(2)
            .map(|pair| {
                let digits = std::str::from_utf8(pair).map_err(D::Error::custom)?;
                u8::from_str_radix(digits, 16).map_err(D::Error::custom)
            })
            .collect()
    }
}
