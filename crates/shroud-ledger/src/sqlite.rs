//! SQLite-backed repositories (rusqlite, bundled SQLite)
//!
//! Schema:
//! ```text
//! users  (id TEXT PK, username TEXT UNIQUE, created_at INTEGER)
//! files  (id TEXT PK, owner_id -> users, original_name, ciphertext_location,
//!         wrapped_key BLOB, size INTEGER, content_hash TEXT, created_at INTEGER)
//! grants (id TEXT PK, file_id -> files, sender_id -> users, recipient_id -> users,
//!         created_at INTEGER, UNIQUE(file_id, recipient_id))
//! ```
//!
//! The UNIQUE constraints are the only duplicate check: a violation surfaces
//! as `UsernameTaken` or `DuplicateGrant`.

use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};

use shroud_core::{
    EncryptedFileRecord, FileId, ShareGrant, ShroudError, ShroudResult, User, UserId,
};

use crate::store::{FileStore, GrantStore, UserStore};

const SCHEMA: &str = "
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    id          TEXT PRIMARY KEY,
    username    TEXT NOT NULL UNIQUE,
    created_at  INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS files (
    id                   TEXT PRIMARY KEY,
    owner_id             TEXT NOT NULL REFERENCES users(id),
    original_name        TEXT NOT NULL,
    ciphertext_location  TEXT NOT NULL,
    wrapped_key          BLOB NOT NULL,
    size                 INTEGER NOT NULL,
    content_hash         TEXT NOT NULL,
    created_at           INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_files_owner ON files(owner_id);

CREATE TABLE IF NOT EXISTS grants (
    id            TEXT PRIMARY KEY,
    file_id       TEXT NOT NULL REFERENCES files(id),
    sender_id     TEXT NOT NULL REFERENCES users(id),
    recipient_id  TEXT NOT NULL REFERENCES users(id),
    created_at    INTEGER NOT NULL,
    UNIQUE (file_id, recipient_id)
);
CREATE INDEX IF NOT EXISTS idx_grants_recipient ON grants(recipient_id);
";

const FILE_COLUMNS: &str = "id, owner_id, original_name, ciphertext_location, wrapped_key, \
                            size, content_hash, created_at";
const GRANT_COLUMNS: &str = "id, file_id, sender_id, recipient_id, created_at";

/// Users, file records and grants in one SQLite database.
pub struct SqliteLedger {
    conn: Mutex<Connection>,
}

impl SqliteLedger {
    /// Open (or create) the database at `path`. `:memory:` opens a private
    /// in-memory database.
    pub fn open(path: &Path) -> ShroudResult<Self> {
        if path == Path::new(":memory:") {
            return Self::open_in_memory();
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                ShroudError::Storage(format!("creating ledger dir {}: {e}", parent.display()))
            })?;
        }
        let conn = Connection::open(path)
            .map_err(|e| ShroudError::Storage(format!("opening ledger {}: {e}", path.display())))?;
        tracing::debug!(path = %path.display(), "opened sqlite ledger");
        Self::init(conn)
    }

    pub fn open_in_memory() -> ShroudResult<Self> {
        let conn = Connection::open_in_memory().map_err(sql_err)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> ShroudResult<Self> {
        conn.execute_batch(SCHEMA).map_err(sql_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> ShroudResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ShroudError::Storage("sqlite ledger lock poisoned".into()))
    }
}

fn sql_err(e: rusqlite::Error) -> ShroudError {
    ShroudError::Storage(format!("ledger: {e}"))
}

/// True for a UNIQUE or PRIMARY KEY violation, false for other constraints
/// (foreign keys, NOT NULL).
fn is_unique_violation(e: &rusqlite::Error) -> bool {
    match e {
        rusqlite::Error::SqliteFailure(err, _) => {
            err.code == ErrorCode::ConstraintViolation
                && matches!(
                    err.extended_code,
                    rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                        | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                )
        }
        _ => false,
    }
}

fn to_sql_int(value: u64, what: &str) -> ShroudResult<i64> {
    i64::try_from(value).map_err(|_| ShroudError::InvalidInput(format!("{what} out of range")))
}

fn parse_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: String = row.get(idx)?;
    text.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn int_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let v: i64 = row.get(idx)?;
    u64::try_from(v)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e)))
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: parse_col(row, 0)?,
        username: row.get(1)?,
        created_at: int_col(row, 2)?,
    })
}

fn file_from_row(row: &Row<'_>) -> rusqlite::Result<EncryptedFileRecord> {
    Ok(EncryptedFileRecord {
        id: parse_col(row, 0)?,
        owner_id: parse_col(row, 1)?,
        original_name: row.get(2)?,
        ciphertext_location: row.get(3)?,
        wrapped_key: row.get(4)?,
        size: int_col(row, 5)?,
        content_hash: row.get(6)?,
        created_at: int_col(row, 7)?,
    })
}

fn grant_from_row(row: &Row<'_>) -> rusqlite::Result<ShareGrant> {
    Ok(ShareGrant {
        id: parse_col(row, 0)?,
        file_id: parse_col(row, 1)?,
        sender_id: parse_col(row, 2)?,
        recipient_id: parse_col(row, 3)?,
        created_at: int_col(row, 4)?,
    })
}

impl UserStore for SqliteLedger {
    fn insert_user(&self, user: &User) -> ShroudResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO users (id, username, created_at) VALUES (?1, ?2, ?3)",
            params![
                user.id.to_string(),
                user.username,
                to_sql_int(user.created_at, "created_at")?
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                ShroudError::UsernameTaken(user.username.clone())
            } else {
                sql_err(e)
            }
        })?;
        Ok(())
    }

    fn user(&self, id: UserId) -> ShroudResult<Option<User>> {
        self.conn()?
            .query_row(
                "SELECT id, username, created_at FROM users WHERE id = ?1",
                params![id.to_string()],
                user_from_row,
            )
            .optional()
            .map_err(sql_err)
    }

    fn user_by_name(&self, username: &str) -> ShroudResult<Option<User>> {
        self.conn()?
            .query_row(
                "SELECT id, username, created_at FROM users WHERE username = ?1",
                params![username],
                user_from_row,
            )
            .optional()
            .map_err(sql_err)
    }
}

impl FileStore for SqliteLedger {
    fn insert_file(&self, record: &EncryptedFileRecord) -> ShroudResult<()> {
        let conn = self.conn()?;
        conn.execute(
            &format!("INSERT INTO files ({FILE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
            params![
                record.id.to_string(),
                record.owner_id.to_string(),
                record.original_name,
                record.ciphertext_location,
                record.wrapped_key,
                to_sql_int(record.size, "size")?,
                record.content_hash,
                to_sql_int(record.created_at, "created_at")?,
            ],
        )
        .map_err(sql_err)?;
        Ok(())
    }

    fn file(&self, id: FileId) -> ShroudResult<Option<EncryptedFileRecord>> {
        self.conn()?
            .query_row(
                &format!("SELECT {FILE_COLUMNS} FROM files WHERE id = ?1"),
                params![id.to_string()],
                file_from_row,
            )
            .optional()
            .map_err(sql_err)
    }

    fn files_owned_by(&self, owner: UserId) -> ShroudResult<Vec<EncryptedFileRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {FILE_COLUMNS} FROM files WHERE owner_id = ?1 ORDER BY created_at, rowid"
            ))
            .map_err(sql_err)?;
        let rows = stmt
            .query_map(params![owner.to_string()], file_from_row)
            .map_err(sql_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_err)
    }
}

impl GrantStore for SqliteLedger {
    fn insert_grant(&self, grant: &ShareGrant) -> ShroudResult<()> {
        let conn = self.conn()?;
        conn.execute(
            &format!("INSERT INTO grants ({GRANT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5)"),
            params![
                grant.id.to_string(),
                grant.file_id.to_string(),
                grant.sender_id.to_string(),
                grant.recipient_id.to_string(),
                to_sql_int(grant.created_at, "created_at")?,
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                ShroudError::DuplicateGrant
            } else {
                sql_err(e)
            }
        })?;
        Ok(())
    }

    fn grant_exists(&self, file: FileId, recipient: UserId) -> ShroudResult<bool> {
        self.conn()?
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM grants WHERE file_id = ?1 AND recipient_id = ?2)",
                params![file.to_string(), recipient.to_string()],
                |row| row.get(0),
            )
            .map_err(sql_err)
    }

    fn grants_for_recipient(&self, recipient: UserId) -> ShroudResult<Vec<ShareGrant>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {GRANT_COLUMNS} FROM grants WHERE recipient_id = ?1 \
                 ORDER BY created_at, rowid"
            ))
            .map_err(sql_err)?;
        let rows = stmt
            .query_map(params![recipient.to_string()], grant_from_row)
            .map_err(sql_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_err)
    }

    fn grants_for_file(&self, file: FileId) -> ShroudResult<Vec<ShareGrant>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {GRANT_COLUMNS} FROM grants WHERE file_id = ?1 ORDER BY created_at, rowid"
            ))
            .map_err(sql_err)?;
        let rows = stmt
            .query_map(params![file.to_string()], grant_from_row)
            .map_err(sql_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_err)
    }
}
