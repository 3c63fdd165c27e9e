//! shroud-ledger: who owns what, and who may read it
//!
//! Three repositories (`UserStore`, `FileStore`, `GrantStore`) with two
//! implementations:
//!   - `MemoryLedger`: process-local maps behind one lock, for tests
//!   - `SqliteLedger`: a single SQLite file; uniqueness lives in the schema
//!
//! `AccessLedger` sits on top and answers the two questions the vault asks:
//! may this user read this file, and may this user share it.

pub mod access;
pub mod memory;
pub mod sqlite;
pub mod store;

pub use access::AccessLedger;
pub use memory::MemoryLedger;
pub use sqlite::SqliteLedger;
pub use store::{FileStore, GrantStore, UserStore};
