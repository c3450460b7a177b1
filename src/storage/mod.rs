//! Storage Layer - SQLite-backed persistence
//!
//! Two kinds of database live here:
//! - the primary record store: companies(id, name, storage_key) and the
//!   legacy students(id, name, age, company_id) table
//! - one secondary store per company, `<storage_key>.db`, holding
//!   students(id, name, age)

pub mod schema;
pub mod records;
pub mod tenant;

pub use records::{RecordStore, LegacyStudent, DbStats};
pub use tenant::{TenantStores, StagedRemoval, StoreScan};
