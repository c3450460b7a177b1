//! Controller layer
//!
//! [`Admin`] owns the primary record store and the per-company student
//! stores. Every operation takes the record store lock for its whole
//! duration, so a record change and the matching file operation are never
//! interleaved with another request's.

pub mod company;
pub mod student;
pub mod audit;
pub mod migrate;

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use crate::company::Company;
use crate::storage::{RecordStore, TenantStores};
use crate::{Error, Result};

pub use company::CompanyController;
pub use student::StudentController;
pub use audit::{AuditReport, MisnamedStore, RepairOptions, RepairSummary, StorageAuditor};
pub use migrate::MigrationSummary;

/// Entry point to the company and student operations
pub struct Admin {
    records: Mutex<RecordStore>,
    tenants: TenantStores,
}

impl Admin {
    /// The primary database file is reserved so no company store can alias it
    pub fn new(records: RecordStore, tenants: TenantStores) -> Self {
        let tenants = match records.path() {
            Some(database) => tenants.reserve(database),
            None => tenants,
        };
        Self {
            records: Mutex::new(records),
            tenants,
        }
    }

    /// Open the primary database and the storage root
    pub fn open(database: &Path, storage_root: &Path) -> Result<Self> {
        let records = RecordStore::open(database)?;
        let tenants = TenantStores::open(storage_root)?;
        tracing::debug!(
            "Opened record store {} with student stores under {}",
            database.display(),
            storage_root.display()
        );
        Ok(Self::new(records, tenants))
    }

    pub fn companies(&self) -> CompanyController<'_> {
        CompanyController::new(self)
    }

    pub fn students(&self) -> StudentController<'_> {
        StudentController::new(self)
    }

    pub fn auditor(&self) -> StorageAuditor<'_> {
        StorageAuditor::new(self)
    }

    pub fn tenants(&self) -> &TenantStores {
        &self.tenants
    }

    /// Primary store statistics
    pub fn stats(&self) -> Result<crate::storage::DbStats> {
        self.lock().stats()
    }

    fn lock(&self) -> MutexGuard<'_, RecordStore> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Load a company or fail with NotFound
fn resolve_company(records: &RecordStore, id: i64) -> Result<Company> {
    records
        .get_company(id)?
        .ok_or_else(|| Error::NotFound(format!("company {}", id)))
}

/// Run `apply` (record change plus file operation) inside a transaction.
///
/// If `apply` fails the transaction is rolled back and the file side is left
/// to `apply` itself. If the commit fails, `compensate` receives the value
/// `apply` produced and must undo the file operation.
fn coordinated<T>(
    records: &mut RecordStore,
    apply: impl FnOnce(&RecordStore) -> Result<T>,
    compensate: impl FnOnce(T),
) -> Result<T> {
    records.begin_transaction()?;

    let value = match apply(records) {
        Ok(value) => value,
        Err(e) => {
            rollback_quietly(records);
            return Err(e);
        }
    };

    if let Err(e) = records.commit() {
        tracing::error!("Commit failed, undoing store change: {}", e);
        rollback_quietly(records);
        compensate(value);
        return Err(e);
    }

    Ok(value)
}

fn rollback_quietly(records: &mut RecordStore) {
    if let Err(e) = records.rollback() {
        tracing::debug!("Rollback after failure: {}", e);
    }
}
