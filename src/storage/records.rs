//! Primary record store (SQLite)

use std::path::Path;
use rusqlite::{Connection, params, OptionalExtension};
use crate::Result;
use crate::company::Company;
use super::schema;

/// SQLite-backed storage for company records
pub struct RecordStore {
    conn: Connection,
    #[cfg(test)]
    fail_next_commit: bool,
}

impl RecordStore {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn,
            #[cfg(test)]
            fail_next_commit: false,
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn,
            #[cfg(test)]
            fail_next_commit: false,
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Location of the database file, None when in memory
    pub fn path(&self) -> Option<&Path> {
        self.conn.path().filter(|p| !p.is_empty()).map(Path::new)
    }

    /// Initialize the database schema
    fn initialize_schema(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON")?;
        for stmt in schema::all_schema_statements() {
            self.conn.execute(stmt, [])?;
        }
        Ok(())
    }

    // ========== Company Operations ==========

    /// Insert a company and return the stored record
    pub fn insert_company(&self, name: &str, storage_key: &str) -> Result<Company> {
        self.conn.execute(
            "INSERT INTO companies (name, storage_key) VALUES (?1, ?2)",
            params![name, storage_key],
        )?;
        Ok(Company {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
            storage_key: storage_key.to_string(),
        })
    }

    /// Get a company by id
    pub fn get_company(&self, id: i64) -> Result<Option<Company>> {
        self.conn
            .query_row(
                "SELECT id, name, storage_key FROM companies WHERE id = ?1",
                [id],
                |row| self.row_to_company(row),
            )
            .optional()
            .map_err(Into::into)
    }

    /// Find a company by its exact name
    pub fn find_company_by_name(&self, name: &str) -> Result<Option<Company>> {
        self.conn
            .query_row(
                "SELECT id, name, storage_key FROM companies WHERE name = ?1",
                [name],
                |row| self.row_to_company(row),
            )
            .optional()
            .map_err(Into::into)
    }

    /// Find a company by its storage key
    pub fn find_company_by_storage_key(&self, storage_key: &str) -> Result<Option<Company>> {
        self.conn
            .query_row(
                "SELECT id, name, storage_key FROM companies WHERE storage_key = ?1",
                [storage_key],
                |row| self.row_to_company(row),
            )
            .optional()
            .map_err(Into::into)
    }

    /// List all companies ordered by name
    pub fn list_companies(&self) -> Result<Vec<Company>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, storage_key FROM companies ORDER BY name, id"
        )?;

        let companies = stmt
            .query_map([], |row| self.row_to_company(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(companies)
    }

    /// Rename a company. Returns false if no row matched.
    pub fn update_company(&self, id: i64, name: &str, storage_key: &str) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE companies SET name = ?1, storage_key = ?2 WHERE id = ?3",
            params![name, storage_key, id],
        )?;
        Ok(changed > 0)
    }

    /// Delete a company (legacy student rows cascade). Returns false if no row matched.
    pub fn delete_company(&self, id: i64) -> Result<bool> {
        let changed = self.conn.execute("DELETE FROM companies WHERE id = ?1", [id])?;
        Ok(changed > 0)
    }

    /// Count all companies
    pub fn count_companies(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM companies", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn row_to_company(&self, row: &rusqlite::Row) -> rusqlite::Result<Company> {
        Ok(Company {
            id: row.get(0)?,
            name: row.get(1)?,
            storage_key: row.get(2)?,
        })
    }

    // ========== Legacy Student Operations ==========

    /// Insert a legacy student row
    pub fn insert_legacy_student(&self, company_id: i64, name: &str, age: i64) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO students (company_id, name, age) VALUES (?1, ?2, ?3)",
            params![company_id, name, age],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Legacy student rows belonging to one company
    pub fn legacy_students_for(&self, company_id: i64) -> Result<Vec<LegacyStudent>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, company_id, name, age FROM students WHERE company_id = ?1 ORDER BY id"
        )?;

        let rows = stmt
            .query_map([company_id], |row| {
                Ok(LegacyStudent {
                    id: row.get(0)?,
                    company_id: row.get(1)?,
                    name: row.get(2)?,
                    age: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
    }

    /// Ids of companies that still own legacy student rows
    pub fn companies_with_legacy_students(&self) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT company_id FROM students ORDER BY company_id"
        )?;

        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;

        Ok(ids)
    }

    /// Delete every legacy row of one company
    pub fn delete_legacy_students(&self, company_id: i64) -> Result<usize> {
        let changed = self.conn.execute("DELETE FROM students WHERE company_id = ?1", [company_id])?;
        Ok(changed)
    }

    /// Count legacy student rows
    pub fn count_legacy_students(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM students", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    // ========== Transactions ==========

    /// Begin a transaction
    pub fn begin_transaction(&mut self) -> Result<()> {
        self.conn.execute("BEGIN TRANSACTION", [])?;
        Ok(())
    }

    /// Commit a transaction
    pub fn commit(&mut self) -> Result<()> {
        #[cfg(test)]
        if std::mem::take(&mut self.fail_next_commit) {
            // Ends the transaction early so the COMMIT below fails
            self.conn.execute("ROLLBACK", [])?;
        }
        self.conn.execute("COMMIT", [])?;
        Ok(())
    }

    /// Rollback a transaction
    pub fn rollback(&mut self) -> Result<()> {
        self.conn.execute("ROLLBACK", [])?;
        Ok(())
    }

    /// Make the next [`RecordStore::commit`] fail after discarding the transaction
    #[cfg(test)]
    pub(crate) fn fail_next_commit(&mut self) {
        self.fail_next_commit = true;
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        Ok(DbStats {
            companies: self.count_companies()?,
            legacy_students: self.count_legacy_students()?,
        })
    }
}

/// Whether an error is a SQLite constraint violation (e.g. a duplicate name)
pub fn is_constraint_violation(err: &crate::Error) -> bool {
    matches!(
        err,
        crate::Error::Storage(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Student row from the legacy primary-store table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyStudent {
    pub id: i64,
    pub company_id: i64,
    pub name: String,
    pub age: i64,
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct DbStats {
    pub companies: usize,
    pub legacy_students: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_company_crud() {
        let store = RecordStore::open_in_memory().unwrap();

        let acme = store.insert_company("Acme Corp", "acme_corp").unwrap();
        let retrieved = store.get_company(acme.id).unwrap().unwrap();
        assert_eq!(retrieved, acme);

        assert!(store.update_company(acme.id, "Acme Inc", "acme_inc").unwrap());
        let renamed = store.find_company_by_storage_key("acme_inc").unwrap().unwrap();
        assert_eq!(renamed.name, "Acme Inc");
        assert!(store.find_company_by_name("Acme Corp").unwrap().is_none());

        assert!(store.delete_company(acme.id).unwrap());
        assert!(store.get_company(acme.id).unwrap().is_none());
        assert!(!store.delete_company(acme.id).unwrap());
    }

    #[test]
    fn test_duplicate_name_is_constraint_violation() {
        let store = RecordStore::open_in_memory().unwrap();
        store.insert_company("Acme", "acme").unwrap();

        let err = store.insert_company("Acme", "acme_2").unwrap_err();
        assert!(is_constraint_violation(&err));

        let err = store.insert_company("ACME", "acme").unwrap_err();
        assert!(is_constraint_violation(&err));
    }

    #[test]
    fn test_list_is_ordered_by_name() {
        let store = RecordStore::open_in_memory().unwrap();
        store.insert_company("Zeta", "zeta").unwrap();
        store.insert_company("Alpha", "alpha").unwrap();

        let names: Vec<_> = store.list_companies().unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, ["Alpha", "Zeta"]);
    }

    #[test]
    fn test_delete_cascades_to_legacy_students() {
        let store = RecordStore::open_in_memory().unwrap();
        let acme = store.insert_company("Acme", "acme").unwrap();
        store.insert_legacy_student(acme.id, "Ana", 21).unwrap();
        store.insert_legacy_student(acme.id, "Ben", 22).unwrap();
        assert_eq!(store.companies_with_legacy_students().unwrap(), [acme.id]);

        store.delete_company(acme.id).unwrap();
        assert_eq!(store.count_legacy_students().unwrap(), 0);
    }

    #[test]
    fn test_failed_commit_discards_changes() {
        let mut store = RecordStore::open_in_memory().unwrap();
        store.fail_next_commit();
        store.begin_transaction().unwrap();
        store.insert_company("Acme", "acme").unwrap();
        assert!(store.commit().is_err());
        assert_eq!(store.count_companies().unwrap(), 0);

        store.begin_transaction().unwrap();
        store.insert_company("Acme", "acme").unwrap();
        store.commit().unwrap();
        assert_eq!(store.count_companies().unwrap(), 1);
    }

    #[test]
    fn test_rollback_discards_changes() {
        let mut store = RecordStore::open_in_memory().unwrap();
        store.begin_transaction().unwrap();
        store.insert_company("Acme", "acme").unwrap();
        store.rollback().unwrap();
        assert_eq!(store.count_companies().unwrap(), 0);
    }
}
