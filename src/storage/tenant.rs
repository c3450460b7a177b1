//! Per-company student stores
//!
//! Each company owns one SQLite file under the storage root, named
//! `<storage_key>.db`. Every operation derives the file from the company
//! name through [`company_storage_key`], opens its own connection and drops
//! it before returning.

use std::fs;
use std::path::{Path, PathBuf};
use rusqlite::{Connection, OpenFlags, params, OptionalExtension};
use crate::company::company_storage_key;
use crate::student::{NewStudent, Student};
use crate::{Error, Result};
use super::schema;

/// Extension of a live student store
pub const STORE_EXTENSION: &str = "db";

/// Suffix appended to a store that is staged for removal
pub const STAGED_SUFFIX: &str = ".deleting";

/// Manager for the secondary, per-company student stores
#[derive(Debug, Clone)]
pub struct TenantStores {
    root: PathBuf,
    /// File that no company may use as its store, i.e. the primary database
    reserved: Option<PathBuf>,
}

impl TenantStores {
    /// Use `root` as the storage directory, creating it if needed
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root, reserved: None })
    }

    /// Refuse to treat `path` as any company's store
    pub fn reserve(mut self, path: &Path) -> Self {
        self.reserved = Some(path.canonicalize().unwrap_or_else(|_| path.to_path_buf()));
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the store file for a company name, or None for a blank key
    pub fn path_for(&self, company_name: &str) -> Option<PathBuf> {
        let key = company_storage_key(company_name);
        if key.is_empty() {
            return None;
        }
        Some(self.path_for_key(&key))
    }

    /// Path of the store file for an already-derived storage key
    pub fn path_for_key(&self, storage_key: &str) -> PathBuf {
        self.root.join(format!("{}.{}", storage_key, STORE_EXTENSION))
    }

    /// Whether the company's store path is the reserved file
    pub fn is_reserved(&self, company_name: &str) -> bool {
        match (&self.reserved, self.path_for(company_name)) {
            (Some(reserved), Some(path)) => same_location(&path, reserved),
            _ => false,
        }
    }

    /// Whether the company's store file exists
    pub fn exists(&self, company_name: &str) -> bool {
        !self.is_reserved(company_name) && self.path_for(company_name).is_some_and(|p| p.is_file())
    }

    /// [`TenantStores::path_for`], failing when the path is reserved
    fn store_path(&self, company_name: &str) -> Result<Option<PathBuf>> {
        if self.is_reserved(company_name) {
            return Err(Error::StorageInconsistency(format!(
                "store for {:?} would be the primary database",
                company_name
            )));
        }
        Ok(self.path_for(company_name))
    }

    // ========== Lifecycle ==========

    /// Create the company's store (or reuse an existing one) and ensure the
    /// students table exists. Returns the file path, or None when the name
    /// has no usable storage key.
    pub fn create(&self, company_name: &str) -> Result<Option<PathBuf>> {
        let Some(path) = self.store_path(company_name)? else {
            tracing::warn!("Skipping store creation: {:?} has no storage key", company_name);
            return Ok(None);
        };

        let conn = Connection::open(&path)?;
        conn.execute(schema::CREATE_TENANT_STUDENTS_TABLE, [])?;
        tracing::debug!("Student store ready at {}", path.display());
        Ok(Some(path))
    }

    /// Move the store of `old_name` to the key of `new_name`.
    ///
    /// A missing old store is repaired by creating the new one. An existing
    /// file at the destination is never overwritten or adopted.
    pub fn rename(&self, old_name: &str, new_name: &str) -> Result<()> {
        let (Some(old_path), Some(new_path)) = (self.store_path(old_name)?, self.store_path(new_name)?) else {
            tracing::warn!("Skipping store rename {:?} -> {:?}: blank storage key", old_name, new_name);
            return Ok(());
        };

        if old_path == new_path {
            return Ok(());
        }

        if new_path.exists() {
            return Err(Error::StorageInconsistency(format!(
                "cannot move store for {:?}: {} already exists",
                old_name,
                new_path.display()
            )));
        }

        if !old_path.is_file() {
            tracing::warn!(
                "Storage inconsistency: no store for {:?} at {}; creating one for {:?}",
                old_name,
                old_path.display(),
                new_name
            );
            self.create(new_name)?;
            return Ok(());
        }

        fs::rename(&old_path, &new_path)?;
        tracing::info!("Moved student store {} -> {}", old_path.display(), new_path.display());
        Ok(())
    }

    /// Remove the company's store if present. Returns whether a file was removed.
    pub fn delete(&self, company_name: &str) -> Result<bool> {
        let Some(path) = self.store_path(company_name)? else {
            return Ok(false);
        };

        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!("Removed student store {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Move the company's store aside so the removal can still be undone.
    /// Returns None when there is no store to remove.
    pub fn stage_removal(&self, company_name: &str) -> Result<Option<StagedRemoval>> {
        let Some(original) = self.store_path(company_name)? else {
            return Ok(None);
        };
        if !original.is_file() {
            return Ok(None);
        }

        let mut staged = original.clone().into_os_string();
        staged.push(STAGED_SUFFIX);
        let staged = PathBuf::from(staged);

        fs::rename(&original, &staged)?;
        Ok(Some(StagedRemoval { original, staged }))
    }

    /// List store files and staging leftovers under the root
    pub fn scan(&self) -> Result<StoreScan> {
        let mut scan = StoreScan::default();
        let suffix = format!(".{}{}", STORE_EXTENSION, STAGED_SUFFIX);

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            if file_name.ends_with(&suffix) {
                scan.staged.push(path);
            } else if path.extension().and_then(|e| e.to_str()) == Some(STORE_EXTENSION) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    scan.stores.push((stem.to_string(), path.clone()));
                }
            }
        }

        scan.stores.sort();
        scan.staged.sort();
        Ok(scan)
    }

    /// Move a stray store file (e.g. `Acme_Corp.db`) to the canonical
    /// location for `company_name`. Never overwrites an existing store.
    pub fn adopt(&self, path: &Path, company_name: &str) -> Result<PathBuf> {
        self.ensure_under_root(path)?;
        let target = self.store_path(company_name)?.ok_or_else(|| {
            Error::StorageInconsistency(format!("{:?} has no storage key", company_name))
        })?;

        if target.exists() && !same_file_ignoring_case(path, &target) {
            return Err(Error::StorageInconsistency(format!(
                "cannot adopt {}: {} already exists",
                path.display(),
                target.display()
            )));
        }

        fs::rename(path, &target)?;
        tracing::info!("Adopted student store {} as {}", path.display(), target.display());
        Ok(target)
    }

    /// Remove a file found by [`TenantStores::scan`]
    pub fn discard(&self, path: &Path) -> Result<()> {
        self.ensure_under_root(path)?;
        fs::remove_file(path)?;
        tracing::info!("Discarded {}", path.display());
        Ok(())
    }

    fn ensure_under_root(&self, path: &Path) -> Result<()> {
        if path.parent() == Some(self.root.as_path()) {
            Ok(())
        } else {
            Err(Error::NotFound(format!("{} is not in the storage root", path.display())))
        }
    }

    // ========== Student Operations ==========

    /// All students of a company, ordered by id. The store must exist.
    pub fn list_students(&self, company_name: &str) -> Result<Vec<Student>> {
        let conn = self.connect(company_name)?;
        let mut stmt = conn.prepare("SELECT id, name, age FROM students ORDER BY id")?;

        let students = stmt
            .query_map([], row_to_student)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(students)
    }

    /// Insert a student and return the stored row
    pub fn add_student(&self, company_name: &str, student: &NewStudent) -> Result<Student> {
        let conn = self.connect(company_name)?;
        conn.execute(
            "INSERT INTO students (name, age) VALUES (?1, ?2)",
            params![student.name, student.age],
        )?;

        Ok(Student {
            id: conn.last_insert_rowid(),
            name: student.name.clone(),
            age: student.age,
        })
    }

    /// Fetch one student by id
    pub fn get_student(&self, company_name: &str, student_id: i64) -> Result<Student> {
        let conn = self.connect(company_name)?;
        conn.query_row(
            "SELECT id, name, age FROM students WHERE id = ?1",
            [student_id],
            row_to_student,
        )
        .optional()?
        .ok_or_else(|| student_not_found(company_name, student_id))
    }

    /// Overwrite a student's fields
    pub fn update_student(&self, company_name: &str, student_id: i64, student: &NewStudent) -> Result<Student> {
        let conn = self.connect(company_name)?;
        let changed = conn.execute(
            "UPDATE students SET name = ?1, age = ?2 WHERE id = ?3",
            params![student.name, student.age, student_id],
        )?;

        if changed == 0 {
            return Err(student_not_found(company_name, student_id));
        }

        Ok(Student {
            id: student_id,
            name: student.name.clone(),
            age: student.age,
        })
    }

    /// Delete a student by id
    pub fn delete_student(&self, company_name: &str, student_id: i64) -> Result<()> {
        let conn = self.connect(company_name)?;
        let changed = conn.execute("DELETE FROM students WHERE id = ?1", [student_id])?;

        if changed == 0 {
            return Err(student_not_found(company_name, student_id));
        }
        Ok(())
    }

    /// Insert many students in one store transaction
    pub fn import_students(&self, company_name: &str, students: &[NewStudent]) -> Result<Vec<Student>> {
        let mut conn = self.connect(company_name)?;
        let tx = conn.transaction()?;
        let mut stored = Vec::with_capacity(students.len());
        {
            let mut stmt = tx.prepare("INSERT INTO students (name, age) VALUES (?1, ?2)")?;
            for student in students {
                stmt.execute(params![student.name, student.age])?;
                stored.push(Student {
                    id: tx.last_insert_rowid(),
                    name: student.name.clone(),
                    age: student.age,
                });
            }
        }
        tx.commit()?;
        Ok(stored)
    }

    /// Open an existing store read-write, never creating it
    fn connect(&self, company_name: &str) -> Result<Connection> {
        let path = self
            .store_path(company_name)?
            .filter(|p| p.is_file())
            .ok_or_else(|| Error::NotFound(format!("student store for company {:?}", company_name)))?;

        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(conn)
    }
}

/// Two paths that differ only by letter case and both resolve, i.e. the same
/// file on a case-insensitive filesystem
fn same_file_ignoring_case(a: &Path, b: &Path) -> bool {
    let (a_str, b_str) = (a.to_string_lossy(), b.to_string_lossy());
    a_str.to_lowercase() == b_str.to_lowercase()
        && matches!((a.canonicalize(), b.canonicalize()), (Ok(x), Ok(y)) if x == y)
}

/// Whether `path` names the already canonical `canonical`, comparing the file
/// name without regard to case
fn same_location(path: &Path, canonical: &Path) -> bool {
    let Some(parent) = path.parent().and_then(|p| p.canonicalize().ok()) else {
        return false;
    };
    let name = |p: &Path| p.file_name().map(|n| n.to_string_lossy().to_lowercase());
    Some(parent.as_path()) == canonical.parent() && name(path) == name(canonical)
}

fn row_to_student(row: &rusqlite::Row) -> rusqlite::Result<Student> {
    Ok(Student {
        id: row.get(0)?,
        name: row.get(1)?,
        age: row.get(2)?,
    })
}

fn student_not_found(company_name: &str, student_id: i64) -> Error {
    Error::NotFound(format!("student {} in company {:?}", student_id, company_name))
}

/// A store moved aside by [`TenantStores::stage_removal`]
#[derive(Debug)]
#[must_use = "a staged removal must be finished or restored"]
pub struct StagedRemoval {
    original: PathBuf,
    staged: PathBuf,
}

impl StagedRemoval {
    pub fn staged_path(&self) -> &Path {
        &self.staged
    }

    /// Delete the staged file for good
    pub fn finish(self) -> Result<()> {
        fs::remove_file(&self.staged)?;
        tracing::info!("Removed student store {}", self.original.display());
        Ok(())
    }

    /// Put the staged file back where it was
    pub fn restore(self) -> Result<()> {
        fs::rename(&self.staged, &self.original)?;
        tracing::info!("Restored student store {}", self.original.display());
        Ok(())
    }
}

/// Files found under the storage root
#[derive(Debug, Default, Clone)]
pub struct StoreScan {
    /// `(stem, path)` for every `*.db` file
    pub stores: Vec<(String, PathBuf)>,
    /// Leftover `*.db.deleting` files
    pub staged: Vec<PathBuf>,
}
