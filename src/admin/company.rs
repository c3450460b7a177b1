//! Company lifecycle: the record and its student store move together

use crate::company::{Company, CompanyForm, ValidCompany};
use crate::storage::{RecordStore, TenantStores};
use crate::storage::records::is_constraint_violation;
use crate::{Error, Result};
use super::{Admin, coordinated, resolve_company};

const DUPLICATE_NAME: &str = "Company with this Name already exists.";
const RESERVED_NAME: &str = "This name is reserved.";

/// Company operations over the primary store and the student stores
pub struct CompanyController<'a> {
    admin: &'a Admin,
}

impl<'a> CompanyController<'a> {
    pub(super) fn new(admin: &'a Admin) -> Self {
        Self { admin }
    }

    /// All companies ordered by name
    pub fn list(&self) -> Result<Vec<Company>> {
        self.admin.lock().list_companies()
    }

    pub fn get(&self, id: i64) -> Result<Company> {
        resolve_company(&self.admin.lock(), id)
    }

    /// Insert a company and create its student store.
    ///
    /// The record is only committed once the store exists; if the commit
    /// fails, a store created here is removed again.
    pub fn create(&self, form: &CompanyForm) -> Result<Company> {
        let valid = form.validate()?;
        let tenants = &self.admin.tenants;
        let mut records = self.admin.lock();
        ensure_unique(&records, &valid, None)?;
        ensure_not_reserved(tenants, &valid)?;

        let preexisting = tenants.exists(&valid.name);
        if preexisting {
            tracing::warn!(
                "Storage inconsistency: adopting existing student store for new company {:?}",
                valid.name
            );
        }

        let company = coordinated(
            &mut records,
            |records| {
                let company = records
                    .insert_company(&valid.name, &valid.storage_key)
                    .map_err(duplicate_as_validation)?;
                tenants.create(&company.name)?;
                Ok(company)
            },
            |company| {
                if !preexisting {
                    if let Err(e) = tenants.delete(&company.name) {
                        tracing::warn!("Could not remove store for uncommitted company {:?}: {}", company.name, e);
                    }
                }
            },
        )?;

        tracing::info!("Created company {:?} (id {})", company.name, company.id);
        Ok(company)
    }

    /// Rename a company, moving its student store to the new key.
    ///
    /// A missing store is recreated under the new name. If the commit fails,
    /// the store is moved back.
    pub fn rename(&self, id: i64, form: &CompanyForm) -> Result<Company> {
        let valid = form.validate()?;
        let tenants = &self.admin.tenants;
        let mut records = self.admin.lock();
        let current = resolve_company(&records, id)?;

        if current.name == valid.name {
            return Ok(current);
        }
        ensure_unique(&records, &valid, Some(id))?;
        ensure_not_reserved(tenants, &valid)?;

        let renamed = Company {
            id,
            name: valid.name,
            storage_key: valid.storage_key,
        };
        let key_changed = current.storage_key != renamed.storage_key;
        let had_store = tenants.exists(&current.name);

        coordinated(
            &mut records,
            |records| {
                records
                    .update_company(id, &renamed.name, &renamed.storage_key)
                    .map_err(duplicate_as_validation)?;
                tenants.rename(&current.name, &renamed.name)
            },
            |()| {
                if !key_changed {
                    return;
                }
                let undo = if had_store {
                    tenants.rename(&renamed.name, &current.name)
                } else {
                    tenants.delete(&renamed.name).map(|_| ())
                };
                if let Err(e) = undo {
                    tracing::warn!("Could not undo store move for company {}: {}", id, e);
                }
            },
        )?;

        tracing::info!("Renamed company {} from {:?} to {:?}", id, current.name, renamed.name);
        Ok(renamed)
    }

    /// Delete a company and its student store.
    ///
    /// The store is moved aside before the record commit and only removed
    /// afterwards, so a failed commit restores it.
    pub fn delete(&self, id: i64) -> Result<Company> {
        let tenants = &self.admin.tenants;
        let mut records = self.admin.lock();
        let company = resolve_company(&records, id)?;

        let staged = coordinated(
            &mut records,
            |records| {
                records.delete_company(id)?;
                let staged = tenants.stage_removal(&company.name)?;
                if staged.is_none() {
                    tracing::warn!(
                        "Storage inconsistency: company {:?} (id {}) had no student store",
                        company.name,
                        id
                    );
                }
                Ok(staged)
            },
            |staged| {
                if let Some(staged) = staged {
                    if let Err(e) = staged.restore() {
                        tracing::warn!("Could not restore store for company {}: {}", id, e);
                    }
                }
            },
        )?;

        if let Some(staged) = staged {
            let path = staged.staged_path().to_path_buf();
            if let Err(e) = staged.finish() {
                tracing::warn!(
                    "Company {} deleted but {} was left behind ({}); the storage audit will remove it",
                    id,
                    path.display(),
                    e
                );
            }
        }

        tracing::info!("Deleted company {:?} (id {})", company.name, id);
        Ok(company)
    }
}

/// Reject a name (or a name with the same storage key) taken by another company
fn ensure_unique(records: &RecordStore, valid: &ValidCompany, current: Option<i64>) -> Result<()> {
    if let Some(existing) = records.find_company_by_name(&valid.name)? {
        if Some(existing.id) != current {
            return Err(Error::invalid("name", DUPLICATE_NAME));
        }
    }

    if let Some(existing) = records.find_company_by_storage_key(&valid.storage_key)? {
        if Some(existing.id) != current {
            return Err(Error::invalid(
                "name",
                format!("Name clashes with existing company \"{}\".", existing.name),
            ));
        }
    }

    Ok(())
}

fn ensure_not_reserved(tenants: &TenantStores, valid: &ValidCompany) -> Result<()> {
    if tenants.is_reserved(&valid.name) {
        tracing::warn!("Refusing company name {:?}: its store would be the primary database", valid.name);
        return Err(Error::invalid("name", RESERVED_NAME));
    }
    Ok(())
}

fn duplicate_as_validation(err: Error) -> Error {
    if is_constraint_violation(&err) {
        Error::invalid("name", DUPLICATE_NAME)
    } else {
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::tests::admin;
    use crate::StudentForm;

    #[test]
    fn test_create_makes_store() {
        let (admin, _dir) = admin();
        let acme = admin.companies().create(&CompanyForm::new("Acme Corp")).unwrap();
        assert_eq!(acme.storage_key, "acme_corp");
        assert!(admin.tenants().exists("Acme Corp"));
        assert_eq!(admin.companies().get(acme.id).unwrap(), acme);
    }

    #[test]
    fn test_create_rejects_duplicates() {
        let (admin, _dir) = admin();
        admin.companies().create(&CompanyForm::new("Acme Corp")).unwrap();

        for name in ["Acme Corp", "acme  corp", "ACME_CORP"] {
            let err = admin.companies().create(&CompanyForm::new(name)).unwrap_err();
            let Error::Validation(errors) = err else {
                panic!("expected validation error for {name:?}");
            };
            assert_eq!(errors.get("name").len(), 1);
        }
        assert_eq!(admin.companies().list().unwrap().len(), 1);
    }

    #[test]
    fn test_create_rejects_blank_name() {
        let (admin, _dir) = admin();
        assert!(matches!(
            admin.companies().create(&CompanyForm::new("  ")),
            Err(Error::Validation(_))
        ));
        assert!(admin.companies().list().unwrap().is_empty());
    }

    #[test]
    fn test_create_rolls_back_when_store_cannot_be_made() {
        let (admin, _dir) = admin();
        // A directory squatting on the store path makes the SQLite open fail
        std::fs::create_dir(admin.tenants().root().join("acme.db")).unwrap();

        assert!(admin.companies().create(&CompanyForm::new("Acme")).is_err());
        assert!(admin.companies().list().unwrap().is_empty());
    }

    #[test]
    fn test_rename_unknown_company() {
        let (admin, _dir) = admin();
        let err = admin.companies().rename(99, &CompanyForm::new("Nope")).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_rename_to_same_name_is_noop() {
        let (admin, _dir) = admin();
        let acme = admin.companies().create(&CompanyForm::new("Acme")).unwrap();
        assert_eq!(admin.companies().rename(acme.id, &CompanyForm::new(" Acme ")).unwrap(), acme);
    }

    #[test]
    fn test_rename_case_only_keeps_store() {
        let (admin, _dir) = admin();
        let acme = admin.companies().create(&CompanyForm::new("Acme")).unwrap();
        admin.students().add(acme.id, &StudentForm::new("Ana", 21)).unwrap();

        let renamed = admin.companies().rename(acme.id, &CompanyForm::new("ACME")).unwrap();
        assert_eq!(renamed.name, "ACME");
        assert_eq!(renamed.storage_key, "acme");
        assert_eq!(admin.students().list(acme.id).unwrap().len(), 1);
    }

    #[test]
    fn test_rename_rejects_taken_name() {
        let (admin, _dir) = admin();
        let a = admin.companies().create(&CompanyForm::new("A")).unwrap();
        admin.companies().create(&CompanyForm::new("B")).unwrap();

        let err = admin.companies().rename(a.id, &CompanyForm::new("b")).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(admin.companies().get(a.id).unwrap().name, "A");
    }

    #[test]
    fn test_rename_blocked_by_stray_store_rolls_back() {
        let (admin, _dir) = admin();
        let acme = admin.companies().create(&CompanyForm::new("Acme")).unwrap();
        admin.tenants().create("Globex").unwrap();

        let err = admin.companies().rename(acme.id, &CompanyForm::new("Globex")).unwrap_err();
        assert!(matches!(err, Error::StorageInconsistency(_)));
        assert_eq!(admin.companies().get(acme.id).unwrap().name, "Acme");
        assert!(admin.tenants().exists("Acme"));
    }

    #[test]
    fn test_rename_recreates_missing_store() {
        let (admin, _dir) = admin();
        let acme = admin.companies().create(&CompanyForm::new("Acme")).unwrap();
        admin.tenants().delete("Acme").unwrap();

        admin.companies().rename(acme.id, &CompanyForm::new("Acme Two")).unwrap();
        assert!(admin.students().list(acme.id).unwrap().is_empty());
    }

    #[test]
    fn test_delete_removes_record_and_store() {
        let (admin, _dir) = admin();
        let acme = admin.companies().create(&CompanyForm::new("Acme")).unwrap();

        let deleted = admin.companies().delete(acme.id).unwrap();
        assert_eq!(deleted.id, acme.id);
        assert!(!admin.tenants().exists("Acme"));
        assert!(matches!(admin.companies().get(acme.id), Err(Error::NotFound(_))));
        assert!(matches!(admin.companies().delete(acme.id), Err(Error::NotFound(_))));

        let scan = admin.tenants().scan().unwrap();
        assert!(scan.stores.is_empty() && scan.staged.is_empty());
    }

    #[test]
    fn test_delete_without_store_still_deletes_record() {
        let (admin, _dir) = admin();
        let acme = admin.companies().create(&CompanyForm::new("Acme")).unwrap();
        admin.tenants().delete("Acme").unwrap();

        admin.companies().delete(acme.id).unwrap();
        assert!(admin.companies().list().unwrap().is_empty());
    }

    #[test]
    fn test_failed_commit_removes_created_store() {
        let (admin, _dir) = admin();
        admin.lock().fail_next_commit();

        assert!(matches!(admin.companies().create(&CompanyForm::new("Acme")), Err(Error::Storage(_))));
        assert!(admin.companies().list().unwrap().is_empty());
        assert!(!admin.tenants().exists("Acme"));
    }

    #[test]
    fn test_failed_commit_keeps_adopted_store() {
        let (admin, _dir) = admin();
        admin.tenants().create("Acme").unwrap();
        admin.lock().fail_next_commit();

        assert!(admin.companies().create(&CompanyForm::new("Acme")).is_err());
        assert!(admin.tenants().exists("Acme"));
    }

    #[test]
    fn test_failed_commit_moves_store_back() {
        let (admin, _dir) = admin();
        let acme = admin.companies().create(&CompanyForm::new("Acme")).unwrap();
        admin.students().add(acme.id, &StudentForm::new("Ana", 21)).unwrap();
        admin.lock().fail_next_commit();

        assert!(admin.companies().rename(acme.id, &CompanyForm::new("Acme Inc")).is_err());
        assert_eq!(admin.companies().get(acme.id).unwrap().name, "Acme");
        assert!(!admin.tenants().exists("Acme Inc"));
        assert_eq!(admin.students().list(acme.id).unwrap().len(), 1);
    }

    #[test]
    fn test_failed_commit_drops_recreated_store() {
        let (admin, _dir) = admin();
        let acme = admin.companies().create(&CompanyForm::new("Acme")).unwrap();
        admin.tenants().delete("Acme").unwrap();
        admin.lock().fail_next_commit();

        assert!(admin.companies().rename(acme.id, &CompanyForm::new("Acme Inc")).is_err());
        assert!(!admin.tenants().exists("Acme Inc"));
        assert!(!admin.tenants().exists("Acme"));
    }

    #[test]
    fn test_failed_commit_restores_staged_store() {
        let (admin, _dir) = admin();
        let acme = admin.companies().create(&CompanyForm::new("Acme")).unwrap();
        admin.students().add(acme.id, &StudentForm::new("Ana", 21)).unwrap();
        admin.lock().fail_next_commit();

        assert!(admin.companies().delete(acme.id).is_err());
        assert_eq!(admin.companies().get(acme.id).unwrap(), acme);
        assert_eq!(admin.students().list(acme.id).unwrap().len(), 1);
        assert!(admin.tenants().scan().unwrap().staged.is_empty());
    }

    #[test]
    fn test_name_aliasing_primary_database_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let admin = Admin::open(&dir.path().join("roster.db"), dir.path()).unwrap();
        let other = admin.companies().create(&CompanyForm::new("Other")).unwrap();

        for name in ["Roster", "ROSTER"] {
            let Err(Error::Validation(errors)) = admin.companies().create(&CompanyForm::new(name)) else {
                panic!("expected validation error for {name:?}");
            };
            assert_eq!(errors.get("name"), [RESERVED_NAME.to_string()]);
        }
        let err = admin.companies().rename(other.id, &CompanyForm::new("roster")).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        admin.companies().delete(other.id).unwrap();
        drop(admin);
        let reopened = Admin::open(&dir.path().join("roster.db"), dir.path()).unwrap();
        assert!(reopened.companies().list().unwrap().is_empty());
        assert!(dir.path().join("roster.db").is_file());
    }

    #[test]
    fn test_longest_names_get_working_stores() {
        let (admin, _dir) = admin();
        for name in ["a".repeat(255), "é".repeat(255)] {
            let company = admin.companies().create(&CompanyForm::new(name.as_str())).unwrap();
            admin.students().add(company.id, &StudentForm::new("Ana", 21)).unwrap();
            assert_eq!(admin.students().list(company.id).unwrap().len(), 1);
            admin.companies().delete(company.id).unwrap();
        }
        assert!(admin.tenants().scan().unwrap().stores.is_empty());
    }

    #[test]
    fn test_recreated_company_starts_empty() {
        let (admin, _dir) = admin();
        let first = admin.companies().create(&CompanyForm::new("Acme")).unwrap();
        admin.students().add(first.id, &StudentForm::new("Ana", 21)).unwrap();
        admin.companies().delete(first.id).unwrap();

        let second = admin.companies().create(&CompanyForm::new("acme")).unwrap();
        assert!(admin.students().list(second.id).unwrap().is_empty());
    }
}
