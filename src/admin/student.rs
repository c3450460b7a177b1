//! Student operations, scoped to one company's store

use crate::company::Company;
use crate::storage::TenantStores;
use crate::student::{Student, StudentForm};
use crate::{Error, Result};
use super::{Admin, resolve_company};

/// Pass-through to a company's student store, addressed by company id
pub struct StudentController<'a> {
    admin: &'a Admin,
}

impl<'a> StudentController<'a> {
    pub(super) fn new(admin: &'a Admin) -> Self {
        Self { admin }
    }

    pub fn list(&self, company_id: i64) -> Result<Vec<Student>> {
        self.with_store(company_id, |stores, company| stores.list_students(&company.name))
    }

    pub fn add(&self, company_id: i64, form: &StudentForm) -> Result<Student> {
        self.with_store(company_id, |stores, company| {
            let student = form.validate()?;
            let stored = stores.add_student(&company.name, &student)?;
            tracing::info!("Added student {} to company {}", stored.id, company.id);
            Ok(stored)
        })
    }

    pub fn get(&self, company_id: i64, student_id: i64) -> Result<Student> {
        self.with_store(company_id, |stores, company| stores.get_student(&company.name, student_id))
    }

    /// Overwrite a student. Unknown student ids are NotFound.
    pub fn update(&self, company_id: i64, student_id: i64, form: &StudentForm) -> Result<Student> {
        self.with_store(company_id, |stores, company| {
            let student = form.validate()?;
            stores.update_student(&company.name, student_id, &student)
        })
    }

    /// Delete a student. Unknown student ids are NotFound.
    pub fn delete(&self, company_id: i64, student_id: i64) -> Result<()> {
        self.with_store(company_id, |stores, company| {
            stores.delete_student(&company.name, student_id)?;
            tracing::info!("Deleted student {} from company {}", student_id, company.id);
            Ok(())
        })
    }

    /// Resolve the company, check its store exists, then run `op` while
    /// still holding the record lock.
    fn with_store<T>(
        &self,
        company_id: i64,
        op: impl FnOnce(&TenantStores, &Company) -> Result<T>,
    ) -> Result<T> {
        let records = self.admin.lock();
        let company = resolve_company(&records, company_id)?;
        let stores = &self.admin.tenants;

        if !stores.exists(&company.name) {
            tracing::warn!(
                "Storage inconsistency: company {:?} (id {}) has no student store",
                company.name,
                company.id
            );
            return Err(Error::StorageInconsistency(format!(
                "company {:?} has no student store",
                company.name
            )));
        }

        let result = op(stores, &company);
        drop(records);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::tests::admin;
    use crate::CompanyForm;

    #[test]
    fn test_add_then_get() {
        let (admin, _dir) = admin();
        let acme = admin.companies().create(&CompanyForm::new("Acme")).unwrap();

        let ana = admin.students().add(acme.id, &StudentForm::new("Ana", 21)).unwrap();
        let fetched = admin.students().get(acme.id, ana.id).unwrap();
        assert_eq!((fetched.name.as_str(), fetched.age), ("Ana", 21));
    }

    #[test]
    fn test_update_and_delete() {
        let (admin, _dir) = admin();
        let acme = admin.companies().create(&CompanyForm::new("Acme")).unwrap();
        let ana = admin.students().add(acme.id, &StudentForm::new("Ana", 21)).unwrap();

        let updated = admin.students().update(acme.id, ana.id, &StudentForm::new("Ana Maria", 22)).unwrap();
        assert_eq!(updated, Student { id: ana.id, name: "Ana Maria".into(), age: 22 });
        assert_eq!(admin.students().list(acme.id).unwrap(), [updated]);

        admin.students().delete(acme.id, ana.id).unwrap();
        assert!(admin.students().list(acme.id).unwrap().is_empty());
    }

    #[test]
    fn test_update_unknown_student_is_not_found() {
        let (admin, _dir) = admin();
        let acme = admin.companies().create(&CompanyForm::new("Acme")).unwrap();

        let err = admin.students().update(acme.id, 7, &StudentForm::new("Ana", 21)).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(matches!(admin.students().delete(acme.id, 7), Err(Error::NotFound(_))));
        assert!(matches!(admin.students().get(acme.id, 7), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_invalid_form_writes_nothing() {
        let (admin, _dir) = admin();
        let acme = admin.companies().create(&CompanyForm::new("Acme")).unwrap();

        let err = admin.students().add(acme.id, &StudentForm::default()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(admin.students().list(acme.id).unwrap().is_empty());
    }

    #[test]
    fn test_students_are_isolated_per_company() {
        let (admin, _dir) = admin();
        let a = admin.companies().create(&CompanyForm::new("A")).unwrap();
        let b = admin.companies().create(&CompanyForm::new("B")).unwrap();
        admin.students().add(a.id, &StudentForm::new("Ana", 21)).unwrap();

        assert_eq!(admin.students().list(a.id).unwrap().len(), 1);
        assert!(admin.students().list(b.id).unwrap().is_empty());
    }

    #[test]
    fn test_missing_store_is_inconsistency() {
        let (admin, _dir) = admin();
        let acme = admin.companies().create(&CompanyForm::new("Acme")).unwrap();
        admin.tenants().delete("Acme").unwrap();

        let err = admin.students().list(acme.id).unwrap_err();
        assert!(matches!(err, Error::StorageInconsistency(_)));
        // Reads never recreate the store
        assert!(!admin.tenants().exists("Acme"));
    }

    #[test]
    fn test_unknown_company_is_not_found() {
        let (admin, _dir) = admin();
        assert!(matches!(admin.students().list(1), Err(Error::NotFound(_))));
    }
}
