//! Move rows of the legacy primary-store `students` table into the
//! per-company stores

use serde::Serialize;
use crate::student::NewStudent;
use crate::Result;
use super::{Admin, coordinated};

#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationSummary {
    pub companies: usize,
    pub students: usize,
}

impl Admin {
    /// Copy every legacy student row into its company's store and delete the
    /// copied rows, one company per transaction.
    pub fn migrate_legacy_students(&self) -> Result<MigrationSummary> {
        let tenants = &self.tenants;
        let mut records = self.lock();
        let mut summary = MigrationSummary::default();

        for company_id in records.companies_with_legacy_students()? {
            let Some(company) = records.get_company(company_id)? else {
                continue;
            };
            let rows: Vec<NewStudent> = records
                .legacy_students_for(company_id)?
                .into_iter()
                .map(|row| NewStudent::new(row.name, row.age))
                .collect();

            tenants.create(&company.name)?;

            let imported = coordinated(
                &mut records,
                |records| {
                    records.delete_legacy_students(company_id)?;
                    tenants.import_students(&company.name, &rows)
                },
                |imported| {
                    for student in imported {
                        if let Err(e) = tenants.delete_student(&company.name, student.id) {
                            tracing::warn!("Could not undo import of student {}: {}", student.id, e);
                        }
                    }
                },
            )?;

            tracing::info!(
                "Migrated {} legacy students into the store of company {:?}",
                imported.len(),
                company.name
            );
            summary.companies += 1;
            summary.students += imported.len();
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use crate::admin::tests::admin;
    use crate::{CompanyForm, StudentForm};

    #[test]
    fn test_migrates_and_clears_legacy_rows() {
        let (admin, _dir) = admin();
        let acme = admin.companies().create(&CompanyForm::new("Acme")).unwrap();
        let globex = admin.companies().create(&CompanyForm::new("Globex")).unwrap();
        admin.students().add(acme.id, &StudentForm::new("Existing", 40)).unwrap();
        {
            let records = admin.lock();
            records.insert_legacy_student(acme.id, "Ana", 21).unwrap();
            records.insert_legacy_student(acme.id, "Ben", 22).unwrap();
            records.insert_legacy_student(globex.id, "Cy", 23).unwrap();
        }

        let summary = admin.migrate_legacy_students().unwrap();
        assert_eq!((summary.companies, summary.students), (2, 3));

        let names: Vec<_> = admin.students().list(acme.id).unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, ["Existing", "Ana", "Ben"]);
        assert_eq!(admin.students().list(globex.id).unwrap().len(), 1);
        assert_eq!(admin.stats().unwrap().legacy_students, 0);

        let again = admin.migrate_legacy_students().unwrap();
        assert_eq!(again.students, 0);
    }

    #[test]
    fn test_failed_commit_removes_imported_rows() {
        let (admin, _dir) = admin();
        let acme = admin.companies().create(&CompanyForm::new("Acme")).unwrap();
        {
            let mut records = admin.lock();
            records.insert_legacy_student(acme.id, "Ana", 21).unwrap();
            records.fail_next_commit();
        }

        assert!(admin.migrate_legacy_students().is_err());
        assert!(admin.students().list(acme.id).unwrap().is_empty());
        assert_eq!(admin.stats().unwrap().legacy_students, 1);
    }

    #[test]
    fn test_migration_recreates_missing_store() {
        let (admin, _dir) = admin();
        let acme = admin.companies().create(&CompanyForm::new("Acme")).unwrap();
        admin.tenants().delete("Acme").unwrap();
        admin.lock().insert_legacy_student(acme.id, "Ana", 21).unwrap();

        admin.migrate_legacy_students().unwrap();
        assert_eq!(admin.students().list(acme.id).unwrap().len(), 1);
    }
}
