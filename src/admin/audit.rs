//! Storage audit: detect and repair divergence between company records and
//! the student store files under the storage root

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use serde::{Deserialize, Serialize};
use crate::company::{Company, company_storage_key};
use crate::storage::RecordStore;
use crate::Result;
use super::Admin;

/// A store file that belongs to a company but is not named canonically,
/// e.g. `Acme_Corp.db` for the key `acme_corp`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MisnamedStore {
    pub company: Company,
    pub path: PathBuf,
}

/// Findings of one audit pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditReport {
    /// Companies with no store file at all
    pub missing: Vec<Company>,
    /// Store files that canonicalise to a company key but are misnamed
    pub misnamed: Vec<MisnamedStore>,
    /// Store files that match no company
    pub orphaned: Vec<PathBuf>,
    /// Leftovers of interrupted deletions
    pub staged: Vec<PathBuf>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty()
            && self.misnamed.is_empty()
            && self.orphaned.is_empty()
            && self.staged.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct RepairOptions {
    /// Delete store files that match no company
    #[serde(default)]
    pub prune_orphans: bool,
}

/// What a repair pass changed
#[derive(Debug, Clone, Default, Serialize)]
pub struct RepairSummary {
    pub created: usize,
    pub renamed: usize,
    pub removed_staged: usize,
    pub pruned: usize,
    /// Findings left as they were
    pub unresolved: Vec<String>,
}

pub struct StorageAuditor<'a> {
    admin: &'a Admin,
}

impl<'a> StorageAuditor<'a> {
    pub(super) fn new(admin: &'a Admin) -> Self {
        Self { admin }
    }

    /// Compare company records with the files under the storage root
    pub fn audit(&self) -> Result<AuditReport> {
        let records = self.admin.lock();
        self.inspect(&records)
    }

    /// Audit, then fix what can be fixed without losing data
    pub fn repair(&self, options: RepairOptions) -> Result<RepairSummary> {
        let records = self.admin.lock();
        let report = self.inspect(&records)?;
        let tenants = &self.admin.tenants;
        let mut summary = RepairSummary::default();
        let mut adopted: HashSet<i64> = HashSet::new();

        for stray in &report.misnamed {
            if adopted.contains(&stray.company.id) {
                summary.unresolved.push(format!(
                    "second store {} for company {:?}",
                    stray.path.display(),
                    stray.company.name
                ));
                continue;
            }
            tenants.adopt(&stray.path, &stray.company.name)?;
            adopted.insert(stray.company.id);
            summary.renamed += 1;
        }

        for company in &report.missing {
            tenants.create(&company.name)?;
            tracing::info!("Recreated empty student store for company {:?}", company.name);
            summary.created += 1;
        }

        for path in &report.staged {
            tenants.discard(path)?;
            summary.removed_staged += 1;
        }

        for path in &report.orphaned {
            if options.prune_orphans {
                tenants.discard(path)?;
                summary.pruned += 1;
            } else {
                summary.unresolved.push(format!("orphaned store {}", path.display()));
            }
        }

        drop(records);
        Ok(summary)
    }

    fn inspect(&self, records: &RecordStore) -> Result<AuditReport> {
        let companies = records.list_companies()?;
        let scan = self.admin.tenants.scan()?;
        let primary = records.path().and_then(|p| p.canonicalize().ok());

        let by_key: HashMap<&str, &Company> = companies
            .iter()
            .map(|c| (c.storage_key.as_str(), c))
            .collect();

        let mut report = AuditReport::default();
        let mut present: HashSet<String> = HashSet::new();
        let mut misnamed_keys: HashSet<String> = HashSet::new();

        for (stem, path) in scan.stores {
            if primary.is_some() && path.canonicalize().ok() == primary {
                continue;
            }

            if by_key.contains_key(stem.as_str()) {
                present.insert(stem);
                continue;
            }

            let canonical = company_storage_key(&stem);
            if let Some(company) = by_key.get(canonical.as_str()) {
                tracing::warn!(
                    "Storage inconsistency: {} belongs to company {:?} but is not named {}",
                    path.display(),
                    company.name,
                    company.store_file_name()
                );
                misnamed_keys.insert(canonical);
                report.misnamed.push(MisnamedStore {
                    company: (*company).clone(),
                    path,
                });
                continue;
            }

            tracing::warn!("Storage inconsistency: orphaned store {}", path.display());
            report.orphaned.push(path);
        }

        // With the canonical store present, a misnamed copy is just an orphan
        let (duplicates, misnamed): (Vec<_>, Vec<_>) = std::mem::take(&mut report.misnamed)
            .into_iter()
            .partition(|stray| present.contains(&stray.company.storage_key));
        report.misnamed = misnamed;
        report.orphaned.extend(duplicates.into_iter().map(|stray| stray.path));
        for company in &companies {
            if !present.contains(&company.storage_key) && !misnamed_keys.contains(&company.storage_key) {
                tracing::warn!(
                    "Storage inconsistency: company {:?} (id {}) has no student store",
                    company.name,
                    company.id
                );
                report.missing.push(company.clone());
            }
        }

        for path in scan.staged {
            tracing::warn!("Storage inconsistency: interrupted deletion left {}", path.display());
            report.staged.push(path);
        }

        Ok(report)
    }
}
