use tabled::{settings::Style, Table, Tabled};
use crate::admin::AuditReport;
use crate::{Company, Student};

#[derive(Tabled)]
struct CompanyRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Store")]
    store: String,
}

#[derive(Tabled)]
struct StudentRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Age")]
    age: i64,
}

#[derive(Tabled)]
struct FindingRow {
    #[tabled(rename = "Finding")]
    kind: &'static str,
    #[tabled(rename = "Detail")]
    detail: String,
}

#[derive(Tabled)]
struct MetricRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Value")]
    value: String,
}

fn render<T: Tabled>(rows: Vec<T>) -> String {
    if rows.is_empty() {
        return String::new();
    }
    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn companies_table(companies: &[Company]) -> String {
    render(
        companies
            .iter()
            .map(|c| CompanyRow {
                id: c.id,
                name: c.name.clone(),
                store: c.store_file_name(),
            })
            .collect(),
    )
}

pub fn students_table(students: &[Student]) -> String {
    render(
        students
            .iter()
            .map(|s| StudentRow {
                id: s.id,
                name: s.name.clone(),
                age: s.age,
            })
            .collect(),
    )
}

/// One row per finding; empty for a clean report
pub fn audit_table(report: &AuditReport) -> String {
    let mut rows = Vec::new();
    for company in &report.missing {
        rows.push(FindingRow {
            kind: "missing",
            detail: format!("{} (expected {})", company.name, company.store_file_name()),
        });
    }
    for store in &report.misnamed {
        rows.push(FindingRow {
            kind: "misnamed",
            detail: format!("{} -> {}", store.path.display(), store.company.store_file_name()),
        });
    }
    for path in &report.orphaned {
        rows.push(FindingRow {
            kind: "orphaned",
            detail: path.display().to_string(),
        });
    }
    for path in &report.staged {
        rows.push(FindingRow {
            kind: "staged",
            detail: path.display().to_string(),
        });
    }
    render(rows)
}

pub fn stats_table(stats: &[(&str, String)]) -> String {
    render(
        stats
            .iter()
            .map(|(label, value)| MetricRow {
                metric: label.to_string(),
                value: value.clone(),
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_empty_tables_render_nothing() {
        assert!(companies_table(&[]).is_empty());
        assert!(audit_table(&AuditReport::default()).is_empty());
    }

    #[test]
    fn test_audit_table_lists_findings() {
        let report = AuditReport {
            orphaned: vec![PathBuf::from("students/ghost.db")],
            staged: vec![PathBuf::from("students/old.db.deleting")],
            ..Default::default()
        };
        let table = audit_table(&report);
        assert!(table.contains("orphaned"));
        assert!(table.contains("ghost.db"));
        assert!(table.contains("old.db.deleting"));
    }

    #[test]
    fn test_companies_table_shows_store_file() {
        let company = Company {
            id: 1,
            name: "Acme Corp".into(),
            storage_key: "acme_corp".into(),
        };
        assert!(companies_table(&[company]).contains("acme_corp.db"));
    }
}
