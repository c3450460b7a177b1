//! Database schema definitions

/// SQL to create the companies table in the primary store
pub const CREATE_COMPANIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS companies (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    storage_key TEXT NOT NULL UNIQUE
)
"#;

/// SQL to create the legacy students table in the primary store.
/// Rows here predate the per-company stores and are only read by the
/// legacy migration; company deletion cascades to them.
pub const CREATE_LEGACY_STUDENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS students (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    company_id INTEGER NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    age INTEGER NOT NULL
)
"#;

/// SQL to create the students table inside a company's own store
pub const CREATE_TENANT_STUDENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS students (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    age INTEGER NOT NULL
)
"#;

/// SQL to create indexes
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_students_company ON students(company_id)",
];

/// All primary store schema statements
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![
        CREATE_COMPANIES_TABLE,
        CREATE_LEGACY_STUDENTS_TABLE,
    ];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}
