//! # Roster - Company and student roster administration
//!
//! A superuser manages a list of companies; each company owns an isolated
//! roster of students kept in its own SQLite file.
//!
//! Roster provides:
//! - A primary SQLite record store for companies (and the legacy student table)
//! - One secondary SQLite file per company, named from a canonical storage key
//! - Controllers that keep the record and its file in step, with compensation
//! - An audit that detects and repairs record/file divergence
//! - An axum HTTP surface and a clap CLI over the same controllers

pub mod form;
pub mod company;
pub mod student;
pub mod storage;
pub mod admin;
pub mod auth;
pub mod config;
pub mod server;
pub mod ui;

// Re-exports for convenient access
pub use company::{Company, CompanyForm, company_storage_key};
pub use student::{NewStudent, Student, StudentForm};
pub use form::FieldErrors;
pub use storage::{RecordStore, TenantStores};
pub use admin::Admin;

/// Result type alias for Roster operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Roster operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage inconsistency: {0}")]
    StorageInconsistency(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),
}

impl Error {
    /// Stable, machine-readable code for the error class
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "VALIDATION_FAILED",
            Error::NotFound(_) => "NOT_FOUND",
            Error::StorageInconsistency(_) => "STORAGE_INCONSISTENCY",
            Error::Unauthorized(_) => "UNAUTHORIZED",
            Error::Storage(_) => "STORAGE_ERROR",
            Error::Io(_) => "IO_ERROR",
            Error::PasswordHash(_) => "PASSWORD_HASH_ERROR",
        }
    }

    /// Shorthand for a single-field validation failure
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.add(field, message);
        Error::Validation(errors)
    }
}
