//! Field-level validation shared by the company and student forms

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Maximum length of any name field
pub const MAX_NAME_LEN: usize = 255;

pub const REQUIRED: &str = "This field is required.";

/// Validation messages keyed by form field
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Messages recorded for one field
    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `Ok(value)` when nothing was recorded, otherwise a validation error
    pub fn finish<T>(self, value: T) -> crate::Result<T> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(crate::Error::Validation(self))
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{}: {}", field, message)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Validate a required, length-limited text field. Returns the trimmed value.
pub fn required_text(errors: &mut FieldErrors, field: &str, value: Option<&str>) -> Option<String> {
    let trimmed = value.map(str::trim).unwrap_or("");
    if trimmed.is_empty() {
        errors.add(field, REQUIRED);
        return None;
    }

    let len = trimmed.chars().count();
    if len > MAX_NAME_LEN {
        errors.add(
            field,
            format!(
                "Ensure this value has at most {} characters (it has {}).",
                MAX_NAME_LEN, len
            ),
        );
        return None;
    }

    Some(trimmed.to_string())
}
