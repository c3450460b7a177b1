//! Student rows kept in a company's secondary store

use crate::form::{self, FieldErrors};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// A student row. The id is scoped to the owning company's store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: i64,
    pub name: String,
    pub age: i64,
}

impl std::fmt::Display for Student {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.age)
    }
}

/// Validated student fields, ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStudent {
    pub name: String,
    pub age: i64,
}

impl NewStudent {
    pub fn new(name: impl Into<String>, age: i64) -> Self {
        Self { name: name.into(), age }
    }
}

/// Incoming student data, before validation.
///
/// `age` accepts either a JSON number or a numeric string so that form posts
/// and JSON clients share one shape.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StudentForm {
    pub name: Option<String>,
    pub age: Option<serde_json::Value>,
}

impl StudentForm {
    pub fn new(name: impl Into<String>, age: i64) -> Self {
        Self {
            name: Some(name.into()),
            age: Some(serde_json::Value::from(age)),
        }
    }

    pub fn validate(&self) -> Result<NewStudent> {
        let mut errors = FieldErrors::new();
        let name = form::required_text(&mut errors, "name", self.name.as_deref());
        let age = parse_age(&mut errors, self.age.as_ref());

        match (name, age) {
            (Some(name), Some(age)) => errors.finish(NewStudent { name, age }),
            _ => Err(Error::Validation(errors)),
        }
    }
}

fn parse_age(errors: &mut FieldErrors, value: Option<&serde_json::Value>) -> Option<i64> {
    use serde_json::Value;

    let parsed = match value {
        None | Some(Value::Null) => {
            errors.add("age", form::REQUIRED);
            return None;
        }
        Some(Value::String(s)) if s.trim().is_empty() => {
            errors.add("age", form::REQUIRED);
            return None;
        }
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        Some(_) => None,
    };

    // SQLite INTEGER columns hold i64, but the roster caps ages at i32 range
    match parsed.filter(|age| i32::try_from(*age).is_ok()) {
        Some(age) => Some(age),
        None => {
            errors.add("age", "Enter a whole number.");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_student() {
        let student = StudentForm::new("Ana", 21).validate().unwrap();
        assert_eq!(student, NewStudent::new("Ana", 21));
    }

    #[test]
    fn test_age_from_string() {
        let form: StudentForm = serde_json::from_value(json!({"name": "Ana", "age": " 21 "})).unwrap();
        assert_eq!(form.validate().unwrap().age, 21);
    }

    #[test]
    fn test_missing_fields_reported_per_field() {
        let form: StudentForm = serde_json::from_value(json!({})).unwrap();
        let Err(Error::Validation(errors)) = form.validate() else {
            panic!("expected validation error");
        };
        assert_eq!(errors.get("name"), [form::REQUIRED.to_string()]);
        assert_eq!(errors.get("age"), [form::REQUIRED.to_string()]);
    }

    #[test]
    fn test_non_integer_age() {
        for age in [json!(21.5), json!("twenty"), json!(true), json!(i64::MAX)] {
            let form: StudentForm = serde_json::from_value(json!({"name": "Ana", "age": age.clone()})).unwrap();
            let Err(Error::Validation(errors)) = form.validate() else {
                panic!("expected validation error for {age}");
            };
            assert_eq!(errors.get("age"), ["Enter a whole number.".to_string()]);
        }
    }
}
