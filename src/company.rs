//! Company records and the storage key derived from a company name
//!
//! Every company owns one secondary store file named `<storage_key>.db`.
//! The key is computed by [`company_storage_key`] and nowhere else, so a
//! company name maps to exactly one file no matter which operation asks.

use crate::form::{self, FieldErrors};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// A company in the primary record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: i64,
    pub name: String,
    /// Stem of the company's student store file
    pub storage_key: String,
}

impl Company {
    /// File name of this company's student store
    pub fn store_file_name(&self) -> String {
        format!("{}.db", self.storage_key)
    }
}

impl std::fmt::Display for Company {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Derive the filesystem-safe storage key for a company name.
///
/// Lower-cases, collapses whitespace runs into `_` and replaces anything that
/// is not alphanumeric, `-` or `_` with `_`. A blank name yields `""`.
/// Keys longer than [`MAX_STORAGE_KEY_BYTES`] are cut and suffixed with a
/// digest of the full key.
pub fn company_storage_key(name: &str) -> String {
    let mut key = String::with_capacity(name.len());
    let mut in_space = false;

    for c in name.trim().chars() {
        if c.is_whitespace() {
            if !in_space {
                key.push('_');
            }
            in_space = true;
            continue;
        }
        in_space = false;

        if c.is_alphanumeric() || c == '-' || c == '_' {
            key.extend(c.to_lowercase());
        } else {
            key.push('_');
        }
    }

    cap_key_length(key)
}

/// Longest storage key in bytes. Leaves room under the 255-byte file name
/// limit for `.db`, SQLite's `-journal`/`-wal` siblings and `.db.deleting`.
pub const MAX_STORAGE_KEY_BYTES: usize = 128;

const KEY_DIGEST_LEN: usize = 16;

fn cap_key_length(key: String) -> String {
    if key.len() <= MAX_STORAGE_KEY_BYTES {
        return key;
    }

    let digest = blake3::hash(key.as_bytes()).to_hex();
    let mut cut = MAX_STORAGE_KEY_BYTES - KEY_DIGEST_LEN - 1;
    while !key.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}-{}", &key[..cut], &digest.as_str()[..KEY_DIGEST_LEN])
}

/// Incoming company data, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompanyForm {
    pub name: Option<String>,
}

impl CompanyForm {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: Some(name.into()) }
    }

    /// Validate the form, returning the trimmed name and its storage key
    pub fn validate(&self) -> Result<ValidCompany> {
        let mut errors = FieldErrors::new();
        let name = form::required_text(&mut errors, "name", self.name.as_deref());

        let valid = name.and_then(|name| {
            let storage_key = company_storage_key(&name);
            if storage_key.trim_matches('_').is_empty() {
                errors.add("name", "Name must contain at least one letter or digit.");
                return None;
            }
            Some(ValidCompany { name, storage_key })
        });

        match valid {
            Some(valid) => errors.finish(valid),
            None => Err(Error::Validation(errors)),
        }
    }
}

/// A validated company name with its derived storage key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidCompany {
    pub name: String,
    pub storage_key: String,
}
