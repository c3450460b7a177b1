//! Identity: who may use the roster
//!
//! Credential checking is delegated to an [`IdentityProvider`]. The roster
//! only cares about one property of the returned principal: whether it is a
//! superuser.

use argon2::Argon2;
use password_hash::rand_core::OsRng;
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use serde::{Deserialize, Serialize};
use crate::{Error, Result};

pub const INVALID_CREDENTIALS: &str = "Invalid username or password";
pub const NOT_SUPERUSER: &str = "You are not authorized to access this page.";

/// An authenticated user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub username: String,
    pub is_superuser: bool,
}

/// Pluggable credential check
pub trait IdentityProvider: Send + Sync + 'static {
    /// Returns the principal for valid credentials, None otherwise
    fn authenticate(&self, username: &str, password: &str) -> Option<Principal>;
}

/// Account entry in the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub username: String,
    /// Argon2id PHC string (see [`hash_password`])
    pub password_hash: String,
    #[serde(default)]
    pub is_superuser: bool,
}

/// Identity provider backed by the accounts listed in `roster.toml`
#[derive(Debug, Clone, Default)]
pub struct ConfigIdentityProvider {
    accounts: Vec<Account>,
}

impl ConfigIdentityProvider {
    pub fn new(accounts: Vec<Account>) -> Self {
        Self { accounts }
    }
}

impl IdentityProvider for ConfigIdentityProvider {
    fn authenticate(&self, username: &str, password: &str) -> Option<Principal> {
        let account = self.accounts.iter().find(|a| a.username == username)?;
        if !verify_password(password, &account.password_hash) {
            return None;
        }

        Some(Principal {
            username: account.username.clone(),
            is_superuser: account.is_superuser,
        })
    }
}

/// Salted argon2id hash for [`Account::password_hash`]
pub fn hash_password(password: &str) -> Result<String> {
    hash_with(&Argon2::default(), password)
}

fn hash_with(argon2: &Argon2<'_>, password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| Error::PasswordHash(e.to_string()))
}

/// Check a password against a PHC string. Malformed hashes never match.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash.trim()) {
        Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}

/// Minimum-cost argon2id hash, for tests that only need a valid account
#[cfg(test)]
pub(crate) fn quick_hash(password: &str) -> String {
    use argon2::{Algorithm, Params, Version};

    let params = Params::new(Params::MIN_M_COST, 1, 1, None).unwrap();
    hash_with(&Argon2::new(Algorithm::Argon2id, Version::V0x13, params), password).unwrap()
}

/// Authenticate and require a superuser
pub fn authorize_superuser(
    provider: &dyn IdentityProvider,
    username: &str,
    password: &str,
) -> Result<Principal> {
    let Some(principal) = provider.authenticate(username, password) else {
        tracing::info!("Rejected login for {:?}: bad credentials", username);
        return Err(Error::Unauthorized(INVALID_CREDENTIALS.to_string()));
    };

    if !principal.is_superuser {
        tracing::info!("Rejected login for {:?}: not a superuser", username);
        return Err(Error::Unauthorized(NOT_SUPERUSER.to_string()));
    }

    Ok(principal)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> ConfigIdentityProvider {
        ConfigIdentityProvider::new(vec![
            Account {
                username: "admin".into(),
                password_hash: quick_hash("s3cret"),
                is_superuser: true,
            },
            Account {
                username: "clerk".into(),
                password_hash: quick_hash("clerk"),
                is_superuser: false,
            },
        ])
    }

    #[test]
    fn test_superuser_is_authorized() {
        let principal = authorize_superuser(&provider(), "admin", "s3cret").unwrap();
        assert_eq!(principal.username, "admin");
        assert!(principal.is_superuser);
    }

    #[test]
    fn test_bad_credentials() {
        for (user, pass) in [("admin", "wrong"), ("nobody", "s3cret")] {
            let err = authorize_superuser(&provider(), user, pass).unwrap_err();
            assert!(matches!(err, Error::Unauthorized(ref m) if m == INVALID_CREDENTIALS));
        }
    }

    #[test]
    fn test_non_superuser_is_rejected() {
        assert!(provider().authenticate("clerk", "clerk").is_some());
        let err = authorize_superuser(&provider(), "clerk", "clerk").unwrap_err();
        assert!(matches!(err, Error::Unauthorized(ref m) if m == NOT_SUPERUSER));
    }

    #[test]
    fn test_hashes_are_salted_argon2id() {
        let first = hash_password("s3cret").unwrap();
        let second = hash_password("s3cret").unwrap();
        assert!(first.starts_with("$argon2id$"));
        assert_ne!(first, second);
        assert!(verify_password("s3cret", &first));
        assert!(verify_password("s3cret", &second));
        assert!(!verify_password("other", &first));
    }

    #[test]
    fn test_malformed_hash_never_matches() {
        let provider = ConfigIdentityProvider::new(vec![Account {
            username: "admin".into(),
            password_hash: "not-hex".into(),
            is_superuser: true,
        }]);
        assert!(provider.authenticate("admin", "").is_none());
    }
}
