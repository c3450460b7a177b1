use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::auth::Account;

/// Environment override for the student store directory
pub const STORAGE_ROOT_ENV: &str = "ROSTER_STORAGE_ROOT";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterConfig {
    /// Primary record store
    pub database: PathBuf,
    /// Directory holding one `<storage_key>.db` per company
    pub storage_root: PathBuf,
    /// HTTP listen address
    pub listen: String,
    pub accounts: Vec<Account>,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("roster.db"),
            storage_root: PathBuf::from("student_dbs"),
            listen: "127.0.0.1:8000".to_string(),
            accounts: Vec::new(),
        }
    }
}

impl RosterConfig {
    /// Apply environment overrides
    pub fn with_env(mut self) -> Self {
        if let Some(root) = std::env::var_os(STORAGE_ROOT_ENV).filter(|v| !v.is_empty()) {
            self.storage_root = PathBuf::from(root);
        }
        self
    }

    /// Resolve relative paths against the directory holding the config file
    pub fn resolve_relative_to(mut self, base: &Path) -> Self {
        if self.database.is_relative() {
            self.database = base.join(&self.database);
        }
        if self.storage_root.is_relative() {
            self.storage_root = base.join(&self.storage_root);
        }
        self
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("roster.toml")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<RosterConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: RosterConfig = toml::from_str(&contents)?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));
    Ok(Some(config.resolve_relative_to(base)))
}

/// Load the config file if present, else defaults; then apply the environment
pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<RosterConfig> {
    let config = match load_config(path)? {
        Some(config) => config,
        None => {
            tracing::debug!("No config file found, using defaults");
            RosterConfig::default()
        }
    };
    Ok(config.with_env())
}

pub fn write_config(path: &Path, config: &RosterConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
