use crate::core::db::connection::SessionOptions;
use crate::core::{DalError, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    pub database: Option<DatabaseConfig>,
}

/// Database-related configuration.
#[derive(Debug, Default, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the database file; defaults to example.db
    pub path: Option<String>,
    /// Whether to enforce referential constraints; defaults to true
    pub foreign_keys: Option<bool>,
    /// Journal mode for file stores (e.g. "WAL", "DELETE"); defaults to WAL
    pub journal_mode: Option<String>,
}

impl Config {
    /// Effective database path after defaulting.
    pub fn database_path(&self) -> &str {
        self.database
            .as_ref()
            .and_then(|db| db.path.as_deref())
            .unwrap_or("example.db")
    }

    /// Session options for the store, with defaults filled in.
    pub fn session_options(&self) -> SessionOptions {
        let database = self.database.as_ref();
        let defaults = SessionOptions::default();
        SessionOptions {
            foreign_keys: database
                .and_then(|db| db.foreign_keys)
                .unwrap_or(defaults.foreign_keys),
            journal_mode: database
                .and_then(|db| db.journal_mode.clone())
                .unwrap_or(defaults.journal_mode),
        }
    }
}

/// Loads configuration from a TOML file at the given path.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| DalError::Config(e.to_string()))
}

/// Loads configuration if the file exists, otherwise returns defaults.
pub fn load_config_or_default<P: AsRef<Path>>(path: P) -> Result<Config> {
    if path.as_ref().exists() {
        load_config(path)
    } else {
        Ok(Config::default())
    }
}
