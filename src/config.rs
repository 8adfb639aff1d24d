//! Configuration file handling for clonerow
//!
//! Configuration is a single JSON file holding host connection strings,
//! per-table ignore lists and the unload directory for backup artifacts.
//! Connection strings may reference environment variables as `{VAR_NAME}`,
//! resolved at load time (with `.env` support for credentials).

use crate::error::{CloneRowError, Result};
use chrono::Utc;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "clonerow.json";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Directory where backup snapshots and update-sql artifacts land.
    pub unload_dir: PathBuf,
    /// Host alias -> connection config.
    pub hosts: HashMap<String, HostConfig>,
    /// Table name -> table-specific config.
    #[serde(default)]
    pub tables: HashMap<String, TableConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HostConfig {
    /// A DuckDB ATTACH statement for the host, e.g.
    /// `ATTACH 'host=db1 user={DB_USER} password={DB_PASS} database=app' AS alpha (TYPE mysql)`.
    pub connection: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TableConfig {
    #[serde(default)]
    pub ignore_columns: Vec<String>,
}

impl Config {
    /// Load and validate the config file.
    pub fn load(path: &Path) -> Result<Self> {
        check_permissions(path)?;
        load_env_file()?;

        let content = fs::read_to_string(path).map_err(|e| {
            CloneRowError::config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: Config = serde_json::from_str(&content).map_err(|e| {
            CloneRowError::config(format!(
                "Invalid config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Ok(config)
    }

    /// Connection string for a host alias, with `{VAR}` placeholders resolved.
    pub fn connection_string(&self, alias: &str) -> Result<String> {
        let host = self.hosts.get(alias).ok_or_else(|| {
            CloneRowError::config(format!(
                "No host '{}' in config; known hosts: {}",
                alias,
                self.known_hosts().join(", ")
            ))
        })?;
        substitute_env_vars(&host.connection)
    }

    /// Sorted list of configured host aliases (for CLI error messages).
    pub fn known_hosts(&self) -> Vec<String> {
        let mut aliases: Vec<String> = self.hosts.keys().cloned().collect();
        aliases.sort();
        aliases
    }

    /// Columns to exclude from mutation for a table, empty if unconfigured.
    pub fn ignore_set(&self, table: &str) -> BTreeSet<String> {
        match self.tables.get(table) {
            Some(table_config) if !table_config.ignore_columns.is_empty() => {
                let set: BTreeSet<String> =
                    table_config.ignore_columns.iter().cloned().collect();
                log::info!(
                    "The following columns will be ignored for {}: {}",
                    table,
                    set.iter().cloned().collect::<Vec<_>>().join(", ")
                );
                set
            }
            _ => {
                log::debug!("No ignore_columns configured for table {}", table);
                BTreeSet::new()
            }
        }
    }

    /// Path prefix for this run's backup and update-sql artifacts. The
    /// millisecond timestamp keeps names distinct across runs on the same
    /// row.
    pub fn unload_prefix(&self, table: &str, column: &str, filter: &str) -> PathBuf {
        self.unload_dir.join(format!(
            "{}-{}-{}-{}",
            table,
            column,
            filter,
            Utc::now().timestamp_millis()
        ))
    }
}

/// The config file holds credentials, so it must not be group or world
/// readable.
#[cfg(unix)]
fn check_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = fs::metadata(path).map_err(|e| {
        CloneRowError::config(format!(
            "Cannot stat config file '{}': {}",
            path.display(),
            e
        ))
    })?;
    let mode = metadata.permissions().mode() & 0o777;
    if mode & 0o077 != 0 {
        return Err(CloneRowError::config(format!(
            "Config file '{}' is insecure (mode {:o}); run: chmod 0600 {}",
            path.display(),
            mode,
            path.display()
        )));
    }
    Ok(())
}

#[cfg(not(unix))]
fn check_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

/// Substitute environment variables in a connection string.
pub fn substitute_env_vars(connection_string: &str) -> Result<String> {
    let mut result = connection_string.to_string();

    let mut start = 0;
    while let Some(open_pos) = result[start..].find('{') {
        let open_pos = start + open_pos;
        if let Some(close_pos) = result[open_pos..].find('}') {
            let close_pos = open_pos + close_pos;
            let var_name = result[open_pos + 1..close_pos].to_string();

            let var_value = env::var(&var_name).map_err(|_| {
                CloneRowError::config(format!(
                    "Environment variable '{}' not found. Make sure it's set in your .env file or environment.",
                    var_name
                ))
            })?;

            result.replace_range(open_pos..=close_pos, &var_value);
            start = open_pos + var_value.len();
        } else {
            start = open_pos + 1;
        }
    }

    Ok(result)
}

/// Load environment variables from .env file if it exists.
pub fn load_env_file() -> Result<()> {
    if Path::new(".env").exists() {
        dotenv::dotenv().map_err(|e| {
            CloneRowError::config(format!("Failed to load .env file: {}", e))
        })?;
    }

    Ok(())
}
