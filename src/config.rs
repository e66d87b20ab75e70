use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::storage::sql_store::IN_MEMORY_URL;

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_DATA_FILE: &str = "submissions.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    File,
    Sqlite,
}

impl StoreBackend {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "file" | "json" => Ok(Self::File),
            "sqlite" | "sql" | "db" => Ok(Self::Sqlite),
            _ => Err(anyhow::anyhow!(
                "TINYFORM_BACKEND must be one of: file, sqlite"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backend: StoreBackend,
    pub data_dir: PathBuf,
    pub data_file: String,
    pub database_url: String,
    pub db_max_connections: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::File,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            data_file: DEFAULT_DATA_FILE.to_string(),
            database_url: IN_MEMORY_URL.to_string(),
            db_max_connections: 1,
        }
    }
}

impl AppConfig {
    /// Reads `.env` (if present) and then the process environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let backend = match lookup("TINYFORM_BACKEND") {
            Some(raw) => StoreBackend::parse(&raw)?,
            None => defaults.backend,
        };

        let data_dir = lookup("TINYFORM_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let data_file = lookup("TINYFORM_DATA_FILE").unwrap_or(defaults.data_file);

        let database_url = lookup("TINYFORM_DATABASE_URL").unwrap_or(defaults.database_url);

        let db_max_connections = lookup("TINYFORM_DB_MAX_CONNECTIONS")
            .map(|raw| raw.parse::<u32>())
            .transpose()
            .context("TINYFORM_DB_MAX_CONNECTIONS must be a valid u32")?
            .unwrap_or(defaults.db_max_connections);

        Ok(Self {
            backend,
            data_dir,
            data_file,
            database_url,
            db_max_connections,
        })
    }

    pub fn submissions_path(&self) -> PathBuf {
        self.data_dir.join(&self.data_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = AppConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.backend, StoreBackend::File);
        assert_eq!(config.submissions_path(), PathBuf::from("data/submissions.json"));
        assert_eq!(config.database_url, IN_MEMORY_URL);
        assert_eq!(config.db_max_connections, 1);
    }

    #[test]
    fn reads_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("TINYFORM_BACKEND", "SQLite"),
            ("TINYFORM_DATA_DIR", "/var/lib/tinyform"),
            ("TINYFORM_DATA_FILE", "forms.json"),
            ("TINYFORM_DATABASE_URL", "sqlite://forms.db?mode=rwc"),
            ("TINYFORM_DB_MAX_CONNECTIONS", "4"),
        ]))
        .unwrap();

        assert_eq!(config.backend, StoreBackend::Sqlite);
        assert_eq!(config.submissions_path(), PathBuf::from("/var/lib/tinyform/forms.json"));
        assert_eq!(config.database_url, "sqlite://forms.db?mode=rwc");
        assert_eq!(config.db_max_connections, 4);
    }

    #[test]
    fn rejects_unknown_backend() {
        let err = AppConfig::from_lookup(lookup_from(&[("TINYFORM_BACKEND", "postgres")]))
            .unwrap_err();
        assert!(err.to_string().contains("TINYFORM_BACKEND"));
    }

    #[test]
    fn rejects_bad_connection_count() {
        assert!(
            AppConfig::from_lookup(lookup_from(&[("TINYFORM_DB_MAX_CONNECTIONS", "many")]))
                .is_err()
        );
    }
}
