use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use gitspace_core::check::{DEFAULT_MAX_DEPTH, DEFAULT_MAX_LEN, DEFAULT_MAX_SEGMENT_LEN};
use gitspace_core::{PathPolicy, RetryPolicy, StoreError, StoreResult};

use crate::db::{PATH_VALUE_LEN, UID_LEN};

pub const DEFAULT_CONFIG_NAME: &str = "gitspace.json";
const DEFAULT_SQLITE_NAME: &str = "gitspace.sqlite";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum DatabaseConfig {
    Sqlite { path: Option<String> },
    Postgres { url: String },
    Mysql { url: String },
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PoolConfig {
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub connect_timeout_ms: Option<u64>,
    pub acquire_timeout_ms: Option<u64>,
    pub idle_timeout_ms: Option<u64>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PathsConfig {
    pub case_insensitive: Option<bool>,
    pub max_depth: Option<usize>,
    pub max_segment_len: Option<usize>,
    pub max_len: Option<usize>,
}

impl PathsConfig {
    pub fn case_insensitive(&self) -> bool {
        self.case_insensitive.unwrap_or(true)
    }

    pub fn policy(&self) -> PathPolicy {
        PathPolicy {
            max_depth: self.max_depth.unwrap_or(DEFAULT_MAX_DEPTH),
            max_segment_len: self.max_segment_len.unwrap_or(DEFAULT_MAX_SEGMENT_LEN),
            max_len: self.max_len.unwrap_or(DEFAULT_MAX_LEN),
        }
    }

    /// Rejects limits that allow values the path and uid columns cannot hold.
    pub fn validate(&self) -> StoreResult<()> {
        let policy = self.policy();
        if policy.max_depth == 0 || policy.max_segment_len == 0 || policy.max_len == 0 {
            return Err(StoreError::validation("paths limits must be at least 1"));
        }
        if policy.max_segment_len > UID_LEN as usize {
            return Err(StoreError::validation(format!(
                "paths.max_segment_len {} exceeds the {UID_LEN} character uid column",
                policy.max_segment_len
            )));
        }
        if policy.max_len > PATH_VALUE_LEN as usize {
            return Err(StoreError::validation(format!(
                "paths.max_len {} exceeds the {PATH_VALUE_LEN} character path column",
                policy.max_len
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    /// Absent means conflicting updates are retried until they land.
    pub max_update_retries: Option<u32>,
}

impl ConcurrencyConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_update_retries,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    pub database: DatabaseConfig,
    pub pool: Option<PoolConfig>,
    pub paths: Option<PathsConfig>,
    pub concurrency: Option<ConcurrencyConfig>,
    pub failpoints: Option<Vec<String>>,
}

impl StoreConfig {
    pub fn default_sqlite(path: impl Into<String>) -> Self {
        Self {
            database: DatabaseConfig::Sqlite {
                path: Some(path.into()),
            },
            pool: None,
            paths: Some(PathsConfig {
                case_insensitive: Some(true),
                max_depth: Some(DEFAULT_MAX_DEPTH),
                max_segment_len: Some(DEFAULT_MAX_SEGMENT_LEN),
                max_len: Some(DEFAULT_MAX_LEN),
            }),
            concurrency: None,
            failpoints: None,
        }
    }

    pub fn load_or_init(base_dir: &Path, default_sqlite_path: &Path) -> StoreResult<Self> {
        fs::create_dir_all(base_dir)
            .map_err(|err| StoreError::storage(format!("create config dir: {err}")))?;
        let config_path = base_dir.join(DEFAULT_CONFIG_NAME);
        if config_path.exists() {
            let raw = fs::read_to_string(&config_path)
                .map_err(|err| StoreError::storage(format!("read config: {err}")))?;
            let config: StoreConfig = serde_json::from_str(&raw).map_err(|err| {
                StoreError::validation(format!("parse {}: {err}", config_path.display()))
            })?;
            config.paths_config().validate()?;
            return Ok(config);
        }
        let default = StoreConfig::default_sqlite(default_sqlite_path.to_string_lossy());
        let payload = serde_json::to_string_pretty(&default)
            .map_err(|err| StoreError::storage(format!("serialize config: {err}")))?;
        fs::write(&config_path, payload)
            .map_err(|err| StoreError::storage(format!("write config: {err}")))?;
        Ok(default)
    }

    pub fn sqlite_path(&self, base_dir: &Path) -> StoreResult<PathBuf> {
        match &self.database {
            DatabaseConfig::Sqlite { path } => {
                let path = path.clone().unwrap_or_else(|| DEFAULT_SQLITE_NAME.to_string());
                let candidate = PathBuf::from(path);
                if candidate.is_absolute() {
                    Ok(candidate)
                } else {
                    Ok(base_dir.join(candidate))
                }
            }
            _ => Err(StoreError::validation("config is not sqlite backend")),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self.database {
            DatabaseConfig::Sqlite { .. } => "sqlite",
            DatabaseConfig::Postgres { .. } => "postgres",
            DatabaseConfig::Mysql { .. } => "mysql",
        }
    }

    pub fn connection_url(&self) -> Option<&str> {
        match &self.database {
            DatabaseConfig::Sqlite { .. } => None,
            DatabaseConfig::Postgres { url } | DatabaseConfig::Mysql { url } => Some(url.as_str()),
        }
    }

    pub fn paths_config(&self) -> PathsConfig {
        self.paths.clone().unwrap_or_default()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.concurrency
            .as_ref()
            .map(ConcurrencyConfig::retry_policy)
            .unwrap_or_default()
    }

    pub fn with_failpoint(mut self, name: impl Into<String>) -> Self {
        self.failpoints
            .get_or_insert_with(Vec::new)
            .push(name.into());
        self
    }
}
