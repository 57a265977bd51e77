use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection,
    DatabaseTransaction, TransactionTrait,
};
use sea_orm_migration::MigratorTrait;

use gitspace_core::{
    Clock, PathPolicy, RetryPolicy, SharedTransformation, StoreError, StoreResult, SystemClock,
    transformation_for,
};

use crate::migration::Migrator;
use crate::path::PathStore;
use crate::{DatabaseConfig, StoreConfig};

/// Failpoint fired after the moved node's primary row has been replaced.
pub const FAILPOINT_AFTER_PRIMARY_PATH_REPLACE: &str = "after_primary_path_replace";
/// Failpoint fired after descendants have been rewritten, before commit.
pub const FAILPOINT_AFTER_CASCADE_REWRITE: &str = "after_cascade_rewrite";
/// Failpoint fired after an entity row and its first path are inserted, before commit.
pub const FAILPOINT_AFTER_ENTITY_INSERT: &str = "after_entity_insert";

#[derive(Clone)]
pub struct GitspaceStore {
    conn: DatabaseConnection,
    backend: DatabaseBackend,
    transformation: SharedTransformation,
    policy: PathPolicy,
    retry: RetryPolicy,
    clock: Arc<dyn Clock>,
    failpoints: HashSet<String>,
}

impl GitspaceStore {
    pub async fn connect(config: &StoreConfig, base_dir: &Path) -> StoreResult<Self> {
        config.paths_config().validate()?;
        let url = build_connection_url(config, base_dir)?;
        let mut options = ConnectOptions::new(url);
        if let Some(pool) = &config.pool {
            if let Some(max) = pool.max_connections {
                options.max_connections(max);
            }
            if let Some(min) = pool.min_connections {
                options.min_connections(min);
            }
            if let Some(timeout_ms) = pool.connect_timeout_ms {
                options.connect_timeout(Duration::from_millis(timeout_ms));
            }
            if let Some(timeout_ms) = pool.acquire_timeout_ms {
                options.acquire_timeout(Duration::from_millis(timeout_ms));
            }
            if let Some(timeout_ms) = pool.idle_timeout_ms {
                options.idle_timeout(Duration::from_millis(timeout_ms));
            }
        }
        options.sqlx_logging(false);
        let conn = Database::connect(options)
            .await
            .map_err(|err| StoreError::from(err).context("connect"))?;
        let backend = conn.get_database_backend();
        let paths = config.paths_config();
        let failpoints = config
            .failpoints
            .clone()
            .unwrap_or_default()
            .into_iter()
            .collect::<HashSet<_>>();
        if !failpoints.is_empty() {
            warn!("gitspace store armed with failpoints: {failpoints:?}");
        }
        let store = Self {
            conn,
            backend,
            transformation: transformation_for(paths.case_insensitive()),
            policy: paths.policy(),
            retry: config.retry_policy(),
            clock: Arc::new(SystemClock),
            failpoints,
        };
        Migrator::up(&store.conn, None)
            .await
            .map_err(|err| StoreError::from(err).context("migrate"))?;
        info!(
            "gitspace store ready on {} (case_insensitive={})",
            config.backend_name(),
            paths.case_insensitive()
        );
        Ok(store)
    }

    pub async fn connect_sqlite(path: &Path) -> StoreResult<Self> {
        let config = StoreConfig::default_sqlite(path.to_string_lossy());
        Self::connect(&config, path.parent().unwrap_or_else(|| Path::new("."))).await
    }

    /// Replaces the clock used for `created`/`updated` stamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the normalization applied to every path value.
    pub fn with_transformation(mut self, transformation: SharedTransformation) -> Self {
        self.transformation = transformation;
        self
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    pub fn backend(&self) -> DatabaseBackend {
        self.backend
    }

    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            DatabaseBackend::Sqlite => "sqlite",
            DatabaseBackend::Postgres => "postgres",
            DatabaseBackend::MySql => "mysql",
        }
    }

    pub fn paths(&self) -> PathStore<'_> {
        PathStore::new(self)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn path_policy(&self) -> PathPolicy {
        self.policy
    }

    pub(crate) fn transformation(&self) -> &SharedTransformation {
        &self.transformation
    }

    pub(crate) fn now(&self) -> i64 {
        self.clock.now_millis()
    }

    pub(crate) async fn begin(&self) -> StoreResult<DatabaseTransaction> {
        self.conn
            .begin()
            .await
            .map_err(|err| StoreError::from(err).context("begin transaction"))
    }

    pub(crate) fn maybe_failpoint(&self, key: &str) -> StoreResult<()> {
        if self.failpoints.contains(key) {
            warn!("failpoint {key} fired");
            Err(StoreError::storage(format!("failpoint {key}")))
        } else {
            Ok(())
        }
    }
}

fn build_connection_url(config: &StoreConfig, base_dir: &Path) -> StoreResult<String> {
    match &config.database {
        DatabaseConfig::Sqlite { .. } => {
            let path = config.sqlite_path(base_dir)?;
            Ok(format!("sqlite://{}?mode=rwc", path.display()))
        }
        DatabaseConfig::Postgres { url } => Ok(url.clone()),
        DatabaseConfig::Mysql { url } => Ok(url.clone()),
    }
}

pub(crate) async fn commit(tx: DatabaseTransaction, op: &str) -> StoreResult<()> {
    tx.commit()
        .await
        .map_err(|err| StoreError::from(err).context(format!("{op}: commit")))
}
