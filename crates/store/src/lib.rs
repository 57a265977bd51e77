pub mod config;
pub mod datastore;
mod db;
pub mod integrity;
pub mod migration;
pub mod path;
mod pipeline;
mod repo;
mod space;
mod sql;
pub mod store;

pub use config::{ConcurrencyConfig, DatabaseConfig, PathsConfig, PoolConfig, StoreConfig};
pub use datastore::{default_sqlite_path, load_or_init_config, open_store};
pub use gitspace_core::*;
pub use integrity::{IntegrityReport, IntegrityViolation};
pub use path::PathStore;
pub use store::{
    FAILPOINT_AFTER_CASCADE_REWRITE, FAILPOINT_AFTER_ENTITY_INSERT,
    FAILPOINT_AFTER_PRIMARY_PATH_REPLACE, GitspaceStore,
};
