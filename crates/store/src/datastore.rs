use std::path::{Path, PathBuf};

use crate::{GitspaceStore, StoreConfig, StoreResult};

const DEFAULT_DB_NAME: &str = "gitspace.sqlite";

pub fn load_or_init_config(base: &Path) -> StoreResult<StoreConfig> {
    let default_sqlite = base.join(DEFAULT_DB_NAME);
    StoreConfig::load_or_init(base, &default_sqlite)
}

pub async fn open_store(base: &Path) -> StoreResult<GitspaceStore> {
    let config = load_or_init_config(base)?;
    GitspaceStore::connect(&config, base).await
}

pub fn default_sqlite_path(base: &Path) -> PathBuf {
    base.join(DEFAULT_DB_NAME)
}
