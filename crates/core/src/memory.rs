use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::optimistic::{Versioned, VersionedStore};
use crate::time::{Clock, SystemClock};
use crate::{StoreError, StoreResult};

/// In-process [`VersionedStore`] with the same compare-and-swap contract as
/// the SQL stores. Used by tests and tooling that need no database.
pub struct MemoryVersionedStore<T: Versioned> {
    entities: Arc<Mutex<HashMap<T::Key, T>>>,
    clock: Arc<dyn Clock>,
    yield_after_read: bool,
}

impl<T> MemoryVersionedStore<T>
where
    T: Versioned,
    T::Key: Hash + Eq,
{
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entities: Arc::new(Mutex::new(HashMap::new())),
            clock,
            yield_after_read: false,
        }
    }

    /// Yields to the scheduler after every read so concurrent writers interleave.
    pub fn yielding(mut self) -> Self {
        self.yield_after_read = true;
        self
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, HashMap<T::Key, T>>> {
        self.entities
            .lock()
            .map_err(|_| StoreError::storage("memory store poisoned"))
    }

    pub fn insert(&self, entity: T) -> StoreResult<()> {
        self.lock()?.insert(entity.key(), entity);
        Ok(())
    }

    pub fn get(&self, key: T::Key) -> StoreResult<Option<T>> {
        Ok(self.lock()?.get(&key).cloned())
    }

    /// Commits `mutate` unconditionally, as a writer racing the caller would.
    pub fn write_behind(&self, key: T::Key, mutate: impl FnOnce(&mut T)) -> StoreResult<T> {
        let mut guard = self.lock()?;
        let entity = guard
            .get_mut(&key)
            .ok_or_else(|| StoreError::not_found(format!("entity {key}")))?;
        mutate(entity);
        let next = entity.version() + 1;
        entity.mark_committed(next, self.clock.now_millis());
        Ok(entity.clone())
    }
}

impl<T> Default for MemoryVersionedStore<T>
where
    T: Versioned,
    T::Key: Hash + Eq,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T> VersionedStore<T> for MemoryVersionedStore<T>
where
    T: Versioned + 'static,
    T::Key: Hash + Eq,
{
    async fn find_current(&self, key: T::Key) -> StoreResult<T> {
        let found = self.get(key)?;
        if self.yield_after_read {
            tokio::task::yield_now().await;
        }
        found.ok_or_else(|| StoreError::not_found(format!("entity {key}")))
    }

    async fn compare_and_update(&self, entity: &mut T) -> StoreResult<()> {
        let mut guard = self.lock()?;
        let key = entity.key();
        let stored = guard
            .get_mut(&key)
            .ok_or_else(|| StoreError::not_found(format!("entity {key}")))?;
        if stored.version() != entity.version() {
            return Err(StoreError::version_conflict(format!(
                "entity {key} expected version {}, found {}",
                entity.version(),
                stored.version()
            )));
        }
        entity.mark_committed(entity.version() + 1, self.clock.now_millis());
        *stored = entity.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ManualClock;

    #[derive(Clone, Debug)]
    struct Counter {
        id: u32,
        value: i64,
        version: i64,
        updated: i64,
    }

    impl Versioned for Counter {
        type Key = u32;

        fn key(&self) -> u32 {
            self.id
        }

        fn version(&self) -> i64 {
            self.version
        }

        fn mark_committed(&mut self, version: i64, updated: i64) {
            self.version = version;
            self.updated = updated;
        }
    }

    fn counter() -> Counter {
        Counter {
            id: 1,
            value: 0,
            version: 0,
            updated: 0,
        }
    }

    #[tokio::test]
    async fn stale_version_is_rejected() {
        let clock = Arc::new(ManualClock::new(50));
        let store = MemoryVersionedStore::with_clock(clock.clone());
        store.insert(counter()).expect("insert");

        let mut first = store.find_current(1).await.expect("read");
        let mut second = first.clone();

        clock.advance(10);
        first.value = 1;
        store.compare_and_update(&mut first).await.expect("first wins");
        assert_eq!(first.version, 1);
        assert_eq!(first.updated, 60);

        second.value = 2;
        let err = store
            .compare_and_update(&mut second)
            .await
            .expect_err("second loses");
        assert!(err.is_version_conflict());
        assert_eq!(second.version, 0, "loser keeps its stale version");
        assert_eq!(store.get(1).unwrap().unwrap().value, 1);
    }

    #[tokio::test]
    async fn missing_entity_is_not_found() {
        let store = MemoryVersionedStore::<Counter>::new();
        assert!(store.find_current(9).await.unwrap_err().is_not_found());
    }
}
