//! Optimistic concurrency: read, mutate a private copy, write conditioned on
//! the version that was read, and retry from a fresh read when someone else
//! committed first.
//!
//! Per attempt the state moves `Start -> MutatedLocally -> Committed | Conflicted | Failed`.
//! `Conflicted` never escapes [`mutate_with_retry`]; it re-reads and starts over.

use std::fmt;

use async_trait::async_trait;
use log::{debug, warn};

use crate::{CancelToken, StoreError, StoreResult};

/// An entity guarded by a version counter that grows by one per committed write.
pub trait Versioned: Clone + Send + Sync {
    type Key: Copy + fmt::Display + Send + Sync;

    fn key(&self) -> Self::Key;
    fn version(&self) -> i64;

    /// Records a committed write; only stores call this.
    fn mark_committed(&mut self, version: i64, updated: i64);
}

/// A versioned entity carrying a per-entity ordinal counter.
pub trait Sequenced: Versioned {
    fn seq(&self) -> i64;
    fn set_seq(&mut self, seq: i64);
}

/// The conditional-write primitive a persistence layer must provide.
#[async_trait]
pub trait VersionedStore<T: Versioned>: Send + Sync {
    /// Reads the last committed state of the entity.
    async fn find_current(&self, key: T::Key) -> StoreResult<T>;

    /// Persists `entity` only if the stored version still equals
    /// `entity.version()`, storing `version + 1`. On success `entity` is
    /// updated in place with the new version and `updated` timestamp.
    /// Fails with [`StoreError::VersionConflict`] when no row matched.
    async fn compare_and_update(&self, entity: &mut T) -> StoreResult<()>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first conflicting attempt; `None` retries forever.
    pub max_retries: Option<u32>,
}

impl RetryPolicy {
    pub fn unbounded() -> Self {
        Self { max_retries: None }
    }

    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries: Some(max_retries),
        }
    }

    fn exhausted(&self, attempts: u32) -> bool {
        self.max_retries.is_some_and(|max| attempts > max)
    }
}

/// Outcome of one read-mutate-write attempt that did not fail outright.
#[derive(Debug)]
pub enum Attempt<T> {
    Committed(T),
    Conflicted,
}

/// Applies `mutate` to a copy of `stored`; `stored` itself is never touched.
pub fn apply_mutation<T, F>(stored: &T, mutate: &mut F) -> StoreResult<T>
where
    T: Clone,
    F: FnMut(&mut T) -> StoreResult<()>,
{
    let mut next = stored.clone();
    mutate(&mut next)?;
    Ok(next)
}

pub async fn attempt_once<T, S, F>(store: &S, current: &T, mutate: &mut F) -> StoreResult<Attempt<T>>
where
    T: Versioned,
    S: VersionedStore<T> + ?Sized,
    F: FnMut(&mut T) -> StoreResult<()> + Send,
{
    let mut next = apply_mutation(current, mutate)?;
    match store.compare_and_update(&mut next).await {
        Ok(()) => Ok(Attempt::Committed(next)),
        Err(err) if err.is_version_conflict() => Ok(Attempt::Conflicted),
        Err(err) => Err(err),
    }
}

/// Applies `mutate` and persists the result, re-reading and re-applying on
/// every version conflict. Errors from `mutate` and non-conflict storage
/// errors end the loop immediately.
pub async fn mutate_with_retry<T, S, F>(
    store: &S,
    current: T,
    policy: RetryPolicy,
    cancel: &CancelToken,
    mut mutate: F,
) -> StoreResult<T>
where
    T: Versioned,
    S: VersionedStore<T> + ?Sized,
    F: FnMut(&mut T) -> StoreResult<()> + Send,
{
    let key = current.key();
    let op = format!("optimistic update of {key}");
    let mut current = current;
    let mut attempts: u32 = 0;
    loop {
        cancel.check(&op)?;
        attempts += 1;
        match attempt_once(store, &current, &mut mutate).await? {
            Attempt::Committed(next) => return Ok(next),
            Attempt::Conflicted => {
                if policy.exhausted(attempts) {
                    warn!("{op}: giving up after {attempts} conflicting attempts");
                    return Err(StoreError::too_many_retries(format!(
                        "{op}: {attempts} attempts lost the version race"
                    )));
                }
                debug!(
                    "{op}: version {} is stale (attempt {attempts}), re-reading",
                    current.version()
                );
                cancel.check(&op)?;
                current = store
                    .find_current(key)
                    .await
                    .map_err(|err| err.context(format!("{op}: re-read")))?;
            }
        }
    }
}

/// Bumps `seq` by exactly one under the optimistic protocol and returns the
/// committed entity; its `seq()` is the allocated ordinal.
pub async fn increment_sequence<T, S>(
    store: &S,
    current: T,
    policy: RetryPolicy,
    cancel: &CancelToken,
) -> StoreResult<T>
where
    T: Sequenced,
    S: VersionedStore<T> + ?Sized,
{
    mutate_with_retry(store, current, policy, cancel, |entity: &mut T| {
        entity.set_seq(entity.seq() + 1);
        Ok(())
    })
    .await
}

/// Reads the entity and allocates the next ordinal from its sequence.
pub async fn allocate_sequence<T, S>(
    store: &S,
    key: T::Key,
    policy: RetryPolicy,
    cancel: &CancelToken,
) -> StoreResult<i64>
where
    T: Sequenced,
    S: VersionedStore<T> + ?Sized,
{
    cancel.check("allocate sequence")?;
    let current = store.find_current(key).await?;
    let committed = increment_sequence(store, current, policy, cancel).await?;
    Ok(committed.seq())
}
