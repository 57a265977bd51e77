use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use gitspace_core::{
    CancelHandle, CancelToken, MemoryVersionedStore, Pipeline, PipelineId, RetryPolicy, SpaceId,
    StoreError, StoreResult, VersionedStore, allocate_sequence, cancel_pair, increment_sequence,
    mutate_with_retry,
};

fn pipeline(seq: i64) -> Pipeline {
    Pipeline {
        id: PipelineId::new(),
        description: String::new(),
        space_id: SpaceId::new(),
        uid: "build".into(),
        seq,
        repo_id: None,
        repo_type: "gitness".into(),
        repo_name: String::new(),
        default_branch: "main".into(),
        config_path: ".harness/build.yaml".into(),
        created: 0,
        updated: 0,
        version: 0,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_mutations_all_land() -> StoreResult<()> {
    let store = Arc::new(MemoryVersionedStore::new().yielding());
    let initial = pipeline(0);
    let id = initial.id;
    store.insert(initial)?;

    let writers = 16;
    let mut tasks = Vec::new();
    for n in 0..writers {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            let current = store.find_current(id).await?;
            mutate_with_retry(
                store.as_ref(),
                current,
                RetryPolicy::unbounded(),
                &CancelToken::never(),
                |p: &mut Pipeline| {
                    p.description.push_str(&format!("[{n}]"));
                    Ok(())
                },
            )
            .await
        }));
    }
    for task in tasks {
        task.await.expect("join")?;
    }

    let stored = store.find_current(id).await?;
    assert_eq!(stored.version, writers);
    for n in 0..writers {
        assert!(stored.description.contains(&format!("[{n}]")), "lost update {n}");
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_allocations_never_repeat() -> StoreResult<()> {
    let store = Arc::new(MemoryVersionedStore::new().yielding());
    let initial = pipeline(5);
    let id = initial.id;
    store.insert(initial)?;

    let callers = 12;
    let mut tasks = Vec::new();
    for _ in 0..callers {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            allocate_sequence::<Pipeline, _>(
                store.as_ref(),
                id,
                RetryPolicy::unbounded(),
                &CancelToken::never(),
            )
            .await
        }));
    }
    let mut seen = BTreeSet::new();
    for task in tasks {
        let seq = task.await.expect("join")?;
        assert!(seen.insert(seq), "sequence {seq} handed out twice");
    }

    assert_eq!(seen, (6..6 + callers).collect::<BTreeSet<_>>());
    let stored = store.find_current(id).await?;
    assert_eq!(stored.seq, 5 + callers);
    assert_eq!(stored.version, callers);
    Ok(())
}

#[tokio::test]
async fn two_increments_from_five_yield_six_and_seven() -> StoreResult<()> {
    let store = MemoryVersionedStore::new();
    let initial = pipeline(5);
    let id = initial.id;
    store.insert(initial.clone())?;

    // Both callers start from the same snapshot; the second must re-read.
    let first = increment_sequence(
        &store,
        initial.clone(),
        RetryPolicy::unbounded(),
        &CancelToken::never(),
    )
    .await?;
    let second =
        increment_sequence(&store, initial, RetryPolicy::unbounded(), &CancelToken::never())
            .await?;

    assert_eq!(first.seq, 6);
    assert_eq!(second.seq, 7);
    assert_eq!(store.find_current(id).await?.seq, 7);
    Ok(())
}

#[tokio::test]
async fn stale_copy_is_reread_and_mutation_reapplied() -> StoreResult<()> {
    let store = MemoryVersionedStore::new();
    let initial = pipeline(0);
    let id = initial.id;
    store.insert(initial.clone())?;
    store.write_behind(id, |p| p.default_branch = "develop".into())?;

    let calls = AtomicU32::new(0);
    let updated = mutate_with_retry(
        &store,
        initial,
        RetryPolicy::unbounded(),
        &CancelToken::never(),
        |p: &mut Pipeline| {
            calls.fetch_add(1, Ordering::SeqCst);
            p.description = "nightly".into();
            Ok(())
        },
    )
    .await?;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(updated.version, 2);
    assert_eq!(updated.default_branch, "develop", "concurrent write preserved");
    assert_eq!(updated.description, "nightly");
    Ok(())
}

#[tokio::test]
async fn mutation_errors_are_not_retried() -> StoreResult<()> {
    let store = MemoryVersionedStore::new();
    let initial = pipeline(0);
    let id = initial.id;
    store.insert(initial.clone())?;

    let calls = AtomicU32::new(0);
    let err = mutate_with_retry(
        &store,
        initial,
        RetryPolicy::unbounded(),
        &CancelToken::never(),
        |_: &mut Pipeline| {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::validation("uid is immutable"))
        },
    )
    .await
    .unwrap_err();

    assert!(matches!(err, StoreError::Validation { .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.find_current(id).await?.version, 0);
    Ok(())
}

/// Every write loses the race; optionally cancels the caller on the first loss.
struct AlwaysConflicting {
    stored: Pipeline,
    writes: AtomicU32,
    cancel_on_conflict: Option<CancelHandle>,
}

#[async_trait]
impl VersionedStore<Pipeline> for AlwaysConflicting {
    async fn find_current(&self, _key: PipelineId) -> StoreResult<Pipeline> {
        Ok(self.stored.clone())
    }

    async fn compare_and_update(&self, _entity: &mut Pipeline) -> StoreResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = &self.cancel_on_conflict {
            handle.cancel();
        }
        Err(StoreError::version_conflict("someone else won"))
    }
}

#[tokio::test]
async fn retry_ceiling_surfaces_too_many_retries() {
    let store = AlwaysConflicting {
        stored: pipeline(0),
        writes: AtomicU32::new(0),
        cancel_on_conflict: None,
    };
    let err = increment_sequence(
        &store,
        store.stored.clone(),
        RetryPolicy::with_max_retries(3),
        &CancelToken::never(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, StoreError::TooManyRetries { .. }), "{err}");
    assert_eq!(store.writes.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn cancellation_stops_the_retry_loop() {
    let (handle, token) = cancel_pair();
    let store = AlwaysConflicting {
        stored: pipeline(0),
        writes: AtomicU32::new(0),
        cancel_on_conflict: Some(handle),
    };
    let err = increment_sequence(&store, store.stored.clone(), RetryPolicy::unbounded(), &token)
        .await
        .unwrap_err();

    assert!(err.is_cancelled(), "{err}");
    assert_eq!(store.writes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cancelled_before_start_leaves_entity_untouched() -> StoreResult<()> {
    let store = MemoryVersionedStore::new();
    let initial = pipeline(3);
    let id = initial.id;
    store.insert(initial)?;
    let (handle, token) = cancel_pair();
    handle.cancel();

    let err = allocate_sequence::<Pipeline, _>(&store, id, RetryPolicy::unbounded(), &token)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
    let stored = store.find_current(id).await?;
    assert_eq!((stored.seq, stored.version), (3, 0));
    Ok(())
}
