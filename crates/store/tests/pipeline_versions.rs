use std::collections::BTreeSet;
use std::path::Path as FsPath;

use gitspace_store::{
    CancelToken, ConcurrencyConfig, CreatePipelineInput, GitspaceStore, ListQueryFilter, Pipeline,
    PipelineApi, PoolConfig, SpaceId, StoreConfig, StoreError, StoreResult, cancel_pair,
};
use tempfile::tempdir;

fn config(dir: &FsPath) -> StoreConfig {
    let mut config = StoreConfig::default_sqlite(dir.join("ns.sqlite").to_string_lossy());
    config.pool = Some(PoolConfig {
        max_connections: Some(1),
        ..PoolConfig::default()
    });
    config
}

async fn open(dir: &FsPath) -> StoreResult<GitspaceStore> {
    GitspaceStore::connect(&config(dir), dir).await
}

async fn pipeline(store: &GitspaceStore, space: SpaceId, uid: &str) -> StoreResult<Pipeline> {
    store
        .create_pipeline(CreatePipelineInput {
            space_id: space,
            uid: uid.to_string(),
            description: String::new(),
            repo_id: None,
            repo_type: "gitspace".to_string(),
            repo_name: "acme/repo1".to_string(),
            default_branch: "main".to_string(),
            config_path: ".gitspace/pipeline.yaml".to_string(),
        })
        .await
}

#[tokio::test]
async fn pipeline_crud_and_listing() -> StoreResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = open(dir.path()).await?;
    let space = SpaceId::new();
    let build = pipeline(&store, space, "build").await?;
    pipeline(&store, space, "deploy").await?;
    pipeline(&store, space, "Build-nightly").await?;
    pipeline(&store, SpaceId::new(), "build").await?;
    assert_eq!(build.version, 0);
    assert_eq!(build.seq, 0);

    assert_eq!(store.find_pipeline(build.id).await?, build);
    assert_eq!(store.find_pipeline_by_uid(space, "build").await?.id, build.id);
    let err = pipeline(&store, space, "build").await.expect_err("duplicate uid");
    assert!(matches!(err, StoreError::Conflict { .. }));

    let all = store.list_pipelines(space, &ListQueryFilter::default()).await?;
    let uids: Vec<_> = all.iter().map(|pipeline| pipeline.uid.as_str()).collect();
    assert_eq!(uids, ["Build-nightly", "build", "deploy"]);
    let query = ListQueryFilter {
        query: Some("build".to_string()),
        ..ListQueryFilter::default()
    };
    assert_eq!(store.count_pipelines(space, &query).await?, 2);
    let paged = ListQueryFilter {
        page: 2,
        size: 2,
        ..ListQueryFilter::default()
    };
    assert_eq!(store.list_pipelines(space, &paged).await?.len(), 1);

    store.delete_pipeline_by_uid(space, "deploy").await?;
    store.delete_pipeline(build.id).await?;
    assert!(store.find_pipeline(build.id).await.expect_err("deleted").is_not_found());
    let err = store.delete_pipeline(build.id).await.expect_err("already gone");
    assert!(err.is_not_found());
    assert_eq!(store.count_pipelines(space, &ListQueryFilter::default()).await?, 1);
    Ok(())
}

#[tokio::test]
async fn stale_update_is_a_version_conflict() -> StoreResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = open(dir.path()).await?;
    let original = pipeline(&store, SpaceId::new(), "build").await?;

    let mut first = original.clone();
    first.description = "first".to_string();
    store.update_pipeline(&mut first).await?;
    assert_eq!(first.version, 1);

    let mut stale = original.clone();
    stale.description = "stale".to_string();
    let err = store.update_pipeline(&mut stale).await.expect_err("stale copy");
    assert!(err.is_version_conflict());
    assert_eq!(stale.version, 0);

    let stored = store.find_pipeline(original.id).await?;
    assert_eq!(stored.description, "first");
    assert_eq!(stored.version, 1);
    Ok(())
}

#[tokio::test]
async fn opt_lock_reapplies_mutation_on_a_stale_copy() -> StoreResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = open(dir.path()).await?;
    let original = pipeline(&store, SpaceId::new(), "build").await?;
    let mut ahead = original.clone();
    ahead.default_branch = "trunk".to_string();
    store.update_pipeline(&mut ahead).await?;

    let updated = store
        .update_pipeline_opt_lock(original, &CancelToken::never(), |pipeline| {
            pipeline.description = format!("{} on {}", pipeline.uid, pipeline.default_branch);
            Ok(())
        })
        .await?;
    assert_eq!(updated.description, "build on trunk");
    assert_eq!(updated.version, 2);
    assert_eq!(store.find_pipeline(updated.id).await?, updated);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_opt_lock_updates_all_land() -> StoreResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = open(dir.path()).await?;
    let loaded = pipeline(&store, SpaceId::new(), "build").await?;
    let writers = 8;

    let mut tasks = Vec::new();
    for writer in 0..writers {
        let store = store.clone();
        let copy = loaded.clone();
        tasks.push(tokio::spawn(async move {
            store
                .update_pipeline_opt_lock(copy, &CancelToken::never(), move |pipeline| {
                    pipeline.description.push_str(&format!("[{writer}]"));
                    Ok(())
                })
                .await
        }));
    }
    for task in tasks {
        task.await.expect("join")?;
    }

    let stored = store.find_pipeline(loaded.id).await?;
    assert_eq!(stored.version, writers);
    for writer in 0..writers {
        assert!(stored.description.contains(&format!("[{writer}]")));
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn two_increments_from_five_yield_six_and_seven() -> StoreResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = open(dir.path()).await?;
    let created = pipeline(&store, SpaceId::new(), "build").await?;
    let at_five = store
        .update_pipeline_opt_lock(created, &CancelToken::never(), |pipeline| {
            pipeline.seq = 5;
            Ok(())
        })
        .await?;

    let first = {
        let store = store.clone();
        let copy = at_five.clone();
        tokio::spawn(async move { store.increment_pipeline_seq(copy, &CancelToken::never()).await })
    };
    let second = {
        let store = store.clone();
        let copy = at_five.clone();
        tokio::spawn(async move { store.increment_pipeline_seq(copy, &CancelToken::never()).await })
    };
    let a = first.await.expect("join")?.seq;
    let b = second.await.expect("join")?.seq;

    assert_eq!(BTreeSet::from([a, b]), BTreeSet::from([6, 7]));
    assert_eq!(store.find_pipeline(at_five.id).await?.seq, 7);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sequence_numbers_never_repeat() -> StoreResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = open(dir.path()).await?;
    let loaded = pipeline(&store, SpaceId::new(), "build").await?;
    let callers = 10;

    let mut tasks = Vec::new();
    for _ in 0..callers {
        let store = store.clone();
        let copy = loaded.clone();
        tasks.push(tokio::spawn(async move {
            store.increment_pipeline_seq(copy, &CancelToken::never()).await
        }));
    }
    let mut seen = BTreeSet::new();
    for task in tasks {
        let committed = task.await.expect("join")?;
        assert!(seen.insert(committed.seq), "seq {} allocated twice", committed.seq);
    }
    assert_eq!(seen, (1..=callers).collect::<BTreeSet<i64>>());
    let stored = store.find_pipeline(loaded.id).await?;
    assert_eq!(stored.seq, callers);
    assert_eq!(stored.version, callers);
    Ok(())
}

#[tokio::test]
async fn retry_ceiling_from_config_surfaces_too_many_retries() -> StoreResult<()> {
    let dir = tempdir().expect("tempdir");
    let mut config = config(dir.path());
    config.concurrency = Some(ConcurrencyConfig {
        max_update_retries: Some(0),
    });
    let store = GitspaceStore::connect(&config, dir.path()).await?;
    let original = pipeline(&store, SpaceId::new(), "build").await?;
    let mut ahead = original.clone();
    store.update_pipeline(&mut ahead).await?;

    let err = store
        .increment_pipeline_seq(original.clone(), &CancelToken::never())
        .await
        .expect_err("no retries allowed");
    assert!(matches!(err, StoreError::TooManyRetries { .. }));
    assert_eq!(store.find_pipeline(original.id).await?.seq, 0);
    Ok(())
}

#[tokio::test]
async fn cancelled_update_leaves_pipeline_untouched() -> StoreResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = open(dir.path()).await?;
    let original = pipeline(&store, SpaceId::new(), "build").await?;
    let (handle, token) = cancel_pair();
    handle.cancel();

    let err = store
        .increment_pipeline_seq(original.clone(), &token)
        .await
        .expect_err("cancelled");
    assert!(err.is_cancelled());
    assert_eq!(store.find_pipeline(original.id).await?, original);
    Ok(())
}
