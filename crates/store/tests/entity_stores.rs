use std::path::Path as FsPath;
use std::sync::Arc;

use gitspace_store::{
    CreateRepoInput, CreateSpaceInput, GitspaceStore, ManualClock, MoveInput, Order, PathApi,
    PathAttr, PathFilter, PathTarget, PrincipalId, RepoApi, RepoAttr, RepoFilter, Repository,
    SpaceApi, SpaceId, StoreConfig, StoreError, StoreResult,
};
use tempfile::tempdir;

async fn open(dir: &FsPath, clock: Arc<ManualClock>) -> StoreResult<GitspaceStore> {
    let config = StoreConfig::default_sqlite(dir.join("ns.sqlite").to_string_lossy());
    Ok(GitspaceStore::connect(&config, dir).await?.with_clock(clock))
}

async fn root_space(store: &GitspaceStore, uid: &str, actor: PrincipalId) -> StoreResult<SpaceId> {
    let space = store
        .create_space(CreateSpaceInput {
            parent_id: None,
            uid: uid.to_string(),
            description: String::new(),
            is_public: true,
            created_by: actor,
        })
        .await?;
    Ok(space.id)
}

async fn repo(
    store: &GitspaceStore,
    parent: SpaceId,
    uid: &str,
    actor: PrincipalId,
) -> StoreResult<Repository> {
    store
        .create_repo(CreateRepoInput {
            parent_id: parent,
            uid: uid.to_string(),
            description: format!("{uid} repository"),
            is_public: false,
            created_by: actor,
            git_uid: format!("git-{uid}"),
            default_branch: "main".to_string(),
            fork_id: None,
        })
        .await
}

fn uids(repos: &[Repository]) -> Vec<&str> {
    repos.iter().map(|repo| repo.uid.as_str()).collect()
}

#[tokio::test]
async fn repo_listing_filters_sorts_and_pages() -> StoreResult<()> {
    let dir = tempdir().expect("tempdir");
    let clock = Arc::new(ManualClock::new(1_000));
    let store = open(dir.path(), clock.clone()).await?;
    let actor = PrincipalId::new();
    let acme = root_space(&store, "acme", actor).await?;
    let other = root_space(&store, "other", actor).await?;
    for uid in ["gamma", "alpha", "Beta", "alphabet"] {
        clock.advance(10);
        repo(&store, acme, uid, actor).await?;
    }
    repo(&store, other, "alpha", actor).await?;

    let all = store.list_repos(acme, &RepoFilter::default()).await?;
    assert_eq!(uids(&all), ["alpha", "alphabet", "Beta", "gamma"]);
    assert_eq!(store.count_repos(acme, &RepoFilter::default()).await?, 4);

    let query = RepoFilter {
        query: Some("ALPHA".to_string()),
        ..RepoFilter::default()
    };
    assert_eq!(uids(&store.list_repos(acme, &query).await?), ["alpha", "alphabet"]);
    assert_eq!(store.count_repos(acme, &query).await?, 2);

    let newest_first = RepoFilter {
        sort: RepoAttr::Created,
        order: Order::parse("DESC"),
        ..RepoFilter::default()
    };
    assert_eq!(
        uids(&store.list_repos(acme, &newest_first).await?),
        ["alphabet", "Beta", "alpha", "gamma"]
    );

    let by_path = RepoFilter {
        sort: RepoAttr::Path,
        ..RepoFilter::default()
    };
    let listed = store.list_repos(acme, &by_path).await?;
    assert_eq!(listed[0].path, "acme/Beta");
    assert!(listed.iter().all(|repo| repo.path.starts_with("acme/")));

    let second_page = RepoFilter {
        page: 2,
        size: 3,
        ..RepoFilter::default()
    };
    assert_eq!(uids(&store.list_repos(acme, &second_page).await?), ["gamma"]);
    Ok(())
}

#[tokio::test]
async fn repo_refs_resolve_by_id_then_path() -> StoreResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = open(dir.path(), Arc::new(ManualClock::new(0))).await?;
    let actor = PrincipalId::new();
    let acme = root_space(&store, "acme", actor).await?;
    let repo1 = repo(&store, acme, "repo1", actor).await?;

    assert_eq!(store.find_repo_from_ref(&repo1.id.to_string()).await?.id, repo1.id);
    assert_eq!(store.find_repo_from_ref("Acme/REPO1").await?.id, repo1.id);
    let unknown = PrincipalId::new().to_string();
    let err = store.find_repo_from_ref(&unknown).await.expect_err("unknown ref");
    assert!(err.is_not_found());
    Ok(())
}

#[tokio::test]
async fn repo_move_across_spaces_keeps_old_path_as_alias() -> StoreResult<()> {
    let dir = tempdir().expect("tempdir");
    let clock = Arc::new(ManualClock::new(5_000));
    let store = open(dir.path(), clock.clone()).await?;
    let actor = PrincipalId::new();
    let acme = root_space(&store, "acme", actor).await?;
    let beta = root_space(&store, "beta", actor).await?;
    let repo1 = repo(&store, acme, "repo1", actor).await?;
    clock.advance(100);

    let moved = store
        .move_repo(
            repo1.id,
            MoveInput {
                actor,
                new_parent_id: Some(beta),
                new_uid: "renamed".to_string(),
                keep_as_alias: true,
            },
        )
        .await?;
    assert_eq!(moved.parent_id, beta);
    assert_eq!(moved.path, "beta/renamed");
    assert_eq!(moved.updated, 5_100);
    assert_eq!(store.find_repo_from_ref("acme/repo1").await?.id, repo1.id);
    assert_eq!(store.find_repo(repo1.id).await?, moved);
    assert_eq!(store.count_repos(acme, &RepoFilter::default()).await?, 0);
    assert_eq!(store.count_repos(beta, &RepoFilter::default()).await?, 1);

    let paths = store
        .list_repo_paths(
            repo1.id,
            &PathFilter {
                sort: PathAttr::Path,
                order: Order::Desc,
                ..PathFilter::default()
            },
        )
        .await?;
    let values: Vec<_> = paths.iter().map(|path| path.value.as_str()).collect();
    assert_eq!(values, ["beta/renamed", "acme/repo1"]);
    Ok(())
}

#[tokio::test]
async fn repo_update_persists_mutable_fields() -> StoreResult<()> {
    let dir = tempdir().expect("tempdir");
    let clock = Arc::new(ManualClock::new(10));
    let store = open(dir.path(), clock.clone()).await?;
    let actor = PrincipalId::new();
    let acme = root_space(&store, "acme", actor).await?;
    let mut repo1 = repo(&store, acme, "repo1", actor).await?;
    clock.advance(5);

    repo1.description = "mirror of upstream".to_string();
    repo1.is_public = true;
    repo1.num_forks = 3;
    repo1.num_open_pulls = 2;
    let updated = store.update_repo(&repo1).await?;
    assert_eq!(updated.description, "mirror of upstream");
    assert!(updated.is_public);
    assert_eq!(updated.num_forks, 3);
    assert_eq!(updated.num_open_pulls, 2);
    assert_eq!(updated.updated, 15);
    assert_eq!(updated.created, 10);
    Ok(())
}

#[tokio::test]
async fn aliases_can_be_added_and_removed_but_primaries_cannot() -> StoreResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = open(dir.path(), Arc::new(ManualClock::new(0))).await?;
    let actor = PrincipalId::new();
    let acme = root_space(&store, "acme", actor).await?;
    let beta = root_space(&store, "beta", actor).await?;

    let alias = store.create_space_path(acme, "acme-old", actor).await?;
    assert!(alias.is_alias);
    assert_eq!(
        store.find_path_by_value("ACME-OLD").await?.target(),
        PathTarget::space(acme)
    );
    let err = store
        .create_space_path(beta, "Acme-Old", actor)
        .await
        .expect_err("taken");
    assert!(err.is_duplicate_path());
    let err = store
        .create_space_path(acme, "acme//old", actor)
        .await
        .expect_err("malformed");
    assert!(matches!(err, StoreError::InvalidPath { .. }));

    let listed = store.list_space_paths(acme, &PathFilter::default()).await?;
    let values: Vec<_> = listed.iter().map(|path| path.value.as_str()).collect();
    assert_eq!(values, ["acme", "acme-old"]);

    let primary = store.find_primary_path(PathTarget::space(acme)).await?;
    let err = store
        .delete_space_path(acme, primary.id)
        .await
        .expect_err("primary");
    assert!(matches!(err, StoreError::Validation { .. }));
    let err = store
        .delete_space_path(beta, alias.id)
        .await
        .expect_err("other target");
    assert!(err.is_not_found());

    store.delete_space_path(acme, alias.id).await?;
    assert!(store.find_path_by_value("acme-old").await.is_err());
    assert_eq!(store.count_space_paths(acme).await?, 1);
    Ok(())
}

#[tokio::test]
async fn spaces_with_children_cannot_be_deleted() -> StoreResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = open(dir.path(), Arc::new(ManualClock::new(0))).await?;
    let actor = PrincipalId::new();
    let acme = root_space(&store, "acme", actor).await?;
    let repo1 = repo(&store, acme, "repo1", actor).await?;
    store.create_repo_path(repo1.id, "legacy-repo1", actor).await?;
    store.create_space_path(acme, "acme-old", actor).await?;

    let err = store.delete_space(acme).await.expect_err("has repo");
    assert!(matches!(err, StoreError::Conflict { .. }));

    store.delete_repo(repo1.id).await?;
    assert!(store.find_path_by_value("legacy-repo1").await.is_err());
    store.delete_space(acme).await?;
    for value in ["acme", "acme-old", "acme/repo1"] {
        let err = store.find_path_by_value(value).await.expect_err(value);
        assert!(err.is_not_found());
    }
    assert!(store.find_space(acme).await.expect_err("deleted").is_not_found());
    Ok(())
}

#[tokio::test]
async fn space_update_and_nested_create() -> StoreResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = open(dir.path(), Arc::new(ManualClock::new(0))).await?;
    let actor = PrincipalId::new();
    let acme = root_space(&store, "acme", actor).await?;
    let team = store
        .create_space(CreateSpaceInput {
            parent_id: Some(acme),
            uid: "team".to_string(),
            description: String::new(),
            is_public: false,
            created_by: actor,
        })
        .await?;
    assert_eq!(team.path, "acme/team");
    assert_eq!(store.find_space_by_path("ACME/TEAM").await?.id, team.id);

    let mut edited = team.clone();
    edited.description = "platform team".to_string();
    edited.is_public = true;
    let stored = store.update_space(&edited).await?;
    assert_eq!(stored.description, "platform team");
    assert!(stored.is_public);

    let err = store
        .create_space(CreateSpaceInput {
            parent_id: Some(SpaceId::new()),
            uid: "orphan".to_string(),
            description: String::new(),
            is_public: false,
            created_by: actor,
        })
        .await
        .expect_err("missing parent");
    assert!(err.is_not_found());
    Ok(())
}
