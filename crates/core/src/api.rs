use async_trait::async_trait;

use crate::{
    CancelToken, CreatePipelineInput, CreateRepoInput, CreateSpaceInput, ListQueryFilter,
    MoveInput, Path, PathFilter, PathId, PathTarget, Pipeline, PipelineId, PrincipalId, RepoFilter,
    RepoId, Repository, Space, SpaceId, StoreResult,
};

/// Reads and alias management over the shared path table.
#[async_trait]
pub trait PathApi: Send + Sync {
    async fn find_path(&self, id: PathId) -> StoreResult<Path>;

    /// The single non-alias path of `target`.
    async fn find_primary_path(&self, target: PathTarget) -> StoreResult<Path>;

    /// Resolves a human-supplied value through the configured normalization.
    async fn find_path_by_value(&self, value: &str) -> StoreResult<Path>;

    async fn list_paths(&self, target: PathTarget, filter: &PathFilter) -> StoreResult<Vec<Path>>;
    async fn count_paths(&self, target: PathTarget) -> StoreResult<u64>;

    async fn create_alias(
        &self,
        target: PathTarget,
        value: &str,
        actor: PrincipalId,
    ) -> StoreResult<Path>;

    /// Removes an alias of `target`. Primary paths cannot be removed this way.
    async fn delete_alias(&self, target: PathTarget, id: PathId) -> StoreResult<()>;
}

#[async_trait]
pub trait SpaceApi: PathApi {
    async fn create_space(&self, input: CreateSpaceInput) -> StoreResult<Space>;
    async fn find_space(&self, id: SpaceId) -> StoreResult<Space>;
    async fn find_space_by_path(&self, value: &str) -> StoreResult<Space>;
    async fn move_space(&self, id: SpaceId, input: MoveInput) -> StoreResult<Space>;
    async fn update_space(&self, space: &Space) -> StoreResult<Space>;

    /// Fails with `Conflict` while the space still has children.
    async fn delete_space(&self, id: SpaceId) -> StoreResult<()>;

    async fn list_space_paths(&self, id: SpaceId, filter: &PathFilter) -> StoreResult<Vec<Path>> {
        self.list_paths(PathTarget::space(id), filter).await
    }

    async fn count_space_paths(&self, id: SpaceId) -> StoreResult<u64> {
        self.count_paths(PathTarget::space(id)).await
    }

    async fn create_space_path(
        &self,
        id: SpaceId,
        value: &str,
        actor: PrincipalId,
    ) -> StoreResult<Path> {
        self.create_alias(PathTarget::space(id), value, actor).await
    }

    async fn delete_space_path(&self, id: SpaceId, path: PathId) -> StoreResult<()> {
        self.delete_alias(PathTarget::space(id), path).await
    }
}

#[async_trait]
pub trait RepoApi: PathApi {
    async fn create_repo(&self, input: CreateRepoInput) -> StoreResult<Repository>;
    async fn find_repo(&self, id: RepoId) -> StoreResult<Repository>;
    async fn find_repo_by_path(&self, value: &str) -> StoreResult<Repository>;

    /// A reference is either a repository id or a path.
    async fn find_repo_from_ref(&self, reference: &str) -> StoreResult<Repository>;

    async fn move_repo(&self, id: RepoId, input: MoveInput) -> StoreResult<Repository>;
    async fn update_repo(&self, repo: &Repository) -> StoreResult<Repository>;
    async fn delete_repo(&self, id: RepoId) -> StoreResult<()>;
    async fn count_repos(&self, parent: SpaceId, filter: &RepoFilter) -> StoreResult<u64>;
    async fn list_repos(&self, parent: SpaceId, filter: &RepoFilter)
    -> StoreResult<Vec<Repository>>;

    async fn list_repo_paths(&self, id: RepoId, filter: &PathFilter) -> StoreResult<Vec<Path>> {
        self.list_paths(PathTarget::repo(id), filter).await
    }

    async fn count_repo_paths(&self, id: RepoId) -> StoreResult<u64> {
        self.count_paths(PathTarget::repo(id)).await
    }

    async fn create_repo_path(
        &self,
        id: RepoId,
        value: &str,
        actor: PrincipalId,
    ) -> StoreResult<Path> {
        self.create_alias(PathTarget::repo(id), value, actor).await
    }

    async fn delete_repo_path(&self, id: RepoId, path: PathId) -> StoreResult<()> {
        self.delete_alias(PathTarget::repo(id), path).await
    }
}

#[async_trait]
pub trait PipelineApi: Send + Sync {
    async fn create_pipeline(&self, input: CreatePipelineInput) -> StoreResult<Pipeline>;
    async fn find_pipeline(&self, id: PipelineId) -> StoreResult<Pipeline>;
    async fn find_pipeline_by_uid(&self, space: SpaceId, uid: &str) -> StoreResult<Pipeline>;

    /// Single compare-and-update; surfaces `VersionConflict` to the caller.
    async fn update_pipeline(&self, pipeline: &mut Pipeline) -> StoreResult<()>;

    /// Applies `mutate` under the optimistic protocol, retrying on conflicts.
    async fn update_pipeline_opt_lock<F>(
        &self,
        pipeline: Pipeline,
        cancel: &CancelToken,
        mutate: F,
    ) -> StoreResult<Pipeline>
    where
        F: FnMut(&mut Pipeline) -> StoreResult<()> + Send;

    /// Bumps `seq` by one; the returned pipeline's `seq` is the allocated number.
    async fn increment_pipeline_seq(
        &self,
        pipeline: Pipeline,
        cancel: &CancelToken,
    ) -> StoreResult<Pipeline>;

    async fn list_pipelines(
        &self,
        space: SpaceId,
        filter: &ListQueryFilter,
    ) -> StoreResult<Vec<Pipeline>>;
    async fn count_pipelines(&self, space: SpaceId, filter: &ListQueryFilter) -> StoreResult<u64>;
    async fn delete_pipeline(&self, id: PipelineId) -> StoreResult<()>;
    async fn delete_pipeline_by_uid(&self, space: SpaceId, uid: &str) -> StoreResult<()>;
}
