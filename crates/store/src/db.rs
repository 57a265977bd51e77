use sea_orm::sea_query;
use sea_orm_migration::prelude::Iden;

/// Width of the path value columns. 768 utf8mb4 characters is the widest
/// unique index MySQL InnoDB accepts.
pub const PATH_VALUE_LEN: u32 = 768;
/// Width of the space and repository uid columns, one path segment each.
pub const UID_LEN: u32 = 100;

#[derive(Iden, Clone, Copy)]
pub enum Paths {
    Table,
    PathId,
    PathTargetType,
    PathTargetId,
    PathIsAlias,
    PathValue,
    PathValueUnique,
    PathCreatedBy,
    PathCreated,
    PathUpdated,
}

#[derive(Iden, Clone, Copy)]
pub enum Spaces {
    Table,
    SpaceId,
    SpaceParentId,
    SpaceUid,
    SpaceDescription,
    SpaceIsPublic,
    SpaceCreatedBy,
    SpaceCreated,
    SpaceUpdated,
}

#[derive(Iden, Clone, Copy)]
pub enum Repositories {
    Table,
    RepoId,
    RepoParentId,
    RepoUid,
    RepoDescription,
    RepoIsPublic,
    RepoCreatedBy,
    RepoCreated,
    RepoUpdated,
    RepoGitUid,
    RepoDefaultBranch,
    RepoForkId,
    RepoNumForks,
    RepoNumPulls,
    RepoNumClosedPulls,
    RepoNumOpenPulls,
}

#[derive(Iden, Clone, Copy)]
pub enum Pipelines {
    Table,
    PipelineId,
    PipelineDescription,
    PipelineSpaceId,
    PipelineUid,
    PipelineSeq,
    PipelineRepoId,
    PipelineRepoType,
    PipelineRepoName,
    PipelineDefaultBranch,
    PipelineConfigPath,
    PipelineCreated,
    PipelineUpdated,
    PipelineVersion,
}
