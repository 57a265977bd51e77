use async_trait::async_trait;
use log::debug;
use sea_orm::sea_query::{
    Alias, Expr, Func, LikeExpr, Order as SortOrder, Query, SelectStatement,
};
use sea_orm::{ConnectionTrait, QueryResult};

use gitspace_core::filter::{limit as page_limit, offset as page_offset};
use gitspace_core::{
    CreateRepoInput, Id, MoveInput, PathTarget, PathTargetType, PrincipalId, RepoApi, RepoAttr,
    RepoFilter, RepoId, Repository, SpaceId, StoreError, StoreResult, paths,
};

use crate::db::{Paths, Repositories};
use crate::sql::{
    count_from, exec, id_value, opt_id_value, query_all, query_one, read_bool, read_i64, read_id,
    read_opt_id, read_string,
};
use crate::store::{FAILPOINT_AFTER_ENTITY_INSERT, GitspaceStore, commit};

const REPO_COLUMNS: [Repositories; 15] = [
    Repositories::RepoId,
    Repositories::RepoParentId,
    Repositories::RepoUid,
    Repositories::RepoDescription,
    Repositories::RepoIsPublic,
    Repositories::RepoCreatedBy,
    Repositories::RepoCreated,
    Repositories::RepoUpdated,
    Repositories::RepoGitUid,
    Repositories::RepoDefaultBranch,
    Repositories::RepoForkId,
    Repositories::RepoNumForks,
    Repositories::RepoNumPulls,
    Repositories::RepoNumClosedPulls,
    Repositories::RepoNumOpenPulls,
];

/// Repositories joined with their primary path.
fn select_repos_with_path() -> SelectStatement {
    Query::select()
        .from(Repositories::Table)
        .columns(REPO_COLUMNS.map(|col| (Repositories::Table, col)))
        .column((Paths::Table, Paths::PathValue))
        .inner_join(
            Paths::Table,
            Expr::col((Paths::Table, Paths::PathTargetId))
                .equals((Repositories::Table, Repositories::RepoId))
                .and(
                    Expr::col((Paths::Table, Paths::PathTargetType))
                        .eq(PathTargetType::Repository.as_str()),
                )
                .and(Expr::col((Paths::Table, Paths::PathIsAlias)).eq(false)),
        )
        .to_owned()
}

fn repo_from_row(row: &QueryResult) -> StoreResult<Repository> {
    Ok(Repository {
        id: RepoId(read_id(row, Repositories::RepoId)?),
        parent_id: SpaceId(read_id(row, Repositories::RepoParentId)?),
        uid: read_string(row, Repositories::RepoUid)?,
        path: read_string(row, Paths::PathValue)?,
        description: read_string(row, Repositories::RepoDescription)?,
        is_public: read_bool(row, Repositories::RepoIsPublic)?,
        created_by: PrincipalId(read_id(row, Repositories::RepoCreatedBy)?),
        created: read_i64(row, Repositories::RepoCreated)?,
        updated: read_i64(row, Repositories::RepoUpdated)?,
        git_uid: read_string(row, Repositories::RepoGitUid)?,
        default_branch: read_string(row, Repositories::RepoDefaultBranch)?,
        fork_id: read_opt_id(row, Repositories::RepoForkId)?.map(RepoId),
        num_forks: read_i64(row, Repositories::RepoNumForks)?,
        num_pulls: read_i64(row, Repositories::RepoNumPulls)?,
        num_closed_pulls: read_i64(row, Repositories::RepoNumClosedPulls)?,
        num_open_pulls: read_i64(row, Repositories::RepoNumOpenPulls)?,
    })
}

impl GitspaceStore {
    async fn read_repo<C: ConnectionTrait>(&self, conn: &C, id: RepoId) -> StoreResult<Repository> {
        let select = select_repos_with_path()
            .and_where(
                Expr::col((Repositories::Table, Repositories::RepoId))
                    .eq(id_value(self.backend(), id.0)),
            )
            .limit(1)
            .to_owned();
        let row = query_one(conn, &select)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("repository {id}")))?;
        repo_from_row(&row)
    }

    async fn space_primary_path<C: ConnectionTrait>(
        &self,
        conn: &C,
        space: SpaceId,
    ) -> StoreResult<String> {
        let primary = self
            .paths()
            .find_primary(conn, PathTarget::space(space))
            .await
            .map_err(|err| err.context(format!("parent space {space}")))?;
        Ok(primary.value)
    }

    fn apply_repo_filter(&self, select: &mut SelectStatement, parent: SpaceId, filter: &RepoFilter) {
        select.and_where(
            Expr::col((Repositories::Table, Repositories::RepoParentId))
                .eq(id_value(self.backend(), parent.0)),
        );
        if let Some(query) = filter.query.as_deref().filter(|query| !query.is_empty()) {
            let pattern = format!("%{}%", paths::escape_like(&query.to_lowercase()));
            select.and_where(
                Expr::expr(Func::lower(Expr::col((
                    Repositories::Table,
                    Repositories::RepoUid,
                ))))
                .like(LikeExpr::new(pattern).escape('\\')),
            );
        }
    }
}

#[async_trait]
impl RepoApi for GitspaceStore {
    async fn create_repo(&self, input: CreateRepoInput) -> StoreResult<Repository> {
        self.path_policy().validate_segment(&input.uid)?;
        let tx = self.begin().await?;
        let parent_path = self.space_primary_path(&tx, input.parent_id).await?;
        let now = self.now();
        let repo = Repository {
            id: RepoId::new(),
            parent_id: input.parent_id,
            path: paths::concatenate(&parent_path, &input.uid),
            uid: input.uid,
            description: input.description,
            is_public: input.is_public,
            created_by: input.created_by,
            created: now,
            updated: now,
            git_uid: input.git_uid,
            default_branch: input.default_branch,
            fork_id: input.fork_id,
            num_forks: 0,
            num_pulls: 0,
            num_closed_pulls: 0,
            num_open_pulls: 0,
        };
        let backend = self.backend();
        let insert = Query::insert()
            .into_table(Repositories::Table)
            .columns(REPO_COLUMNS)
            .values_panic([
                id_value(backend, repo.id.0).into(),
                id_value(backend, repo.parent_id.0).into(),
                repo.uid.clone().into(),
                repo.description.clone().into(),
                repo.is_public.into(),
                id_value(backend, repo.created_by.0).into(),
                now.into(),
                now.into(),
                repo.git_uid.clone().into(),
                repo.default_branch.clone().into(),
                opt_id_value(backend, repo.fork_id.map(|id| id.0)).into(),
                0i64.into(),
                0i64.into(),
                0i64.into(),
                0i64.into(),
            ])
            .to_owned();
        exec(&tx, &insert).await?;
        self.paths()
            .create_primary(&tx, PathTarget::repo(repo.id), &repo.path, repo.created_by)
            .await?;
        self.maybe_failpoint(FAILPOINT_AFTER_ENTITY_INSERT)?;
        commit(tx, "create repository").await?;
        Ok(repo)
    }

    async fn find_repo(&self, id: RepoId) -> StoreResult<Repository> {
        self.read_repo(self.connection(), id).await
    }

    async fn find_repo_by_path(&self, value: &str) -> StoreResult<Repository> {
        let path = self
            .paths()
            .find_by_value(self.connection(), value)
            .await?;
        if path.target_type != PathTargetType::Repository {
            return Err(StoreError::not_found(format!("repository at '{value}'")));
        }
        self.find_repo(RepoId(path.target_id)).await
    }

    async fn find_repo_from_ref(&self, reference: &str) -> StoreResult<Repository> {
        if let Ok(id) = Id::from_uuid_str(reference) {
            match self.find_repo(RepoId(id)).await {
                Err(err) if err.is_not_found() => {
                    debug!("'{reference}' is not a repository id, resolving as path");
                }
                found => return found,
            }
        }
        self.find_repo_by_path(reference).await
    }

    async fn move_repo(&self, id: RepoId, input: MoveInput) -> StoreResult<Repository> {
        let op = format!("move repository {id}");
        let tx = self.begin().await?;
        let repo = self.read_repo(&tx, id).await?;
        let new_parent = input.new_parent_id.unwrap_or(repo.parent_id);
        let parent_path = self.space_primary_path(&tx, new_parent).await?;
        let primary = self
            .paths()
            .move_primary(
                &tx,
                PathTarget::repo(id),
                Some(&parent_path),
                &input.new_uid,
                input.keep_as_alias,
                input.actor,
            )
            .await
            .map_err(|err| err.context(&op))?;
        let now = self.now();
        let backend = self.backend();
        let update = Query::update()
            .table(Repositories::Table)
            .value(Repositories::RepoUid, input.new_uid.clone())
            .value(Repositories::RepoParentId, id_value(backend, new_parent.0))
            .value(Repositories::RepoUpdated, now)
            .and_where(Expr::col(Repositories::RepoId).eq(id_value(backend, id.0)))
            .to_owned();
        exec(&tx, &update).await?;
        commit(tx, &op).await?;
        Ok(Repository {
            parent_id: new_parent,
            uid: input.new_uid,
            path: primary.value,
            updated: now,
            ..repo
        })
    }

    async fn update_repo(&self, repo: &Repository) -> StoreResult<Repository> {
        let backend = self.backend();
        let update = Query::update()
            .table(Repositories::Table)
            .value(Repositories::RepoDescription, repo.description.clone())
            .value(Repositories::RepoIsPublic, repo.is_public)
            .value(Repositories::RepoDefaultBranch, repo.default_branch.clone())
            .value(Repositories::RepoNumForks, repo.num_forks)
            .value(Repositories::RepoNumPulls, repo.num_pulls)
            .value(Repositories::RepoNumClosedPulls, repo.num_closed_pulls)
            .value(Repositories::RepoNumOpenPulls, repo.num_open_pulls)
            .value(Repositories::RepoUpdated, self.now())
            .and_where(Expr::col(Repositories::RepoId).eq(id_value(backend, repo.id.0)))
            .to_owned();
        if exec(self.connection(), &update).await? == 0 {
            return Err(StoreError::not_found(format!("repository {}", repo.id)));
        }
        self.find_repo(repo.id).await
    }

    async fn delete_repo(&self, id: RepoId) -> StoreResult<()> {
        let tx = self.begin().await?;
        self.read_repo(&tx, id).await?;
        self.paths().delete_all(&tx, PathTarget::repo(id)).await?;
        let delete = Query::delete()
            .from_table(Repositories::Table)
            .and_where(Expr::col(Repositories::RepoId).eq(id_value(self.backend(), id.0)))
            .to_owned();
        exec(&tx, &delete).await?;
        commit(tx, &format!("delete repository {id}")).await
    }

    async fn count_repos(&self, parent: SpaceId, filter: &RepoFilter) -> StoreResult<u64> {
        let mut select = Query::select()
            .from(Repositories::Table)
            .expr_as(
                Expr::col((Repositories::Table, Repositories::RepoId)).count(),
                Alias::new("count"),
            )
            .to_owned();
        self.apply_repo_filter(&mut select, parent, filter);
        count_from(query_one(self.connection(), &select).await?)
    }

    async fn list_repos(
        &self,
        parent: SpaceId,
        filter: &RepoFilter,
    ) -> StoreResult<Vec<Repository>> {
        let mut select = select_repos_with_path();
        self.apply_repo_filter(&mut select, parent, filter);
        let order = if filter.order.is_descending() {
            SortOrder::Desc
        } else {
            SortOrder::Asc
        };
        match filter.sort {
            RepoAttr::None | RepoAttr::Uid => select.order_by_expr(
                Func::lower(Expr::col((Repositories::Table, Repositories::RepoUid))).into(),
                order,
            ),
            RepoAttr::Created => {
                select.order_by((Repositories::Table, Repositories::RepoCreated), order)
            }
            RepoAttr::Updated => {
                select.order_by((Repositories::Table, Repositories::RepoUpdated), order)
            }
            RepoAttr::Path => select.order_by((Paths::Table, Paths::PathValue), order),
        };
        select
            .limit(page_limit(filter.size))
            .offset(page_offset(filter.page, filter.size));
        query_all(self.connection(), &select)
            .await?
            .iter()
            .map(repo_from_row)
            .collect()
    }
}
