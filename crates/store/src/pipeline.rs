use async_trait::async_trait;
use sea_orm::sea_query::{Alias, Expr, Func, LikeExpr, Order as SortOrder, Query, SelectStatement};
use sea_orm::{ConnectionTrait, QueryResult};

use gitspace_core::filter::{limit as page_limit, offset as page_offset};
use gitspace_core::{
    CancelToken, CreatePipelineInput, ListQueryFilter, Pipeline, PipelineApi, PipelineId, RepoId,
    SpaceId, StoreError, StoreResult, Versioned, VersionedStore, increment_sequence,
    mutate_with_retry, paths,
};

use crate::db::Pipelines;
use crate::sql::{
    count_from, exec, exec_unique, id_value, opt_id_value, query_all, query_one, read_i64,
    read_id, read_opt_id, read_string,
};
use crate::store::GitspaceStore;

const PIPELINE_COLUMNS: [Pipelines; 13] = [
    Pipelines::PipelineId,
    Pipelines::PipelineDescription,
    Pipelines::PipelineSpaceId,
    Pipelines::PipelineUid,
    Pipelines::PipelineSeq,
    Pipelines::PipelineRepoId,
    Pipelines::PipelineRepoType,
    Pipelines::PipelineRepoName,
    Pipelines::PipelineDefaultBranch,
    Pipelines::PipelineConfigPath,
    Pipelines::PipelineCreated,
    Pipelines::PipelineUpdated,
    Pipelines::PipelineVersion,
];

fn select_pipelines() -> SelectStatement {
    Query::select()
        .from(Pipelines::Table)
        .columns(PIPELINE_COLUMNS)
        .to_owned()
}

fn pipeline_from_row(row: &QueryResult) -> StoreResult<Pipeline> {
    Ok(Pipeline {
        id: PipelineId(read_id(row, Pipelines::PipelineId)?),
        description: read_string(row, Pipelines::PipelineDescription)?,
        space_id: SpaceId(read_id(row, Pipelines::PipelineSpaceId)?),
        uid: read_string(row, Pipelines::PipelineUid)?,
        seq: read_i64(row, Pipelines::PipelineSeq)?,
        repo_id: read_opt_id(row, Pipelines::PipelineRepoId)?.map(RepoId),
        repo_type: read_string(row, Pipelines::PipelineRepoType)?,
        repo_name: read_string(row, Pipelines::PipelineRepoName)?,
        default_branch: read_string(row, Pipelines::PipelineDefaultBranch)?,
        config_path: read_string(row, Pipelines::PipelineConfigPath)?,
        created: read_i64(row, Pipelines::PipelineCreated)?,
        updated: read_i64(row, Pipelines::PipelineUpdated)?,
        version: read_i64(row, Pipelines::PipelineVersion)?,
    })
}

impl GitspaceStore {
    async fn read_pipeline<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: PipelineId,
    ) -> StoreResult<Pipeline> {
        let select = select_pipelines()
            .and_where(Expr::col(Pipelines::PipelineId).eq(id_value(self.backend(), id.0)))
            .limit(1)
            .to_owned();
        let row = query_one(conn, &select)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("pipeline {id}")))?;
        pipeline_from_row(&row)
    }

    fn apply_pipeline_filter(
        &self,
        select: &mut SelectStatement,
        space: SpaceId,
        filter: &ListQueryFilter,
    ) {
        select.and_where(
            Expr::col(Pipelines::PipelineSpaceId).eq(id_value(self.backend(), space.0)),
        );
        if let Some(query) = filter.query.as_deref().filter(|query| !query.is_empty()) {
            let pattern = format!("%{}%", paths::escape_like(&query.to_lowercase()));
            select.and_where(
                Expr::expr(Func::lower(Expr::col(Pipelines::PipelineUid)))
                    .like(LikeExpr::new(pattern).escape('\\')),
            );
        }
    }
}

#[async_trait]
impl VersionedStore<Pipeline> for GitspaceStore {
    async fn find_current(&self, key: PipelineId) -> StoreResult<Pipeline> {
        self.read_pipeline(self.connection(), key).await
    }

    /// `UPDATE ... WHERE id = ? AND version = ?`; zero matched rows is a conflict.
    async fn compare_and_update(&self, pipeline: &mut Pipeline) -> StoreResult<()> {
        let backend = self.backend();
        let version = pipeline.version + 1;
        let updated = self.now();
        let update = Query::update()
            .table(Pipelines::Table)
            .value(Pipelines::PipelineDescription, pipeline.description.clone())
            .value(Pipelines::PipelineUid, pipeline.uid.clone())
            .value(Pipelines::PipelineSeq, pipeline.seq)
            .value(
                Pipelines::PipelineRepoId,
                opt_id_value(backend, pipeline.repo_id.map(|id| id.0)),
            )
            .value(Pipelines::PipelineRepoType, pipeline.repo_type.clone())
            .value(Pipelines::PipelineRepoName, pipeline.repo_name.clone())
            .value(Pipelines::PipelineDefaultBranch, pipeline.default_branch.clone())
            .value(Pipelines::PipelineConfigPath, pipeline.config_path.clone())
            .value(Pipelines::PipelineUpdated, updated)
            .value(Pipelines::PipelineVersion, version)
            .and_where(Expr::col(Pipelines::PipelineId).eq(id_value(backend, pipeline.id.0)))
            .and_where(Expr::col(Pipelines::PipelineVersion).eq(pipeline.version))
            .to_owned();
        let uid = pipeline.uid.clone();
        let space = pipeline.space_id;
        let matched = exec_unique(self.connection(), &update, || {
            StoreError::conflict(format!("pipeline '{uid}' already exists in space {space}"))
        })
        .await?;
        if matched == 0 {
            return Err(StoreError::version_conflict(format!(
                "pipeline {} is no longer at version {}",
                pipeline.id, pipeline.version
            )));
        }
        pipeline.mark_committed(version, updated);
        Ok(())
    }
}

#[async_trait]
impl PipelineApi for GitspaceStore {
    async fn create_pipeline(&self, input: CreatePipelineInput) -> StoreResult<Pipeline> {
        self.path_policy().validate_segment(&input.uid)?;
        let now = self.now();
        let pipeline = Pipeline {
            id: PipelineId::new(),
            description: input.description,
            space_id: input.space_id,
            uid: input.uid,
            seq: 0,
            repo_id: input.repo_id,
            repo_type: input.repo_type,
            repo_name: input.repo_name,
            default_branch: input.default_branch,
            config_path: input.config_path,
            created: now,
            updated: now,
            version: 0,
        };
        let backend = self.backend();
        let insert = Query::insert()
            .into_table(Pipelines::Table)
            .columns(PIPELINE_COLUMNS)
            .values_panic([
                id_value(backend, pipeline.id.0).into(),
                pipeline.description.clone().into(),
                id_value(backend, pipeline.space_id.0).into(),
                pipeline.uid.clone().into(),
                pipeline.seq.into(),
                opt_id_value(backend, pipeline.repo_id.map(|id| id.0)).into(),
                pipeline.repo_type.clone().into(),
                pipeline.repo_name.clone().into(),
                pipeline.default_branch.clone().into(),
                pipeline.config_path.clone().into(),
                now.into(),
                now.into(),
                pipeline.version.into(),
            ])
            .to_owned();
        exec_unique(self.connection(), &insert, || {
            StoreError::conflict(format!(
                "pipeline '{}' already exists in space {}",
                pipeline.uid, pipeline.space_id
            ))
        })
        .await?;
        Ok(pipeline)
    }

    async fn find_pipeline(&self, id: PipelineId) -> StoreResult<Pipeline> {
        self.read_pipeline(self.connection(), id).await
    }

    async fn find_pipeline_by_uid(&self, space: SpaceId, uid: &str) -> StoreResult<Pipeline> {
        let select = select_pipelines()
            .and_where(Expr::col(Pipelines::PipelineSpaceId).eq(id_value(self.backend(), space.0)))
            .and_where(Expr::col(Pipelines::PipelineUid).eq(uid))
            .limit(1)
            .to_owned();
        let row = query_one(self.connection(), &select)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("pipeline '{uid}' in space {space}")))?;
        pipeline_from_row(&row)
    }

    async fn update_pipeline(&self, pipeline: &mut Pipeline) -> StoreResult<()> {
        self.compare_and_update(pipeline).await
    }

    async fn update_pipeline_opt_lock<F>(
        &self,
        pipeline: Pipeline,
        cancel: &CancelToken,
        mutate: F,
    ) -> StoreResult<Pipeline>
    where
        F: FnMut(&mut Pipeline) -> StoreResult<()> + Send,
    {
        mutate_with_retry(self, pipeline, self.retry_policy(), cancel, mutate).await
    }

    async fn increment_pipeline_seq(
        &self,
        pipeline: Pipeline,
        cancel: &CancelToken,
    ) -> StoreResult<Pipeline> {
        increment_sequence(self, pipeline, self.retry_policy(), cancel).await
    }

    async fn list_pipelines(
        &self,
        space: SpaceId,
        filter: &ListQueryFilter,
    ) -> StoreResult<Vec<Pipeline>> {
        let mut select = select_pipelines();
        self.apply_pipeline_filter(&mut select, space, filter);
        select
            .order_by(Pipelines::PipelineUid, SortOrder::Asc)
            .limit(page_limit(filter.size))
            .offset(page_offset(filter.page, filter.size));
        query_all(self.connection(), &select)
            .await?
            .iter()
            .map(pipeline_from_row)
            .collect()
    }

    async fn count_pipelines(&self, space: SpaceId, filter: &ListQueryFilter) -> StoreResult<u64> {
        let mut select = Query::select()
            .from(Pipelines::Table)
            .expr_as(Expr::col(Pipelines::PipelineId).count(), Alias::new("count"))
            .to_owned();
        self.apply_pipeline_filter(&mut select, space, filter);
        count_from(query_one(self.connection(), &select).await?)
    }

    async fn delete_pipeline(&self, id: PipelineId) -> StoreResult<()> {
        let delete = Query::delete()
            .from_table(Pipelines::Table)
            .and_where(Expr::col(Pipelines::PipelineId).eq(id_value(self.backend(), id.0)))
            .to_owned();
        if exec(self.connection(), &delete).await? == 0 {
            return Err(StoreError::not_found(format!("pipeline {id}")));
        }
        Ok(())
    }

    async fn delete_pipeline_by_uid(&self, space: SpaceId, uid: &str) -> StoreResult<()> {
        let delete = Query::delete()
            .from_table(Pipelines::Table)
            .and_where(Expr::col(Pipelines::PipelineSpaceId).eq(id_value(self.backend(), space.0)))
            .and_where(Expr::col(Pipelines::PipelineUid).eq(uid))
            .to_owned();
        if exec(self.connection(), &delete).await? == 0 {
            return Err(StoreError::not_found(format!("pipeline '{uid}' in space {space}")));
        }
        Ok(())
    }
}
