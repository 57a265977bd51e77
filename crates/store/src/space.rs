use async_trait::async_trait;
use sea_orm::sea_query::{Alias, Expr, Query, SelectStatement};
use sea_orm::{ConnectionTrait, QueryResult};

use gitspace_core::{
    CreateSpaceInput, MoveInput, PathTarget, PathTargetType, PrincipalId, Space, SpaceApi,
    SpaceId, StoreError, StoreResult, paths,
};

use crate::db::{Repositories, Spaces};
use crate::sql::{
    count_from, exec, id_value, opt_id_value, query_one, read_bool, read_i64, read_id,
    read_opt_id, read_string,
};
use crate::store::{FAILPOINT_AFTER_ENTITY_INSERT, GitspaceStore, commit};

const SPACE_COLUMNS: [Spaces; 8] = [
    Spaces::SpaceId,
    Spaces::SpaceParentId,
    Spaces::SpaceUid,
    Spaces::SpaceDescription,
    Spaces::SpaceIsPublic,
    Spaces::SpaceCreatedBy,
    Spaces::SpaceCreated,
    Spaces::SpaceUpdated,
];

fn select_spaces() -> SelectStatement {
    Query::select()
        .from(Spaces::Table)
        .columns(SPACE_COLUMNS)
        .to_owned()
}

fn space_from_row(row: &QueryResult, path: String) -> StoreResult<Space> {
    Ok(Space {
        id: SpaceId(read_id(row, Spaces::SpaceId)?),
        parent_id: read_opt_id(row, Spaces::SpaceParentId)?.map(SpaceId),
        uid: read_string(row, Spaces::SpaceUid)?,
        path,
        description: read_string(row, Spaces::SpaceDescription)?,
        is_public: read_bool(row, Spaces::SpaceIsPublic)?,
        created_by: PrincipalId(read_id(row, Spaces::SpaceCreatedBy)?),
        created: read_i64(row, Spaces::SpaceCreated)?,
        updated: read_i64(row, Spaces::SpaceUpdated)?,
    })
}

impl GitspaceStore {
    async fn read_space<C: ConnectionTrait>(&self, conn: &C, id: SpaceId) -> StoreResult<Space> {
        let select = select_spaces()
            .and_where(Expr::col(Spaces::SpaceId).eq(id_value(self.backend(), id.0)))
            .limit(1)
            .to_owned();
        let row = query_one(conn, &select)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("space {id}")))?;
        let primary = self
            .paths()
            .find_primary(conn, PathTarget::space(id))
            .await?;
        space_from_row(&row, primary.value)
    }

    /// The primary path of `parent`, which new children are placed under.
    async fn parent_space_path<C: ConnectionTrait>(
        &self,
        conn: &C,
        parent: SpaceId,
    ) -> StoreResult<String> {
        let primary = self
            .paths()
            .find_primary(conn, PathTarget::space(parent))
            .await
            .map_err(|err| err.context(format!("parent space {parent}")))?;
        Ok(primary.value)
    }

    async fn count_children<C: ConnectionTrait>(&self, conn: &C, id: SpaceId) -> StoreResult<u64> {
        let backend = self.backend();
        let spaces = Query::select()
            .from(Spaces::Table)
            .expr_as(Expr::col(Spaces::SpaceId).count(), Alias::new("count"))
            .and_where(Expr::col(Spaces::SpaceParentId).eq(id_value(backend, id.0)))
            .to_owned();
        let repos = Query::select()
            .from(Repositories::Table)
            .expr_as(Expr::col(Repositories::RepoId).count(), Alias::new("count"))
            .and_where(Expr::col(Repositories::RepoParentId).eq(id_value(backend, id.0)))
            .to_owned();
        Ok(count_from(query_one(conn, &spaces).await?)?
            + count_from(query_one(conn, &repos).await?)?)
    }
}

#[async_trait]
impl SpaceApi for GitspaceStore {
    async fn create_space(&self, input: CreateSpaceInput) -> StoreResult<Space> {
        self.path_policy().validate_segment(&input.uid)?;
        let tx = self.begin().await?;
        let path = match input.parent_id {
            Some(parent) => {
                let parent_path = self.parent_space_path(&tx, parent).await?;
                paths::concatenate(&parent_path, &input.uid)
            }
            None => input.uid.clone(),
        };
        let now = self.now();
        let space = Space {
            id: SpaceId::new(),
            parent_id: input.parent_id,
            uid: input.uid,
            path,
            description: input.description,
            is_public: input.is_public,
            created_by: input.created_by,
            created: now,
            updated: now,
        };
        let backend = self.backend();
        let insert = Query::insert()
            .into_table(Spaces::Table)
            .columns(SPACE_COLUMNS)
            .values_panic([
                id_value(backend, space.id.0).into(),
                opt_id_value(backend, space.parent_id.map(|id| id.0)).into(),
                space.uid.clone().into(),
                space.description.clone().into(),
                space.is_public.into(),
                id_value(backend, space.created_by.0).into(),
                now.into(),
                now.into(),
            ])
            .to_owned();
        exec(&tx, &insert).await?;
        self.paths()
            .create_primary(&tx, PathTarget::space(space.id), &space.path, space.created_by)
            .await?;
        self.maybe_failpoint(FAILPOINT_AFTER_ENTITY_INSERT)?;
        commit(tx, "create space").await?;
        Ok(space)
    }

    async fn find_space(&self, id: SpaceId) -> StoreResult<Space> {
        self.read_space(self.connection(), id).await
    }

    async fn find_space_by_path(&self, value: &str) -> StoreResult<Space> {
        let path = self
            .paths()
            .find_by_value(self.connection(), value)
            .await?;
        if path.target_type != PathTargetType::Space {
            return Err(StoreError::not_found(format!("space at '{value}'")));
        }
        self.find_space(SpaceId(path.target_id)).await
    }

    async fn move_space(&self, id: SpaceId, input: MoveInput) -> StoreResult<Space> {
        let op = format!("move space {id}");
        let tx = self.begin().await?;
        let space = self.read_space(&tx, id).await?;
        let new_parent_path = match input.new_parent_id {
            Some(parent) if parent == id => {
                return Err(StoreError::invalid_path(format!(
                    "space '{}' cannot become its own parent",
                    space.path
                )));
            }
            Some(parent) => Some(self.parent_space_path(&tx, parent).await?),
            None => None,
        };
        let primary = self
            .paths()
            .move_primary(
                &tx,
                PathTarget::space(id),
                new_parent_path.as_deref(),
                &input.new_uid,
                input.keep_as_alias,
                input.actor,
            )
            .await
            .map_err(|err| err.context(&op))?;
        let now = self.now();
        let backend = self.backend();
        let update = Query::update()
            .table(Spaces::Table)
            .value(Spaces::SpaceUid, input.new_uid.clone())
            .value(
                Spaces::SpaceParentId,
                opt_id_value(backend, input.new_parent_id.map(|id| id.0)),
            )
            .value(Spaces::SpaceUpdated, now)
            .and_where(Expr::col(Spaces::SpaceId).eq(id_value(backend, id.0)))
            .to_owned();
        exec(&tx, &update).await?;
        commit(tx, &op).await?;
        Ok(Space {
            parent_id: input.new_parent_id,
            uid: input.new_uid,
            path: primary.value,
            updated: now,
            ..space
        })
    }

    async fn update_space(&self, space: &Space) -> StoreResult<Space> {
        let backend = self.backend();
        let update = Query::update()
            .table(Spaces::Table)
            .value(Spaces::SpaceDescription, space.description.clone())
            .value(Spaces::SpaceIsPublic, space.is_public)
            .value(Spaces::SpaceUpdated, self.now())
            .and_where(Expr::col(Spaces::SpaceId).eq(id_value(backend, space.id.0)))
            .to_owned();
        if exec(self.connection(), &update).await? == 0 {
            return Err(StoreError::not_found(format!("space {}", space.id)));
        }
        self.find_space(space.id).await
    }

    async fn delete_space(&self, id: SpaceId) -> StoreResult<()> {
        let tx = self.begin().await?;
        let space = self.read_space(&tx, id).await?;
        let children = self.count_children(&tx, id).await?;
        if children > 0 {
            return Err(StoreError::conflict(format!(
                "space '{}' still contains {children} spaces or repositories",
                space.path
            )));
        }
        self.paths().delete_all(&tx, PathTarget::space(id)).await?;
        let delete = Query::delete()
            .from_table(Spaces::Table)
            .and_where(Expr::col(Spaces::SpaceId).eq(id_value(self.backend(), id.0)))
            .to_owned();
        exec(&tx, &delete).await?;
        commit(tx, &format!("delete space {id}")).await
    }
}
