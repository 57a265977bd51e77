//! The shared path table: one primary and any number of alias rows per
//! space or repository, unique on the normalized value.
//!
//! Writes that must commit together with an entity row (`create_primary`,
//! `move_primary`, `delete_all`) only accept a [`DatabaseTransaction`].

use async_trait::async_trait;
use log::{debug, info};
use sea_orm::sea_query::{
    Alias, Expr, LikeExpr, Order as SortOrder, Query, SelectStatement,
};
use sea_orm::{ConnectionTrait, DatabaseTransaction, QueryResult};

use gitspace_core::filter::{limit as page_limit, offset as page_offset};
use gitspace_core::{
    Path, PathApi, PathAttr, PathFilter, PathId, PathTarget, PathTargetType, PrincipalId,
    StoreError, StoreResult, paths,
};

use crate::db::Paths;
use crate::sql::{
    count_from, exec, exec_unique, id_value, query_all, query_one, read_bool, read_i64, read_id,
    read_string,
};
use crate::store::{
    FAILPOINT_AFTER_CASCADE_REWRITE, FAILPOINT_AFTER_PRIMARY_PATH_REPLACE, GitspaceStore,
};

pub(crate) const PATH_COLUMNS: [Paths; 9] = [
    Paths::PathId,
    Paths::PathTargetType,
    Paths::PathTargetId,
    Paths::PathIsAlias,
    Paths::PathValue,
    Paths::PathValueUnique,
    Paths::PathCreatedBy,
    Paths::PathCreated,
    Paths::PathUpdated,
];

pub(crate) fn select_paths() -> SelectStatement {
    Query::select()
        .from(Paths::Table)
        .columns(PATH_COLUMNS)
        .to_owned()
}

pub(crate) fn path_from_row(row: &QueryResult) -> StoreResult<Path> {
    let raw_type = read_string(row, Paths::PathTargetType)?;
    let target_type = PathTargetType::parse(&raw_type)
        .ok_or_else(|| StoreError::storage(format!("unknown path target type '{raw_type}'")))?;
    Ok(Path {
        id: PathId(read_id(row, Paths::PathId)?),
        target_type,
        target_id: read_id(row, Paths::PathTargetId)?,
        is_alias: read_bool(row, Paths::PathIsAlias)?,
        value: read_string(row, Paths::PathValue)?,
        value_unique: read_string(row, Paths::PathValueUnique)?,
        created_by: PrincipalId(read_id(row, Paths::PathCreatedBy)?),
        created: read_i64(row, Paths::PathCreated)?,
        updated: read_i64(row, Paths::PathUpdated)?,
    })
}

pub struct PathStore<'a> {
    store: &'a GitspaceStore,
}

impl<'a> PathStore<'a> {
    pub(crate) fn new(store: &'a GitspaceStore) -> Self {
        Self { store }
    }

    pub(crate) fn transform(&self, value: &str) -> StoreResult<String> {
        self.store.transformation().transform(value)
    }

    fn with_target(&self, select: &mut SelectStatement, target: PathTarget) {
        select
            .and_where(Expr::col(Paths::PathTargetType).eq(target.kind.as_str()))
            .and_where(
                Expr::col(Paths::PathTargetId).eq(id_value(self.store.backend(), target.id)),
            );
    }

    pub async fn find<C: ConnectionTrait>(&self, conn: &C, id: PathId) -> StoreResult<Path> {
        let select = select_paths()
            .and_where(Expr::col(Paths::PathId).eq(id_value(self.store.backend(), id.0)))
            .limit(1)
            .to_owned();
        let row = query_one(conn, &select)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("path {id}")))?;
        path_from_row(&row)
    }

    pub async fn find_primary<C: ConnectionTrait>(
        &self,
        conn: &C,
        target: PathTarget,
    ) -> StoreResult<Path> {
        let mut select = select_paths();
        self.with_target(&mut select, target);
        select
            .and_where(Expr::col(Paths::PathIsAlias).eq(false))
            .limit(1);
        let row = query_one(conn, &select)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("primary path of {target}")))?;
        path_from_row(&row)
    }

    /// Looks `value` up by its normalized form; aliases resolve like primaries.
    pub async fn find_by_value<C: ConnectionTrait>(
        &self,
        conn: &C,
        value: &str,
    ) -> StoreResult<Path> {
        let value_unique = self.transform(value)?;
        let select = select_paths()
            .and_where(Expr::col(Paths::PathValueUnique).eq(value_unique))
            .limit(1)
            .to_owned();
        let row = query_one(conn, &select)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("path '{value}'")))?;
        path_from_row(&row)
    }

    pub async fn list<C: ConnectionTrait>(
        &self,
        conn: &C,
        target: PathTarget,
        filter: &PathFilter,
    ) -> StoreResult<Vec<Path>> {
        let mut select = select_paths();
        self.with_target(&mut select, target);
        let order = if filter.order.is_descending() {
            SortOrder::Desc
        } else {
            SortOrder::Asc
        };
        match filter.sort {
            PathAttr::Created => select.order_by(Paths::PathCreated, order),
            PathAttr::Updated => select.order_by(Paths::PathUpdated, order),
            PathAttr::None | PathAttr::Path => select.order_by(Paths::PathValue, order),
        };
        select
            .limit(page_limit(filter.size))
            .offset(page_offset(filter.page, filter.size));
        query_all(conn, &select)
            .await?
            .iter()
            .map(path_from_row)
            .collect()
    }

    pub async fn count<C: ConnectionTrait>(&self, conn: &C, target: PathTarget) -> StoreResult<u64> {
        let mut select = Query::select()
            .from(Paths::Table)
            .expr_as(Expr::col(Paths::PathId).count(), Alias::new("count"))
            .to_owned();
        self.with_target(&mut select, target);
        count_from(query_one(conn, &select).await?)
    }

    async fn insert<C: ConnectionTrait>(
        &self,
        conn: &C,
        target: PathTarget,
        value: &str,
        is_alias: bool,
        actor: PrincipalId,
    ) -> StoreResult<Path> {
        self.store.path_policy().validate_path(value)?;
        let value_unique = self.transform(value)?;
        let now = self.store.now();
        let path = Path {
            id: PathId::new(),
            target_type: target.kind,
            target_id: target.id,
            is_alias,
            value: value.to_string(),
            value_unique,
            created_by: actor,
            created: now,
            updated: now,
        };
        let backend = self.store.backend();
        let insert = Query::insert()
            .into_table(Paths::Table)
            .columns(PATH_COLUMNS)
            .values_panic([
                id_value(backend, path.id.0).into(),
                path.target_type.as_str().into(),
                id_value(backend, path.target_id).into(),
                path.is_alias.into(),
                path.value.clone().into(),
                path.value_unique.clone().into(),
                id_value(backend, path.created_by.0).into(),
                now.into(),
                now.into(),
            ])
            .to_owned();
        exec_unique(conn, &insert, || StoreError::duplicate_path(value)).await?;
        Ok(path)
    }

    /// Inserts the first, non-alias path of `target`.
    pub async fn create_primary(
        &self,
        tx: &DatabaseTransaction,
        target: PathTarget,
        value: &str,
        actor: PrincipalId,
    ) -> StoreResult<Path> {
        match self.find_primary(tx, target).await {
            Ok(existing) => {
                return Err(StoreError::conflict(format!(
                    "{target} already has primary path '{}'",
                    existing.value
                )));
            }
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err),
        }
        self.insert(tx, target, value, false, actor).await
    }

    /// Inserts an alias. Whether `target` has a primary path is not checked.
    pub async fn create_alias<C: ConnectionTrait>(
        &self,
        conn: &C,
        target: PathTarget,
        value: &str,
        actor: PrincipalId,
    ) -> StoreResult<Path> {
        self.insert(conn, target, value, true, actor).await
    }

    pub async fn delete_alias<C: ConnectionTrait>(
        &self,
        conn: &C,
        target: PathTarget,
        id: PathId,
    ) -> StoreResult<()> {
        let path = self.find(conn, id).await?;
        if path.target() != target {
            return Err(StoreError::not_found(format!("path {id} of {target}")));
        }
        if !path.is_alias {
            return Err(StoreError::validation(format!(
                "path '{}' is the primary path of {target} and cannot be deleted",
                path.value
            )));
        }
        let delete = Query::delete()
            .from_table(Paths::Table)
            .and_where(Expr::col(Paths::PathId).eq(id_value(self.store.backend(), id.0)))
            .to_owned();
        exec(conn, &delete).await?;
        Ok(())
    }

    /// Removes the primary and every alias of `target`.
    pub async fn delete_all(&self, tx: &DatabaseTransaction, target: PathTarget) -> StoreResult<u64> {
        let backend = self.store.backend();
        let delete = Query::delete()
            .from_table(Paths::Table)
            .and_where(Expr::col(Paths::PathTargetType).eq(target.kind.as_str()))
            .and_where(Expr::col(Paths::PathTargetId).eq(id_value(backend, target.id)))
            .to_owned();
        let removed = exec(tx, &delete).await?;
        debug!("deleted {removed} paths of {target}");
        Ok(removed)
    }

    /// Gives `target` the primary path `new_parent/new_segment` and rewrites
    /// every path below its old primary. With `keep_as_alias` the old primary
    /// stays resolvable as an alias; descendants are never aliased.
    pub async fn move_primary(
        &self,
        tx: &DatabaseTransaction,
        target: PathTarget,
        new_parent: Option<&str>,
        new_segment: &str,
        keep_as_alias: bool,
        actor: PrincipalId,
    ) -> StoreResult<Path> {
        let old = self.find_primary(tx, target).await?;
        let new_value = match new_parent {
            Some(parent) => paths::concatenate(parent, new_segment),
            None => new_segment.to_string(),
        };
        if old.value == new_value {
            return Err(StoreError::no_change(new_value));
        }
        self.store.path_policy().validate_path(&new_value)?;
        let new_unique = self.transform(&new_value)?;
        if paths::is_descendant(&new_unique, &old.value_unique) {
            return Err(StoreError::invalid_path(format!(
                "cannot move '{}' below itself to '{new_value}'",
                old.value
            )));
        }

        let backend = self.store.backend();
        let now = self.store.now();
        let old_id = id_value(backend, old.id.0);
        let primary = if new_unique == old.value_unique {
            // Same normalized value: an alias would collide with the new primary.
            let update = Query::update()
                .table(Paths::Table)
                .value(Paths::PathValue, new_value.clone())
                .value(Paths::PathUpdated, now)
                .and_where(Expr::col(Paths::PathId).eq(old_id))
                .to_owned();
            exec(tx, &update).await?;
            Path {
                value: new_value.clone(),
                updated: now,
                ..old.clone()
            }
        } else {
            if keep_as_alias {
                let update = Query::update()
                    .table(Paths::Table)
                    .value(Paths::PathIsAlias, true)
                    .value(Paths::PathUpdated, now)
                    .and_where(Expr::col(Paths::PathId).eq(old_id))
                    .to_owned();
                exec(tx, &update).await?;
            } else {
                let delete = Query::delete()
                    .from_table(Paths::Table)
                    .and_where(Expr::col(Paths::PathId).eq(old_id))
                    .to_owned();
                exec(tx, &delete).await?;
            }
            self.insert(tx, target, &new_value, false, actor).await?
        };
        self.store
            .maybe_failpoint(FAILPOINT_AFTER_PRIMARY_PATH_REPLACE)?;

        let rewritten = self.rewrite_descendants(tx, &old.value, &new_value).await?;
        self.store.maybe_failpoint(FAILPOINT_AFTER_CASCADE_REWRITE)?;
        info!(
            "moved {target} from '{}' to '{new_value}' (alias kept: {keep_as_alias}, {rewritten} descendant paths rewritten)",
            old.value
        );
        Ok(primary)
    }

    /// Replaces the `old_prefix` ancestor of every path below it with
    /// `new_prefix`, recomputing normalized values. Returns the rows rewritten.
    pub async fn rewrite_descendants(
        &self,
        tx: &DatabaseTransaction,
        old_prefix: &str,
        new_prefix: &str,
    ) -> StoreResult<u64> {
        let select = select_paths()
            .and_where(
                Expr::col(Paths::PathValue)
                    .like(LikeExpr::new(paths::descendant_like_pattern(old_prefix)).escape('\\')),
            )
            .to_owned();
        let rows = query_all(tx, &select).await?;
        let backend = self.store.backend();
        let transformation = self.store.transformation();
        let policy = self.store.path_policy();
        let now = self.store.now();
        let mut rewritten = 0;
        for row in &rows {
            let path = path_from_row(row)?;
            // LIKE ignores case on some backends.
            let Some(value) = paths::rewrite_prefix(&path.value, old_prefix, new_prefix) else {
                continue;
            };
            policy
                .validate_path(&value)
                .map_err(|err| err.context(format!("rewrite '{}'", path.value)))?;
            let value_unique = transformation.transform(&value)?;
            let update = Query::update()
                .table(Paths::Table)
                .value(Paths::PathValue, value.clone())
                .value(Paths::PathValueUnique, value_unique)
                .value(Paths::PathUpdated, now)
                .and_where(Expr::col(Paths::PathId).eq(id_value(backend, path.id.0)))
                .to_owned();
            exec_unique(tx, &update, || StoreError::duplicate_path(value.as_str())).await?;
            rewritten += 1;
        }
        debug!(
            "cascade '{old_prefix}' -> '{new_prefix}': {} candidates, {rewritten} rewritten",
            rows.len()
        );
        Ok(rewritten)
    }
}

#[async_trait]
impl PathApi for GitspaceStore {
    async fn find_path(&self, id: PathId) -> StoreResult<Path> {
        self.paths().find(self.connection(), id).await
    }

    async fn find_primary_path(&self, target: PathTarget) -> StoreResult<Path> {
        self.paths().find_primary(self.connection(), target).await
    }

    async fn find_path_by_value(&self, value: &str) -> StoreResult<Path> {
        self.paths().find_by_value(self.connection(), value).await
    }

    async fn list_paths(&self, target: PathTarget, filter: &PathFilter) -> StoreResult<Vec<Path>> {
        self.paths().list(self.connection(), target, filter).await
    }

    async fn count_paths(&self, target: PathTarget) -> StoreResult<u64> {
        self.paths().count(self.connection(), target).await
    }

    async fn create_alias(
        &self,
        target: PathTarget,
        value: &str,
        actor: PrincipalId,
    ) -> StoreResult<Path> {
        self.paths()
            .create_alias(self.connection(), target, value, actor)
            .await
            .map_err(|err| err.context(format!("create alias of {target}")))
    }

    async fn delete_alias(&self, target: PathTarget, id: PathId) -> StoreResult<()> {
        self.paths()
            .delete_alias(self.connection(), target, id)
            .await
    }
}
