use sea_orm::sea_query::{
    self, MysqlQueryBuilder, PostgresQueryBuilder, QueryStatementWriter, SqliteQueryBuilder,
    Value as SeaValue,
};
use sea_orm::{ConnectionTrait, DatabaseBackend, DbErr, QueryResult, SqlErr, Statement};
use uuid::Uuid;

use gitspace_core::{Id, StoreError, StoreResult};

pub(crate) fn id_value(backend: DatabaseBackend, id: Id) -> SeaValue {
    match backend {
        DatabaseBackend::Postgres => SeaValue::Uuid(Some(Box::new(Uuid::from_bytes(id.as_bytes())))),
        DatabaseBackend::MySql => SeaValue::Bytes(Some(Box::new(id.as_vec()))),
        DatabaseBackend::Sqlite => SeaValue::String(Some(Box::new(id.to_uuid_string()))),
    }
}

fn none_id_value(backend: DatabaseBackend) -> SeaValue {
    match backend {
        DatabaseBackend::Postgres => SeaValue::Uuid(None),
        DatabaseBackend::MySql => SeaValue::Bytes(None),
        DatabaseBackend::Sqlite => SeaValue::String(None),
    }
}

pub(crate) fn opt_id_value(backend: DatabaseBackend, id: Option<Id>) -> SeaValue {
    match id {
        Some(id) => id_value(backend, id),
        None => none_id_value(backend),
    }
}

fn bytes_to_id(bytes: Vec<u8>) -> Option<Id> {
    let buf: [u8; 16] = bytes.try_into().ok()?;
    Some(Id::from_bytes(buf))
}

pub(crate) fn read_id(row: &QueryResult, column: impl sea_query::Iden) -> StoreResult<Id> {
    let name = col_name(column);
    if let Ok(value) = row.try_get::<String>("", &name) {
        return Id::from_uuid_str(&value);
    }
    if let Ok(value) = row.try_get::<Uuid>("", &name) {
        return Ok(Id::from_bytes(*value.as_bytes()));
    }
    if let Ok(value) = row.try_get::<Vec<u8>>("", &name) {
        return bytes_to_id(value).ok_or_else(|| StoreError::storage("invalid id length"));
    }
    Err(StoreError::storage(format!("unsupported id format in {name}")))
}

pub(crate) fn read_opt_id(
    row: &QueryResult,
    column: impl sea_query::Iden,
) -> StoreResult<Option<Id>> {
    let name = col_name(column);
    if let Ok(value) = row.try_get::<Option<String>>("", &name) {
        return value.map(|value| Id::from_uuid_str(&value)).transpose();
    }
    if let Ok(value) = row.try_get::<Option<Uuid>>("", &name) {
        return Ok(value.map(|value| Id::from_bytes(*value.as_bytes())));
    }
    if let Ok(value) = row.try_get::<Option<Vec<u8>>>("", &name) {
        return Ok(value.and_then(bytes_to_id));
    }
    Ok(None)
}

pub(crate) fn read_i64(row: &QueryResult, column: impl sea_query::Iden) -> StoreResult<i64> {
    Ok(row.try_get("", &col_name(column))?)
}

pub(crate) fn read_string(row: &QueryResult, column: impl sea_query::Iden) -> StoreResult<String> {
    Ok(row.try_get("", &col_name(column))?)
}

pub(crate) fn read_bool(row: &QueryResult, column: impl sea_query::Iden) -> StoreResult<bool> {
    Ok(row.try_get("", &col_name(column))?)
}

pub(crate) fn col_name(column: impl sea_query::Iden) -> String {
    column.to_string()
}

fn build_stmt<S: QueryStatementWriter>(
    backend: DatabaseBackend,
    stmt: &S,
) -> (String, sea_orm::sea_query::Values) {
    match backend {
        DatabaseBackend::Sqlite => stmt.build(SqliteQueryBuilder),
        DatabaseBackend::Postgres => stmt.build(PostgresQueryBuilder),
        DatabaseBackend::MySql => stmt.build(MysqlQueryBuilder),
    }
}

fn statement<C, S>(conn: &C, stmt: &S) -> Statement
where
    C: ConnectionTrait,
    S: QueryStatementWriter,
{
    let backend = conn.get_database_backend();
    let (sql, values) = build_stmt(backend, stmt);
    Statement::from_sql_and_values(backend, sql, values)
}

/// Executes `stmt` and returns the number of rows it touched.
pub(crate) async fn exec<C, S>(conn: &C, stmt: &S) -> StoreResult<u64>
where
    C: ConnectionTrait,
    S: QueryStatementWriter,
{
    Ok(conn.execute(statement(conn, stmt)).await?.rows_affected())
}

/// Like [`exec`], but a unique-index violation becomes `on_unique()`.
pub(crate) async fn exec_unique<C, S, F>(conn: &C, stmt: &S, on_unique: F) -> StoreResult<u64>
where
    C: ConnectionTrait,
    S: QueryStatementWriter,
    F: FnOnce() -> StoreError,
{
    match conn.execute(statement(conn, stmt)).await {
        Ok(result) => Ok(result.rows_affected()),
        Err(err) if is_unique_violation(&err) => Err(on_unique()),
        Err(err) => Err(err.into()),
    }
}

pub(crate) async fn query_all<C, S>(conn: &C, stmt: &S) -> StoreResult<Vec<QueryResult>>
where
    C: ConnectionTrait,
    S: QueryStatementWriter,
{
    Ok(conn.query_all(statement(conn, stmt)).await?)
}

pub(crate) async fn query_one<C, S>(conn: &C, stmt: &S) -> StoreResult<Option<QueryResult>>
where
    C: ConnectionTrait,
    S: QueryStatementWriter,
{
    Ok(conn.query_one(statement(conn, stmt)).await?)
}

pub(crate) fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

pub(crate) fn count_from(row: Option<QueryResult>) -> StoreResult<u64> {
    let Some(row) = row else {
        return Ok(0);
    };
    let count: i64 = row.try_get("", "count")?;
    Ok(count.max(0) as u64)
}
