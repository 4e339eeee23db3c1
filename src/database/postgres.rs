use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::postgres::{PgArguments, PgConnectOptions, PgRow};
use sqlx::query::Query;
use sqlx::types::Json;
use sqlx::{Column, Connection, PgConnection, Postgres, Row as _, TypeInfo};
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

use crate::database::{
    log_statement, parse_dsn, prepare_fetch, prepare_fetchrow, prepare_update, widen_f32,
    Database, DatabaseAdapter, DatabaseError, DatabaseResult, DatabaseType, DatabaseValue,
    PostgresAdapter, Row, ValueKind,
};

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

/// PostgreSQL driver owning a single connection
pub struct PostgresDatabase {
    dsn: String,
    debug: bool,
    conn: Option<PgConnection>,
    adapter: PostgresAdapter,
}

impl PostgresDatabase {
    /// Create a disconnected driver
    pub fn new(dsn: impl Into<String>, debug: bool) -> Self {
        Self {
            dsn: dsn.into(),
            debug,
            conn: None,
            adapter: PostgresAdapter::new(),
        }
    }

    fn connection(&mut self) -> DatabaseResult<&mut PgConnection> {
        self.conn.as_mut().ok_or_else(DatabaseError::not_established)
    }
}

fn connect_options(dsn: &str) -> DatabaseResult<PgConnectOptions> {
    let url = parse_dsn(dsn, DatabaseType::Postgres)?;
    PgConnectOptions::from_str(url.as_str())
        .map_err(|e| DatabaseError::Configuration(format!("invalid postgres DSN: {}", e)))
}

fn bind_params<'q>(mut query: PgQuery<'q>, params: &[DatabaseValue]) -> PgQuery<'q> {
    for param in params {
        query = bind_value(query, param.clone());
    }
    query
}

fn bind_value(query: PgQuery<'_>, value: DatabaseValue) -> PgQuery<'_> {
    match value {
        DatabaseValue::Null => query.bind(None::<String>),
        DatabaseValue::TypedNull(kind) => match kind {
            ValueKind::Boolean => query.bind(None::<bool>),
            ValueKind::Integer => query.bind(None::<i64>),
            ValueKind::Float => query.bind(None::<f64>),
            ValueKind::Text => query.bind(None::<String>),
            ValueKind::Blob => query.bind(None::<Vec<u8>>),
            ValueKind::Json => query.bind(None::<Json<serde_json::Value>>),
            ValueKind::Timestamp => query.bind(None::<NaiveDateTime>),
            ValueKind::Date => query.bind(None::<NaiveDate>),
            ValueKind::Uuid => query.bind(None::<Uuid>),
        },
        DatabaseValue::Boolean(b) => query.bind(b),
        DatabaseValue::Integer(i) => query.bind(i),
        DatabaseValue::Float(f) => query.bind(f),
        DatabaseValue::Text(s) => query.bind(s),
        DatabaseValue::Blob(b) => query.bind(b),
        DatabaseValue::Json(v) => query.bind(Json(v)),
        DatabaseValue::Timestamp(t) => query.bind(t),
        DatabaseValue::Date(d) => query.bind(d),
        DatabaseValue::Uuid(u) => query.bind(u),
        array @ DatabaseValue::Array(_) => query.bind(Json(array.to_json())),
    }
}

fn column_value<'r, T>(
    row: &'r PgRow,
    index: usize,
    wrap: impl FnOnce(T) -> DatabaseValue,
) -> Result<DatabaseValue, sqlx::Error>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    Ok(row
        .try_get::<Option<T>, _>(index)?
        .map_or(DatabaseValue::Null, wrap))
}

/// Convert a driver row into a [`Row`], choosing the decoder from the
/// column's reported type.
fn decode_row(row: &PgRow) -> DatabaseResult<Row> {
    let mut decoded = Row::with_capacity(row.len());
    for column in row.columns() {
        let index = column.ordinal();
        let type_name = column.type_info().name();
        let value = match type_name {
            "BOOL" => column_value::<bool>(row, index, DatabaseValue::Boolean),
            "INT2" => column_value::<i16>(row, index, |v| DatabaseValue::Integer(v.into())),
            "INT4" => column_value::<i32>(row, index, |v| DatabaseValue::Integer(v.into())),
            "INT8" => column_value::<i64>(row, index, DatabaseValue::Integer),
            "FLOAT4" => column_value::<f32>(row, index, |v| DatabaseValue::Float(widen_f32(v))),
            "FLOAT8" => column_value::<f64>(row, index, DatabaseValue::Float),
            "TEXT" | "VARCHAR" | "BPCHAR" | "CHAR" | "NAME" | "CITEXT" => {
                column_value::<String>(row, index, DatabaseValue::Text)
            }
            "BYTEA" => column_value::<Vec<u8>>(row, index, DatabaseValue::Blob),
            "JSON" | "JSONB" => column_value::<serde_json::Value>(row, index, DatabaseValue::Json),
            "TIMESTAMP" => column_value::<NaiveDateTime>(row, index, DatabaseValue::Timestamp),
            "TIMESTAMPTZ" => column_value::<DateTime<Utc>>(row, index, |v| {
                DatabaseValue::Timestamp(v.naive_utc())
            }),
            "DATE" => column_value::<NaiveDate>(row, index, DatabaseValue::Date),
            "UUID" => column_value::<Uuid>(row, index, DatabaseValue::Uuid),
            other => {
                return Err(DatabaseError::Serialization(format!(
                    "unsupported postgres column type {} for column {}",
                    other,
                    column.name()
                )));
            }
        }
        .map_err(|e| {
            DatabaseError::Serialization(format!(
                "Failed to decode column {}: {}",
                column.name(),
                e
            ))
        })?;
        decoded.push(column.name(), value);
    }
    Ok(decoded)
}

fn query_error(e: sqlx::Error) -> DatabaseError {
    DatabaseError::Query(e.to_string())
}

#[async_trait]
impl Database for PostgresDatabase {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Postgres
    }

    fn adapter(&self) -> &dyn DatabaseAdapter {
        &self.adapter
    }

    fn dsn(&self) -> &str {
        &self.dsn
    }

    fn set_dsn(&mut self, dsn: &str) {
        self.dsn = dsn.to_string();
    }

    fn is_debug(&self) -> bool {
        self.debug
    }

    fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    async fn connect(&mut self) -> DatabaseResult<()> {
        if self.conn.is_some() {
            return Err(DatabaseError::already_established());
        }
        let options = connect_options(&self.dsn)?;
        let conn = PgConnection::connect_with(&options)
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;
        info!(database = "postgres", "connection established");
        self.conn = Some(conn);
        Ok(())
    }

    async fn close(&mut self) -> DatabaseResult<()> {
        let conn = self.conn.take().ok_or_else(DatabaseError::already_closed)?;
        conn.close()
            .await
            .map_err(|e| DatabaseError::Connection(format!("Failed to close connection: {}", e)))?;
        info!(database = "postgres", "connection closed");
        Ok(())
    }

    async fn execute(&mut self, query: &str, params: &[DatabaseValue]) -> DatabaseResult<u64> {
        let debug = self.debug;
        let conn = self.connection()?;
        log_statement(debug, DatabaseType::Postgres, query, params);

        bind_params(sqlx::query(query), params)
            .execute(&mut *conn)
            .await
            .map(|r| r.rows_affected())
            .map_err(query_error)
    }

    async fn fetch(&mut self, query: &str, params: &[DatabaseValue]) -> DatabaseResult<Vec<Row>> {
        let debug = self.debug;
        let conn = self.connection()?;
        let query = prepare_fetch(query)?;
        log_statement(debug, DatabaseType::Postgres, &query, params);

        let rows = bind_params(sqlx::query(&query), params)
            .fetch_all(&mut *conn)
            .await
            .map_err(query_error)?;
        rows.iter().map(decode_row).collect()
    }

    async fn fetchrow(
        &mut self,
        query: &str,
        params: &[DatabaseValue],
    ) -> DatabaseResult<Option<Row>> {
        let debug = self.debug;
        let conn = self.connection()?;
        let query = prepare_fetchrow(query, true)?;
        log_statement(debug, DatabaseType::Postgres, &query, params);

        let row = bind_params(sqlx::query(&query), params)
            .fetch_optional(&mut *conn)
            .await
            .map_err(query_error)?;
        row.as_ref().map(decode_row).transpose()
    }

    async fn update(&mut self, query: &str, params: &[DatabaseValue]) -> DatabaseResult<u64> {
        let debug = self.debug;
        let conn = self.connection()?;
        let query = prepare_update(query)?;
        log_statement(debug, DatabaseType::Postgres, &query, params);

        bind_params(sqlx::query(&query), params)
            .execute(&mut *conn)
            .await
            .map(|r| r.rows_affected())
            .map_err(query_error)
    }
}
