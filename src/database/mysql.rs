use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::mysql::{MySqlArguments, MySqlConnectOptions, MySqlRow};
use sqlx::query::Query;
use sqlx::types::Json;
use sqlx::{Column, Connection, MySql, MySqlConnection, Row as _, TypeInfo};
use std::str::FromStr;
use tracing::info;

use crate::database::{
    log_statement, parse_dsn, prepare_fetch, prepare_fetchrow, prepare_update, widen_f32,
    Database, DatabaseAdapter, DatabaseError, DatabaseResult, DatabaseType, DatabaseValue,
    MySqlAdapter, Row, ValueKind,
};

type MySqlQuery<'q> = Query<'q, MySql, MySqlArguments>;

/// MySQL driver owning a single connection
pub struct MySqlDatabase {
    dsn: String,
    debug: bool,
    conn: Option<MySqlConnection>,
    adapter: MySqlAdapter,
}

impl MySqlDatabase {
    /// Create a disconnected driver
    pub fn new(dsn: impl Into<String>, debug: bool) -> Self {
        Self {
            dsn: dsn.into(),
            debug,
            conn: None,
            adapter: MySqlAdapter::new(),
        }
    }

    fn connection(&mut self) -> DatabaseResult<&mut MySqlConnection> {
        self.conn.as_mut().ok_or_else(DatabaseError::not_established)
    }
}

fn connect_options(dsn: &str) -> DatabaseResult<MySqlConnectOptions> {
    let mut url = parse_dsn(dsn, DatabaseType::MySql)?;
    // sqlx only understands the mysql scheme
    if url.scheme() != "mysql" && url.set_scheme("mysql").is_err() {
        return Err(DatabaseError::Configuration(format!(
            "cannot rewrite DSN scheme '{}'",
            url.scheme()
        )));
    }
    MySqlConnectOptions::from_str(url.as_str())
        .map_err(|e| DatabaseError::Configuration(format!("invalid mysql DSN: {}", e)))
}

fn bind_params<'q>(mut query: MySqlQuery<'q>, params: &[DatabaseValue]) -> MySqlQuery<'q> {
    for param in params {
        query = bind_value(query, param.clone());
    }
    query
}

fn bind_value(query: MySqlQuery<'_>, value: DatabaseValue) -> MySqlQuery<'_> {
    match value {
        DatabaseValue::Null => query.bind(None::<String>),
        DatabaseValue::TypedNull(kind) => match kind {
            ValueKind::Boolean => query.bind(None::<bool>),
            ValueKind::Integer => query.bind(None::<i64>),
            ValueKind::Float => query.bind(None::<f64>),
            ValueKind::Text | ValueKind::Uuid => query.bind(None::<String>),
            ValueKind::Blob => query.bind(None::<Vec<u8>>),
            ValueKind::Json => query.bind(None::<Json<serde_json::Value>>),
            ValueKind::Timestamp => query.bind(None::<NaiveDateTime>),
            ValueKind::Date => query.bind(None::<NaiveDate>),
        },
        DatabaseValue::Boolean(b) => query.bind(b),
        DatabaseValue::Integer(i) => query.bind(i),
        DatabaseValue::Float(f) => query.bind(f),
        DatabaseValue::Text(s) => query.bind(s),
        DatabaseValue::Blob(b) => query.bind(b),
        DatabaseValue::Json(v) => query.bind(Json(v)),
        DatabaseValue::Timestamp(t) => query.bind(t),
        DatabaseValue::Date(d) => query.bind(d),
        DatabaseValue::Uuid(u) => query.bind(u.to_string()),
        array @ DatabaseValue::Array(_) => query.bind(Json(array.to_json())),
    }
}

fn column_value<'r, T>(
    row: &'r MySqlRow,
    index: usize,
    wrap: impl FnOnce(T) -> DatabaseValue,
) -> Result<DatabaseValue, sqlx::Error>
where
    T: sqlx::Decode<'r, MySql> + sqlx::Type<MySql>,
{
    Ok(row
        .try_get::<Option<T>, _>(index)?
        .map_or(DatabaseValue::Null, wrap))
}

fn unsigned(value: u64) -> DatabaseValue {
    // LAST_INSERT_ID() and COUNT(*) report BIGINT UNSIGNED
    i64::try_from(value).map_or(DatabaseValue::Float(value as f64), DatabaseValue::Integer)
}

fn decode_row(row: &MySqlRow) -> DatabaseResult<Row> {
    let mut decoded = Row::with_capacity(row.len());
    for column in row.columns() {
        let index = column.ordinal();
        let type_name = column.type_info().name();
        let value = match type_name {
            "NULL" => Ok(DatabaseValue::Null),
            "BOOLEAN" => column_value::<bool>(row, index, DatabaseValue::Boolean),
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
                column_value::<i64>(row, index, DatabaseValue::Integer)
            }
            "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
            | "BIGINT UNSIGNED" => column_value::<u64>(row, index, unsigned),
            "FLOAT" => column_value::<f32>(row, index, |v| DatabaseValue::Float(widen_f32(v))),
            "DOUBLE" => column_value::<f64>(row, index, DatabaseValue::Float),
            "CHAR" | "VARCHAR" | "TINYTEXT" | "TEXT" | "MEDIUMTEXT" | "LONGTEXT" | "ENUM" => {
                column_value::<String>(row, index, DatabaseValue::Text)
            }
            "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" => {
                column_value::<Vec<u8>>(row, index, DatabaseValue::Blob)
            }
            "DATETIME" | "TIMESTAMP" => {
                column_value::<NaiveDateTime>(row, index, DatabaseValue::Timestamp)
            }
            "DATE" => column_value::<NaiveDate>(row, index, DatabaseValue::Date),
            "JSON" => column_value::<serde_json::Value>(row, index, DatabaseValue::Json),
            other => {
                return Err(DatabaseError::Serialization(format!(
                    "unsupported mysql column type {} for column {}",
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
impl Database for MySqlDatabase {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::MySql
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
        let conn = MySqlConnection::connect_with(&options)
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;
        info!(database = "mysql", "connection established");
        self.conn = Some(conn);
        Ok(())
    }

    async fn close(&mut self) -> DatabaseResult<()> {
        let conn = self.conn.take().ok_or_else(DatabaseError::already_closed)?;
        conn.close()
            .await
            .map_err(|e| DatabaseError::Connection(format!("Failed to close connection: {}", e)))?;
        info!(database = "mysql", "connection closed");
        Ok(())
    }

    async fn execute(&mut self, query: &str, params: &[DatabaseValue]) -> DatabaseResult<u64> {
        let debug = self.debug;
        let conn = self.connection()?;
        log_statement(debug, DatabaseType::MySql, query, params);

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
        log_statement(debug, DatabaseType::MySql, &query, params);

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
        let query = prepare_fetchrow(query, false)?;
        log_statement(debug, DatabaseType::MySql, &query, params);

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
        log_statement(debug, DatabaseType::MySql, &query, params);

        bind_params(sqlx::query(&query), params)
            .execute(&mut *conn)
            .await
            .map(|r| r.rows_affected())
            .map_err(query_error)
    }
}
