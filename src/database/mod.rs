use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::model::FieldType;

pub mod adapters;
pub mod registry;

pub use adapters::{DatabaseAdapter, MySqlAdapter, PostgresAdapter};
pub use registry::ConnectionRegistry;

/// Error type for database operations
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// The underlying server could not be reached or rejected the handshake
    #[error("connection error: {0}")]
    Connection(String),

    /// Operation attempted in the wrong connection state
    #[error("state error: {0}")]
    State(String),

    /// Statement text does not have the shape the called method requires
    #[error("validation error: {0}")]
    Validation(String),

    /// Malformed DSN, unsupported scheme or unsupported database kind
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A field type the backend cannot translate into a column type
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    /// Duplicate alias, unknown alias or empty registry
    #[error("registry error: {0}")]
    Registry(String),

    /// The backend rejected a statement
    #[error("query error: {0}")]
    Query(String),

    /// Row or instance could not be mapped
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl DatabaseError {
    pub(crate) fn not_established() -> Self {
        DatabaseError::State("Connection is not established".to_string())
    }

    pub(crate) fn already_closed() -> Self {
        DatabaseError::State("Connection is already closed".to_string())
    }

    pub(crate) fn already_established() -> Self {
        DatabaseError::State("Connection is already established".to_string())
    }
}

impl From<serde_json::Error> for DatabaseError {
    fn from(err: serde_json::Error) -> Self {
        DatabaseError::Serialization(err.to_string())
    }
}

/// Result type for database operations
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Supported database types
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    /// PostgreSQL and wire-compatible engines
    #[default]
    #[serde(alias = "postgresql")]
    Postgres,
    /// MySQL and MariaDB
    #[serde(alias = "mariadb")]
    MySql,
}

impl DatabaseType {
    /// DSN schemes accepted for this backend.
    pub fn schemes(&self) -> &'static [&'static str] {
        match self {
            DatabaseType::Postgres => &["postgresql", "postgres"],
            DatabaseType::MySql => &["mysql", "mariadb"],
        }
    }

    /// Resolve the backend a DSN scheme belongs to.
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        let scheme = scheme.to_ascii_lowercase();
        [DatabaseType::Postgres, DatabaseType::MySql]
            .into_iter()
            .find(|db_type| db_type.schemes().contains(&scheme.as_str()))
    }
}

impl Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseType::Postgres => write!(f, "postgres"),
            DatabaseType::MySql => write!(f, "mysql"),
        }
    }
}

impl FromStr for DatabaseType {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DatabaseType::from_scheme(s.trim()).ok_or_else(|| {
            DatabaseError::Configuration(format!("Unsupported database type: {}", s))
        })
    }
}

/// Parse a DSN and check that its scheme belongs to `expected`.
pub(crate) fn parse_dsn(dsn: &str, expected: DatabaseType) -> DatabaseResult<Url> {
    let url = Url::parse(dsn)
        .map_err(|e| DatabaseError::Configuration(format!("malformed DSN: {}", e)))?;

    match DatabaseType::from_scheme(url.scheme()) {
        Some(db_type) if db_type == expected => Ok(url),
        _ => Err(DatabaseError::Configuration(format!(
            "unsupported DSN scheme '{}' for {} (expected one of: {})",
            url.scheme(),
            expected,
            expected.schemes().join(", ")
        ))),
    }
}

/// Structured connection settings that render into a DSN
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Type of database to connect to
    pub db_type: DatabaseType,

    /// Database host
    #[serde(default)]
    pub host: Option<String>,

    /// Database port
    #[serde(default)]
    pub port: Option<u16>,

    /// Database name
    pub database: String,

    /// Database username
    #[serde(default)]
    pub username: Option<String>,

    /// Database password
    #[serde(default)]
    pub password: Option<String>,

    /// Additional connection parameters as key-value pairs
    #[serde(default)]
    pub extra_params: HashMap<String, String>,
}

impl DatabaseConfig {
    /// Render the settings as a DSN understood by [`create_database`].
    ///
    /// User name and password are percent-encoded; extra parameters are
    /// appended as a sorted query string so the output is stable.
    pub fn to_dsn(&self) -> DatabaseResult<String> {
        let (scheme, default_port) = match self.db_type {
            DatabaseType::Postgres => ("postgresql", 5432),
            DatabaseType::MySql => ("mysql", 3306),
        };
        let host = self.host.as_deref().unwrap_or("localhost");
        let port = self.port.unwrap_or(default_port);

        let mut url = Url::parse(&format!("{}://{}:{}/", scheme, host, port))
            .map_err(|e| DatabaseError::Configuration(format!("invalid host '{}': {}", host, e)))?;
        url.set_path(&self.database);

        if let Some(username) = &self.username {
            url.set_username(username).map_err(|_| {
                DatabaseError::Configuration("DSN cannot carry a username".to_string())
            })?;
            if let Some(password) = &self.password {
                url.set_password(Some(password)).map_err(|_| {
                    DatabaseError::Configuration("DSN cannot carry a password".to_string())
                })?;
            }
        }

        if !self.extra_params.is_empty() {
            let mut params: Vec<_> = self.extra_params.iter().collect();
            params.sort();
            url.query_pairs_mut().extend_pairs(params);
        }

        Ok(url.to_string())
    }
}

/// Scalar kinds a typed NULL can carry, so backends that type their
/// parameters (Postgres) bind NULL with the column's type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Boolean,
    Integer,
    Float,
    Text,
    Blob,
    Json,
    Timestamp,
    Date,
    Uuid,
}

/// Represents a parameter or column value
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseValue {
    /// Untyped null
    Null,
    /// Null bound with a known column kind
    TypedNull(ValueKind),
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Floating point value
    Float(f64),
    /// String value
    Text(String),
    /// Binary data
    Blob(Vec<u8>),
    /// JSON document (list fields)
    Json(serde_json::Value),
    /// Date and time without zone
    Timestamp(NaiveDateTime),
    /// Calendar date
    Date(NaiveDate),
    /// UUID
    Uuid(Uuid),
    /// Value list, expanded by `__in` lookups
    Array(Vec<DatabaseValue>),
}

impl DatabaseValue {
    /// Build an [`DatabaseValue::Array`] from anything convertible.
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<DatabaseValue>,
    {
        DatabaseValue::Array(items.into_iter().map(Into::into).collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, DatabaseValue::Null | DatabaseValue::TypedNull(_))
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DatabaseValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// JSON rendering used for row-to-instance mapping.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            DatabaseValue::Null | DatabaseValue::TypedNull(_) => Value::Null,
            DatabaseValue::Boolean(b) => Value::Bool(*b),
            DatabaseValue::Integer(i) => Value::from(*i),
            DatabaseValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            DatabaseValue::Text(s) => Value::String(s.clone()),
            DatabaseValue::Blob(b) => {
                Value::Array(b.iter().map(|byte| Value::from(*byte)).collect())
            }
            DatabaseValue::Json(v) => v.clone(),
            DatabaseValue::Timestamp(t) => serde_json::to_value(t).unwrap_or(Value::Null),
            DatabaseValue::Date(d) => serde_json::to_value(d).unwrap_or(Value::Null),
            DatabaseValue::Uuid(u) => Value::String(u.to_string()),
            DatabaseValue::Array(items) => {
                Value::Array(items.iter().map(DatabaseValue::to_json).collect())
            }
        }
    }
}

impl Display for DatabaseValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null | Self::TypedNull(_) => write!(f, "NULL"),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(fl) => write!(f, "{}", fl),
            Self::Text(s) => write!(f, "{}", s),
            Self::Blob(b) => write!(f, "<blob of {} bytes>", b.len()),
            Self::Json(v) => write!(f, "{}", v),
            Self::Timestamp(t) => write!(f, "{}", t),
            Self::Date(d) => write!(f, "{}", d),
            Self::Uuid(u) => write!(f, "{}", u),
            Self::Array(a) => {
                write!(f, "[")?;
                for (i, v) in a.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
        }
    }
}

macro_rules! impl_from_for_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for DatabaseValue {
                fn from(value: $ty) -> Self {
                    DatabaseValue::$variant(value.into())
                }
            }
        )*
    };
}

impl_from_for_value! {
    bool => Boolean,
    i8 => Integer,
    i16 => Integer,
    i32 => Integer,
    i64 => Integer,
    u8 => Integer,
    u16 => Integer,
    u32 => Integer,
    f64 => Float,
    String => Text,
    &str => Text,
    Vec<u8> => Blob,
    serde_json::Value => Json,
    NaiveDateTime => Timestamp,
    NaiveDate => Date,
    Uuid => Uuid,
}

impl From<f32> for DatabaseValue {
    fn from(value: f32) -> Self {
        DatabaseValue::Float(widen_f32(value))
    }
}

/// Widen an `f32` through its shortest decimal form, so `19.99f32` becomes
/// `19.99` rather than `19.989999771118164`.
pub(crate) fn widen_f32(value: f32) -> f64 {
    value.to_string().parse().unwrap_or_else(|_| f64::from(value))
}

impl<T: Into<DatabaseValue>> From<Option<T>> for DatabaseValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(DatabaseValue::Null, Into::into)
    }
}

/// A fetched row: column names mapped to values, in select order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, DatabaseValue)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            columns: Vec::with_capacity(capacity),
        }
    }

    /// Append a column, replacing an earlier one with the same name.
    pub fn push(&mut self, column: impl Into<String>, value: impl Into<DatabaseValue>) {
        let column = column.into();
        let value = value.into();
        match self.columns.iter_mut().find(|(name, _)| *name == column) {
            Some((_, existing)) => *existing = value,
            None => self.columns.push((column, value)),
        }
    }

    /// Builder form of [`Row::push`].
    pub fn with(mut self, column: impl Into<String>, value: impl Into<DatabaseValue>) -> Self {
        self.push(column, value);
        self
    }

    pub fn get(&self, column: &str) -> Option<&DatabaseValue> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Value of the first column, used for single-value selects.
    pub fn first(&self) -> Option<&DatabaseValue> {
        self.columns.first().map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DatabaseValue)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    fn require(&self, column: &str) -> DatabaseResult<&DatabaseValue> {
        self.get(column)
            .ok_or_else(|| DatabaseError::Query(format!("column {} not found", column)))
    }

    pub fn get_string(&self, column: &str) -> DatabaseResult<String> {
        self.try_get_string(column)?.ok_or_else(|| null_column(column))
    }

    pub fn get_i64(&self, column: &str) -> DatabaseResult<i64> {
        self.try_get_i64(column)?.ok_or_else(|| null_column(column))
    }

    pub fn get_f64(&self, column: &str) -> DatabaseResult<f64> {
        self.try_get_f64(column)?.ok_or_else(|| null_column(column))
    }

    pub fn get_bool(&self, column: &str) -> DatabaseResult<bool> {
        self.try_get_bool(column)?.ok_or_else(|| null_column(column))
    }

    /// `None` when the value is NULL; an error when the column is missing or
    /// holds another kind of value.
    pub fn try_get_string(&self, column: &str) -> DatabaseResult<Option<String>> {
        match self.require(column)? {
            v if v.is_null() => Ok(None),
            DatabaseValue::Text(s) => Ok(Some(s.clone())),
            other => Err(wrong_kind(column, "string", other)),
        }
    }

    pub fn try_get_i64(&self, column: &str) -> DatabaseResult<Option<i64>> {
        match self.require(column)? {
            v if v.is_null() => Ok(None),
            DatabaseValue::Integer(i) => Ok(Some(*i)),
            other => Err(wrong_kind(column, "i64", other)),
        }
    }

    pub fn try_get_f64(&self, column: &str) -> DatabaseResult<Option<f64>> {
        match self.require(column)? {
            v if v.is_null() => Ok(None),
            DatabaseValue::Float(f) => Ok(Some(*f)),
            DatabaseValue::Integer(i) => Ok(Some(*i as f64)),
            other => Err(wrong_kind(column, "f64", other)),
        }
    }

    pub fn try_get_bool(&self, column: &str) -> DatabaseResult<Option<bool>> {
        match self.require(column)? {
            v if v.is_null() => Ok(None),
            DatabaseValue::Boolean(b) => Ok(Some(*b)),
            DatabaseValue::Integer(i) => Ok(Some(*i != 0)),
            other => Err(wrong_kind(column, "bool", other)),
        }
    }

    /// Column values as a JSON object keyed by column name.
    pub fn to_json(&self) -> serde_json::Map<String, serde_json::Value> {
        self.columns
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect()
    }
}

fn null_column(column: &str) -> DatabaseError {
    DatabaseError::Query(format!("column {} is NULL", column))
}

fn wrong_kind(column: &str, expected: &str, found: &DatabaseValue) -> DatabaseError {
    DatabaseError::Query(format!(
        "Failed to get {} column {}: found {:?}",
        expected, column, found
    ))
}

/// Uniform capability set implemented once per backend.
///
/// A driver owns at most one live connection. Every I/O method takes
/// `&mut self`, so one driver serves one caller at a time; share it across
/// tasks behind an async mutex.
#[async_trait]
pub trait Database: Send {
    /// Backend kind of this driver
    fn database_type(&self) -> DatabaseType;

    /// Type mapper and dialect helpers for this backend
    fn adapter(&self) -> &dyn DatabaseAdapter;

    /// DSN used by [`Database::connect`]
    fn dsn(&self) -> &str;

    /// Replace the DSN used by the next [`Database::connect`]
    fn set_dsn(&mut self, dsn: &str);

    /// Whether statements are logged
    fn is_debug(&self) -> bool;

    fn is_connected(&self) -> bool;

    /// Open the connection described by the DSN
    async fn connect(&mut self) -> DatabaseResult<()>;

    /// Replace the DSN, then connect
    async fn connect_to(&mut self, dsn: &str) -> DatabaseResult<()> {
        if self.is_connected() {
            return Err(DatabaseError::already_established());
        }
        self.set_dsn(dsn);
        self.connect().await
    }

    /// Release the connection
    async fn close(&mut self) -> DatabaseResult<()>;

    /// Run any statement, returning the affected-row count
    async fn execute(&mut self, query: &str, params: &[DatabaseValue]) -> DatabaseResult<u64>;

    /// Run a SELECT and return every row
    async fn fetch(&mut self, query: &str, params: &[DatabaseValue]) -> DatabaseResult<Vec<Row>>;

    /// Run a SELECT (or INSERT ... RETURNING where supported) and return the
    /// first row
    async fn fetchrow(
        &mut self,
        query: &str,
        params: &[DatabaseValue],
    ) -> DatabaseResult<Option<Row>>;

    /// Run an UPDATE, returning the affected-row count
    async fn update(&mut self, query: &str, params: &[DatabaseValue]) -> DatabaseResult<u64>;

    /// Column type for a field type on this backend
    fn map_field_type(&self, field_type: &FieldType) -> DatabaseResult<String> {
        self.adapter().map_field_type(field_type)
    }

    /// Column definition for an auto-incrementing integer primary key
    fn auto_increment_primary_key_sql(&self, name: &str) -> String {
        self.adapter().auto_increment_primary_key_sql(name)
    }
}

/// Build a disconnected driver for `db_type`.
///
/// Every call returns a fresh instance; share drivers through a
/// [`ConnectionRegistry`].
pub fn create_database(
    db_type: DatabaseType,
    dsn: impl Into<String>,
    debug: bool,
) -> DatabaseResult<Box<dyn Database>> {
    let dsn = dsn.into();
    match db_type {
        DatabaseType::Postgres => {
            #[cfg(feature = "postgres")]
            {
                Ok(Box::new(PostgresDatabase::new(dsn, debug)))
            }
            #[cfg(not(feature = "postgres"))]
            {
                let _ = (dsn, debug);
                Err(DatabaseError::Configuration(
                    "PostgreSQL support is not enabled. Enable the 'postgres' feature.".to_string(),
                ))
            }
        }
        DatabaseType::MySql => {
            #[cfg(feature = "mysql")]
            {
                Ok(Box::new(MySqlDatabase::new(dsn, debug)))
            }
            #[cfg(not(feature = "mysql"))]
            {
                let _ = (dsn, debug);
                Err(DatabaseError::Configuration(
                    "MySQL support is not enabled. Enable the 'mysql' feature.".to_string(),
                ))
            }
        }
    }
}

/// Build a driver whose backend is picked from the DSN scheme.
pub fn create_database_from_dsn(
    dsn: impl Into<String>,
    debug: bool,
) -> DatabaseResult<Box<dyn Database>> {
    let dsn = dsn.into();
    let url = Url::parse(&dsn)
        .map_err(|e| DatabaseError::Configuration(format!("malformed DSN: {}", e)))?;
    let db_type = DatabaseType::from_scheme(url.scheme()).ok_or_else(|| {
        DatabaseError::Configuration(format!("unsupported DSN scheme '{}'", url.scheme()))
    })?;
    create_database(db_type, dsn, debug)
}

fn normalized(query: &str) -> String {
    query.trim().to_lowercase()
}

fn terminated(query: &str) -> String {
    let trimmed = query.trim_end();
    if trimmed.ends_with(';') {
        trimmed.to_string()
    } else {
        format!("{};", trimmed)
    }
}

/// Guard for `fetch`: SELECT only.
pub(crate) fn prepare_fetch(query: &str) -> DatabaseResult<String> {
    if !normalized(query).starts_with("select") {
        return Err(DatabaseError::Validation(
            "Fetch can only be used with SELECT queries".to_string(),
        ));
    }
    Ok(terminated(query))
}

/// Guard for `fetchrow`: SELECT, or INSERT ... RETURNING when the backend
/// can return generated values.
pub(crate) fn prepare_fetchrow(query: &str, allow_returning: bool) -> DatabaseResult<String> {
    let text = normalized(query);
    let returning = allow_returning
        && text.starts_with("insert")
        && text.split_whitespace().any(|word| word == "returning");
    if !text.starts_with("select") && !returning {
        return Err(DatabaseError::Validation(
            "Fetchrow can only be used with SELECT queries".to_string(),
        ));
    }
    Ok(terminated(query))
}

/// Guard for `update`: UPDATE only.
pub(crate) fn prepare_update(query: &str) -> DatabaseResult<String> {
    if !normalized(query).starts_with("update") {
        return Err(DatabaseError::Validation(
            "Update can only be used with UPDATE queries".to_string(),
        ));
    }
    Ok(terminated(query))
}

/// Statement logging for drivers in debug mode.
pub(crate) fn log_statement(
    debug: bool,
    db_type: DatabaseType,
    query: &str,
    params: &[DatabaseValue],
) {
    if debug {
        debug!(target: "riverorm::db", database = %db_type, sql = query, params = ?params, "SQL");
    }
}

#[cfg(feature = "postgres")]
mod postgres;
#[cfg(feature = "postgres")]
pub use postgres::PostgresDatabase;

#[cfg(feature = "mysql")]
mod mysql;
#[cfg(feature = "mysql")]
pub use mysql::MySqlDatabase;

#[cfg(test)]
pub(crate) mod testing;

#[cfg(test)]
mod tests;
