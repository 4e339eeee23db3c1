//! Per-backend type mapping and SQL dialect helpers.

mod mysql;
mod postgres;

pub use mysql::MySqlAdapter;
pub use postgres::PostgresAdapter;

use crate::database::{DatabaseResult, DatabaseType};
use crate::model::FieldType;

/// Trait defining backend-specific SQL generation details
pub trait DatabaseAdapter: Send + Sync {
    /// Backend this adapter generates SQL for
    fn database_type(&self) -> DatabaseType;

    /// Map a field type to a column type string.
    ///
    /// `Optional` is unwrapped before mapping; descriptors the backend has no
    /// column type for fail with `DatabaseError::UnsupportedType`.
    fn map_field_type(&self, field_type: &FieldType) -> DatabaseResult<String>;

    /// Column definition for an auto-incrementing integer primary key
    fn auto_increment_primary_key_sql(&self, name: &str) -> String;

    /// Quote a table name for use in generated statements
    fn quote_table(&self, table: &str) -> String;

    /// Positional parameter placeholder, `index` starting at 1
    fn placeholder(&self, index: usize) -> String;

    /// Whether INSERT ... RETURNING can hand back generated keys
    fn supports_returning(&self) -> bool;

    /// Single-value SELECT returning the key generated by the last INSERT on
    /// this connection, for backends without RETURNING
    fn last_insert_id_sql(&self) -> Option<&'static str> {
        None
    }

    /// INSERT tail used when no column values are supplied
    fn default_values_sql(&self) -> &'static str;
}

/// Adapter for a backend kind.
pub fn adapter_for(db_type: DatabaseType) -> &'static dyn DatabaseAdapter {
    match db_type {
        DatabaseType::Postgres => &PostgresAdapter,
        DatabaseType::MySql => &MySqlAdapter,
    }
}

#[cfg(test)]
mod tests;
