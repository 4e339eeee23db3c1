use crate::database::{adapters::DatabaseAdapter, DatabaseError, DatabaseResult, DatabaseType};
use crate::model::FieldType;

/// PostgreSQL type mapping and dialect
#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresAdapter;

impl PostgresAdapter {
    /// Create a new adapter instance
    pub fn new() -> Self {
        Self
    }
}

impl DatabaseAdapter for PostgresAdapter {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Postgres
    }

    fn map_field_type(&self, field_type: &FieldType) -> DatabaseResult<String> {
        let ty = match field_type.unwrapped() {
            FieldType::Int => "INTEGER",
            FieldType::Float => "REAL",
            FieldType::Bool => "BOOLEAN",
            FieldType::Str => "TEXT",
            FieldType::DateTime => "TIMESTAMP",
            FieldType::Date => "DATE",
            FieldType::Uuid => "UUID",
            FieldType::List(_) => "JSONB",
            unsupported @ (FieldType::Bytes | FieldType::Model(_) | FieldType::Optional(_)) => {
                return Err(DatabaseError::UnsupportedType(format!(
                    "Unsupported type for postgres: {}",
                    unsupported
                )));
            }
        };
        Ok(ty.to_string())
    }

    fn auto_increment_primary_key_sql(&self, name: &str) -> String {
        format!("{} SERIAL PRIMARY KEY", name)
    }

    fn quote_table(&self, table: &str) -> String {
        format!("\"{}\"", table.replace('"', "\"\""))
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    fn supports_returning(&self) -> bool {
        true
    }

    fn default_values_sql(&self) -> &'static str {
        "DEFAULT VALUES"
    }
}
