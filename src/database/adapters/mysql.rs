// MySql adapter implementation

use crate::database::{adapters::DatabaseAdapter, DatabaseError, DatabaseResult, DatabaseType};
use crate::model::FieldType;

/// MySQL type mapping and dialect
///
/// NOTE: MariaDB shares this dialect. Neither gets a JSON mapping for list
/// fields here, so list fields are rejected.
#[derive(Debug, Default, Clone, Copy)]
pub struct MySqlAdapter;

impl MySqlAdapter {
    /// Create a new adapter instance
    pub fn new() -> Self {
        Self
    }
}

impl DatabaseAdapter for MySqlAdapter {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::MySql
    }

    fn map_field_type(&self, field_type: &FieldType) -> DatabaseResult<String> {
        let ty = match field_type.unwrapped() {
            FieldType::Int => "INT",
            FieldType::Float => "FLOAT",
            FieldType::Str => "VARCHAR(255)",
            FieldType::Bool => "BOOLEAN",
            FieldType::Bytes => "BLOB",
            unsupported => {
                return Err(DatabaseError::UnsupportedType(format!(
                    "Unsupported type for mysql: {}",
                    unsupported
                )));
            }
        };
        Ok(ty.to_string())
    }

    fn auto_increment_primary_key_sql(&self, name: &str) -> String {
        format!("{} INTEGER PRIMARY KEY AUTO_INCREMENT", name)
    }

    fn quote_table(&self, table: &str) -> String {
        table.to_string()
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn supports_returning(&self) -> bool {
        false
    }

    fn last_insert_id_sql(&self) -> Option<&'static str> {
        Some("SELECT LAST_INSERT_ID() AS id")
    }

    fn default_values_sql(&self) -> &'static str {
        "() VALUES ()"
    }
}
