use super::*;
use crate::database::DatabaseError;
use crate::model::FieldType;

#[test]
fn test_postgres_scalar_mapping() {
    let adapter = PostgresAdapter::new();
    let cases = [
        (FieldType::Int, "INTEGER"),
        (FieldType::Float, "REAL"),
        (FieldType::Bool, "BOOLEAN"),
        (FieldType::Str, "TEXT"),
        (FieldType::DateTime, "TIMESTAMP"),
        (FieldType::Date, "DATE"),
        (FieldType::Uuid, "UUID"),
        (FieldType::list(FieldType::Str), "JSONB"),
    ];
    for (field_type, expected) in cases {
        assert_eq!(adapter.map_field_type(&field_type).unwrap(), expected, "{}", field_type);
    }
}

#[test]
fn test_mysql_scalar_mapping() {
    let adapter = MySqlAdapter::new();
    let cases = [
        (FieldType::Int, "INT"),
        (FieldType::Float, "FLOAT"),
        (FieldType::Str, "VARCHAR(255)"),
        (FieldType::Bool, "BOOLEAN"),
        (FieldType::Bytes, "BLOB"),
    ];
    for (field_type, expected) in cases {
        assert_eq!(adapter.map_field_type(&field_type).unwrap(), expected, "{}", field_type);
    }
}

#[test]
fn test_optional_is_unwrapped_before_mapping() {
    let nested = FieldType::optional(FieldType::optional(FieldType::Int));
    assert_eq!(PostgresAdapter.map_field_type(&nested).unwrap(), "INTEGER");
    assert_eq!(
        MySqlAdapter.map_field_type(&FieldType::optional(FieldType::Str)).unwrap(),
        "VARCHAR(255)"
    );
}

#[test]
fn test_unsupported_types_are_rejected() {
    let pg = PostgresAdapter.map_field_type(&FieldType::Bytes);
    assert!(matches!(pg, Err(DatabaseError::UnsupportedType(_))));

    for field_type in [
        FieldType::DateTime,
        FieldType::Date,
        FieldType::Uuid,
        FieldType::list(FieldType::Int),
        FieldType::Model("User"),
    ] {
        let result = MySqlAdapter.map_field_type(&field_type);
        assert!(
            matches!(result, Err(DatabaseError::UnsupportedType(_))),
            "{} should be unsupported on mysql",
            field_type
        );
    }
}

#[test]
fn test_auto_increment_fragments() {
    assert_eq!(
        PostgresAdapter.auto_increment_primary_key_sql("id"),
        "id SERIAL PRIMARY KEY"
    );
    assert_eq!(
        MySqlAdapter.auto_increment_primary_key_sql("id"),
        "id INTEGER PRIMARY KEY AUTO_INCREMENT"
    );
}

#[test]
fn test_dialect_helpers() {
    assert_eq!(PostgresAdapter.quote_table("user"), "\"user\"");
    assert_eq!(MySqlAdapter.quote_table("user"), "user");
    assert_eq!(PostgresAdapter.placeholder(3), "$3");
    assert_eq!(MySqlAdapter.placeholder(3), "?");
    assert!(PostgresAdapter.supports_returning());
    assert!(!MySqlAdapter.supports_returning());
    assert_eq!(
        MySqlAdapter.last_insert_id_sql(),
        Some("SELECT LAST_INSERT_ID() AS id")
    );
    assert_eq!(adapter_for(DatabaseType::MySql).database_type(), DatabaseType::MySql);
}
