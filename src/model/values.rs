//! Conversion between model instances, bound values and fetched rows.
//!
//! Instances travel through `serde_json`: a model serializes to an object
//! keyed by field name, and rows are rebuilt into such an object before
//! deserializing.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::database::{DatabaseError, DatabaseResult, DatabaseValue, Row};
use crate::model::schema::{FieldDescriptor, FieldType, ModelSchema};

/// Serialize an instance into its field map.
pub(crate) fn to_object<M: Serialize>(instance: &M) -> DatabaseResult<Map<String, Value>> {
    match serde_json::to_value(instance)? {
        Value::Object(map) => Ok(map),
        other => Err(DatabaseError::Serialization(format!(
            "model must serialize to an object, got {}",
            other
        ))),
    }
}

fn mismatch(field: &FieldDescriptor, value: &Value) -> DatabaseError {
    DatabaseError::Serialization(format!(
        "field {} of type {} cannot hold {}",
        field.name, field.field_type, value
    ))
}

fn convert(
    field: &FieldDescriptor,
    field_type: &FieldType,
    value: &Value,
) -> DatabaseResult<DatabaseValue> {
    if value.is_null() {
        return Ok(DatabaseValue::TypedNull(field_type.value_kind()));
    }
    let converted = match field_type {
        FieldType::Optional(inner) => return convert(field, inner, value),
        FieldType::Int => value.as_i64().map(DatabaseValue::Integer),
        FieldType::Float => value.as_f64().map(DatabaseValue::Float),
        FieldType::Str => value.as_str().map(DatabaseValue::from),
        FieldType::Bool => value.as_bool().map(DatabaseValue::Boolean),
        FieldType::Bytes => value.as_array().and_then(|items| {
            items
                .iter()
                .map(|item| item.as_u64().and_then(|b| u8::try_from(b).ok()))
                .collect::<Option<Vec<u8>>>()
                .map(DatabaseValue::Blob)
        }),
        FieldType::DateTime => value
            .as_str()
            .and_then(parse_timestamp)
            .map(DatabaseValue::Timestamp),
        FieldType::Date => value
            .as_str()
            .and_then(|s| s.parse::<NaiveDate>().ok())
            .map(DatabaseValue::Date),
        FieldType::Uuid => value
            .as_str()
            .and_then(|s| Uuid::parse_str(s).ok())
            .map(DatabaseValue::Uuid),
        FieldType::List(_) | FieldType::Model(_) => Some(DatabaseValue::Json(value.clone())),
    };
    converted.ok_or_else(|| mismatch(field, value))
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    s.parse::<NaiveDateTime>().ok().or_else(|| {
        DateTime::<FixedOffset>::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.naive_utc())
    })
}

/// Bound value for one field taken from an instance's field map. A field
/// the instance did not serialize falls back to its default, then NULL.
pub(crate) fn field_value(
    field: &FieldDescriptor,
    object: &Map<String, Value>,
) -> DatabaseResult<DatabaseValue> {
    match object.get(&field.name) {
        Some(value) => convert(field, &field.field_type, value),
        None => Ok(field
            .default
            .clone()
            .unwrap_or(DatabaseValue::TypedNull(field.field_type.value_kind()))),
    }
}

/// Persisted non-key columns with their values, in declaration order.
pub(crate) fn column_values(
    schema: &ModelSchema,
    object: &Map<String, Value>,
) -> DatabaseResult<Vec<(String, DatabaseValue)>> {
    schema
        .real_fields()
        .filter(|field| !field.primary_key)
        .map(|field| Ok((field.name.clone(), field_value(field, object)?)))
        .collect()
}

fn column_json(field_type: &FieldType, value: &DatabaseValue) -> Value {
    match (field_type.unwrapped(), value) {
        (FieldType::Bool, DatabaseValue::Integer(i)) => Value::Bool(*i != 0),
        (FieldType::List(_), DatabaseValue::Text(s)) => {
            serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.clone()))
        }
        _ => value.to_json(),
    }
}

fn missing_json(field: &FieldDescriptor) -> Option<Value> {
    if let Some(default) = &field.default {
        return Some(default.to_json());
    }
    match field.field_type {
        FieldType::Optional(_) => Some(Value::Null),
        FieldType::List(_) => Some(Value::Array(Vec::new())),
        _ => None,
    }
}

/// Rebuild an instance from a fetched row.
///
/// Columns are matched to fields by name. Fields the row lacks take their
/// default; optional fields become `None` and list fields empty.
pub(crate) fn from_row<M: DeserializeOwned>(schema: &ModelSchema, row: &Row) -> DatabaseResult<M> {
    let mut object = Map::with_capacity(schema.fields().len());
    for field in schema.fields() {
        let value = match row.get(&field.name) {
            Some(value) if !field.is_virtual() => Some(column_json(&field.field_type, value)),
            _ => missing_json(field),
        };
        if let Some(value) = value {
            object.insert(field.name.clone(), value);
        }
    }
    serde_json::from_value(Value::Object(object)).map_err(|e| {
        DatabaseError::Serialization(format!(
            "Failed to build {} from row: {}",
            schema.type_name(),
            e
        ))
    })
}
