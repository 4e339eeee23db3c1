//! Declarative models persisted through a [`Database`] driver.
//!
//! A model is a plain serde struct with a static [`ModelSchema`], usually
//! produced by `#[derive(Model)]`. Every operation takes the driver
//! explicitly.

#![allow(async_fn_in_trait)]

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::database::{
    ConnectionRegistry, Database, DatabaseError, DatabaseResult, DatabaseValue,
};

pub mod query;
mod schema;
mod values;

pub use query::{Lookup, Operator, Statement};
pub use schema::{FieldDescriptor, FieldType, ModelSchema, ModelSchemaBuilder};

/// Row limit applied by [`Model::all`] when none is given
pub const DEFAULT_LIMIT: usize = 1000;

/// Persistence operations for a model type.
///
/// Implementors only provide [`Model::schema`]; everything else is derived
/// from it.
pub trait Model: Serialize + DeserializeOwned + Send + Sync + Sized {
    /// Static schema of this model type
    fn schema() -> &'static ModelSchema;

    fn table_name() -> String {
        Self::schema().table_name()
    }

    /// Fields stored as columns
    fn model_real_fields() -> Vec<&'static FieldDescriptor> {
        Self::schema().real_fields().collect()
    }

    /// List and model-reference fields, never stored
    fn model_virtual_fields() -> Vec<&'static FieldDescriptor> {
        Self::schema().virtual_fields().collect()
    }

    /// Driver this model is bound to in `registry`: its configured alias,
    /// or the registry default.
    fn database(registry: &mut ConnectionRegistry) -> DatabaseResult<&mut dyn Database> {
        registry.get_mut(Self::schema().database())
    }

    async fn create_table(db: &mut dyn Database) -> DatabaseResult<()> {
        let sql = query::create_table(Self::schema(), db.adapter())?;
        db.execute(&sql, &[]).await?;
        Ok(())
    }

    async fn drop_table(db: &mut dyn Database) -> DatabaseResult<()> {
        let sql = query::drop_table(Self::schema(), db.adapter());
        db.execute(&sql, &[]).await?;
        Ok(())
    }

    /// Insert the instance when its primary key is unset, otherwise update
    /// the row it identifies. Updating a key with no row is an error.
    ///
    /// On insert the generated key is written back onto the instance. A
    /// failed save leaves the instance untouched.
    async fn save(&mut self, db: &mut dyn Database) -> DatabaseResult<()> {
        let schema = Self::schema();
        let primary_key = schema.primary_key();
        let mut object = values::to_object(&*self)?;
        let columns = values::column_values(schema, &object)?;

        let key = object.get(primary_key).cloned().unwrap_or(Value::Null);
        if !key.is_null() {
            let key = match schema.primary_key_field() {
                Some(field) => values::field_value(field, &object)?,
                None => DatabaseValue::Json(key),
            };
            let statement = query::update(schema, db.adapter(), columns, key)?;
            let affected = db.update(&statement.sql, &statement.params).await?;
            if affected == 0 {
                return Err(DatabaseError::Query(format!(
                    "No {} row with primary key {}",
                    schema.type_name(),
                    statement.params.last().map(ToString::to_string).unwrap_or_default()
                )));
            }
            return Ok(());
        }

        let returning = db.adapter().supports_returning();
        let last_insert_id = db.adapter().last_insert_id_sql();
        let statement = query::insert(schema, db.adapter(), columns);

        let row = if returning {
            db.fetchrow(&statement.sql, &statement.params).await?
        } else {
            db.execute(&statement.sql, &statement.params).await?;
            match last_insert_id {
                Some(sql) => db.fetchrow(sql, &[]).await?,
                None => None,
            }
        };

        let generated = row
            .as_ref()
            .and_then(|row| row.get(primary_key).or_else(|| row.first()))
            .filter(|value| !value.is_null())
            .ok_or_else(|| {
                DatabaseError::Query(format!(
                    "No primary key returned for new {} row",
                    schema.type_name()
                ))
            })?;
        debug!(model = schema.type_name(), key = %generated, "inserted row");

        object.insert(primary_key.to_string(), generated.to_json());
        *self = serde_json::from_value(Value::Object(object))?;
        Ok(())
    }

    /// Delete the row identified by the primary key, returning the number of
    /// rows removed.
    async fn delete(&self, db: &mut dyn Database) -> DatabaseResult<u64> {
        let schema = Self::schema();
        let object = values::to_object(self)?;
        let key = match schema.primary_key_field() {
            Some(field) => values::field_value(field, &object)?,
            None => DatabaseValue::Null,
        };
        if key.is_null() {
            return Err(DatabaseError::Validation(format!(
                "Cannot delete {} without a primary key",
                schema.type_name()
            )));
        }
        let statement = query::delete(schema, db.adapter(), key);
        db.execute(&statement.sql, &statement.params).await
    }

    /// Every row up to `limit` ([`DEFAULT_LIMIT`] when `None`).
    async fn all(db: &mut dyn Database, limit: Option<usize>) -> DatabaseResult<Vec<Self>> {
        let schema = Self::schema();
        let limit = limit.unwrap_or(DEFAULT_LIMIT);
        let statement = query::select(schema, db.adapter(), &[], Some(limit));
        let rows = db.fetch(&statement.sql, &statement.params).await?;
        rows.iter().map(|row| values::from_row(schema, row)).collect()
    }

    /// First row matching every filter, if any.
    async fn get(
        db: &mut dyn Database,
        filters: &[(&str, DatabaseValue)],
    ) -> DatabaseResult<Option<Self>> {
        let schema = Self::schema();
        let lookups = Lookup::parse_all(schema, filters)?;
        let statement = query::select(schema, db.adapter(), &lookups, Some(1));
        let row = db.fetchrow(&statement.sql, &statement.params).await?;
        row.map(|row| values::from_row(schema, &row)).transpose()
    }

    /// Rows matching every filter. Keys are field names with an optional
    /// operator suffix: `__eq`, `__ne`, `__gt`, `__gte`, `__lt`, `__lte` or
    /// `__in`.
    async fn filter(
        db: &mut dyn Database,
        filters: &[(&str, DatabaseValue)],
    ) -> DatabaseResult<Vec<Self>> {
        let schema = Self::schema();
        let lookups = Lookup::parse_all(schema, filters)?;
        let statement = query::select(schema, db.adapter(), &lookups, None);
        let rows = db.fetch(&statement.sql, &statement.params).await?;
        rows.iter().map(|row| values::from_row(schema, row)).collect()
    }
}
