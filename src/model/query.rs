//! SQL text generation for model operations.
//!
//! Every function here is pure: it turns a schema plus values into a
//! [`Statement`] using the backend's [`DatabaseAdapter`] for quoting,
//! placeholders and column types. Values are always bound, never inlined.

use std::fmt::{self, Display};

use crate::database::{DatabaseAdapter, DatabaseError, DatabaseResult, DatabaseValue};
use crate::model::schema::{FieldDescriptor, ModelSchema};

/// SQL text with its positional parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<DatabaseValue>,
}

/// Comparison selected by a filter key suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
}

impl Operator {
    const SUFFIXES: [(&'static str, Operator); 7] = [
        ("__eq", Operator::Eq),
        ("__ne", Operator::Ne),
        ("__gte", Operator::Gte),
        ("__gt", Operator::Gt),
        ("__lte", Operator::Lte),
        ("__lt", Operator::Lt),
        ("__in", Operator::In),
    ];

    /// Split `field__op` into the field name and operator; no suffix means
    /// equality.
    pub fn split_key(key: &str) -> (&str, Operator) {
        Self::SUFFIXES
            .iter()
            .find_map(|(suffix, op)| key.strip_suffix(suffix).map(|field| (field, *op)))
            .unwrap_or((key, Operator::Eq))
    }

    fn sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "<>",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::In => "IN",
        }
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql())
    }
}

/// One resolved filter condition. A NULL value with `Eq` / `Ne` renders as
/// `IS NULL` / `IS NOT NULL`.
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup {
    pub field: String,
    pub operator: Operator,
    pub value: DatabaseValue,
}

impl Lookup {
    /// Resolve a filter key against the model's persisted fields.
    pub fn parse(schema: &ModelSchema, key: &str, value: DatabaseValue) -> DatabaseResult<Self> {
        let (name, operator) = Operator::split_key(key);
        let field = schema
            .field(name)
            .filter(|field| !field.is_virtual())
            .ok_or_else(|| {
                DatabaseError::Validation(format!(
                    "Unknown field '{}' for model {}",
                    name,
                    schema.type_name()
                ))
            })?;

        let value = match (operator, value) {
            (Operator::In, value @ DatabaseValue::Array(_)) => value,
            (Operator::In, _) => {
                return Err(DatabaseError::Validation(format!(
                    "Lookup '{}' expects a list of values",
                    key
                )));
            }
            (_, DatabaseValue::Array(_)) => {
                return Err(DatabaseError::Validation(format!(
                    "Lookup '{}' expects a single value",
                    key
                )));
            }
            (Operator::Eq | Operator::Ne, value) if value.is_null() => DatabaseValue::Null,
            (_, value) if value.is_null() => {
                return Err(DatabaseError::Validation(format!(
                    "Lookup '{}' cannot compare against NULL",
                    key
                )));
            }
            (_, value) => value,
        };

        Ok(Lookup {
            field: field.name.clone(),
            operator,
            value,
        })
    }

    pub fn parse_all(
        schema: &ModelSchema,
        filters: &[(&str, DatabaseValue)],
    ) -> DatabaseResult<Vec<Self>> {
        filters
            .iter()
            .map(|(key, value)| Lookup::parse(schema, key, value.clone()))
            .collect()
    }
}

/// Collects bound values and hands out matching placeholders.
struct Binder<'a> {
    adapter: &'a dyn DatabaseAdapter,
    params: Vec<DatabaseValue>,
}

impl<'a> Binder<'a> {
    fn new(adapter: &'a dyn DatabaseAdapter) -> Self {
        Self {
            adapter,
            params: Vec::new(),
        }
    }

    fn bind(&mut self, value: DatabaseValue) -> String {
        self.params.push(value);
        self.adapter.placeholder(self.params.len())
    }

    fn finish(self, sql: String) -> Statement {
        Statement {
            sql,
            params: self.params,
        }
    }
}

fn table(schema: &ModelSchema, adapter: &dyn DatabaseAdapter) -> String {
    adapter.quote_table(&schema.table_name())
}

fn column_definition(
    field: &FieldDescriptor,
    adapter: &dyn DatabaseAdapter,
) -> DatabaseResult<String> {
    if field.primary_key && field.field_type.is_integer() {
        return Ok(adapter.auto_increment_primary_key_sql(&field.name));
    }
    let column_type = adapter.map_field_type(&field.field_type)?;
    if field.primary_key {
        Ok(format!("{} {} PRIMARY KEY", field.name, column_type))
    } else {
        Ok(format!("{} {}", field.name, column_type))
    }
}

/// `CREATE TABLE IF NOT EXISTS` over the persisted fields.
pub fn create_table(
    schema: &ModelSchema,
    adapter: &dyn DatabaseAdapter,
) -> DatabaseResult<String> {
    let columns = schema
        .real_fields()
        .map(|field| column_definition(field, adapter))
        .collect::<DatabaseResult<Vec<_>>>()?;
    if columns.is_empty() {
        return Err(DatabaseError::Validation(format!(
            "Model {} has no persisted fields",
            schema.type_name()
        )));
    }
    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        table(schema, adapter),
        columns.join(", ")
    ))
}

pub fn drop_table(schema: &ModelSchema, adapter: &dyn DatabaseAdapter) -> String {
    format!("DROP TABLE IF EXISTS {}", table(schema, adapter))
}

/// INSERT for a new row. `values` are the non-key columns; the generated
/// key is returned directly when the backend supports RETURNING.
pub fn insert(
    schema: &ModelSchema,
    adapter: &dyn DatabaseAdapter,
    values: Vec<(String, DatabaseValue)>,
) -> Statement {
    let table = table(schema, adapter);
    let mut binder = Binder::new(adapter);

    let mut sql = if values.is_empty() {
        format!("INSERT INTO {} {}", table, adapter.default_values_sql())
    } else {
        let mut columns = Vec::with_capacity(values.len());
        let mut placeholders = Vec::with_capacity(values.len());
        for (column, value) in values {
            placeholders.push(binder.bind(value));
            columns.push(column);
        }
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(", "),
            placeholders.join(", ")
        )
    };

    if adapter.supports_returning() {
        sql.push_str(&format!(" RETURNING {}", schema.primary_key()));
    }
    binder.finish(sql)
}

/// UPDATE of every non-key column for the row with the given key.
pub fn update(
    schema: &ModelSchema,
    adapter: &dyn DatabaseAdapter,
    values: Vec<(String, DatabaseValue)>,
    key: DatabaseValue,
) -> DatabaseResult<Statement> {
    if values.is_empty() {
        return Err(DatabaseError::Validation(format!(
            "Model {} has no columns to update",
            schema.type_name()
        )));
    }
    let mut binder = Binder::new(adapter);
    let assignments = values
        .into_iter()
        .map(|(column, value)| format!("{} = {}", column, binder.bind(value)))
        .collect::<Vec<_>>();
    let sql = format!(
        "UPDATE {} SET {} WHERE {} = {}",
        table(schema, adapter),
        assignments.join(", "),
        schema.primary_key(),
        binder.bind(key)
    );
    Ok(binder.finish(sql))
}

pub fn delete(
    schema: &ModelSchema,
    adapter: &dyn DatabaseAdapter,
    key: DatabaseValue,
) -> Statement {
    let mut binder = Binder::new(adapter);
    let sql = format!(
        "DELETE FROM {} WHERE {} = {}",
        table(schema, adapter),
        schema.primary_key(),
        binder.bind(key)
    );
    binder.finish(sql)
}

fn condition(lookup: &Lookup, binder: &mut Binder<'_>) -> String {
    match (&lookup.operator, &lookup.value) {
        (Operator::In, DatabaseValue::Array(items)) if items.is_empty() => "1 = 0".to_string(),
        (Operator::In, DatabaseValue::Array(items)) => {
            let placeholders = items
                .iter()
                .map(|item| binder.bind(item.clone()))
                .collect::<Vec<_>>();
            format!("{} IN ({})", lookup.field, placeholders.join(", "))
        }
        (Operator::Eq, DatabaseValue::Null) => format!("{} IS NULL", lookup.field),
        (Operator::Ne, DatabaseValue::Null) => format!("{} IS NOT NULL", lookup.field),
        (operator, value) => {
            let placeholder = binder.bind(value.clone());
            format!("{} {} {}", lookup.field, operator, placeholder)
        }
    }
}

/// SELECT over the table, conditions ANDed.
pub fn select(
    schema: &ModelSchema,
    adapter: &dyn DatabaseAdapter,
    lookups: &[Lookup],
    limit: Option<usize>,
) -> Statement {
    let mut binder = Binder::new(adapter);
    let mut sql = format!("SELECT * FROM {}", table(schema, adapter));

    if !lookups.is_empty() {
        let conditions = lookups
            .iter()
            .map(|lookup| condition(lookup, &mut binder))
            .collect::<Vec<_>>();
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    binder.finish(sql)
}
