use std::fmt::{self, Display};

use crate::database::{DatabaseValue, ValueKind};
use crate::naming;

/// Field type descriptor, mapped to a column type per backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    /// Integer
    Int,
    /// Floating point number
    Float,
    /// Text
    Str,
    /// Boolean true/false
    Bool,
    /// Raw bytes
    Bytes,
    /// Date and time without zone
    DateTime,
    /// Date (without time)
    Date,
    /// UUID
    Uuid,
    /// Nullable wrapper
    Optional(Box<FieldType>),
    /// Sequence of values
    List(Box<FieldType>),
    /// Reference to another model type, by type name
    Model(&'static str),
}

impl FieldType {
    pub fn optional(inner: FieldType) -> Self {
        FieldType::Optional(Box::new(inner))
    }

    pub fn list(inner: FieldType) -> Self {
        FieldType::List(Box::new(inner))
    }

    /// The type with every `Optional` layer removed.
    pub fn unwrapped(&self) -> &FieldType {
        match self {
            FieldType::Optional(inner) => inner.unwrapped(),
            other => other,
        }
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, FieldType::Optional(_))
    }

    /// Lists and model references have no column of their own.
    pub fn is_virtual(&self) -> bool {
        matches!(self.unwrapped(), FieldType::List(_) | FieldType::Model(_))
    }

    pub fn is_integer(&self) -> bool {
        matches!(self.unwrapped(), FieldType::Int)
    }

    /// Kind used when binding a NULL of this type.
    pub fn value_kind(&self) -> ValueKind {
        match self.unwrapped() {
            FieldType::Int => ValueKind::Integer,
            FieldType::Float => ValueKind::Float,
            FieldType::Str => ValueKind::Text,
            FieldType::Bool => ValueKind::Boolean,
            FieldType::Bytes => ValueKind::Blob,
            FieldType::DateTime => ValueKind::Timestamp,
            FieldType::Date => ValueKind::Date,
            FieldType::Uuid => ValueKind::Uuid,
            FieldType::List(_) | FieldType::Model(_) | FieldType::Optional(_) => ValueKind::Json,
        }
    }
}

impl Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Int => write!(f, "int"),
            FieldType::Float => write!(f, "float"),
            FieldType::Str => write!(f, "str"),
            FieldType::Bool => write!(f, "bool"),
            FieldType::Bytes => write!(f, "bytes"),
            FieldType::DateTime => write!(f, "datetime"),
            FieldType::Date => write!(f, "date"),
            FieldType::Uuid => write!(f, "uuid"),
            FieldType::Optional(inner) => write!(f, "optional<{}>", inner),
            FieldType::List(inner) => write!(f, "list<{}>", inner),
            FieldType::Model(name) => write!(f, "{}", name),
        }
    }
}

/// One declared field of a model
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub field_type: FieldType,
    /// Value used when a fetched row lacks the column
    pub default: Option<DatabaseValue>,
    pub primary_key: bool,
}

impl FieldDescriptor {
    pub fn is_virtual(&self) -> bool {
        self.field_type.is_virtual()
    }
}

/// Static description of a model type: table, key and fields in
/// declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSchema {
    type_name: String,
    table_name_override: Option<String>,
    primary_key: String,
    database: Option<String>,
    fields: Vec<FieldDescriptor>,
}

impl ModelSchema {
    pub fn builder(type_name: impl Into<String>) -> ModelSchemaBuilder {
        ModelSchemaBuilder {
            type_name: type_name.into(),
            table_name: None,
            primary_key: "id".to_string(),
            database: None,
            fields: Vec::new(),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Table name: the override when present and non-empty, else the
    /// snake_cased type name.
    pub fn table_name(&self) -> String {
        naming::table_name(&self.type_name, self.table_name_override.as_deref())
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Registry alias this model lives in, `None` for the default
    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields persisted as columns
    pub fn real_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| !f.is_virtual())
    }

    /// List and model-reference fields, never persisted
    pub fn virtual_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.is_virtual())
    }

    pub fn primary_key_field(&self) -> Option<&FieldDescriptor> {
        self.field(&self.primary_key)
    }
}

/// Builder for [`ModelSchema`], used by `#[derive(Model)]` and by hand.
#[derive(Debug)]
pub struct ModelSchemaBuilder {
    type_name: String,
    table_name: Option<String>,
    primary_key: String,
    database: Option<String>,
    fields: Vec<FieldDescriptor>,
}

impl ModelSchemaBuilder {
    pub fn table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }

    pub fn primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = primary_key.into();
        self
    }

    pub fn database(mut self, alias: impl Into<String>) -> Self {
        self.database = Some(alias.into());
        self
    }

    pub fn field(self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.push_field(name.into(), field_type, None)
    }

    pub fn field_with_default(
        self,
        name: impl Into<String>,
        field_type: FieldType,
        default: impl Into<DatabaseValue>,
    ) -> Self {
        self.push_field(name.into(), field_type, Some(default.into()))
    }

    fn push_field(
        mut self,
        name: String,
        field_type: FieldType,
        default: Option<DatabaseValue>,
    ) -> Self {
        self.fields.push(FieldDescriptor {
            name,
            field_type,
            default,
            primary_key: false,
        });
        self
    }

    pub fn build(self) -> ModelSchema {
        let primary_key = self.primary_key;
        let fields = self
            .fields
            .into_iter()
            .map(|mut field| {
                field.primary_key = field.name == primary_key;
                field
            })
            .collect();

        ModelSchema {
            type_name: self.type_name,
            table_name_override: self.table_name,
            primary_key,
            database: self.database,
            fields,
        }
    }
}
