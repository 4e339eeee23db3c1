//! Minimal async ORM over PostgreSQL and MySQL.
//!
//! Models are plain serde structs with a static [`ModelSchema`], usually
//! derived with `#[derive(Model)]`. A [`Database`] driver owns one
//! connection; a [`ConnectionRegistry`] keeps several drivers under aliases.
//!
//! ```ignore
//! use riverorm::{Model, OrmConfig};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Serialize, Deserialize, Model)]
//! struct User {
//!     id: Option<i64>,
//!     username: String,
//!     #[model(default = true)]
//!     is_active: bool,
//! }
//!
//! let mut registry = OrmConfig::from_env()?.into_registry()?;
//! registry.connect_all().await?;
//! let db = User::database(&mut registry)?;
//! User::create_table(db).await?;
//! let mut alice = User { id: None, username: "alice".into(), is_active: true };
//! alice.save(db).await?;
//! let active = User::filter(db, &[("is_active", true.into())]).await?;
//! ```

// The derive macro refers to items through `::riverorm`
extern crate self as riverorm;

pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod model;
pub mod naming;

pub use config::OrmConfig;
pub use database::{
    create_database, create_database_from_dsn, ConnectionRegistry, Database, DatabaseAdapter,
    DatabaseConfig, DatabaseError, DatabaseResult, DatabaseType, DatabaseValue, Row,
};
#[cfg(feature = "mysql")]
pub use database::MySqlDatabase;
#[cfg(feature = "postgres")]
pub use database::PostgresDatabase;
pub use error::{ConfigError, Error, Result};
pub use logging::init_logging;
pub use model::{FieldDescriptor, FieldType, Model, ModelSchema};

#[cfg(feature = "macros")]
pub use riverorm_macros::Model;

#[doc(hidden)]
pub mod __private {
    pub use once_cell::sync::OnceCell;
}
