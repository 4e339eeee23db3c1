//! Named driver store with an optional default alias.

use tracing::{debug, warn};

use crate::database::{Database, DatabaseError, DatabaseResult};

/// Owns drivers under unique aliases.
///
/// The first registration becomes the default unless one was set before.
/// Lookups with `None` resolve the default alias.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: Vec<(String, Box<dyn Database>)>,
    default: Option<String>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a driver under `alias`.
    pub fn register(
        &mut self,
        alias: impl Into<String>,
        database: Box<dyn Database>,
    ) -> DatabaseResult<()> {
        let alias = alias.into();
        if self.contains(&alias) {
            return Err(DatabaseError::Registry(format!(
                "DB alias '{}' is already registered.",
                alias
            )));
        }
        debug!(alias = %alias, database = %database.database_type(), "registered database");
        if self.default.is_none() {
            self.default = Some(alias.clone());
        }
        self.connections.push((alias, database));
        Ok(())
    }

    /// Make an already registered alias the default.
    pub fn set_default(&mut self, alias: &str) -> DatabaseResult<()> {
        if !self.contains(alias) {
            return Err(DatabaseError::Registry(format!(
                "DB alias '{}' is not registered.",
                alias
            )));
        }
        self.default = Some(alias.to_string());
        Ok(())
    }

    pub fn default_alias(&self) -> Option<&str> {
        self.default.as_deref()
    }

    fn resolve<'a>(&'a self, alias: Option<&'a str>) -> DatabaseResult<&'a str> {
        if self.connections.is_empty() {
            return Err(DatabaseError::Registry(
                "No database connections registered.".to_string(),
            ));
        }
        alias.or(self.default.as_deref()).ok_or_else(|| {
            DatabaseError::Registry("No database connection found for alias 'default'.".to_string())
        })
    }

    fn position(&self, alias: Option<&str>) -> DatabaseResult<usize> {
        let alias = self.resolve(alias)?;
        self.connections
            .iter()
            .position(|(name, _)| name == alias)
            .ok_or_else(|| {
                DatabaseError::Registry(format!(
                    "No database connection found for alias '{}'.",
                    alias
                ))
            })
    }

    /// Driver registered under `alias`, or the default driver for `None`.
    pub fn get(&self, alias: Option<&str>) -> DatabaseResult<&dyn Database> {
        let index = self.position(alias)?;
        let database: &dyn Database = self.connections[index].1.as_ref();
        Ok(database)
    }

    /// Mutable form of [`ConnectionRegistry::get`], needed for I/O.
    pub fn get_mut(&mut self, alias: Option<&str>) -> DatabaseResult<&mut dyn Database> {
        let index = self.position(alias)?;
        let database: &mut dyn Database = self.connections[index].1.as_mut();
        Ok(database)
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.connections.iter().any(|(name, _)| name == alias)
    }

    /// Aliases in registration order
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.connections.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Drop every driver and unset the default.
    pub fn clear(&mut self) {
        self.connections.clear();
        self.default = None;
    }

    /// Connect every driver that is not connected yet, in registration order.
    ///
    /// Stops at the first failure; drivers after it stay disconnected.
    pub async fn connect_all(&mut self) -> DatabaseResult<()> {
        for (alias, database) in self.connections.iter_mut() {
            if database.is_connected() {
                continue;
            }
            if let Err(e) = database.connect().await {
                warn!(alias = %alias, error = %e, "failed to connect database");
                return Err(e);
            }
        }
        Ok(())
    }

    /// Close every connected driver, in registration order.
    pub async fn close_all(&mut self) -> DatabaseResult<()> {
        for (alias, database) in self.connections.iter_mut() {
            if !database.is_connected() {
                continue;
            }
            if let Err(e) = database.close().await {
                warn!(alias = %alias, error = %e, "failed to close database");
                return Err(e);
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("aliases", &self.aliases().collect::<Vec<_>>())
            .field("default", &self.default)
            .finish()
    }
}
