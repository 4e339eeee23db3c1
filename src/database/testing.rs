//! In-memory driver that records statements and replays scripted rows.

use async_trait::async_trait;
use std::collections::VecDeque;

use crate::database::adapters::adapter_for;
use crate::database::{
    prepare_fetch, prepare_fetchrow, prepare_update, Database, DatabaseAdapter, DatabaseError,
    DatabaseResult, DatabaseType, DatabaseValue, Row,
};

pub(crate) struct RecordingDatabase {
    db_type: DatabaseType,
    dsn: String,
    connected: bool,
    fail_connect: bool,
    pub(crate) statements: Vec<(String, Vec<DatabaseValue>)>,
    responses: VecDeque<Vec<Row>>,
    affected: u64,
}

impl RecordingDatabase {
    pub(crate) fn new(db_type: DatabaseType) -> Self {
        Self {
            db_type,
            dsn: format!("{}://test:test@localhost/test", db_type),
            connected: false,
            fail_connect: false,
            statements: Vec::new(),
            responses: VecDeque::new(),
            affected: 1,
        }
    }

    /// A driver that is already connected.
    pub(crate) fn connected(db_type: DatabaseType) -> Self {
        let mut db = Self::new(db_type);
        db.connected = true;
        db
    }

    /// A driver whose `connect` always fails.
    pub(crate) fn unreachable(db_type: DatabaseType) -> Self {
        let mut db = Self::new(db_type);
        db.fail_connect = true;
        db
    }

    /// Queue the rows returned by the next fetch or fetchrow.
    pub(crate) fn respond(&mut self, rows: Vec<Row>) {
        self.responses.push_back(rows);
    }

    pub(crate) fn set_affected(&mut self, affected: u64) {
        self.affected = affected;
    }

    pub(crate) fn last_sql(&self) -> Option<&str> {
        self.statements.last().map(|(sql, _)| sql.as_str())
    }

    pub(crate) fn last_params(&self) -> Option<&[DatabaseValue]> {
        self.statements.last().map(|(_, params)| params.as_slice())
    }

    fn ensure_connected(&self) -> DatabaseResult<()> {
        if self.connected {
            Ok(())
        } else {
            Err(DatabaseError::not_established())
        }
    }

    fn record(&mut self, sql: String, params: &[DatabaseValue]) {
        self.statements.push((sql, params.to_vec()));
    }
}

#[async_trait]
impl Database for RecordingDatabase {
    fn database_type(&self) -> DatabaseType {
        self.db_type
    }

    fn adapter(&self) -> &dyn DatabaseAdapter {
        adapter_for(self.db_type)
    }

    fn dsn(&self) -> &str {
        &self.dsn
    }

    fn set_dsn(&mut self, dsn: &str) {
        self.dsn = dsn.to_string();
    }

    fn is_debug(&self) -> bool {
        false
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn connect(&mut self) -> DatabaseResult<()> {
        if self.connected {
            return Err(DatabaseError::already_established());
        }
        if self.fail_connect {
            return Err(DatabaseError::Connection("connection refused".to_string()));
        }
        self.connected = true;
        Ok(())
    }

    async fn close(&mut self) -> DatabaseResult<()> {
        if !self.connected {
            return Err(DatabaseError::already_closed());
        }
        self.connected = false;
        Ok(())
    }

    async fn execute(&mut self, query: &str, params: &[DatabaseValue]) -> DatabaseResult<u64> {
        self.ensure_connected()?;
        self.record(query.to_string(), params);
        Ok(self.affected)
    }

    async fn fetch(&mut self, query: &str, params: &[DatabaseValue]) -> DatabaseResult<Vec<Row>> {
        self.ensure_connected()?;
        let query = prepare_fetch(query)?;
        self.record(query, params);
        Ok(self.responses.pop_front().unwrap_or_default())
    }

    async fn fetchrow(
        &mut self,
        query: &str,
        params: &[DatabaseValue],
    ) -> DatabaseResult<Option<Row>> {
        self.ensure_connected()?;
        let query = prepare_fetchrow(query, self.adapter().supports_returning())?;
        self.record(query, params);
        Ok(self
            .responses
            .pop_front()
            .and_then(|rows| rows.into_iter().next()))
    }

    async fn update(&mut self, query: &str, params: &[DatabaseValue]) -> DatabaseResult<u64> {
        self.ensure_connected()?;
        let query = prepare_update(query)?;
        self.record(query, params);
        Ok(self.affected)
    }
}
