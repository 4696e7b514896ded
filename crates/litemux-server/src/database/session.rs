//! Per-connection session adapter.
//!
//! A `Session` holds the database a connection has selected and turns each
//! incoming statement into SQLite calls. MySQL clients issue a handful of
//! statement shapes SQLite must never see verbatim, so every statement is
//! classified first: `SHOW` is substituted with a schema-catalog query,
//! `SET` is acknowledged without touching the engine, row-returning
//! queries go to the read path, and everything else (including text the
//! parser does not understand) goes to the write path.

use std::sync::Arc;

use rusqlite::params_from_iter;
use rusqlite::types::Value;
use sqlparser::ast::Statement;
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;
use tracing::debug;

use super::error::{ServerError, ServerResult};
use super::result::{CellValue, ResultSet, StatementReply};
use super::store::{DbHandle, Store};

/// Logical name used when a client never selects a database.
pub const DEFAULT_DATABASE: &str = "__default__";

/// Catalog query substituted for the protocol's schema-listing syntax.
const CATALOG_TABLES_QUERY: &str = "SELECT name FROM sqlite_master WHERE type='table'";

/// One client connection's view of the store.
///
/// Sessions are never shared between connections and keep no transaction
/// or cursor state between statements.
pub struct Session {
    store: Arc<Store>,
    current_db: String,
    handle: DbHandle,
}

impl Session {
    /// Creates a session with the default database selected.
    pub fn new(store: Arc<Store>) -> ServerResult<Self> {
        let handle = store.get(DEFAULT_DATABASE)?;
        Ok(Self {
            store,
            current_db: DEFAULT_DATABASE.to_string(),
            handle,
        })
    }

    /// Returns the lower-cased name of the selected database.
    pub fn current_database(&self) -> &str {
        &self.current_db
    }

    /// Selects `name` as the active database, creating its backing file
    /// if it does not exist yet.
    ///
    /// On failure the previous selection stays in place.
    pub fn select_database(&mut self, name: &str) -> ServerResult<()> {
        let name = name.to_lowercase();
        let handle = self.store.get(&name)?;
        self.handle = handle;
        self.current_db = name;
        Ok(())
    }

    /// Classifies and executes one statement.
    pub fn handle_statement(&mut self, sql: &str) -> ServerResult<StatementReply> {
        debug!(database = %self.current_db, statement = sql, "statement");

        let statements = match Parser::parse_sql(&MySqlDialect {}, sql) {
            Ok(statements) => statements,
            // Unknown or engine-specific syntax must still reach the
            // engine; let SQLite be the judge of the raw text.
            Err(_) => return self.exec(sql, Vec::new()),
        };

        let Some(first) = statements.first() else {
            // Blank input; acknowledge without bothering the engine.
            return Ok(StatementReply::ok(0, 0));
        };

        match first {
            // The protocol's schema-listing syntax has no SQLite
            // equivalent; answer from the schema catalog instead.
            Statement::ShowTables { .. }
            | Statement::ShowDatabases { .. }
            | Statement::ShowColumns { .. }
            | Statement::ShowVariables { .. }
            | Statement::ShowVariable { .. }
            | Statement::ShowCreate { .. } => self.query(CATALOG_TABLES_QUERY, Vec::new()),
            // Session configuration; clients expect an acknowledgement,
            // not data, and SQLite would reject the syntax.
            Statement::SetRole { .. }
            | Statement::SetVariable { .. }
            | Statement::SetTimeZone { .. }
            | Statement::SetNames { .. }
            | Statement::SetNamesDefault { .. }
            | Statement::SetTransaction { .. }
            | Statement::SetSessionParam(_) => Ok(StatementReply::ok(0, 0)),
            Statement::Query(_) => self.query(sql, Vec::new()),
            _ => self.exec(sql, Vec::new()),
        }
    }

    /// Validates a statement for preparation.
    ///
    /// Returns the positional-parameter count as both the parameter count
    /// and the column count; the column count is advisory metadata only
    /// and may differ from the real projection width.
    pub fn prepare(&mut self, sql: &str) -> ServerResult<(usize, usize)> {
        Parser::parse_sql(&MySqlDialect {}, sql)?;

        let conn = self.handle.lock().unwrap();
        let stmt = conn.prepare(sql)?;
        let params = stmt.parameter_count();

        Ok((params, params))
    }

    /// Executes a previously prepared statement with its bound arguments.
    ///
    /// Always routed through the write path, whatever the statement kind.
    pub fn execute_prepared(&mut self, sql: &str, args: Vec<Value>) -> ServerResult<StatementReply> {
        debug!(database = %self.current_db, statement = sql, "execute prepared");
        self.exec(sql, args)
    }

    /// Field-list requests are never serviced.
    pub fn list_fields(&self, _table: &str, _wildcard: &str) -> ServerResult<()> {
        Err(ServerError::Unsupported("field list"))
    }

    /// Command bytes outside the query/prepare surface are never serviced.
    pub fn other_command(&self, command: u8, payload: &[u8]) -> ServerResult<()> {
        debug!(command, payload = ?payload, "unhandled command");
        Err(ServerError::Unsupported("command"))
    }

    /// Write path: execute for effect, report counters.
    fn exec(&self, sql: &str, args: Vec<Value>) -> ServerResult<StatementReply> {
        let conn = self.handle.lock().unwrap();
        let rows_affected = conn.execute(sql, params_from_iter(args))?;
        let last_insert_id = conn.last_insert_rowid();
        Ok(StatementReply::ok(rows_affected as u64, last_insert_id as u64))
    }

    /// Read path: execute, capture column names, scan and coerce every
    /// row. The cursor is dropped on every exit path.
    fn query(&self, sql: &str, args: Vec<Value>) -> ServerResult<StatementReply> {
        let conn = self.handle.lock().unwrap();
        let mut stmt = conn.prepare(sql)?;
        let fields: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect();

        let mut result_set = ResultSet {
            fields,
            rows: Vec::new(),
        };
        let mut rows = stmt.query(params_from_iter(args))?;
        while let Some(row) = rows.next()? {
            let mut cells = Vec::with_capacity(result_set.fields.len());
            for index in 0..result_set.fields.len() {
                cells.push(CellValue::coerce(row.get_ref(index)?));
            }
            result_set.rows.push(cells);
        }

        Ok(StatementReply::Rows(result_set))
    }
}
