//! `rusqlite` implementation of the engine's connection capability
//!
//! Writes follow DB-API transaction semantics: the first INSERT, UPDATE or
//! DELETE on a connection in autocommit mode opens a transaction, which stays
//! open until [`Connection::commit`] or [`Connection::rollback`]. Queries
//! never open one.

use std::collections::VecDeque;
use std::path::Path;

use relcache_core::{Connection, Cursor, Row, StorageError, Value};
use rusqlite::types::Value as SqlValue;

use crate::db;
use crate::errors::{from_rusqlite, Result};

/// A SQLite connection usable by a relcache session
pub struct SqliteConnection {
    conn: rusqlite::Connection,
}

impl SqliteConnection {
    pub fn new(conn: rusqlite::Connection) -> Self {
        Self { conn }
    }

    /// Open (creating if needed) and configure a database file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        db::open(path).map(Self::new)
    }

    pub fn open_in_memory() -> Result<Self> {
        db::open_in_memory().map(Self::new)
    }

    /// The underlying connection, for schema setup and inspection
    pub fn raw(&self) -> &rusqlite::Connection {
        &self.conn
    }

    pub fn into_inner(self) -> rusqlite::Connection {
        self.conn
    }

    fn end_transaction(&self, command: &str) -> std::result::Result<(), StorageError> {
        if self.conn.is_autocommit() {
            return Ok(());
        }
        tracing::debug!(command, "sqlite transaction end");
        self.conn.execute_batch(command).map_err(from_rusqlite)
    }
}

impl Connection for SqliteConnection {
    fn cursor(&self) -> Box<dyn Cursor + '_> {
        Box::new(SqliteCursor {
            conn: &self.conn,
            rows: VecDeque::new(),
            last_id: None,
        })
    }

    fn commit(&self) -> std::result::Result<(), StorageError> {
        self.end_transaction("COMMIT")
    }

    fn rollback(&self) -> std::result::Result<(), StorageError> {
        self.end_transaction("ROLLBACK")
    }
}

/// Cursor buffering the rows of its last query
pub struct SqliteCursor<'conn> {
    conn: &'conn rusqlite::Connection,
    rows: VecDeque<Row>,
    last_id: Option<i64>,
}

impl Cursor for SqliteCursor<'_> {
    fn execute(&mut self, sql: &str, params: &[Value]) -> std::result::Result<(), StorageError> {
        let mut stmt = self.conn.prepare(sql).map_err(from_rusqlite)?;
        let params = rusqlite::params_from_iter(params.iter().map(to_sql));
        self.rows.clear();

        if stmt.column_count() > 0 {
            let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
            let mut rows = stmt.query(params).map_err(from_rusqlite)?;
            while let Some(row) = rows.next().map_err(from_rusqlite)? {
                let values = (0..columns.len())
                    .map(|i| row.get::<_, SqlValue>(i).map(from_sql))
                    .collect::<rusqlite::Result<Vec<_>>>()
                    .map_err(from_rusqlite)?;
                self.rows.push_back(Row::new(columns.clone(), values));
            }
            return Ok(());
        }

        let opened = self.conn.is_autocommit();
        if opened {
            self.conn.execute_batch("BEGIN").map_err(from_rusqlite)?;
        }
        if let Err(err) = stmt.execute(params) {
            if opened {
                if let Err(rollback) = self.conn.execute_batch("ROLLBACK") {
                    tracing::warn!(error = %rollback, "rollback after failed write failed");
                }
            }
            return Err(from_rusqlite(err));
        }
        if is_insert(sql) {
            self.last_id = Some(self.conn.last_insert_rowid());
        }
        Ok(())
    }

    fn fetch_one(&mut self) -> Option<Row> {
        self.rows.pop_front()
    }

    fn fetch_all(&mut self) -> Vec<Row> {
        self.rows.drain(..).collect()
    }

    fn last_insert_id(&self) -> Option<i64> {
        self.last_id
    }
}

fn is_insert(sql: &str) -> bool {
    sql.trim_start()
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("INSERT"))
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(i) => SqlValue::Integer(*i),
        Value::Real(f) => SqlValue::Real(*f),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Blob(b) => SqlValue::Blob(b.clone()),
    }
}

fn from_sql(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(i) => Value::Integer(i),
        SqlValue::Real(f) => Value::Real(f),
        SqlValue::Text(s) => Value::Text(s),
        SqlValue::Blob(b) => Value::Blob(b),
    }
}
