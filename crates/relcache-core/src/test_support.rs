//! Scripted in-memory connection for engine unit tests

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::sync::Arc;

use crate::connection::{Connection, Cursor};
use crate::errors::StorageError;
use crate::metadata::EntityMetadata;
use crate::value::{Row, Value};

type Responder = Box<dyn Fn(&[Value]) -> Vec<Row>>;

/// Connection that records every statement and answers queries from scripts
///
/// A script is matched when its pattern is a substring of the SQL. INSERTs
/// hand out ids from an increasing counter starting at 1.
pub(crate) struct RecordingConnection {
    log: RefCell<Vec<(String, Vec<Value>)>>,
    scripts: RefCell<Vec<(String, Responder)>>,
    failures: RefCell<Vec<String>>,
    next_id: Cell<i64>,
    commits: Cell<usize>,
    rollbacks: Cell<usize>,
}

impl RecordingConnection {
    pub(crate) fn new() -> Self {
        Self {
            log: RefCell::new(Vec::new()),
            scripts: RefCell::new(Vec::new()),
            failures: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
            commits: Cell::new(0),
            rollbacks: Cell::new(0),
        }
    }

    /// Answer matching queries with a fixed row set
    pub(crate) fn push_rows(&self, pattern: &str, rows: Vec<Row>) {
        self.respond(pattern, move |_| rows.clone());
    }

    /// Answer matching queries with rows computed from the parameters
    pub(crate) fn respond(&self, pattern: &str, responder: impl Fn(&[Value]) -> Vec<Row> + 'static) {
        let responder: Responder = Box::new(responder);
        self.scripts
            .borrow_mut()
            .push((pattern.to_string(), responder));
    }

    /// Fail every statement containing `pattern`
    pub(crate) fn fail_on(&self, pattern: &str) {
        self.failures.borrow_mut().push(pattern.to_string());
    }

    pub(crate) fn statements(&self) -> Vec<String> {
        self.log.borrow().iter().map(|(sql, _)| sql.clone()).collect()
    }

    pub(crate) fn statements_with(&self, prefix: &str) -> Vec<(String, Vec<Value>)> {
        self.log
            .borrow()
            .iter()
            .filter(|(sql, _)| sql.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub(crate) fn commits(&self) -> usize {
        self.commits.get()
    }

    pub(crate) fn rollbacks(&self) -> usize {
        self.rollbacks.get()
    }
}

impl Connection for RecordingConnection {
    fn cursor(&self) -> Box<dyn Cursor + '_> {
        Box::new(RecordingCursor {
            conn: self,
            rows: VecDeque::new(),
            last_id: None,
        })
    }

    fn commit(&self) -> Result<(), StorageError> {
        self.commits.set(self.commits.get() + 1);
        Ok(())
    }

    fn rollback(&self) -> Result<(), StorageError> {
        self.rollbacks.set(self.rollbacks.get() + 1);
        Ok(())
    }
}

struct RecordingCursor<'a> {
    conn: &'a RecordingConnection,
    rows: VecDeque<Row>,
    last_id: Option<i64>,
}

impl Cursor for RecordingCursor<'_> {
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<(), StorageError> {
        self.conn
            .log
            .borrow_mut()
            .push((sql.to_string(), params.to_vec()));
        if let Some(pattern) = self
            .conn
            .failures
            .borrow()
            .iter()
            .find(|p| sql.contains(p.as_str()))
        {
            return Err(StorageError::new(format!("no such table: {}", pattern)));
        }
        if sql.starts_with("INSERT") {
            let id = self.conn.next_id.get();
            self.conn.next_id.set(id + 1);
            self.last_id = Some(id);
            return Ok(());
        }
        if sql.starts_with("SELECT") {
            let scripts = self.conn.scripts.borrow();
            if let Some((_, responder)) = scripts.iter().find(|(p, _)| sql.contains(p.as_str())) {
                self.rows = responder(params).into();
            }
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

/// Build a row from column/value pairs
pub(crate) fn row(pairs: &[(&str, Value)]) -> Row {
    Row::new(
        pairs.iter().map(|(c, _)| c.to_string()).collect(),
        pairs.iter().map(|(_, v)| v.clone()).collect(),
    )
}

/// `Foo { a }`, a plain table keyed by `id`
pub(crate) fn foo_meta() -> Arc<EntityMetadata> {
    Arc::new(EntityMetadata::builder("Foo").column("a").build())
}

/// Answer eager point queries on `foo` with `a = id * 10`
pub(crate) fn script_foo(conn: &RecordingConnection) {
    conn.respond("SELECT a, id FROM foo", |params| {
        let id = params[0].as_i64().unwrap_or_default();
        vec![row(&[("a", Value::from(id * 10)), ("id", Value::from(id))])]
    });
}
