//! Storage connection capability
//!
//! The engine talks to the relational store only through these two traits,
//! modelled on a DB-API style cursor. Drivers live in other crates (see
//! `relcache-store` for SQLite).
//!
//! Generated SQL uses `?` placeholders, one per element of `params`.
//! A driver with a different placeholder style rewrites them.
//!
//! Transaction semantics follow DB-API: the first write after a commit or
//! rollback implicitly opens a transaction that stays open until
//! [`Connection::commit`] or [`Connection::rollback`].

use crate::errors::StorageError;
use crate::value::{Row, Value};

/// A live connection to the relational store
pub trait Connection {
    /// Open a cursor scoped to one or more statements
    fn cursor(&self) -> Box<dyn Cursor + '_>;

    fn commit(&self) -> std::result::Result<(), StorageError>;

    fn rollback(&self) -> std::result::Result<(), StorageError>;
}

/// An executable handle over a connection
pub trait Cursor {
    /// Execute one statement, buffering any result rows
    fn execute(&mut self, sql: &str, params: &[Value]) -> std::result::Result<(), StorageError>;

    /// Next buffered row, if any
    fn fetch_one(&mut self) -> Option<Row>;

    /// All remaining buffered rows
    fn fetch_all(&mut self) -> Vec<Row>;

    /// Id generated by the most recent INSERT on this connection
    fn last_insert_id(&self) -> Option<i64>;
}
