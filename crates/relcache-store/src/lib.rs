//! relcache store - SQLite storage adapter
//!
//! Provides:
//! - Connection helpers (open, open in memory, configure)
//! - [`SqliteConnection`], the `rusqlite` implementation of the engine's
//!   connection and cursor capability

pub mod connection;
pub mod db;
pub mod errors;

// Re-export key types
pub use connection::SqliteConnection;
pub use errors::Result;
