//! relcache core - entity cache and relationship-resolution engine
//!
//! This crate maps typed entities to relational rows through a minimal
//! cursor capability, including:
//! - Per-type mapping metadata (lazy, transient, one-to-many, many-to-one)
//! - Shared entity handles with dirty/persisted/deleted/initialized tracking
//! - A bounded least-frequently-used cache per type with write-back on eviction
//! - Per-type services resolving relationships with cycle suppression
//! - Sessions owning the service registry and the transaction boundary
//!
//! All state is single-threaded and owned by one [`Session`]; a session is
//! not `Send` and must not be shared across threads.

pub mod cache;
pub mod config;
pub mod connection;
pub mod entity;
pub mod errors;
pub mod executor;
pub mod logging_facility;
pub mod metadata;
pub mod model;
pub mod service;
pub mod session;
pub mod statement;
pub mod value;

#[cfg(test)]
pub(crate) mod test_support;

pub use relcache_core_types as core_types;

#[doc(hidden)]
pub use paste as __paste;
#[doc(hidden)]
pub use tracing as __tracing;

// Re-export commonly used types
pub use cache::{CacheStats, EntityCache};
pub use config::SessionConfig;
pub use connection::{Connection, Cursor};
pub use entity::{EntityRef, Related};
pub use errors::{ErrorKind, OrmError, Result, StorageError};
pub use metadata::{EntityMetadata, ManyToOne, OneToMany};
pub use model::Model;
pub use service::EntityService;
pub use session::Session;
pub use value::{FromValue, Row, Value};
