//! Sessions: service registry and transaction boundary
//!
//! A [`Session`] owns one [`EntityService`] (and with it one cache) per
//! registered type, all sharing a single connection. It is the unit of work:
//! pending writes held by the caches reach storage when a cache evicts, when
//! a transaction boundary is crossed, or at [`Session::end_session`].
//!
//! # Transactions
//!
//! Outside a transaction every write commits on its own. Between
//! [`begin_transaction`](Session::begin_transaction) and
//! [`end_transaction`](Session::end_transaction) writes are left
//! uncommitted. Both boundaries flush every cache first, so the transaction
//! holds exactly the mutations made inside it. Nested transactions are not
//! supported: a second `begin_transaction` only re-sets the flag.
//!
//! # Threading
//!
//! A session and everything it hands out are single-threaded (`!Send`).

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use relcache_core_types::SessionId;

use crate::config::SessionConfig;
use crate::connection::Connection;
use crate::errors::{OrmError, Result};
use crate::executor::SafeExecutor;
use crate::metadata::EntityMetadata;
use crate::model::Model;
use crate::service::EntityService;
use crate::{log_op_end, log_op_error, log_op_start};

/// State shared between a session and the services it created
pub(crate) struct SessionInner {
    id: SessionId,
    connection: Rc<dyn Connection>,
    config: SessionConfig,
    in_transaction: Rc<Cell<bool>>,
    services: RefCell<BTreeMap<String, Rc<EntityService>>>,
}

impl SessionInner {
    pub(crate) fn service(&self, type_name: &str) -> Result<Rc<EntityService>> {
        self.services
            .borrow()
            .get(type_name)
            .cloned()
            .ok_or_else(|| OrmError::NoRegisteredEntity {
                type_name: type_name.to_string(),
            })
    }

    fn all_services(&self) -> Vec<Rc<EntityService>> {
        self.services.borrow().values().cloned().collect()
    }
}

/// A unit of work over one connection
pub struct Session {
    inner: Rc<SessionInner>,
    ended: bool,
}

impl Session {
    /// Open a session over `connection`
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if the configuration does not validate.
    pub fn new(connection: Rc<dyn Connection>, config: SessionConfig) -> Result<Self> {
        config.validate()?;
        let id = SessionId::new();
        tracing::debug!(session_id = id.as_str(), "session opened");
        Ok(Self {
            inner: Rc::new(SessionInner {
                id,
                connection,
                config,
                in_transaction: Rc::new(Cell::new(false)),
                services: RefCell::new(BTreeMap::new()),
            }),
            ended: false,
        })
    }

    pub fn id(&self) -> &SessionId {
        &self.inner.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn in_transaction(&self) -> bool {
        self.inner.in_transaction.get()
    }

    /// Register a typed model
    pub fn register<M: Model>(&self) -> Result<&Self> {
        self.register_metadata(M::metadata())
    }

    /// Register a type described at runtime
    ///
    /// # Errors
    ///
    /// `ServiceAlreadyRegistered` if a service already exists for the type.
    pub fn register_metadata(&self, metadata: Arc<EntityMetadata>) -> Result<&Self> {
        let type_name = metadata.type_name().to_string();
        self.observe("register", || {
            if self.is_registered(&type_name) {
                return Err(OrmError::ServiceAlreadyRegistered {
                    type_name: type_name.clone(),
                });
            }
            let executor = SafeExecutor::new(
                self.inner.connection.clone(),
                self.inner.in_transaction.clone(),
                type_name.clone(),
            );
            let service = EntityService::new(
                metadata,
                executor,
                self.inner.config.capacity_for(&type_name),
                Rc::downgrade(&self.inner),
                self.inner.id.clone(),
            );
            self.inner
                .services
                .borrow_mut()
                .insert(type_name.clone(), Rc::new(service));
            Ok(())
        })?;
        Ok(self)
    }

    /// Register several types; stops at the first failure
    pub fn register_all(
        &self,
        metadata: impl IntoIterator<Item = Arc<EntityMetadata>>,
    ) -> Result<&Self> {
        for meta in metadata {
            self.register_metadata(meta)?;
        }
        Ok(self)
    }

    pub fn is_registered(&self, type_name: &str) -> bool {
        self.inner.services.borrow().contains_key(type_name)
    }

    /// Service for a registered type name
    ///
    /// # Errors
    ///
    /// `NoRegisteredEntity` if the type was never registered.
    pub fn service(&self, type_name: &str) -> Result<Rc<EntityService>> {
        self.inner.service(type_name)
    }

    pub fn service_of<M: Model>(&self) -> Result<Rc<EntityService>> {
        self.service(M::NAME)
    }

    /// Write back every cache
    ///
    /// Every cache is flushed even if one fails; the first failure is returned.
    pub fn flush(&self) -> Result<()> {
        self.observe("flush", || self.flush_all())
    }

    /// Flush every cache, then stop committing writes individually
    pub fn begin_transaction(&self) -> Result<()> {
        self.observe("begin_transaction", || {
            self.flush_all()?;
            self.inner.in_transaction.set(true);
            Ok(())
        })
    }

    /// Flush every cache and commit
    pub fn end_transaction(&self) -> Result<()> {
        self.observe("end_transaction", || {
            self.flush_all()?;
            self.commit()?;
            self.inner.in_transaction.set(false);
            Ok(())
        })
    }

    /// Roll back and drop every cached entity without writing it back
    ///
    /// Handles obtained before the rollback keep their in-memory state, which
    /// may no longer match storage.
    pub fn rollback_transaction(&self) -> Result<()> {
        self.observe("rollback_transaction", || self.rollback())
    }

    /// Run `f` inside a transaction
    ///
    /// Commits when `f` returns `Ok`; rolls back and returns the error
    /// otherwise, including when the commit itself fails.
    pub fn transactional<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        E: From<OrmError>,
        F: FnOnce(&Session) -> std::result::Result<T, E>,
    {
        self.begin_transaction()?;
        let outcome = f(self).and_then(|value| {
            self.end_transaction()?;
            Ok(value)
        });
        if outcome.is_err() && self.in_transaction() {
            if let Err(err) = self.rollback_transaction() {
                tracing::error!(
                    session_id = self.inner.id.as_str(),
                    error = %err,
                    "rollback after failed transactional scope failed"
                );
            }
        }
        outcome
    }

    /// Flush every cache, commit an open transaction and close the session
    ///
    /// Relationship slots of the entities this session loaded are cleared so
    /// their reference cycles can be freed; handles kept past this point
    /// still expose scalar attributes.
    pub fn end_session(mut self) -> Result<()> {
        let result = self.observe("end_session", || {
            let flushed = self.flush_all();
            let committed = if self.in_transaction() {
                self.commit().map(|_| self.inner.in_transaction.set(false))
            } else {
                Ok(())
            };
            flushed.and(committed)
        });
        self.release();
        self.ended = true;
        result
    }

    fn observe<T>(&self, op: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        log_op_start!(op, session_id = self.inner.id.as_str());
        let start = Instant::now();
        let result = f();
        let duration_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => {
                log_op_end!(
                    op,
                    duration_ms = duration_ms,
                    session_id = self.inner.id.as_str()
                );
            }
            Err(err) => {
                log_op_error!(
                    op,
                    err,
                    duration_ms = duration_ms,
                    session_id = self.inner.id.as_str()
                );
            }
        }
        result
    }

    fn flush_all(&self) -> Result<()> {
        let mut first_err = None;
        for service in self.inner.all_services() {
            if let Err(err) = service.flush() {
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn commit(&self) -> Result<()> {
        self.inner
            .connection
            .commit()
            .map_err(|e| OrmError::schema_mismatch("Session", e.message()))
    }

    fn rollback(&self) -> Result<()> {
        let rolled_back = self
            .inner
            .connection
            .rollback()
            .map_err(|e| OrmError::schema_mismatch("Session", e.message()));
        for service in self.inner.all_services() {
            service.invalidate();
        }
        self.inner.in_transaction.set(false);
        rolled_back
    }

    /// Break relationship cycles among the entities that left the caches
    fn release(&self) {
        let mut released = 0usize;
        for service in self.inner.all_services() {
            for entity in service.take_departed() {
                entity.unlink();
                released += 1;
            }
        }
        tracing::debug!(session_id = self.inner.id.as_str(), released, "session released");
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("types", &self.inner.services.borrow().keys().collect::<Vec<_>>())
            .field("in_transaction", &self.in_transaction())
            .finish()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.ended {
            return;
        }
        tracing::warn!(
            session_id = self.inner.id.as_str(),
            "session dropped without end_session"
        );
        let result = if self.in_transaction() {
            self.rollback()
        } else {
            self.flush_all()
        };
        if let Err(err) = result {
            tracing::error!(session_id = self.inner.id.as_str(), error = %err, "implicit session close failed");
        }
        self.release();
    }
}
