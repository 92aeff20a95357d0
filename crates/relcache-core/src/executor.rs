//! Safe statement execution
//!
//! [`SafeExecutor`] is the only place the engine touches a [`Connection`].
//! Any driver failure, including a failed commit, comes back as
//! [`OrmError::SchemaMismatch`] tagged with the executing type.

use std::cell::Cell;
use std::rc::Rc;

use crate::connection::Connection;
use crate::errors::{OrmError, Result, StorageError};
use crate::statement::Statement;
use crate::value::Row;

/// Statement runner bound to one entity type
#[derive(Clone)]
pub struct SafeExecutor {
    connection: Rc<dyn Connection>,
    in_transaction: Rc<Cell<bool>>,
    type_name: String,
}

impl SafeExecutor {
    pub fn new(
        connection: Rc<dyn Connection>,
        in_transaction: Rc<Cell<bool>>,
        type_name: impl Into<String>,
    ) -> Self {
        Self {
            connection,
            in_transaction,
            type_name: type_name.into(),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    fn wrap(&self, err: StorageError) -> OrmError {
        OrmError::schema_mismatch(&self.type_name, err.message())
    }

    /// Run a query and return every row
    pub fn query(&self, stmt: &Statement) -> Result<Vec<Row>> {
        tracing::debug!(entity_type = %self.type_name, sql = %stmt.sql, "query");
        let mut cursor = self.connection.cursor();
        cursor
            .execute(&stmt.sql, &stmt.params)
            .map_err(|e| self.wrap(e))?;
        Ok(cursor.fetch_all())
    }

    /// Run a query and return its first row, if any
    pub fn query_one(&self, stmt: &Statement) -> Result<Option<Row>> {
        tracing::debug!(entity_type = %self.type_name, sql = %stmt.sql, "query_one");
        let mut cursor = self.connection.cursor();
        cursor
            .execute(&stmt.sql, &stmt.params)
            .map_err(|e| self.wrap(e))?;
        Ok(cursor.fetch_one())
    }

    /// Run a write statement, committing unless a transaction is open
    ///
    /// Returns the id generated by the statement when it was an INSERT.
    pub fn write(&self, stmt: &Statement) -> Result<Option<i64>> {
        tracing::debug!(
            entity_type = %self.type_name,
            sql = %stmt.sql,
            in_transaction = self.in_transaction.get(),
            "write"
        );
        let id = {
            let mut cursor = self.connection.cursor();
            cursor
                .execute(&stmt.sql, &stmt.params)
                .map_err(|e| self.wrap(e))?;
            cursor.last_insert_id()
        };
        if !self.in_transaction.get() {
            self.connection.commit().map_err(|e| self.wrap(e))?;
        }
        Ok(id)
    }
}
