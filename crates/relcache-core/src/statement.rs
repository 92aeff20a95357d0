//! SQL generation for the statements the engine issues
//!
//! All statements are built from [`EntityMetadata`] and an entity's current
//! state. Values always travel as parameters.

use std::fmt;

use crate::entity::Entity;
use crate::metadata::EntityMetadata;
use crate::value::Value;

/// A SQL string with its positional parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    fn new(sql: String, params: Vec<Value>) -> Self {
        Self { sql, params }
    }

    /// INSERT of every persistent column with an explicit column list
    pub fn insert(entity: &Entity) -> Self {
        let meta = entity.metadata();
        let columns = entity.all_persistent();
        if columns.is_empty() {
            return Self::new(format!("INSERT INTO {} DEFAULT VALUES", meta.table()), Vec::new());
        }
        let names = columns
            .iter()
            .map(|(name, _)| format!("`{}`", name))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = vec!["?"; columns.len()].join(", ");
        Self::new(
            format!("INSERT INTO {} ({}) VALUES ({})", meta.table(), names, placeholders),
            columns.into_iter().map(|(_, value)| value).collect(),
        )
    }

    /// UPDATE by id of every loaded persistent column; `None` if nothing is loaded
    pub fn update(entity: &Entity) -> Option<Self> {
        let meta = entity.metadata();
        let id = entity.id()?;
        let columns = entity.loaded_persistent();
        if columns.is_empty() {
            return None;
        }
        let assignments = columns
            .iter()
            .map(|(name, _)| format!("{} = ?", name))
            .collect::<Vec<_>>()
            .join(", ");
        let mut params: Vec<Value> = columns.into_iter().map(|(_, v)| v.clone()).collect();
        params.push(Value::Integer(id));
        Some(Self::new(
            format!(
                "UPDATE {} SET {} WHERE {} = ?",
                meta.table(),
                assignments,
                meta.id_column()
            ),
            params,
        ))
    }

    /// Point SELECT of the eager columns plus the id column
    pub fn select_eager(meta: &EntityMetadata, id: i64) -> Self {
        let mut fields: Vec<&str> = meta.eager_columns().collect();
        fields.push(meta.id_column());
        Self::new(
            format!(
                "SELECT {} FROM {} WHERE {} = ?",
                fields.join(", "),
                meta.table(),
                meta.id_column()
            ),
            vec![Value::Integer(id)],
        )
    }

    /// Point SELECT of a single lazy column
    pub fn select_lazy(meta: &EntityMetadata, attribute: &str, id: i64) -> Self {
        Self::new(
            format!(
                "SELECT {} FROM {} WHERE {} = ?",
                attribute,
                meta.table(),
                meta.id_column()
            ),
            vec![Value::Integer(id)],
        )
    }

    /// DELETE by id
    pub fn delete(meta: &EntityMetadata, id: i64) -> Self {
        Self::new(
            format!("DELETE FROM {} WHERE {} = ?", meta.table(), meta.id_column()),
            vec![Value::Integer(id)],
        )
    }

    /// SELECT of the id column of rows whose `column` equals `value`
    pub fn select_ids_where(meta: &EntityMetadata, column: &str, value: Value) -> Self {
        Self::new(
            format!(
                "SELECT {} FROM {} WHERE {} = ? ORDER BY {}",
                meta.id_column(),
                meta.table(),
                column,
                meta.id_column()
            ),
            vec![value],
        )
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}
