//! Per-type mapping metadata
//!
//! Declares how an entity type maps to its table: id column, ordered columns,
//! which attributes are lazy or transient, and the one-to-many / many-to-one
//! joins to other registered types. Built once per type and shared by every
//! instance through an `Arc`.

use std::collections::{BTreeMap, BTreeSet};

/// One-to-many join: many rows of `related_type` point back at this entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneToMany {
    /// Registered type name of the related entities
    pub related_type: String,
    /// Local column whose value is matched (the id column or an attribute)
    pub join_column: String,
    /// Column on the related table holding the join value
    pub foreign_key: String,
    /// When set, resolve into a map keyed by this related column
    pub mapped_by: Option<String>,
}

impl OneToMany {
    pub fn new(
        related_type: impl Into<String>,
        join_column: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            related_type: related_type.into(),
            join_column: join_column.into(),
            foreign_key: foreign_key.into(),
            mapped_by: None,
        }
    }

    /// Key the resolved collection by `column` instead of returning a list
    pub fn mapped_by(mut self, column: impl Into<String>) -> Self {
        self.mapped_by = Some(column.into());
        self
    }
}

/// Many-to-one join: this entity points at a single `related_type` row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManyToOne {
    /// Registered type name of the related entity
    pub related_type: String,
    /// Local column holding the join value (the id column or an attribute)
    pub join_column: String,
    /// Column on the related table matched against the join value
    pub foreign_key: String,
}

impl ManyToOne {
    pub fn new(
        related_type: impl Into<String>,
        join_column: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            related_type: related_type.into(),
            join_column: join_column.into(),
            foreign_key: foreign_key.into(),
        }
    }
}

/// Immutable mapping description of one entity type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMetadata {
    type_name: String,
    table: String,
    id_column: String,
    columns: Vec<String>,
    lazy: BTreeSet<String>,
    transient: BTreeSet<String>,
    one_to_many: BTreeMap<String, OneToMany>,
    many_to_one: BTreeMap<String, ManyToOne>,
}

impl EntityMetadata {
    /// Start describing the type registered as `type_name`
    pub fn builder(type_name: impl Into<String>) -> EntityMetadataBuilder {
        EntityMetadataBuilder::new(type_name.into())
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    /// All declared columns, in declaration order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn one_to_many(&self) -> &BTreeMap<String, OneToMany> {
        &self.one_to_many
    }

    pub fn many_to_one(&self) -> &BTreeMap<String, ManyToOne> {
        &self.many_to_one
    }

    pub fn lazy_columns(&self) -> impl Iterator<Item = &str> {
        self.lazy.iter().map(String::as_str)
    }

    pub fn is_lazy(&self, name: &str) -> bool {
        self.lazy.contains(name)
    }

    pub fn is_transient(&self, name: &str) -> bool {
        self.transient.contains(name)
    }

    pub fn is_relationship(&self, name: &str) -> bool {
        self.one_to_many.contains_key(name) || self.many_to_one.contains_key(name)
    }

    pub fn has_relationships(&self) -> bool {
        !self.one_to_many.is_empty() || !self.many_to_one.is_empty()
    }

    /// Relationship names, many-to-one first
    pub fn relationship_names(&self) -> impl Iterator<Item = &str> {
        self.many_to_one
            .keys()
            .chain(self.one_to_many.keys())
            .map(String::as_str)
    }

    /// Whether `name` is a declared scalar attribute (persistent or transient)
    pub fn is_attribute(&self, name: &str) -> bool {
        name == self.id_column || self.columns.iter().any(|c| c == name)
    }

    /// Columns written by INSERT/UPDATE: declared minus transient,
    /// relationship-backed and id columns
    pub fn persistent_columns(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .map(String::as_str)
            .filter(move |c| {
                *c != self.id_column && !self.is_transient(c) && !self.is_relationship(c)
            })
    }

    /// Columns fetched by the default point query (persistent minus lazy)
    pub fn eager_columns(&self) -> impl Iterator<Item = &str> {
        self.persistent_columns().filter(move |c| !self.is_lazy(c))
    }
}

/// Builder for [`EntityMetadata`]
#[derive(Debug, Clone)]
pub struct EntityMetadataBuilder {
    inner: EntityMetadata,
}

impl EntityMetadataBuilder {
    fn new(type_name: String) -> Self {
        Self {
            inner: EntityMetadata {
                table: type_name.to_lowercase(),
                type_name,
                id_column: "id".to_string(),
                columns: Vec::new(),
                lazy: BTreeSet::new(),
                transient: BTreeSet::new(),
                one_to_many: BTreeMap::new(),
                many_to_one: BTreeMap::new(),
            },
        }
    }

    /// Override the table name (defaults to the lower-cased type name)
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.inner.table = table.into();
        self
    }

    /// Override the id column (defaults to `id`)
    pub fn id_column(mut self, column: impl Into<String>) -> Self {
        self.inner.id_column = column.into();
        self
    }

    /// Declare a column; duplicates are ignored
    pub fn column(mut self, column: impl Into<String>) -> Self {
        let column = column.into();
        if !self.inner.columns.contains(&column) {
            self.inner.columns.push(column);
        }
        self
    }

    /// Declare a lazy column, adding it to the column list if needed
    pub fn lazy(mut self, column: impl Into<String>) -> Self {
        let column = column.into();
        self.inner.lazy.insert(column.clone());
        self.column(column)
    }

    /// Declare a transient attribute (held in memory, never persisted)
    pub fn transient(mut self, column: impl Into<String>) -> Self {
        let column = column.into();
        self.inner.transient.insert(column.clone());
        self.column(column)
    }

    pub fn one_to_many(mut self, name: impl Into<String>, relation: OneToMany) -> Self {
        self.inner.one_to_many.insert(name.into(), relation);
        self
    }

    pub fn many_to_one(mut self, name: impl Into<String>, relation: ManyToOne) -> Self {
        self.inner.many_to_one.insert(name.into(), relation);
        self
    }

    pub fn build(self) -> EntityMetadata {
        self.inner
    }
}
