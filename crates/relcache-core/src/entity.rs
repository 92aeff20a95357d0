//! Entities and shared entity handles
//!
//! An [`Entity`] is the in-memory image of one row plus its resolved
//! relationships. Callers and the cache share it through [`EntityRef`], a
//! single-threaded reference-counted handle: a mutation made through any
//! handle is what the cache writes back on eviction.
//!
//! Handles never leak `RefCell` borrows. Every accessor borrows for the
//! duration of the call only, so the engine can re-enter an entity while
//! resolving a relationship cycle.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::errors::{OrmError, Result};
use crate::metadata::EntityMetadata;
use crate::model::Model;
use crate::value::{FromValue, Row, Value};

/// A resolved relationship slot
#[derive(Clone)]
pub enum Related {
    /// Many-to-one target; `None` when the join value is null
    One(Option<EntityRef>),
    /// One-to-many collection in storage order
    Many(Vec<EntityRef>),
    /// One-to-many collection keyed by the mapped-by column
    Mapped(BTreeMap<String, EntityRef>),
}

impl fmt::Debug for Related {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Related::One(target) => write!(f, "One({:?})", target.as_ref().map(EntityRef::id)),
            Related::Many(items) => {
                write!(f, "Many({:?})", items.iter().map(EntityRef::id).collect::<Vec<_>>())
            }
            Related::Mapped(items) => write!(
                f,
                "Mapped({:?})",
                items.iter().map(|(k, v)| (k, v.id())).collect::<Vec<_>>()
            ),
        }
    }
}

/// In-memory image of one row of a mapped type
pub struct Entity {
    metadata: Arc<EntityMetadata>,
    id: Option<i64>,
    elements: BTreeMap<String, Value>,
    /// Lazy columns not fetched yet
    pending_lazy: BTreeSet<String>,
    relations: BTreeMap<String, Related>,
    persisted: bool,
    dirty: bool,
    deleted: bool,
    initialized: bool,
    /// Set while the service is resolving this entity's relationships
    resolving: bool,
}

impl Entity {
    fn new(metadata: Arc<EntityMetadata>) -> Self {
        let elements = metadata
            .persistent_columns()
            .map(|c| (c.to_string(), Value::Null))
            .collect();
        Self {
            metadata,
            id: None,
            elements,
            pending_lazy: BTreeSet::new(),
            relations: BTreeMap::new(),
            persisted: false,
            dirty: false,
            deleted: false,
            initialized: false,
            resolving: false,
        }
    }

    pub fn metadata(&self) -> &Arc<EntityMetadata> {
        &self.metadata
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub(crate) fn is_resolving(&self) -> bool {
        self.resolving
    }

    /// Loaded persistent attributes in declaration order, for UPDATE
    pub(crate) fn loaded_persistent(&self) -> Vec<(&str, &Value)> {
        self.metadata
            .persistent_columns()
            .filter(|c| !self.pending_lazy.contains(*c))
            .filter_map(|c| self.elements.get(c).map(|v| (c, v)))
            .collect()
    }

    /// Every persistent attribute in declaration order, for INSERT
    pub(crate) fn all_persistent(&self) -> Vec<(&str, Value)> {
        self.metadata
            .persistent_columns()
            .map(|c| (c, self.elements.get(c).cloned().unwrap_or_default()))
            .collect()
    }

    fn value(&self, name: &str) -> Result<Value> {
        if name == self.metadata.id_column() {
            return Ok(Value::from(self.id));
        }
        if self.pending_lazy.contains(name) {
            return Err(OrmError::LazyFieldNotInitialized {
                attribute: name.to_string(),
            });
        }
        if let Some(value) = self.elements.get(name) {
            return Ok(value.clone());
        }
        if self.metadata.is_attribute(name) {
            return Ok(Value::Null);
        }
        Err(self.unknown(name))
    }

    fn unknown(&self, name: &str) -> OrmError {
        OrmError::UnknownAttribute {
            type_name: self.metadata.type_name().to_string(),
            attribute: name.to_string(),
        }
    }

    fn relation(&self, name: &str) -> Result<&Related> {
        if !self.metadata.is_relationship(name) {
            return Err(self.unknown(name));
        }
        self.relations
            .get(name)
            .ok_or_else(|| OrmError::LazyFieldNotInitialized {
                attribute: name.to_string(),
            })
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("type", &self.metadata.type_name())
            .field("id", &self.id)
            .field("elements", &self.elements)
            .field("pending_lazy", &self.pending_lazy)
            .field("relations", &self.relations)
            .field("persisted", &self.persisted)
            .field("dirty", &self.dirty)
            .field("deleted", &self.deleted)
            .field("initialized", &self.initialized)
            .finish()
    }
}

/// Shared handle to an [`Entity`]
///
/// Cloning the handle clones the reference, not the entity.
#[derive(Clone)]
pub struct EntityRef(Rc<RefCell<Entity>>);

impl EntityRef {
    /// Create a new, never-persisted entity with every persistent column null
    pub fn new(metadata: Arc<EntityMetadata>) -> Self {
        Self(Rc::new(RefCell::new(Entity::new(metadata))))
    }

    /// Build a persisted entity from a point-query row; lazy columns stay pending
    pub(crate) fn materialize(metadata: Arc<EntityMetadata>, row: Row) -> Result<Self> {
        let mut entity = Entity::new(metadata);
        entity.elements.clear();
        let id_column = entity.metadata.id_column().to_string();
        for (column, value) in row.into_pairs() {
            if column == id_column {
                entity.id = value.as_i64();
            } else {
                entity.elements.insert(column, value);
            }
        }
        if entity.id.is_none() {
            return Err(OrmError::schema_mismatch(
                entity.metadata.type_name(),
                format!("row carries no integer {} column", id_column),
            ));
        }
        entity.pending_lazy = entity
            .metadata
            .lazy_columns()
            .filter(|c| !entity.elements.contains_key(*c))
            .map(str::to_string)
            .collect();
        entity.persisted = true;
        Ok(Self(Rc::new(RefCell::new(entity))))
    }

    pub(crate) fn borrow(&self) -> Ref<'_, Entity> {
        self.0.borrow()
    }

    pub(crate) fn borrow_mut(&self) -> RefMut<'_, Entity> {
        self.0.borrow_mut()
    }

    pub fn metadata(&self) -> Arc<EntityMetadata> {
        self.borrow().metadata.clone()
    }

    pub fn type_name(&self) -> String {
        self.borrow().metadata.type_name().to_string()
    }

    pub(crate) fn is_type(&self, type_name: &str) -> bool {
        self.borrow().metadata.type_name() == type_name
    }

    pub fn id(&self) -> Option<i64> {
        self.borrow().id
    }

    pub fn is_persisted(&self) -> bool {
        self.borrow().persisted
    }

    pub fn is_dirty(&self) -> bool {
        self.borrow().dirty
    }

    pub fn is_deleted(&self) -> bool {
        self.borrow().deleted
    }

    pub fn is_initialized(&self) -> bool {
        self.borrow().initialized
    }

    /// Whether a lazy attribute has been fetched (or was never pending)
    pub fn is_loaded(&self, name: &str) -> bool {
        !self.borrow().pending_lazy.contains(name)
    }

    /// Whether both handles point at the same entity
    pub fn same_as(&self, other: &EntityRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Read an attribute
    ///
    /// # Errors
    ///
    /// `LazyFieldNotInitialized` for a lazy attribute that was never
    /// initialized, `UnknownAttribute` for an undeclared name.
    pub fn get(&self, name: &str) -> Result<Value> {
        self.borrow().value(name)
    }

    /// Read an attribute converted to `T`
    pub fn get_as<T: FromValue>(&self, name: &str) -> Result<T> {
        let value = self.get(name)?;
        T::from_attribute(name, &value)
    }

    /// Write an attribute
    ///
    /// Persistent attributes mark the entity dirty; transient attributes are
    /// kept in memory only. Writing a pending lazy attribute counts as
    /// initializing it.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let mut entity = self.borrow_mut();
        let meta = entity.metadata.clone();
        if name == meta.id_column() || !meta.is_attribute(name) {
            return Err(entity.unknown(name));
        }
        entity.pending_lazy.remove(name);
        entity.elements.insert(name.to_string(), value.into());
        if !meta.is_transient(name) {
            entity.dirty = true;
        }
        Ok(())
    }

    /// Read a resolved relationship slot
    pub fn related(&self, name: &str) -> Result<Related> {
        self.borrow().relation(name).cloned()
    }

    /// Read a many-to-one relationship
    pub fn one(&self, name: &str) -> Result<Option<EntityRef>> {
        let entity = self.borrow();
        match entity.relation(name)? {
            Related::One(target) => Ok(target.clone()),
            _ => Err(entity.unknown(name)),
        }
    }

    /// Read a one-to-many relationship declared without mapped-by
    pub fn many(&self, name: &str) -> Result<Vec<EntityRef>> {
        let entity = self.borrow();
        match entity.relation(name)? {
            Related::Many(items) => Ok(items.clone()),
            _ => Err(entity.unknown(name)),
        }
    }

    /// Read a one-to-many relationship declared with mapped-by
    pub fn mapped(&self, name: &str) -> Result<BTreeMap<String, EntityRef>> {
        let entity = self.borrow();
        match entity.relation(name)? {
            Related::Mapped(items) => Ok(items.clone()),
            _ => Err(entity.unknown(name)),
        }
    }

    pub fn one_as<M: Model>(&self, name: &str) -> Result<Option<M>> {
        Ok(self.one(name)?.map(M::from_entity))
    }

    pub fn many_as<M: Model>(&self, name: &str) -> Result<Vec<M>> {
        Ok(self.many(name)?.into_iter().map(M::from_entity).collect())
    }

    pub fn mapped_as<M: Model>(&self, name: &str) -> Result<BTreeMap<String, M>> {
        Ok(self
            .mapped(name)?
            .into_iter()
            .map(|(k, v)| (k, M::from_entity(v)))
            .collect())
    }

    /// Value used to join through `column`: the id for the id column,
    /// otherwise the loaded attribute
    pub(crate) fn join_value(&self, column: &str) -> Result<Value> {
        self.get(column)
    }

    pub(crate) fn is_resolved(&self, relationship: &str) -> bool {
        self.borrow().relations.contains_key(relationship)
    }

    pub(crate) fn set_relation(&self, name: &str, related: Related) {
        self.borrow_mut().relations.insert(name.to_string(), related);
    }

    /// Add `child` to an already-resolved one-to-many slot if it is missing
    pub(crate) fn attach_child(&self, name: &str, child: &EntityRef, mapped_key: Option<String>) {
        let mut entity = self.borrow_mut();
        match (entity.relations.get_mut(name), mapped_key) {
            (Some(Related::Many(items)), _) => {
                if !items.iter().any(|c| c.same_as(child)) {
                    items.push(child.clone());
                }
            }
            (Some(Related::Mapped(items)), Some(key)) => {
                items.insert(key, child.clone());
            }
            _ => {}
        }
    }

    pub(crate) fn all_relationships_resolved(&self) -> bool {
        let entity = self.borrow();
        let resolved = entity
            .metadata
            .relationship_names()
            .all(|name| entity.relations.contains_key(name));
        resolved
    }

    pub(crate) fn is_resolving(&self) -> bool {
        self.borrow().is_resolving()
    }

    pub(crate) fn set_resolving(&self, resolving: bool) {
        self.borrow_mut().resolving = resolving;
    }

    pub(crate) fn mark_initialized(&self) {
        self.borrow_mut().initialized = true;
    }

    pub(crate) fn mark_inserted(&self, id: i64) {
        let mut entity = self.borrow_mut();
        entity.id = Some(id);
        entity.persisted = true;
        entity.dirty = false;
    }

    pub(crate) fn mark_dirty(&self) {
        self.borrow_mut().dirty = true;
    }

    pub(crate) fn clear_dirty(&self) {
        self.borrow_mut().dirty = false;
    }

    pub(crate) fn mark_deleted(&self) {
        self.borrow_mut().deleted = true;
    }

    /// Merge a freshly fetched lazy column without marking the entity dirty
    pub(crate) fn merge_lazy(&self, name: &str, value: Value) {
        let mut entity = self.borrow_mut();
        entity.pending_lazy.remove(name);
        entity.elements.insert(name.to_string(), value);
    }

    pub(crate) fn downgrade(&self) -> WeakEntityRef {
        WeakEntityRef(Rc::downgrade(&self.0))
    }

    /// Drop every relationship slot, releasing reference cycles
    pub(crate) fn unlink(&self) {
        let mut entity = self.borrow_mut();
        entity.relations.clear();
        entity.initialized = false;
    }
}

/// Non-owning handle kept for entities that left a cache
pub(crate) struct WeakEntityRef(Weak<RefCell<Entity>>);

impl WeakEntityRef {
    pub(crate) fn upgrade(&self) -> Option<EntityRef> {
        self.0.upgrade().map(EntityRef)
    }

    pub(crate) fn is_live(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(entity) => write!(f, "{}#{:?}", entity.metadata.type_name(), entity.id),
            Err(_) => f.write_str("EntityRef(<borrowed>)"),
        }
    }
}

impl AsRef<EntityRef> for EntityRef {
    fn as_ref(&self) -> &EntityRef {
        self
    }
}
