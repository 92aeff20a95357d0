//! Per-type entity service
//!
//! An [`EntityService`] fronts the cache of one registered type and resolves
//! the type's relationships through the services of the related types, found
//! in the owning session.
//!
//! # Relationship resolution
//!
//! Many-to-one slots resolve before one-to-many slots, so a child loaded by a
//! one-to-many query can link back to a parent that is already in memory.
//! Each nested lookup carries a suppression token, the originating type's
//! name: the nested service skips every relationship pointing at that type.
//! Skipped slots stay pending and the entity stays uninitialized, so a later
//! unsuppressed lookup finishes the job. An entity whose relationships are
//! being resolved is returned as-is when re-entered, which stops cycles
//! spanning more than two types.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::time::Instant;

use relcache_core_types::SessionId;

use crate::cache::{CacheStats, EntityCache};
use crate::entity::{EntityRef, Related};
use crate::errors::{OrmError, Result};
use crate::executor::SafeExecutor;
use crate::metadata::{EntityMetadata, ManyToOne, OneToMany};
use crate::model::Model;
use crate::session::SessionInner;
use crate::statement::Statement;
use crate::value::Row;
use crate::{log_op_end, log_op_error, log_op_start};

/// Facade over the cache of one entity type
pub struct EntityService {
    metadata: Arc<EntityMetadata>,
    cache: RefCell<EntityCache>,
    executor: SafeExecutor,
    session: Weak<SessionInner>,
    session_id: SessionId,
}

impl EntityService {
    pub(crate) fn new(
        metadata: Arc<EntityMetadata>,
        executor: SafeExecutor,
        capacity: usize,
        session: Weak<SessionInner>,
        session_id: SessionId,
    ) -> Self {
        let cache = EntityCache::new(metadata.clone(), executor.clone(), capacity);
        Self {
            metadata,
            cache: RefCell::new(cache),
            executor,
            session,
            session_id,
        }
    }

    pub fn metadata(&self) -> &Arc<EntityMetadata> {
        &self.metadata
    }

    pub fn type_name(&self) -> &str {
        self.metadata.type_name()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.borrow().stats()
    }

    /// Number of entities currently cached
    pub fn cached_len(&self) -> usize {
        self.cache.borrow().len()
    }

    pub fn is_cached(&self, id: i64) -> bool {
        self.cache.borrow().contains(id)
    }

    /// Load an entity with all of its relationships resolved
    ///
    /// # Errors
    ///
    /// `EntityNotFound` if no row exists or the entity was deleted,
    /// `SchemaMismatch` if a statement fails, `NoRegisteredEntity` if a
    /// relationship targets an unregistered type.
    pub fn by_id(&self, id: i64) -> Result<EntityRef> {
        self.by_id_suppressing(id, None)
    }

    /// Load an entity, skipping relationships that point at `suppressed`
    pub fn by_id_suppressing(&self, id: i64, suppressed: Option<&str>) -> Result<EntityRef> {
        self.observe("by_id", || self.load(id, suppressed))
    }

    /// Load several entities in input order; the first missing id fails the call
    pub fn by_ids(&self, ids: &[i64]) -> Result<Vec<EntityRef>> {
        self.by_ids_suppressing(ids, None)
    }

    pub fn by_ids_suppressing(&self, ids: &[i64], suppressed: Option<&str>) -> Result<Vec<EntityRef>> {
        self.observe("by_ids", || {
            tracing::debug!(entity_type = self.type_name(), batch_len = ids.len(), "by_ids");
            ids.iter().map(|id| self.load(*id, suppressed)).collect()
        })
    }

    /// Typed [`by_id`](Self::by_id)
    pub fn by_id_as<M: Model>(&self, id: i64) -> Result<M> {
        self.expect_model::<M>()?;
        Ok(M::from_entity(self.by_id(id)?))
    }

    /// Typed [`by_ids`](Self::by_ids)
    pub fn by_ids_as<M: Model>(&self, ids: &[i64]) -> Result<Vec<M>> {
        self.expect_model::<M>()?;
        Ok(self.by_ids(ids)?.into_iter().map(M::from_entity).collect())
    }

    /// Insert a new entity or mark a loaded one for write-back
    ///
    /// # Errors
    ///
    /// `InvalidEntityForService` if the entity is of another type; nothing is
    /// written in that case.
    pub fn save<E: AsRef<EntityRef>>(&self, entity: &E) -> Result<()> {
        let entity = entity.as_ref();
        self.observe("save", || self.cache.borrow_mut().set(entity))
    }

    /// Save a batch; every element is type-checked before anything is written
    pub fn save_all<E: AsRef<EntityRef>>(&self, entities: &[E]) -> Result<()> {
        let entities: Vec<EntityRef> = entities.iter().map(|e| e.as_ref().clone()).collect();
        self.observe("save_all", || {
            tracing::debug!(entity_type = self.type_name(), batch_len = entities.len(), "save_all");
            self.cache.borrow_mut().set_all(&entities)
        })
    }

    /// Mark an entity deleted; the row goes away when it is evicted
    pub fn delete<E: AsRef<EntityRef>>(&self, entity: &E) -> Result<()> {
        let entity = entity.as_ref();
        self.observe("delete", || self.cache.borrow_mut().delete(entity))
    }

    pub fn delete_all<E: AsRef<EntityRef>>(&self, entities: &[E]) -> Result<()> {
        let entities: Vec<EntityRef> = entities.iter().map(|e| e.as_ref().clone()).collect();
        self.observe("delete_all", || {
            tracing::debug!(entity_type = self.type_name(), batch_len = entities.len(), "delete_all");
            self.cache.borrow_mut().delete_all(&entities)
        })
    }

    /// Fetch one lazy attribute that has not been loaded yet
    ///
    /// A no-op when the attribute is already available.
    pub fn initialize<E: AsRef<EntityRef>>(&self, entity: &E, attribute: &str) -> Result<()> {
        let entity = entity.as_ref();
        self.observe("initialize", || self.initialize_attribute(entity, attribute))
    }

    /// Re-read an entity from storage; not supported
    ///
    /// Evict the entity (for example with [`flush`](Self::flush)) and load
    /// it again with [`by_id`](Self::by_id) instead.
    pub fn refresh<E: AsRef<EntityRef>>(&self, _entity: &E) -> Result<()> {
        self.observe("refresh", || {
            Err(OrmError::NotImplemented {
                operation: "refresh".to_string(),
            })
        })
    }

    /// Write back and drop every cached entity of this type
    pub fn flush(&self) -> Result<()> {
        self.observe("flush", || self.cache.borrow_mut().flush())
    }

    pub(crate) fn invalidate(&self) {
        self.cache.borrow_mut().invalidate();
    }

    pub(crate) fn take_departed(&self) -> Vec<EntityRef> {
        self.cache.borrow_mut().take_departed()
    }

    fn observe<T>(&self, op: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        log_op_start!(
            op,
            entity_type = self.type_name(),
            session_id = self.session_id.as_str()
        );
        let start = Instant::now();
        let result = f();
        let duration_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => {
                log_op_end!(
                    op,
                    duration_ms = duration_ms,
                    entity_type = self.type_name(),
                    session_id = self.session_id.as_str()
                );
            }
            Err(err) => {
                log_op_error!(
                    op,
                    err,
                    duration_ms = duration_ms,
                    entity_type = self.type_name(),
                    session_id = self.session_id.as_str()
                );
            }
        }
        result
    }

    fn expect_model<M: Model>(&self) -> Result<()> {
        if M::NAME == self.type_name() {
            Ok(())
        } else {
            Err(OrmError::InvalidEntityForService {
                expected: self.type_name().to_string(),
                found: M::NAME.to_string(),
            })
        }
    }

    fn peer(&self, type_name: &str) -> Result<Rc<EntityService>> {
        let session = self.session.upgrade().ok_or_else(|| OrmError::SessionClosed {
            type_name: self.type_name().to_string(),
        })?;
        session.service(type_name)
    }

    fn initialize_attribute(&self, entity: &EntityRef, attribute: &str) -> Result<()> {
        self.cache.borrow().check_type(entity)?;
        if !self.metadata.is_attribute(attribute) {
            return Err(OrmError::UnknownAttribute {
                type_name: self.type_name().to_string(),
                attribute: attribute.to_string(),
            });
        }
        if entity.is_loaded(attribute) {
            return Ok(());
        }
        let Some(id) = entity.id() else {
            return Ok(());
        };
        let row = self
            .executor
            .query_one(&Statement::select_lazy(&self.metadata, attribute, id))?
            .ok_or_else(|| OrmError::not_found(self.type_name(), id))?;
        let value = row.into_pairs().next().map(|(_, v)| v).unwrap_or_default();
        entity.merge_lazy(attribute, value);
        Ok(())
    }

    fn load(&self, id: i64, suppressed: Option<&str>) -> Result<EntityRef> {
        let entity = self.cache.borrow_mut().get_by_id(id)?;
        if !entity.is_initialized() && !entity.is_resolving() {
            self.resolve(&entity, suppressed)?;
            self.cache.borrow_mut().store(&entity)?;
        }
        Ok(entity)
    }

    fn resolve(&self, entity: &EntityRef, suppressed: Option<&str>) -> Result<()> {
        entity.set_resolving(true);
        let result = self.resolve_relationships(entity, suppressed);
        entity.set_resolving(false);
        result?;
        if entity.all_relationships_resolved() {
            entity.mark_initialized();
        }
        Ok(())
    }

    fn resolve_relationships(&self, entity: &EntityRef, suppressed: Option<&str>) -> Result<()> {
        for (name, relation) in self.metadata.many_to_one() {
            if entity.is_resolved(name) || suppressed == Some(relation.related_type.as_str()) {
                continue;
            }
            let parent = self.resolve_many_to_one(entity, relation)?;
            if let Some(parent) = &parent {
                attach_to_parent(parent, entity);
            }
            entity.set_relation(name, Related::One(parent));
        }
        for (name, relation) in self.metadata.one_to_many() {
            if entity.is_resolved(name) || suppressed == Some(relation.related_type.as_str()) {
                continue;
            }
            let related = self.resolve_one_to_many(entity, relation)?;
            entity.set_relation(name, related);
        }
        Ok(())
    }

    fn resolve_many_to_one(&self, entity: &EntityRef, relation: &ManyToOne) -> Result<Option<EntityRef>> {
        let value = entity.join_value(&relation.join_column)?;
        if value.is_null() {
            return Ok(None);
        }
        let service = self.peer(&relation.related_type)?;
        let id = if relation.foreign_key == service.metadata.id_column() {
            value.as_i64().ok_or_else(|| {
                OrmError::schema_mismatch(
                    self.type_name(),
                    format!(
                        "{} holds {}, expected an integer id",
                        relation.join_column,
                        value.type_name()
                    ),
                )
            })?
        } else {
            let stmt = Statement::select_ids_where(&service.metadata, &relation.foreign_key, value);
            match service.executor.query_one(&stmt)?.and_then(first_id) {
                Some(id) => id,
                None => return Ok(None),
            }
        };
        service
            .by_id_suppressing(id, Some(self.type_name()))
            .map(Some)
    }

    fn resolve_one_to_many(&self, entity: &EntityRef, relation: &OneToMany) -> Result<Related> {
        let value = entity.join_value(&relation.join_column)?;
        let service = self.peer(&relation.related_type)?;
        let mut ids: Vec<i64> = if value.is_null() {
            Vec::new()
        } else {
            let stmt = Statement::select_ids_where(&service.metadata, &relation.foreign_key, value);
            service
                .executor
                .query(&stmt)?
                .into_iter()
                .filter_map(first_id)
                .collect()
        };
        ids.retain(|id| !service.cache.borrow().is_deleted(*id));

        let children = service.by_ids_suppressing(&ids, Some(self.type_name()))?;
        for child in &children {
            back_fill(child, entity);
        }

        let Some(column) = &relation.mapped_by else {
            return Ok(Related::Many(children));
        };
        let mut mapped = BTreeMap::new();
        for child in children {
            let key = child.get(column)?.map_key();
            mapped.insert(key, child);
        }
        Ok(Related::Mapped(mapped))
    }
}

impl fmt::Debug for EntityService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityService")
            .field("type", &self.type_name())
            .field("cached", &self.cache.try_borrow().map(|c| c.len()).ok())
            .field("session_id", &self.session_id)
            .finish()
    }
}

fn first_id(row: Row) -> Option<i64> {
    row.into_pairs().next().and_then(|(_, v)| v.as_i64())
}

/// Whether `a.a_column` and `b.b_column` hold the same non-null value
fn joins(a: &EntityRef, a_column: &str, b: &EntityRef, b_column: &str) -> bool {
    match (a.join_value(a_column), b.join_value(b_column)) {
        (Ok(left), Ok(right)) => !left.is_null() && left == right,
        _ => false,
    }
}

/// Point the child's pending many-to-one slots for `parent`'s type at `parent`
fn back_fill(child: &EntityRef, parent: &EntityRef) {
    let parent_type = parent.type_name();
    let metadata = child.metadata();
    for (name, relation) in metadata.many_to_one() {
        if relation.related_type != parent_type || child.is_resolved(name) {
            continue;
        }
        if joins(child, &relation.join_column, parent, &relation.foreign_key) {
            child.set_relation(name, Related::One(Some(parent.clone())));
        }
    }
    if !child.is_initialized() && !child.is_resolving() && child.all_relationships_resolved() {
        child.mark_initialized();
    }
}

/// Add `child` to the parent's resolved one-to-many slots for the child's type
fn attach_to_parent(parent: &EntityRef, child: &EntityRef) {
    let child_type = child.type_name();
    let metadata = parent.metadata();
    for (name, relation) in metadata.one_to_many() {
        if relation.related_type != child_type || !parent.is_resolved(name) {
            continue;
        }
        if !joins(child, &relation.foreign_key, parent, &relation.join_column) {
            continue;
        }
        let key = relation
            .mapped_by
            .as_deref()
            .and_then(|column| child.get(column).ok())
            .map(|value| value.map_key());
        parent.attach_child(name, child, key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::session::Session;
    use crate::test_support::{foo_meta, row, script_foo, RecordingConnection};
    use crate::value::Value;

    fn session_with(conn: &Rc<RecordingConnection>, metas: Vec<Arc<EntityMetadata>>) -> Session {
        let session = Session::new(conn.clone(), SessionConfig::default()).unwrap();
        for meta in metas {
            session.register_metadata(meta).unwrap();
        }
        session
    }

    fn bar_meta() -> Arc<EntityMetadata> {
        Arc::new(
            EntityMetadata::builder("Bar")
                .id_column("not_id")
                .column("c")
                .lazy("d")
                .transient("other")
                .build(),
        )
    }

    fn fez_meta() -> Arc<EntityMetadata> {
        Arc::new(
            EntityMetadata::builder("Fez")
                .column("a")
                .one_to_many("bez", OneToMany::new("Bez", "id", "foreign_id"))
                .build(),
        )
    }

    fn bez_meta() -> Arc<EntityMetadata> {
        Arc::new(
            EntityMetadata::builder("Bez")
                .column("foreign_id")
                .many_to_one("fez", ManyToOne::new("Fez", "foreign_id", "id"))
                .build(),
        )
    }

    fn script_fez_bez(conn: &RecordingConnection) {
        conn.respond("SELECT a, id FROM fez", |params| {
            vec![row(&[("a", Value::from(1)), ("id", params[0].clone())])]
        });
        conn.push_rows(
            "SELECT id FROM bez WHERE foreign_id",
            vec![row(&[("id", Value::from(10))]), row(&[("id", Value::from(11))])],
        );
        conn.respond("SELECT foreign_id, id FROM bez", |params| {
            vec![row(&[("foreign_id", Value::from(1)), ("id", params[0].clone())])]
        });
    }

    #[test]
    fn test_lazy_attribute_requires_initialize() {
        let conn = Rc::new(RecordingConnection::new());
        conn.push_rows(
            "SELECT c, not_id FROM bar",
            vec![row(&[("c", Value::from(2)), ("not_id", Value::from(1))])],
        );
        conn.push_rows("SELECT d FROM bar", vec![row(&[("d", Value::from("three"))])]);
        let session = session_with(&conn, vec![bar_meta()]);
        let service = session.service("Bar").unwrap();

        let bar = service.by_id(1).unwrap();
        assert!(matches!(
            bar.get("d"),
            Err(OrmError::LazyFieldNotInitialized { .. })
        ));
        service.initialize(&bar, "d").unwrap();
        assert_eq!(bar.get_as::<String>("d").unwrap(), "three");
        assert!(!bar.is_dirty());

        service.initialize(&bar, "d").unwrap();
        assert_eq!(conn.statements_with("SELECT d").len(), 1);
        assert!(matches!(
            service.initialize(&bar, "zzz"),
            Err(OrmError::UnknownAttribute { .. })
        ));
    }

    #[test]
    fn test_one_to_many_links_both_ways() {
        let conn = Rc::new(RecordingConnection::new());
        script_fez_bez(&conn);
        let session = session_with(&conn, vec![fez_meta(), bez_meta()]);

        let fez = session.service("Fez").unwrap().by_id(1).unwrap();
        assert!(fez.is_initialized());
        let children = fez.many("bez").unwrap();
        assert_eq!(
            children.iter().map(EntityRef::id).collect::<Vec<_>>(),
            vec![Some(10), Some(11)]
        );
        for child in &children {
            assert!(child.one("fez").unwrap().unwrap().same_as(&fez));
            assert!(child.is_initialized());
        }
    }

    #[test]
    fn test_suppressed_relationship_resolves_later() {
        let conn = Rc::new(RecordingConnection::new());
        script_fez_bez(&conn);
        let session = session_with(&conn, vec![fez_meta(), bez_meta()]);
        let fez_service = session.service("Fez").unwrap();

        let fez = fez_service.by_id_suppressing(1, Some("Bez")).unwrap();
        assert!(!fez.is_initialized());
        assert!(matches!(
            fez.many("bez"),
            Err(OrmError::LazyFieldNotInitialized { .. })
        ));

        let again = fez_service.by_id(1).unwrap();
        assert!(again.same_as(&fez));
        assert_eq!(fez.many("bez").unwrap().len(), 2);
    }

    #[test]
    fn test_many_to_one_attaches_to_loaded_parent() {
        let conn = Rc::new(RecordingConnection::new());
        script_fez_bez(&conn);
        let session = session_with(&conn, vec![fez_meta(), bez_meta()]);

        let bez = session.service("Bez").unwrap().by_id(12).unwrap();
        let fez = bez.one("fez").unwrap().unwrap();
        assert_eq!(fez.id(), Some(1));
        // Fez was loaded with Bez suppressed
        assert!(!fez.is_initialized());

        let fez = session.service("Fez").unwrap().by_id(1).unwrap();
        let ids: Vec<_> = fez.many("bez").unwrap().iter().map(EntityRef::id).collect();
        assert_eq!(ids, vec![Some(10), Some(11)]);
    }

    #[test]
    fn test_null_many_to_one_is_empty() {
        let conn = Rc::new(RecordingConnection::new());
        conn.push_rows(
            "SELECT foreign_id, id FROM bez",
            vec![row(&[("foreign_id", Value::Null), ("id", Value::from(3))])],
        );
        let session = session_with(&conn, vec![fez_meta(), bez_meta()]);
        let bez = session.service("Bez").unwrap().by_id(3).unwrap();
        assert!(bez.one("fez").unwrap().is_none());
        assert!(bez.is_initialized());
    }

    #[test]
    fn test_mapped_by_keys_children() {
        let conn = Rc::new(RecordingConnection::new());
        conn.push_rows(
            "SELECT a, id FROM fez",
            vec![row(&[("a", Value::from(1)), ("id", Value::from(1))])],
        );
        conn.push_rows(
            "SELECT id FROM pez WHERE foreign_id",
            vec![
                row(&[("id", Value::from(1))]),
                row(&[("id", Value::from(2))]),
                row(&[("id", Value::from(3))]),
            ],
        );
        conn.respond("SELECT foreign_id, color, id FROM pez", |params| {
            let color = match params[0].as_i64() {
                Some(1) => "blue",
                Some(2) => "green",
                _ => "yellow",
            };
            vec![row(&[
                ("foreign_id", Value::from(1)),
                ("color", Value::from(color)),
                ("id", params[0].clone()),
            ])]
        });
        let fez = Arc::new(
            EntityMetadata::builder("Fez")
                .column("a")
                .one_to_many(
                    "pez",
                    OneToMany::new("Pez", "id", "foreign_id").mapped_by("color"),
                )
                .build(),
        );
        let pez = Arc::new(
            EntityMetadata::builder("Pez")
                .column("foreign_id")
                .column("color")
                .build(),
        );
        let session = session_with(&conn, vec![fez, pez]);

        let fez = session.service("Fez").unwrap().by_id(1).unwrap();
        let mapped = fez.mapped("pez").unwrap();
        assert_eq!(
            mapped.keys().cloned().collect::<Vec<_>>(),
            vec!["blue", "green", "yellow"]
        );
        for (color, pez) in &mapped {
            assert_eq!(&pez.get_as::<String>("color").unwrap(), color);
        }
    }

    #[test]
    fn test_by_ids_fails_on_missing_id() {
        let conn = Rc::new(RecordingConnection::new());
        conn.respond("SELECT a, id FROM foo", |params| match params[0].as_i64() {
            Some(2) => Vec::new(),
            _ => vec![row(&[("a", Value::from(0)), ("id", params[0].clone())])],
        });
        let session = session_with(&conn, vec![foo_meta()]);
        let err = session.service("Foo").unwrap().by_ids(&[1, 2, 3]).unwrap_err();
        assert_eq!(
            err,
            OrmError::EntityNotFound {
                type_name: "Foo".to_string(),
                id: 2
            }
        );
    }

    #[test]
    fn test_save_rejects_foreign_type_before_any_write() {
        let conn = Rc::new(RecordingConnection::new());
        let session = session_with(&conn, vec![foo_meta(), bar_meta()]);
        let foo_service = session.service("Foo").unwrap();

        let good = EntityRef::new(foo_meta());
        let bad = EntityRef::new(bar_meta());
        assert!(matches!(
            foo_service.save(&bad),
            Err(OrmError::InvalidEntityForService { .. })
        ));
        assert!(matches!(
            foo_service.save_all(&[good.clone(), bad]),
            Err(OrmError::InvalidEntityForService { .. })
        ));
        assert!(conn.statements().is_empty());
        assert_eq!(good.id(), None);
    }

    #[test]
    fn test_deleted_entity_is_not_found() {
        let conn = Rc::new(RecordingConnection::new());
        script_foo(&conn);
        let session = session_with(&conn, vec![foo_meta()]);
        let service = session.service("Foo").unwrap();

        let foo = service.by_id(4).unwrap();
        service.delete(&foo).unwrap();
        assert!(matches!(
            service.by_id(4),
            Err(OrmError::EntityNotFound { id: 4, .. })
        ));
    }

    #[test]
    fn test_refresh_not_implemented() {
        let conn = Rc::new(RecordingConnection::new());
        script_foo(&conn);
        let session = session_with(&conn, vec![foo_meta()]);
        let service = session.service("Foo").unwrap();
        let foo = service.by_id(1).unwrap();
        assert_eq!(
            service.refresh(&foo).unwrap_err().code(),
            "ERR_NOT_IMPLEMENTED"
        );
    }

    #[test]
    fn test_three_type_cycle_stops_at_resolving_entity() {
        let conn = Rc::new(RecordingConnection::new());
        let ring = [("X", "Y"), ("Y", "Z"), ("Z", "X")];
        let mut metas = Vec::new();
        for (name, next) in ring {
            conn.respond(&format!("SELECT next_id, id FROM {}", name.to_lowercase()), |params| {
                vec![row(&[("next_id", Value::from(1)), ("id", params[0].clone())])]
            });
            metas.push(Arc::new(
                EntityMetadata::builder(name)
                    .column("next_id")
                    .many_to_one("next", ManyToOne::new(next, "next_id", "id"))
                    .build(),
            ));
        }
        let session = session_with(&conn, metas);

        let x = session.service("X").unwrap().by_id(1).unwrap();
        let y = x.one("next").unwrap().unwrap();
        let z = y.one("next").unwrap().unwrap();
        assert_eq!(y.type_name(), "Y");
        assert_eq!(z.type_name(), "Z");
        assert!(z.one("next").unwrap().unwrap().same_as(&x));
        assert!(x.is_initialized() && y.is_initialized() && z.is_initialized());
        assert_eq!(conn.statements_with("SELECT").len(), 3);
    }

    #[test]
    fn test_unregistered_relationship_target() {
        let conn = Rc::new(RecordingConnection::new());
        script_fez_bez(&conn);
        let session = session_with(&conn, vec![fez_meta()]);
        assert!(matches!(
            session.service("Fez").unwrap().by_id(1),
            Err(OrmError::NoRegisteredEntity { .. })
        ));
    }
}
