//! Bounded per-type entity cache with write-back on eviction
//!
//! Entries are ranked by access frequency; ties go to the least recently
//! touched entry. Mutations are not written when made: a dirty entry is
//! UPDATEd and a deleted entry DELETEd when it leaves the cache, either under
//! capacity pressure or on [`EntityCache::flush`]. Only inserts of entities
//! without an id hit storage immediately, since the id is the cache key.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::entity::{EntityRef, WeakEntityRef};
use crate::errors::{OrmError, Result};
use crate::executor::SafeExecutor;
use crate::metadata::EntityMetadata;
use crate::statement::Statement;

/// Counters describing cache traffic since creation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// Statements issued by the cache (inserts and write-backs)
    pub writes: u64,
}

#[derive(Debug)]
struct Slot {
    entity: EntityRef,
    freq: u64,
    tick: u64,
}

/// LFU cache of the entities of one type, keyed by id
pub struct EntityCache {
    metadata: Arc<EntityMetadata>,
    executor: SafeExecutor,
    capacity: usize,
    slots: HashMap<i64, Slot>,
    /// Eviction order: (frequency, last access tick, id)
    order: BTreeSet<(u64, u64, i64)>,
    tick: u64,
    stats: CacheStats,
    /// Entities that left the cache, kept to break relationship cycles later
    departed: Vec<WeakEntityRef>,
}

impl EntityCache {
    pub fn new(metadata: Arc<EntityMetadata>, executor: SafeExecutor, capacity: usize) -> Self {
        Self {
            metadata,
            executor,
            capacity: capacity.max(1),
            slots: HashMap::new(),
            order: BTreeSet::new(),
            tick: 0,
            stats: CacheStats::default(),
            departed: Vec::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.slots.contains_key(&id)
    }

    /// Whether `id` is cached and marked deleted, without touching it
    pub(crate) fn is_deleted(&self, id: i64) -> bool {
        self.slots
            .get(&id)
            .is_some_and(|slot| slot.entity.is_deleted())
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    fn type_name(&self) -> &str {
        self.metadata.type_name()
    }

    /// Fail with `InvalidEntityForService` unless `entity` is of this cache's type
    pub(crate) fn check_type(&self, entity: &EntityRef) -> Result<()> {
        if entity.is_type(self.type_name()) {
            Ok(())
        } else {
            Err(OrmError::InvalidEntityForService {
                expected: self.type_name().to_string(),
                found: entity.type_name(),
            })
        }
    }

    /// Look up an entity, loading its eager columns on a miss
    ///
    /// # Errors
    ///
    /// `EntityNotFound` when the cached entity is deleted or no row exists,
    /// `SchemaMismatch` when the point query fails.
    pub fn get_by_id(&mut self, id: i64) -> Result<EntityRef> {
        if let Some(entity) = self.touch(id) {
            self.stats.hits += 1;
            tracing::debug!(entity_type = %self.type_name(), entity_id = id, "cache hit");
            if entity.is_deleted() {
                return Err(OrmError::not_found(self.type_name(), id));
            }
            return Ok(entity);
        }

        self.stats.misses += 1;
        tracing::debug!(entity_type = %self.type_name(), entity_id = id, "cache miss");
        let row = self
            .executor
            .query_one(&Statement::select_eager(&self.metadata, id))?
            .ok_or_else(|| OrmError::not_found(self.type_name(), id))?;
        let entity = EntityRef::materialize(self.metadata.clone(), row)?;
        self.admit(id, entity.clone())?;
        Ok(entity)
    }

    /// Save one entity
    ///
    /// An entity without an id is inserted right away and takes the generated
    /// id. Otherwise it is marked dirty and written back on eviction.
    pub fn set(&mut self, entity: &EntityRef) -> Result<()> {
        self.check_type(entity)?;
        match entity.id() {
            None => {
                let stmt = Statement::insert(&entity.borrow());
                self.stats.writes += 1;
                let id = self.executor.write(&stmt)?.ok_or_else(|| {
                    OrmError::schema_mismatch(self.type_name(), "insert generated no id")
                })?;
                entity.mark_inserted(id);
            }
            Some(_) => entity.mark_dirty(),
        }
        self.store(entity)
    }

    /// Save every entity of a batch, in order
    pub fn set_all(&mut self, entities: &[EntityRef]) -> Result<()> {
        for entity in entities {
            self.check_type(entity)?;
        }
        entities.iter().try_for_each(|e| self.set(e))
    }

    /// Mark an entity deleted; the DELETE is issued on eviction
    pub fn delete(&mut self, entity: &EntityRef) -> Result<()> {
        self.check_type(entity)?;
        entity.mark_deleted();
        match entity.id() {
            Some(_) => self.store(entity),
            None => Ok(()),
        }
    }

    pub fn delete_all(&mut self, entities: &[EntityRef]) -> Result<()> {
        for entity in entities {
            self.check_type(entity)?;
        }
        entities.iter().try_for_each(|e| self.delete(e))
    }

    /// Insert or refresh the entry for an entity that has an id
    pub fn store(&mut self, entity: &EntityRef) -> Result<()> {
        let Some(id) = entity.id() else {
            return Ok(());
        };
        if self.slots.contains_key(&id) {
            self.replace(id, entity)?;
            self.touch(id);
            return Ok(());
        }
        self.admit(id, entity.clone())
    }

    /// Put `entity` in the slot for `id` when another handle for the same row
    /// holds it
    ///
    /// A pending delete on the displaced handle carries over to `entity`;
    /// a pending update is written back first.
    fn replace(&mut self, id: i64, entity: &EntityRef) -> Result<()> {
        let Some(displaced) = self.slots.get(&id).map(|slot| slot.entity.clone()) else {
            return Ok(());
        };
        if displaced.same_as(entity) {
            return Ok(());
        }
        if displaced.is_deleted() {
            entity.mark_deleted();
        } else {
            self.write_back(&displaced, id)?;
        }
        tracing::debug!(entity_type = %self.type_name(), entity_id = id, "replace handle");
        self.remember(&displaced);
        if let Some(slot) = self.slots.get_mut(&id) {
            slot.entity = entity.clone();
        }
        Ok(())
    }

    /// Evict the least-frequently-used entry, writing back its pending state
    ///
    /// Returns the evicted entity, or `None` when the cache is empty. A failed
    /// write-back still removes the entry.
    pub fn evict_one(&mut self) -> Result<Option<EntityRef>> {
        let Some(key) = self.order.pop_first() else {
            return Ok(None);
        };
        let (_, _, id) = key;
        let Some(slot) = self.slots.remove(&id) else {
            return Ok(None);
        };
        self.stats.evictions += 1;
        self.remember(&slot.entity);
        tracing::debug!(
            entity_type = %self.type_name(),
            entity_id = id,
            freq = slot.freq,
            cache_len = self.slots.len(),
            "evict"
        );
        self.write_back(&slot.entity, id)?;
        Ok(Some(slot.entity))
    }

    /// Evict every entry; the cache ends empty
    ///
    /// Every entry is written back even if one fails; the first failure is
    /// returned.
    pub fn flush(&mut self) -> Result<()> {
        let mut first_err = None;
        loop {
            match self.evict_one() {
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(err) => {
                    first_err.get_or_insert(err);
                }
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Drop every entry without writing anything back
    pub fn invalidate(&mut self) {
        let slots = std::mem::take(&mut self.slots);
        self.order.clear();
        for slot in slots.values() {
            self.remember(&slot.entity);
        }
        tracing::debug!(entity_type = %self.type_name(), dropped = slots.len(), "invalidate");
    }

    /// Entities that left the cache and are still referenced somewhere
    pub(crate) fn take_departed(&mut self) -> Vec<EntityRef> {
        std::mem::take(&mut self.departed)
            .iter()
            .filter_map(WeakEntityRef::upgrade)
            .collect()
    }

    fn remember(&mut self, entity: &EntityRef) {
        if !entity.metadata().has_relationships() {
            return;
        }
        if self.departed.len() >= self.capacity * 2 {
            self.departed.retain(WeakEntityRef::is_live);
        }
        self.departed.push(entity.downgrade());
    }

    fn write_back(&mut self, entity: &EntityRef, id: i64) -> Result<()> {
        if entity.is_deleted() {
            self.stats.writes += 1;
            self.executor
                .write(&Statement::delete(&self.metadata, id))?;
        } else if entity.is_dirty() {
            let stmt = Statement::update(&entity.borrow());
            if let Some(stmt) = stmt {
                self.stats.writes += 1;
                self.executor.write(&stmt)?;
            }
        }
        entity.clear_dirty();
        Ok(())
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    /// Bump the frequency of a cached entry and return it
    fn touch(&mut self, id: i64) -> Option<EntityRef> {
        let tick = self.next_tick();
        let slot = self.slots.get_mut(&id)?;
        self.order.remove(&(slot.freq, slot.tick, id));
        slot.freq += 1;
        slot.tick = tick;
        self.order.insert((slot.freq, slot.tick, id));
        Some(slot.entity.clone())
    }

    fn admit(&mut self, id: i64, entity: EntityRef) -> Result<()> {
        while self.slots.len() >= self.capacity {
            self.evict_one()?;
        }
        let tick = self.next_tick();
        self.order.insert((1, tick, id));
        self.slots.insert(
            id,
            Slot {
                entity,
                freq: 1,
                tick,
            },
        );
        Ok(())
    }
}
