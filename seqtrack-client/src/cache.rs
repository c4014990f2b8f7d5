//! Local mirror of server entities
//!
//! Reads are public. Writes are crate-private so that only the
//! synchronizer's `mutate`/`hydrate`/`invalidate` entry points touch it.

use std::collections::HashMap;
use uuid::Uuid;

/// Entities keyed by id
#[derive(Debug, Clone)]
pub struct EntityCache<V> {
    entries: HashMap<Uuid, V>,
}

impl<V> Default for EntityCache<V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<V: Clone> EntityCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &Uuid) -> Option<&V> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn insert(&mut self, id: Uuid, value: V) -> Option<V> {
        self.entries.insert(id, value)
    }

    pub(crate) fn remove(&mut self, id: &Uuid) -> Option<V> {
        self.entries.remove(id)
    }
}
