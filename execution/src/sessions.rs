//! Keyed registry of live sessions.
//!
//! At most one session exists per [SessionKey]. The map lock is only held for
//! the duration of a lookup or insert, never across an `.await`.

use arcade_types::SessionKey;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use thiserror::Error;

/// A session (or reservation) already exists under this key.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("session already exists for {0}")]
pub struct Conflict(pub SessionKey);

enum Slot<V> {
    /// Key held while the session is being set up; invisible to readers.
    Reserved,
    Active(Arc<V>),
}

pub struct SessionStore<V> {
    slots: Mutex<HashMap<SessionKey, Slot<V>>>,
}

impl<V> Default for SessionStore<V> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<V> SessionStore<V> {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<SessionKey, Slot<V>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim `key` without publishing a session yet.
    pub fn reserve(&self, key: SessionKey) -> Result<Reservation<'_, V>, Conflict> {
        let mut slots = self.slots();
        if slots.contains_key(&key) {
            return Err(Conflict(key));
        }
        slots.insert(key, Slot::Reserved);
        Ok(Reservation {
            store: self,
            key,
            committed: false,
        })
    }

    /// Atomically insert the session built by `factory` if `key` is free.
    pub fn try_create(
        &self,
        key: SessionKey,
        factory: impl FnOnce() -> V,
    ) -> Result<Arc<V>, Conflict> {
        let mut slots = self.slots();
        if slots.contains_key(&key) {
            return Err(Conflict(key));
        }
        let value = Arc::new(factory());
        slots.insert(key, Slot::Active(value.clone()));
        Ok(value)
    }

    pub fn get(&self, key: &SessionKey) -> Option<Arc<V>> {
        match self.slots().get(key) {
            Some(Slot::Active(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// Remove the session under `key`, if any. Reservations are left alone.
    pub fn remove(&self, key: &SessionKey) -> Option<Arc<V>> {
        self.remove_if(key, |_| true)
    }

    /// Remove the session under `key` only if `predicate` accepts it.
    pub fn remove_if(
        &self,
        key: &SessionKey,
        predicate: impl FnOnce(&V) -> bool,
    ) -> Option<Arc<V>> {
        let mut slots = self.slots();
        let accepted = match slots.get(key) {
            Some(Slot::Active(value)) => predicate(value),
            _ => false,
        };
        if !accepted {
            return None;
        }
        match slots.remove(key) {
            Some(Slot::Active(value)) => Some(value),
            _ => None,
        }
    }

    /// Number of visible sessions.
    pub fn len(&self) -> usize {
        self.slots()
            .values()
            .filter(|slot| matches!(slot, Slot::Active(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<SessionKey> {
        self.slots()
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Active(_)))
            .map(|(key, _)| *key)
            .collect()
    }

    pub fn values(&self) -> Vec<Arc<V>> {
        self.slots()
            .values()
            .filter_map(|slot| match slot {
                Slot::Active(value) => Some(value.clone()),
                Slot::Reserved => None,
            })
            .collect()
    }
}

/// Exclusive claim on a key, released on drop unless committed.
pub struct Reservation<'a, V> {
    store: &'a SessionStore<V>,
    key: SessionKey,
    committed: bool,
}

impl<V> Reservation<'_, V> {
    pub fn key(&self) -> SessionKey {
        self.key
    }

    /// Publish `value` under the reserved key.
    pub fn commit(mut self, value: Arc<V>) -> Arc<V> {
        self.store
            .slots()
            .insert(self.key, Slot::Active(value.clone()));
        self.committed = true;
        value
    }
}

impl<V> Drop for Reservation<'_, V> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        let mut slots = self.store.slots();
        if matches!(slots.get(&self.key), Some(Slot::Reserved)) {
            slots.remove(&self.key);
        }
    }
}
