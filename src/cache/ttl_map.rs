//! Concurrent in-process map whose entries expire.
//!
//! Expired entries are invisible to every read and are overwritten by inserts; they are only
//! physically dropped by [`TtlMap::purge_expired`]. A zero TTL means the entry never expires.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct TtlEntry<V> {
    value: V,
    inserted_at: Instant,
    expires_at: Option<Instant>,
}

impl<V> TtlEntry<V> {
    fn new(value: V, ttl: Duration, now: Instant) -> Self {
        let expires_at = if ttl.is_zero() {
            None
        } else {
            now.checked_add(ttl)
        };
        Self {
            value,
            inserted_at: now,
            expires_at,
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

#[derive(Debug)]
pub struct TtlMap<K, V>
where
    K: Eq + Hash,
{
    entries: DashMap<K, TtlEntry<V>>,
}

impl<K, V> Default for TtlMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> TtlMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Atomically insert unless a live entry already holds `key`. Returns whether it inserted.
    pub fn insert_if_absent(&self, key: K, value: V, ttl: Duration) -> bool {
        let now = Instant::now();
        match self.entries.entry(key) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_live(now) {
                    false
                } else {
                    occupied.insert(TtlEntry::new(value, ttl, now));
                    true
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(TtlEntry::new(value, ttl, now));
                true
            }
        }
    }

    /// Insert or overwrite.
    pub fn insert(&self, key: K, value: V, ttl: Duration) {
        self.entries
            .insert(key, TtlEntry::new(value, ttl, Instant::now()));
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        self.entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone())
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Drop `key`. Returns the value if the entry was still live.
    pub fn remove(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        self.entries
            .remove(key)
            .filter(|(_, entry)| entry.is_live(now))
            .map(|(_, entry)| entry.value)
    }

    /// Remove and return a live entry; expired entries are left for the sweeper. Two concurrent
    /// callers can never both receive the same value.
    pub fn take(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        self.entries
            .remove_if(key, |_, entry| entry.is_live(now))
            .map(|(_, entry)| entry.value)
    }

    /// Physically drop every expired entry. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        before.saturating_sub(self.entries.len())
    }

    /// Remove the live entry that was inserted first.
    pub fn evict_oldest(&self) -> Option<K> {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().inserted_at)
            .map(|entry| entry.key().clone())?;
        self.entries.remove(&oldest).map(|(key, _)| key)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|entry| entry.value().is_live(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
