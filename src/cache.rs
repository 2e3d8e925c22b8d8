//! Time-to-live cache for remote listings.
//!
//! Entries are keyed by the full hierarchy coordinate whose children they
//! list, so fetching asset B's departments never clobbers asset A's.
//! An entry is trusted while `now - fetched_at <= ttl`; an expired entry
//! is never returned.

use std::collections::HashMap;

use jiff::{SignedDuration, Timestamp};
use tracing::debug;

use crate::model::Coordinate;

/// Source of the current time, injectable so TTL windows can be tested.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A remote listing together with when it was fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry<T> {
    pub data: T,
    pub fetched_at: Timestamp,
    pub ttl: SignedDuration,
}

impl<T> CacheEntry<T> {
    pub fn is_fresh(&self, now: Timestamp) -> bool {
        now.duration_since(self.fetched_at) <= self.ttl
    }
}

/// Per-coordinate listings with independent expiry.
#[derive(Debug)]
pub struct LevelCache<T> {
    entries: HashMap<Coordinate, CacheEntry<T>>,
}

impl<T> Default for LevelCache<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T: Clone> LevelCache<T> {
    /// The cached listing for `key`, if one exists and is still fresh.
    pub fn get(&self, key: &Coordinate, now: Timestamp) -> Option<T> {
        match self.entries.get(key) {
            Some(entry) if entry.is_fresh(now) => {
                debug!(%key, "cache hit");
                Some(entry.data.clone())
            }
            Some(_) => {
                debug!(%key, "cache expired");
                None
            }
            None => None,
        }
    }

    /// Store a listing fetched at `now`, replacing any earlier entry for `key`.
    pub fn insert(&mut self, key: Coordinate, data: T, ttl: SignedDuration, now: Timestamp) {
        self.entries.insert(
            key,
            CacheEntry {
                data,
                fetched_at: now,
                ttl,
            },
        );
    }

    /// Return the fresh entry for `key`, or fetch, store and return a new one.
    ///
    /// The fetched value is stored even when empty so an unreachable server
    /// is asked at most once per TTL window.
    pub fn get_or_fetch(
        &mut self,
        key: &Coordinate,
        ttl: SignedDuration,
        now: Timestamp,
        fetch: impl FnOnce() -> T,
    ) -> T {
        if let Some(data) = self.get(key, now) {
            return data;
        }
        debug!(%key, "cache miss, fetching");
        let data = fetch();
        self.insert(key.clone(), data.clone(), ttl, now);
        data
    }

    /// Invalidate every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drop expired entries.
    pub fn prune(&mut self, now: Timestamp) {
        self.entries.retain(|_, entry| entry.is_fresh(now));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
