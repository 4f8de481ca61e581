// Entry Cache
//
// LRU cache of entry bytes in front of any log store. Entries are
// immutable once written, so the only invalidation is trim.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::trace;

use super::{LogError, LogStore, Position};

/// Hit and miss counters for a [`CachedLogStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Least-recently-used map from position to entry bytes.
#[derive(Debug)]
struct Lru {
    capacity: usize,
    tick: u64,
    entries: HashMap<Position, (u64, Vec<u8>)>,
    recency: BTreeMap<u64, Position>,
    hits: u64,
    misses: u64,
}

impl Lru {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            tick: 0,
            entries: HashMap::new(),
            recency: BTreeMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn get(&mut self, position: Position) -> Option<Vec<u8>> {
        let tick = self.next_tick();
        match self.entries.get_mut(&position) {
            Some((last_used, data)) => {
                self.recency.remove(last_used);
                *last_used = tick;
                self.recency.insert(tick, position);
                self.hits += 1;
                Some(data.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    fn put(&mut self, position: Position, data: Vec<u8>) {
        let tick = self.next_tick();
        if let Some((last_used, _)) = self.entries.insert(position, (tick, data)) {
            self.recency.remove(&last_used);
        }
        self.recency.insert(tick, position);

        while self.entries.len() > self.capacity {
            let Some((_, evicted)) = self.recency.pop_first() else {
                break;
            };
            self.entries.remove(&evicted);
        }
    }

    fn remove(&mut self, position: Position) {
        if let Some((last_used, _)) = self.entries.remove(&position) {
            self.recency.remove(&last_used);
        }
    }
}

/// Log store decorator that serves repeated reads from memory.
///
/// Every operation holds the cache lock across the inner call, so a
/// concurrent trim can never race a cache fill for the same position.
#[derive(Debug)]
pub struct CachedLogStore<S> {
    inner: S,
    cache: Mutex<Lru>,
}

impl<S: LogStore> CachedLogStore<S> {
    /// Wrap `inner` with room for `capacity` entries.
    pub fn new(inner: S, capacity: usize) -> Self {
        Self {
            inner,
            cache: Mutex::new(Lru::new(capacity)),
        }
    }

    pub fn stats(&self) -> CacheStats {
        let cache = self.cache.lock();
        CacheStats {
            hits: cache.hits,
            misses: cache.misses,
            entries: cache.entries.len(),
        }
    }
}

impl<S: LogStore> LogStore for CachedLogStore<S> {
    fn append(&self, data: &[u8]) -> Result<Position, LogError> {
        let mut cache = self.cache.lock();
        let position = self.inner.append(data)?;
        cache.put(position, data.to_vec());
        Ok(position)
    }

    fn read(&self, position: Position) -> Result<Vec<u8>, LogError> {
        let mut cache = self.cache.lock();
        if let Some(data) = cache.get(position) {
            trace!(position, "entry cache hit");
            return Ok(data);
        }

        let data = self.inner.read(position)?;
        cache.put(position, data.clone());
        Ok(data)
    }

    fn trim(&self, position: Position) -> Result<(), LogError> {
        let mut cache = self.cache.lock();
        self.inner.trim(position)?;
        cache.remove(position);
        Ok(())
    }

    fn tail(&self) -> Position {
        self.inner.tail()
    }

    fn cache_stats(&self) -> Option<CacheStats> {
        Some(self.stats())
    }
}
