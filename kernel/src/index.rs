// Key Index
//
// Maps keys to the log position holding their latest value. Keys are
// ordered by first insertion, not lexically, and range scans walk that
// order.

use std::collections::HashMap;

use crate::log::Position;

/// Insertion-ordered key to position map with O(1) point lookup.
///
/// Removed keys leave a hole in the slot vector; holes are compacted
/// away once they outnumber live keys.
#[derive(Debug, Clone, Default)]
pub struct KeyIndex {
    slots: Vec<Option<(String, Position)>>,
    lookup: HashMap<String, usize>,
}

/// Holes are tolerated below this many slots.
const COMPACT_MIN_SLOTS: usize = 64;

impl KeyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lookup.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<Position> {
        let slot = *self.lookup.get(key)?;
        self.slots[slot].as_ref().map(|(_, position)| *position)
    }

    /// Map `key` to `position`, returning the position it replaced.
    ///
    /// An existing key keeps its place in the order.
    pub fn insert(&mut self, key: impl Into<String>, position: Position) -> Option<Position> {
        let key = key.into();
        if let Some(&slot) = self.lookup.get(&key) {
            if let Some((_, current)) = self.slots[slot].as_mut() {
                return Some(std::mem::replace(current, position));
            }
        }

        self.lookup.insert(key.clone(), self.slots.len());
        self.slots.push(Some((key, position)));
        None
    }

    /// Drop `key`, returning the position it mapped to.
    pub fn remove(&mut self, key: &str) -> Option<Position> {
        let slot = self.lookup.remove(key)?;
        let (_, position) = self.slots[slot].take()?;
        self.maybe_compact();
        Some(position)
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.iter().map(|(key, _)| key)
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Position)> + '_ {
        self.iter_slots(0)
    }

    /// Entries from `key` (inclusive) to the end of the order, or `None`
    /// if `key` is not indexed.
    pub fn iter_from(&self, key: &str) -> Option<impl Iterator<Item = (&str, Position)> + '_> {
        let start = *self.lookup.get(key)?;
        Some(self.iter_slots(start))
    }

    fn iter_slots(&self, start: usize) -> impl Iterator<Item = (&str, Position)> + '_ {
        self.slots[start..]
            .iter()
            .flatten()
            .map(|(key, position)| (key.as_str(), *position))
    }

    fn maybe_compact(&mut self) {
        let holes = self.slots.len() - self.lookup.len();
        if self.slots.len() < COMPACT_MIN_SLOTS || holes <= self.lookup.len() {
            return;
        }

        self.slots.retain(Option::is_some);
        for (slot, entry) in self.slots.iter().enumerate() {
            if let Some((key, _)) = entry {
                if let Some(index) = self.lookup.get_mut(key) {
                    *index = slot;
                }
            }
        }
    }
}
