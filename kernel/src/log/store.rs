// Log Storage Abstraction
//
// The capability the KV layer is written against. Implementations may
// keep entries in memory, in a journal file, or behind a cache.

use super::{CacheStats, LogError, Position};

/// Append-only, position-addressed log.
///
/// Properties required from implementations:
/// - Positions are assigned in append order, starting at 0, without gaps
/// - Written entries are never mutated
/// - A trimmed position never becomes readable again
///
/// Handles are shared across threads, so every method takes `&self`
/// and implementations serialize internally.
pub trait LogStore: Send + Sync {
    /// Append an entry and return the position it was assigned.
    fn append(&self, data: &[u8]) -> Result<Position, LogError>;

    /// Read the entry at `position`.
    ///
    /// Fails with `NotWritten` past the tail and `Invalidated` once trimmed.
    fn read(&self, position: Position) -> Result<Vec<u8>, LogError>;

    /// Mark `position` as logically removed. Trimming twice is not an error.
    fn trim(&self, position: Position) -> Result<(), LogError>;

    /// Next position that will be assigned.
    fn tail(&self) -> Position;

    /// Entry cache counters, for stores that cache.
    fn cache_stats(&self) -> Option<CacheStats> {
        None
    }
}
