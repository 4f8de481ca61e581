// KV Adapter
//
// Point reads, inserts, deletes and range scans expressed against an
// append-only log. The key index is local to each adapter; the log
// handle is usually shared process-wide.

use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use crate::handle;
use crate::index::KeyIndex;
use crate::log::{LogError, LogHandle, Position};
use crate::record::{self, CodecError, Record};

/// Errors produced by adapter operations.
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("log unavailable: {0}")]
    LogUnavailable(#[source] LogError),

    #[error("key `{0}` not found")]
    NotFound(String),

    #[error("append failed: {0}")]
    Append(#[source] LogError),

    #[error("trim of position {position} failed: {source}")]
    Trim {
        position: Position,
        #[source]
        source: LogError,
    },

    #[error("read of position {position} failed: {source}")]
    Read {
        position: Position,
        #[source]
        source: LogError,
    },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("record at position {0} is empty")]
    EmptyRecord(Position),

    #[error("update is not supported on an append-only log")]
    Unsupported,
}

/// Behavior switches for a [`KvAdapter`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterOptions {
    /// Trim the previous position when a key is overwritten.
    ///
    /// Off by default: overwritten entries stay in the log as orphans.
    pub trim_on_overwrite: bool,
}

/// Key-value view over a shared log.
///
/// NOTE:
/// Two adapters over the same log do not see each other's keys. The
/// index lives here, not in the log.
pub struct KvAdapter {
    log: LogHandle,
    index: KeyIndex,
    options: AdapterOptions,
}

impl KvAdapter {
    pub fn new(log: LogHandle) -> Self {
        Self::with_options(log, AdapterOptions::default())
    }

    pub fn with_options(log: LogHandle, options: AdapterOptions) -> Self {
        Self {
            log,
            index: KeyIndex::new(),
            options,
        }
    }

    /// Adapter over the process-wide log, opening it on first use.
    pub fn open(options: AdapterOptions) -> Result<Self, KvError> {
        Ok(Self::with_options(handle::get_log()?, options))
    }

    pub fn index(&self) -> &KeyIndex {
        &self.index
    }

    pub fn log(&self) -> &LogHandle {
        &self.log
    }

    pub fn options(&self) -> AdapterOptions {
        self.options
    }

    /// Read the record stored under `key`.
    ///
    /// `fields` is accepted for interface compatibility; every stored
    /// field is returned.
    pub fn read(
        &self,
        table: &str,
        key: &str,
        _fields: Option<&BTreeSet<String>>,
    ) -> Result<Record, KvError> {
        let position = self
            .index
            .get(key)
            .ok_or_else(|| KvError::NotFound(key.to_string()))?;

        let bytes = self
            .log
            .read(position)
            .map_err(|source| KvError::Read { position, source })?;

        let record = record::decode(&bytes)?;
        if record.is_empty() {
            debug!(table, key, position, "stored record is empty");
            return Err(KvError::EmptyRecord(position));
        }

        Ok(record)
    }

    /// Append `record` and point `key` at it.
    ///
    /// The index only moves once every log call has succeeded.
    pub fn insert(&mut self, table: &str, key: &str, record: &Record) -> Result<Position, KvError> {
        let bytes = record::encode(record)?;
        let position = self.log.append(&bytes).map_err(KvError::Append)?;

        if self.options.trim_on_overwrite {
            if let Some(previous) = self.index.get(key) {
                self.log.trim(previous).map_err(|source| KvError::Trim {
                    position: previous,
                    source,
                })?;
                debug!(table, key, previous, position, "trimmed overwritten entry");
            }
        }

        self.index.insert(key, position);
        Ok(position)
    }

    /// Trim the entry for `key` and forget the key.
    pub fn delete(&mut self, table: &str, key: &str) -> Result<(), KvError> {
        let position = self
            .index
            .get(key)
            .ok_or_else(|| KvError::NotFound(key.to_string()))?;

        self.log
            .trim(position)
            .map_err(|source| KvError::Trim { position, source })?;

        self.index.remove(key);
        debug!(table, key, position, "deleted key");
        Ok(())
    }

    /// Always fails: entries cannot be changed in place.
    pub fn update(&mut self, table: &str, key: &str, _record: &Record) -> Result<(), KvError> {
        debug!(table, key, "rejected update");
        Err(KvError::Unsupported)
    }

    /// Records from `start_key` to the end of the insertion order.
    ///
    /// `count` is not enforced as a limit. The first failed read aborts
    /// the scan.
    pub fn scan(
        &self,
        table: &str,
        start_key: &str,
        count: usize,
        fields: Option<&BTreeSet<String>>,
    ) -> Result<Vec<Record>, KvError> {
        let keys = self
            .index
            .iter_from(start_key)
            .ok_or_else(|| KvError::NotFound(start_key.to_string()))?;

        let mut records = Vec::with_capacity(count.min(self.index.len()));
        for (key, _) in keys {
            let record = self.read(table, key, fields).map_err(|err| {
                debug!(table, start_key, key, %err, "scan aborted");
                err
            })?;
            records.push(record);
        }

        Ok(records)
    }
}

/// A [`KvAdapter`] that can be shared between threads.
///
/// Every operation holds the adapter lock for its whole duration, so
/// index read-modify-write sequences never interleave.
pub struct SharedKvAdapter {
    inner: Mutex<KvAdapter>,
}

impl SharedKvAdapter {
    pub fn new(adapter: KvAdapter) -> Self {
        Self {
            inner: Mutex::new(adapter),
        }
    }

    /// Hold the adapter for a sequence of operations.
    pub fn lock(&self) -> MutexGuard<'_, KvAdapter> {
        self.inner.lock()
    }

    pub fn read(
        &self,
        table: &str,
        key: &str,
        fields: Option<&BTreeSet<String>>,
    ) -> Result<Record, KvError> {
        self.inner.lock().read(table, key, fields)
    }

    pub fn insert(&self, table: &str, key: &str, record: &Record) -> Result<Position, KvError> {
        self.inner.lock().insert(table, key, record)
    }

    pub fn delete(&self, table: &str, key: &str) -> Result<(), KvError> {
        self.inner.lock().delete(table, key)
    }

    pub fn update(&self, table: &str, key: &str, record: &Record) -> Result<(), KvError> {
        self.inner.lock().update(table, key, record)
    }

    pub fn scan(
        &self,
        table: &str,
        start_key: &str,
        count: usize,
        fields: Option<&BTreeSet<String>>,
    ) -> Result<Vec<Record>, KvError> {
        self.inner.lock().scan(table, start_key, count, fields)
    }

    pub fn into_inner(self) -> KvAdapter {
        self.inner.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::{LogStore, MemoryLogStore};
    use std::sync::Arc;
    use std::thread;

    const TABLE: &str = "usertable";

    fn memory_log() -> LogHandle {
        Arc::new(MemoryLogStore::default())
    }

    fn record(value: &str) -> Record {
        [("field0", value)].into_iter().collect()
    }

    /// Log whose trims always fail.
    struct NoTrimLog(MemoryLogStore);

    impl LogStore for NoTrimLog {
        fn append(&self, data: &[u8]) -> Result<Position, LogError> {
            self.0.append(data)
        }

        fn read(&self, position: Position) -> Result<Vec<u8>, LogError> {
            self.0.read(position)
        }

        fn trim(&self, _position: Position) -> Result<(), LogError> {
            Err(LogError::Io(std::io::Error::other("trim refused")))
        }

        fn tail(&self) -> Position {
            self.0.tail()
        }
    }

    #[test]
    fn insert_then_read() {
        let mut kv = KvAdapter::new(memory_log());
        let value = record("alpha");

        kv.insert(TABLE, "user1", &value).unwrap();
        assert_eq!(kv.read(TABLE, "user1", None).unwrap(), value);
    }

    #[test]
    fn read_of_unknown_key_is_not_found() {
        let kv = KvAdapter::new(memory_log());
        let err = kv.read(TABLE, "missing", None).unwrap_err();
        assert!(matches!(err, KvError::NotFound(key) if key == "missing"));
    }

    #[test]
    fn requested_fields_do_not_filter() {
        let mut kv = KvAdapter::new(memory_log());
        let value: Record = [("field0", "a"), ("field1", "b")].into_iter().collect();
        kv.insert(TABLE, "user1", &value).unwrap();

        let fields: BTreeSet<String> = ["field0".to_string()].into();
        assert_eq!(kv.read(TABLE, "user1", Some(&fields)).unwrap().len(), 2);
    }

    #[test]
    fn empty_record_reads_as_error() {
        let mut kv = KvAdapter::new(memory_log());
        let position = kv.insert(TABLE, "blank", &Record::new()).unwrap();

        let err = kv.read(TABLE, "blank", None).unwrap_err();
        assert!(matches!(err, KvError::EmptyRecord(p) if p == position));
    }

    #[test]
    fn undecodable_entry_reads_as_codec_error() {
        let log = memory_log();
        let position = log.append(b"not a record").unwrap();

        let mut kv = KvAdapter::new(log);
        kv.index.insert("raw", position);

        let err = kv.read(TABLE, "raw", None).unwrap_err();
        assert!(matches!(err, KvError::Codec(CodecError::Decode(_))));
    }

    #[test]
    fn failed_append_leaves_index_untouched() {
        let mut kv = KvAdapter::new(Arc::new(MemoryLogStore::new(Some(8))));
        kv.insert(TABLE, "user1", &record("a")).unwrap_err();

        assert!(kv.index().is_empty());
    }

    #[test]
    fn delete_then_read_fails() {
        let mut kv = KvAdapter::new(memory_log());
        let position = kv.insert(TABLE, "user1", &record("a")).unwrap();

        kv.delete(TABLE, "user1").unwrap();
        assert!(matches!(kv.read(TABLE, "user1", None), Err(KvError::NotFound(_))));
        assert!(matches!(kv.log().read(position), Err(LogError::Invalidated(_))));
    }

    #[test]
    fn delete_of_unknown_key_never_touches_the_log() {
        // a trim attempt would surface as `KvError::Trim`
        let mut kv = KvAdapter::new(Arc::new(NoTrimLog(MemoryLogStore::default())));

        let err = kv.delete(TABLE, "ghost").unwrap_err();
        assert!(matches!(err, KvError::NotFound(key) if key == "ghost"));
    }

    #[test]
    fn failed_trim_keeps_the_key() {
        let mut kv = KvAdapter::new(Arc::new(NoTrimLog(MemoryLogStore::default())));
        kv.insert(TABLE, "user1", &record("a")).unwrap();

        let err = kv.delete(TABLE, "user1").unwrap_err();
        assert!(matches!(err, KvError::Trim { position: 0, .. }));
        assert_eq!(kv.read(TABLE, "user1", None).unwrap(), record("a"));
    }

    #[test]
    fn overwrite_leaves_orphan_by_default() {
        let mut kv = KvAdapter::new(memory_log());
        let first = kv.insert(TABLE, "user1", &record("v1")).unwrap();
        kv.insert(TABLE, "user1", &record("v2")).unwrap();

        assert_eq!(kv.read(TABLE, "user1", None).unwrap(), record("v2"));

        let orphan = record::decode(&kv.log().read(first).unwrap()).unwrap();
        assert_eq!(orphan, record("v1"));
    }

    #[test]
    fn overwrite_can_trim_previous_entry() {
        let options = AdapterOptions {
            trim_on_overwrite: true,
        };
        let mut kv = KvAdapter::with_options(memory_log(), options);
        let first = kv.insert(TABLE, "user1", &record("v1")).unwrap();
        kv.insert(TABLE, "user1", &record("v2")).unwrap();

        assert_eq!(kv.read(TABLE, "user1", None).unwrap(), record("v2"));
        assert!(matches!(kv.log().read(first), Err(LogError::Invalidated(_))));
    }

    #[test]
    fn failed_overwrite_trim_keeps_old_mapping() {
        let options = AdapterOptions {
            trim_on_overwrite: true,
        };
        let mut kv =
            KvAdapter::with_options(Arc::new(NoTrimLog(MemoryLogStore::default())), options);
        kv.insert(TABLE, "user1", &record("v1")).unwrap();

        assert!(kv.insert(TABLE, "user1", &record("v2")).is_err());
        assert_eq!(kv.index().get("user1"), Some(0));
        assert_eq!(kv.read(TABLE, "user1", None).unwrap(), record("v1"));
    }

    #[test]
    fn update_is_rejected() {
        let mut kv = KvAdapter::new(memory_log());
        kv.insert(TABLE, "user1", &record("v1")).unwrap();

        let err = kv.update(TABLE, "user1", &record("v2")).unwrap_err();
        assert!(matches!(err, KvError::Unsupported));
        assert_eq!(kv.index().get("user1"), Some(0));
        assert_eq!(kv.read(TABLE, "user1", None).unwrap(), record("v1"));
    }

    #[test]
    fn scan_follows_insertion_order() {
        let mut kv = KvAdapter::new(memory_log());
        for key in ["c", "a", "b"] {
            kv.insert(TABLE, key, &record(key)).unwrap();
        }

        let records = kv.scan(TABLE, "a", 10, None).unwrap();
        assert_eq!(records, vec![record("a"), record("b")]);
    }

    #[test]
    fn scan_ignores_count() {
        let mut kv = KvAdapter::new(memory_log());
        for key in ["a", "b", "c", "d"] {
            kv.insert(TABLE, key, &record(key)).unwrap();
        }

        assert_eq!(kv.scan(TABLE, "a", 1, None).unwrap().len(), 4);
    }

    #[test]
    fn scan_from_unknown_key_fails() {
        let kv = KvAdapter::new(memory_log());
        assert!(matches!(kv.scan(TABLE, "zzz", 5, None), Err(KvError::NotFound(_))));
    }

    #[test]
    fn scan_aborts_on_failed_read() {
        let log = memory_log();
        let mut kv = KvAdapter::new(log.clone());
        kv.insert(TABLE, "a", &record("a")).unwrap();
        let b = kv.insert(TABLE, "b", &record("b")).unwrap();
        kv.insert(TABLE, "c", &record("c")).unwrap();

        // trimmed behind the adapter's back
        log.trim(b).unwrap();

        let err = kv.scan(TABLE, "a", 3, None).unwrap_err();
        assert!(matches!(err, KvError::Read { position, .. } if position == b));
    }

    #[test]
    fn adapters_sharing_a_log_keep_separate_indexes() {
        let log = memory_log();
        let mut first = KvAdapter::new(log.clone());
        let second = KvAdapter::new(log.clone());

        let position = first.insert(TABLE, "user1", &record("mine")).unwrap();

        assert!(matches!(second.read(TABLE, "user1", None), Err(KvError::NotFound(_))));
        assert!(log.read(position).is_ok());
    }

    #[test]
    fn shared_adapter_serializes_concurrent_inserts() {
        let shared = Arc::new(SharedKvAdapter::new(KvAdapter::new(memory_log())));

        let workers: Vec<_> = (0..4)
            .map(|worker| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || {
                    for i in 0..25 {
                        let key = format!("user{worker}-{i}");
                        shared.insert(TABLE, &key, &record(&key)).unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let kv = Arc::try_unwrap(shared).ok().unwrap().into_inner();
        assert_eq!(kv.index().len(), 100);
        assert_eq!(kv.log().tail(), 100);
        assert_eq!(kv.read(TABLE, "user3-24", None).unwrap(), record("user3-24"));
    }
}
