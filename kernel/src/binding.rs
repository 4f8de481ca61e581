// Benchmark Harness Binding
//
// The status-returning surface a workload driver calls. Structured
// adapter errors stop here: they are logged and collapsed to `Error`.

use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

use crate::adapter::{KvAdapter, KvError, SharedKvAdapter};
use crate::record::Record;

/// Outcome reported to the harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    Ok,
    Error,
}

impl Status {
    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }
}

/// Operations a workload driver issues per table and key.
pub trait KvBinding {
    /// On success the stored fields are added to `result`.
    fn read(
        &mut self,
        table: &str,
        key: &str,
        fields: Option<&BTreeSet<String>>,
        result: &mut Record,
    ) -> Status;

    fn insert(&mut self, table: &str, key: &str, values: &Record) -> Status;

    fn delete(&mut self, table: &str, key: &str) -> Status;

    /// Always `Status::Error`.
    fn update(&mut self, table: &str, key: &str, values: &Record) -> Status;

    /// On success the scanned records are appended to `result`.
    fn scan(
        &mut self,
        table: &str,
        start_key: &str,
        record_count: usize,
        fields: Option<&BTreeSet<String>>,
        result: &mut Vec<Record>,
    ) -> Status;
}

fn observe<T>(
    op: &'static str,
    table: &str,
    key: &str,
    outcome: Result<T, KvError>,
) -> Option<T> {
    match outcome {
        Ok(value) => Some(value),
        Err(err) => {
            debug!(op, table, key, %err, "operation failed");
            None
        }
    }
}

fn report(done: Option<()>) -> Status {
    match done {
        Some(()) => Status::Ok,
        None => Status::Error,
    }
}

impl KvBinding for KvAdapter {
    fn read(
        &mut self,
        table: &str,
        key: &str,
        fields: Option<&BTreeSet<String>>,
        result: &mut Record,
    ) -> Status {
        let record = observe("read", table, key, KvAdapter::read(self, table, key, fields));
        report(record.map(|record| result.extend_from(record)))
    }

    fn insert(&mut self, table: &str, key: &str, values: &Record) -> Status {
        let inserted = KvAdapter::insert(self, table, key, values);
        report(observe("insert", table, key, inserted).map(drop))
    }

    fn delete(&mut self, table: &str, key: &str) -> Status {
        report(observe("delete", table, key, KvAdapter::delete(self, table, key)))
    }

    fn update(&mut self, table: &str, key: &str, values: &Record) -> Status {
        report(observe("update", table, key, KvAdapter::update(self, table, key, values)))
    }

    fn scan(
        &mut self,
        table: &str,
        start_key: &str,
        record_count: usize,
        fields: Option<&BTreeSet<String>>,
        result: &mut Vec<Record>,
    ) -> Status {
        let records = observe(
            "scan",
            table,
            start_key,
            KvAdapter::scan(self, table, start_key, record_count, fields),
        );
        report(records.map(|records| result.extend(records)))
    }
}

impl KvBinding for SharedKvAdapter {
    fn read(
        &mut self,
        table: &str,
        key: &str,
        fields: Option<&BTreeSet<String>>,
        result: &mut Record,
    ) -> Status {
        KvBinding::read(&mut *self.lock(), table, key, fields, result)
    }

    fn insert(&mut self, table: &str, key: &str, values: &Record) -> Status {
        KvBinding::insert(&mut *self.lock(), table, key, values)
    }

    fn delete(&mut self, table: &str, key: &str) -> Status {
        KvBinding::delete(&mut *self.lock(), table, key)
    }

    fn update(&mut self, table: &str, key: &str, values: &Record) -> Status {
        KvBinding::update(&mut *self.lock(), table, key, values)
    }

    fn scan(
        &mut self,
        table: &str,
        start_key: &str,
        record_count: usize,
        fields: Option<&BTreeSet<String>>,
        result: &mut Vec<Record>,
    ) -> Status {
        KvBinding::scan(&mut *self.lock(), table, start_key, record_count, fields, result)
    }
}
