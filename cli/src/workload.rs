// Workload Replay
//
// A workload is a JSON array of operations applied in order to one
// adapter through the harness binding.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use logkv_kernel::{KvBinding, Record, Status};

fn default_table() -> String {
    "usertable".into()
}

/// One harness call.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Operation {
    Insert {
        #[serde(default = "default_table")]
        table: String,
        key: String,
        values: BTreeMap<String, String>,
    },
    Read {
        #[serde(default = "default_table")]
        table: String,
        key: String,
        #[serde(default)]
        fields: Option<BTreeSet<String>>,
    },
    Delete {
        #[serde(default = "default_table")]
        table: String,
        key: String,
    },
    Update {
        #[serde(default = "default_table")]
        table: String,
        key: String,
        values: BTreeMap<String, String>,
    },
    Scan {
        #[serde(default = "default_table")]
        table: String,
        key: String,
        count: usize,
        #[serde(default)]
        fields: Option<BTreeSet<String>>,
    },
}

/// Result of one operation, as printed by the CLI.
#[derive(Debug, Serialize)]
pub struct OperationReport {
    pub op: &'static str,
    pub key: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub records: Vec<BTreeMap<String, String>>,
}

fn to_record(values: BTreeMap<String, String>) -> Record {
    values.into_iter().collect()
}

/// Apply every operation in order, never stopping on failure.
pub fn run<B: KvBinding>(db: &mut B, operations: Vec<Operation>) -> Vec<OperationReport> {
    operations
        .into_iter()
        .map(|operation| apply(db, operation))
        .collect()
}

fn apply<B: KvBinding>(db: &mut B, operation: Operation) -> OperationReport {
    match operation {
        Operation::Insert { table, key, values } => {
            let status = db.insert(&table, &key, &to_record(values));
            report("insert", key, status, Vec::new())
        }
        Operation::Read { table, key, fields } => {
            let mut result = Record::new();
            let status = db.read(&table, &key, fields.as_ref(), &mut result);
            let records = if status.is_ok() { vec![result] } else { Vec::new() };
            report("read", key, status, records)
        }
        Operation::Delete { table, key } => {
            let status = db.delete(&table, &key);
            report("delete", key, status, Vec::new())
        }
        Operation::Update { table, key, values } => {
            let status = db.update(&table, &key, &to_record(values));
            report("update", key, status, Vec::new())
        }
        Operation::Scan {
            table,
            key,
            count,
            fields,
        } => {
            let mut result = Vec::new();
            let status = db.scan(&table, &key, count, fields.as_ref(), &mut result);
            report("scan", key, status, result)
        }
    }
}

fn report(op: &'static str, key: String, status: Status, records: Vec<Record>) -> OperationReport {
    OperationReport {
        op,
        key,
        status,
        records: records.iter().map(Record::to_lossy_strings).collect(),
    }
}
