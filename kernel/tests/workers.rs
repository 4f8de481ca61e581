// Worker-per-adapter scenarios over the process-wide log.

use std::sync::Arc;
use std::thread;

use logkv_kernel::handle::{self, get_log};
use logkv_kernel::log::LogStore;
use logkv_kernel::{AdapterOptions, KvAdapter, KvBinding, KvError, LogConfig, Record, Status};

const TABLE: &str = "usertable";

fn global_adapter() -> KvAdapter {
    // every test races to install the same config; losing is fine
    handle::install_global(LogConfig::in_memory()).ok();
    KvAdapter::open(AdapterOptions::default()).unwrap()
}

fn values(key: &str) -> Record {
    [("field0", format!("{key}-0")), ("field1", format!("{key}-1"))]
        .into_iter()
        .collect()
}

#[test]
fn adapters_share_one_log() {
    let first = global_adapter();
    let second = global_adapter();

    assert!(Arc::ptr_eq(first.log(), second.log()));
    assert!(Arc::ptr_eq(first.log(), &get_log().unwrap()));
}

#[test]
fn global_config_is_fixed_once_installed() {
    global_adapter();

    assert_eq!(
        handle::install_global(LogConfig::default()),
        Err(handle::AlreadyInitialized)
    );
    assert!(handle::global().get().unwrap().cache_stats().is_some());
}

#[test]
fn inserts_are_invisible_to_other_workers() {
    let mut writer = global_adapter();
    let mut reader = global_adapter();

    let position = writer.insert(TABLE, "isolated", &values("isolated")).unwrap();

    let mut result = Record::new();
    assert_eq!(
        KvBinding::read(&mut reader, TABLE, "isolated", None, &mut result),
        Status::Error
    );

    // the entry is in the shared log all the same
    let bytes = reader.log().read(position).unwrap();
    assert_eq!(logkv_kernel::record::decode(&bytes).unwrap(), values("isolated"));
}

#[test]
fn workers_on_threads_each_see_their_own_keys() {
    let workers: Vec<_> = (0..4)
        .map(|worker| {
            thread::spawn(move || {
                let mut db = global_adapter();
                let keys: Vec<String> = (0..10).map(|i| format!("w{worker}-user{i}")).collect();
                for key in &keys {
                    assert_eq!(KvBinding::insert(&mut db, TABLE, key, &values(key)), Status::Ok);
                }

                let mut scanned = Vec::new();
                assert_eq!(
                    KvBinding::scan(&mut db, TABLE, &keys[5], 100, None, &mut scanned),
                    Status::Ok
                );
                assert_eq!(scanned.len(), 5);
                assert_eq!(scanned[0], values(&keys[5]));

                db.index().len()
            })
        })
        .collect();

    for worker in workers {
        assert_eq!(worker.join().unwrap(), 10);
    }
}

#[test]
fn full_key_lifecycle() {
    let mut db = global_adapter();

    for key in ["user3", "user1", "user2"] {
        assert_eq!(KvBinding::insert(&mut db, TABLE, key, &values(key)), Status::Ok);
    }

    // scan walks insertion order, not key order
    let mut scanned = Vec::new();
    assert_eq!(KvBinding::scan(&mut db, TABLE, "user1", 10, None, &mut scanned), Status::Ok);
    assert_eq!(scanned, vec![values("user1"), values("user2")]);

    // overwrite wins
    let replacement: Record = [("field0", "new")].into_iter().collect();
    assert_eq!(KvBinding::insert(&mut db, TABLE, "user1", &replacement), Status::Ok);
    let mut result = Record::new();
    assert_eq!(KvBinding::read(&mut db, TABLE, "user1", None, &mut result), Status::Ok);
    assert_eq!(result, replacement);

    // update is never applied
    assert_eq!(KvBinding::update(&mut db, TABLE, "user1", &values("user1")), Status::Error);
    assert_eq!(db.read(TABLE, "user1", None).unwrap(), replacement);

    // delete, then the key is gone
    assert_eq!(KvBinding::delete(&mut db, TABLE, "user1"), Status::Ok);
    assert!(matches!(db.read(TABLE, "user1", None), Err(KvError::NotFound(_))));
    assert_eq!(KvBinding::delete(&mut db, TABLE, "user1"), Status::Error);
}
