//! Integration tests for document store behavior.
//!
//! Every property is checked against each backend: the in-memory fake and
//! SQLite.

#![cfg(feature = "sqlite")]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use lawnchair::{
    Backend, Document, DocumentStore, Executor, MemoryBackend, MemoryError, Operation, ResultSet,
    SqliteBackend, Statement, StoreError,
};
use proptest::prelude::*;
use serde_json::{json, Value};

fn doc(value: Value) -> Document {
    Document::from_value(value).unwrap()
}

macro_rules! backend_properties {
    ($name:ident, $make:expr) => {
        mod $name {
            use super::*;

            fn store() -> DocumentStore<impl Backend> {
                DocumentStore::open($make).unwrap()
            }

            #[test]
            fn insert_assigns_fresh_key() {
                let store = store();
                let mut existing = doc(json!({"n": 0}));
                store.save(&mut existing).unwrap();
                let before: HashSet<_> = store
                    .all()
                    .unwrap()
                    .into_iter()
                    .map(|d| d.key().unwrap().to_string())
                    .collect();

                let mut fresh = doc(json!({"n": 1}));
                let key = store.save(&mut fresh).unwrap();

                assert!(!key.is_empty());
                assert!(!before.contains(&key));
                assert_eq!(fresh.key(), Some(key.as_str()));
            }

            #[test]
            fn update_preserves_key() {
                let store = store();
                let mut d = doc(json!({"name": "hose", "length": 10}));
                let key = store.save(&mut d).unwrap();

                d.insert("length", 25);
                d.remove("name");
                assert_eq!(store.save(&mut d).unwrap(), key);

                let all = store.all().unwrap();
                assert_eq!(all.len(), 1);
                assert_eq!(all[0].key(), Some(key.as_str()));
                assert_eq!(all[0]["length"], 25);
                assert!(!all[0].contains("name"));
            }

            #[test]
            fn get_after_save() {
                let store = store();
                let mut d = doc(json!({
                    "title": "compost",
                    "layers": [{"green": true}, {"brown": false}],
                    "weight": 12.5,
                    "notes": null
                }));
                let key = store.save(&mut d).unwrap();

                let loaded = store.get(&key).unwrap().unwrap();
                assert_eq!(loaded, d);
                assert_eq!(loaded.key(), Some(key.as_str()));
            }

            #[test]
            fn get_unknown_is_none() {
                let store = store();
                assert_eq!(store.get("00000000-0000-4000-8000-000000000000").unwrap(), None);
            }

            #[test]
            fn remove_is_idempotent() {
                let store = store();
                let mut d = doc(json!({"a": 1}));
                let key = store.save(&mut d).unwrap();

                assert_eq!(store.remove(key.as_str()).unwrap(), 1);
                assert_eq!(store.get(&key).unwrap(), None);
                assert_eq!(store.remove(key.as_str()).unwrap(), 0);
                assert_eq!(store.get(&key).unwrap(), None);
            }

            #[test]
            fn nuke_empties_table() {
                let store = store();
                for n in 0..10 {
                    store.save(&mut doc(json!({ "n": n }))).unwrap();
                }
                store.nuke().unwrap();

                let mut called = None;
                store.each(|_, i| called = Some(i)).unwrap();
                assert_eq!(called, None);
                assert!(store.all().unwrap().is_empty());
            }

            #[test]
            fn find_filters() {
                let store = store();
                for a in 1..=3 {
                    store.save(&mut doc(json!({ "a": a }))).unwrap();
                }

                let mut found = Vec::new();
                store
                    .find(|d| d["a"].as_i64().unwrap() > 1, |d, _| found.push(d))
                    .unwrap();

                assert_eq!(found.len(), 2);
                let mut values: Vec<_> = found.iter().map(|d| d["a"].as_i64().unwrap()).collect();
                values.sort_unstable();
                assert_eq!(values, vec![2, 3]);
                assert!(found.iter().all(|d| d.key().is_some()));
            }

            #[test]
            fn each_visits_every_document_once() {
                let store = store();
                let mut keys = HashSet::new();
                for n in 0..4 {
                    keys.insert(store.save(&mut doc(json!({ "n": n }))).unwrap());
                }

                let mut seen = HashSet::new();
                let mut positions = Vec::new();
                store
                    .each(|d, i| {
                        seen.insert(d.key().unwrap().to_string());
                        positions.push(i);
                    })
                    .unwrap();

                assert_eq!(seen, keys);
                assert_eq!(positions, vec![0, 1, 2, 3]);
            }

            #[test]
            fn stored_value_has_no_key() {
                let store = store();
                let mut d = doc(json!({"field": "v"}));
                let key = store.save(&mut d).unwrap();

                let all = store.all().unwrap();
                assert_eq!(all[0].key(), Some(key.as_str()));
                assert_eq!(all[0].without_key(), doc(json!({"field": "v"})));
            }

            #[test]
            fn unknown_key_update_writes_nothing() {
                let store = store();
                let mut d = doc(json!({"key": "not-there", "a": 1}));
                assert!(matches!(store.save(&mut d), Err(StoreError::NotFound(_))));
                assert!(store.all().unwrap().is_empty());
            }

            #[test]
            fn separate_tables_are_isolated() {
                let backend = Arc::new($make);
                let sheds = DocumentStore::builder(SharedBackend(backend.clone()))
                    .table("sheds")
                    .build()
                    .unwrap();
                let tools = DocumentStore::builder(SharedBackend(backend))
                    .table("tools")
                    .build()
                    .unwrap();

                let mut shed = doc(json!({"size": "small"}));
                let key = sheds.save(&mut shed).unwrap();

                assert_eq!(tools.get(&key).unwrap(), None);
                assert!(tools.all().unwrap().is_empty());
                tools.nuke().unwrap();
                assert_eq!(sheds.all().unwrap().len(), 1);
            }
        }
    };
}

backend_properties!(memory, MemoryBackend::new());
backend_properties!(sqlite, SqliteBackend::open_in_memory().unwrap());

/// Lets two stores share one backend.
struct SharedBackend<B>(Arc<B>);

impl<B: Backend> Backend for SharedBackend<B> {
    type Error = B::Error;

    fn transaction<F, R>(&self, f: F) -> Result<R, Self::Error>
    where
        F: FnOnce(&mut dyn Executor<Error = Self::Error>) -> Result<R, Self::Error>,
    {
        self.0.transaction(f)
    }
}

/// Memory backend whose writes can be switched to fail.
#[derive(Default)]
struct FlakyBackend {
    inner: MemoryBackend,
    fail_writes: AtomicBool,
}

struct FlakyTx<'a> {
    inner: &'a mut dyn Executor<Error = MemoryError>,
    fail_writes: bool,
}

impl Executor for FlakyTx<'_> {
    type Error = MemoryError;

    fn execute(&mut self, statement: &Statement<'_>) -> Result<ResultSet, Self::Error> {
        let is_write = matches!(
            statement,
            Statement::Insert { .. }
                | Statement::Update { .. }
                | Statement::Delete { .. }
                | Statement::DeleteAll { .. }
        );
        if self.fail_writes && is_write {
            return Err(MemoryError::LockPoisoned);
        }
        self.inner.execute(statement)
    }
}

impl Backend for FlakyBackend {
    type Error = MemoryError;

    fn transaction<F, R>(&self, f: F) -> Result<R, Self::Error>
    where
        F: FnOnce(&mut dyn Executor<Error = Self::Error>) -> Result<R, Self::Error>,
    {
        let fail_writes = self.fail_writes.load(Ordering::SeqCst);
        self.inner.transaction(|tx| {
            f(&mut FlakyTx {
                inner: tx,
                fail_writes,
            })
        })
    }
}

#[test]
fn backend_failures_reach_error_hook() {
    let errors = Arc::new(Mutex::new(Vec::new()));
    let seen = errors.clone();
    let store = DocumentStore::builder(FlakyBackend::default())
        .on_error(move |op, e| seen.lock().unwrap().push((op, e.is_backend())))
        .build()
        .unwrap();

    let mut kept = doc(json!({"a": 1}));
    let key = store.save(&mut kept).unwrap();
    store.backend().fail_writes.store(true, Ordering::SeqCst);

    let mut fresh = doc(json!({"b": 2}));
    assert!(matches!(store.save(&mut fresh), Err(StoreError::Backend(_))));
    assert_eq!(fresh.key(), None);

    kept.insert("a", 2);
    assert!(store.save(&mut kept).is_err());
    assert!(store.remove(key.as_str()).is_err());
    assert!(store.nuke().is_err());

    // Reads still work and nothing changed.
    let all = store.all().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0]["a"], 1);

    assert_eq!(
        *errors.lock().unwrap(),
        vec![
            (Operation::Save, true),
            (Operation::Save, true),
            (Operation::Remove, true),
            (Operation::Nuke, true),
        ]
    );
}

#[test]
fn data_hook_not_called_on_failure() {
    let calls = Arc::new(Mutex::new(0));
    let seen = calls.clone();
    let store = DocumentStore::builder(FlakyBackend::default())
        .on_data(move |_, _| *seen.lock().unwrap() += 1)
        .build()
        .unwrap();

    store.backend().fail_writes.store(true, Ordering::SeqCst);
    assert!(store.remove("k").is_err());
    assert!(store.nuke().is_err());
    assert_eq!(*calls.lock().unwrap(), 0);
}

#[test]
fn shared_across_threads() {
    let store = Arc::new(DocumentStore::open(SqliteBackend::open_in_memory().unwrap()).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                (0..25)
                    .map(|n| {
                        store
                            .save(&mut doc(json!({"worker": worker, "n": n})))
                            .unwrap()
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut keys = HashSet::new();
    for handle in handles {
        keys.extend(handle.join().unwrap());
    }

    assert_eq!(keys.len(), 100);
    assert_eq!(store.all().unwrap().len(), 100);
}

#[test]
fn sqlite_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = lawnchair::StoreConfig {
        table: "beds".into(),
        max: 1 << 20,
        ..Default::default()
    };

    let key = {
        let backend = SqliteBackend::open_database(dir.path(), &config).unwrap();
        let store = DocumentStore::with_config(backend, config.clone()).unwrap();
        store.save(&mut doc(json!({"crop": "kale"}))).unwrap()
    };

    let backend = SqliteBackend::open_database(dir.path(), &config).unwrap();
    let store = DocumentStore::with_config(backend, config).unwrap();
    let loaded = store.get(&key).unwrap().unwrap();
    assert_eq!(loaded["crop"], "kale");
}

fn json_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        any::<u64>().prop_map(Value::from),
        (-4000i32..4000).prop_map(|n| Value::from(f64::from(n) / 8.0)),
        "\\PC{0,16}".prop_map(Value::from),
    ];
    leaf.prop_recursive(3, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::from),
            prop::collection::btree_map("\\PC{0,8}", inner, 0..6)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

/// Top-level documents: any field name except `key`.
fn json_document() -> impl Strategy<Value = Document> {
    prop::collection::btree_map("[a-j_]{1,8}", json_value(), 0..8)
        .prop_map(|m| Document::from(m.into_iter().collect::<serde_json::Map<_, _>>()))
}

proptest! {
    #[test]
    fn codec_round_trip(d in json_document()) {
        let text = lawnchair::serialize(&d).unwrap();
        prop_assert_eq!(lawnchair::deserialize(&text).unwrap(), d);
    }

    #[test]
    fn store_round_trip(d in json_document()) {
        let store = DocumentStore::open(MemoryBackend::new()).unwrap();
        let mut saved = d.clone();
        let key = store.save(&mut saved).unwrap();

        let loaded = store.get(&key).unwrap().unwrap();
        prop_assert_eq!(loaded.without_key(), d);
    }

    #[test]
    fn token_shape(len in 0usize..64, radix in 2usize..=62) {
        let token = lawnchair::id::random_token(len, radix).unwrap();
        prop_assert_eq!(token.len(), len);
        let allowed = &lawnchair::id::ALPHABET[..radix];
        prop_assert!(token.bytes().all(|b| allowed.contains(&b)));
    }

    #[test]
    fn malformed_json_is_rejected(text in "[^{}]{0,24}") {
        prop_assert!(lawnchair::deserialize(&text).is_err());
    }
}
