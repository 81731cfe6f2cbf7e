use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lawnchair::{Document, DocumentStore, MemoryBackend, SqliteBackend};
use serde_json::json;

fn plant(n: u32) -> Document {
    Document::from_value(json!({
        "name": format!("plant-{n}"),
        "height": n % 40,
        "tags": ["perennial", "shade"],
    }))
    .unwrap()
}

fn bench_memory_insert(c: &mut Criterion) {
    c.bench_function("memory::save insert x1000", |b| {
        b.iter(|| {
            let store = DocumentStore::open(MemoryBackend::new()).unwrap();
            for n in 0..1000 {
                store.save(&mut plant(n)).unwrap();
            }
            black_box(store.backend().len("field"))
        })
    });
}

fn bench_sqlite_insert(c: &mut Criterion) {
    c.bench_function("sqlite::save insert x1000", |b| {
        b.iter(|| {
            let store = DocumentStore::open(SqliteBackend::open_in_memory().unwrap()).unwrap();
            for n in 0..1000 {
                store.save(&mut plant(n)).unwrap();
            }
            black_box(store.all().unwrap().len())
        })
    });
}

fn bench_sqlite_update(c: &mut Criterion) {
    let store = DocumentStore::open(SqliteBackend::open_in_memory().unwrap()).unwrap();
    let mut doc = plant(0);
    store.save(&mut doc).unwrap();

    c.bench_function("sqlite::save update", |b| {
        b.iter(|| {
            doc.insert("height", 1);
            black_box(store.save(&mut doc).unwrap())
        })
    });
}

fn bench_sqlite_get(c: &mut Criterion) {
    let store = DocumentStore::open(SqliteBackend::open_in_memory().unwrap()).unwrap();
    let keys: Vec<String> = (0..1000)
        .map(|n| store.save(&mut plant(n)).unwrap())
        .collect();

    c.bench_function("sqlite::get 1000 keys", |b| {
        b.iter(|| {
            for key in &keys {
                black_box(store.get(key).unwrap());
            }
        })
    });
}

fn bench_find(c: &mut Criterion) {
    let memory = DocumentStore::open(MemoryBackend::new()).unwrap();
    let sqlite = DocumentStore::open(SqliteBackend::open_in_memory().unwrap()).unwrap();
    for n in 0..1000 {
        memory.save(&mut plant(n)).unwrap();
        sqlite.save(&mut plant(n)).unwrap();
    }

    c.bench_function("memory::find over 1000", |b| {
        b.iter(|| {
            let mut hits = 0;
            memory
                .find(|d| d["height"].as_u64() > Some(20), |_, _| hits += 1)
                .unwrap();
            black_box(hits)
        })
    });

    c.bench_function("sqlite::find over 1000", |b| {
        b.iter(|| {
            let mut hits = 0;
            sqlite
                .find(|d| d["height"].as_u64() > Some(20), |_, _| hits += 1)
                .unwrap();
            black_box(hits)
        })
    });
}

fn bench_uuid(c: &mut Criterion) {
    c.bench_function("id::uuid x1000", |b| {
        b.iter(|| {
            for _ in 0..1000 {
                black_box(lawnchair::id::uuid());
            }
        })
    });
}

criterion_group!(
    benches,
    bench_memory_insert,
    bench_sqlite_insert,
    bench_sqlite_update,
    bench_sqlite_get,
    bench_find,
    bench_uuid,
);
criterion_main!(benches);
