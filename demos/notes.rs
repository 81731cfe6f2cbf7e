//! Example: a small notebook persisted in a SQLite file.
//!
//! Run with `cargo run --example notes`.

use lawnchair::{Document, DocumentStore, SqliteBackend, StoreConfig};
use serde_json::json;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let dir = tempfile::tempdir()?;
    let config = StoreConfig {
        name: "notebook".into(),
        table: "notes".into(),
        max: 1 << 20,
        ..StoreConfig::default()
    };

    let backend = SqliteBackend::open_database(dir.path(), &config)?;
    let store = DocumentStore::builder(backend)
        .config(config)
        .on_error(|op, e| eprintln!("{op} failed: {e}"))
        .on_data(|op, n| println!("{op} removed {n} note(s)"))
        .build()?;

    println!("=== Writing notes ===\n");

    let mut groceries = Document::from_value(json!({
        "title": "Groceries",
        "items": ["eggs", "basil"],
        "pinned": true,
    }))
    .map_err(|v| format!("not an object: {v}"))?;
    let key = store.save(&mut groceries)?;
    println!("Saved groceries as {key}");

    for title in ["Call plumber", "Repot fern"] {
        let mut note = Document::from_value(json!({ "title": title, "pinned": false }))
            .map_err(|v| format!("not an object: {v}"))?;
        store.save(&mut note)?;
    }

    groceries.insert("items", json!(["eggs", "basil", "lemons"]));
    store.save(&mut groceries)?;
    println!("Updated: {}", store.get(&key)?.map(Document::into_value).unwrap_or_default());

    println!("\n=== All notes ===\n");
    store.each(|note, i| println!("{i}: {}", note["title"]))?;

    println!("\n=== Pinned ===\n");
    store.find(
        |note| note["pinned"] == true,
        |note, i| println!("{i}: {}", note["title"]),
    )?;

    println!("\n=== Clean up ===\n");
    store.remove(&groceries)?;
    store.nuke()?;
    println!("Notes left: {}", store.all()?.len());

    // A key that was never saved is reported, not silently dropped.
    let mut stray = Document::from_value(json!({"key": "nope", "title": "?"}))
        .map_err(|v| format!("not an object: {v}"))?;
    if store.save(&mut stray).is_err() {
        println!("Stray update rejected");
    }

    Ok(())
}
