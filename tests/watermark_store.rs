// tests/watermark_store.rs
use news_relay::watermark::{FIRST_RUN_LOOKBACK_SECS, MAX_SEEN_IDS};
use news_relay::{DedupMode, Watermark, WatermarkStore};

fn ids(v: &[&str]) -> Watermark {
    Watermark::IdSet(v.iter().map(|s| s.to_string()).collect())
}

#[test]
fn save_then_load_is_lossless() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state").join("history.json");

    let mut store = WatermarkStore::load(&path);
    store.set("last_official_time", Watermark::Timestamp(1_770_048_123.5));
    store.set("last_reddit_wherewindsmeet_time", ids(&["a", "b"]));
    store.save().unwrap();
    assert!(!store.is_dirty());

    let reloaded = WatermarkStore::load(&path);
    assert_eq!(reloaded.entries(), store.entries());
    assert_eq!(
        reloaded.get("last_official_time", DedupMode::Timestamp),
        Watermark::Timestamp(1_770_048_123.5)
    );

    // saving an unchanged reload writes the same bytes
    let before = std::fs::read(&path).unwrap();
    let mut again = WatermarkStore::load(&path);
    again.set("last_official_time", Watermark::Timestamp(1_770_048_123.5));
    assert!(!again.is_dirty());
    std::fs::remove_file(&path).unwrap();
    again.save().unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), before);
}

#[test]
fn file_format_is_a_flat_object() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.json");
    let mut store = WatermarkStore::load(&path);
    store.set("ts", Watermark::Timestamp(10.0));
    store.set("ids", ids(&["x"]));
    store.save().unwrap();

    let v: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(v["ts"], serde_json::json!(10.0));
    assert_eq!(v["ids"], serde_json::json!(["x"]));
}

#[test]
fn corrupted_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.json");
    std::fs::write(&path, "{ this is not json").unwrap();

    let store = WatermarkStore::load(&path);
    assert!(store.entries().is_empty());
    assert_eq!(store.get_at("k", DedupMode::IdSet, 0.0), ids(&[]));
}

#[test]
fn wrong_shape_for_mode_uses_default() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.json");
    std::fs::write(&path, r#"{"a": ["x", "y"], "b": 1700000000.0, "c": {"nested": true}}"#).unwrap();

    let store = WatermarkStore::load(&path);
    let now = 1_800_000_000.0;
    assert_eq!(
        store.get_at("a", DedupMode::Timestamp, now),
        Watermark::Timestamp(now - FIRST_RUN_LOOKBACK_SECS)
    );
    assert_eq!(store.get_at("b", DedupMode::IdSet, now), ids(&[]));
    assert_eq!(store.get_at("b", DedupMode::Timestamp, now), Watermark::Timestamp(1_700_000_000.0));
    // the unusable entry is dropped, the rest kept
    assert_eq!(store.entries().len(), 2);
}

#[test]
fn oversized_id_set_is_trimmed_to_newest() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.json");
    let all: Vec<String> = (0..60).map(|i| format!("id{i}")).collect();
    std::fs::write(&path, serde_json::to_string(&serde_json::json!({ "r": all })).unwrap()).unwrap();

    let store = WatermarkStore::load(&path);
    let Watermark::IdSet(seen) = store.get("r", DedupMode::IdSet) else {
        panic!("expected id set");
    };
    assert_eq!(seen.len(), MAX_SEEN_IDS);
    assert_eq!(seen.front().map(String::as_str), Some("id10"));
    assert_eq!(seen.back().map(String::as_str), Some("id59"));
}
