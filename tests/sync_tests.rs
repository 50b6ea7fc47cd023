//! Tests for the sync protocol
//!
//! These tests verify:
//! - Round-trip through the backing file
//! - Change detection (mutations and option changes)
//! - Forced syncs
//! - Failed syncs are non-corrupting and retryable
//! - Output follows the serialization options

use std::fs;

use jsonstore::{json, Config, SerializeOptions, Store, StoreError, Value};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_store() -> (TempDir, Store) {
    let temp_dir = TempDir::new().unwrap();
    let store = Store::open_path(temp_dir.path().join("store.json")).unwrap();
    (temp_dir, store)
}

fn dir_entry_count(temp_dir: &TempDir) -> usize {
    fs::read_dir(temp_dir.path()).unwrap().count()
}

// =============================================================================
// Round-trip Tests
// =============================================================================

#[test]
fn test_round_trip_through_file() {
    let (_temp, mut store) = setup_temp_store();
    let expected = json!({
        "int": 7,
        "neg": -3,
        "float": 0.25,
        "text": "zażółć",
        "flag": true,
        "nothing": null,
        "list": [1, "two", [3]],
        "obj": {"inner": {"deep": "yes"}}
    });

    for (key, value) in expected.as_object().unwrap() {
        store.set(key.clone(), value).unwrap();
    }
    assert!(store.sync().unwrap());

    let reopened = Store::open_path(store.path()).unwrap();
    assert_eq!(&Value::Object(reopened.entries().clone()), &expected);
}

#[test]
fn test_round_trip_with_every_option_combination() {
    let temp_dir = TempDir::new().unwrap();
    let expected = json!({"b": {"ü": [1, {"z": 0, "a": "é"}]}, "a": "\u{1F600}"});

    for indent in [None, Some(0), Some(2)] {
        for sorted in [false, true] {
            for ascii in [false, true] {
                let mut options = SerializeOptions::new().sort_keys(sorted).ensure_ascii(ascii);
                options.indent = indent;
                let path = temp_dir
                    .path()
                    .join(format!("{:?}-{}-{}.json", indent, sorted, ascii));

                let config = Config::builder().path(&path).options(options).build().unwrap();
                let mut store = Store::open(config).unwrap();
                for (key, value) in expected.as_object().unwrap() {
                    store.set(key.clone(), value).unwrap();
                }
                store.sync().unwrap();

                let reopened = Store::open_path(&path).unwrap();
                assert_eq!(Value::Object(reopened.entries().clone()), expected);
            }
        }
    }
}

// =============================================================================
// Change Detection Tests
// =============================================================================

#[test]
fn test_sync_after_open_existing_is_noop() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("store.json");
    fs::write(&path, r#"{"a": 1}"#).unwrap();

    let mut store = Store::open_path(&path).unwrap();

    assert!(!store.sync().unwrap());
    // The hand-written spacing survives because nothing was rewritten
    assert_eq!(fs::read_to_string(&path).unwrap(), r#"{"a": 1}"#);
}

#[test]
fn test_sync_after_create_is_noop() {
    let (_temp, mut store) = setup_temp_store();
    assert!(!store.sync().unwrap());
}

#[test]
fn test_sync_is_idempotent() {
    let (_temp, mut store) = setup_temp_store();
    store.set("a", 1).unwrap();

    assert!(store.sync().unwrap());
    let modified = fs::metadata(store.path()).unwrap().modified().unwrap();
    let content = fs::read(store.path()).unwrap();

    assert!(!store.sync().unwrap());
    assert_eq!(fs::metadata(store.path()).unwrap().modified().unwrap(), modified);
    assert_eq!(fs::read(store.path()).unwrap(), content);
}

#[test]
fn test_sync_after_set_and_delete_writes() {
    let (_temp, mut store) = setup_temp_store();

    store.set("a", 1).unwrap();
    assert!(store.sync().unwrap());

    store.delete("a").unwrap();
    assert!(store.sync().unwrap());
    assert!(!store.is_dirty());
}

#[test]
fn test_setting_same_value_still_counts_as_change() {
    let (_temp, mut store) = setup_temp_store();
    store.set("a", 1).unwrap();
    store.sync().unwrap();

    store.set("a", 1).unwrap();

    assert!(store.is_dirty());
    assert!(store.sync().unwrap());
}

#[test]
fn test_sync_with_different_options_writes() {
    let (_temp, mut store) = setup_temp_store();
    store.set("a", 1).unwrap();
    store.sync().unwrap();

    let pretty = SerializeOptions::new().pretty(2);
    assert!(store.sync_with(&pretty, false).unwrap());
    assert_eq!(fs::read_to_string(store.path()).unwrap(), "{\n  \"a\": 1\n}");

    // Same options again: nothing to do
    assert!(!store.sync_with(&pretty, false).unwrap());

    // Back to the configured defaults: options differ from last sync
    assert!(store.sync().unwrap());
    assert_eq!(fs::read_to_string(store.path()).unwrap(), r#"{"a":1}"#);
}

#[test]
fn test_opaque_flags_take_part_in_change_detection() {
    let (_temp, mut store) = setup_temp_store();

    let flagged = SerializeOptions::new().flag("allow_nan", "false");
    assert!(store.sync_with(&flagged, false).unwrap());
    assert!(!store.sync_with(&flagged, false).unwrap());

    let other = SerializeOptions::new().flag("allow_nan", "true");
    assert!(store.sync_with(&other, false).unwrap());
}

#[test]
fn test_set_options_is_picked_up_by_next_sync() {
    let (_temp, mut store) = setup_temp_store();
    store.set("b", 1).unwrap();
    store.set("a", 2).unwrap();
    store.sync().unwrap();

    store.set_options(SerializeOptions::new().sort_keys(true));
    assert!(!store.is_dirty());

    assert!(store.sync().unwrap());
    assert_eq!(fs::read_to_string(store.path()).unwrap(), r#"{"a":2,"b":1}"#);
    assert!(!store.sync().unwrap());
}

#[test]
fn test_reopen_with_other_options_is_noop_until_mutation() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("store.json");
    {
        let mut store = Store::open_path(&path).unwrap();
        store.set("a", 1).unwrap();
        store.sync().unwrap();
    }

    let config = Config::builder().path(&path).indent(2).build().unwrap();
    let mut store = Store::open(config).unwrap();

    assert!(!store.sync().unwrap());
    store.set("b", 2).unwrap();
    assert!(store.sync().unwrap());
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "{\n  \"a\": 1,\n  \"b\": 2\n}"
    );
}

// =============================================================================
// Forced Sync Tests
// =============================================================================

#[test]
fn test_forced_sync_always_writes() {
    let (_temp, mut store) = setup_temp_store();
    let options = store.options().clone();

    assert!(store.sync_with(&options, true).unwrap());
    assert!(store.sync_with(&options, true).unwrap());
    assert!(!store.sync_with(&options, false).unwrap());
}

#[test]
fn test_forced_sync_repairs_externally_modified_file() {
    let (_temp, mut store) = setup_temp_store();
    store.set("a", 1).unwrap();
    store.sync().unwrap();

    fs::write(store.path(), "garbage").unwrap();
    assert!(!store.sync().unwrap());

    let options = store.options().clone();
    assert!(store.sync_with(&options, true).unwrap());
    assert_eq!(fs::read_to_string(store.path()).unwrap(), r#"{"a":1}"#);
}

// =============================================================================
// Failure Tests
// =============================================================================

#[test]
fn test_failed_sync_keeps_state_and_is_retryable() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().join("data");
    fs::create_dir(&dir).unwrap();
    let path = dir.join("store.json");

    let mut store = Store::open_path(&path).unwrap();
    store.set("keep", "me").unwrap();
    store.sync().unwrap();
    let before = fs::read(&path).unwrap();

    // Pull the directory out from under the store
    store.set("new", 1).unwrap();
    let moved = temp_dir.path().join("moved");
    fs::rename(&dir, &moved).unwrap();

    let err = store.sync().unwrap_err();
    assert!(err.is_sync());
    assert!(matches!(err, StoreError::Sync { .. }));
    assert!(store.is_dirty());
    assert_eq!(store.len(), 2);
    assert_eq!(fs::read(moved.join("store.json")).unwrap(), before);
    assert_eq!(fs::read_dir(&moved).unwrap().count(), 1);

    // Put it back and retry
    fs::rename(&moved, &dir).unwrap();
    assert!(store.sync().unwrap());
    assert!(!store.is_dirty());

    let reopened = Store::open_path(&path).unwrap();
    assert_eq!(reopened.get("new").unwrap(), &json!(1));
    assert_eq!(reopened.get("keep").unwrap(), &json!("me"));
}

#[test]
fn test_open_in_missing_directory_fails_to_create() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nope").join("store.json");

    let result = Store::open_path(&path);

    assert!(matches!(result, Err(StoreError::Sync { .. })));
    assert!(!path.exists());
}

#[test]
fn test_sync_leaves_no_temp_files() {
    let (temp_dir, mut store) = setup_temp_store();

    for i in 0..5 {
        store.set("i", i).unwrap();
        store.sync().unwrap();
    }

    assert_eq!(dir_entry_count(&temp_dir), 1);
}

#[test]
fn test_close_syncs_pending_changes() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested.json");

    let mut store = Store::open_path(&path).unwrap();
    store.set("x", [1, 2]).unwrap();
    store.close().unwrap();

    let reopened = Store::open_path(&path).unwrap();
    assert_eq!(reopened.get("x").unwrap(), &json!([1, 2]));
}

// =============================================================================
// Output Format Tests
// =============================================================================

#[test]
fn test_document_is_compact_by_default() {
    let (_temp, mut store) = setup_temp_store();
    store.set("krk", 1).unwrap();
    store.set("waw", "Warszawa").unwrap();
    store.sync().unwrap();

    assert_eq!(
        fs::read_to_string(store.path()).unwrap(),
        r#"{"krk":1,"waw":"Warszawa"}"#
    );
}

#[test]
fn test_document_honours_ascii_and_sorting() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .path(temp_dir.path().join("store.json"))
        .sort_keys(true)
        .ensure_ascii(true)
        .build()
        .unwrap();
    let mut store = Store::open(config).unwrap();

    store.set("wro", "Wrocław").unwrap();
    store.set("krk", "Kraków").unwrap();
    store.sync().unwrap();

    assert_eq!(
        fs::read_to_string(store.path()).unwrap(),
        r#"{"krk":"Krak\u00f3w","wro":"Wroc\u0142aw"}"#
    );
    assert_eq!(store.get("wro").unwrap(), &json!("Wrocław"));
}
