use kvrecord::store::fs_backend::{escape_key, unescape_key};
use kvrecord::{AttrValue, AttributeKind, FsBackend, KvBackend, Model, RecordError};
use serde_json::{json, Value};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn setup() -> (TempDir, Arc<FsBackend>) {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(FsBackend::new(dir.path().join("records")));
    (dir, backend)
}

fn widgets(backend: Arc<FsBackend>) -> Model {
    Model::builder("Widget")
        .attribute("count", AttributeKind::Integer)
        .attribute("name", AttributeKind::String)
        .versioned()
        .build(backend)
        .unwrap()
}

#[test]
fn test_fs_backend_basic_io() {
    let (_dir, backend) = setup();

    backend.set("Widget:1", "{\"a\":1}").unwrap();
    assert_eq!(backend.get("Widget:1").unwrap().as_deref(), Some("{\"a\":1}"));
    assert!(backend.exists("Widget:1").unwrap());

    assert!(backend.delete("Widget:1").unwrap());
    assert!(!backend.delete("Widget:1").unwrap());
    assert_eq!(backend.get("Widget:1").unwrap(), None);
}

#[test]
fn test_fs_backend_atomic_write_artifacts() {
    let (_dir, backend) = setup();
    backend.set("Widget:1", "{}").unwrap();

    let expected_path = backend.root().join("Widget%3A1.json");
    assert!(expected_path.exists());

    for entry in fs::read_dir(backend.root()).unwrap() {
        let path = entry.unwrap().path();
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(!name.ends_with(".tmp"), "Found leftover tmp file: {}", name);
    }
}

#[test]
fn test_failed_rename_leaves_no_tmp_file() {
    let (_dir, backend) = setup();
    // A non-empty directory at the target path makes the rename fail.
    let blocked = backend.document_path("Widget:1");
    fs::create_dir_all(blocked.join("inner")).unwrap();

    assert!(matches!(backend.set("Widget:1", "{}"), Err(RecordError::Io(_))));
    for entry in fs::read_dir(backend.root()).unwrap() {
        let path = entry.unwrap().path();
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(!name.ends_with(".tmp"), "Found leftover tmp file: {}", name);
    }
}

#[test]
fn test_fs_backend_scan_ignores_foreign_files() {
    let (_dir, backend) = setup();
    backend.set("Widget:1", "{}").unwrap();
    backend.set("Widget:2", "{}").unwrap();
    backend.set("Gadget:1", "{}").unwrap();
    fs::write(backend.root().join("junk.txt"), "ignore me").unwrap();
    fs::write(backend.root().join("bad%zz.json"), "ignore me too").unwrap();

    assert_eq!(backend.scan("Widget:").unwrap(), vec!["Widget:1", "Widget:2"]);
    assert_eq!(backend.scan("").unwrap().len(), 3);
}

#[test]
fn test_scan_of_missing_root_is_empty() {
    let (_dir, backend) = setup();
    assert!(backend.scan("Widget:").unwrap().is_empty());
}

#[test]
fn test_key_escaping() {
    let key = "Widget:persons:42:settings/ü";
    let escaped = escape_key(key);
    assert!(!escaped.contains(':'));
    assert!(!escaped.contains('/'));
    assert_eq!(unescape_key(&escaped).as_deref(), Some(key));
}

#[test]
fn test_records_survive_a_new_backend_instance() {
    let (dir, backend) = setup();
    let model = widgets(backend);
    let mut w = model.create(json!({"count": 1, "name": "gear"})).unwrap();
    w.update(json!({"count": 2})).unwrap();

    let reopened = widgets(Arc::new(FsBackend::new(dir.path().join("records"))));
    let found = reopened.find(w.id()).unwrap();
    assert_eq!(found.get("count").unwrap(), &AttrValue::Integer(2));
    assert_eq!(found.current_version(), Some(2));
    assert_eq!(
        found.version(1).unwrap().attributes.get("count"),
        Some(&AttrValue::Integer(1))
    );
    assert!(found.saved_change_to_attribute("count").unwrap());
}

#[test]
fn test_document_wire_format() {
    let (_dir, backend) = setup();
    let model = widgets(backend.clone());
    let mut w = model.create(json!({"id": "w1", "count": 1})).unwrap();
    w.update(json!({"count": 2})).unwrap();

    let raw = fs::read_to_string(backend.document_path("Widget:w1")).unwrap();
    let doc: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(doc["attributes"]["count"], json!(2));
    assert_eq!(doc["previous_attributes"]["count"], json!(1));
    assert_eq!(doc["current_version"], json!(2));
    assert_eq!(doc["versions"]["1"]["attributes"]["count"], json!(1));
    assert!(doc["created_at"].is_string());
    assert!(doc["updated_at"].is_string());
}

#[test]
fn test_destroy_removes_file() {
    let (_dir, backend) = setup();
    let model = widgets(backend.clone());
    let mut w = model.create(json!({"id": "w1"})).unwrap();
    w.destroy().unwrap();

    assert!(!backend.document_path("Widget:w1").exists());
    assert!(matches!(model.find("w1"), Err(RecordError::RecordNotFound(_))));
}
