use std::fs;

use restorekit_catalog::IndexCatalog;
use restorekit_planner::{IntentPlanner, NamespaceMatcher, RenameTable, StreamSource};

fn write_collection(dir: &std::path::Path, db: &str, coll: &str, bytes: &[u8], indexes_json: &str) {
    let db_dir = dir.join(db);
    fs::create_dir_all(&db_dir).unwrap();
    fs::write(db_dir.join(format!("{coll}.bson")), bytes).unwrap();
    fs::write(
        db_dir.join(format!("{coll}.metadata.json")),
        format!(r#"{{"options":{{}},"indexes":{indexes_json}}}"#),
    )
    .unwrap();
}

#[test]
fn excluded_namespace_is_not_planned() {
    let dir = tempfile::tempdir().unwrap();
    write_collection(dir.path(), "shop", "orders", b"doc-bytes", "[]");
    write_collection(dir.path(), "shop", "secrets", b"doc-bytes", "[]");

    let planner = IntentPlanner::new(
        NamespaceMatcher::include_all(),
        NamespaceMatcher::new(&["shop.secrets".to_string()]).unwrap(),
        RenameTable::empty(),
    );
    let catalog = IndexCatalog::new();
    let output = planner.plan_directory(dir.path(), &catalog).unwrap();

    let names: Vec<String> = output.intents.iter().map(|i| i.namespace.to_string()).collect();
    assert!(names.contains(&"shop.orders".to_string()));
    assert!(!names.contains(&"shop.secrets".to_string()));
}

#[test]
fn rename_rule_changes_destination_but_not_source() {
    let dir = tempfile::tempdir().unwrap();
    write_collection(dir.path(), "shop", "orders", b"doc-bytes", "[]");

    let renames = RenameTable::new(&["shop.orders".to_string()], &["archive.orders_2020".to_string()]).unwrap();
    let planner = IntentPlanner::new(NamespaceMatcher::include_all(), NamespaceMatcher::exclude_none(), renames);
    let catalog = IndexCatalog::new();
    let output = planner.plan_directory(dir.path(), &catalog).unwrap();

    assert_eq!(output.intents.len(), 1);
    let intent = &output.intents[0];
    assert_eq!(intent.namespace.to_string(), "archive.orders_2020");
    assert_eq!(intent.source_namespace.to_string(), "shop.orders");
}

#[test]
fn data_and_sidecar_streams_resolve_to_the_right_files() {
    let dir = tempfile::tempdir().unwrap();
    write_collection(dir.path(), "shop", "orders", b"doc-bytes", r#"[{"key":[["_id",1]],"options":{"name":"_id_"}}]"#);

    let planner = IntentPlanner::new(NamespaceMatcher::include_all(), NamespaceMatcher::exclude_none(), RenameTable::empty());
    let catalog = IndexCatalog::new();
    let output = planner.plan_directory(dir.path(), &catalog).unwrap();

    let intent = &output.intents[0];
    let data_handle = intent.data_stream.unwrap();
    match output.sources.get(&data_handle).unwrap() {
        StreamSource::File { path, gzip } => {
            assert!(path.ends_with("shop/orders.bson"));
            assert!(!gzip);
        }
        StreamSource::Archive(_) => panic!("expected a file source"),
    }

    let indexes = catalog.get_indexes("shop", "orders");
    assert_eq!(indexes.len(), 1);
    assert_eq!(indexes[0].name(), Some("_id_"));
}

#[test]
fn gzipped_data_file_is_recognized() {
    let dir = tempfile::tempdir().unwrap();
    let db_dir = dir.path().join("shop");
    fs::create_dir_all(&db_dir).unwrap();
    fs::write(db_dir.join("orders.bson.gz"), b"not-really-gzip-but-unread-by-planner").unwrap();

    let planner = IntentPlanner::new(NamespaceMatcher::include_all(), NamespaceMatcher::exclude_none(), RenameTable::empty());
    let catalog = IndexCatalog::new();
    let output = planner.plan_directory(dir.path(), &catalog).unwrap();

    assert_eq!(output.intents.len(), 1);
    let handle = output.intents[0].data_stream.unwrap();
    match output.sources.get(&handle).unwrap() {
        StreamSource::File { gzip, .. } => assert!(*gzip),
        StreamSource::Archive(_) => panic!("expected a file source"),
    }
}

#[test]
fn root_oplog_file_is_tracked_separately_from_collection_intents() {
    let dir = tempfile::tempdir().unwrap();
    write_collection(dir.path(), "shop", "orders", b"doc-bytes", "[]");
    fs::write(dir.path().join("oplog.bson"), b"oplog-bytes").unwrap();

    let planner = IntentPlanner::new(NamespaceMatcher::include_all(), NamespaceMatcher::exclude_none(), RenameTable::empty());
    let catalog = IndexCatalog::new();
    let output = planner.plan_directory(dir.path(), &catalog).unwrap();

    assert_eq!(output.intents.len(), 1);
    match output.oplog_source.unwrap() {
        StreamSource::File { path, gzip } => {
            assert!(path.ends_with("oplog.bson"));
            assert!(!gzip);
        }
        StreamSource::Archive(_) => panic!("expected a file source"),
    }
}

#[test]
fn timeseries_bucket_and_logical_collection_merge_into_one_intent() {
    let dir = tempfile::tempdir().unwrap();
    write_collection(dir.path(), "shop", "metrics", b"", "[]");
    write_collection(dir.path(), "shop", "system.buckets.metrics", b"bucket-bytes", "[]");

    let planner = IntentPlanner::new(NamespaceMatcher::include_all(), NamespaceMatcher::exclude_none(), RenameTable::empty());
    let catalog = IndexCatalog::new();
    let output = planner.plan_directory(dir.path(), &catalog).unwrap();

    assert_eq!(output.intents.len(), 1);
    let intent = &output.intents[0];
    assert_eq!(intent.namespace.to_string(), "shop.metrics");
    assert!(intent.has_data());
}
