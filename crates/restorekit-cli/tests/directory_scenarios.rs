use std::fs;
use std::io::Write;

use bson::Document;
use restorekit_catalog::Namespace;
use restorekit_cli::codec::BsonCodec;
use restorekit_cli::io::FsInput;
use restorekit_cli::memory_session::MemorySession;
use restorekit_cli::reporter::TracingReporter;
use restorekit_core::{Options, Orchestrator};
use restorekit_oplog::ServerVersion;

fn write_bson_file(path: &std::path::Path, docs: &[Document]) {
    let mut file = fs::File::create(path).unwrap();
    for doc in docs {
        file.write_all(&bson::to_vec(doc).unwrap()).unwrap();
    }
}

/// `db1` with `c1` (100 docs + sidecar), `c2` (0 docs, no sidecar — never
/// becomes an intent), `c3` (0 docs + sidecar), `c4` (10 docs + sidecar).
fn sample_dir(tmp: &tempfile::TempDir) -> std::path::PathBuf {
    let root = tmp.path().join("dump");
    let db_dir = root.join("db1");
    fs::create_dir_all(&db_dir).unwrap();

    let c1_docs: Vec<Document> = (0..100).map(|i| bson::doc! { "_id": i }).collect();
    write_bson_file(&db_dir.join("c1.bson"), &c1_docs);
    fs::write(db_dir.join("c1.metadata.json"), r#"{"options":{},"indexes":[]}"#).unwrap();

    fs::write(db_dir.join("c3.metadata.json"), r#"{"options":{},"indexes":[]}"#).unwrap();

    let c4_docs: Vec<Document> = (0..10).map(|i| bson::doc! { "_id": i }).collect();
    write_bson_file(&db_dir.join("c4.bson"), &c4_docs);
    fs::write(db_dir.join("c4.metadata.json"), r#"{"options":{},"indexes":[]}"#).unwrap();

    root
}

fn orchestrator_pieces() -> (BsonCodec, FsInput, TracingReporter, MemorySession) {
    (BsonCodec, FsInput, TracingReporter, MemorySession::new(ServerVersion::new(6, 0, 0)))
}

/// `nsExclude = "db1.c1"` restores everything else; server state has
/// `c4` at 10 docs and `c1` absent.
#[test]
fn ns_exclude_restores_every_other_collection() {
    let tmp = tempfile::tempdir().unwrap();
    let root = sample_dir(&tmp);
    let (codec, input, reporter, session) = orchestrator_pieces();
    let orchestrator = Orchestrator { session: &session, codec: &codec, input: &input, reporter: &reporter };

    let options = Options {
        dir: Some(root.to_string_lossy().into_owned()),
        ns_exclude: vec!["db1.c1".to_string()],
        ..Default::default()
    };
    let outcome = orchestrator.run(&options).unwrap();

    assert_eq!(session.collection(&Namespace::new("db1", "c4")).len(), 10);
    assert!(session.collection(&Namespace::new("db1", "c1")).is_empty());
    assert!(session.collection(&Namespace::new("db1", "c3")).is_empty());
    assert_eq!(outcome.successes, 10);
    assert_eq!(outcome.failures, 0);
}

/// Renaming `db1.c1` to `db1.c1renamed` restores it under the new name
/// and leaves the original namespace untouched.
#[test]
fn ns_from_ns_to_renames_the_destination_namespace() {
    let tmp = tempfile::tempdir().unwrap();
    let root = sample_dir(&tmp);
    let (codec, input, reporter, session) = orchestrator_pieces();
    let orchestrator = Orchestrator { session: &session, codec: &codec, input: &input, reporter: &reporter };

    let options = Options {
        dir: Some(root.to_string_lossy().into_owned()),
        ns_from: vec!["db1.c1".to_string()],
        ns_to: vec!["db1.c1renamed".to_string()],
        ..Default::default()
    };
    let outcome = orchestrator.run(&options).unwrap();

    assert_eq!(session.collection(&Namespace::new("db1", "c1renamed")).len(), 100);
    assert!(session.collection(&Namespace::new("db1", "c1")).is_empty());
    assert_eq!(session.collection(&Namespace::new("db1", "c4")).len(), 10);
    assert_eq!(outcome.successes, 110);
    assert_eq!(outcome.failures, 0);
}

#[test]
fn dry_run_reports_no_server_mutation() {
    let tmp = tempfile::tempdir().unwrap();
    let root = sample_dir(&tmp);
    let (codec, input, reporter, session) = orchestrator_pieces();
    let orchestrator = Orchestrator { session: &session, codec: &codec, input: &input, reporter: &reporter };

    let options = Options { dir: Some(root.to_string_lossy().into_owned()), dry_run: true, ..Default::default() };
    orchestrator.run(&options).unwrap();

    assert!(session.collection(&Namespace::new("db1", "c1")).is_empty());
    assert!(session.collection(&Namespace::new("db1", "c4")).is_empty());
}
