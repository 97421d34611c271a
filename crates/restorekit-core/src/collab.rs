use std::io::Read;

use bson::Document;
use restorekit_catalog::{IndexDocument, Namespace};
use restorekit_oplog::ServerVersion;
use restorekit_pipeline::InsertError;

use crate::error::RestoreError;

/// The database client: connection pooling, write concern, authentication,
/// and every write the core issues.
/// A real implementation lives outside this workspace; `restorekit-cli`
/// supplies an in-memory double for tests and for the runnable binary.
pub trait ServerSession: Send + Sync {
    fn server_version(&self) -> ServerVersion;

    fn drop_collection(&self, ns: &Namespace) -> Result<(), RestoreError>;
    fn create_collection(&self, ns: &Namespace, options: &Document, uuid: Option<[u8; 16]>) -> Result<(), RestoreError>;

    /// Bulk insert for the insertion pipeline. Returns the pipeline's own
    /// `InsertError` classification rather than
    /// `RestoreError`, so `restorekit-pipeline`'s tolerate-vs-fatal policy
    /// never has to unwrap a bigger error type to inspect it.
    fn bulk_insert(&self, ns: &Namespace, docs: &[Document], bypass_validation: bool) -> Result<(), InsertError>;

    fn oplog_insert(&self, ns: &Namespace, doc: &Document) -> Result<(), RestoreError>;
    fn oplog_update(&self, ns: &Namespace, query: &Document, update: &Document) -> Result<(), RestoreError>;
    fn oplog_delete(&self, ns: &Namespace, query: &Document) -> Result<(), RestoreError>;
    /// Raw command dispatch, used by both the oplog replayer's command
    /// branches and the orchestrator's index-build phase.
    fn run_command(&self, db: &str, command: &Document) -> Result<(), RestoreError>;

    fn build_index(&self, ns: &Namespace, idx: &IndexDocument) -> Result<(), RestoreError>;

    /// The "merge auth tables" external operation.
    fn restore_users_and_roles(&self, users: &[Document], roles: &[Document], auth_version: Option<i32>) -> Result<(), RestoreError>;
}

/// Binary-document encoding/decoding primitives. Two entry points because the two input shapes differ: a
/// directory/oplog file is an undelimited sequence the codec must parse
/// one document at a time off a reader, while an archive frame already
/// carries one document's exact byte span.
pub trait DocCodec: Send + Sync {
    /// Decode the next document from `reader`, or `Ok(None)` at a clean
    /// end of stream.
    fn decode_next(&self, reader: &mut dyn Read) -> Result<Option<Document>, RestoreError>;
    fn decode_bytes(&self, bytes: &[u8]) -> Result<Document, RestoreError>;
}

/// Raw file and standard-input I/O, gzip decompression. By convention `path == "-"` means standard
/// input — this lets the legacy `dir == "-"` single-collection restore
/// flow through the same `StreamSource::File` shape the
/// planner already produces for every other source, rather than needing a
/// third `StreamSource` variant.
pub trait InputSource: Send + Sync {
    fn open_file(&self, path: &str, gzip: bool) -> Result<Box<dyn Read + Send>, RestoreError>;
    fn open_stdin(&self) -> Box<dyn Read + Send>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportLevel {
    Info,
    Warn,
}

/// Progress and log output. The default implementation wraps `tracing`;
/// the tick cadence (~3s) is the caller's responsibility, not this
/// trait's — it only receives ticks, it doesn't schedule them.
pub trait Reporter: Send + Sync {
    fn log(&self, level: ReportLevel, message: &str);
    fn data_progress(&self, ns: &Namespace, bytes_done: u64, bytes_total: u64);
    fn oplog_progress(&self, entries_per_second: f64);
}
