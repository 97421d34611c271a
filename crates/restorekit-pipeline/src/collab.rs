use bson::Document;
use restorekit_catalog::Namespace;

use crate::error::{InsertError, PipelineError};

/// A per-intent source of already-decoded documents. `restorekit-core`
/// adapts its `InputSource`/`DocCodec` collaborators into this — the
/// pipeline itself never opens a file or an archive reader.
pub trait DocumentStream: Send {
    /// Next document, or `Ok(None)` at end of stream.
    fn next_document(&mut self) -> Result<Option<Document>, PipelineError>;
}

/// Where bulk-insert commands land. `restorekit-core` adapts its
/// `ServerSession` collaborator into this.
pub trait BulkSink: Send + Sync {
    fn bulk_insert(&self, ns: &Namespace, docs: &[Document], bypass_validation: bool) -> Result<(), InsertError>;
}
