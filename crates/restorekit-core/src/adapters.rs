use std::collections::HashMap;

use bson::Document;
use restorekit_archive::{ArchiveDemux, NamespaceReader};
use restorekit_catalog::Namespace;
use restorekit_oplog::{OplogError, OplogSink, RecordSource};
use restorekit_pipeline::{BulkSink, DocumentStream, InsertError, PipelineError, StreamOpener};
use restorekit_planner::StreamSource;

use crate::collab::{DocCodec, ServerSession};

/// Bridges `ServerSession` into `restorekit-pipeline`'s narrow
/// `BulkSink` — the pipeline never learns about collection lifecycle,
/// oplog dispatch, or index building, only bulk inserts.
pub struct SinkAdapter<'a> {
    pub session: &'a dyn ServerSession,
}

impl BulkSink for SinkAdapter<'_> {
    fn bulk_insert(&self, ns: &Namespace, docs: &[Document], bypass_validation: bool) -> Result<(), InsertError> {
        self.session.bulk_insert(ns, docs, bypass_validation)
    }
}

/// Bridges `ServerSession` into `restorekit-oplog`'s narrow `OplogSink`.
pub struct OplogSinkAdapter<'a> {
    pub session: &'a dyn ServerSession,
}

impl OplogSink for OplogSinkAdapter<'_> {
    fn insert(&self, ns: &Namespace, doc: &Document) -> Result<(), OplogError> {
        self.session.oplog_insert(ns, doc).map_err(|e| OplogError::Dispatch(e.to_string()))
    }
    fn update(&self, ns: &Namespace, query: &Document, update: &Document) -> Result<(), OplogError> {
        self.session.oplog_update(ns, query, update).map_err(|e| OplogError::Dispatch(e.to_string()))
    }
    fn delete(&self, ns: &Namespace, query: &Document) -> Result<(), OplogError> {
        self.session.oplog_delete(ns, query).map_err(|e| OplogError::Dispatch(e.to_string()))
    }
    fn command(&self, db: &str, command: &Document) -> Result<(), OplogError> {
        self.session.run_command(db, command).map_err(|e| OplogError::Dispatch(e.to_string()))
    }
}

/// Reads oplog records one at a time off a `DocCodec`-decoded reader.
pub struct CoreRecordSource<'a> {
    pub reader: Box<dyn std::io::Read + Send>,
    pub codec: &'a dyn DocCodec,
}

impl RecordSource for CoreRecordSource<'_> {
    fn next_record(&mut self) -> Result<Option<Document>, OplogError> {
        self.codec.decode_next(&mut self.reader).map_err(|e| OplogError::MalformedRecord(e.to_string()))
    }
}

/// Reads oplog records off an archive-framed namespace stream (the
/// `local.oplog.rs` source inside an archive), one frame per record.
pub struct ArchiveRecordSource<'a> {
    pub reader: NamespaceReader,
    pub codec: &'a dyn DocCodec,
}

impl RecordSource for ArchiveRecordSource<'_> {
    fn next_record(&mut self) -> Result<Option<Document>, OplogError> {
        match self.reader.next_document().map_err(|e| OplogError::MalformedRecord(e.to_string()))? {
            Some(bytes) => self.codec.decode_bytes(&bytes).map(Some).map_err(|e| OplogError::MalformedRecord(e.to_string())),
            None => Ok(None),
        }
    }
}

/// A directory/file-backed document stream: one undelimited `.bson`(.gz)
/// reader, decoded one document at a time.
struct FileDocumentStream<'a> {
    reader: Box<dyn std::io::Read + Send>,
    codec: &'a dyn DocCodec,
}

impl DocumentStream for FileDocumentStream<'_> {
    fn next_document(&mut self) -> Result<Option<Document>, PipelineError> {
        self.codec.decode_next(&mut self.reader).map_err(|e| PipelineError::Source(e.to_string()))
    }
}

/// An archive-backed document stream: each frame already carries one
/// document's exact bytes, decoded with `DocCodec::decode_bytes`.
struct ArchiveDocumentStream<'a> {
    reader: NamespaceReader,
    codec: &'a dyn DocCodec,
}

impl DocumentStream for ArchiveDocumentStream<'_> {
    fn next_document(&mut self) -> Result<Option<Document>, PipelineError> {
        match self.reader.next_document().map_err(|e| PipelineError::Source(e.to_string()))? {
            Some(bytes) => self
                .codec
                .decode_bytes(&bytes)
                .map(Some)
                .map_err(|e| PipelineError::Source(e.to_string())),
            None => Ok(None),
        }
    }
}

/// Resolves each data intent's namespace to its recorded `StreamSource`
/// and opens the right kind of `DocumentStream` for it — the pipeline
/// itself never learns whether it's reading a directory or an archive.
pub struct CoreStreamOpener<'a> {
    pub sources: HashMap<Namespace, StreamSource>,
    pub input: &'a dyn crate::collab::InputSource,
    pub codec: &'a dyn DocCodec,
    pub demux: Option<&'a ArchiveDemux>,
}

impl StreamOpener for CoreStreamOpener<'_> {
    fn open(&self, ns: &Namespace) -> Result<Box<dyn DocumentStream + '_>, PipelineError> {
        match self.sources.get(ns) {
            Some(StreamSource::File { path, gzip }) => {
                let reader = self
                    .input
                    .open_file(&path.to_string_lossy(), *gzip)
                    .map_err(|e| PipelineError::Source(e.to_string()))?;
                Ok(Box::new(FileDocumentStream { reader, codec: self.codec }))
            }
            Some(StreamSource::Archive(source_ns)) => {
                let demux = self.demux.ok_or_else(|| PipelineError::Source("archive source with no demux".into()))?;
                let reader = demux.reader_for(source_ns).map_err(|e| PipelineError::Source(e.to_string()))?;
                Ok(Box::new(ArchiveDocumentStream { reader, codec: self.codec }))
            }
            None => Err(PipelineError::Source(format!("no data source recorded for namespace {ns}"))),
        }
    }
}
