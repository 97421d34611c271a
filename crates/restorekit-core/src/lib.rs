mod adapters;
mod collab;
mod error;
mod options;
mod orchestrator;

pub use adapters::{ArchiveRecordSource, CoreRecordSource, CoreStreamOpener, OplogSinkAdapter, SinkAdapter};
pub use collab::{DocCodec, InputSource, ReportLevel, Reporter, ServerSession};
pub use error::{RestoreError, RestoreOutcome};
pub use options::{validate_options, Options};
pub use orchestrator::Orchestrator;
