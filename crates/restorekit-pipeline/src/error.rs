use std::fmt;

/// Server-side outcome of one bulk-insert call, classified so the worker
/// can decide tolerate-vs-fatal without inspecting server-specific error
/// codes itself.
#[derive(Debug, Clone)]
pub enum InsertError {
    DuplicateKey,
    Validation(String),
    Other(String),
}

impl fmt::Display for InsertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InsertError::DuplicateKey => write!(f, "duplicate key"),
            InsertError::Validation(msg) => write!(f, "document validation failed: {msg}"),
            InsertError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for InsertError {}

#[derive(Debug)]
pub enum PipelineError {
    /// A fatal insert error surfaced by the sink (not tolerated under the
    /// active policy).
    Insert(InsertError),
    /// The document source failed to produce the next document.
    Source(String),
    /// The shared terminate flag was observed mid-flush.
    Terminated,
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Insert(e) => write!(f, "insert failed: {e}"),
            PipelineError::Source(msg) => write!(f, "document source error: {msg}"),
            PipelineError::Terminated => write!(f, "restore terminated"),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<InsertError> for PipelineError {
    fn from(e: InsertError) -> Self {
        PipelineError::Insert(e)
    }
}
