use restorekit_archive::ArchiveError;
use restorekit_catalog::CatalogError;
use restorekit_intent::IntentError;
use restorekit_oplog::OplogError;
use restorekit_pipeline::PipelineError;
use restorekit_planner::PlannerError;

/// The one `thiserror`-derived enum in a workspace otherwise built on
/// manual `Display`/`From` chains — this is the edge crate that talks to
/// collaborators, so it gets the same treatment a boundary error type
/// deserves.
#[derive(Debug, thiserror::Error)]
pub enum RestoreError {
    #[error("invalid options: {0}")]
    OptionsInvalid(String),

    #[error("corrupt input: {0}")]
    InputCorrupt(String),

    #[error("source incompatible: {0}")]
    SourceIncompatible(String),

    #[error("destination busy: {0}")]
    DestinationBusy(String),

    #[error("write failure: {0}")]
    WriteFailure(String),

    #[error("oplog replay refused an unknown command: {0}")]
    OplogUnknownCommand(String),

    #[error("index inconsistency: {0}")]
    IndexInconsistency(String),

    #[error("restore terminated")]
    Terminated,

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Intent(#[from] IntentError),

    #[error(transparent)]
    Planner(#[from] PlannerError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Oplog(#[from] OplogError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// The structured result of a restore run: a fatal `Err` is the only
/// thing that produces a non-zero exit; `failures` counts documents the
/// server rejected while the run continued under duplicate-key tolerance.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RestoreOutcome {
    pub successes: u64,
    pub failures: u64,
}
