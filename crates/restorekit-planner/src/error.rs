use std::fmt;
use std::io;

use restorekit_catalog::CatalogError;

#[derive(Debug)]
pub enum PlannerError {
    Io(io::Error),
    BadPattern(String, String),
    BadSidecar(String, String),
    RenameForbidden(String),
    DestinationConflict(String, String),
    Catalog(CatalogError),
}

impl fmt::Display for PlannerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlannerError::Io(e) => write!(f, "planner io error: {e}"),
            PlannerError::BadPattern(pat, msg) => write!(f, "bad namespace pattern {pat:?}: {msg}"),
            PlannerError::BadSidecar(path, msg) => write!(f, "bad metadata sidecar {path}: {msg}"),
            PlannerError::RenameForbidden(ns) => {
                write!(f, "cannot independently rename time-series bucket collection {ns}")
            }
            PlannerError::DestinationConflict(a, b) => {
                write!(f, "source namespaces {a} and {b} both map to the same destination")
            }
            PlannerError::Catalog(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for PlannerError {}

impl From<io::Error> for PlannerError {
    fn from(e: io::Error) -> Self {
        PlannerError::Io(e)
    }
}

impl From<CatalogError> for PlannerError {
    fn from(e: CatalogError) -> Self {
        PlannerError::Catalog(e)
    }
}
