use std::fmt;

use restorekit_catalog::CatalogError;

#[derive(Debug)]
pub enum OplogError {
    /// A `c`-op command name outside the known/ignored command lists.
    UnknownCommand(String),
    /// A record was missing a field required for its op kind.
    MalformedRecord(String),
    /// `collMod`/`createIndexes`/`deleteIndexes` rejected by the catalog.
    Catalog(CatalogError),
    /// The configured `ServerSession` collaborator rejected a dispatch.
    Dispatch(String),
}

impl fmt::Display for OplogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OplogError::UnknownCommand(name) => write!(f, "unknown oplog command: {name}"),
            OplogError::MalformedRecord(msg) => write!(f, "malformed oplog record: {msg}"),
            OplogError::Catalog(e) => write!(f, "catalog error: {e}"),
            OplogError::Dispatch(msg) => write!(f, "dispatch failed: {msg}"),
        }
    }
}

impl std::error::Error for OplogError {}

impl From<CatalogError> for OplogError {
    fn from(e: CatalogError) -> Self {
        OplogError::Catalog(e)
    }
}
