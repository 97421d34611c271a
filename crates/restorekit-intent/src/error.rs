use std::fmt;

use restorekit_catalog::Namespace;

#[derive(Debug)]
pub enum IntentError {
    /// Two distinct source namespaces renamed to the same destination.
    DestinationConflict {
        destination: Namespace,
        sources: Vec<Namespace>,
    },
    /// Both an `oplog.bson` and a `local.oplog.rs`-sourced candidate were
    /// supplied without `setSmartPickOplog`, or smart-pick couldn't find a
    /// replica-set-local candidate among several.
    AmbiguousOplogSource,
}

impl fmt::Display for IntentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntentError::DestinationConflict { destination, sources } => {
                write!(
                    f,
                    "destination namespace {destination} has conflicting sources: {}",
                    sources
                        .iter()
                        .map(|s| s.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            }
            IntentError::AmbiguousOplogSource => {
                write!(f, "multiple oplog sources supplied and none could be chosen unambiguously")
            }
        }
    }
}

impl std::error::Error for IntentError {}
