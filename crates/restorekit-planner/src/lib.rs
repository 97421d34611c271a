mod encoding;
mod error;
mod matcher;
mod planner;
mod rename;
mod sidecar;
mod source;

pub use encoding::{percent_decode, percent_encode, resolve_collection_name};
pub use error::PlannerError;
pub use matcher::NamespaceMatcher;
pub use planner::{IntentPlanner, PlanOutput};
pub use rename::RenameTable;
pub use sidecar::{parse_directory_prelude, parse_metadata_sidecar, DirectoryPrelude};
pub use source::StreamSource;
