mod demux;
mod error;
mod frame;
mod prelude;

pub use demux::{is_special, ArchiveDemux, NamespaceReader};
pub use error::ArchiveError;
pub use prelude::{write_header, ArchivePrelude, NamespaceMetadataEntry, MAGIC};
