use std::path::PathBuf;

use restorekit_catalog::Namespace;

/// Where the bytes behind a [`restorekit_intent::StreamHandle`] actually
/// live. `restorekit-pipeline` resolves this through the `InputSource`
/// collaborator (files) or `restorekit-archive`'s demux (archives) — the
/// planner never opens data files itself, only records where they are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamSource {
    File { path: PathBuf, gzip: bool },
    Archive(Namespace),
}
