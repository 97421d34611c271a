use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use restorekit_archive::{is_special, ArchiveDemux};
use restorekit_catalog::{CollectionMetadata, IndexCatalog, Namespace};
use restorekit_intent::{Intent, IntentKind, StreamHandle};

use crate::encoding::resolve_collection_name;
use crate::error::PlannerError;
use crate::matcher::NamespaceMatcher;
use crate::rename::RenameTable;
use crate::sidecar::{parse_directory_prelude, parse_metadata_sidecar, DirectoryPrelude};
use crate::source::StreamSource;

/// The namespace the oplog appears under inside an archive stream.
const ARCHIVE_OPLOG_NAMESPACE: &str = "local.oplog.rs";

/// The intents a planning pass produced, plus where each `StreamHandle`'s
/// bytes actually live. `restorekit-pipeline` resolves sources through
/// `InputSource` (files) or the archive demux (archives); the planner never
/// opens a data file itself.
#[derive(Debug, Default)]
pub struct PlanOutput {
    pub intents: Vec<Intent>,
    pub sources: HashMap<StreamHandle, StreamSource>,
    pub oplog_source: Option<StreamSource>,
    pub source_server_version: Option<String>,
}

pub struct IntentPlanner {
    include: NamespaceMatcher,
    exclude: NamespaceMatcher,
    renames: RenameTable,
}

impl IntentPlanner {
    pub fn new(include: NamespaceMatcher, exclude: NamespaceMatcher, renames: RenameTable) -> Self {
        IntentPlanner { include, exclude, renames }
    }

    fn selected(&self, ns: &Namespace) -> bool {
        self.include.matches(ns) && !self.exclude.matches(ns)
    }

    /// Walks a directory-format dump. Collections appear
    /// as immediate children of one sub-directory per database; `oplog.bson`
    /// and `prelude.json(.gz)` live at the root.
    pub fn plan_directory(&self, root: &Path, catalog: &IndexCatalog) -> Result<PlanOutput, PlannerError> {
        let mut output = PlanOutput::default();

        for prelude_name in ["prelude.json", "prelude.json.gz"] {
            let path = root.join(prelude_name);
            if path.is_file() {
                let DirectoryPrelude { server_version } = parse_directory_prelude(&path)?;
                output.source_server_version = Some(server_version);
                break;
            }
        }

        for oplog_name in ["oplog.bson", "oplog.bson.gz"] {
            let path = root.join(oplog_name);
            if path.is_file() {
                output.oplog_source =
                    Some(StreamSource::File { path: path.clone(), gzip: oplog_name.ends_with(".gz") });
            }
        }

        for entry in fs::read_dir(root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                self.plan_database_dir(&entry.path(), catalog, &mut output)?;
            }
        }

        Ok(output)
    }

    /// Plans from an already-opened archive. Special namespaces
    /// (`admin.system.{users,roles,version}`) become singleton intents whose
    /// data lives in the demux's cache rather than a per-namespace stream;
    /// `local.oplog.rs` is pulled out as the oplog source rather than a
    /// regular collection intent.
    pub fn plan_archive(&self, demux: &ArchiveDemux, catalog: &IndexCatalog) -> Result<PlanOutput, PlannerError> {
        let mut output = PlanOutput::default();
        output.source_server_version = Some(demux.prelude().source_server_version.clone());

        let mut by_source: HashMap<Namespace, (Intent, CollectionMetadata)> = HashMap::new();

        for entry in demux.namespace_metadata() {
            let ns = entry.namespace.clone();

            if ns.to_string() == ARCHIVE_OPLOG_NAMESPACE {
                output.oplog_source = Some(StreamSource::Archive(ns));
                continue;
            }

            if is_special(&ns) {
                let kind = match ns.coll.as_str() {
                    "system.users" => IntentKind::Users,
                    "system.roles" => IntentKind::Roles,
                    "system.version" => IntentKind::AuthVersion,
                    _ => continue, // legacy system.indexes: folded into metadata already
                };
                let handle = StreamHandle::new();
                output.sources.insert(handle, StreamSource::Archive(ns.clone()));
                let mut intent = Intent::singleton(kind, ns);
                intent.data_stream = Some(handle);
                output.intents.push(intent);
                continue;
            }

            let handle = StreamHandle::new();
            output.sources.insert(handle, StreamSource::Archive(ns.clone()));
            let mut intent = Intent::new_data(ns.clone());
            intent.data_stream = Some(handle);
            intent.collection_options = entry.metadata.options.clone();
            intent.uuid = entry.metadata.uuid;
            by_source.insert(ns, (intent, entry.metadata.clone()));
        }

        merge_pairs(&mut by_source);

        for (source_ns, (intent, metadata)) in by_source {
            if !self.selected(&source_ns) {
                continue;
            }
            self.finalize_intent(intent, metadata, source_ns, catalog, &mut output)?;
        }

        Ok(output)
    }

    fn plan_database_dir(
        &self,
        db_dir: &Path,
        catalog: &IndexCatalog,
        output: &mut PlanOutput,
    ) -> Result<(), PlannerError> {
        let db_name = db_dir
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .unwrap_or_default();

        // Group files by stem: `<stem>.bson`/`.bson.gz` is data, `<stem>.metadata.json` is the sidecar.
        let mut data_files: HashMap<String, (PathBuf, bool)> = HashMap::new();
        let mut sidecar_files: HashMap<String, PathBuf> = HashMap::new();

        for entry in fs::read_dir(db_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if let Some(stem) = file_name.strip_suffix(".metadata.json") {
                sidecar_files.insert(stem.to_string(), path);
            } else if let Some(stem) = file_name.strip_suffix(".bson.gz") {
                data_files.insert(stem.to_string(), (path, true));
            } else if let Some(stem) = file_name.strip_suffix(".bson") {
                data_files.insert(stem.to_string(), (path, false));
            }
            // Unrecognized extensions are skipped; logging is the Reporter
            // collaborator's job, not this crate's.
        }

        let mut stems: Vec<String> = data_files.keys().chain(sidecar_files.keys()).cloned().collect();
        stems.sort();
        stems.dedup();

        let mut by_source: HashMap<Namespace, (Intent, CollectionMetadata)> = HashMap::new();

        for stem in stems {
            let sidecar_path = sidecar_files.get(&stem);
            let metadata = sidecar_path.map(|p| parse_metadata_sidecar(p)).transpose()?.unwrap_or_default();
            let coll_name = resolve_collection_name(&stem, metadata.collection_name_override.as_deref());
            let source_ns = Namespace::new(db_name.clone(), coll_name);

            let mut intent = Intent::new_data(source_ns.clone());
            if let Some((path, gzip)) = data_files.get(&stem) {
                let handle = StreamHandle::new();
                output.sources.insert(handle, StreamSource::File { path: path.clone(), gzip: *gzip });
                intent.data_stream = Some(handle);
                intent.byte_size = fs::metadata(path)?.len();
            }
            if let Some(path) = sidecar_path {
                let handle = StreamHandle::new();
                output.sources.insert(handle, StreamSource::File { path: path.clone(), gzip: false });
                intent.metadata_stream = Some(handle);
                intent.collection_options = metadata.options.clone();
                intent.uuid = metadata.uuid;
            }

            by_source.insert(source_ns, (intent, metadata));
        }

        merge_pairs(&mut by_source);

        for (source_ns, (intent, metadata)) in by_source {
            if !self.selected(&source_ns) {
                continue;
            }
            self.finalize_intent(intent, metadata, source_ns, catalog, output)?;
        }

        Ok(())
    }

    /// Renaming a time-series bucket independently of its logical collection
    /// is forbidden; since [`merge_pairs`] re-keys a merged pair under the
    /// logical (non-bucket) namespace, `RenameTable::resolve` already applies
    /// the right branch for both merged time-series intents and ordinary
    /// collections.  An orphan bucket intent (no matching logical file) is
    /// still bucket-shaped and still hits the forbidding branch.
    fn finalize_intent(
        &self,
        mut intent: Intent,
        metadata: CollectionMetadata,
        source_ns: Namespace,
        catalog: &IndexCatalog,
        output: &mut PlanOutput,
    ) -> Result<(), PlannerError> {
        let destination = self.renames.resolve(&source_ns)?;
        intent.source_namespace = source_ns;
        intent.namespace = destination;

        seed_catalog(catalog, &intent.namespace, &metadata);
        output.intents.push(intent);
        Ok(())
    }
}

/// Merges a logical time-series intent with its `system.buckets.<name>`
/// counterpart when both are present, keyed afterward under the logical
/// (non-bucket) source namespace — mirroring `Intent::merge_timeseries`,
/// which keeps `namespace`/`source_namespace` as the logical pair's.
fn merge_pairs(by_source: &mut HashMap<Namespace, (Intent, CollectionMetadata)>) {
    let logical_namespaces: Vec<Namespace> =
        by_source.keys().filter(|ns| ns.bucket_logical_name().is_none()).cloned().collect();
    for logical_ns in logical_namespaces {
        let bucket_ns = logical_ns.bucket_namespace();
        if by_source.contains_key(&bucket_ns) {
            let (logical, logical_meta) = by_source.remove(&logical_ns).expect("checked above");
            let (bucket, bucket_meta) = by_source.remove(&bucket_ns).expect("checked above");
            let merged_meta = if bucket_meta.indexes.is_empty() && bucket_meta.options.is_empty() {
                logical_meta
            } else {
                bucket_meta
            };
            by_source.insert(logical_ns, (Intent::merge_timeseries(logical, bucket), merged_meta));
        }
    }
}

fn seed_catalog(catalog: &IndexCatalog, ns: &Namespace, metadata: &CollectionMetadata) {
    catalog.set_collation(&ns.db, &ns.coll, metadata.has_simple_collation());
    for idx in &metadata.indexes {
        let _ = catalog.add_index(&ns.db, &ns.coll, idx.clone());
    }
}
