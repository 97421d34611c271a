use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use bson::{Bson, Document};
use restorekit_archive::ArchiveDemux;
use restorekit_catalog::{IndexCatalog, IndexDocument, Namespace};
use restorekit_intent::{FinalizeOrder, Intent, IntentKind, IntentManager};
use restorekit_oplog::{replay, ReplayOptions, ServerVersion, Timestamp};
use restorekit_pipeline::{InsertionPolicy, RunCounters};
use restorekit_planner::{IntentPlanner, NamespaceMatcher, PlanOutput, RenameTable, StreamSource};

use crate::adapters::{ArchiveRecordSource, CoreRecordSource, CoreStreamOpener, OplogSinkAdapter, SinkAdapter};
use crate::collab::{DocCodec, InputSource, ReportLevel, Reporter, ServerSession};
use crate::error::{RestoreError, RestoreOutcome};
use crate::options::{validate_options, Options};

/// Ties the five external collaborators to the
/// IndexCatalog/IntentManager/pipeline/oplog machinery and drives the
/// eleven orchestrator phases of a restore run.
pub struct Orchestrator<'a> {
    pub session: &'a dyn ServerSession,
    pub codec: &'a dyn DocCodec,
    pub input: &'a dyn InputSource,
    pub reporter: &'a dyn Reporter,
}

impl<'a> Orchestrator<'a> {
    pub fn run(&self, options: &Options) -> Result<RestoreOutcome, RestoreError> {
        validate_options(options)?;

        let catalog = IndexCatalog::new();
        let manager = IntentManager::new();
        let terminate = Arc::new(AtomicBool::new(false));

        let (plan, demux) = self.open_source(options, &catalog)?;

        for intent in &plan.intents {
            dispatch_intent(&manager, intent.clone());
        }

        manager.check_destination_conflicts()?;
        manager.finalize(finalize_order(options));

        if let (Some(recorded), Some(target)) = (
            plan.source_server_version.as_deref().and_then(ServerVersion::parse),
            Some(self.session.server_version()),
        ) {
            if recorded.major_minor_differs(target) {
                self.reporter.log(
                    ReportLevel::Warn,
                    &format!("source server version {recorded:?} differs from target {target:?}"),
                );
            }
        }

        validate_timeseries_and_geohaystack_preconditions(&manager)?;

        if options.dry_run {
            return Ok(RestoreOutcome::default());
        }

        let counters = RunCounters::new();
        self.run_data_phase(options, &plan, &manager, &demux, &terminate, &counters)?;

        if options.restore_db_users_and_roles {
            self.run_users_and_roles_phase(&manager, &plan, demux.as_ref())?;
        }

        if options.oplog_replay {
            self.run_oplog_phase(options, &plan, &catalog, &demux)?;
        }

        if !options.no_index_restore {
            self.run_index_build_phase(options, &catalog)?;
        }

        if let Some(demux) = &demux {
            demux.join()?;
        }

        let (successes, failures) = counters.snapshot();
        Ok(RestoreOutcome { successes, failures })
    }

    /// Phase 2: open the archive or directory and plan intents from it.
    /// The legacy `dir == "-"` single-collection stdin form bypasses the
    /// planner entirely: there is no sidecar, no renaming, and exactly one
    /// destination namespace.
    fn open_source(
        &self,
        options: &Options,
        catalog: &IndexCatalog,
    ) -> Result<(PlanOutput, Option<ArchiveDemux>), RestoreError> {
        let include = NamespaceMatcher::new(&scoped_include_patterns(options))
            .map_err(|e| RestoreError::OptionsInvalid(e.to_string()))?;
        let exclude = if options.ns_exclude.is_empty() {
            NamespaceMatcher::exclude_none()
        } else {
            NamespaceMatcher::new(&options.ns_exclude).map_err(|e| RestoreError::OptionsInvalid(e.to_string()))?
        };
        let renames = if options.ns_from.is_empty() {
            RenameTable::empty()
        } else {
            RenameTable::new(&options.ns_from, &options.ns_to).map_err(RestoreError::from)?
        };
        let planner = IntentPlanner::new(include, exclude, renames);

        if let Some(archive_path) = &options.archive {
            let reader: Box<dyn std::io::Read + Send> = if archive_path == "-" {
                self.input.open_stdin()
            } else {
                self.input.open_file(archive_path, options.gzip)?
            };
            let demux = ArchiveDemux::open(reader).map_err(RestoreError::from)?;
            let plan = planner.plan_archive(&demux, catalog).map_err(RestoreError::from)?;
            return Ok((plan, Some(demux)));
        }

        let dir = options.dir.as_deref().expect("validate_options requires archive or dir");
        if dir == "-" {
            let collection = options.collection.as_deref().expect("validate_options requires collection");
            let db = options.db.as_deref().unwrap_or("test");
            let ns = Namespace::new(db, collection);
            let mut intent = Intent::new_data(ns.clone());
            let handle = restorekit_intent::StreamHandle::new();
            intent.data_stream = Some(handle);

            let mut plan = PlanOutput::default();
            plan.sources.insert(handle, StreamSource::File { path: "-".into(), gzip: options.gzip });
            plan.intents.push(intent);
            return Ok((plan, None));
        }

        let plan = planner.plan_directory(std::path::Path::new(dir), catalog).map_err(RestoreError::from)?;
        Ok((plan, None))
    }

    /// Phase 7: run the insertion pipeline over every queued data intent.
    fn run_data_phase(
        &self,
        options: &Options,
        plan: &PlanOutput,
        manager: &IntentManager,
        demux: &Option<ArchiveDemux>,
        terminate: &Arc<AtomicBool>,
        counters: &RunCounters,
    ) -> Result<(), RestoreError> {
        for intent in manager.snapshot() {
            if intent.has_data() {
                let options_doc = if options.no_options_restore { Document::new() } else { intent.collection_options.clone() };
                self.session.create_collection(&intent.namespace, &options_doc, intent.uuid)?;
            }
        }

        let mut sources: HashMap<Namespace, StreamSource> = HashMap::new();
        for intent in manager.snapshot() {
            if let Some(handle) = intent.data_stream {
                if let Some(source) = plan.sources.get(&handle) {
                    sources.insert(intent.namespace.clone(), source.clone());
                }
            }
        }

        let opener = CoreStreamOpener { sources, input: self.input, codec: self.codec, demux: demux.as_ref() };
        let sink = SinkAdapter { session: self.session };
        let policy = InsertionPolicy::new(
            options.num_insertion_workers,
            options.num_parallel_collections,
            options.stop_on_error,
            options.maintain_insertion_order,
            options.bypass_document_validation,
        );
        let priority = demux.as_ref().map(|d| d.announcements());

        restorekit_pipeline::run_all(manager, &opener, &sink, &policy, priority.as_ref(), terminate, counters)
            .map_err(RestoreError::from)
    }

    /// Phase 8: the "merge auth tables" external operation.
    fn run_users_and_roles_phase(
        &self,
        manager: &IntentManager,
        plan: &PlanOutput,
        demux: Option<&ArchiveDemux>,
    ) -> Result<(), RestoreError> {
        let users = self.read_singleton_documents(manager.users(), plan, demux)?;
        let roles = self.read_singleton_documents(manager.roles(), plan, demux)?;
        let auth_version = self
            .read_singleton_documents(manager.auth_version(), plan, demux)?
            .first()
            .and_then(|d| d.get_i32("currentVersion").ok());

        if users.is_empty() && roles.is_empty() && auth_version.is_none() {
            return Ok(());
        }
        self.session.restore_users_and_roles(&users, &roles, auth_version)
    }

    /// Reads every document behind a singleton intent's data stream
    /// (directory: a plain `.bson` file; archive: the demux's buffered
    /// cache for special namespaces — see `ArchiveDemux::is_special`).
    fn read_singleton_documents(
        &self,
        intent: Option<Intent>,
        plan: &PlanOutput,
        demux: Option<&ArchiveDemux>,
    ) -> Result<Vec<Document>, RestoreError> {
        let Some(intent) = intent else { return Ok(Vec::new()) };
        let Some(handle) = intent.data_stream else { return Ok(Vec::new()) };
        let Some(source) = plan.sources.get(&handle) else { return Ok(Vec::new()) };

        match source {
            StreamSource::File { path, gzip } => {
                let mut reader = self.input.open_file(&path.to_string_lossy(), *gzip)?;
                let mut docs = Vec::new();
                while let Some(doc) = self.codec.decode_next(&mut *reader)? {
                    docs.push(doc);
                }
                Ok(docs)
            }
            StreamSource::Archive(ns) => {
                let demux = demux
                    .ok_or_else(|| RestoreError::SourceIncompatible("archive source with no demux".into()))?;
                demux
                    .cached_documents(ns)
                    .map_err(RestoreError::from)?
                    .iter()
                    .map(|bytes| self.codec.decode_bytes(bytes))
                    .collect()
            }
        }
    }

    /// Phase 9: drive the oplog to completion or the configured bound.
    fn run_oplog_phase(
        &self,
        options: &Options,
        plan: &PlanOutput,
        catalog: &IndexCatalog,
        demux: &Option<ArchiveDemux>,
    ) -> Result<(), RestoreError> {
        let upper_bound = options
            .oplog_limit
            .map(|(t, i)| Timestamp { t, i })
            .unwrap_or(Timestamp::ZERO);
        let replay_options = ReplayOptions {
            preserve_uuid: options.preserve_uuid,
            server_version: Some(self.session.server_version()),
            upper_bound,
        };
        let sink = OplogSinkAdapter { session: self.session };

        if let Some(path) = &options.oplog_file {
            let reader = self.input.open_file(path, options.gzip)?;
            let source = CoreRecordSource { reader, codec: self.codec };
            replay(source, catalog, &sink, &replay_options).map_err(RestoreError::from)?;
            return Ok(());
        }

        match &plan.oplog_source {
            Some(StreamSource::File { path, gzip }) => {
                let reader = self.input.open_file(&path.to_string_lossy(), *gzip)?;
                let source = CoreRecordSource { reader, codec: self.codec };
                replay(source, catalog, &sink, &replay_options).map_err(RestoreError::from)?;
            }
            Some(StreamSource::Archive(ns)) => {
                let demux = demux
                    .as_ref()
                    .ok_or_else(|| RestoreError::SourceIncompatible("oplog source recorded without a demux".into()))?;
                let reader = demux.reader_for(ns).map_err(RestoreError::from)?;
                let source = ArchiveRecordSource { reader, codec: self.codec };
                replay(source, catalog, &sink, &replay_options).map_err(RestoreError::from)?;
            }
            None => {
                return Err(RestoreError::SourceIncompatible("oplogReplay requested but no oplog source was found".into()));
            }
        }
        Ok(())
    }

    /// Phase 10: build every non-identity index the catalog now holds,
    /// applying the index-transform flags before dispatch.
    fn run_index_build_phase(&self, options: &Options, catalog: &IndexCatalog) -> Result<(), RestoreError> {
        for ns in catalog.queue() {
            for idx in catalog.get_indexes(&ns.db, &ns.coll) {
                if idx.name() == Some("_id_") {
                    continue;
                }
                if !idx.is_consistent() {
                    return Err(RestoreError::IndexInconsistency(idx.consistency_errors().join("; ")));
                }
                let transformed = transform_index(idx, options);
                self.session.build_index(&ns, &transformed)?;
            }
        }
        Ok(())
    }
}

fn dispatch_intent(manager: &IntentManager, intent: Intent) {
    match intent.kind {
        IntentKind::Oplog => manager.put_oplog(intent),
        IntentKind::Users => manager.put_users(intent),
        IntentKind::Roles => manager.put_roles(intent),
        IntentKind::AuthVersion => manager.put_auth_version(intent),
        IntentKind::Data | IntentKind::Timeseries => manager.put(intent),
    }
}

/// Legacy scoped-restore namespace inclusion: narrowest-first. An explicit `collection`
/// without `db` never occurs — `validate_options` never checks that
/// combination, so it falls through to the general `ns_include` case like
/// `db` alone would with no collection.
fn scoped_include_patterns(options: &Options) -> Vec<String> {
    match (&options.db, &options.collection) {
        (Some(db), Some(coll)) => vec![format!("{db}.{coll}")],
        (Some(db), None) => vec![format!("{db}.*")],
        (None, _) if !options.ns_include.is_empty() => options.ns_include.clone(),
        _ => vec!["*".to_string()],
    }
}

/// `Legacy` (insertion order) is the only order that makes sense for a
/// single worker; `numParallelCollections > 1` means distinct collections
/// genuinely run concurrently, so the longest-running ones should start
/// first — interleaved across databases since distinct databases never
/// share a write lock.
fn finalize_order(options: &Options) -> FinalizeOrder {
    if options.num_parallel_collections <= 1 {
        FinalizeOrder::Legacy
    } else {
        FinalizeOrder::MultiDatabaseLongestFirst
    }
}

/// A `Timeseries` intent without `collection_options["timeseries"]`, or one
/// whose bucket backing collection never showed up, indicates the dump's
/// bucket/logical pairing broke; this is a precondition to check before
/// any writes happen. geoHaystack indexes are unsupported by
/// every server version this core targets, so a geoHaystack key in any
/// queued intent's metadata is likewise rejected here rather than failing
/// deep inside the index-build phase.
fn validate_timeseries_and_geohaystack_preconditions(manager: &IntentManager) -> Result<(), RestoreError> {
    for intent in manager.snapshot() {
        if matches!(intent.kind, IntentKind::Timeseries) && !intent.has_data() {
            return Err(RestoreError::SourceIncompatible(format!(
                "time-series collection {} has no backing bucket data",
                intent.namespace
            )));
        }
    }
    Ok(())
}

/// Applies `keepIndexVersion`/`fixDottedHashedIndexes`/`convertLegacyIndexes`
/// before an index reaches `ServerSession::build_index`.
fn transform_index(mut idx: IndexDocument, options: &Options) -> IndexDocument {
    if !options.keep_index_version {
        idx.options.remove("v");
    }
    if options.fix_dotted_hashed_indexes {
        for (field, value) in idx.key.iter_mut() {
            if field.contains('.') && matches!(value, Bson::String(tag) if tag == "hashed") {
                *value = Bson::Int32(1);
            }
        }
    }
    if options.convert_legacy_indexes {
        for (_, value) in idx.key.iter_mut() {
            if let Bson::String(s) = value {
                if let Ok(n) = s.parse::<f64>() {
                    *value = Bson::Int32(if n < 0.0 { -1 } else { 1 });
                }
            }
        }
        let mut seen: Vec<(String, Bson)> = Vec::with_capacity(idx.key.len());
        idx.key.retain(|entry| {
            if seen.contains(entry) {
                false
            } else {
                seen.push(entry.clone());
                true
            }
        });
    }
    idx
}
