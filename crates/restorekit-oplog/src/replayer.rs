use bson::{Bson, Document};
use restorekit_catalog::{IndexCatalog, Namespace};

use crate::command::{
    create_is_simple_collation, legacy_system_indexes_insert, parse_coll_mod_index, parse_commit_index_build,
    parse_create_indexes, parse_delete_indexes_spec, strip_coll_mod_for_dispatch, strip_ui,
};
use crate::error::OplogError;
use crate::record::{OpKind, OplogRecord, Timestamp};
use crate::skiplist::{is_ignored_command, is_ignored_namespace, is_known_command};
use crate::txn::TxnBuffer;
use crate::version::{requires_ui_for_create_indexes, strips_legacy_coll_mod_options, ServerVersion};

/// Pulls decoded oplog entries one at a time; `restorekit-core` supplies the
/// real implementation over a `DocCodec`/`InputSource` pair, mirroring
/// `restorekit-pipeline::DocumentStream`'s narrow-trait shape.
pub trait RecordSource: Send {
    fn next_record(&mut self) -> Result<Option<Document>, OplogError>;
}

/// The server-facing half of replay: CRUD application and raw command
/// dispatch. `restorekit-core`'s `ServerSession` adapter implements this.
pub trait OplogSink: Send {
    fn insert(&self, ns: &Namespace, doc: &Document) -> Result<(), OplogError>;
    fn update(&self, ns: &Namespace, query: &Document, update: &Document) -> Result<(), OplogError>;
    fn delete(&self, ns: &Namespace, query: &Document) -> Result<(), OplogError>;
    fn command(&self, db: &str, command: &Document) -> Result<(), OplogError>;
}

#[derive(Debug, Clone, Copy)]
pub struct ReplayOptions {
    pub preserve_uuid: bool,
    pub server_version: Option<ServerVersion>,
    pub upper_bound: Timestamp,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self { preserve_uuid: false, server_version: None, upper_bound: Timestamp::ZERO }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplayStats {
    pub applied: u64,
    pub skipped: u64,
}

/// Drives the full operation log to completion or until a record fails the
/// timestamp bound.
pub fn replay(
    mut source: impl RecordSource,
    catalog: &IndexCatalog,
    sink: &dyn OplogSink,
    options: &ReplayOptions,
) -> Result<ReplayStats, OplogError> {
    let mut txns = TxnBuffer::new();
    let mut stats = ReplayStats::default();

    loop {
        let Some(doc) = source.next_record()? else { break };
        let record = OplogRecord::from_document(&doc)?;
        if !record.ts.admissible(options.upper_bound) {
            break;
        }
        apply_record(record, catalog, sink, options, &mut txns, &mut stats)?;
    }
    Ok(stats)
}

fn apply_record(
    record: OplogRecord,
    catalog: &IndexCatalog,
    sink: &dyn OplogSink,
    options: &ReplayOptions,
    txns: &mut TxnBuffer,
    stats: &mut ReplayStats,
) -> Result<(), OplogError> {
    if record.partial_txn {
        txns.accumulate(record);
        return Ok(());
    }
    if record.commit_transaction {
        let buffered = txns.commit(&record);
        for op in buffered {
            dispatch(op, catalog, sink, options, stats)?;
        }
        return Ok(());
    }
    if record.op == OpKind::Command && record.command_name() == Some("abortTransaction") {
        txns.abort(&record);
        return Ok(());
    }
    if record.prepare {
        txns.prepare(&record);
        return Ok(());
    }
    dispatch(record, catalog, sink, options, stats)
}

fn dispatch(
    record: OplogRecord,
    catalog: &IndexCatalog,
    sink: &dyn OplogSink,
    options: &ReplayOptions,
    stats: &mut ReplayStats,
) -> Result<(), OplogError> {
    if is_ignored_namespace(&record.ns) {
        stats.skipped += 1;
        return Ok(());
    }
    match record.op {
        OpKind::NoOp => Ok(()),
        OpKind::Insert | OpKind::Update | OpKind::Delete => dispatch_crud(record, sink, options, stats),
        OpKind::Command => dispatch_command(record, catalog, sink, options, stats),
    }
}

fn dispatch_crud(
    record: OplogRecord,
    sink: &dyn OplogSink,
    _options: &ReplayOptions,
    stats: &mut ReplayStats,
) -> Result<(), OplogError> {
    let ns: Namespace = record
        .ns
        .parse()
        .map_err(|_| OplogError::MalformedRecord(format!("invalid namespace {:?}", record.ns)))?;
    let result = match record.op {
        OpKind::Insert => sink.insert(&ns, &record.o),
        OpKind::Update => {
            let query = record.o2.as_ref().ok_or_else(|| OplogError::MalformedRecord("update missing o2".into()))?;
            sink.update(&ns, query, &record.o)
        }
        OpKind::Delete => {
            let query = record.o2.as_ref().unwrap_or(&record.o);
            sink.delete(&ns, query)
        }
        _ => unreachable!(),
    };
    result.map_err(|e| OplogError::Dispatch(e.to_string()))?;
    stats.applied += 1;
    Ok(())
}

fn split_ns(ns: &str) -> &str {
    ns.split_once('.').map(|(db, _)| db).unwrap_or(ns)
}

fn dispatch_command(
    record: OplogRecord,
    catalog: &IndexCatalog,
    sink: &dyn OplogSink,
    options: &ReplayOptions,
    stats: &mut ReplayStats,
) -> Result<(), OplogError> {
    let db = split_ns(&record.ns).to_string();
    let name = record
        .command_name()
        .ok_or_else(|| OplogError::MalformedRecord("command op has empty o".into()))?
        .to_string();

    if is_ignored_command(&name) {
        tracing::debug!(command = %name, "skipping ignored oplog command");
        stats.skipped += 1;
        return Ok(());
    }
    if !is_known_command(&name) {
        return Err(OplogError::UnknownCommand(name));
    }

    match name.as_str() {
        "applyOps" => {
            let ops = record
                .o
                .get_array("applyOps")
                .map_err(|_| OplogError::MalformedRecord("applyOps missing array".into()))?;
            for op in ops {
                let mut op_doc = op
                    .as_document()
                    .ok_or_else(|| OplogError::MalformedRecord("applyOps entry is not a document".into()))?
                    .clone();
                if !options.preserve_uuid {
                    strip_ui(&mut op_doc);
                }
                let nested = nested_record(&op_doc, record.ts)?;
                if !nested.ts.admissible(options.upper_bound) {
                    continue;
                }
                dispatch(nested, catalog, sink, options, stats)?;
            }
            Ok(())
        }
        "dropDatabase" => {
            catalog.drop_database(&db);
            dispatch_raw_command(&db, &record.o, sink, stats)
        }
        "drop" => {
            let coll = command_target(&record.o, &name)?;
            catalog.drop_collection(&db, &coll);
            dispatch_raw_command(&db, &record.o, sink, stats)
        }
        "create" => {
            let coll = command_target(&record.o, &name)?;
            catalog.set_collation(&db, &coll, create_is_simple_collation(&record.o));
            dispatch_raw_command(&db, &record.o, sink, stats)
        }
        "createIndexes" => {
            let coll = command_target(&record.o, &name)?;
            let spec = parse_create_indexes(&record.o)?;
            catalog.add_index(&db, &coll, spec.clone())?;
            let needs_ui = record.ui.is_some()
                && options.server_version.is_some_and(requires_ui_for_create_indexes);
            if needs_ui && !options.preserve_uuid {
                let ns = format!("{db}.{coll}");
                let legacy_doc = legacy_system_indexes_insert(&ns, &spec);
                let system_indexes: Namespace = Namespace::new(db.clone(), "system.indexes");
                sink.insert(&system_indexes, &legacy_doc).map_err(|e| OplogError::Dispatch(e.to_string()))?;
            } else {
                return dispatch_raw_command(&db, &record.o, sink, stats);
            }
            stats.applied += 1;
            Ok(())
        }
        "commitIndexBuild" => {
            let coll = command_target(&record.o, &name)?;
            for spec in parse_commit_index_build(&record.o)? {
                catalog.add_index(&db, &coll, spec)?;
            }
            dispatch_raw_command(&db, &record.o, sink, stats)
        }
        "deleteIndex" | "deleteIndexes" | "dropIndex" | "dropIndexes" => {
            let coll = command_target(&record.o, &name)?;
            let spec = parse_delete_indexes_spec(&record.o)?;
            catalog.delete_indexes(&db, &coll, &spec);
            stats.applied += 1;
            Ok(())
        }
        "collMod" => {
            let coll = command_target(&record.o, &name)?;
            if let Some(index_spec) = parse_coll_mod_index(&record.o) {
                catalog.coll_mod(&db, &coll, &index_spec)?;
            }
            let strip_legacy = options.server_version.is_some_and(strips_legacy_coll_mod_options);
            match strip_coll_mod_for_dispatch(&record.o, strip_legacy) {
                Some(remaining) => dispatch_raw_command(&db, &remaining, sink, stats),
                None => {
                    stats.applied += 1;
                    Ok(())
                }
            }
        }
        _ => dispatch_raw_command(&db, &record.o, sink, stats),
    }
}

fn dispatch_raw_command(db: &str, command: &Document, sink: &dyn OplogSink, stats: &mut ReplayStats) -> Result<(), OplogError> {
    sink.command(db, command).map_err(|e| OplogError::Dispatch(e.to_string()))?;
    stats.applied += 1;
    Ok(())
}

fn command_target(o: &Document, command_name: &str) -> Result<String, OplogError> {
    match o.get(command_name) {
        Some(Bson::String(s)) => Ok(s.clone()),
        _ => Err(OplogError::MalformedRecord(format!("{command_name} value is not a collection name"))),
    }
}

/// A nested `applyOps` entry has no `ts` of its own; it inherits the
/// enclosing record's timestamp for admissibility checks.
fn nested_record(doc: &Document, inherited_ts: Timestamp) -> Result<OplogRecord, OplogError> {
    let mut with_ts = doc.clone();
    with_ts.insert("ts", bson::Timestamp { time: inherited_ts.t, increment: inherited_ts.i });
    OplogRecord::from_document(&with_ts)
}
