use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use bson::Document;
use crossbeam::channel::Receiver;
use restorekit_catalog::Namespace;

use crate::collab::{BulkSink, DocumentStream};
use crate::counters::RunCounters;
use crate::error::{InsertError, PipelineError};
use crate::policy::InsertionPolicy;

/// Runs the full read → bulk-insert pipeline for one intent's data stream:
/// a dedicated reader thread feeds a bounded channel, `policy.num_insertion_workers`
/// worker threads drain it into bulk-insert calls. Scoped threads avoid
/// needing `'static` bounds on `stream`/`sink`.
pub fn run_intent(
    ns: &Namespace,
    mut stream: Box<dyn DocumentStream + '_>,
    sink: &(dyn BulkSink + '_),
    policy: &InsertionPolicy,
    terminate: &Arc<AtomicBool>,
    counters: &RunCounters,
) -> Result<(), PipelineError> {
    let (tx, rx) = crossbeam::channel::bounded::<Document>(policy.channel_capacity());

    thread::scope(|scope| {
        let reader_terminate = Arc::clone(terminate);
        scope.spawn(move || {
            loop {
                if reader_terminate.load(Ordering::Relaxed) {
                    break;
                }
                match stream.next_document() {
                    Ok(Some(doc)) => {
                        if tx.send(doc).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(namespace = %ns, error = %e, "document source failed; stopping reader");
                        break;
                    }
                }
            }
            // `tx` drops here, disconnecting every worker's receiver clone.
        });

        let mut handles = Vec::with_capacity(policy.num_insertion_workers);
        for _ in 0..policy.num_insertion_workers {
            let worker_rx = rx.clone();
            let worker_terminate = Arc::clone(terminate);
            handles.push(scope.spawn(move || worker_loop(ns, worker_rx, sink, policy, &worker_terminate, counters)));
        }
        drop(rx);

        let mut first_err = None;
        for handle in handles {
            if let Err(e) = handle.join().expect("insertion worker panicked") {
                if first_err.is_none() {
                    first_err = Some(e);
                }
                terminate.store(true, Ordering::Relaxed);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    })
}

fn worker_loop(
    ns: &Namespace,
    rx: Receiver<Document>,
    sink: &(dyn BulkSink + '_),
    policy: &InsertionPolicy,
    terminate: &Arc<AtomicBool>,
    counters: &RunCounters,
) -> Result<(), PipelineError> {
    let mut buffer: Vec<Document> = Vec::with_capacity(policy.bulk_buffer_docs);
    let mut buffered_bytes = 0usize;

    loop {
        if terminate.load(Ordering::Relaxed) {
            flush(ns, &mut buffer, sink, policy, counters)?;
            return Err(PipelineError::Terminated);
        }
        match rx.recv() {
            Ok(doc) => {
                buffered_bytes += bson::to_vec(&doc).map(|v| v.len()).unwrap_or(0);
                buffer.push(doc);
                if buffer.len() >= policy.bulk_buffer_docs || buffered_bytes >= policy.bulk_buffer_bytes {
                    flush(ns, &mut buffer, sink, policy, counters)?;
                    buffered_bytes = 0;
                }
            }
            Err(_) => {
                flush(ns, &mut buffer, sink, policy, counters)?;
                return Ok(());
            }
        }
    }
}

fn flush(
    ns: &Namespace,
    buffer: &mut Vec<Document>,
    sink: &(dyn BulkSink + '_),
    policy: &InsertionPolicy,
    counters: &RunCounters,
) -> Result<(), PipelineError> {
    if buffer.is_empty() {
        return Ok(());
    }
    let batch_size = buffer.len() as u64;
    let result = sink.bulk_insert(ns, buffer, policy.bypass_document_validation);
    buffer.clear();
    match result {
        Ok(()) => {
            counters.add_successes(batch_size);
            Ok(())
        }
        Err(InsertError::DuplicateKey) => {
            if policy.stop_on_error || policy.maintain_insertion_order {
                Err(PipelineError::Insert(InsertError::DuplicateKey))
            } else {
                counters.add_failures(batch_size);
                Ok(())
            }
        }
        Err(InsertError::Validation(msg)) => {
            if policy.bypass_document_validation {
                Ok(())
            } else {
                Err(PipelineError::Insert(InsertError::Validation(msg)))
            }
        }
        Err(other @ InsertError::Other(_)) => Err(PipelineError::Insert(other)),
    }
}
