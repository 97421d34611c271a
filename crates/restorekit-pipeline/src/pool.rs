use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam::channel::Receiver;
use restorekit_catalog::Namespace;
use restorekit_intent::IntentManager;

use crate::collab::{BulkSink, DocumentStream};
use crate::counters::RunCounters;
use crate::error::PipelineError;
use crate::policy::InsertionPolicy;
use crate::worker::run_intent;

/// Resolves an intent's data stream into something the pipeline can read
/// from. `restorekit-core` supplies the real implementation (opening the
/// file behind a `StreamSource::File`, or calling `ArchiveDemux::reader_for`
/// behind a `StreamSource::Archive`); this crate never does I/O of its own.
pub trait StreamOpener: Send + Sync {
    fn open(&self, ns: &Namespace) -> Result<Box<dyn DocumentStream + '_>, PipelineError>;
}

/// Runs every queued data intent to completion with `policy.num_parallel_collections`
/// worker threads. When `priority` is
/// given (archive sources), an idle worker drains it first so intents are
/// visited in the order the demux announced their namespaces; otherwise
/// workers just pop the next queued intent.
pub fn run_all(
    manager: &IntentManager,
    opener: &(dyn StreamOpener + '_),
    sink: &(dyn BulkSink + '_),
    policy: &InsertionPolicy,
    priority: Option<&Receiver<Namespace>>,
    terminate: &Arc<AtomicBool>,
    counters: &RunCounters,
) -> Result<(), PipelineError> {
    thread::scope(|scope| {
        let mut handles = Vec::with_capacity(policy.num_parallel_collections);
        for _ in 0..policy.num_parallel_collections {
            handles.push(scope.spawn(|| collection_worker(manager, opener, sink, policy, priority, terminate, counters)));
        }

        let mut first_err = None;
        for handle in handles {
            if let Err(e) = handle.join().expect("collection worker panicked") {
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    })
}

fn collection_worker(
    manager: &IntentManager,
    opener: &(dyn StreamOpener + '_),
    sink: &(dyn BulkSink + '_),
    policy: &InsertionPolicy,
    priority: Option<&Receiver<Namespace>>,
    terminate: &Arc<AtomicBool>,
    counters: &RunCounters,
) -> Result<(), PipelineError> {
    loop {
        if terminate.load(Ordering::Relaxed) {
            return Err(PipelineError::Terminated);
        }

        let intent = next_intent(manager, priority);
        let Some(intent) = intent else {
            return Ok(());
        };
        if !intent.has_data() {
            continue;
        }

        let stream = opener.open(&intent.namespace)?;
        if let Err(e) = run_intent(&intent.namespace, stream, sink, policy, terminate, counters) {
            terminate.store(true, Ordering::Relaxed);
            return Err(e);
        }
    }
}

fn next_intent(
    manager: &IntentManager,
    priority: Option<&Receiver<Namespace>>,
) -> Option<restorekit_intent::Intent> {
    if let Some(priority) = priority {
        while let Ok(ns) = priority.try_recv() {
            if let Some(intent) = manager.pop_namespace(&ns) {
                return Some(intent);
            }
        }
    }
    manager.pop()
}
