use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use bson::Document;
use restorekit_catalog::Namespace;
use restorekit_intent::{Intent, IntentManager, StreamHandle};
use restorekit_pipeline::{
    run_all, BulkSink, DocumentStream, InsertError, InsertionPolicy, PipelineError, RunCounters, StreamOpener,
};

struct CountingStream {
    remaining: usize,
}

impl DocumentStream for CountingStream {
    fn next_document(&mut self) -> Result<Option<Document>, PipelineError> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        Ok(Some(bson::doc! { "_id": self.remaining as i64 }))
    }
}

struct CountingOpener {
    docs_per_namespace: usize,
}

impl StreamOpener for CountingOpener {
    fn open(&self, _ns: &Namespace) -> Result<Box<dyn DocumentStream + '_>, PipelineError> {
        Ok(Box::new(CountingStream { remaining: self.docs_per_namespace }))
    }
}

#[derive(Default)]
struct CountingSink {
    inserted: Mutex<usize>,
}

impl BulkSink for CountingSink {
    fn bulk_insert(&self, _ns: &Namespace, docs: &[Document], _bypass: bool) -> Result<(), InsertError> {
        *self.inserted.lock().unwrap() += docs.len();
        Ok(())
    }
}

fn intent_for(ns: &str) -> Intent {
    let (db, coll) = ns.split_once('.').unwrap();
    let mut intent = Intent::new_data(Namespace::new(db, coll));
    intent.data_stream = Some(StreamHandle::new());
    intent
}

#[test]
fn every_intent_is_fully_drained_across_workers() {
    let manager = IntentManager::new();
    manager.put(intent_for("shop.orders"));
    manager.put(intent_for("shop.customers"));
    manager.put(intent_for("shop.products"));

    let opener = CountingOpener { docs_per_namespace: 50 };
    let sink = CountingSink::default();
    let policy = InsertionPolicy::new(2, 2, false, false, false);
    let terminate = Arc::new(AtomicBool::new(false));
    let counters = RunCounters::new();

    run_all(&manager, &opener, &sink, &policy, None, &terminate, &counters).unwrap();

    assert_eq!(*sink.inserted.lock().unwrap(), 150);
    assert!(manager.is_empty());
    assert_eq!(counters.snapshot(), (150, 0));
}

/// Exercises a 20,001-document stream to confirm the bulk buffer flushes
/// on both the count limit and the final partial batch.
#[test]
fn a_stream_longer_than_one_batch_flushes_every_document() {
    let manager = IntentManager::new();
    manager.put(intent_for("shop.events"));

    let opener = CountingOpener { docs_per_namespace: 20_001 };
    let sink = CountingSink::default();
    let policy = InsertionPolicy::new(1, 1, false, false, false);
    let terminate = Arc::new(AtomicBool::new(false));
    let counters = RunCounters::new();

    run_all(&manager, &opener, &sink, &policy, None, &terminate, &counters).unwrap();

    assert_eq!(*sink.inserted.lock().unwrap(), 20_001);
    assert_eq!(counters.snapshot(), (20_001, 0));
}

#[test]
fn fatal_insert_error_sets_the_terminate_flag_for_other_workers() {
    struct FailingSink;
    impl BulkSink for FailingSink {
        fn bulk_insert(&self, _ns: &Namespace, _docs: &[Document], _bypass: bool) -> Result<(), InsertError> {
            Err(InsertError::Other("server unreachable".into()))
        }
    }

    let manager = IntentManager::new();
    manager.put(intent_for("shop.orders"));
    manager.put(intent_for("shop.customers"));

    let opener = CountingOpener { docs_per_namespace: 10 };
    let sink = FailingSink;
    let policy = InsertionPolicy::new(1, 2, false, false, false);
    let terminate = Arc::new(AtomicBool::new(false));
    let counters = RunCounters::new();

    let result = run_all(&manager, &opener, &sink, &policy, None, &terminate, &counters);
    assert!(result.is_err());
    assert!(terminate.load(std::sync::atomic::Ordering::Relaxed));
}
