use std::collections::HashMap;
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use crossbeam::channel::{self, Receiver, Sender};
use restorekit_catalog::Namespace;

use crate::error::ArchiveError;
use crate::frame::{self, TAG_DOCUMENT, TAG_END_OF_ARCHIVE, TAG_END_OF_NAMESPACE};
use crate::prelude::{self, ArchivePrelude, NamespaceMetadataEntry};

/// How many document bytes a per-namespace channel buffers before the
/// demultiplexer thread blocks. Mirrors the bulk-insert channel depth so
/// the demux never races far ahead of the slowest worker.
const CHANNEL_CAPACITY: usize = 64;

/// Collections whose contents are consumed out of archive order (auth data,
/// legacy index lists) and therefore must be buffered in memory rather than
/// streamed through a bounded channel.
pub fn is_special(ns: &Namespace) -> bool {
    (ns.db == "admin" && matches!(ns.coll.as_str(), "system.users" | "system.roles" | "system.version"))
        || ns.coll == "system.indexes"
}

enum NsEvent {
    Document(Vec<u8>),
    End,
}

struct StreamSlot {
    receiver: Mutex<Option<Receiver<NsEvent>>>,
    closed: Arc<AtomicBool>,
}

#[derive(Default)]
struct CacheState {
    docs: HashMap<u32, Vec<Vec<u8>>>,
    completed: std::collections::HashSet<u32>,
}

/// A handle onto one namespace's document stream, handed out by
/// [`ArchiveDemux::reader_for`].
pub struct NamespaceReader {
    namespace: Namespace,
    receiver: Receiver<NsEvent>,
    closed: Arc<AtomicBool>,
    ended: bool,
}

impl NamespaceReader {
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Returns the next document's raw bytes, or `None` once the
    /// end-of-namespace marker has been seen.
    pub fn next_document(&mut self) -> Result<Option<Vec<u8>>, ArchiveError> {
        if self.ended {
            return Ok(None);
        }
        match self.receiver.recv() {
            Ok(NsEvent::Document(bytes)) => Ok(Some(bytes)),
            Ok(NsEvent::End) => {
                self.ended = true;
                Ok(None)
            }
            Err(_) => Err(ArchiveError::ShortArchive),
        }
    }

    /// Signals that this reader will not be drained further — the
    /// demultiplexer thread discards remaining frames for this namespace
    /// instead of blocking on a full channel.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
    }
}

impl Drop for NamespaceReader {
    fn drop(&mut self) {
        self.close();
    }
}

/// Splits a single archive stream into one document stream per namespace,
/// running the read loop on a dedicated thread behind a shutdown flag.
pub struct ArchiveDemux {
    prelude: ArchivePrelude,
    entries: Vec<NamespaceMetadataEntry>,
    index_of: HashMap<Namespace, u32>,
    streams: Vec<Option<StreamSlot>>,
    cache: Arc<(Mutex<CacheState>, Condvar)>,
    announce_rx: Receiver<Namespace>,
    error_rx: Receiver<ArchiveError>,
    finished: Arc<AtomicBool>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl ArchiveDemux {
    /// Parses the magic bytes, prelude, and namespace metadata list
    /// synchronously, then spawns the body-frame demultiplexer thread.
    pub fn open<R>(mut reader: R) -> Result<Self, ArchiveError>
    where
        R: Read + Send + 'static,
    {
        let (prelude, entries) = prelude::read_header(&mut reader)?;

        let mut index_of = HashMap::with_capacity(entries.len());
        let mut streams = Vec::with_capacity(entries.len());
        // The thread gets the only `Sender` for each namespace, so the
        // channel disconnects (and pending `recv`s wake with an error) the
        // moment the thread exits, clean or not.
        let mut thread_senders: Vec<Option<(Sender<NsEvent>, Arc<AtomicBool>)>> = Vec::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            index_of.insert(entry.namespace.clone(), i as u32);
            if is_special(&entry.namespace) {
                streams.push(None);
                thread_senders.push(None);
            } else {
                let (sender, receiver) = channel::bounded(CHANNEL_CAPACITY);
                let closed = Arc::new(AtomicBool::new(false));
                streams.push(Some(StreamSlot {
                    receiver: Mutex::new(Some(receiver)),
                    closed: Arc::clone(&closed),
                }));
                thread_senders.push(Some((sender, closed)));
            }
        }

        let (announce_tx, announce_rx) = channel::unbounded();
        let (error_tx, error_rx) = channel::unbounded();
        let cache: Arc<(Mutex<CacheState>, Condvar)> =
            Arc::new((Mutex::new(CacheState::default()), Condvar::new()));
        let finished = Arc::new(AtomicBool::new(false));

        let thread_entries = entries.clone();
        let thread_cache = Arc::clone(&cache);
        let thread_finished = Arc::clone(&finished);

        let handle = thread::spawn(move || {
            run_demux_loop(
                reader,
                &thread_entries,
                thread_senders,
                thread_cache,
                announce_tx,
                error_tx,
                thread_finished,
            );
        });

        Ok(ArchiveDemux {
            prelude,
            entries,
            index_of,
            streams,
            cache,
            announce_rx,
            error_rx,
            finished,
            handle: Mutex::new(Some(handle)),
        })
    }

    pub fn prelude(&self) -> &ArchivePrelude {
        &self.prelude
    }

    pub fn namespace_metadata(&self) -> &[NamespaceMetadataEntry] {
        &self.entries
    }

    /// Announces namespaces in the order their first frame appears in the
    /// body. Also doubles as the ordering hint for `restorekit-pipeline`'s
    /// worker scheduler when the source is an archive.
    pub fn announcements(&self) -> Receiver<Namespace> {
        self.announce_rx.clone()
    }

    /// Blocks on `announcements()` until a non-special namespace appears,
    /// then returns control to the caller — the demultiplexer continues
    /// running on its own thread from this point on, driven by whichever
    /// readers the restore pipeline opens. Returns `None` when the archive
    /// closed without ever announcing one (an auth/oplog-only archive).
    pub fn first_namespace(&self) -> Result<Option<Namespace>, ArchiveError> {
        loop {
            match self.announce_rx.recv() {
                Ok(ns) if !is_special(&ns) => return Ok(Some(ns)),
                Ok(_special) => continue,
                Err(_) => {
                    return match self.error_rx.try_recv() {
                        Ok(e) => Err(e),
                        Err(_) => Ok(None),
                    };
                }
            }
        }
    }

    pub fn errors(&self) -> Receiver<ArchiveError> {
        self.error_rx.clone()
    }

    /// Opens the streaming reader for a non-special namespace. May only be
    /// called once per namespace.
    pub fn reader_for(&self, ns: &Namespace) -> Result<NamespaceReader, ArchiveError> {
        let idx = *self
            .index_of
            .get(ns)
            .ok_or_else(|| ArchiveError::UnknownNamespaceIndex(u32::MAX))?;
        let slot = self.streams[idx as usize]
            .as_ref()
            .ok_or_else(|| ArchiveError::NotAStream(ns.to_string()))?;
        let mut guard = slot.receiver.lock().expect("stream receiver mutex poisoned");
        let receiver = guard.take().ok_or_else(|| ArchiveError::AlreadyOpened(ns.to_string()))?;
        Ok(NamespaceReader {
            namespace: ns.clone(),
            receiver,
            closed: Arc::clone(&slot.closed),
            ended: false,
        })
    }

    /// Blocks until every document for a cached (special) namespace has
    /// arrived, then returns them all at once.
    pub fn cached_documents(&self, ns: &Namespace) -> Result<Vec<Vec<u8>>, ArchiveError> {
        let idx = *self
            .index_of
            .get(ns)
            .ok_or_else(|| ArchiveError::UnknownNamespaceIndex(u32::MAX))?;
        let (lock, cvar) = &*self.cache;
        let mut state = lock.lock().expect("archive cache mutex poisoned");
        loop {
            if state.completed.contains(&idx) {
                return Ok(state.docs.remove(&idx).unwrap_or_default());
            }
            if self.finished.load(Ordering::Relaxed) {
                return Ok(state.docs.remove(&idx).unwrap_or_default());
            }
            state = cvar.wait(state).expect("archive cache mutex poisoned");
        }
    }

    /// Blocks until the demultiplexer thread exits, propagating its last
    /// error (if any).
    pub fn join(&self) -> Result<(), ArchiveError> {
        if let Some(handle) = self.handle.lock().expect("demux join mutex poisoned").take() {
            let _ = handle.join();
        }
        self.error_rx.try_recv().map(Err).unwrap_or(Ok(()))
    }
}

#[allow(clippy::too_many_arguments)]
fn run_demux_loop<R: Read>(
    mut reader: R,
    entries: &[NamespaceMetadataEntry],
    senders: Vec<Option<(Sender<NsEvent>, Arc<AtomicBool>)>>,
    cache: Arc<(Mutex<CacheState>, Condvar)>,
    announce_tx: Sender<Namespace>,
    error_tx: Sender<ArchiveError>,
    finished: Arc<AtomicBool>,
) {
    let mut announced = vec![false; entries.len()];
    let result = (|| -> Result<(), ArchiveError> {
        loop {
            let frame = frame::read_frame(&mut reader)?;
            if frame.tag == TAG_END_OF_ARCHIVE {
                return Ok(());
            }

            let idx = frame.ns_index as usize;
            let ns = entries
                .get(idx)
                .map(|e| e.namespace.clone())
                .ok_or(ArchiveError::UnknownNamespaceIndex(frame.ns_index))?;

            if !announced[idx] {
                announced[idx] = true;
                let _ = announce_tx.send(ns.clone());
            }

            match frame.tag {
                TAG_DOCUMENT => {
                    if let Some((sender, closed)) = &senders[idx] {
                        if !closed.load(Ordering::Relaxed) {
                            let _ = sender.send(NsEvent::Document(frame.body));
                        }
                    } else {
                        let (lock, cvar) = &*cache;
                        let mut state = lock.lock().expect("archive cache mutex poisoned");
                        state.docs.entry(frame.ns_index).or_default().push(frame.body);
                        cvar.notify_all();
                    }
                }
                TAG_END_OF_NAMESPACE => {
                    if let Some((sender, _)) = &senders[idx] {
                        let _ = sender.send(NsEvent::End);
                    } else {
                        let (lock, cvar) = &*cache;
                        let mut state = lock.lock().expect("archive cache mutex poisoned");
                        state.completed.insert(frame.ns_index);
                        cvar.notify_all();
                    }
                }
                other => return Err(ArchiveError::InvalidNamespaceMetadata(format!("unknown frame tag {other:#x}"))),
            }
        }
    })();

    // On a clean end-of-archive every still-open stream gets an explicit
    // End so `NamespaceReader::next_document` returns `Ok(None)`. On error
    // the senders are simply dropped below, so pending readers observe a
    // disconnected channel and surface `ArchiveError::ShortArchive`.
    if result.is_ok() {
        for slot in senders.iter().flatten() {
            let _ = slot.0.send(NsEvent::End);
        }
    }
    {
        let (lock, cvar) = &*cache;
        let mut state = lock.lock().expect("archive cache mutex poisoned");
        if result.is_ok() {
            for i in 0..entries.len() {
                state.completed.insert(i as u32);
            }
        }
        cvar.notify_all();
    }
    finished.store(true, Ordering::Relaxed);
    if let Err(e) = result {
        let _ = error_tx.send(e);
    }
}
