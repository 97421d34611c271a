use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Mutex;

use bson::Document;
use restorekit_catalog::{IndexDocument, Namespace};
use restorekit_core::{RestoreError, ServerSession};
use restorekit_oplog::ServerVersion;
use restorekit_pipeline::InsertError;

/// A standalone in-process server, standing in for the real database client
/// `ServerSession` abstracts over.
/// Collections are plain `Vec<Document>` keyed by namespace behind one
/// mutex each, matching the mutex-per-resource style the pipeline's own
/// worker tests already use rather than a lock-free structure — this binary
/// has no concurrent-reader workload to justify more.
pub struct MemorySession {
    version: ServerVersion,
    collections: Mutex<HashMap<Namespace, Vec<Document>>>,
    ids_seen: Mutex<HashMap<Namespace, HashSet<Vec<u8>>>>,
    indexes: Mutex<HashMap<Namespace, Vec<IndexDocument>>>,
    users: Mutex<Vec<Document>>,
    roles: Mutex<Vec<Document>>,
    auth_version: Mutex<Option<i32>>,
}

impl MemorySession {
    pub fn new(version: ServerVersion) -> Self {
        Self {
            version,
            collections: Mutex::new(HashMap::new()),
            ids_seen: Mutex::new(HashMap::new()),
            indexes: Mutex::new(HashMap::new()),
            users: Mutex::new(Vec::new()),
            roles: Mutex::new(Vec::new()),
            auth_version: Mutex::new(None),
        }
    }

    pub fn collection(&self, ns: &Namespace) -> Vec<Document> {
        self.collections.lock().unwrap().get(ns).cloned().unwrap_or_default()
    }

    pub fn index_count(&self, ns: &Namespace) -> usize {
        self.indexes.lock().unwrap().get(ns).map(Vec::len).unwrap_or(0)
    }
}

fn doc_id(doc: &Document) -> Option<Vec<u8>> {
    doc.get("_id").map(|id| bson::to_vec(id).unwrap_or_default())
}

impl ServerSession for MemorySession {
    fn server_version(&self) -> ServerVersion {
        self.version
    }

    fn drop_collection(&self, ns: &Namespace) -> Result<(), RestoreError> {
        self.collections.lock().unwrap().remove(ns);
        self.ids_seen.lock().unwrap().remove(ns);
        self.indexes.lock().unwrap().remove(ns);
        Ok(())
    }

    fn create_collection(&self, ns: &Namespace, _options: &Document, _uuid: Option<[u8; 16]>) -> Result<(), RestoreError> {
        self.collections.lock().unwrap().entry(ns.clone()).or_default();
        self.ids_seen.lock().unwrap().entry(ns.clone()).or_default();
        Ok(())
    }

    fn bulk_insert(&self, ns: &Namespace, docs: &[Document], _bypass_validation: bool) -> Result<(), InsertError> {
        let mut collections = self.collections.lock().unwrap();
        let mut ids_seen = self.ids_seen.lock().unwrap();
        let coll = collections.entry(ns.clone()).or_default();
        let seen = ids_seen.entry(ns.clone()).or_default();
        for doc in docs {
            if let Some(id) = doc_id(doc) {
                if !seen.insert(id) {
                    return Err(InsertError::DuplicateKey);
                }
            }
            coll.push(doc.clone());
        }
        Ok(())
    }

    fn oplog_insert(&self, ns: &Namespace, doc: &Document) -> Result<(), RestoreError> {
        let mut collections = self.collections.lock().unwrap();
        let mut ids_seen = self.ids_seen.lock().unwrap();
        let coll = collections.entry(ns.clone()).or_default();
        let seen = ids_seen.entry(ns.clone()).or_default();
        if let Some(id) = doc_id(doc) {
            seen.insert(id);
        }
        coll.push(doc.clone());
        Ok(())
    }

    fn oplog_update(&self, ns: &Namespace, query: &Document, update: &Document) -> Result<(), RestoreError> {
        let mut collections = self.collections.lock().unwrap();
        let coll = collections.entry(ns.clone()).or_default();
        if let Some(query_id) = query.get("_id") {
            if let Some(existing) = coll.iter_mut().find(|d| d.get("_id") == Some(query_id)) {
                *existing = update.clone();
            }
        }
        Ok(())
    }

    fn oplog_delete(&self, ns: &Namespace, query: &Document) -> Result<(), RestoreError> {
        let mut collections = self.collections.lock().unwrap();
        if let Some(coll) = collections.get_mut(ns) {
            if let Some(query_id) = query.get("_id") {
                coll.retain(|d| d.get("_id") != Some(query_id));
            }
        }
        Ok(())
    }

    fn run_command(&self, _db: &str, _command: &Document) -> Result<(), RestoreError> {
        Ok(())
    }

    fn build_index(&self, ns: &Namespace, idx: &IndexDocument) -> Result<(), RestoreError> {
        self.indexes.lock().unwrap().entry(ns.clone()).or_default().push(idx.clone());
        Ok(())
    }

    fn restore_users_and_roles(&self, users: &[Document], roles: &[Document], auth_version: Option<i32>) -> Result<(), RestoreError> {
        self.users.lock().unwrap().extend_from_slice(users);
        self.roles.lock().unwrap().extend_from_slice(roles);
        if let Some(v) = auth_version {
            *self.auth_version.lock().unwrap() = Some(v);
        }
        Ok(())
    }
}
