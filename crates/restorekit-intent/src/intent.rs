use bson::{Bson, Document};
use restorekit_catalog::Namespace;

use crate::stream_handle::StreamHandle;

/// Which restorable unit this intent represents. `Timeseries` only exists
/// after the logical-collection/bucket-collection merge step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentKind {
    Data,
    Oplog,
    Users,
    Roles,
    AuthVersion,
    Timeseries,
}

/// One restorable unit: a collection (data + optional sidecar), or one of
/// the singletons (oplog, users, roles, authVersion).
#[derive(Debug, Clone)]
pub struct Intent {
    /// The namespace AFTER renaming — this is the destination, and the
    /// identity `put`/conflict-detection operate on.
    pub namespace: Namespace,
    /// The namespace as it appeared in the dump, before renaming. Equal to
    /// `namespace` unless a rename rule applied.
    pub source_namespace: Namespace,
    pub kind: IntentKind,
    pub data_stream: Option<StreamHandle>,
    pub metadata_stream: Option<StreamHandle>,
    pub byte_size: u64,
    pub collection_options: Document,
    pub uuid: Option<[u8; 16]>,
}

impl Intent {
    pub fn new_data(namespace: Namespace) -> Self {
        Self {
            source_namespace: namespace.clone(),
            namespace,
            kind: IntentKind::Data,
            data_stream: None,
            metadata_stream: None,
            byte_size: 0,
            collection_options: Document::new(),
            uuid: None,
        }
    }

    pub fn singleton(kind: IntentKind, namespace: Namespace) -> Self {
        debug_assert!(!matches!(kind, IntentKind::Data | IntentKind::Timeseries));
        Self {
            source_namespace: namespace.clone(),
            namespace,
            kind,
            data_stream: None,
            metadata_stream: None,
            byte_size: 0,
            collection_options: Document::new(),
            uuid: None,
        }
    }

    pub fn has_data(&self) -> bool {
        self.data_stream.is_some()
    }

    pub fn is_metadata_only(&self) -> bool {
        self.data_stream.is_none() && self.metadata_stream.is_some()
    }

    pub fn uuid_bson(&self) -> Option<Bson> {
        self.uuid
            .map(|bytes| Bson::Binary(bson::Binary { subtype: bson::spec::BinarySubtype::Uuid, bytes: bytes.to_vec() }))
    }

    /// Merge `other` into `self` when both target the same destination
    /// namespace and one carries the complementary stream the other lacks.
    /// Panics if namespaces differ — callers are expected to have checked
    /// that already.
    pub fn merge_complementary(mut self, other: Intent) -> Self {
        assert_eq!(self.namespace, other.namespace);
        if self.data_stream.is_none() {
            self.data_stream = other.data_stream;
        }
        if self.metadata_stream.is_none() {
            self.metadata_stream = other.metadata_stream;
        }
        if self.byte_size == 0 {
            self.byte_size = other.byte_size;
        }
        if self.collection_options.is_empty() {
            self.collection_options = other.collection_options;
        }
        if self.uuid.is_none() {
            self.uuid = other.uuid;
        }
        self
    }

    /// Merge a time-series logical-collection intent with its backing
    /// `system.buckets.<name>` intent into one `Timeseries` intent whose
    /// data stream is the bucket stream.
    pub fn merge_timeseries(logical: Intent, bucket: Intent) -> Intent {
        Intent {
            namespace: logical.namespace,
            source_namespace: logical.source_namespace,
            kind: IntentKind::Timeseries,
            data_stream: bucket.data_stream,
            metadata_stream: bucket.metadata_stream.or(logical.metadata_stream),
            byte_size: bucket.byte_size.max(logical.byte_size),
            collection_options: if bucket.collection_options.is_empty() {
                logical.collection_options
            } else {
                bucket.collection_options
            },
            uuid: bucket.uuid.or(logical.uuid),
        }
    }
}
