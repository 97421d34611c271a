use bson::Document;

use crate::index_document::IndexDocument;

/// The parsed contents of one collection's metadata sidecar (a directory
/// dump's `<coll>.metadata.json`, or an archive's `NamespaceMetadata`
/// prelude block). Shared between `restorekit-archive` and
/// `restorekit-planner` so both feed the same shape into
/// [`crate::IndexCatalog`] seeding.
#[derive(Debug, Clone, Default)]
pub struct CollectionMetadata {
    pub options: Document,
    pub indexes: Vec<IndexDocument>,
    pub uuid: Option<[u8; 16]>,
    /// Resolves a truncated-stem filename back to the real
    /// collection name.
    pub collection_name_override: Option<String>,
}

impl CollectionMetadata {
    /// `false` means the collection's default collation is not the
    /// server's simple/byte-wise collation.
    pub fn has_simple_collation(&self) -> bool {
        match self.options.get_document("collation") {
            Ok(collation) => collation.get_str("locale").unwrap_or("simple") == "simple",
            Err(_) => true,
        }
    }
}
