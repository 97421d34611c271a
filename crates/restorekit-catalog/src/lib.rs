mod catalog;
mod error;
mod index_document;
mod metadata;
mod namespace;

pub use catalog::{CollModSpec, CollectionIndexCatalog, DeleteIndexesSpec, IndexCatalog, NamespaceQueue};
pub use error::CatalogError;
pub use index_document::{is_default_identity_index, IndexDocument, IndexKey};
pub use metadata::CollectionMetadata;
pub use namespace::{Namespace, ParseNamespaceError};
