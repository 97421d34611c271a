use std::fmt;

#[derive(Debug)]
pub enum CatalogError {
    /// `collMod`/`deleteIndexes` selector matched no index.
    IndexNotFound { collection: String, selector: String },
    /// `collMod` selector had both `name` and `keyPattern`, or neither.
    AmbiguousSelector,
    MissingSelector,
    /// `collMod` supplied neither `expireAfterSeconds` nor `hidden`.
    EmptyModification,
    /// `expireAfterSeconds` present but not integral.
    NonIntegralExpireAfterSeconds,
    /// `hidden` present but not boolean.
    NonBooleanHidden,
    /// `deleteIndexes` spec was a type other than `"*"`, a name string, or
    /// an ordered key-pattern document.
    InvalidDeleteIndexesSpec(String),
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::IndexNotFound { collection, selector } => {
                write!(f, "no index matching {selector} on collection {collection}")
            }
            CatalogError::AmbiguousSelector => {
                write!(f, "collMod index selector must set exactly one of name or keyPattern")
            }
            CatalogError::MissingSelector => {
                write!(f, "collMod index selector is missing name and keyPattern")
            }
            CatalogError::EmptyModification => {
                write!(f, "collMod must set at least one of expireAfterSeconds or hidden")
            }
            CatalogError::NonIntegralExpireAfterSeconds => {
                write!(f, "expireAfterSeconds must be an integer")
            }
            CatalogError::NonBooleanHidden => write!(f, "hidden must be a boolean"),
            CatalogError::InvalidDeleteIndexesSpec(desc) => {
                write!(f, "invalid deleteIndexes spec: {desc}")
            }
        }
    }
}

impl std::error::Error for CatalogError {}
