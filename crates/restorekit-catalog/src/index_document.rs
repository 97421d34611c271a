use bson::{Bson, Document};

/// One `(fieldName, value)` pair inside an index `key`. Order matters —
/// unlike `options`, this is never treated as a map.
pub type IndexKey = Vec<(String, Bson)>;

/// An index specification, as read from a dump's metadata sidecar or
/// replayed from an oplog `createIndexes`/`commitIndexBuild` command.
///
/// `key` is an ordered sequence; `options` is an unordered mapping. The two
/// are kept as separate fields rather than flattened into one document so
/// that serialization never has to guess which half of a merged document
/// is ordered.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDocument {
    pub key: IndexKey,
    pub options: Document,
    pub partial_filter_expression: Option<Document>,
}

impl IndexDocument {
    pub fn new(key: IndexKey, options: Document) -> Self {
        Self {
            key,
            options,
            partial_filter_expression: None,
        }
    }

    /// `options.name` is mandatory; malformed index documents (no name)
    /// should never make it into the catalog — callers construct these from
    /// parsed sidecars/oplog commands, which must supply one explicitly or
    /// have an earlier parsing stage synthesize it.
    pub fn name(&self) -> Option<&str> {
        self.options.get_str("name").ok()
    }

    pub fn with_partial_filter(mut self, filter: Document) -> Self {
        self.partial_filter_expression = Some(filter);
        self
    }

    /// The identity index every collection has: `{ key: {_id: 1}, name: "_id_" }`.
    pub fn identity() -> Self {
        let mut options = Document::new();
        options.insert("name", "_id_");
        IndexDocument::new(vec![("_id".to_string(), Bson::Int32(1))], options)
    }

    /// True when every key element requiring a version option (`text`,
    /// `2dsphere`) carries one.
    pub fn is_consistent(&self) -> bool {
        self.consistency_errors().is_empty()
    }

    /// The version options missing from `self.key`, if any. Empty means
    /// consistent.
    pub fn consistency_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        for (field, value) in &self.key {
            if let Bson::String(tag) = value {
                match tag.as_str() {
                    "text" if !self.options.contains_key("textIndexVersion") => {
                        errors.push(format!(
                            "index key field {field:?} is \"text\" but options is missing textIndexVersion"
                        ));
                    }
                    "2dsphere" if !self.options.contains_key("2dsphereIndexVersion") => {
                        errors.push(format!(
                            "index key field {field:?} is \"2dsphere\" but options is missing 2dsphereIndexVersion"
                        ));
                    }
                    _ => {}
                }
            }
        }
        errors
    }
}

/// Normalize a legacy `_id` index direction value to a numeric comparison
/// target. Handles the empty string and stringified floats that older
/// servers wrote; returns `None` for anything that isn't a number after
/// normalization (including the `"hashed"`/`"2dsphere"` tag strings, which
/// must never classify as the default index).
fn normalized_direction(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(i) => Some(*i as f64),
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(d) => Some(*d),
        Bson::String(s) if s.is_empty() => Some(1.0),
        Bson::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}

/// Classify an index as "the default identity index": single `_id` key
/// element, no partial filter, and a normalized direction of exactly 1.
pub fn is_default_identity_index(idx: &IndexDocument) -> bool {
    if idx.partial_filter_expression.is_some() {
        return false;
    }
    match idx.key.as_slice() {
        [(field, value)] if field == "_id" => {
            normalized_direction(value).is_some_and(|d| d == 1.0)
        }
        _ => false,
    }
}
