use bson::{Bson, Document};
use restorekit_catalog::{CollModSpec, DeleteIndexesSpec, IndexDocument, IndexKey};

use crate::error::OplogError;

fn key_from_document(doc: &Document) -> IndexKey {
    doc.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}

/// Parse one index specification out of a `createIndexes` command's `o`
///: `key` becomes the ordered key, everything else (minus
/// the command name itself) becomes options.
pub fn parse_index_spec(command_name: &str, spec: &Document) -> Result<IndexDocument, OplogError> {
    let key_doc = spec
        .get_document("key")
        .map_err(|_| OplogError::MalformedRecord("index spec missing key".into()))?;
    let key = key_from_document(key_doc);

    let mut options = Document::new();
    for (k, v) in spec.iter() {
        if k == "key" || k == command_name || k == "ns" || k == "partialFilterExpression" {
            continue;
        }
        options.insert(k.clone(), v.clone());
    }

    let mut idx = IndexDocument::new(key, options);
    if let Ok(filter) = spec.get_document("partialFilterExpression") {
        idx = idx.with_partial_filter(filter.clone());
    }
    Ok(idx)
}

/// `createIndexes`'s `o` carries exactly one index spec inline with the
/// command name; `commitIndexBuild`'s `o.indexes` carries several.
pub fn parse_create_indexes(o: &Document) -> Result<IndexDocument, OplogError> {
    parse_index_spec("createIndexes", o)
}

pub fn parse_commit_index_build(o: &Document) -> Result<Vec<IndexDocument>, OplogError> {
    let indexes = o
        .get_array("indexes")
        .map_err(|_| OplogError::MalformedRecord("commitIndexBuild missing indexes".into()))?;
    indexes
        .iter()
        .map(|v| {
            v.as_document()
                .ok_or_else(|| OplogError::MalformedRecord("commitIndexBuild index entry is not a document".into()))
                .and_then(|d| parse_index_spec("commitIndexBuild", d))
        })
        .collect()
}

pub fn parse_delete_indexes_spec(o: &Document) -> Result<DeleteIndexesSpec, OplogError> {
    for key in ["index", "deleteIndexes", "dropIndexes"] {
        if let Some(value) = o.get(key) {
            return DeleteIndexesSpec::from_bson(value).map_err(OplogError::from);
        }
    }
    Err(OplogError::MalformedRecord("dropIndexes/deleteIndexes command missing index spec".into()))
}

/// Extract the `index` clause of a `collMod` command; `None`
/// means the command carried no index modification (e.g. a plain
/// `validator` change), which the caller should then skip dispatching for
/// the catalog but may still forward to the server.
pub fn parse_coll_mod_index(o: &Document) -> Option<CollModSpec> {
    let index = o.get_document("index").ok()?;
    let name = index.get_str("name").ok().map(String::from);
    let key_pattern = index.get_document("keyPattern").ok().map(|d| key_from_document(d));
    let expire_after_seconds = index.get("expireAfterSeconds").cloned();
    let hidden = index.get_bool("hidden").ok();
    Some(CollModSpec { name, key_pattern, expire_after_seconds, hidden })
}

/// Strip a `collMod` command's index clause and the deprecated
/// `noPadding`/`usePowerOf2Sizes` fields; returns `None` when nothing is
/// left to dispatch to the server.
pub fn strip_coll_mod_for_dispatch(o: &Document, strip_legacy_options: bool) -> Option<Document> {
    let mut remaining = Document::new();
    for (k, v) in o.iter() {
        if k == "index" {
            continue;
        }
        if strip_legacy_options && (k == "noPadding" || k == "usePowerOf2Sizes") {
            continue;
        }
        remaining.insert(k.clone(), v.clone());
    }
    // `collMod` itself (the collection-name value) always survives; only an
    // empty command (collMod key plus nothing else) means "nothing to do".
    if remaining.len() <= 1 {
        None
    } else {
        Some(remaining)
    }
}

/// `create`'s `collation.locale` determines the catalog's simple-collation
/// flag: absent or `"simple"` is simple.
pub fn create_is_simple_collation(o: &Document) -> bool {
    match o.get_document("collation").and_then(|c| c.get_str("locale")) {
        Ok(locale) => locale == "simple",
        Err(_) => true,
    }
}

/// Strip the `ui` field from a command or CRUD `o`/`o2` document in place.
pub fn strip_ui(doc: &mut Document) {
    doc.remove("ui");
}

/// Convert a `createIndexes` oplog command into the legacy `system.indexes`
/// insert form required when `ui` must be stripped on a server version that
/// still demands it. `ns` is the full `<db>.<coll>` the
/// index lives on.
pub fn legacy_system_indexes_insert(ns: &str, spec: &IndexDocument) -> Document {
    let mut doc = Document::new();
    doc.insert("ns", ns);
    doc.insert("key", Bson::Document(spec.key.iter().cloned().collect()));
    if let Some(name) = spec.name() {
        doc.insert("name", name);
    }
    doc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_create_indexes_splits_key_from_options() {
        let o = bson::doc! {
            "createIndexes": "orders",
            "v": 2,
            "key": { "customerId": 1 },
            "name": "customerId_1",
        };
        let idx = parse_create_indexes(&o).unwrap();
        assert_eq!(idx.key, vec![("customerId".to_string(), Bson::Int32(1))]);
        assert_eq!(idx.name(), Some("customerId_1"));
        assert!(!idx.options.contains_key("key"));
        assert!(!idx.options.contains_key("createIndexes"));
    }

    #[test]
    fn parse_commit_index_build_splits_multiple_indexes() {
        let o = bson::doc! {
            "commitIndexBuild": "orders",
            "indexBuildUUID": bson::Binary { subtype: bson::spec::BinarySubtype::Uuid, bytes: vec![0; 16] },
            "indexes": [
                { "key": { "a": 1 }, "name": "a_1" },
                { "key": { "b": -1 }, "name": "b_-1" },
            ],
        };
        let indexes = parse_commit_index_build(&o).unwrap();
        assert_eq!(indexes.len(), 2);
        assert_eq!(indexes[0].name(), Some("a_1"));
        assert_eq!(indexes[1].name(), Some("b_-1"));
    }

    #[test]
    fn coll_mod_index_clause_extracted() {
        let o = bson::doc! {
            "collMod": "orders",
            "index": { "name": "t_1", "expireAfterSeconds": 3600, "hidden": true },
        };
        let spec = parse_coll_mod_index(&o).unwrap();
        assert_eq!(spec.name.as_deref(), Some("t_1"));
        assert_eq!(spec.hidden, Some(true));
    }

    #[test]
    fn coll_mod_dispatch_is_none_when_only_index_clause_present() {
        let o = bson::doc! {
            "collMod": "orders",
            "index": { "name": "t_1", "hidden": true },
        };
        assert!(strip_coll_mod_for_dispatch(&o, true).is_none());
    }

    #[test]
    fn coll_mod_dispatch_strips_legacy_options_on_new_servers() {
        let o = bson::doc! {
            "collMod": "orders",
            "noPadding": true,
            "validator": { "a": 1 },
        };
        let remaining = strip_coll_mod_for_dispatch(&o, true).unwrap();
        assert!(!remaining.contains_key("noPadding"));
        assert!(remaining.contains_key("validator"));
    }

    #[test]
    fn create_collation_defaults_to_simple() {
        let o = bson::doc! { "create": "orders" };
        assert!(create_is_simple_collation(&o));

        let non_simple = bson::doc! { "create": "orders", "collation": { "locale": "en" } };
        assert!(!create_is_simple_collation(&non_simple));
    }
}
