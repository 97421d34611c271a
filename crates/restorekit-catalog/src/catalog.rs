use std::collections::HashMap;
use std::sync::Mutex;

use bson::{Bson, Document};

use crate::error::CatalogError;
use crate::index_document::{IndexDocument, IndexKey};
use crate::namespace::Namespace;

/// The per-collection live index table plus its collation flag.
///
/// `simple_collation` is `true` when the collection was created with the
/// server's "simple" collation (or no collation at all). When `false`,
/// [`CollectionIndexCatalog::indexes`] injects an explicit
/// `collation: {locale: "simple"}` into any index whose options lack a
/// `collation` field, so a reader can never mistake "absent" for "inherits
/// the collection's (non-simple) collation".
#[derive(Debug, Clone, Default)]
pub struct CollectionIndexCatalog {
    by_name: HashMap<String, IndexDocument>,
    pub simple_collation: bool,
}

impl CollectionIndexCatalog {
    pub fn new(simple_collation: bool) -> Self {
        Self {
            by_name: HashMap::new(),
            simple_collation,
        }
    }

    pub fn add_index(&mut self, idx: IndexDocument) -> Result<(), CatalogError> {
        let name = idx
            .name()
            .ok_or_else(|| CatalogError::InvalidDeleteIndexesSpec("index has no name".into()))?
            .to_string();
        self.by_name.insert(name, idx);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<IndexDocument> {
        self.by_name.get(name).cloned().map(|idx| self.inject_collation(idx))
    }

    pub fn indexes(&self) -> Vec<IndexDocument> {
        self.by_name
            .values()
            .cloned()
            .map(|idx| self.inject_collation(idx))
            .collect()
    }

    fn inject_collation(&self, mut idx: IndexDocument) -> IndexDocument {
        if !self.simple_collation && !idx.options.contains_key("collation") {
            let mut collation = Document::new();
            collation.insert("locale", "simple");
            idx.options.insert("collation", collation);
        }
        idx
    }

    fn find_by_key(&self, key: &IndexKey) -> Vec<String> {
        self.by_name
            .iter()
            .filter(|(_, idx)| &idx.key == key)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn delete(&mut self, spec: &DeleteIndexesSpec) {
        match spec {
            DeleteIndexesSpec::All => {
                self.by_name.retain(|name, _| name == "_id_");
            }
            DeleteIndexesSpec::Name(name) => {
                self.by_name.remove(name);
            }
            DeleteIndexesSpec::Key(key) => {
                for name in self.find_by_key(key) {
                    self.by_name.remove(&name);
                }
            }
        }
    }

    fn resolve_by_key_pattern(&self, key: &IndexKey) -> Result<String, CatalogError> {
        let mut matches = self.find_by_key(key);
        match matches.len() {
            0 => Err(CatalogError::IndexNotFound {
                collection: String::new(),
                selector: format!("keyPattern {key:?}"),
            }),
            1 => Ok(matches.remove(0)),
            _ => Err(CatalogError::AmbiguousSelector),
        }
    }

    pub fn coll_mod(&mut self, m: &CollModSpec) -> Result<IndexDocument, CatalogError> {
        let name = match (&m.name, &m.key_pattern) {
            (Some(_), Some(_)) => return Err(CatalogError::AmbiguousSelector),
            (None, None) => return Err(CatalogError::MissingSelector),
            (Some(name), None) => name.clone(),
            (None, Some(key)) => self.resolve_by_key_pattern(key)?,
        };
        if m.expire_after_seconds.is_none() && m.hidden.is_none() {
            return Err(CatalogError::EmptyModification);
        }
        let idx = self
            .by_name
            .get_mut(&name)
            .ok_or_else(|| CatalogError::IndexNotFound {
                collection: String::new(),
                selector: format!("name {name:?}"),
            })?;
        if let Some(expire) = &m.expire_after_seconds {
            match expire {
                Bson::Int32(_) | Bson::Int64(_) => {
                    idx.options.insert("expireAfterSeconds", expire.clone());
                }
                Bson::Double(d) if d.fract() == 0.0 => {
                    idx.options.insert("expireAfterSeconds", Bson::Int64(*d as i64));
                }
                _ => return Err(CatalogError::NonIntegralExpireAfterSeconds),
            }
        }
        if let Some(hidden) = m.hidden {
            idx.options.insert("hidden", hidden);
        }
        Ok(idx.clone())
    }
}

/// Selector for [`IndexCatalog::delete_indexes`]. The oplog replayer and
/// directory/archive planner both construct this from raw BSON; `"*"`
/// (and its synonym `"dropIndexes"`/`"deleteIndexes"` command form) maps
/// to `All`.
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteIndexesSpec {
    All,
    Name(String),
    Key(IndexKey),
}

impl DeleteIndexesSpec {
    /// Parse the `index`/`deleteIndexes` payload of a `dropIndexes` command.
    /// Fails only when the value isn't a string or an ordered document —
    /// that is the only case `deleteIndexes` rejects.
    pub fn from_bson(value: &Bson) -> Result<Self, CatalogError> {
        match value {
            Bson::String(s) if s == "*" => Ok(DeleteIndexesSpec::All),
            Bson::String(s) => Ok(DeleteIndexesSpec::Name(s.clone())),
            Bson::Document(doc) => Ok(DeleteIndexesSpec::Key(
                doc.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            )),
            other => Err(CatalogError::InvalidDeleteIndexesSpec(format!("{other:?}"))),
        }
    }
}

/// `collMod` selector + modification, as parsed from an oplog `collMod`
/// command's `index` clause.
#[derive(Debug, Clone, Default)]
pub struct CollModSpec {
    pub name: Option<String>,
    pub key_pattern: Option<IndexKey>,
    pub expire_after_seconds: Option<Bson>,
    pub hidden: Option<bool>,
}

/// A one-shot snapshot of the namespaces known to the catalog at the moment
/// [`IndexCatalog::queue`] was called. Consuming it never re-enters the
/// catalog lock.
pub struct NamespaceQueue {
    receiver: crossbeam::channel::Receiver<Namespace>,
}

impl NamespaceQueue {
    pub fn pop(&self) -> Option<Namespace> {
        self.receiver.try_recv().ok()
    }
}

impl Iterator for NamespaceQueue {
    type Item = Namespace;

    fn next(&mut self) -> Option<Namespace> {
        self.pop()
    }
}

/// Live mapping of database → collection → [`CollectionIndexCatalog`].
///
/// One `Mutex` guards the whole table: mutation is rare compared to
/// document insertion, so coarse-grained locking is the right trade-off.
#[derive(Default)]
pub struct IndexCatalog {
    inner: Mutex<HashMap<String, HashMap<String, CollectionIndexCatalog>>>,
}

impl IndexCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_collection<R>(
        &self,
        db: &str,
        coll: &str,
        f: impl FnOnce(&mut CollectionIndexCatalog) -> R,
    ) -> R {
        let mut guard = self.inner.lock().unwrap();
        let entry = guard
            .entry(db.to_string())
            .or_default()
            .entry(coll.to_string())
            .or_insert_with(|| CollectionIndexCatalog::new(true));
        f(entry)
    }

    pub fn add_index(&self, db: &str, coll: &str, idx: IndexDocument) -> Result<(), CatalogError> {
        self.with_collection(db, coll, |c| c.add_index(idx))
    }

    pub fn set_collation(&self, db: &str, coll: &str, simple: bool) {
        self.with_collection(db, coll, |c| c.simple_collation = simple);
    }

    pub fn drop_database(&self, db: &str) {
        self.inner.lock().unwrap().remove(db);
    }

    pub fn drop_collection(&self, db: &str, coll: &str) {
        if let Some(collections) = self.inner.lock().unwrap().get_mut(db) {
            collections.remove(coll);
        }
    }

    pub fn delete_indexes(&self, db: &str, coll: &str, spec: &DeleteIndexesSpec) {
        self.with_collection(db, coll, |c| c.delete(spec));
    }

    pub fn coll_mod(&self, db: &str, coll: &str, m: &CollModSpec) -> Result<IndexDocument, CatalogError> {
        self.with_collection(db, coll, |c| c.coll_mod(m))
    }

    pub fn get(&self, db: &str, coll: &str, name: &str) -> Option<IndexDocument> {
        let guard = self.inner.lock().unwrap();
        guard.get(db)?.get(coll)?.get(name)
    }

    pub fn get_indexes(&self, db: &str, coll: &str) -> Vec<IndexDocument> {
        let guard = self.inner.lock().unwrap();
        guard
            .get(db)
            .and_then(|dbs| dbs.get(coll))
            .map(|c| c.indexes())
            .unwrap_or_default()
    }

    pub fn namespaces(&self) -> Vec<Namespace> {
        let guard = self.inner.lock().unwrap();
        let mut out = Vec::new();
        for (db, colls) in guard.iter() {
            for coll in colls.keys() {
                out.push(Namespace::new(db.clone(), coll.clone()));
            }
        }
        out.sort();
        out
    }

    pub fn queue(&self) -> NamespaceQueue {
        let namespaces = self.namespaces();
        let (sender, receiver) = crossbeam::channel::unbounded();
        for ns in namespaces {
            let _ = sender.send(ns);
        }
        NamespaceQueue { receiver }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index_document::IndexDocument;

    fn idx(name: &str, key: IndexKey) -> IndexDocument {
        let mut options = Document::new();
        options.insert("name", name);
        IndexDocument::new(key, options)
    }

    #[test]
    fn add_index_upserts_by_name() {
        let cat = IndexCatalog::new();
        cat.add_index("db1", "c1", idx("a_1", vec![("a".into(), Bson::Int32(1))]))
            .unwrap();
        cat.add_index("db1", "c1", idx("a_1", vec![("a".into(), Bson::Int32(-1))]))
            .unwrap();
        let indexes = cat.get_indexes("db1", "c1");
        assert_eq!(indexes.len(), 1);
        assert_eq!(indexes[0].key[0].1, Bson::Int32(-1));
    }

    #[test]
    fn drop_database_removes_all_collections() {
        let cat = IndexCatalog::new();
        cat.add_index("db1", "c1", IndexDocument::identity()).unwrap();
        cat.add_index("db1", "c2", IndexDocument::identity()).unwrap();
        cat.drop_database("db1");
        assert!(cat.namespaces().is_empty());
    }

    #[test]
    fn delete_indexes_star_preserves_id_index() {
        let cat = IndexCatalog::new();
        cat.add_index("db1", "c1", IndexDocument::identity()).unwrap();
        cat.add_index("db1", "c1", idx("field1_1", vec![("field1".into(), Bson::Int32(1))]))
            .unwrap();
        cat.delete_indexes("db1", "c1", &DeleteIndexesSpec::All);
        let remaining: Vec<_> = cat.get_indexes("db1", "c1").iter().map(|i| i.name().unwrap().to_string()).collect();
        assert_eq!(remaining, vec!["_id_".to_string()]);
    }

    #[test]
    fn delete_indexes_star_is_idempotent() {
        let cat = IndexCatalog::new();
        cat.add_index("db1", "c1", IndexDocument::identity()).unwrap();
        cat.add_index("db1", "c1", idx("field1_1", vec![("field1".into(), Bson::Int32(1))]))
            .unwrap();
        cat.delete_indexes("db1", "c1", &DeleteIndexesSpec::All);
        let once = cat.get_indexes("db1", "c1");
        cat.delete_indexes("db1", "c1", &DeleteIndexesSpec::All);
        let twice = cat.get_indexes("db1", "c1");
        assert_eq!(once.len(), twice.len());
    }

    #[test]
    fn delete_indexes_missing_name_is_silently_ignored() {
        let cat = IndexCatalog::new();
        cat.add_index("db1", "c1", IndexDocument::identity()).unwrap();
        cat.delete_indexes("db1", "c1", &DeleteIndexesSpec::Name("nope".into()));
        assert_eq!(cat.get_indexes("db1", "c1").len(), 1);
    }

    #[test]
    fn delete_indexes_by_key_is_order_sensitive() {
        let cat = IndexCatalog::new();
        cat.add_index(
            "db1",
            "c1",
            idx("ab", vec![("a".into(), Bson::Int32(1)), ("b".into(), Bson::Int32(1))]),
        )
        .unwrap();
        let wrong_order = DeleteIndexesSpec::Key(vec![
            ("b".into(), Bson::Int32(1)),
            ("a".into(), Bson::Int32(1)),
        ]);
        cat.delete_indexes("db1", "c1", &wrong_order);
        assert_eq!(cat.get_indexes("db1", "c1").len(), 1);

        let right_order = DeleteIndexesSpec::Key(vec![
            ("a".into(), Bson::Int32(1)),
            ("b".into(), Bson::Int32(1)),
        ]);
        cat.delete_indexes("db1", "c1", &right_order);
        assert!(cat.get_indexes("db1", "c1").is_empty());
    }

    #[test]
    fn coll_mod_updates_expire_and_hidden() {
        let cat = IndexCatalog::new();
        cat.add_index("db1", "c1", idx("t_1", vec![("t".into(), Bson::Int32(1))]))
            .unwrap();
        let result = cat
            .coll_mod(
                "db1",
                "c1",
                &CollModSpec {
                    name: Some("t_1".into()),
                    key_pattern: None,
                    expire_after_seconds: Some(Bson::Int64(3600)),
                    hidden: Some(true),
                },
            )
            .unwrap();
        assert_eq!(result.options.get_i64("expireAfterSeconds").unwrap(), 3600);
        assert_eq!(result.options.get_bool("hidden").unwrap(), true);

        let fetched = cat.get("db1", "c1", "t_1").unwrap();
        assert_eq!(fetched.options.get_i64("expireAfterSeconds").unwrap(), 3600);
    }

    #[test]
    fn coll_mod_rejects_both_selectors() {
        let cat = IndexCatalog::new();
        cat.add_index("db1", "c1", idx("t_1", vec![("t".into(), Bson::Int32(1))]))
            .unwrap();
        let err = cat
            .coll_mod(
                "db1",
                "c1",
                &CollModSpec {
                    name: Some("t_1".into()),
                    key_pattern: Some(vec![("t".into(), Bson::Int32(1))]),
                    expire_after_seconds: Some(Bson::Int64(1)),
                    hidden: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, CatalogError::AmbiguousSelector));
    }

    #[test]
    fn coll_mod_rejects_empty_modification() {
        let cat = IndexCatalog::new();
        cat.add_index("db1", "c1", idx("t_1", vec![("t".into(), Bson::Int32(1))]))
            .unwrap();
        let err = cat
            .coll_mod(
                "db1",
                "c1",
                &CollModSpec {
                    name: Some("t_1".into()),
                    key_pattern: None,
                    expire_after_seconds: None,
                    hidden: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, CatalogError::EmptyModification));
    }

    #[test]
    fn collation_injected_when_not_simple() {
        let cat = IndexCatalog::new();
        cat.add_index("db1", "c1", idx("a_1", vec![("a".into(), Bson::Int32(1))]))
            .unwrap();
        cat.set_collation("db1", "c1", false);
        let indexes = cat.get_indexes("db1", "c1");
        let collation = indexes[0].options.get_document("collation").unwrap();
        assert_eq!(collation.get_str("locale").unwrap(), "simple");
    }

    #[test]
    fn collation_not_injected_when_simple() {
        let cat = IndexCatalog::new();
        cat.add_index("db1", "c1", idx("a_1", vec![("a".into(), Bson::Int32(1))]))
            .unwrap();
        let indexes = cat.get_indexes("db1", "c1");
        assert!(!indexes[0].options.contains_key("collation"));
    }

    #[test]
    fn queue_is_a_point_in_time_snapshot() {
        let cat = IndexCatalog::new();
        cat.add_index("db1", "c1", IndexDocument::identity()).unwrap();
        let queue = cat.queue();
        cat.add_index("db1", "c2", IndexDocument::identity()).unwrap();
        let popped: Vec<_> = queue.collect();
        assert_eq!(popped, vec![Namespace::new("db1", "c1")]);
    }

    #[test]
    fn delete_indexes_spec_rejects_unexpected_type() {
        let err = DeleteIndexesSpec::from_bson(&Bson::Int32(1)).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidDeleteIndexesSpec(_)));
    }
}
