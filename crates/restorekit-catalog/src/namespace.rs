use std::fmt;
use std::str::FromStr;

/// A `(database, collection)` pair.
///
/// Both halves are non-empty. Collection names are opaque and may contain
/// Unicode characters that need percent-encoding when used as filenames;
/// that encoding lives in `restorekit-planner`, not here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Namespace {
    pub db: String,
    pub coll: String,
}

impl Namespace {
    pub fn new(db: impl Into<String>, coll: impl Into<String>) -> Self {
        Self {
            db: db.into(),
            coll: coll.into(),
        }
    }

    pub fn is_system(&self) -> bool {
        self.coll.starts_with("system.")
    }

    /// The logical collection for a time-series bucket namespace, if this
    /// namespace names one (`system.buckets.<name>`).
    pub fn bucket_logical_name(&self) -> Option<&str> {
        self.coll.strip_prefix("system.buckets.")
    }

    pub fn bucket_namespace(&self) -> Namespace {
        Namespace::new(self.db.clone(), format!("system.buckets.{}", self.coll))
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.db, self.coll)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseNamespaceError(pub String);

impl fmt::Display for ParseNamespaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid namespace: {}", self.0)
    }
}

impl std::error::Error for ParseNamespaceError {}

impl FromStr for Namespace {
    type Err = ParseNamespaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((db, coll)) if !db.is_empty() && !coll.is_empty() => {
                Ok(Namespace::new(db, coll))
            }
            _ => Err(ParseNamespaceError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_roundtrips_through_fromstr() {
        let ns = Namespace::new("db1", "c1");
        let parsed: Namespace = ns.to_string().parse().unwrap();
        assert_eq!(ns, parsed);
    }

    #[test]
    fn fromstr_splits_on_first_dot_only() {
        let ns: Namespace = "db1.c1.nested".parse().unwrap();
        assert_eq!(ns.db, "db1");
        assert_eq!(ns.coll, "c1.nested");
    }

    #[test]
    fn bucket_namespace_roundtrip() {
        let logical = Namespace::new("db1", "metrics");
        let bucket = logical.bucket_namespace();
        assert_eq!(bucket.coll, "system.buckets.metrics");
        assert_eq!(bucket.bucket_logical_name(), Some("metrics"));
    }
}
