use restorekit_catalog::Namespace;

use crate::error::PlannerError;

/// One `nsFrom`/`nsTo` pair. At most one `*` per side; the substring the `*`
/// matched on `from` is substituted into `to`'s `*`, so `"db1.*" -> "db2.*"`
/// renames every collection in `db1` into `db2` under the same name.
struct RenameRule {
    from: String,
    to: String,
}

impl RenameRule {
    fn apply(&self, ns: &Namespace) -> Option<Namespace> {
        let full = ns.to_string();
        let captured = match_wildcard(&self.from, &full)?;
        let renamed = self.to.replacen('*', &captured, 1);
        renamed.parse().ok()
    }
}

fn match_wildcard(pattern: &str, s: &str) -> Option<String> {
    match pattern.find('*') {
        None => {
            if pattern == s {
                Some(String::new())
            } else {
                None
            }
        }
        Some(idx) => {
            let prefix = &pattern[..idx];
            let suffix = &pattern[idx + 1..];
            if s.len() >= prefix.len() + suffix.len() && s.starts_with(prefix) && s.ends_with(suffix) {
                Some(s[idx..s.len() - suffix.len()].to_string())
            } else {
                None
            }
        }
    }
}

/// The ordered set of rename rules from `nsFrom`/`nsTo`. Applies the first
/// matching rule; forbids renaming a time-series bucket backing collection
/// independently of its logical collection.
pub struct RenameTable {
    rules: Vec<RenameRule>,
}

impl RenameTable {
    pub fn new(from: &[String], to: &[String]) -> Result<Self, PlannerError> {
        assert_eq!(from.len(), to.len(), "nsFrom/nsTo must be equal-length lists");
        let rules = from
            .iter()
            .zip(to.iter())
            .map(|(f, t)| RenameRule { from: f.clone(), to: t.clone() })
            .collect();
        Ok(RenameTable { rules })
    }

    pub fn empty() -> Self {
        RenameTable { rules: Vec::new() }
    }

    /// Resolves the destination namespace for `ns`, applying the first
    /// matching rule (or returning `ns` unchanged if none match).
    pub fn resolve(&self, ns: &Namespace) -> Result<Namespace, PlannerError> {
        if ns.bucket_logical_name().is_some() {
            for rule in &self.rules {
                if rule.apply(ns).is_some() {
                    return Err(PlannerError::RenameForbidden(ns.to_string()));
                }
            }
            return Ok(ns.clone());
        }
        for rule in &self.rules {
            if let Some(renamed) = rule.apply(ns) {
                return Ok(renamed);
            }
        }
        Ok(ns.clone())
    }
}
