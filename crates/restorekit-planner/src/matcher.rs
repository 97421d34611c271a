use regex::Regex;
use restorekit_catalog::Namespace;

use crate::error::PlannerError;

/// Matches `db.coll` strings against `*`-wildcard patterns. Patterns are
/// compiled against the full `"{db}.{coll}"` string (never split on the
/// separator), so a literal `.` inside either half — including a
/// `system.buckets.` prefix — is escaped like any other literal character
/// rather than treated as a field boundary.
pub struct NamespaceMatcher {
    patterns: Vec<Regex>,
}

impl NamespaceMatcher {
    pub fn new(patterns: &[String]) -> Result<Self, PlannerError> {
        let compiled = patterns.iter().map(|p| compile(p)).collect::<Result<Vec<_>, _>>()?;
        Ok(NamespaceMatcher { patterns: compiled })
    }

    /// The include-matcher default: everything.
    pub fn include_all() -> Self {
        NamespaceMatcher::new(&["*".to_string()]).expect("\"*\" always compiles")
    }

    /// The exclude-matcher default: nothing.
    pub fn exclude_none() -> Self {
        NamespaceMatcher { patterns: Vec::new() }
    }

    pub fn matches(&self, ns: &Namespace) -> bool {
        let s = ns.to_string();
        self.patterns.iter().any(|re| re.is_match(&s))
    }
}

const REGEX_META: &[char] = &['.', '+', '?', '(', ')', '[', ']', '{', '}', '^', '$', '|', '\\'];

fn compile(pattern: &str) -> Result<Regex, PlannerError> {
    let mut out = String::from("^");
    for ch in pattern.chars() {
        if ch == '*' {
            out.push_str(".*");
        } else if REGEX_META.contains(&ch) {
            out.push('\\');
            out.push(ch);
        } else {
            out.push(ch);
        }
    }
    out.push('$');
    Regex::new(&out).map_err(|e| PlannerError::BadPattern(pattern.to_string(), e.to_string()))
}
