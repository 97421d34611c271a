use bson::{Bson, Document};

use crate::error::OplogError;

/// A `(T, I)` pair from an oplog entry's `ts` field. Comparison is
/// lexicographic on `(t, i)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Timestamp {
    pub t: u32,
    pub i: u32,
}

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp { t: 0, i: 0 };

    /// `self < bound`, or no bound at all when `bound` is the zero pair.
    pub fn admissible(self, bound: Timestamp) -> bool {
        bound == Timestamp::ZERO || self < bound
    }

    fn from_bson(value: &Bson) -> Option<Timestamp> {
        match value {
            Bson::Timestamp(ts) => Some(Timestamp { t: ts.time, i: ts.increment }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    NoOp,
    Insert,
    Update,
    Delete,
    Command,
}

impl OpKind {
    fn from_str(s: &str) -> Option<OpKind> {
        match s {
            "n" => Some(OpKind::NoOp),
            "i" => Some(OpKind::Insert),
            "u" => Some(OpKind::Update),
            "d" => Some(OpKind::Delete),
            "c" => Some(OpKind::Command),
            _ => None,
        }
    }
}

/// One decoded oplog entry.
#[derive(Debug, Clone)]
pub struct OplogRecord {
    pub ts: Timestamp,
    pub op: OpKind,
    pub ns: String,
    pub o: Document,
    pub o2: Option<Document>,
    pub ui: Option<Vec<u8>>,
    pub lsid: Option<Document>,
    pub txn_number: Option<i64>,
    pub partial_txn: bool,
    pub prepare: bool,
    pub commit_transaction: bool,
}

impl OplogRecord {
    pub fn from_document(doc: &Document) -> Result<OplogRecord, OplogError> {
        let ts = doc
            .get("ts")
            .and_then(Timestamp::from_bson)
            .ok_or_else(|| OplogError::MalformedRecord("missing or invalid ts".into()))?;
        let op_str = doc
            .get_str("op")
            .map_err(|_| OplogError::MalformedRecord("missing op".into()))?;
        let op = OpKind::from_str(op_str)
            .ok_or_else(|| OplogError::MalformedRecord(format!("unrecognized op kind {op_str:?}")))?;
        let ns = doc.get_str("ns").unwrap_or_default().to_string();
        let o = doc.get_document("o").cloned().unwrap_or_default();
        let o2 = doc.get_document("o2").ok().cloned();
        let ui = doc.get_binary_generic("ui").ok().cloned();
        let lsid = doc.get_document("lsid").ok().cloned();
        let txn_number = doc.get_i64("txnNumber").ok().or_else(|| doc.get_i32("txnNumber").ok().map(i64::from));
        let partial_txn = doc.get_bool("partialTxn").unwrap_or(false);
        let prepare = doc.get_bool("prepare").unwrap_or(false);
        let commit_transaction = doc.get_bool("commitTransaction").unwrap_or(false);

        Ok(OplogRecord {
            ts,
            op,
            ns,
            o,
            o2,
            ui,
            lsid,
            txn_number,
            partial_txn,
            prepare,
            commit_transaction,
        })
    }

    /// The command name is the first key of `o`; only
    /// meaningful for `OpKind::Command`.
    pub fn command_name(&self) -> Option<&str> {
        self.o.keys().next().map(|s| s.as_str())
    }

    pub fn in_transaction(&self) -> bool {
        self.lsid.is_some() && self.txn_number.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_bound_admits_everything() {
        assert!(Timestamp { t: 1, i: 0 }.admissible(Timestamp::ZERO));
        assert!(Timestamp { t: u32::MAX, i: u32::MAX }.admissible(Timestamp::ZERO));
    }

    #[test]
    fn strict_less_than_on_both_components() {
        let bound = Timestamp { t: 5, i: 0 };
        assert!(Timestamp { t: 4, i: 999 }.admissible(bound));
        assert!(!Timestamp { t: 5, i: 0 }.admissible(bound));
        assert!(!Timestamp { t: 6, i: 0 }.admissible(bound));
    }

    #[test]
    fn same_t_compares_on_i() {
        let bound = Timestamp { t: 5, i: 3 };
        assert!(Timestamp { t: 5, i: 2 }.admissible(bound));
        assert!(!Timestamp { t: 5, i: 3 }.admissible(bound));
        assert!(!Timestamp { t: 5, i: 4 }.admissible(bound));
    }

    #[test]
    fn command_name_is_first_key() {
        let doc = bson::doc! { "op": "c", "ns": "admin.$cmd", "ts": bson::Timestamp { time: 1, increment: 0 }, "o": { "drop": "coll1" } };
        let rec = OplogRecord::from_document(&doc).unwrap();
        assert_eq!(rec.command_name(), Some("drop"));
    }
}
