use std::collections::HashMap;

use bson::Document;

use crate::record::OplogRecord;

/// `(lsid bytes, txnNumber)` — the stable key for a transaction's buffered
/// operations.
type TxnKey = (Vec<u8>, i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    Accumulating,
    Prepared,
    Committed,
    Aborted,
}

struct Txn {
    state: TxnState,
    ops: Vec<OplogRecord>,
}

/// Buffers partial-transaction ops until `commitTransaction` releases them
/// in order, or `abortTransaction` discards them.
#[derive(Default)]
pub struct TxnBuffer {
    txns: HashMap<TxnKey, Txn>,
}

fn key_for(lsid: &Document, txn_number: i64) -> TxnKey {
    let bytes = bson::to_vec(lsid).unwrap_or_default();
    (bytes, txn_number)
}

impl TxnBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulate a `partialTxn` entry. Entries land in whatever state the
    /// transaction is currently in; only `commit`/`abort` act on them.
    pub fn accumulate(&mut self, record: OplogRecord) {
        let Some(key) = record_key(&record) else { return };
        let txn = self.txns.entry(key).or_insert_with(|| Txn { state: TxnState::Accumulating, ops: Vec::new() });
        txn.ops.push(record);
    }

    pub fn prepare(&mut self, record: &OplogRecord) {
        if let Some(key) = record_key(record) {
            let txn = self.txns.entry(key).or_insert_with(|| Txn { state: TxnState::Accumulating, ops: Vec::new() });
            txn.state = TxnState::Prepared;
        }
    }

    /// Transitions to `Committed` and returns the buffered ops in the order
    /// they were accumulated, for the caller to dispatch as normal CRUD/
    /// command ops. Returns an empty vec if no transaction was buffered.
    pub fn commit(&mut self, record: &OplogRecord) -> Vec<OplogRecord> {
        let Some(key) = record_key(record) else { return Vec::new() };
        match self.txns.remove(&key) {
            Some(mut txn) => {
                txn.state = TxnState::Committed;
                std::mem::take(&mut txn.ops)
            }
            None => Vec::new(),
        }
    }

    pub fn abort(&mut self, record: &OplogRecord) {
        if let Some(key) = record_key(record) {
            self.txns.remove(&key);
        }
    }

    pub fn state(&self, record: &OplogRecord) -> Option<TxnState> {
        record_key(record).and_then(|key| self.txns.get(&key)).map(|t| t.state)
    }
}

fn record_key(record: &OplogRecord) -> Option<TxnKey> {
    let lsid = record.lsid.as_ref()?;
    let txn_number = record.txn_number?;
    Some(key_for(lsid, txn_number))
}
