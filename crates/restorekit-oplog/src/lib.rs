mod command;
mod error;
mod record;
mod replayer;
mod skiplist;
mod txn;
mod version;

pub use command::{parse_coll_mod_index, parse_commit_index_build, parse_create_indexes, parse_delete_indexes_spec};
pub use error::OplogError;
pub use record::{OpKind, OplogRecord, Timestamp};
pub use replayer::{replay, OplogSink, RecordSource, ReplayOptions, ReplayStats};
pub use skiplist::{is_ignored_command, is_ignored_namespace, is_known_command};
pub use txn::{TxnBuffer, TxnState};
pub use version::ServerVersion;
