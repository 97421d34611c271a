mod collab;
mod counters;
mod error;
mod policy;
mod pool;
mod worker;

pub use collab::{BulkSink, DocumentStream};
pub use counters::RunCounters;
pub use error::{InsertError, PipelineError};
pub use policy::InsertionPolicy;
pub use pool::{run_all, StreamOpener};
pub use worker::run_intent;
