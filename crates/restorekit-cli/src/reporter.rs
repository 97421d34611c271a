use restorekit_catalog::Namespace;
use restorekit_core::{ReportLevel, Reporter};

/// The default `Reporter` for the runnable binary, wrapping `tracing`.
/// Tests use the silent double in `restorekit-core`'s own integration
/// tests instead.
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn log(&self, level: ReportLevel, message: &str) {
        match level {
            ReportLevel::Info => tracing::info!("{message}"),
            ReportLevel::Warn => tracing::warn!("{message}"),
        }
    }

    fn data_progress(&self, ns: &Namespace, bytes_done: u64, bytes_total: u64) {
        tracing::info!(ns = %ns, bytes_done, bytes_total, "data progress");
    }

    fn oplog_progress(&self, entries_per_second: f64) {
        tracing::info!(entries_per_second, "oplog progress");
    }
}
