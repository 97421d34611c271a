use std::process::ExitCode;

use restorekit_cli::args;
use restorekit_cli::codec::BsonCodec;
use restorekit_cli::io::FsInput;
use restorekit_cli::memory_session::MemorySession;
use restorekit_cli::reporter::TracingReporter;
use restorekit_core::Orchestrator;
use restorekit_oplog::ServerVersion;

/// Exit codes: 0 on a clean run (`dryRun` included), 1 on any fatal
/// `RestoreError`.
fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let options = match args::parse(std::env::args().skip(1)) {
        Ok(options) => options,
        Err(message) => {
            tracing::error!("{message}");
            return ExitCode::FAILURE;
        }
    };

    let server_version = std::env::var("RESTOREKIT_SERVER_VERSION")
        .ok()
        .and_then(|v| ServerVersion::parse(&v))
        .unwrap_or(ServerVersion::new(6, 0, 0));

    let session = MemorySession::new(server_version);
    let codec = BsonCodec;
    let input = FsInput;
    let reporter = TracingReporter;

    let orchestrator = Orchestrator { session: &session, codec: &codec, input: &input, reporter: &reporter };

    match orchestrator.run(&options) {
        Ok(outcome) => {
            tracing::info!(successes = outcome.successes, failures = outcome.failures, "restore complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("restore failed: {e}");
            ExitCode::FAILURE
        }
    }
}
