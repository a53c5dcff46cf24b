//! Ripple CLI binary.

use anyhow::Result;
use ripple::cli::Cli;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Main entry point for the ripple CLI.
///
/// Uses the multi-threaded runtime so task actions run in parallel.
#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse_args();

    // RUST_LOG wins over -v
    // Example: RUST_LOG=ripple=debug,ripple_jsonl=trace ripple run tasks.yaml
    let level = cli.log_level();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("ripple={level},ripple_jsonl={level}"))),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("Starting ripple CLI");

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling");
            on_interrupt.cancel();
        }
    });

    let code = cli.execute(cancel).await?;

    tracing::debug!("Ripple CLI finished");
    Ok(code)
}
