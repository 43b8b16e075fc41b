use std::process::ExitCode;

use clap::Parser;
use mcctl_cli::Cli;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    setup_tracing();
    mcctl_cli::run(Cli::parse()).await
}

/// Logs go to stderr so they never mix with controller output. `RUST_LOG`
/// selects the level, warnings by default.
fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
