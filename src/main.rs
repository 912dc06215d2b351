//! parley CLI entrypoint

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use parley::cli::Cli;

fn main() -> Result<()> {
    // Logs go to stderr so they never interleave with the conversation
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(cli.execute());

    // A blocked stdin read never completes on its own
    runtime.shutdown_timeout(Duration::from_millis(250));

    result
}
