mod app;

use std::process::ExitCode;

use clap::Parser;
use netcom_client::{ComNetworkProvider, SystemSource, WorkerConfig};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::app::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_filter(filter))
        .init();

    tracing::info!("Starting netcom");

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", app::report(&e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let provider = tokio::task::spawn_blocking(|| {
        ComNetworkProvider::new(SystemSource::default(), WorkerConfig::default())
    })
    .await??;

    let mut stdout = std::io::stdout();
    app::run(&cli.command, &provider, &mut stdout).await
}
