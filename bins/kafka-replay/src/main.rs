mod cmd;
mod config;
mod error;
mod kafka;
mod output;
mod progress;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use config::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.global.quiet { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // Ctrl+C stops the running engine; it reports what it got done.
    let token = CancellationToken::new();
    let shutdown = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, stopping");
            shutdown.cancel();
        }
    });

    if let Err(e) = cmd::run(cli, &token).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
