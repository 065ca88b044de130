pub mod cat;
pub mod debug;
pub mod info;
pub mod record;
pub mod replay;

use std::fmt::Debug;

use tokio_util::sync::CancellationToken;

use replay_engine::Aborted;

use crate::config::{Cli, Commands, DebugCommand};
use crate::error::CliError;

pub async fn run(cli: Cli, token: &CancellationToken) -> Result<(), CliError> {
    let global = cli.global;
    match cli.command {
        Commands::Record(args) => record::run(&global, args, token).await,
        Commands::Replay(args) => replay::run(&global, args, token).await,
        Commands::Cat(args) => cat::run(&global, args, token),
        Commands::Info => info::run(&global).await,
        Commands::Debug(DebugCommand::Config) => debug::config(&global),
        Commands::Version => {
            println!("kafka-replay version {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// How an engine run ended, from the command's point of view.
///
/// An interrupt is a normal way to stop an open-ended run, so it yields the
/// partial stats. Any other failure is an error.
pub(crate) fn settle<S: Debug>(outcome: Result<S, Aborted<S>>) -> Result<(S, bool), CliError> {
    match outcome {
        Ok(stats) => Ok((stats, false)),
        Err(aborted) if aborted.is_cancelled() => {
            tracing::info!(stats = ?aborted.stats, "interrupted");
            Ok((aborted.stats, true))
        }
        Err(aborted) => {
            tracing::warn!(stats = ?aborted.stats, "stopped before completion");
            Err(aborted.error.into())
        }
    }
}
