use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use replay_api::time::SystemClock;
use replay_engine::replay::replay;
use replay_engine::{MessageFileReader, ReplayConfig, ReplayStats};

use crate::config::{Format, GlobalArgs, ReplayArgs, Settings};
use crate::error::CliError;
use crate::kafka;
use crate::progress::{self, Unit};

pub async fn run(global: &GlobalArgs, args: ReplayArgs, token: &CancellationToken) -> Result<(), CliError> {
    let settings = Settings::load(global)?;
    let brokers = settings.brokers()?;

    let mut reader = MessageFileReader::open(&args.input, args.preserve_timestamps, Arc::new(SystemClock))?;

    tracing::info!(
        topic = %args.topic,
        brokers = %brokers.join(","),
        input = %args.input.display(),
        rate = args.rate,
        looping = args.loop_forever,
        preserve_timestamps = args.preserve_timestamps,
        "replaying"
    );

    kafka::prepare_topic(&brokers, &args.topic, args.create_topic).await?;
    let producer = kafka::producer(&brokers, &args.topic)?;

    let label = if args.loop_forever { "replaying (looping)" } else { "replaying" };
    let config = ReplayConfig {
        rate: Some(args.rate),
        loop_forever: args.loop_forever,
        max_batch_size: args.batch_size,
        max_batch_bytes: args.batch_bytes,
        progress: progress::reporter(global.quiet, label, Unit::Bytes),
        log: if global.quiet { None } else { Some(Box::new(std::io::stderr())) },
    };

    let outcome = replay(&mut reader, producer.as_ref(), config, token).await;
    let (stats, interrupted) = super::settle(outcome)?;
    report(global, &stats, interrupted)
}

fn report(global: &GlobalArgs, stats: &ReplayStats, interrupted: bool) -> Result<(), CliError> {
    match global.format {
        Format::Json => {
            let summary = serde_json::json!({
                "messages": stats.messages,
                "loops": stats.loops,
                "bytes_read": stats.bytes_read,
                "interrupted": interrupted,
            });
            println!("{summary}");
        }
        Format::Table | Format::Raw => {
            if !global.quiet {
                println!("Replayed {} messages", stats.messages);
            }
        }
    }
    Ok(())
}
