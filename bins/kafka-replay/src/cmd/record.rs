use std::fs::File;
use std::io::BufWriter;

use tokio_util::sync::CancellationToken;

use replay_engine::record::record;
use replay_engine::{RecordConfig, RecordStats};

use crate::config::{Format, GlobalArgs, RecordArgs, Settings};
use crate::error::CliError;
use crate::kafka::{self, ConsumerOptions};
use crate::progress::{self, Unit};

pub async fn run(global: &GlobalArgs, args: RecordArgs, token: &CancellationToken) -> Result<(), CliError> {
    let settings = Settings::load(global)?;
    let brokers = settings.brokers()?;

    tracing::info!(
        topic = %args.topic,
        partition = args.partition,
        brokers = %brokers.join(","),
        group = %args.group_id,
        output = %args.output.display(),
        from_beginning = args.from_beginning,
        limit = args.limit,
        "recording"
    );

    let mut consumer = kafka::consumer(
        &brokers,
        &ConsumerOptions {
            topic: &args.topic,
            partition: args.partition,
            group_id: &args.group_id,
            from_beginning: args.from_beginning,
        },
    )?;

    let file = File::create(&args.output).map_err(|e| CliError::io_at(&args.output, e))?;
    let mut output = BufWriter::new(file);

    let config = RecordConfig {
        offset: args.offset,
        limit: args.limit,
        progress: progress::reporter(global.quiet, "recording", Unit::Messages),
        ..RecordConfig::default()
    };

    let outcome = record(consumer.as_mut(), &mut output, config, token).await;
    let (stats, interrupted) = super::settle(outcome)?;
    report(global, &stats, interrupted)
}

fn report(global: &GlobalArgs, stats: &RecordStats, interrupted: bool) -> Result<(), CliError> {
    match global.format {
        Format::Json => {
            let summary = serde_json::json!({
                "messages": stats.messages,
                "bytes": stats.bytes_written,
                "interrupted": interrupted,
            });
            println!("{summary}");
        }
        Format::Table | Format::Raw => {
            if !global.quiet {
                println!("Recorded {} messages ({} bytes)", stats.messages, stats.bytes_written);
            }
        }
    }
    Ok(())
}
