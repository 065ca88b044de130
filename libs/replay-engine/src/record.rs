//! Consumer → recording file.

use std::io::Write;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use replay_api::client::{Consumer, Poll};
use replay_api::progress::ProgressReporter;
use replay_api::time::{SystemClock, TimeProvider};

use crate::codec::encode_frame;
use crate::error::{Aborted, EngineError};

/// Parameters for a recording run.
pub struct RecordConfig {
    /// Absolute offset to start from. `None` keeps the consumer's position.
    pub offset: Option<i64>,
    /// Stop after this many messages. 0 = no limit.
    pub limit: u64,
    /// Clock used to stamp every frame at write time.
    pub time: Arc<dyn TimeProvider>,
    /// Counts messages; total is the limit when one is set.
    pub progress: Option<Box<dyn ProgressReporter>>,
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            offset: None,
            limit: 0,
            time: Arc::new(SystemClock),
            progress: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordStats {
    pub bytes_written: u64,
    pub messages: u64,
}

/// Drain `consumer` into `output`, one frame per message.
///
/// Runs until the limit is hit or `token` is cancelled; an idle consumer is
/// polled again rather than treated as the end of the topic. Frames are
/// stamped with `config.time`, never with a time carried by the message.
///
/// `output` is flushed whatever the outcome. On error the partial counts
/// travel inside [`Aborted`].
pub async fn record<W: Write>(
    consumer: &mut dyn Consumer,
    output: &mut W,
    mut config: RecordConfig,
    token: &CancellationToken,
) -> Result<RecordStats, Aborted<RecordStats>> {
    let mut progress = config.progress.take();
    if let Some(p) = progress.as_mut() {
        if config.limit > 0 {
            p.set_total(config.limit);
        }
    }

    let mut stats = RecordStats::default();
    let mut result = drive(consumer, output, &config, &mut progress, &mut stats, token).await;

    if let Err(e) = output.flush() {
        match result {
            Ok(()) => result = Err(EngineError::from(e).with_context("flush output")),
            Err(_) => tracing::warn!(error = %e, "failed to flush output"),
        }
    }

    if let Some(p) = progress.as_mut() {
        if let Err(e) = p.close() {
            tracing::warn!(error = %e, "failed to close progress reporter");
        }
    }

    match result {
        Ok(()) => {
            tracing::info!(messages = stats.messages, bytes = stats.bytes_written, "recording finished");
            Ok(stats)
        }
        Err(error) => Err(Aborted::new(stats, error)),
    }
}

async fn drive<W: Write>(
    consumer: &mut dyn Consumer,
    output: &mut W,
    config: &RecordConfig,
    progress: &mut Option<Box<dyn ProgressReporter>>,
    stats: &mut RecordStats,
    token: &CancellationToken,
) -> Result<(), EngineError> {
    if let Some(offset) = config.offset {
        consumer
            .set_offset(offset)
            .map_err(|e| EngineError::from(e).with_context(format!("set offset {offset}")))?;
        tracing::debug!(offset, "consumer offset set");
    }

    loop {
        if config.limit > 0 && stats.messages >= config.limit {
            break;
        }
        if token.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let polled = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(EngineError::Cancelled),
            polled = consumer.read_next() => polled,
        };

        let data = match polled {
            Ok(Poll::Message(data)) => data,
            Ok(Poll::Idle) => {
                tokio::task::yield_now().await;
                continue;
            }
            Err(e) => {
                if token.is_cancelled() {
                    return Err(EngineError::Cancelled);
                }
                return Err(EngineError::from(e).with_context("read message"));
            }
        };

        let written = encode_frame(&mut *output, config.time.now(), &data)?;
        stats.bytes_written += written;
        stats.messages += 1;

        if let Some(p) = progress.as_mut() {
            p.add(1);
        }
    }

    Ok(())
}
