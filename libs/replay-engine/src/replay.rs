//! Recording file → producer.

use std::io::{Read, Seek, Write};
use std::time::Duration;

use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use replay_api::client::Producer;
use replay_api::progress::ProgressReporter;
use replay_api::record::OutboundMessage;

use crate::codec::HEADER_SIZE;
use crate::error::{Aborted, EngineError};
use crate::reader::MessageFileReader;

pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_BATCH_BYTES: u64 = 10 * 1024 * 1024;

/// Parameters for a replay run.
pub struct ReplayConfig {
    /// Messages per second. `None` or 0 = as fast as the producer accepts.
    pub rate: Option<u32>,
    /// Rewind at end of file and keep going until cancelled.
    pub loop_forever: bool,
    /// Flush after this many records. 0 = [`DEFAULT_BATCH_SIZE`].
    pub max_batch_size: usize,
    /// Flush once the pending payload bytes reach this. 0 = [`DEFAULT_BATCH_BYTES`].
    pub max_batch_bytes: u64,
    /// Tracks bytes consumed from the recording; total is the file size.
    pub progress: Option<Box<dyn ProgressReporter>>,
    /// Receives the loop-restart notice.
    pub log: Option<Box<dyn Write + Send>>,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            rate: None,
            loop_forever: false,
            max_batch_size: DEFAULT_BATCH_SIZE,
            max_batch_bytes: DEFAULT_BATCH_BYTES,
            progress: None,
            log: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Records in batches the producer accepted.
    pub messages: u64,
    /// Completed rewinds.
    pub loops: u64,
    /// Frame bytes decoded, summed over every pass.
    pub bytes_read: u64,
}

/// Publish every record of `reader` through `producer`.
///
/// Records are grouped into batches that flush on whichever threshold hits
/// first. A pending batch is flushed once more on the way out, whatever
/// the reason for leaving; if that flush fails after an earlier error, the
/// earlier error wins.
///
/// A corrupt frame ends the run even in loop mode.
pub async fn replay<R: Read + Seek>(
    reader: &mut MessageFileReader<R>,
    producer: &dyn Producer,
    config: ReplayConfig,
    token: &CancellationToken,
) -> Result<ReplayStats, Aborted<ReplayStats>> {
    let mut session = Session::new(config);

    let result = match session.begin(reader) {
        Ok(()) => session.run(reader, producer, token).await,
        Err(e) => Err(e),
    };
    let result = session.finish(producer, result).await;

    match result {
        Ok(()) => {
            tracing::info!(
                messages = session.stats.messages,
                loops = session.stats.loops,
                bytes = session.stats.bytes_read,
                "replay finished"
            );
            Ok(session.stats)
        }
        Err(error) => Err(Aborted::new(session.stats, error)),
    }
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

struct Batch {
    records: Vec<OutboundMessage>,
    bytes: u64,
    max_records: usize,
    max_bytes: u64,
}

impl Batch {
    fn new(max_records: usize, max_bytes: u64) -> Self {
        let max_records = if max_records == 0 { DEFAULT_BATCH_SIZE } else { max_records };
        let max_bytes = if max_bytes == 0 { DEFAULT_BATCH_BYTES } else { max_bytes };
        Self {
            records: Vec::new(),
            bytes: 0,
            max_records,
            max_bytes,
        }
    }

    /// Append a record. Returns true when the batch should be flushed.
    fn push(&mut self, msg: OutboundMessage) -> bool {
        self.bytes += msg.payload.len() as u64;
        self.records.push(msg);
        self.records.len() >= self.max_records || self.bytes >= self.max_bytes
    }

    /// Publish pending records. They leave the batch before the call, so a
    /// failed publish is never retried by a later flush.
    async fn flush(&mut self, producer: &dyn Producer, stats: &mut ReplayStats) -> Result<(), EngineError> {
        if self.records.is_empty() {
            return Ok(());
        }
        let records = std::mem::take(&mut self.records);
        let bytes = std::mem::replace(&mut self.bytes, 0);

        producer
            .publish(&records)
            .await
            .map_err(|e| EngineError::from(e).with_context("failed to write batch"))?;

        stats.messages += records.len() as u64;
        tracing::debug!(records = records.len(), bytes, "batch published");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

struct Session {
    rate: Option<u32>,
    loop_forever: bool,
    progress: Option<Box<dyn ProgressReporter>>,
    log: Option<Box<dyn Write + Send>>,
    file_size: u64,
    batch: Batch,
    stats: ReplayStats,
}

impl Session {
    fn new(config: ReplayConfig) -> Self {
        Self {
            rate: config.rate.filter(|r| *r > 0),
            loop_forever: config.loop_forever,
            progress: config.progress,
            log: config.log,
            file_size: 0,
            batch: Batch::new(config.max_batch_size, config.max_batch_bytes),
            stats: ReplayStats::default(),
        }
    }

    /// Size the progress bar. The file is only measured when someone watches.
    fn begin<R: Read + Seek>(&mut self, reader: &mut MessageFileReader<R>) -> Result<(), EngineError> {
        if let Some(p) = self.progress.as_mut() {
            self.file_size = reader.size().map_err(|e| e.with_context("failed to get file size"))?;
            p.set_total(self.file_size);
        }
        Ok(())
    }

    async fn run<R: Read + Seek>(
        &mut self,
        reader: &mut MessageFileReader<R>,
        producer: &dyn Producer,
        token: &CancellationToken,
    ) -> Result<(), EngineError> {
        let mut ticker = self.rate.map(rate_limiter);
        let mut pass_bytes = 0u64;
        let mut pass_records = 0u64;

        loop {
            let Some(msg) = reader.read_next(token)? else {
                self.batch.flush(producer, &mut self.stats).await?;
                if self.file_size > 0 {
                    self.set_progress(self.file_size);
                }

                if !self.loop_forever {
                    return Ok(());
                }
                if pass_records == 0 {
                    tracing::warn!("recording holds no messages, not looping");
                    return Ok(());
                }

                reader.reset().map_err(|e| e.with_context("failed to reset file"))?;
                self.stats.loops += 1;
                pass_bytes = 0;
                pass_records = 0;
                self.set_progress(0);
                self.announce_loop();
                continue;
            };

            let frame_len = (HEADER_SIZE + msg.len()) as u64;
            pass_bytes += frame_len;
            pass_records += 1;
            self.stats.bytes_read += frame_len;
            self.set_progress(pass_bytes);

            if let Some(ticker) = ticker.as_mut() {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(EngineError::Cancelled),
                    _ = ticker.tick() => {}
                }
            }

            if self.batch.push(OutboundMessage::from(msg)) {
                self.batch.flush(producer, &mut self.stats).await?;
            }
        }
    }

    async fn finish(&mut self, producer: &dyn Producer, result: Result<(), EngineError>) -> Result<(), EngineError> {
        let flushed = self.batch.flush(producer, &mut self.stats).await;

        if let Some(p) = self.progress.as_mut() {
            if let Err(e) = p.close() {
                tracing::warn!(error = %e, "failed to close progress reporter");
            }
        }

        match (result, flushed) {
            (Ok(()), flushed) => flushed,
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(flush_err)) => {
                tracing::warn!(error = %flush_err, "final batch flush failed");
                Err(e)
            }
        }
    }

    fn set_progress(&mut self, current: u64) {
        if let Some(p) = self.progress.as_mut() {
            p.set(current);
        }
    }

    fn announce_loop(&mut self) {
        let iteration = self.stats.loops + 1;
        tracing::info!(iteration, "looping: restarting from beginning");
        if let Some(log) = self.log.as_mut() {
            if let Err(e) = writeln!(log, "Looping: restarting from beginning (iteration {iteration})") {
                tracing::warn!(error = %e, "failed to write loop notice");
            }
        }
    }
}

/// One tick per admitted record. The first tick is immediate.
fn rate_limiter(rate: u32) -> Interval {
    let mut interval = tokio::time::interval(Duration::from_secs(1) / rate);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::io::Cursor;
    use std::pin::Pin;
    use std::sync::Arc;

    use chrono::{DateTime, TimeZone, Utc};
    use replay_api::error::ClientError;
    use replay_api::time::FixedClock;

    use crate::codec::encode_frame;
    use crate::testing::{CollectingProducer, ProgressEvent, ProgressLog, SharedBuf};

    fn recorded_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 59).unwrap()
    }

    fn recording(payloads: &[&[u8]]) -> MessageFileReader<Cursor<Vec<u8>>> {
        let mut buf = Vec::new();
        for p in payloads {
            encode_frame(&mut buf, recorded_at(), p).unwrap();
        }
        MessageFileReader::new(Cursor::new(buf), true, Arc::new(FixedClock(Utc::now())))
    }

    /// Cancels the run once `after` batches have been accepted.
    struct CancelAfter {
        inner: CollectingProducer,
        token: CancellationToken,
        after: usize,
    }

    impl Producer for CancelAfter {
        fn publish<'a>(
            &'a self,
            batch: &'a [OutboundMessage],
        ) -> Pin<Box<dyn Future<Output = Result<(), ClientError>> + Send + 'a>> {
            Box::pin(async move {
                self.inner.publish(batch).await?;
                if self.inner.batches().len() >= self.after {
                    self.token.cancel();
                }
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn batch_size_one_publishes_each_record_in_order() {
        let token = CancellationToken::new();
        let producer = CollectingProducer::default();
        let mut reader = recording(&[b"first", b"second"]);
        let config = ReplayConfig {
            max_batch_size: 1,
            ..ReplayConfig::default()
        };

        let stats = replay(&mut reader, &producer, config, &token).await.unwrap();

        let batches = producer.batches();
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| b.len() == 1));
        assert_eq!(producer.payloads(), vec![b"first".to_vec(), b"second".to_vec()]);
        assert!(batches.iter().flatten().all(|m| m.timestamp == recorded_at()));
        assert_eq!(stats.messages, 2);
        assert_eq!(stats.loops, 0);
    }

    #[tokio::test]
    async fn count_threshold_caps_batch_length() {
        let token = CancellationToken::new();
        let producer = CollectingProducer::default();
        let mut reader = recording(&[b"a", b"b", b"c", b"d", b"e"]);
        let config = ReplayConfig {
            max_batch_size: 2,
            ..ReplayConfig::default()
        };

        replay(&mut reader, &producer, config, &token).await.unwrap();

        let lens: Vec<_> = producer.batches().iter().map(Vec::len).collect();
        assert_eq!(lens, vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn byte_threshold_flushes_early() {
        let token = CancellationToken::new();
        let producer = CollectingProducer::default();
        let mut reader = recording(&[b"aaaa", b"bbbb", b"cccc", b"dddd"]);
        let config = ReplayConfig {
            max_batch_bytes: 10,
            ..ReplayConfig::default()
        };

        let stats = replay(&mut reader, &producer, config, &token).await.unwrap();

        let lens: Vec<_> = producer.batches().iter().map(Vec::len).collect();
        assert_eq!(lens, vec![3, 1]);
        assert_eq!(stats.messages, 4);
        assert_eq!(stats.bytes_read, (4 * (HEADER_SIZE + 4)) as u64);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_spaces_out_records() {
        let token = CancellationToken::new();
        let producer = CollectingProducer::default();
        let mut reader = recording(&[b"1", b"2", b"3", b"4", b"5"]);
        let config = ReplayConfig {
            rate: Some(10),
            ..ReplayConfig::default()
        };

        let start = tokio::time::Instant::now();
        let stats = replay(&mut reader, &producer, config, &token).await.unwrap();
        let elapsed = start.elapsed();

        assert_eq!(stats.messages, 5);
        assert!(elapsed >= Duration::from_millis(400), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(500), "{elapsed:?}");
    }

    #[tokio::test]
    async fn looping_rewinds_and_resets_progress() {
        let token = CancellationToken::new();
        let progress = ProgressLog::default();
        let notices = SharedBuf::default();
        let producer = CancelAfter {
            inner: CollectingProducer::default(),
            token: token.clone(),
            after: 3,
        };
        let mut reader = recording(&[b"a", b"bb"]);
        let config = ReplayConfig {
            loop_forever: true,
            max_batch_size: 1,
            progress: Some(progress.boxed()),
            log: Some(Box::new(notices.clone())),
            ..ReplayConfig::default()
        };

        let aborted = replay(&mut reader, &producer, config, &token).await.unwrap_err();

        assert!(aborted.is_cancelled());
        assert_eq!(aborted.stats.messages, 3);
        assert_eq!(aborted.stats.loops, 1);
        assert_eq!(producer.inner.payloads(), vec![b"a".to_vec(), b"bb".to_vec(), b"a".to_vec()]);

        let first = (HEADER_SIZE + 1) as u64;
        let total = first + (HEADER_SIZE + 2) as u64;
        assert_eq!(aborted.stats.bytes_read, total + first);
        assert_eq!(
            progress.events(),
            vec![
                ProgressEvent::Total(total),
                ProgressEvent::Set(first),
                ProgressEvent::Set(total),
                ProgressEvent::Set(total),
                ProgressEvent::Set(0),
                ProgressEvent::Set(first),
                ProgressEvent::Close,
            ]
        );
        assert_eq!(notices.text(), "Looping: restarting from beginning (iteration 2)\n");
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_flushes_pending_batch() {
        let token = CancellationToken::new();
        let producer = CollectingProducer::default();
        let mut reader = recording(&[b"r0", b"r1", b"r2", b"r3", b"r4"]);
        let config = ReplayConfig {
            rate: Some(10),
            ..ReplayConfig::default()
        };

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(250)).await;
            canceller.cancel();
        });

        let aborted = replay(&mut reader, &producer, config, &token).await.unwrap_err();

        assert!(aborted.is_cancelled());
        // r3 was waiting on the rate limiter and never joined the batch.
        assert_eq!(producer.payloads(), vec![b"r0".to_vec(), b"r1".to_vec(), b"r2".to_vec()]);
        assert_eq!(aborted.stats.messages, 3);
    }

    #[tokio::test]
    async fn corrupt_frame_is_fatal_even_when_looping() {
        let token = CancellationToken::new();
        let producer = CollectingProducer::default();
        let mut buf = Vec::new();
        encode_frame(&mut buf, recorded_at(), b"good").unwrap();
        let mut tail = Vec::new();
        encode_frame(&mut tail, recorded_at(), b"cut short").unwrap();
        buf.extend_from_slice(&tail[..HEADER_SIZE + 2]);

        let mut reader = MessageFileReader::new(Cursor::new(buf), true, Arc::new(FixedClock(recorded_at())));
        let config = ReplayConfig {
            loop_forever: true,
            ..ReplayConfig::default()
        };

        let aborted = replay(&mut reader, &producer, config, &token).await.unwrap_err();

        assert!(aborted.error.is_corrupt());
        assert_eq!(aborted.stats.loops, 0);
        assert_eq!(producer.payloads(), vec![b"good".to_vec()]);
        assert_eq!(aborted.stats.messages, 1);
    }

    #[tokio::test]
    async fn producer_failure_stops_the_run() {
        let token = CancellationToken::new();
        let producer = CollectingProducer::failing_from(2);
        let mut reader = recording(&[b"ok", b"lost", b"never read"]);
        let config = ReplayConfig {
            max_batch_size: 1,
            ..ReplayConfig::default()
        };

        let aborted = replay(&mut reader, &producer, config, &token).await.unwrap_err();

        assert!(matches!(aborted.error, EngineError::Client(_)));
        assert!(aborted.error.to_string().contains("failed to write batch"));
        assert_eq!(aborted.stats.messages, 1);
        assert_eq!(producer.payloads(), vec![b"ok".to_vec()]);
        assert_eq!(reader.messages_read(), 2);
    }

    #[tokio::test]
    async fn looping_over_empty_recording_stops() {
        let token = CancellationToken::new();
        let producer = CollectingProducer::default();
        let mut reader = recording(&[]);
        let config = ReplayConfig {
            loop_forever: true,
            ..ReplayConfig::default()
        };

        let stats = replay(&mut reader, &producer, config, &token).await.unwrap();

        assert_eq!(stats, ReplayStats::default());
        assert!(producer.batches().is_empty());
    }

    #[tokio::test]
    async fn zero_thresholds_fall_back_to_defaults() {
        let token = CancellationToken::new();
        let producer = CollectingProducer::default();
        let payloads: Vec<Vec<u8>> = (0..150u8).map(|i| vec![i]).collect();
        let refs: Vec<&[u8]> = payloads.iter().map(Vec::as_slice).collect();
        let mut reader = recording(&refs);
        let config = ReplayConfig {
            max_batch_size: 0,
            max_batch_bytes: 0,
            ..ReplayConfig::default()
        };

        replay(&mut reader, &producer, config, &token).await.unwrap();

        let lens: Vec<_> = producer.batches().iter().map(Vec::len).collect();
        assert_eq!(lens, vec![DEFAULT_BATCH_SIZE, 50]);
    }
}
