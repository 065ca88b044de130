//! Sequential reader over a recording.
//!
//! [`MessageFileReader`] decodes frames from any `Read + Seek` source and
//! applies the timestamp policy (stored time vs. decode time). Seeking is
//! only used to measure the source and to rewind for looped playback.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use replay_api::record::RecordedMessage;
use replay_api::time::TimeProvider;

use crate::codec::decode_frame;
use crate::error::EngineError;

/// Reads recorded messages from a byte source.
///
/// Generic over `R: Read + Seek` so tests can use `Cursor<Vec<u8>>` and
/// production code can use `BufReader<File>`.
pub struct MessageFileReader<R: Read + Seek> {
    reader: R,
    preserve_timestamps: bool,
    time: Arc<dyn TimeProvider>,
    /// Offset of the next frame, relative to where the reader started.
    position: u64,
    messages_read: u64,
}

impl MessageFileReader<BufReader<File>> {
    /// Open a recording file for reading.
    pub fn open(
        path: impl AsRef<Path>,
        preserve_timestamps: bool,
        time: Arc<dyn TimeProvider>,
    ) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| EngineError::from(e).with_context(path.display()))?;
        Ok(Self::new(BufReader::new(file), preserve_timestamps, time))
    }
}

impl<R: Read + Seek> MessageFileReader<R> {
    pub fn new(reader: R, preserve_timestamps: bool, time: Arc<dyn TimeProvider>) -> Self {
        Self {
            reader,
            preserve_timestamps,
            time,
            position: 0,
            messages_read: 0,
        }
    }

    /// Decode the next message, or `None` at a clean end of file.
    ///
    /// Checks `token` before touching the source. With timestamp
    /// preservation on, an unparseable stored timestamp falls back to the
    /// time provider instead of failing the read.
    pub fn read_next(&mut self, token: &CancellationToken) -> Result<Option<RecordedMessage>, EngineError> {
        if token.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let Some(frame) = decode_frame(&mut self.reader, self.position)? else {
            return Ok(None);
        };
        self.position += frame.encoded_len();
        self.messages_read += 1;

        let timestamp = if self.preserve_timestamps {
            frame.parsed_timestamp().unwrap_or_else(|| {
                tracing::debug!(offset = self.position, "unparseable frame timestamp, using current time");
                self.time.now()
            })
        } else {
            self.time.now()
        };

        Ok(Some(RecordedMessage::new(frame.payload, timestamp)))
    }

    /// Rewind to the beginning of the source.
    pub fn reset(&mut self) -> Result<(), EngineError> {
        self.reader.seek(SeekFrom::Start(0))?;
        self.position = 0;
        Ok(())
    }

    /// Total size of the source in bytes. The read position is restored.
    pub fn size(&mut self) -> Result<u64, EngineError> {
        let current = self
            .reader
            .stream_position()
            .map_err(|e| EngineError::from(e).with_context("failed to get current position"))?;
        let end = self
            .reader
            .seek(SeekFrom::End(0))
            .map_err(|e| EngineError::from(e).with_context("failed to seek to end"))?;
        self.reader
            .seek(SeekFrom::Start(current))
            .map_err(|e| EngineError::from(e).with_context("failed to restore position"))?;
        Ok(end)
    }

    /// Messages decoded so far, across resets.
    pub fn messages_read(&self) -> u64 {
        self.messages_read
    }

    /// Consume the reader and return the underlying source.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{encode_frame, HEADER_SIZE, TIMESTAMP_SIZE};
    use chrono::{DateTime, TimeZone, Utc};
    use replay_api::time::FixedClock;
    use std::io::Cursor;

    fn recorded_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 11, 5, 8, 0, 0).unwrap()
    }

    fn decode_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()
    }

    fn recording(payloads: &[&[u8]]) -> Vec<u8> {
        let mut buf = Vec::new();
        for p in payloads {
            encode_frame(&mut buf, recorded_at(), p).unwrap();
        }
        buf
    }

    fn reader(buf: Vec<u8>, preserve: bool) -> MessageFileReader<Cursor<Vec<u8>>> {
        MessageFileReader::new(Cursor::new(buf), preserve, Arc::new(FixedClock(decode_time())))
    }

    #[test]
    fn reads_frames_in_order_then_eof() {
        let token = CancellationToken::new();
        let mut r = reader(recording(&[b"a", b"bb", b"ccc"]), true);

        let mut got = Vec::new();
        while let Some(msg) = r.read_next(&token).unwrap() {
            got.push(msg.data);
        }
        assert_eq!(got, vec![b"a".to_vec(), b"bb".to_vec(), b"ccc".to_vec()]);
        assert_eq!(r.messages_read(), 3);
        // EOF is sticky.
        assert!(r.read_next(&token).unwrap().is_none());
    }

    #[test]
    fn timestamp_policy() {
        let token = CancellationToken::new();

        let mut preserved = reader(recording(&[b"x"]), true);
        assert_eq!(preserved.read_next(&token).unwrap().unwrap().timestamp, recorded_at());

        let mut restamped = reader(recording(&[b"x"]), false);
        assert_eq!(restamped.read_next(&token).unwrap().unwrap().timestamp, decode_time());
    }

    #[test]
    fn bad_stored_timestamp_falls_back_to_clock() {
        let token = CancellationToken::new();
        let mut buf = recording(&[b"x", b"y"]);
        buf[..TIMESTAMP_SIZE].copy_from_slice(&[b'?'; TIMESTAMP_SIZE]);

        let mut r = reader(buf, true);
        let first = r.read_next(&token).unwrap().unwrap();
        assert_eq!(first.data, b"x");
        assert_eq!(first.timestamp, decode_time());
        // The stream keeps going after the fallback.
        assert_eq!(r.read_next(&token).unwrap().unwrap().timestamp, recorded_at());
    }

    #[test]
    fn cancelled_token_stops_before_reading() {
        let token = CancellationToken::new();
        token.cancel();
        let mut r = reader(recording(&[b"x"]), false);
        assert!(r.read_next(&token).unwrap_err().is_cancelled());
        assert_eq!(r.messages_read(), 0);
        assert_eq!(r.into_inner().position(), 0);
    }

    #[test]
    fn reset_returns_to_first_record() {
        let token = CancellationToken::new();
        let mut r = reader(recording(&[b"first", b"second"]), false);
        while r.read_next(&token).unwrap().is_some() {}

        r.reset().unwrap();
        assert_eq!(r.read_next(&token).unwrap().unwrap().data, b"first");
    }

    #[test]
    fn size_does_not_move_the_cursor() {
        let token = CancellationToken::new();
        let buf = recording(&[b"abc", b"defg"]);
        let total = buf.len() as u64;
        let mut r = reader(buf, false);

        assert_eq!(r.read_next(&token).unwrap().unwrap().data, b"abc");
        assert_eq!(r.size().unwrap(), total);
        assert_eq!(r.read_next(&token).unwrap().unwrap().data, b"defg");
    }

    #[test]
    fn corrupt_frame_reports_its_offset() {
        let token = CancellationToken::new();
        let mut buf = recording(&[b"ok"]);
        buf.extend_from_slice(&recording(&[b"truncated"])[..HEADER_SIZE + 3]);

        let mut r = reader(buf, false);
        r.read_next(&token).unwrap().unwrap();
        match r.read_next(&token).unwrap_err() {
            EngineError::CorruptFrame { offset, .. } => assert_eq!(offset, (HEADER_SIZE + 2) as u64),
            other => panic!("expected CorruptFrame, got {other:?}"),
        }
    }

    #[test]
    fn open_reads_from_disk() {
        let token = CancellationToken::new();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, &recording(&[b"on disk"])).unwrap();

        let mut r = MessageFileReader::open(file.path(), true, Arc::new(FixedClock(decode_time()))).unwrap();
        let msg = r.read_next(&token).unwrap().unwrap();
        assert_eq!(msg.data, b"on disk");
        assert_eq!(msg.timestamp, recorded_at());
    }
}
