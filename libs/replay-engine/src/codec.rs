//! Binary encode/decode for the recording format.
//!
//! A recording is a bare sequence of frames. Each frame is a fixed 35-byte
//! header (27-byte ASCII timestamp + big-endian `u64` payload length)
//! followed by the payload. There is no file header, index or checksum, so
//! the only corruption signals are an implausible length and a short read.

use std::io::{self, Read, Write};

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::EngineError;

/// Timestamp layout written into every frame. Always renders to exactly
/// [`TIMESTAMP_SIZE`] bytes for years 0000..=9999.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";
/// Accepts any number of fractional digits when parsing.
const TIMESTAMP_PARSE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

pub const TIMESTAMP_SIZE: usize = 27;
pub const SIZE_FIELD_SIZE: usize = 8;
pub const HEADER_SIZE: usize = TIMESTAMP_SIZE + SIZE_FIELD_SIZE;

/// Largest payload a frame may declare. Anything above is treated as a
/// corrupt length field.
pub const MAX_PAYLOAD_SIZE: u64 = 100 * 1024 * 1024;

/// One decoded frame, timestamp still in its on-disk form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub timestamp: [u8; TIMESTAMP_SIZE],
    pub payload: Vec<u8>,
}

impl Frame {
    /// Parse the stored timestamp. `None` if the field is not a valid
    /// timestamp; callers decide what to substitute.
    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        let text = std::str::from_utf8(&self.timestamp).ok()?;
        NaiveDateTime::parse_from_str(text, TIMESTAMP_PARSE_FORMAT)
            .ok()
            .map(|naive| naive.and_utc())
    }

    /// Bytes this frame occupies in the file.
    pub fn encoded_len(&self) -> u64 {
        (HEADER_SIZE + self.payload.len()) as u64
    }
}

// ── Encode ──────────────────────────────────────────────────────

/// Render a timestamp into the fixed-width frame field.
pub fn encode_timestamp(ts: DateTime<Utc>) -> [u8; TIMESTAMP_SIZE] {
    let text = ts.format(TIMESTAMP_FORMAT).to_string();
    debug_assert_eq!(text.len(), TIMESTAMP_SIZE, "timestamp out of range: {text}");
    let mut buf = [0u8; TIMESTAMP_SIZE];
    let n = text.len().min(TIMESTAMP_SIZE);
    buf[..n].copy_from_slice(&text.as_bytes()[..n]);
    buf
}

/// Write one frame. Returns the number of bytes written.
pub fn encode_frame(w: &mut dyn Write, timestamp: DateTime<Utc>, payload: &[u8]) -> Result<u64, EngineError> {
    let mut header = [0u8; HEADER_SIZE];
    header[..TIMESTAMP_SIZE].copy_from_slice(&encode_timestamp(timestamp));
    header[TIMESTAMP_SIZE..].copy_from_slice(&(payload.len() as u64).to_be_bytes());

    w.write_all(&header)?;
    w.write_all(payload)?;
    Ok((HEADER_SIZE + payload.len()) as u64)
}

// ── Decode ──────────────────────────────────────────────────────

/// Read the next frame.
///
/// - `Ok(None)`: clean end of stream (no bytes left at a frame boundary).
/// - `Err(CorruptFrame)`: truncated header, truncated payload or a length
///   above [`MAX_PAYLOAD_SIZE`]. In the last case no payload bytes are read.
///
/// `position` is the byte offset of the frame start; it only feeds error
/// messages.
pub fn decode_frame(r: &mut dyn Read, position: u64) -> Result<Option<Frame>, EngineError> {
    // Read the header by hand to tell a clean EOF (zero bytes) from a
    // truncated header (1..35 bytes).
    let mut header = [0u8; HEADER_SIZE];
    let mut filled = 0;
    while filled < HEADER_SIZE {
        match r.read(&mut header[filled..]) {
            Ok(0) => {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(EngineError::CorruptFrame {
                    offset: position,
                    detail: format!("truncated frame header: got {filled} of {HEADER_SIZE} bytes"),
                });
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(EngineError::Io(e)),
        }
    }

    let mut timestamp = [0u8; TIMESTAMP_SIZE];
    timestamp.copy_from_slice(&header[..TIMESTAMP_SIZE]);
    let mut size_buf = [0u8; SIZE_FIELD_SIZE];
    size_buf.copy_from_slice(&header[TIMESTAMP_SIZE..]);
    let size = u64::from_be_bytes(size_buf);

    if size > MAX_PAYLOAD_SIZE {
        return Err(EngineError::CorruptFrame {
            offset: position,
            detail: format!("invalid message size: {size} bytes (max {MAX_PAYLOAD_SIZE})"),
        });
    }

    let mut payload = Vec::new();
    (&mut *r).take(size).read_to_end(&mut payload)?;
    if (payload.len() as u64) < size {
        return Err(EngineError::CorruptFrame {
            offset: position,
            detail: format!("truncated payload: got {} of {size} bytes", payload.len()),
        });
    }

    Ok(Some(Frame { timestamp, payload }))
}
