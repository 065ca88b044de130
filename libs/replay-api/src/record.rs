use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message decoded from a recording file.
///
/// `data` is opaque; neither the reader nor the replay engine interpret it.
/// `timestamp` is either the time stored in the frame or the decode time,
/// depending on how the reader was configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedMessage {
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    pub timestamp: DateTime<Utc>,
}

impl RecordedMessage {
    pub fn new(data: Vec<u8>, timestamp: DateTime<Utc>) -> Self {
        Self { data, timestamp }
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A message handed to a [`Producer`](crate::client::Producer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub payload: Vec<u8>,
    pub timestamp: DateTime<Utc>,
}

impl From<RecordedMessage> for OutboundMessage {
    fn from(msg: RecordedMessage) -> Self {
        Self {
            payload: msg.data,
            timestamp: msg.timestamp,
        }
    }
}

/// Base64 for binary payloads in JSON output.
mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(s)
            .map_err(serde::de::Error::custom)
    }
}

/// Lossy UTF-8 preview of a payload, for human-readable output.
pub fn preview(data: &[u8], max: usize) -> String {
    if std::str::from_utf8(data).is_ok() {
        let text = String::from_utf8_lossy(data);
        if text.chars().count() > max {
            let cut: String = text.chars().take(max).collect();
            return format!("{cut}…");
        }
        return text.into_owned();
    }
    let encoded = base64::engine::general_purpose::STANDARD.encode(data);
    if encoded.len() > max {
        format!("base64:{}…", &encoded[..max])
    } else {
        format!("base64:{encoded}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn json_encodes_data_as_base64() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let msg = RecordedMessage::new(b"hello".to_vec(), ts);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["data"], "aGVsbG8=");
        assert_eq!(json["timestamp"], "2024-01-02T03:04:05Z");

        let back: RecordedMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn preview_truncates_text_and_marks_binary() {
        assert_eq!(preview(b"abcdef", 3), "abc…");
        assert_eq!(preview(b"abc", 10), "abc");
        assert_eq!(preview(&[0xff, 0xfe], 10), "base64://4=");
    }
}
