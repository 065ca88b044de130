//! Record/replay engines for partitioned-log traffic.
//!
//! - [`codec`] defines the on-disk frame: a 27-byte UTC timestamp, an 8-byte
//!   big-endian length and the payload.
//! - [`reader::MessageFileReader`] decodes a recording sequentially and can
//!   rewind for looped playback.
//! - [`record::record`] drains a consumer into a recording.
//! - [`replay::replay`] drains a recording into a producer with batching,
//!   optional rate limiting and looping.
//! - [`info::collect_info`] assembles a cluster topology snapshot.
//!
//! # Format
//!
//! ```text
//! [timestamp: 27 bytes "YYYY-MM-DDTHH:MM:SS.ssssssZ"] [size: u64 BE] [payload: size bytes]
//! ... repeated until EOF, no file header, no index
//! ```

pub mod codec;
pub mod error;
pub mod info;
pub mod reader;
pub mod record;
pub mod replay;

#[cfg(test)]
mod testing;

pub use error::{Aborted, EngineError};
pub use reader::MessageFileReader;
pub use record::{RecordConfig, RecordStats};
pub use replay::{ReplayConfig, ReplayStats};
