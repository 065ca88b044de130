use std::future::Future;
use std::pin::Pin;

use crate::cluster::{BrokerMetadata, PartitionMetadata};
use crate::error::ClientError;
use crate::record::OutboundMessage;

/// Outcome of a single consumer poll.
///
/// `Idle` means "nothing right now", not "stream finished": a live topic can
/// pause and resume at any time, so callers keep polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Poll {
    Message(Vec<u8>),
    Idle,
}

/// Source of raw messages from one topic partition.
///
/// Reading advances the consumer's position; committing that position is the
/// implementation's business.
pub trait Consumer: Send {
    /// Fetch the next message.
    ///
    /// The returned future must be cancel-safe: callers drop it when the run
    /// is cancelled, and no message may be lost or committed in that case.
    fn read_next(&mut self) -> Pin<Box<dyn Future<Output = Result<Poll, ClientError>> + Send + '_>>;

    /// Move the read position to an absolute offset.
    fn set_offset(&mut self, offset: i64) -> Result<(), ClientError>;
}

/// Publisher of message batches to a topic.
pub trait Producer: Send + Sync {
    /// Publish a batch. Either the whole batch is accepted or an error is
    /// returned; partial acceptance must be reported as an error.
    fn publish<'a>(
        &'a self,
        batch: &'a [OutboundMessage],
    ) -> Pin<Box<dyn Future<Output = Result<(), ClientError>> + Send + 'a>>;
}

/// Opens metadata sessions against a single broker address.
pub trait MetadataConnector: Send + Sync {
    #[allow(clippy::type_complexity)]
    fn connect<'a>(
        &'a self,
        address: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn MetadataSession>, ClientError>> + Send + 'a>>;
}

/// A live connection able to answer cluster metadata queries.
pub trait MetadataSession: Send {
    /// All brokers known to the cluster.
    fn brokers(&mut self) -> Pin<Box<dyn Future<Output = Result<Vec<BrokerMetadata>, ClientError>> + Send + '_>>;

    /// Every partition of every topic.
    fn partitions(&mut self) -> Pin<Box<dyn Future<Output = Result<Vec<PartitionMetadata>, ClientError>> + Send + '_>>;
}
