//! rdkafka-backed collaborators.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, Consumer as _, StreamConsumer};
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::{Message, Offset, TopicPartitionList};

use replay_api::client::{Consumer, MetadataConnector, MetadataSession, Poll, Producer};
use replay_api::cluster::{BrokerMetadata, PartitionMetadata};
use replay_api::error::ClientError;
use replay_api::record::OutboundMessage;

use super::ConsumerOptions;

const METADATA_TIMEOUT: Duration = Duration::from_secs(10);
const QUEUE_TIMEOUT: Duration = Duration::from_secs(30);

fn client_config(bootstrap: impl Into<String>) -> ClientConfig {
    let mut config = ClientConfig::new();
    config.set("bootstrap.servers", bootstrap);
    config
}

fn kafka_error(ctx: impl fmt::Display, e: KafkaError) -> ClientError {
    ClientError::io(format!("{ctx}: {e}"))
}

// ---------------------------------------------------------------------------
// Consumer
// ---------------------------------------------------------------------------

/// Reads one partition through a manual assignment.
pub struct KafkaConsumer {
    consumer: StreamConsumer,
    topic: String,
    partition: i32,
}

impl KafkaConsumer {
    pub fn new(brokers: &[String], opts: &ConsumerOptions<'_>) -> Result<Self, ClientError> {
        let reset = if opts.from_beginning { "earliest" } else { "latest" };
        let consumer: StreamConsumer = client_config(brokers.join(","))
            .set("group.id", opts.group_id)
            .set("enable.partition.eof", "true")
            .set("auto.offset.reset", reset)
            .create()
            .map_err(|e| kafka_error("create consumer", e))?;

        let this = Self {
            consumer,
            topic: opts.topic.to_string(),
            partition: opts.partition,
        };
        let start = if opts.from_beginning { Offset::Beginning } else { Offset::Stored };
        this.assign(start)?;
        tracing::debug!(topic = %this.topic, partition = this.partition, ?start, "consumer assigned");
        Ok(this)
    }

    fn assign(&self, offset: Offset) -> Result<(), ClientError> {
        let mut assignment = TopicPartitionList::new();
        assignment
            .add_partition_offset(&self.topic, self.partition, offset)
            .map_err(|e| kafka_error("build assignment", e))?;
        self.consumer
            .assign(&assignment)
            .map_err(|e| kafka_error(format!("assign {}/{}", self.topic, self.partition), e))
    }
}

impl Consumer for KafkaConsumer {
    fn read_next(&mut self) -> Pin<Box<dyn Future<Output = Result<Poll, ClientError>> + Send + '_>> {
        Box::pin(async move {
            match self.consumer.recv().await {
                Ok(msg) => Ok(Poll::Message(msg.payload().map(<[u8]>::to_vec).unwrap_or_default())),
                Err(KafkaError::PartitionEOF(_)) => Ok(Poll::Idle),
                Err(e) => Err(kafka_error("receive", e)),
            }
        })
    }

    fn set_offset(&mut self, offset: i64) -> Result<(), ClientError> {
        self.assign(Offset::Offset(offset))
    }
}

// ---------------------------------------------------------------------------
// Producer
// ---------------------------------------------------------------------------

pub struct KafkaProducer {
    producer: FutureProducer,
    topic: String,
}

impl KafkaProducer {
    pub fn new(brokers: &[String], topic: &str) -> Result<Self, ClientError> {
        let producer: FutureProducer = client_config(brokers.join(","))
            .create()
            .map_err(|e| kafka_error("create producer", e))?;
        Ok(Self {
            producer,
            topic: topic.to_string(),
        })
    }
}

impl Producer for KafkaProducer {
    /// Enqueue every message, then wait for all deliveries.
    fn publish<'a>(
        &'a self,
        batch: &'a [OutboundMessage],
    ) -> Pin<Box<dyn Future<Output = Result<(), ClientError>> + Send + 'a>> {
        Box::pin(async move {
            let deliveries = batch.iter().map(|m| {
                let record = FutureRecord::<(), [u8]>::to(&self.topic)
                    .payload(m.payload.as_slice())
                    .timestamp(m.timestamp.timestamp_millis());
                self.producer.send(record, QUEUE_TIMEOUT)
            });
            futures::future::try_join_all(deliveries)
                .await
                .map_err(|(e, _)| kafka_error(format!("publish to '{}'", self.topic), e))?;
            Ok(())
        })
    }
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Opens a metadata snapshot per address. rdkafka's metadata call blocks, so
/// it runs on the blocking pool.
#[derive(Debug, Default)]
pub struct KafkaMetadata;

struct Snapshot {
    brokers: Vec<BrokerMetadata>,
    partitions: Vec<PartitionMetadata>,
}

impl MetadataConnector for KafkaMetadata {
    fn connect<'a>(
        &'a self,
        address: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn MetadataSession>, ClientError>> + Send + 'a>> {
        let address = address.to_string();
        Box::pin(async move {
            let snapshot = blocking(move || fetch_snapshot(&address)).await?;
            Ok(Box::new(snapshot) as Box<dyn MetadataSession>)
        })
    }
}

impl MetadataSession for Snapshot {
    fn brokers(&mut self) -> Pin<Box<dyn Future<Output = Result<Vec<BrokerMetadata>, ClientError>> + Send + '_>> {
        Box::pin(async move { Ok(self.brokers.clone()) })
    }

    fn partitions(&mut self) -> Pin<Box<dyn Future<Output = Result<Vec<PartitionMetadata>, ClientError>> + Send + '_>> {
        Box::pin(async move { Ok(self.partitions.clone()) })
    }
}

fn fetch_snapshot(address: &str) -> Result<Snapshot, ClientError> {
    let consumer: BaseConsumer = client_config(address)
        .create()
        .map_err(|e| kafka_error("create metadata client", e))?;
    let metadata = consumer
        .fetch_metadata(None, METADATA_TIMEOUT)
        .map_err(|e| kafka_error(format!("fetch metadata from '{address}'"), e))?;

    let brokers = metadata
        .brokers()
        .iter()
        .map(|b| {
            Ok(BrokerMetadata {
                id: b.id(),
                host: b.host().to_string(),
                port: broker_port(b.id(), b.port())?,
            })
        })
        .collect::<Result<Vec<_>, ClientError>>()?;

    let partitions = metadata
        .topics()
        .iter()
        .flat_map(|t| {
            t.partitions().iter().map(|p| PartitionMetadata {
                topic: t.name().to_string(),
                id: p.id(),
                leader: p.leader(),
                replicas: p.replicas().to_vec(),
                isr: p.isr().to_vec(),
            })
        })
        .collect();

    Ok(Snapshot { brokers, partitions })
}

fn broker_port(id: i32, port: i32) -> Result<u16, ClientError> {
    u16::try_from(port).map_err(|_| ClientError::format(format!("broker {id} reports invalid port {port}")))
}

async fn blocking<T, F>(f: F) -> Result<T, ClientError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ClientError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ClientError::logic(format!("metadata task: {e}")))?
}

// ---------------------------------------------------------------------------
// Topic management
// ---------------------------------------------------------------------------

/// Create a single-partition topic. An existing topic is fine.
pub async fn create_topic(brokers: &[String], topic: &str) -> Result<(), ClientError> {
    let admin: AdminClient<DefaultClientContext> = client_config(brokers.join(","))
        .create()
        .map_err(|e| kafka_error("create admin client", e))?;
    let new_topic = NewTopic::new(topic, 1, TopicReplication::Fixed(1));

    let results = admin
        .create_topics([&new_topic], &AdminOptions::new())
        .await
        .map_err(|e| kafka_error(format!("create topic '{topic}'"), e))?;

    for result in results {
        match result {
            Ok(name) => tracing::info!(topic = %name, "topic created"),
            Err((name, RDKafkaErrorCode::TopicAlreadyExists)) => tracing::debug!(topic = %name, "topic already exists"),
            Err((name, code)) => return Err(ClientError::io(format!("create topic '{name}': {code}"))),
        }
    }
    Ok(())
}

/// Fail unless `topic` exists with at least one partition.
pub async fn ensure_topic(brokers: &[String], topic: &str) -> Result<(), ClientError> {
    let bootstrap = brokers.join(",");
    let name = topic.to_string();
    let exists = blocking(move || {
        let consumer: BaseConsumer = client_config(bootstrap)
            .create()
            .map_err(|e| kafka_error("create metadata client", e))?;
        let metadata = consumer
            .fetch_metadata(Some(&name), METADATA_TIMEOUT)
            .map_err(|e| kafka_error(format!("fetch metadata for '{name}'"), e))?;
        Ok(metadata
            .topics()
            .iter()
            .any(|t| t.name() == name && t.error().is_none() && !t.partitions().is_empty()))
    })
    .await?;

    if exists {
        Ok(())
    } else {
        Err(ClientError::config(format!(
            "topic '{topic}' does not exist (use --create-topic to create it)"
        )))
    }
}
