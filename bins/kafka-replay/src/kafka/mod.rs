//! Broker connectivity.
//!
//! Real clients live behind the `kafka` feature. Without it every factory
//! here fails with a config error, so offline commands (`cat`, `version`)
//! still build and run without librdkafka.

#[cfg(feature = "kafka")]
mod client;

use replay_api::client::{Consumer, MetadataConnector, Producer};

use crate::error::CliError;

/// Where and how a recording consumer starts.
#[derive(Debug, Clone)]
#[cfg_attr(not(feature = "kafka"), allow(dead_code))]
pub struct ConsumerOptions<'a> {
    pub topic: &'a str,
    pub partition: i32,
    pub group_id: &'a str,
    pub from_beginning: bool,
}

#[cfg(feature = "kafka")]
pub fn consumer(brokers: &[String], opts: &ConsumerOptions<'_>) -> Result<Box<dyn Consumer>, CliError> {
    Ok(Box::new(client::KafkaConsumer::new(brokers, opts)?))
}

#[cfg(feature = "kafka")]
pub fn producer(brokers: &[String], topic: &str) -> Result<Box<dyn Producer>, CliError> {
    Ok(Box::new(client::KafkaProducer::new(brokers, topic)?))
}

#[cfg(feature = "kafka")]
pub fn metadata() -> Result<Box<dyn MetadataConnector>, CliError> {
    Ok(Box::new(client::KafkaMetadata::default()))
}

/// Create `topic` when asked to, otherwise require that it exists.
#[cfg(feature = "kafka")]
pub async fn prepare_topic(brokers: &[String], topic: &str, create: bool) -> Result<(), CliError> {
    if create {
        client::create_topic(brokers, topic).await?;
    } else {
        client::ensure_topic(brokers, topic).await?;
    }
    Ok(())
}

#[cfg(not(feature = "kafka"))]
pub fn consumer(_brokers: &[String], _opts: &ConsumerOptions<'_>) -> Result<Box<dyn Consumer>, CliError> {
    Err(disabled())
}

#[cfg(not(feature = "kafka"))]
pub fn producer(_brokers: &[String], _topic: &str) -> Result<Box<dyn Producer>, CliError> {
    Err(disabled())
}

#[cfg(not(feature = "kafka"))]
pub fn metadata() -> Result<Box<dyn MetadataConnector>, CliError> {
    Err(disabled())
}

#[cfg(not(feature = "kafka"))]
pub async fn prepare_topic(_brokers: &[String], _topic: &str, _create: bool) -> Result<(), CliError> {
    Err(disabled())
}

#[cfg(not(feature = "kafka"))]
fn disabled() -> CliError {
    CliError::config("kafka support is not compiled in; rebuild with `--features kafka`")
}
