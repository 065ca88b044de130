//! Cluster topology snapshot.

use std::collections::{BTreeMap, BTreeSet};

use replay_api::client::{MetadataConnector, MetadataSession};
use replay_api::cluster::{BrokerInfo, BrokerMetadata, ClusterInfo, PartitionInfo, PartitionMetadata, TopicInfo};

use crate::error::EngineError;

/// Connect to the first reachable broker in `brokers` and describe the cluster.
///
/// Addresses are tried in order with no retries. If none answers, the error
/// lists every address tried along with the last failure.
pub async fn collect_info(connector: &dyn MetadataConnector, brokers: &[String]) -> Result<ClusterInfo, EngineError> {
    if brokers.is_empty() {
        return Err(EngineError::Config("at least one broker address is required".into()));
    }

    let mut session = connect_any(connector, brokers).await?;

    let broker_list = session
        .brokers()
        .await
        .map_err(|e| EngineError::from(e).with_context("failed to get broker list"))?;
    let partitions = session
        .partitions()
        .await
        .map_err(|e| EngineError::from(e).with_context("failed to get partitions"))?;

    let info = build_snapshot(broker_list, partitions);
    tracing::debug!(brokers = info.brokers.len(), topics = info.topics.len(), "cluster metadata collected");
    Ok(info)
}

async fn connect_any(
    connector: &dyn MetadataConnector,
    brokers: &[String],
) -> Result<Box<dyn MetadataSession>, EngineError> {
    let mut last_error = None;
    for address in brokers {
        match connector.connect(address).await {
            Ok(session) => {
                tracing::debug!(broker = %address, "connected");
                return Ok(session);
            }
            Err(e) => {
                tracing::debug!(broker = %address, error = %e, "broker unreachable");
                last_error = Some(e);
            }
        }
    }

    let tried = brokers.join(", ");
    let detail = last_error.map(|e| e.to_string()).unwrap_or_default();
    Err(EngineError::Config(format!(
        "failed to connect to any broker (tried: {tried}): {detail}"
    )))
}

/// Assemble the snapshot from raw metadata.
///
/// Brokers and replica lists come out sorted by id so repeated calls on an
/// unchanged cluster render identically.
pub fn build_snapshot(brokers: Vec<BrokerMetadata>, partitions: Vec<PartitionMetadata>) -> ClusterInfo {
    let mut leaders = BTreeSet::new();
    let mut topics: BTreeMap<String, TopicInfo> = BTreeMap::new();

    for partition in partitions {
        leaders.insert(partition.leader);

        let mut replicas = partition.replicas;
        replicas.sort_unstable();
        let mut in_sync_replicas = partition.isr;
        in_sync_replicas.sort_unstable();

        let topic = topics.entry(partition.topic.clone()).or_insert_with(|| TopicInfo {
            name: partition.topic,
            partitions: BTreeMap::new(),
        });
        topic.partitions.insert(
            partition.id,
            PartitionInfo {
                id: partition.id,
                leader: partition.leader,
                replicas,
                in_sync_replicas,
            },
        );
    }

    let by_id: BTreeMap<i32, BrokerMetadata> = brokers.into_iter().map(|b| (b.id, b)).collect();
    let brokers = by_id
        .into_values()
        .map(|b| BrokerInfo {
            id: b.id,
            address: b.address(),
            is_leader: leaders.contains(&b.id),
        })
        .collect();

    ClusterInfo { brokers, topics }
}
