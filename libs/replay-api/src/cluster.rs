use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Raw metadata: as returned by a MetadataSession
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMetadata {
    pub id: i32,
    pub host: String,
    pub port: u16,
}

impl BrokerMetadata {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionMetadata {
    pub topic: String,
    pub id: i32,
    pub leader: i32,
    pub replicas: Vec<i32>,
    pub isr: Vec<i32>,
}

// ---------------------------------------------------------------------------
// Cluster snapshot: assembled by the info collector
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerInfo {
    pub id: i32,
    pub address: String,
    /// Leads at least one partition.
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_leader: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionInfo {
    pub id: i32,
    pub leader: i32,
    pub replicas: Vec<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub in_sync_replicas: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicInfo {
    pub name: String,
    pub partitions: BTreeMap<i32, PartitionInfo>,
}

/// Point-in-time view of brokers and topics. Rebuilt on every collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterInfo {
    pub brokers: Vec<BrokerInfo>,
    pub topics: BTreeMap<String, TopicInfo>,
}

fn is_false(v: &bool) -> bool {
    !*v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_fields_are_omitted() {
        let mut partitions = BTreeMap::new();
        partitions.insert(
            0,
            PartitionInfo { id: 0, leader: 1, replicas: vec![1], in_sync_replicas: vec![] },
        );
        let mut topics = BTreeMap::new();
        topics.insert("orders".to_string(), TopicInfo { name: "orders".into(), partitions });
        let info = ClusterInfo {
            brokers: vec![BrokerInfo { id: 1, address: "b1:9092".into(), is_leader: false }],
            topics,
        };

        let json = serde_json::to_value(&info).unwrap();
        assert!(json["brokers"][0].get("is_leader").is_none());
        assert!(json["topics"]["orders"]["partitions"]["0"].get("in_sync_replicas").is_none());
        assert_eq!(json["topics"]["orders"]["partitions"]["0"]["leader"], 1);
    }
}
