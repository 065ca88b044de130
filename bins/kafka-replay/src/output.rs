use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Write};

use serde::Serialize;

use replay_api::cluster::ClusterInfo;
use replay_api::record::{preview, RecordedMessage};

const PREVIEW_CHARS: usize = 60;

// ---- info ----

pub fn write_json_pretty<T: Serialize>(out: &mut dyn Write, value: &T) -> Result<(), crate::error::CliError> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

/// Topics hosted by each broker, as leader or replica.
pub fn broker_topics(info: &ClusterInfo) -> BTreeMap<i32, BTreeSet<&str>> {
    let mut map: BTreeMap<i32, BTreeSet<&str>> = BTreeMap::new();
    for (name, topic) in &info.topics {
        for partition in topic.partitions.values() {
            map.entry(partition.leader).or_default().insert(name);
            for replica in &partition.replicas {
                map.entry(*replica).or_default().insert(name);
            }
        }
    }
    map
}

pub fn write_info_text(out: &mut dyn Write, info: &ClusterInfo) -> io::Result<()> {
    writeln!(out, "Brokers:")?;
    for broker in &info.brokers {
        let mark = if broker.is_leader { " (leader)" } else { "" };
        writeln!(out, "  Broker {}: {}{mark}", broker.id, broker.address)?;
    }
    writeln!(out)?;

    if info.topics.is_empty() {
        writeln!(out, "No topics found.")?;
        return Ok(());
    }

    writeln!(out, "Topics:")?;
    for (name, topic) in &info.topics {
        writeln!(out, "  Topic: {name}")?;
        for (id, partition) in &topic.partitions {
            writeln!(out, "    Partition {id}:")?;
            writeln!(out, "      Leader: Broker {}", partition.leader)?;
            writeln!(out, "      Replicas: {}", id_list(&partition.replicas))?;
            let isr = &partition.in_sync_replicas;
            if !isr.is_empty() && isr.len() != partition.replicas.len() {
                writeln!(out, "      In-Sync Replicas: {}", id_list(isr))?;
            }
        }
        writeln!(out)?;
    }

    writeln!(out, "Broker-to-Topic Mapping:")?;
    for (broker, topics) in broker_topics(info) {
        let names: Vec<&str> = topics.into_iter().collect();
        writeln!(out, "  Broker {broker}: {}", names.join(", "))?;
    }
    Ok(())
}

fn id_list(ids: &[i32]) -> String {
    let parts: Vec<String> = ids.iter().map(i32::to_string).collect();
    format!("[{}]", parts.join(", "))
}

// ---- cat ----

#[derive(Serialize)]
struct CatLine<'a> {
    #[serde(flatten)]
    message: &'a RecordedMessage,
    size: usize,
}

pub fn write_cat_json(out: &mut dyn Write, msg: &RecordedMessage) -> Result<(), crate::error::CliError> {
    serde_json::to_writer(&mut *out, &CatLine { message: msg, size: msg.len() })?;
    writeln!(out)?;
    Ok(())
}

pub fn write_cat_text(out: &mut dyn Write, msg: &RecordedMessage) -> io::Result<()> {
    writeln!(
        out,
        "{}  {:>8}  {}",
        msg.timestamp.format(replay_engine::codec::TIMESTAMP_FORMAT),
        msg.len(),
        preview(&msg.data, PREVIEW_CHARS)
    )
}

/// Payload bytes exactly as recorded, no separator.
pub fn write_cat_raw(out: &mut dyn Write, msg: &RecordedMessage) -> io::Result<()> {
    out.write_all(&msg.data)
}
