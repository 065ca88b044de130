//! Collaborator contracts shared by the record/replay engines and the
//! adapters that drive them.
//!
//! The engines never talk to a broker directly. Everything they consume
//! (message source, publisher, clock, progress sink, metadata lookups) is
//! expressed here as a trait, so a Kafka client, an in-memory fake or a
//! test double can be plugged in without touching the engines.

pub mod client;
pub mod cluster;
pub mod error;
pub mod progress;
pub mod record;
pub mod time;
