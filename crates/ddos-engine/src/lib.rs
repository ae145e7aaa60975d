//! Multi-worker/single-coordinator concurrency fabric.
//!
//! Workers poll their private [`source::PacketSource`] and update
//! their own [`ddos_sketch::Shard`] with no atomics on the hot path
//! beyond the aggregate counters; the coordinator is the lone shard
//! reader and drives the fast-tick/slow-tick state machine in
//! [`coordinator::Coordinator`].

pub mod config;
pub mod coordinator;
pub mod source;
pub mod worker;

pub use config::{parse_cidr_list, EngineConfig};
pub use coordinator::Coordinator;
pub use source::{DemoPacketSource, NicStats, NullPacketSource, PacketSource, RxPacket, SyntheticPacketSource};
pub use worker::Worker;
