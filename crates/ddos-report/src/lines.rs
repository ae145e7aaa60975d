//! Serde schemas for the three structured log line types emitted on
//! the slow tick and at first detection.

use ddos_detect::AlertRecord;
use serde::Serialize;

/// Per-protocol packet counts, keyed by name rather than array index
/// so the emitted JSON is self-describing.
#[derive(Debug, Clone, Serialize)]
pub struct ProtocolCounts {
    pub tcp: u64,
    pub udp: u64,
    pub icmp: u64,
    pub other: u64,
}

/// Packet/byte counters broken out by traffic class.
#[derive(Debug, Clone, Serialize)]
pub struct ClassCounts {
    pub baseline: u64,
    pub attack: u64,
    pub other: u64,
}

/// The comparison block, present only once `detection_triggered` is
/// true: "once detection_triggered is true, a comparison
/// block".
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonBlock {
    pub detection_latency_ms: f64,
    pub amplification_at_detection: f64,
    pub total_bytes_at_detection: u64,
    pub total_packets_at_detection: u64,
    pub avg_cycles_per_packet: f64,
    pub per_worker_throughput_gbps: Vec<f64>,
}

/// A slow-tick statistics snapshot. Emitted as a single
/// JSON line via `tracing::info!(target = "ddos::stats", ...)`.
#[derive(Debug, Clone, Serialize)]
pub struct StatsLine {
    pub total_packets: u64,
    pub class_packets: ClassCounts,
    pub protocol_packets: ProtocolCounts,
    pub bytes_ratio: f64,
    pub window_throughput_gbps: f64,
    pub nic_rx_drops: u64,
    pub alert_level: String,
    pub alert_reason: String,
    pub comparison: Option<ComparisonBlock>,
}

/// One fast-tick alert publication, emitted whenever the alert level
/// is non-`None`.
#[derive(Debug, Clone, Serialize)]
pub struct AlertLine {
    pub level: String,
    pub reason: String,
}

impl From<&AlertRecord> for AlertLine {
    fn from(record: &AlertRecord) -> Self {
        Self { level: record.level.as_str().to_string(), reason: record.reason.clone() }
    }
}

/// Emitted exactly once, at the tick `detection_triggered` first
/// transitions to true.
#[derive(Debug, Clone, Serialize)]
pub struct DetectLine {
    pub detection_latency_ms: f64,
    pub amplification_at_detection: f64,
    pub total_bytes_at_detection: u64,
    pub total_packets_at_detection: u64,
    pub reason: String,
}
