//! The statistics reporter: formats and emits the structured log
//! lines the slow tick (and first detection) produce.

use crate::lines::{AlertLine, ClassCounts, ComparisonBlock, DetectLine, ProtocolCounts, StatsLine};
use ddos_common::CounterSnapshot;
use ddos_detect::AlertRecord;

/// Everything the reporter needs to format one slow-tick snapshot.
/// `window_first_packet_nanos`/`window_last_packet_nanos` are the
/// arrival timestamps of the first and last packet seen *within the
/// reporting interval*, not wall-clock tick boundaries — idle gaps in
/// replayed traffic must not depress the reported throughput.
pub struct ReportInput<'a> {
    pub snapshot: &'a CounterSnapshot,
    pub window_start: &'a CounterSnapshot,
    pub window_first_packet_nanos: Option<u64>,
    pub window_last_packet_nanos: Option<u64>,
    pub nic_rx_drops: u64,
    pub alert: &'a AlertRecord,
    pub avg_cycles_per_packet: f64,
    pub per_worker_throughput_gbps: Vec<f64>,
}

/// Stateless formatter: every method takes exactly what it needs and
/// emits one `tracing` event. No internal buffering; the caller
/// (the coordinator) owns the interval-scoped state.
pub struct StatisticsReporter;

impl StatisticsReporter {
    pub fn new() -> Self {
        Self
    }

    /// Format and emit one `STATS` line.
    pub fn report(&self, input: &ReportInput<'_>) {
        let delta = input.snapshot.delta_since(input.window_start);

        let window_secs = match (input.window_first_packet_nanos, input.window_last_packet_nanos) {
            (Some(first), Some(last)) => (last.saturating_sub(first) as f64 / 1_000_000_000.0).max(0.001),
            _ => 0.0,
        };

        let window_bytes = delta.bytes_in + delta.bytes_out;
        let throughput_gbps = if window_secs > 0.0 { (window_bytes as f64 * 8.0) / (window_secs * 1_000_000_000.0) } else { 0.0 };

        let comparison = input.alert.detection_triggered.then(|| ComparisonBlock {
            detection_latency_ms: input.alert.detection_latency_ms.unwrap_or(0.0),
            amplification_at_detection: input.alert.amplification_at_detection.unwrap_or(0.0),
            total_bytes_at_detection: input.alert.total_bytes_at_detection.unwrap_or(0),
            total_packets_at_detection: input.alert.total_packets_at_detection.unwrap_or(0),
            avg_cycles_per_packet: input.avg_cycles_per_packet,
            per_worker_throughput_gbps: input.per_worker_throughput_gbps.clone(),
        });

        let line = StatsLine {
            total_packets: input.snapshot.total_packets,
            class_packets: ClassCounts {
                baseline: input.snapshot.class_packets[0],
                attack: input.snapshot.class_packets[1],
                other: input.snapshot.class_packets[2],
            },
            protocol_packets: ProtocolCounts {
                tcp: input.snapshot.protocol_packets[0],
                udp: input.snapshot.protocol_packets[1],
                icmp: input.snapshot.protocol_packets[2],
                other: input.snapshot.protocol_packets[3],
            },
            bytes_ratio: input.snapshot.bytes_ratio(),
            window_throughput_gbps: throughput_gbps,
            nic_rx_drops: input.nic_rx_drops,
            alert_level: input.alert.level.as_str().to_string(),
            alert_reason: input.alert.reason.clone(),
            comparison,
        };

        match serde_json::to_string(&line) {
            Ok(json) => tracing::info!(target: "ddos::stats", stats = %json, "periodic statistics"),
            Err(err) => tracing::warn!(target: "ddos::stats", error = %err, "failed to serialize statistics line"),
        }
    }

    /// Emit an `ALERT` line. The caller (the coordinator) is
    /// responsible for only invoking this when the level has changed
    /// since the previous tick; this method's own guard just keeps a
    /// `None`-level record from ever producing a line.
    pub fn report_alert(&self, alert: &AlertRecord) {
        if alert.level == ddos_detect::AlertLevel::None {
            return;
        }
        let line = AlertLine::from(alert);
        match serde_json::to_string(&line) {
            Ok(json) => tracing::info!(target: "ddos::alert", alert = %json, "alert raised"),
            Err(err) => tracing::warn!(target: "ddos::alert", error = %err, "failed to serialize alert line"),
        }
    }

    /// Emit exactly once, at the tick `detection_triggered` first
    /// becomes true.
    pub fn report_detection(&self, alert: &AlertRecord) {
        if !alert.detection_triggered {
            return;
        }
        let line = DetectLine {
            detection_latency_ms: alert.detection_latency_ms.unwrap_or(0.0),
            amplification_at_detection: alert.amplification_at_detection.unwrap_or(0.0),
            total_bytes_at_detection: alert.total_bytes_at_detection.unwrap_or(0),
            total_packets_at_detection: alert.total_packets_at_detection.unwrap_or(0),
            reason: alert.reason.clone(),
        };
        match serde_json::to_string(&line) {
            Ok(json) => tracing::info!(target: "ddos::detect", detect = %json, "attack detected"),
            Err(err) => tracing::warn!(target: "ddos::detect", error = %err, "failed to serialize detect line"),
        }
    }
}

impl Default for StatisticsReporter {
    fn default() -> Self {
        Self::new()
    }
}
