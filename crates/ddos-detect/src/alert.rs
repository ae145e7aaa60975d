//! Alert levels and the alert record the coordinator publishes once
//! per fast tick.

use serde::{Deserialize, Serialize};

/// Severity ladder; `Ord` gives the rule engine "highest applicable
/// level wins" for free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum AlertLevel {
    #[default]
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::None => "none",
            AlertLevel::Low => "low",
            AlertLevel::Medium => "medium",
            AlertLevel::High => "high",
            AlertLevel::Critical => "critical",
        }
    }
}

/// The alert record published at the end of every fast tick; visible
/// to the statistics reporter.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AlertRecord {
    pub level: AlertLevel,
    pub reason: String,
    pub detection_triggered: bool,
    pub detection_latency_ms: Option<f64>,
    pub amplification_at_detection: Option<f64>,
    pub total_bytes_at_detection: Option<u64>,
    pub total_packets_at_detection: Option<u64>,
}

impl AlertRecord {
    pub fn none() -> Self {
        Self::default()
    }
}
