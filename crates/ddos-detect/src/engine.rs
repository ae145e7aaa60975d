//! Per-tick orchestration: evaluate rules, optionally fold in ML, and
//! update the one-shot detection latch.

use crate::alert::AlertRecord;
use crate::config::RuleThresholds;
use crate::hybrid;
use crate::predictor::{FeatureVector, Predictor};
use crate::rules;
use crate::window::WindowDeltas;
use ddos_common::LatchFlag;
use std::sync::atomic::{AtomicU64, Ordering};

type Bits = AtomicU64;

/// Coordinator-owned detection state carried across fast ticks:
/// the one-shot `detection_triggered` latch and the scalars recorded
/// at the moment it fires.
#[derive(Default)]
pub struct DetectionState {
    triggered: LatchFlag,
    detection_latency_ms: AtomicF64,
    amplification_at_detection: AtomicF64,
    total_bytes_at_detection: Bits,
    total_packets_at_detection: Bits,
}

/// `f64` stored bit-for-bit in an `AtomicU64`; there is no portable
/// atomic f64, and these scalars are written once (at first
/// detection) and read many times by the reporter.
#[derive(Default)]
struct AtomicF64(Bits);

impl AtomicF64 {
    fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Release);
    }

    fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }
}

impl DetectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.is_set()
    }

    pub fn detection_latency_ms(&self) -> Option<f64> {
        self.is_triggered().then(|| self.detection_latency_ms.load())
    }

    pub fn amplification_at_detection(&self) -> Option<f64> {
        self.is_triggered().then(|| self.amplification_at_detection.load())
    }

    pub fn total_bytes_at_detection(&self) -> Option<u64> {
        self.is_triggered().then(|| self.total_bytes_at_detection.load(Ordering::Acquire))
    }

    pub fn total_packets_at_detection(&self) -> Option<u64> {
        self.is_triggered().then(|| self.total_packets_at_detection.load(Ordering::Acquire))
    }
}

/// Evaluate one fast tick: run the rule engine, optionally fold in an
/// ML predictor's verdict, and if the resulting level crosses High
/// for the first time, latch `detection_triggered` and record the
/// latency/amplification scalars the reporter's comparison block
/// needs.
pub fn evaluate_tick(
    window: &WindowDeltas,
    thresholds: &RuleThresholds,
    predictor: Option<&dyn Predictor>,
    state: &DetectionState,
    first_attack_packet_tsc_nanos: u64,
    now_nanos: u64,
    total_bytes_so_far: u64,
    total_packets_so_far: u64,
) -> AlertRecord {
    let (mut level, mut reason) = rules::evaluate(window, thresholds);

    if let Some(predictor) = predictor {
        let features = FeatureVector::from_window(window);
        match predictor.predict(&features) {
            Ok((class, confidence, _probs)) => {
                let (hybrid_level, hybrid_reason) = hybrid::combine(level, &reason, class, confidence);
                level = hybrid_level;
                reason = hybrid_reason;
            }
            Err(err) => {
                tracing::warn!(target: "ddos::detect", error = %err, "predictor invocation failed, falling back to rules-only verdict");
            }
        }
    }

    let mut record = AlertRecord {
        level,
        reason,
        detection_triggered: state.is_triggered(),
        detection_latency_ms: state.detection_latency_ms(),
        amplification_at_detection: state.amplification_at_detection(),
        total_bytes_at_detection: state.total_bytes_at_detection(),
        total_packets_at_detection: state.total_packets_at_detection(),
    };

    if level >= crate::alert::AlertLevel::High && !state.is_triggered() && first_attack_packet_tsc_nanos != 0 {
        if state.triggered.trigger() {
            let latency_ms = (now_nanos.saturating_sub(first_attack_packet_tsc_nanos)) as f64 / 1_000_000.0;
            state.detection_latency_ms.store(latency_ms);
            state.amplification_at_detection.store(window.bytes_ratio);
            state.total_bytes_at_detection.store(total_bytes_so_far, Ordering::Release);
            state.total_packets_at_detection.store(total_packets_so_far, Ordering::Release);

            record.detection_triggered = true;
            record.detection_latency_ms = Some(latency_ms);
            record.amplification_at_detection = Some(window.bytes_ratio);
            record.total_bytes_at_detection = Some(total_bytes_so_far);
            record.total_packets_at_detection = Some(total_packets_so_far);
        }
    }

    record
}
