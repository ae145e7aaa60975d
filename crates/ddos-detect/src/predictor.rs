//! Optional ML augmentation.
//!
//! The predictor is strictly synchronous and in-process: the fast
//! tick budget (default 50ms) has no room for an RPC round trip. Two
//! implementations ship here; a real model is loaded by whatever
//! binds `Predictor` from a serialized format, which is outside this
//! crate's scope.

use crate::window::WindowDeltas;
use ddos_common::PredictError;

/// Feature vector the detection engine builds once per fast tick:
/// global packet/byte counts, per-protocol counts, SYN count, HTTP
/// count, per-class counts, and four derived ratios.
#[derive(Debug, Clone, Copy)]
pub struct FeatureVector {
    pub global_packets: f64,
    pub global_bytes: f64,
    pub tcp_packets: f64,
    pub udp_packets: f64,
    pub icmp_packets: f64,
    pub syn_packets: f64,
    pub http_packets: f64,
    pub baseline_packets: f64,
    pub attack_packets: f64,
    pub udp_tcp_ratio: f64,
    pub syn_total_ratio: f64,
    pub baseline_attack_ratio: f64,
    pub bytes_per_packet: f64,
}

impl FeatureVector {
    pub fn from_window(window: &WindowDeltas) -> Self {
        let d = &window.delta;
        let total_packets = d.total_packets as f64;
        let total_bytes = (d.bytes_in + d.bytes_out) as f64;
        let tcp = d.protocol(ddos_common::Protocol::Tcp) as f64;
        let udp = d.protocol(ddos_common::Protocol::Udp) as f64;
        let icmp = d.protocol(ddos_common::Protocol::Icmp) as f64;
        let baseline = d.class(ddos_common::net::TrafficClass::Baseline) as f64;
        let attack = d.class(ddos_common::net::TrafficClass::Attack) as f64;

        Self {
            global_packets: total_packets,
            global_bytes: total_bytes,
            tcp_packets: tcp,
            udp_packets: udp,
            icmp_packets: icmp,
            syn_packets: d.syn_packets as f64,
            http_packets: d.http_indicator_packets as f64,
            baseline_packets: baseline,
            attack_packets: attack,
            udp_tcp_ratio: udp / tcp.max(1.0),
            syn_total_ratio: d.syn_packets as f64 / total_packets.max(1.0),
            baseline_attack_ratio: baseline / attack.max(1.0),
            bytes_per_packet: total_bytes / total_packets.max(1.0),
        }
    }

    pub fn to_vec(&self) -> Vec<f64> {
        vec![
            self.global_packets,
            self.global_bytes,
            self.tcp_packets,
            self.udp_packets,
            self.icmp_packets,
            self.syn_packets,
            self.http_packets,
            self.baseline_packets,
            self.attack_packets,
            self.udp_tcp_ratio,
            self.syn_total_ratio,
            self.baseline_attack_ratio,
            self.bytes_per_packet,
        ]
    }
}

/// Predicted traffic class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictedClass {
    Normal,
    Anomalous,
}

/// A synchronous anomaly predictor invoked once per fast tick. Must
/// complete within the fast-tick budget (design assumption: latency
/// ≤ 3ms).
pub trait Predictor: Send + Sync {
    fn predict(&self, features: &FeatureVector) -> Result<(PredictedClass, f64, Vec<f64>), PredictError>;
}

/// The absence of a model: always predicts `Normal` with zero
/// confidence, so the hybrid matrix degenerates to rules-only.
pub struct NoopPredictor;

impl Predictor for NoopPredictor {
    fn predict(&self, _features: &FeatureVector) -> Result<(PredictedClass, f64, Vec<f64>), PredictError> {
        Ok((PredictedClass::Normal, 0.0, vec![1.0, 0.0]))
    }
}

/// A simple score-threshold predictor: each feature is weighted and
/// summed, then squashed through a logistic function. Stands in for
/// a trained model without pulling in an inference runtime: this
/// crate carries no ONNX/tensor dependency.
pub struct ThresholdPredictor {
    weights: Vec<f64>,
    bias: f64,
    confidence_floor: f64,
}

impl ThresholdPredictor {
    /// `weights` must have the same length as [`FeatureVector::to_vec`].
    pub fn new(weights: Vec<f64>, bias: f64, confidence_floor: f64) -> Self {
        Self { weights, bias, confidence_floor }
    }

    /// A reasonable default weighting favoring SYN/UDP ratio and
    /// baseline/attack skew, the two signals R1-R3 also key on.
    pub fn default_weights() -> Self {
        Self::new(
            vec![0.0, 0.0, 0.0, 0.3, 0.0, 0.4, 0.1, -0.2, 0.3, 0.2, 0.3, -0.1, 0.0],
            -1.5,
            0.75,
        )
    }
}

impl Predictor for ThresholdPredictor {
    fn predict(&self, features: &FeatureVector) -> Result<(PredictedClass, f64, Vec<f64>), PredictError> {
        let vec = features.to_vec();
        if vec.len() != self.weights.len() {
            return Err(PredictError::Failed(format!(
                "feature vector length {} does not match weight vector length {}",
                vec.len(),
                self.weights.len()
            )));
        }

        let score: f64 = vec.iter().zip(self.weights.iter()).map(|(v, w)| v * w).sum::<f64>() + self.bias;
        let confidence = 1.0 / (1.0 + (-score).exp());

        let class = if confidence >= self.confidence_floor { PredictedClass::Anomalous } else { PredictedClass::Normal };
        Ok((class, confidence, vec![1.0 - confidence, confidence]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddos_common::CounterSnapshot;

    fn window_with(total_packets: u64, syn: u64, udp_proto: u64) -> WindowDeltas {
        let mut delta = CounterSnapshot::default();
        delta.total_packets = total_packets;
        delta.syn_packets = syn;
        delta.protocol_packets[1] = udp_proto;
        WindowDeltas {
            duration_secs: 1.0,
            delta,
            global_pps: total_packets as f64,
            class_pps: [0.0; 3],
            protocol_pps: [0.0; 4],
            bytes_ratio: 1.0,
            heavy_hitters: Default::default(),
        }
    }

    #[test]
    fn noop_predictor_always_normal() {
        let features = FeatureVector::from_window(&window_with(100, 10, 50));
        let (class, confidence, _) = NoopPredictor.predict(&features).unwrap();
        assert_eq!(class, PredictedClass::Normal);
        assert_eq!(confidence, 0.0);
    }

    #[test]
    fn threshold_predictor_flags_syn_heavy_window() {
        let features = FeatureVector::from_window(&window_with(1000, 900, 10));
        let predictor = ThresholdPredictor::default_weights();
        let (class, confidence, probs) = predictor.predict(&features).unwrap();
        assert_eq!(class, PredictedClass::Anomalous);
        assert!(confidence >= 0.75);
        assert_eq!(probs.len(), 2);
    }

    #[test]
    fn threshold_predictor_rejects_mismatched_weights() {
        let predictor = ThresholdPredictor::new(vec![1.0], 0.0, 0.5);
        let features = FeatureVector::from_window(&window_with(10, 1, 1));
        assert!(predictor.predict(&features).is_err());
    }
}
