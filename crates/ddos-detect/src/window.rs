//! Window-delta computation for the fast tick.

use ddos_common::net::TrafficClass;
use ddos_common::{CounterSnapshot, Protocol};
use ddos_sketch::{merged_heavy_hitters, HeavyHitter, Shard, Sketch, SketchKind};

/// A heavy-hitter candidate refined into per-IP PPS estimates: `pps`
/// is the all-protocol (`Total`) rate; `udp_pps`/`syn_pps`/`icmp_pps`/
/// `http_pps` are the same IP's rate within each metric sketch, each
/// independently refined against that metric's own merged sketch.
#[derive(Debug, Clone, Copy)]
pub struct HeavyHitterEstimate {
    pub ip: u32,
    pub count: u32,
    pub pps: f64,
    pub udp_pps: f64,
    pub syn_pps: f64,
    pub icmp_pps: f64,
    pub http_pps: f64,
}

/// Everything the rule engine needs from one fast-tick window.
#[derive(Debug, Clone)]
pub struct WindowDeltas {
    pub duration_secs: f64,
    pub delta: CounterSnapshot,
    pub global_pps: f64,
    pub class_pps: [f64; 3],
    pub protocol_pps: [f64; 4],
    pub bytes_ratio: f64,
    /// Heavy hitters per class, highest count first, already refined.
    pub heavy_hitters: [Vec<HeavyHitterEstimate>; 3],
}

impl WindowDeltas {
    pub fn heavy_hitters_for(&self, class: TrafficClass) -> &[HeavyHitterEstimate] {
        &self.heavy_hitters[class as usize]
    }

    pub fn max_pps_for(&self, class: TrafficClass, estimates: &[HeavyHitterEstimate]) -> f64 {
        let _ = class;
        estimates.iter().map(|h| h.pps).fold(0.0, f64::max)
    }
}

/// Compute window deltas from two aggregate-counter snapshots, the
/// merged per-(class, metric) sketches, and every worker's shard (for
/// heavy hitter candidate enumeration).
pub fn compute_window_deltas(
    now: &CounterSnapshot,
    window_start: &CounterSnapshot,
    duration_secs: f64,
    shards: &[&Shard],
    merged: &[(TrafficClass, SketchKind, &Sketch)],
    heavy_hitter_k: usize,
) -> WindowDeltas {
    let delta = now.delta_since(window_start);
    let duration = duration_secs.max(0.001);

    let global_pps = delta.total_packets as f64 / duration;
    let class_pps = std::array::from_fn(|i| delta.class_packets[i] as f64 / duration);
    let protocol_pps = std::array::from_fn(|i| delta.protocol_packets[i] as f64 / duration);
    let bytes_ratio = delta.bytes_ratio();

    let find = |class: TrafficClass, kind: SketchKind| -> Option<&Sketch> {
        merged.iter().find(|(c, k, _)| *c == class && *k == kind).map(|(_, _, s)| *s)
    };

    let mut heavy_hitters: [Vec<HeavyHitterEstimate>; 3] = Default::default();
    for class in TrafficClass::ALL {
        if delta.class(class) == 0 {
            continue;
        }
        let Some(total_sketch) = find(class, SketchKind::Total) else { continue };
        let candidates: Vec<HeavyHitter> = merged_heavy_hitters(shards, class, total_sketch, heavy_hitter_k);

        let udp_sketch = find(class, SketchKind::Udp);
        let syn_sketch = find(class, SketchKind::Syn);
        let icmp_sketch = find(class, SketchKind::Icmp);
        let http_sketch = find(class, SketchKind::Http);

        heavy_hitters[class as usize] = candidates
            .into_iter()
            .map(|h| HeavyHitterEstimate {
                ip: h.ip,
                count: h.count,
                pps: h.count as f64 / duration,
                udp_pps: udp_sketch.map(|s| s.query(h.ip as u64)).unwrap_or(0) as f64 / duration,
                syn_pps: syn_sketch.map(|s| s.query(h.ip as u64)).unwrap_or(0) as f64 / duration,
                icmp_pps: icmp_sketch.map(|s| s.query(h.ip as u64)).unwrap_or(0) as f64 / duration,
                http_pps: http_sketch.map(|s| s.query(h.ip as u64)).unwrap_or(0) as f64 / duration,
            })
            .collect();
    }

    WindowDeltas {
        duration_secs: duration,
        delta,
        global_pps,
        class_pps,
        protocol_pps,
        bytes_ratio,
        heavy_hitters,
    }
}

/// Reinterpret protocol enum as array index, matching
/// [`ddos_common::Protocol::ALL`] declaration order.
pub fn protocol_index(protocol: Protocol) -> usize {
    Protocol::ALL.iter().position(|p| p.as_str() == protocol.as_str()).unwrap_or(3)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_pps_divides_by_duration() {
        let start = CounterSnapshot::default();
        let now = CounterSnapshot { total_packets: 1000, ..Default::default() };
        let shards: [&Shard; 0] = [];
        let merged: [(TrafficClass, SketchKind, &Sketch); 0] = [];
        let deltas = compute_window_deltas(&now, &start, 2.0, &shards, &merged, 10);
        assert_eq!(deltas.global_pps, 500.0);
    }
}
