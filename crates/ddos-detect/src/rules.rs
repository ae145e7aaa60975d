//! R1-R8 rule set. Rules are evaluated in a fixed
//! order; every firing rule appends to the cumulative reason string,
//! and the highest severity across all firings becomes the alert
//! level.

use crate::alert::AlertLevel;
use crate::config::RuleThresholds;
use crate::window::{HeavyHitterEstimate, WindowDeltas};
use ddos_common::net::TrafficClass;
use std::fmt::Write as _;

/// One rule's outcome: the level it would contribute, if it fired.
struct Firing {
    level: AlertLevel,
    reason: String,
}

/// Evaluate every rule against `window`, returning the cumulative
/// reason string and the maximum level across all rules that fired.
/// Returns `AlertLevel::None` with an empty reason if nothing fired.
pub fn evaluate(window: &WindowDeltas, thresholds: &RuleThresholds) -> (AlertLevel, String) {
    let mut firings = Vec::new();

    if let Some(f) = rule_r1_amplification(window, thresholds) {
        firings.push(f);
    }
    if let Some(f) = rule_r2_udp_flood(window, thresholds) {
        firings.push(f);
    }
    if let Some(f) = rule_r3_syn_flood(window, thresholds) {
        firings.push(f);
    }
    if let Some(f) = rule_r4_icmp_flood(window, thresholds) {
        firings.push(f);
    }
    if let Some(f) = rule_r5_http_flood(window, thresholds) {
        firings.push(f);
    }
    if let Some(f) = rule_r6_heavy_hitters(window, thresholds) {
        firings.push(f);
    }
    if let Some(f) = rule_r7_baseline_udp(window, thresholds) {
        firings.push(f);
    }
    if let Some(f) = rule_r8_burst(window, thresholds) {
        firings.push(f);
    }

    let level = firings.iter().map(|f| f.level).max().unwrap_or(AlertLevel::None);
    let mut reason = String::new();
    for (i, f) in firings.iter().enumerate() {
        if i > 0 {
            reason.push_str("; ");
        }
        let _ = write!(reason, "{}", f.reason);
    }
    (level, reason)
}

fn rule_r1_amplification(window: &WindowDeltas, t: &RuleThresholds) -> Option<Firing> {
    let attack_share = window.delta.class(TrafficClass::Attack) as f64 / window.delta.total_packets.max(1) as f64;
    if window.bytes_ratio > t.amplification_threshold && attack_share >= t.attack_ratio_min && window.delta.total_packets >= t.min_packets {
        Some(Firing {
            level: AlertLevel::High,
            reason: format!(
                "R1 amplification: bytes_ratio={:.2} attack_share={:.2}",
                window.bytes_ratio, attack_share
            ),
        })
    } else {
        None
    }
}

/// Pick the candidate with the largest value of `metric`, breaking
/// ties in favour of whichever was seen first.
fn strongest_by(estimates: &[HeavyHitterEstimate], metric: impl Fn(&HeavyHitterEstimate) -> f64) -> Option<(u32, f64)> {
    estimates
        .iter()
        .map(|h| (h.ip, metric(h)))
        .fold(None, |acc, cur| match acc {
            Some((_, best)) if best >= cur.1 => acc,
            _ => Some(cur),
        })
}

fn rule_r2_udp_flood(window: &WindowDeltas, t: &RuleThresholds) -> Option<Firing> {
    let (ip, pps) = strongest_by(window.heavy_hitters_for(TrafficClass::Attack), |h| h.udp_pps)?;
    if pps > t.udp_per_ip_pps {
        Some(Firing { level: AlertLevel::High, reason: format!("R2 per-IP UDP flood: ip={ip:#x} pps={pps:.0}") })
    } else {
        None
    }
}

fn rule_r3_syn_flood(window: &WindowDeltas, t: &RuleThresholds) -> Option<Firing> {
    let (ip, pps) = strongest_by(window.heavy_hitters_for(TrafficClass::Attack), |h| h.syn_pps)?;
    if pps > t.syn_per_ip_pps {
        Some(Firing { level: AlertLevel::High, reason: format!("R3 per-IP SYN flood: ip={ip:#x} syn_pps={pps:.0}") })
    } else {
        None
    }
}

fn rule_r4_icmp_flood(window: &WindowDeltas, t: &RuleThresholds) -> Option<Firing> {
    let (ip, pps) = strongest_by(window.heavy_hitters_for(TrafficClass::Attack), |h| h.icmp_pps)?;
    if pps > t.icmp_per_ip_pps {
        Some(Firing { level: AlertLevel::High, reason: format!("R4 per-IP ICMP flood: ip={ip:#x} icmp_pps={pps:.0}") })
    } else {
        None
    }
}

fn rule_r5_http_flood(window: &WindowDeltas, t: &RuleThresholds) -> Option<Firing> {
    let (ip, pps) = strongest_by(window.heavy_hitters_for(TrafficClass::Attack), |h| h.http_pps)?;
    if pps > t.http_per_ip_pps {
        Some(Firing { level: AlertLevel::High, reason: format!("R5 per-IP HTTP flood: ip={ip:#x} http_pps={pps:.0}") })
    } else {
        None
    }
}

fn rule_r6_heavy_hitters(window: &WindowDeltas, t: &RuleThresholds) -> Option<Firing> {
    let count = window
        .heavy_hitters_for(TrafficClass::Attack)
        .iter()
        .filter(|h| h.count > t.heavy_hitter_threshold)
        .count();
    if count > t.heavy_hitter_ip_limit {
        Some(Firing { level: AlertLevel::Medium, reason: format!("R6 heavy hitters: count={count}") })
    } else {
        None
    }
}

fn rule_r7_baseline_udp(window: &WindowDeltas, t: &RuleThresholds) -> Option<Firing> {
    let (ip, pps) = strongest_by(window.heavy_hitters_for(TrafficClass::Baseline), |h| h.udp_pps)?;
    if pps > t.baseline_udp_per_ip_pps {
        Some(Firing { level: AlertLevel::Medium, reason: format!("R7 baseline per-IP UDP: ip={ip:#x} pps={pps:.0}") })
    } else {
        None
    }
}

fn rule_r8_burst(window: &WindowDeltas, t: &RuleThresholds) -> Option<Firing> {
    let sub_window_secs = t.burst_sub_window_ms as f64 / 1000.0;
    let (ip, pps) = strongest_by(window.heavy_hitters_for(TrafficClass::Attack), |h| h.pps)?;
    let estimated_sub_window_count = pps * sub_window_secs;
    if estimated_sub_window_count > t.burst_threshold as f64 {
        Some(Firing { level: AlertLevel::Low, reason: format!("R8 burst: ip={ip:#x} est_count={estimated_sub_window_count:.0}") })
    } else {
        None
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::window::HeavyHitterEstimate;
    use ddos_common::CounterSnapshot;
    use proptest::prelude::*;

    fn window_with_attack_udp_pps(total_packets: u64, per_ip_pps: f64) -> WindowDeltas {
        let mut delta = CounterSnapshot::default();
        delta.total_packets = total_packets;
        WindowDeltas {
            duration_secs: 1.0,
            delta,
            global_pps: total_packets as f64,
            class_pps: [0.0; 3],
            protocol_pps: [0.0; 4],
            bytes_ratio: 1.0,
            heavy_hitters: [
                vec![],
                vec![HeavyHitterEstimate {
                    ip: 1,
                    count: per_ip_pps as u32,
                    pps: per_ip_pps,
                    udp_pps: per_ip_pps,
                    syn_pps: 0.0,
                    icmp_pps: 0.0,
                    http_pps: 0.0,
                }],
                vec![],
            ],
        }
    }

    proptest! {
        /// Testable property 7 (alert ordering), restricted to R2: the
        /// rule set's level tracks R2's own threshold exactly — fires
        /// High iff the per-IP UDP PPS estimate exceeds the configured
        /// threshold.
        #[test]
        fn r2_fires_iff_over_threshold(per_ip_pps in 0f64..20_000.0) {
            let thresholds = RuleThresholds::default();
            let window = window_with_attack_udp_pps(10_000, per_ip_pps);
            let (level, reason) = evaluate(&window, &thresholds);

            if per_ip_pps > thresholds.udp_per_ip_pps {
                prop_assert_eq!(level, AlertLevel::High);
                prop_assert!(reason.contains("R2"));
            } else {
                prop_assert!(level < AlertLevel::High || !reason.contains("R2"));
            }
        }

        /// The cumulative reason string is empty exactly when no rule
        /// fired (`AlertLevel::None`), for any heavy-hitter/PPS
        /// combination within realistic bounds.
        #[test]
        fn reason_is_empty_iff_level_is_none(per_ip_pps in 0f64..20_000.0, total_packets in 0u64..20_000) {
            let thresholds = RuleThresholds::default();
            let window = window_with_attack_udp_pps(total_packets, per_ip_pps);
            let (level, reason) = evaluate(&window, &thresholds);
            prop_assert_eq!(reason.is_empty(), level == AlertLevel::None);
        }
    }
}
