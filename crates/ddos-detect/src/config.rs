//! Rule-engine thresholds. Every threshold is independently
//! overridable from the CLI surface (see `ddos-cli`'s `Cli`/`Settings`
//! and `resolve_thresholds`); the defaults here are the ones the
//! R1-R8 rule set is tuned against.

#[derive(Debug, Clone, Copy)]
pub struct RuleThresholds {
    pub amplification_threshold: f64,
    pub attack_ratio_min: f64,
    pub min_packets: u64,
    pub udp_per_ip_pps: f64,
    pub syn_per_ip_pps: f64,
    pub icmp_per_ip_pps: f64,
    pub http_per_ip_pps: f64,
    pub heavy_hitter_threshold: u32,
    pub heavy_hitter_ip_limit: usize,
    pub baseline_udp_per_ip_pps: f64,
    pub burst_threshold: u32,
    pub burst_sub_window_ms: u64,
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            amplification_threshold: 2.2,
            attack_ratio_min: 0.05,
            min_packets: 500,
            udp_per_ip_pps: 5_000.0,
            syn_per_ip_pps: 3_000.0,
            icmp_per_ip_pps: 3_000.0,
            http_per_ip_pps: 2_500.0,
            heavy_hitter_threshold: 5_000,
            heavy_hitter_ip_limit: 5,
            baseline_udp_per_ip_pps: 10_000.0,
            burst_threshold: 1_000,
            burst_sub_window_ms: 100,
        }
    }
}
