//! The five-step packet classify-and-update contract run once per
//! received packet on the worker thread.

use crate::packet::{parse_ipv4_packet, tcp_flags};
use crate::sampler::Sampler;
use ddos_common::net::{PrefixSet, ServerPortSet, TrafficClass, HTTP_INDICATOR_PORTS};
use ddos_common::{AggregateCounters, Protocol};
use ddos_sketch::{SampleMetrics, Shard};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared, per-worker latch marking the arrival timestamp (process-
/// relative nanos) of the first packet classified as attack traffic;
/// the detection engine's latency anchor.
#[derive(Default)]
pub struct FirstAttackTsc(AtomicU64);

impl FirstAttackTsc {
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// CAS from zero to `now`; a no-op once already set.
    #[inline(always)]
    pub fn mark(&self, now: u64) {
        let _ = self.0.compare_exchange(0, now, Ordering::AcqRel, Ordering::Acquire);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    pub fn is_set(&self) -> bool {
        self.get() != 0
    }

    pub fn reset(&self) {
        self.0.store(0, Ordering::Release);
    }
}

/// What a single call to [`classify_and_update`] observed, exposed
/// for callers (e.g. integration tests) that want to assert on
/// classification without re-deriving it from counters.
#[derive(Debug, Clone, Copy)]
pub struct ClassifyOutcome {
    pub class: TrafficClass,
    pub protocol: Protocol,
    pub sampled: bool,
}

/// Worker-owned classifier state: the CIDR table, server-port set,
/// and this worker's private sampler. Not `Sync` (the sampler isn't);
/// one instance per worker thread.
pub struct Classifier {
    prefixes: PrefixSet,
    server_ports: ServerPortSet,
    sampler: Sampler,
}

impl Classifier {
    pub fn new(prefixes: PrefixSet, server_ports: ServerPortSet, sample_rate: u32) -> Self {
        Self { prefixes, server_ports, sampler: Sampler::new(sample_rate) }
    }

    /// Run the full five-step contract against one raw Ethernet frame.
    /// Returns `None` for malformed or non-IPv4 packets after
    /// crediting them to `other` via `counters` (step 1).
    pub fn classify_and_update(
        &self,
        counters: &AggregateCounters,
        shard: &Shard,
        first_attack_tsc: &FirstAttackTsc,
        data: &[u8],
        now_nanos: u64,
    ) -> Option<ClassifyOutcome> {
        let parsed = match parse_ipv4_packet(data) {
            Some(p) => p,
            None => {
                counters.record_packet(TrafficClass::Other, Protocol::Other, data.len() as u64, true);
                return None;
            }
        };

        // Step 2: classify by longest-prefix membership.
        let class = self.prefixes.classify(Ipv4Addr::from(parsed.src_ip));

        // Step 3: aggregate counters.
        let protocol = if parsed.is_icmp() {
            Protocol::Icmp
        } else {
            Protocol::from_ip_proto(parsed.protocol)
        };

        let dst_port = parsed.transport.map(|t| t.dst_port).unwrap_or(0);
        let is_inbound = self.server_ports.contains(dst_port);
        counters.record_packet(class, protocol, parsed.total_len as u64, is_inbound);

        let mut metrics = SampleMetrics { udp: parsed.is_udp(), icmp: parsed.is_icmp(), ..Default::default() };

        if let Some(transport) = parsed.transport {
            if parsed.is_tcp() {
                if transport.tcp_flags & tcp_flags::SYN != 0 {
                    counters.record_syn();
                    metrics.syn = true;
                }
                if transport.tcp_flags & tcp_flags::ACK != 0 {
                    counters.record_ack();
                }
            }
            if HTTP_INDICATOR_PORTS.contains(&transport.dst_port) {
                counters.record_http_indicator();
                metrics.http = true;
            }
        }

        // Step 4: latency anchor.
        if class == TrafficClass::Attack {
            first_attack_tsc.mark(now_nanos);
        }

        // Step 5: sampled, unbiased-estimator sketch update.
        let sampled = self.sampler.tick();
        if sampled {
            let s = self.sampler.rate();
            shard.update_ip(class, parsed.src_ip, s, metrics);
        }

        Some(ClassifyOutcome { class, protocol, sampled })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddos_common::net::parse_cidr;

    fn packet_from(src: &str, dst_port: u16, proto: u8) -> Vec<u8> {
        let src: Ipv4Addr = src.parse().unwrap();
        let octets = src.octets();
        let mut pkt = vec![
            0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x08, 0x00, // eth + ipv4 ethertype
            0x45, 0x00, 0x00, 0x20, 0x00, 0x00, 0x00, 0x00,
            0x40, proto, 0x00, 0x00,
        ];
        pkt.extend_from_slice(&octets);
        pkt.extend_from_slice(&[10, 0, 0, 1]);
        pkt.extend_from_slice(&[0x30, 0x39]);
        pkt.extend_from_slice(&dst_port.to_be_bytes());
        pkt.extend_from_slice(&[0, 0, 0, 0]);
        pkt
    }

    #[test]
    fn attack_packet_marks_latency_anchor_once() {
        let prefixes = PrefixSet::new().with_attack(&[parse_cidr("203.0.113.0/24").unwrap()]);
        let classifier = Classifier::new(prefixes, ServerPortSet::default(), 1);
        let counters = AggregateCounters::new();
        let shard = Shard::new("w0", 4, 1024);
        let tsc = FirstAttackTsc::new();

        let pkt = packet_from("203.0.113.9", 53, 17);
        classifier.classify_and_update(&counters, &shard, &tsc, &pkt, 100);
        assert_eq!(tsc.get(), 100);

        classifier.classify_and_update(&counters, &shard, &tsc, &pkt, 200);
        assert_eq!(tsc.get(), 100, "latency anchor must not move after the first attack packet");
    }

    #[test]
    fn malformed_packet_counts_as_other() {
        let classifier = Classifier::new(PrefixSet::new(), ServerPortSet::default(), 1);
        let counters = AggregateCounters::new();
        let shard = Shard::new("w0", 4, 1024);
        let tsc = FirstAttackTsc::new();

        let outcome = classifier.classify_and_update(&counters, &shard, &tsc, &[0u8; 4], 1);
        assert!(outcome.is_none());
        assert_eq!(counters.snapshot().class(TrafficClass::Other), 1);
    }

    #[test]
    fn sampling_multiplies_sketch_increment_by_rate() {
        let prefixes = PrefixSet::new().with_attack(&[parse_cidr("203.0.113.0/24").unwrap()]);
        let classifier = Classifier::new(prefixes, ServerPortSet::default(), 10);
        let counters = AggregateCounters::new();
        let shard = Shard::new("w0", 4, 4096);
        let tsc = FirstAttackTsc::new();

        let pkt = packet_from("203.0.113.9", 53, 17);
        let src_ip = u32::from(Ipv4Addr::new(203, 0, 113, 9));

        for i in 0..20 {
            classifier.classify_and_update(&counters, &shard, &tsc, &pkt, i);
        }

        // Two sampled packets out of 20 at rate 10, each crediting 10.
        assert_eq!(shard.heavy_hitters(TrafficClass::Attack, 1)[0].ip, src_ip);
        assert!(shard.heavy_hitters(TrafficClass::Attack, 1)[0].count >= 20);
    }
}
