//! Lock-free aggregate packet counters, shared read-mostly by the
//! coordinator and written relaxed-atomic by every worker on the hot
//! path.
//!
//! Cache-line aligned for the same reason per-worker shards are: this
//! struct is written concurrently by every worker thread, so keeping
//! it on its own cache line keeps those writes from contending with
//! unrelated data.

use crate::net::TrafficClass;
use crate::AtomicCounter;
use std::sync::atomic::Ordering;

/// Protocols the classifier distinguishes for per-protocol PPS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Tcp,
    Udp,
    Icmp,
    Other,
}

impl Protocol {
    pub const ALL: [Protocol; 4] = [Protocol::Tcp, Protocol::Udp, Protocol::Icmp, Protocol::Other];

    /// Map an IPv4 `protocol` header byte to the distinguished set.
    pub fn from_ip_proto(proto: u8) -> Self {
        match proto {
            6 => Protocol::Tcp,
            17 => Protocol::Udp,
            1 => Protocol::Icmp,
            _ => Protocol::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::Icmp => "icmp",
            Protocol::Other => "other",
        }
    }
}

/// A snapshot of [`AggregateCounters`] taken with a single acquire
/// fence: increments use relaxed ordering, the coordinator reads
/// them with an acquire fence.
#[derive(Debug, Clone, Default)]
pub struct CounterSnapshot {
    pub total_packets: u64,
    pub class_packets: [u64; 3],
    pub protocol_packets: [u64; 4],
    pub syn_packets: u64,
    pub ack_packets: u64,
    pub http_indicator_packets: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub drops: u64,
}

impl CounterSnapshot {
    pub fn class(&self, class: TrafficClass) -> u64 {
        self.class_packets[class as usize]
    }

    pub fn protocol(&self, protocol: Protocol) -> u64 {
        self.protocol_packets[protocol as usize]
    }

    /// Component-wise subtraction against an earlier snapshot,
    /// producing the window delta the detection engine's fast tick
    /// operates on. Saturates at zero: a reset
    /// between snapshots must never yield a negative delta.
    pub fn delta_since(&self, start: &CounterSnapshot) -> CounterSnapshot {
        CounterSnapshot {
            total_packets: self.total_packets.saturating_sub(start.total_packets),
            class_packets: std::array::from_fn(|i| self.class_packets[i].saturating_sub(start.class_packets[i])),
            protocol_packets: std::array::from_fn(|i| self.protocol_packets[i].saturating_sub(start.protocol_packets[i])),
            syn_packets: self.syn_packets.saturating_sub(start.syn_packets),
            ack_packets: self.ack_packets.saturating_sub(start.ack_packets),
            http_indicator_packets: self.http_indicator_packets.saturating_sub(start.http_indicator_packets),
            bytes_in: self.bytes_in.saturating_sub(start.bytes_in),
            bytes_out: self.bytes_out.saturating_sub(start.bytes_out),
            drops: self.drops.saturating_sub(start.drops),
        }
    }

    /// `bytes_out / max(1, bytes_in)`, the amplification ratio R1
    /// consults.
    pub fn bytes_ratio(&self) -> f64 {
        self.bytes_out as f64 / self.bytes_in.max(1) as f64
    }
}

/// Lock-free, shared, read-mostly packet counters. One instance per
/// engine, written by every worker, read by the coordinator.
#[repr(C, align(64))]
#[derive(Default)]
pub struct AggregateCounters {
    total_packets: AtomicCounter,
    class_packets: [AtomicCounter; 3],
    protocol_packets: [AtomicCounter; 4],
    syn_packets: AtomicCounter,
    ack_packets: AtomicCounter,
    http_indicator_packets: AtomicCounter,
    bytes_in: AtomicCounter,
    bytes_out: AtomicCounter,
    drops: AtomicCounter,
}

impl AggregateCounters {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn record_packet(&self, class: TrafficClass, protocol: Protocol, bytes: u64, is_inbound: bool) {
        self.total_packets.inc();
        self.class_packets[class as usize].inc();
        self.protocol_packets[protocol as usize].inc();
        if is_inbound {
            self.bytes_in.add(bytes);
        } else {
            self.bytes_out.add(bytes);
        }
    }

    #[inline(always)]
    pub fn record_syn(&self) {
        self.syn_packets.inc();
    }

    #[inline(always)]
    pub fn record_ack(&self) {
        self.ack_packets.inc();
    }

    #[inline(always)]
    pub fn record_http_indicator(&self) {
        self.http_indicator_packets.inc();
    }

    #[inline(always)]
    pub fn record_drop(&self) {
        self.drops.inc();
    }

    pub fn record_drops(&self, n: u64) {
        self.drops.add(n);
    }

    /// Snapshot all counters with an acquire fence, matching the
    /// "bounded staleness of one burst" contract the coordinator depends on.
    pub fn snapshot(&self) -> CounterSnapshot {
        std::sync::atomic::fence(Ordering::Acquire);
        CounterSnapshot {
            total_packets: self.total_packets.get(),
            class_packets: std::array::from_fn(|i| self.class_packets[i].get()),
            protocol_packets: std::array::from_fn(|i| self.protocol_packets[i].get()),
            syn_packets: self.syn_packets.get(),
            ack_packets: self.ack_packets.get(),
            http_indicator_packets: self.http_indicator_packets.get(),
            bytes_in: self.bytes_in.get(),
            bytes_out: self.bytes_out.get(),
            drops: self.drops.get(),
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// `delta_since` must never produce a negative-looking delta
        /// (it saturates at zero) regardless of how `start` and
        /// `self` relate — the coordinator can't assume `self` was
        /// snapshotted after `start` if a shard reset raced the read.
        #[test]
        fn delta_since_never_exceeds_self(
            total_packets in 0u64..1_000_000,
            start_total_packets in 0u64..1_000_000,
        ) {
            let later = CounterSnapshot { total_packets, ..Default::default() };
            let earlier = CounterSnapshot { total_packets: start_total_packets, ..Default::default() };
            let delta = later.delta_since(&earlier);
            prop_assert!(delta.total_packets <= total_packets);
        }

        /// Delta against an identical snapshot is always all-zero.
        #[test]
        fn delta_since_self_is_zero(total_packets in 0u64..1_000_000, bytes_in in 0u64..1_000_000, bytes_out in 0u64..1_000_000) {
            let snap = CounterSnapshot { total_packets, bytes_in, bytes_out, ..Default::default() };
            let delta = snap.delta_since(&snap);
            prop_assert_eq!(delta.total_packets, 0);
            prop_assert_eq!(delta.bytes_in, 0);
            prop_assert_eq!(delta.bytes_out, 0);
        }

        /// `bytes_ratio` is always finite and non-negative, for any
        /// combination of byte counters the rule engine might see.
        #[test]
        fn bytes_ratio_is_always_finite(bytes_in in 0u64..u64::MAX / 2, bytes_out in 0u64..u64::MAX / 2) {
            let snap = CounterSnapshot { bytes_in, bytes_out, ..Default::default() };
            let ratio = snap.bytes_ratio();
            prop_assert!(ratio.is_finite());
            prop_assert!(ratio >= 0.0);
        }
    }
}
