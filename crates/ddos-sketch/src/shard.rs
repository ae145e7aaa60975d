//! Per-worker shard: one sketch per (traffic class, metric) pair plus
//! a heavy-hitter candidate array, cache-line aligned to keep adjacent
//! workers' shards from false-sharing a cache line (the same alignment
//! idiom this corpus uses for per-core stats blocks).

use crate::sketch::Sketch;
use ddos_common::net::TrafficClass;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Number of slots in the IP-folded heavy-hitter candidate array
/// (one secondary fixed-size IP-indexed counter array of length
/// 2^16 per shard).
pub const IP_TABLE_SIZE: usize = 1 << 16;
const IP_TABLE_MASK: u32 = (IP_TABLE_SIZE as u32) - 1;

/// One slot of the heavy-hitter candidate table. Collisions overwrite
/// `ip` (last writer wins) while `count` keeps accumulating; this is
/// deliberately lossy; the table exists only to nominate *candidates*
/// for the authoritative sketch query, never to count authoritatively
/// — refinement against the sketch is what makes the nomination
/// authoritative.
#[repr(C)]
struct IpSlot {
    ip: AtomicU32,
    count: AtomicU32,
}

impl Default for IpSlot {
    fn default() -> Self {
        Self { ip: AtomicU32::new(0), count: AtomicU32::new(0) }
    }
}

#[inline(always)]
fn fold16(ip: u32) -> usize {
    ((ip ^ (ip >> 16)) & IP_TABLE_MASK) as usize
}

/// The per-IP metric dimension a shard tracks a dedicated sketch for,
/// on top of the all-traffic `Total` count every class always gets.
/// `Syn`/`Http` are flag/port-derived rather than wire protocols, so
/// this is a metric axis, not a `Protocol` mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SketchKind {
    Total,
    Udp,
    Syn,
    Icmp,
    Http,
}

impl SketchKind {
    pub const ALL: [SketchKind; 5] = [SketchKind::Total, SketchKind::Udp, SketchKind::Syn, SketchKind::Icmp, SketchKind::Http];

    pub fn as_str(&self) -> &'static str {
        match self {
            SketchKind::Total => "total",
            SketchKind::Udp => "udp",
            SketchKind::Syn => "syn",
            SketchKind::Icmp => "icmp",
            SketchKind::Http => "http",
        }
    }
}

/// Which per-IP metric sketches a single classified packet feeds,
/// decided once by the classifier from the parsed packet and threaded
/// down to `Shard::update_ip` so the shard never has to re-derive it.
/// `Total` is implicit and always updated.
#[derive(Debug, Clone, Copy, Default)]
pub struct SampleMetrics {
    pub udp: bool,
    pub syn: bool,
    pub icmp: bool,
    pub http: bool,
}

impl SampleMetrics {
    #[inline(always)]
    fn is_set(&self, kind: SketchKind) -> bool {
        match kind {
            SketchKind::Total => true,
            SketchKind::Udp => self.udp,
            SketchKind::Syn => self.syn,
            SketchKind::Icmp => self.icmp,
            SketchKind::Http => self.http,
        }
    }
}

/// A candidate-IP, approximate-count pair, count refined by a sketch
/// query before being handed to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeavyHitter {
    pub ip: u32,
    pub count: u32,
}

impl Ord for HeavyHitter {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reverse so a BinaryHeap behaves as a min-heap on count.
        other.count.cmp(&self.count)
    }
}

impl PartialOrd for HeavyHitter {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// A per-worker shard: one sketch per (class, metric) pair, a
/// heavy-hitter candidate table, and shard-level scalar counters.
/// Single-writer (its owning worker), single-reader (the coordinator
/// at merge time).
#[repr(C, align(64))]
pub struct Shard {
    label: String,
    sketches: Vec<(TrafficClass, SketchKind, Sketch)>,
    ip_table: Vec<IpSlot>,
    total_bytes: AtomicU64,
    generation: AtomicU64,
    observed_generation: AtomicU64,
}

impl Shard {
    /// Build a shard with one sketch per (class, metric) pair — the
    /// cartesian product of `TrafficClass::ALL` and `SketchKind::ALL`
    /// — all of shape `depth` x `width`.
    pub fn new(label: impl Into<String>, depth: usize, width: usize) -> Self {
        let label = label.into();
        let mut sketches = Vec::with_capacity(TrafficClass::ALL.len() * SketchKind::ALL.len());
        for class in TrafficClass::ALL {
            for kind in SketchKind::ALL {
                let sketch_label = format!("{label}:{}:{}", class.as_str(), kind.as_str());
                sketches.push((class, kind, Sketch::new(sketch_label, depth, width)));
            }
        }

        let mut ip_table = Vec::with_capacity(IP_TABLE_SIZE);
        ip_table.resize_with(IP_TABLE_SIZE, IpSlot::default);

        Self {
            label,
            sketches,
            ip_table,
            total_bytes: AtomicU64::new(0),
            generation: AtomicU64::new(0),
            observed_generation: AtomicU64::new(0),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    fn sketch(&self, class: TrafficClass, kind: SketchKind) -> &Sketch {
        &self
            .sketches
            .iter()
            .find(|(c, k, _)| *c == class && *k == kind)
            .expect("every (class, kind) pair has a sketch")
            .2
    }

    /// Worker-side hot path: honour a pending coordinator-issued reset
    /// (lazily, before this update lands) and then record the update
    /// against the `Total` sketch, every metric sketch `metrics`
    /// flags on, and the heavy-hitter candidate table.
    #[inline(always)]
    pub fn update_ip(&self, class: TrafficClass, ip: u32, inc: u32, metrics: SampleMetrics) {
        self.observe_generation();

        for (c, kind, sketch) in &self.sketches {
            if *c == class && metrics.is_set(*kind) {
                sketch.update(ip as u64, inc);
            }
        }

        let slot = &self.ip_table[fold16(ip)];
        slot.ip.store(ip, Ordering::Relaxed);
        slot.count.fetch_add(inc, Ordering::Relaxed);

        self.total_bytes.fetch_add(inc as u64, Ordering::Relaxed);
    }

    /// Bump this shard's aggregate byte counter independent of a
    /// specific classified update (used when the caller has already
    /// accounted for the packet against a sketch and only needs the
    /// shard-level scalar to move, e.g. "other" class traffic).
    pub fn add_bytes(&self, bytes: u64) {
        self.total_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes.load(Ordering::Relaxed)
    }

    /// Coordinator-side: merge this shard's per-(class, kind) sketches
    /// into `targets` (one merged sketch per pair, matching shape).
    pub fn merge_into<'a>(&'a self, targets: impl Iterator<Item = (TrafficClass, SketchKind, &'a Sketch)>) {
        for (class, kind, target) in targets {
            target.merge_from(&[self.sketch(class, kind)]);
        }
    }

    /// Coordinator-side: request this shard reset itself before its
    /// next update. Lock-free equivalent of a memset behind a release
    /// fence.
    pub fn request_reset(&self) {
        self.generation.fetch_add(1, Ordering::Release);
    }

    #[inline(always)]
    fn observe_generation(&self) {
        let current = self.generation.load(Ordering::Acquire);
        let observed = self.observed_generation.load(Ordering::Relaxed);
        if current != observed {
            for (_, _, sketch) in &self.sketches {
                sketch.reset();
            }
            for slot in &self.ip_table {
                slot.ip.store(0, Ordering::Relaxed);
                slot.count.store(0, Ordering::Relaxed);
            }
            self.total_bytes.store(0, Ordering::Relaxed);
            self.observed_generation.store(current, Ordering::Relaxed);
        }
    }

    /// Enumerate up to `k` heavy-hitter candidates for `class`,
    /// refined against this shard's own `Total` sketch (workers never
    /// call this; the coordinator calls it against the merged sketch
    /// for the class instead, see `merged_heavy_hitters`).
    pub fn heavy_hitters(&self, class: TrafficClass, k: usize) -> Vec<HeavyHitter> {
        top_k_candidates(&self.ip_table, k, |ip| self.sketch(class, SketchKind::Total).query(ip as u64))
    }

    /// Query a single (class, kind) sketch for `ip`, for callers (the
    /// window-delta builder) that already have a candidate IP and
    /// need its per-metric estimate rather than a fresh top-K scan.
    pub fn metric_query(&self, class: TrafficClass, kind: SketchKind, ip: u32) -> u32 {
        self.sketch(class, kind).query(ip as u64)
    }
}

/// Shared top-K scan used by both shard-local and merged-sketch heavy
/// hitter enumeration: scan the IP table once, maintain a K-element
/// min-heap keyed by approximate count, then refine each survivor's
/// count via `refine` (a sketch query).
pub(crate) fn top_k_candidates(ip_table: &[IpSlot], k: usize, refine: impl Fn(u32) -> u32) -> Vec<HeavyHitter> {
    if k == 0 {
        return Vec::new();
    }
    let mut heap: BinaryHeap<HeavyHitter> = BinaryHeap::with_capacity(k + 1);

    for slot in ip_table {
        let ip = slot.ip.load(Ordering::Relaxed);
        let count = slot.count.load(Ordering::Relaxed);
        if count == 0 {
            continue;
        }
        if heap.len() < k {
            heap.push(HeavyHitter { ip, count });
        } else if let Some(min) = heap.peek() {
            if count > min.count {
                heap.pop();
                heap.push(HeavyHitter { ip, count });
            }
        }
    }

    let mut result: Vec<HeavyHitter> = heap
        .into_iter()
        .map(|candidate| HeavyHitter { ip: candidate.ip, count: refine(candidate.ip) })
        .collect();
    result.sort_by(|a, b| b.count.cmp(&a.count));
    result
}

/// Coordinator-side: enumerate heavy-hitter candidates across every
/// worker's shard for `class`, refined against the already-merged
/// `Total` sketch for that class.
///
/// The per-worker IP tables are combined by summing counts at each
/// folded index and keeping the IP of whichever worker contributed
/// the larger share; this is the same collision-tolerant trade-off
/// the per-worker table already makes, just lifted across workers.
pub fn merged_heavy_hitters(shards: &[&Shard], class: TrafficClass, merged_total_sketch: &Sketch, k: usize) -> Vec<HeavyHitter> {
    let mut combined: Vec<IpSlot> = Vec::with_capacity(IP_TABLE_SIZE);
    combined.resize_with(IP_TABLE_SIZE, IpSlot::default);

    for shard in shards {
        for (idx, slot) in shard.ip_table.iter().enumerate() {
            let count = slot.count.load(Ordering::Relaxed);
            if count == 0 {
                continue;
            }
            let ip = slot.ip.load(Ordering::Relaxed);
            let dst = &combined[idx];
            let prior = dst.count.fetch_add(count, Ordering::Relaxed);
            if prior == 0 {
                dst.ip.store(ip, Ordering::Relaxed);
            }
        }
    }

    top_k_candidates(&combined, k, |ip| merged_total_sketch.query(ip as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_ip_feeds_both_sketch_and_candidate_table() {
        let shard = Shard::new("w0", 4, 1024);
        shard.update_ip(TrafficClass::Attack, 0xC0A8_0001, 1, SampleMetrics::default());
        shard.update_ip(TrafficClass::Attack, 0xC0A8_0001, 1, SampleMetrics::default());

        assert!(shard.sketch(TrafficClass::Attack, SketchKind::Total).query(0xC0A8_0001u64) >= 2);
        let hh = shard.heavy_hitters(TrafficClass::Attack, 5);
        assert_eq!(hh.len(), 1);
        assert_eq!(hh[0].ip, 0xC0A8_0001);
        assert!(hh[0].count >= 2);
    }

    #[test]
    fn update_ip_only_feeds_metric_sketches_flagged_on() {
        let shard = Shard::new("w0", 4, 1024);
        let ip = 0x0A00_0001;
        shard.update_ip(TrafficClass::Attack, ip, 5, SampleMetrics { udp: true, ..Default::default() });

        assert!(shard.metric_query(TrafficClass::Attack, SketchKind::Udp, ip) >= 5);
        assert_eq!(shard.metric_query(TrafficClass::Attack, SketchKind::Syn, ip), 0);
        assert_eq!(shard.metric_query(TrafficClass::Attack, SketchKind::Icmp, ip), 0);
        assert_eq!(shard.metric_query(TrafficClass::Attack, SketchKind::Http, ip), 0);
        assert!(shard.metric_query(TrafficClass::Attack, SketchKind::Total, ip) >= 5);
    }

    #[test]
    fn heavy_hitters_returns_top_k_by_count() {
        let shard = Shard::new("w0", 4, 4096);
        for (ip, hits) in [(1u32, 10u32), (2, 50), (3, 5), (4, 100)] {
            for _ in 0..hits {
                shard.update_ip(TrafficClass::Attack, ip, 1, SampleMetrics::default());
            }
        }
        let top2 = shard.heavy_hitters(TrafficClass::Attack, 2);
        assert_eq!(top2.len(), 2);
        assert_eq!(top2[0].ip, 4);
        assert_eq!(top2[1].ip, 2);
    }

    #[test]
    fn request_reset_is_observed_lazily_on_next_update() {
        let shard = Shard::new("w0", 4, 1024);
        shard.update_ip(TrafficClass::Baseline, 7, 9, SampleMetrics::default());
        assert!(shard.sketch(TrafficClass::Baseline, SketchKind::Total).query(7u64) >= 9);

        shard.request_reset();
        // Not yet observed: a pure read path doesn't trigger the lazy reset.
        assert!(shard.sketch(TrafficClass::Baseline, SketchKind::Total).query(7u64) >= 9);

        shard.update_ip(TrafficClass::Baseline, 11, 1, SampleMetrics::default());
        assert_eq!(shard.sketch(TrafficClass::Baseline, SketchKind::Total).query(7u64), 0);
    }

    #[test]
    fn merge_into_copies_shard_sketch_into_target() {
        let shard = Shard::new("w0", 4, 1024);
        shard.update_ip(TrafficClass::Attack, 42, 7, SampleMetrics::default());

        let merged = Sketch::new("merged:attack:total", 4, 1024);
        shard.merge_into(std::iter::once((TrafficClass::Attack, SketchKind::Total, &merged)));
        assert!(merged.query(42u64) >= 7);
    }

    #[test]
    fn merged_heavy_hitters_combines_across_workers() {
        let w0 = Shard::new("w0", 4, 4096);
        let w1 = Shard::new("w1", 4, 4096);

        for _ in 0..60 {
            w0.update_ip(TrafficClass::Attack, 99, 1, SampleMetrics::default());
        }
        for _ in 0..60 {
            w1.update_ip(TrafficClass::Attack, 99, 1, SampleMetrics::default());
        }
        for _ in 0..10 {
            w0.update_ip(TrafficClass::Attack, 7, 1, SampleMetrics::default());
        }

        let merged = Sketch::new("merged:attack:total", 4, 4096);
        w0.merge_into(std::iter::once((TrafficClass::Attack, SketchKind::Total, &merged)));
        let merged2 = Sketch::new("merged:attack:total2", 4, 4096);
        merged2.merge_from(&[w0.sketch(TrafficClass::Attack, SketchKind::Total), w1.sketch(TrafficClass::Attack, SketchKind::Total)]);

        let shards = [&w0, &w1];
        let top = merged_heavy_hitters(&shards, TrafficClass::Attack, &merged2, 1);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].ip, 99);
        assert!(top[0].count >= 120);
    }
}
