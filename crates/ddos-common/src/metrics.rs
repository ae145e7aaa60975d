//! Lock-free latency histogram used to track fast-tick processing time.
//!
//! The engine's value proposition is sub-50ms detection latency, so the
//! coordinator records per-tick cycles/packet here; `snapshot()` exposes
//! p50/p90/p99 for callers that want more than the running average the
//! statistics reporter currently surfaces.

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free histogram for latency tracking, recorded in microseconds.
#[derive(Debug)]
pub struct LatencyHistogram {
    /// Buckets: 0-1us, 1-5us, 5-10us, 10-50us, 50-100us, 100-500us, 500us-1ms, >1ms
    buckets: [AtomicU64; 8],
    count: AtomicU64,
    sum_us: AtomicU64,
    min_us: AtomicU64,
    max_us: AtomicU64,
}

const BUCKET_LIMITS_US: [u64; 8] = [1, 5, 10, 50, 100, 500, 1000, u64::MAX];

impl LatencyHistogram {
    pub const fn new() -> Self {
        Self {
            buckets: [
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
            ],
            count: AtomicU64::new(0),
            sum_us: AtomicU64::new(0),
            min_us: AtomicU64::new(u64::MAX),
            max_us: AtomicU64::new(0),
        }
    }

    #[inline(always)]
    pub fn record(&self, latency_us: u64) {
        let bucket = match latency_us {
            0..=1 => 0,
            2..=5 => 1,
            6..=10 => 2,
            11..=50 => 3,
            51..=100 => 4,
            101..=500 => 5,
            501..=1000 => 6,
            _ => 7,
        };

        self.buckets[bucket].fetch_add(1, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_us.fetch_add(latency_us, Ordering::Relaxed);

        loop {
            let current_min = self.min_us.load(Ordering::Relaxed);
            if latency_us >= current_min {
                break;
            }
            if self
                .min_us
                .compare_exchange_weak(current_min, latency_us, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                break;
            }
        }

        loop {
            let current_max = self.max_us.load(Ordering::Relaxed);
            if latency_us <= current_max {
                break;
            }
            if self
                .max_us
                .compare_exchange_weak(current_max, latency_us, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                break;
            }
        }
    }

    pub fn average(&self) -> f64 {
        let count = self.count.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        self.sum_us.load(Ordering::Relaxed) as f64 / count as f64
    }

    /// Approximate percentile via bucket accumulation, not exact order statistics.
    pub fn percentile(&self, p: f64) -> u64 {
        let target = (self.count.load(Ordering::Relaxed) as f64 * p) as u64;
        let mut cumulative = 0u64;
        for (i, bucket) in self.buckets.iter().enumerate() {
            cumulative += bucket.load(Ordering::Relaxed);
            if cumulative >= target {
                return BUCKET_LIMITS_US[i];
            }
        }
        BUCKET_LIMITS_US[7]
    }

    pub fn p99(&self) -> u64 {
        self.percentile(0.99)
    }

    pub fn snapshot(&self) -> HistogramSnapshot {
        HistogramSnapshot {
            count: self.count.load(Ordering::Relaxed),
            min_us: self.min_us.load(Ordering::Relaxed),
            max_us: self.max_us.load(Ordering::Relaxed),
            avg_us: self.average(),
            p50: self.percentile(0.50),
            p90: self.percentile(0.90),
            p99: self.percentile(0.99),
        }
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct HistogramSnapshot {
    pub count: u64,
    pub min_us: u64,
    pub max_us: u64,
    pub avg_us: f64,
    pub p50: u64,
    pub p90: u64,
    pub p99: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_count_and_average() {
        let h = LatencyHistogram::new();
        h.record(1);
        h.record(5);
        h.record(10);
        h.record(50);
        h.record(100);

        assert_eq!(h.snapshot().count, 5);
        assert!(h.average() > 0.0);
    }

    #[test]
    fn min_max_track_extremes() {
        let h = LatencyHistogram::new();
        h.record(42);
        h.record(3);
        h.record(900);
        let snap = h.snapshot();
        assert_eq!(snap.min_us, 3);
        assert_eq!(snap.max_us, 900);
    }
}
