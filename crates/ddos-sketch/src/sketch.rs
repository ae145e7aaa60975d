//! Count-Min Sketch primitive with Conservative Update queries.
//!
//! Updates and queries touch only plain relaxed atomics — no locks, no
//! CAS loops, no fences — so a worker thread can update its private
//! sketch on the hot path while the coordinator concurrently reads the
//! same memory at merge time. The
//! atomics exist purely to make that concurrent read well-defined, not
//! to provide any ordering guarantee between rows or buckets.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Number of independent hash rows, D. Fixed in [4, 8].
pub const MIN_DEPTH: usize = 4;
pub const MAX_DEPTH: usize = 8;

/// Base odd multiplier used to derive per-row hash seeds and to mix
/// keys, in the same FxHash-style multiply-rotate family this corpus
/// uses for flow-key hashing.
const HASH_MULTIPLIER: u64 = 0x517c_c1b7_2722_0a95;

/// A D×W Count-Min Sketch: `depth` independent hash rows, `width`
/// buckets per row (a power of two, so column selection is a mask
/// rather than a modulo).
pub struct Sketch {
    label: String,
    depth: usize,
    width: usize,
    width_mask: u64,
    seeds: Vec<u64>,
    counters: Vec<AtomicU32>,
    total_updates: AtomicU64,
    total_bytes: AtomicU64,
}

impl Sketch {
    /// Build a new sketch. `width` must be a power of two; `depth`
    /// must fall in `[MIN_DEPTH, MAX_DEPTH]`.
    pub fn new(label: impl Into<String>, depth: usize, width: usize) -> Self {
        assert!((MIN_DEPTH..=MAX_DEPTH).contains(&depth), "depth must be in [4,8], got {depth}");
        assert!(width.is_power_of_two(), "width must be a power of two, got {width}");

        let seeds: Vec<u64> = (0..depth)
            .map(|i| HASH_MULTIPLIER.wrapping_mul(2 * i as u64 + 1) ^ 0x9E37_79B9_7F4A_7C15)
            .collect();

        let mut counters = Vec::with_capacity(depth * width);
        counters.resize_with(depth * width, || AtomicU32::new(0));

        Self {
            label: label.into(),
            depth,
            width,
            width_mask: (width as u64) - 1,
            seeds,
            counters,
            total_updates: AtomicU64::new(0),
            total_bytes: AtomicU64::new(0),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn width(&self) -> usize {
        self.width
    }

    #[inline(always)]
    fn column(&self, key: u64, row: usize) -> usize {
        let mut h = key ^ self.seeds[row];
        h = h.wrapping_mul(HASH_MULTIPLIER);
        h ^= h >> 33;
        (h & self.width_mask) as usize
    }

    #[inline(always)]
    fn index(&self, row: usize, col: usize) -> usize {
        row * self.width + col
    }

    /// Add `inc` to every row's bucket for `key`.
    #[inline(always)]
    pub fn update(&self, key: u64, inc: u32) {
        for row in 0..self.depth {
            let col = self.column(key, row);
            self.counters[self.index(row, col)].fetch_add(inc, Ordering::Relaxed);
        }
        self.total_updates.fetch_add(1, Ordering::Relaxed);
        self.total_bytes.fetch_add(inc as u64, Ordering::Relaxed);
    }

    /// Conservative Update query: the minimum across the D rows'
    /// buckets for `key`. Never underestimates the true count a key
    /// was seen.
    #[inline(always)]
    pub fn query(&self, key: u64) -> u32 {
        (0..self.depth)
            .map(|row| {
                let col = self.column(key, row);
                self.counters[self.index(row, col)].load(Ordering::Relaxed)
            })
            .min()
            .unwrap_or(0)
    }

    /// Zero all counters and scalars.
    pub fn reset(&self) {
        for c in &self.counters {
            c.store(0, Ordering::Relaxed);
        }
        self.total_updates.store(0, Ordering::Relaxed);
        self.total_bytes.store(0, Ordering::Relaxed);
    }

    pub fn total_updates(&self) -> u64 {
        self.total_updates.load(Ordering::Relaxed)
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes.load(Ordering::Relaxed)
    }

    /// Additive merge: `self.counters[i][j] = sum_w others[w].counters[i][j]`.
    /// All merged sketches must share this sketch's shape; mismatched
    /// shapes are a programmer error, not a runtime failure mode.
    pub fn merge_from(&self, others: &[&Sketch]) {
        for c in &self.counters {
            c.store(0, Ordering::Relaxed);
        }
        self.total_updates.store(0, Ordering::Relaxed);
        self.total_bytes.store(0, Ordering::Relaxed);

        for other in others {
            assert_eq!(other.depth, self.depth, "merge requires identical shape");
            assert_eq!(other.width, self.width, "merge requires identical shape");
            for (dst, src) in self.counters.iter().zip(other.counters.iter()) {
                dst.fetch_add(src.load(Ordering::Relaxed), Ordering::Relaxed);
            }
            self.total_updates.fetch_add(other.total_updates(), Ordering::Relaxed);
            self.total_bytes.fetch_add(other.total_bytes(), Ordering::Relaxed);
        }
    }
}
