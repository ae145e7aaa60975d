//! Shared primitives for the OctoSketch DDoS detection core.
//!
//! This crate provides the ambient stack every other crate in the
//! workspace depends on: the startup error taxonomy, a monotonic
//! timestamp usable as a cheap TSC substitute, lock-free counters,
//! CIDR-based traffic classification, and structured-logging setup.

#![warn(missing_docs)]

pub mod counters;
pub mod error;
pub mod metrics;
pub mod net;
pub mod window_clock;

pub use counters::{AggregateCounters, CounterSnapshot, Protocol};
pub use error::{AppError, AppResult, PredictError};
pub use window_clock::WindowClock;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

/// Monotonic nanosecond timestamp, measured relative to process start.
///
/// Real deployments of this design read the CPU's timestamp counter
/// directly (`RDTSC`) to avoid a syscall on the hot path; `Instant` is
/// the portable stand-in used here, with the same "cheap, monotonic,
/// comparable" contract the detection engine's latency anchor needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Timestamp(u64);

fn process_start() -> Instant {
    static START: OnceLock<Instant> = OnceLock::new();
    *START.get_or_init(Instant::now)
}

impl Timestamp {
    /// Zero value, used as the "unset" sentinel for
    /// `first_attack_packet_tsc`.
    pub const ZERO: Timestamp = Timestamp(0);

    /// Current timestamp, nanoseconds since process start.
    #[inline(always)]
    pub fn now() -> Self {
        Self(process_start().elapsed().as_nanos() as u64)
    }

    /// Raw nanosecond value.
    #[inline(always)]
    pub fn as_nanos(&self) -> u64 {
        self.0
    }

    /// True for the unset sentinel.
    #[inline(always)]
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Milliseconds elapsed between an earlier `self` and `other`.
    #[inline(always)]
    pub fn millis_since(&self, other: Timestamp) -> f64 {
        other.0.saturating_sub(self.0) as f64 / 1_000_000.0
    }
}

/// Lock-free counter for aggregate statistics. All increments use
/// relaxed ordering: callers need monotonicity and bounded staleness,
/// not sequential consistency, on the hot path.
#[derive(Debug, Default)]
pub struct AtomicCounter(AtomicU64);

impl AtomicCounter {
    pub const fn new(value: u64) -> Self {
        Self(AtomicU64::new(value))
    }

    #[inline(always)]
    pub fn inc(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }

    #[inline(always)]
    pub fn add(&self, val: u64) -> u64 {
        self.0.fetch_add(val, Ordering::Relaxed)
    }

    #[inline(always)]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    #[inline(always)]
    pub fn reset(&self) {
        self.0.store(0, Ordering::Relaxed)
    }
}

/// One-shot flag: starts false, transitions to true exactly once.
/// Used for `detection_triggered`, which must flip at most once per
/// run (testable property 4).
#[derive(Debug, Default)]
pub struct LatchFlag(std::sync::atomic::AtomicBool);

impl LatchFlag {
    pub const fn new() -> Self {
        Self(std::sync::atomic::AtomicBool::new(false))
    }

    /// Attempt the false->true transition. Returns `true` only on the
    /// call that performs the transition.
    #[inline(always)]
    pub fn trigger(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    #[inline(always)]
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Initialise the global `tracing` subscriber: an stdout `fmt` layer
/// plus, if `log_file` is given, a non-blocking rolling-file layer.
/// Verbosity is controlled by `RUST_LOG`, defaulting to `info`.
///
/// Returns the file-appender guard; dropping it flushes buffered
/// writes, so the caller must keep it alive for the process lifetime.
pub fn init_logging(log_file: Option<&std::path::Path>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = tracing_subscriber::fmt::layer();

    match log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| std::path::Path::new("."));
            let file_name = path.file_name().unwrap_or_else(|| std::ffi::OsStr::new("octosketch.log"));
            let file_appender = tracing_appender::rolling::never(dir, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let file_layer = tracing_subscriber::fmt::layer().with_ansi(false).with_writer(non_blocking);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(stdout_layer)
                .with(file_layer)
                .init();

            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(env_filter).with(stdout_layer).init();
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_is_monotonic() {
        let t1 = Timestamp::now();
        std::thread::sleep(std::time::Duration::from_micros(200));
        let t2 = Timestamp::now();
        assert!(t2 > t1);
    }

    #[test]
    fn atomic_counter_increments() {
        let counter = AtomicCounter::new(0);
        assert_eq!(counter.inc(), 0);
        assert_eq!(counter.inc(), 1);
        assert_eq!(counter.get(), 2);
    }

    #[test]
    fn latch_flag_fires_once() {
        let latch = LatchFlag::new();
        assert!(latch.trigger());
        assert!(!latch.trigger());
        assert!(latch.is_set());
    }
}
