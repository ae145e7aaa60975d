//! Tracks the arrival timestamps of the first and last packet within
//! a reporting interval, so idle gaps in replayed traffic don't
//! depress the throughput the statistics reporter computes: the
//! reporter treats the timestamp of arrival of the first and last
//! packet within the reporting interval as the authoritative window
//! bounds, not wall-clock ticks.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct WindowClock {
    first: AtomicU64,
    last: AtomicU64,
}

impl WindowClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Worker-side: record one packet's arrival. Cheap on the hot
    /// path: a CAS that only succeeds once per interval plus a
    /// relaxed max-store.
    #[inline(always)]
    pub fn mark(&self, now_nanos: u64) {
        let _ = self.first.compare_exchange(0, now_nanos, Ordering::Relaxed, Ordering::Relaxed);
        self.last.fetch_max(now_nanos, Ordering::Relaxed);
    }

    /// Coordinator-side: read the current window bounds.
    pub fn bounds(&self) -> (Option<u64>, Option<u64>) {
        let first = self.first.load(Ordering::Relaxed);
        let last = self.last.load(Ordering::Relaxed);
        (if first == 0 { None } else { Some(first) }, if last == 0 { None } else { Some(last) })
    }

    /// Coordinator-side: start a new reporting interval.
    pub fn reset(&self) {
        self.first.store(0, Ordering::Relaxed);
        self.last.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_mark_wins_subsequent_marks_extend_last() {
        let clock = WindowClock::new();
        clock.mark(100);
        clock.mark(50); // out of order arrival across workers
        clock.mark(200);

        let (first, last) = clock.bounds();
        assert_eq!(first, Some(100));
        assert_eq!(last, Some(200));
    }

    #[test]
    fn reset_clears_bounds() {
        let clock = WindowClock::new();
        clock.mark(10);
        clock.reset();
        assert_eq!(clock.bounds(), (None, None));
    }
}
