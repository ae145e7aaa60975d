//! Per-worker polling loop.
//!
//! Workers are non-suspending: every iteration polls its RX queue,
//! classifies whatever arrived, and checks the shutdown flag. No
//! operation here may block or allocate once steady state is
//! reached.

use crate::source::PacketSource;
use ddos_classify::{Classifier, FirstAttackTsc};
use ddos_common::{AggregateCounters, Timestamp, WindowClock};
use ddos_sketch::Shard;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const BURST_SIZE: usize = 64;

/// Everything one worker thread owns exclusively: its shard, its
/// classifier (and therefore its sampler), and its queue index.
pub struct Worker<S: PacketSource> {
    worker_id: usize,
    queue: usize,
    source: S,
    classifier: Classifier,
    shard: Arc<Shard>,
    counters: Arc<AggregateCounters>,
    first_attack_tsc: Arc<FirstAttackTsc>,
    window_clock: Arc<WindowClock>,
    shutdown: Arc<AtomicBool>,
}

impl<S: PacketSource> Worker<S> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        worker_id: usize,
        queue: usize,
        source: S,
        classifier: Classifier,
        shard: Arc<Shard>,
        counters: Arc<AggregateCounters>,
        first_attack_tsc: Arc<FirstAttackTsc>,
        window_clock: Arc<WindowClock>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self { worker_id, queue, source, classifier, shard, counters, first_attack_tsc, window_clock, shutdown }
    }

    /// Run until the shutdown flag is observed. Drains the current
    /// burst before returning, so no in-flight packet is dropped on
    /// shutdown.
    pub fn run(mut self) {
        tracing::debug!(worker_id = self.worker_id, "worker starting");
        let mut burst: Vec<crate::source::RxPacket<'_>> = Vec::with_capacity(BURST_SIZE);
        let mut last_nic_drops = 0u64;

        loop {
            let shutting_down = self.shutdown.load(Ordering::Relaxed);

            burst.clear();
            let n = self.source.rx_burst(self.queue, &mut burst, BURST_SIZE);

            for packet in &burst {
                let now = Timestamp::now().as_nanos();
                self.window_clock.mark(now);
                self.classifier.classify_and_update(&self.counters, &self.shard, &self.first_attack_tsc, packet.data, now);
            }

            let nic = self.source.nic_stats();
            if nic.drops > last_nic_drops {
                self.counters.record_drops(nic.drops - last_nic_drops);
                last_nic_drops = nic.drops;
            }

            if shutting_down && n == 0 {
                break;
            }

            if n == 0 {
                std::hint::spin_loop();
            }
        }

        tracing::debug!(worker_id = self.worker_id, "worker stopped");
    }
}
