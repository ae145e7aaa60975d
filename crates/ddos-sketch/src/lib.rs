//! Lock-free, shardable Count-Min Sketch engine.
//!
//! `Sketch` is the single-shape D×W primitive (conservative-update
//! queries, additive merge). `Shard` bundles one sketch per traffic
//! class with a heavy-hitter candidate table and is the unit workers
//! own exclusively; the coordinator only ever reads a shard, never
//! mutates it, except to bump its reset generation.

pub mod shard;
pub mod sketch;

pub use shard::{merged_heavy_hitters, HeavyHitter, SampleMetrics, Shard, SketchKind, IP_TABLE_SIZE};
pub use sketch::{Sketch, MAX_DEPTH, MIN_DEPTH};
