//! Structured logging of engine statistics, alerts, and detections.

pub mod lines;
pub mod reporter;

pub use lines::{AlertLine, ClassCounts, ComparisonBlock, DetectLine, ProtocolCounts, StatsLine};
pub use reporter::{ReportInput, StatisticsReporter};
