//! Sliding-window rule-based DDoS detection, with optional ML
//! augmentation via the hybrid alert-level matrix.

pub mod alert;
pub mod config;
pub mod engine;
pub mod hybrid;
pub mod predictor;
pub mod rules;
pub mod window;

pub use alert::{AlertLevel, AlertRecord};
pub use config::RuleThresholds;
pub use engine::{evaluate_tick, DetectionState};
pub use predictor::{FeatureVector, NoopPredictor, PredictedClass, Predictor, ThresholdPredictor};
pub use window::{compute_window_deltas, HeavyHitterEstimate, WindowDeltas};
