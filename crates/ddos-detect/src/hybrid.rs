//! The hybrid rule/ML alert-level matrix.

use crate::alert::AlertLevel;
use crate::predictor::PredictedClass;

/// Combine the rule engine's verdict with the predictor's verdict per
/// the hybrid matrix: both fire -> Critical; rules only -> unchanged
/// (already High or below); ML only with confidence >= 0.75 ->
/// Medium, reason annotated "anomaly"; otherwise unchanged.
pub fn combine(rule_level: AlertLevel, rule_reason: &str, ml_class: PredictedClass, ml_confidence: f64) -> (AlertLevel, String) {
    let rules_fired = rule_level >= AlertLevel::High;
    let ml_fired = ml_class == PredictedClass::Anomalous && ml_confidence >= 0.75;

    match (rules_fired, ml_fired) {
        (true, true) => (AlertLevel::Critical, format!("{rule_reason}; ML confirms anomaly (confidence={ml_confidence:.2})")),
        (true, false) => (rule_level, rule_reason.to_string()),
        (false, true) if rule_level < AlertLevel::Medium => {
            (AlertLevel::Medium, format!("ML anomaly (confidence={ml_confidence:.2})"))
        }
        _ => (rule_level, rule_reason.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_fire_escalates_to_critical() {
        let (level, reason) = combine(AlertLevel::High, "R1 amplification", PredictedClass::Anomalous, 0.9);
        assert_eq!(level, AlertLevel::Critical);
        assert!(reason.contains("ML confirms"));
    }

    #[test]
    fn rules_only_unchanged() {
        let (level, _) = combine(AlertLevel::High, "R2 udp flood", PredictedClass::Normal, 0.1);
        assert_eq!(level, AlertLevel::High);
    }

    #[test]
    fn ml_only_escalates_quiet_window_to_medium() {
        let (level, reason) = combine(AlertLevel::None, "", PredictedClass::Anomalous, 0.8);
        assert_eq!(level, AlertLevel::Medium);
        assert!(reason.contains("anomaly"));
    }

    #[test]
    fn low_confidence_ml_does_not_escalate() {
        let (level, _) = combine(AlertLevel::None, "", PredictedClass::Anomalous, 0.5);
        assert_eq!(level, AlertLevel::None);
    }
}
