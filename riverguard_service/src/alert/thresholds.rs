//! Depth threshold checking.
//!
//! Classification is done on the raw depth, never the clamped display value.
//! Banner text for the alert panel lives here too since it is keyed on the
//! same tier.

use crate::config::GaugeThresholds;
use crate::model::SeverityTier;

/// An alert banner raised when a reading reaches a threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct FloodAlert {
    pub severity: SeverityTier,
    pub title: String,
    pub message: String,
}

/// Maps a depth onto a severity tier.
///
/// Both thresholds are inclusive: a depth exactly at `flood_cm` is
/// CRITICAL and a depth exactly at `warning_cm` is WARNING.
pub fn classify(depth_cm: f64, thresholds: &GaugeThresholds) -> SeverityTier {
    if depth_cm >= thresholds.flood_cm {
        SeverityTier::Critical
    } else if depth_cm >= thresholds.warning_cm {
        SeverityTier::Warning
    } else {
        SeverityTier::Normal
    }
}

/// Fill level of the container as a percentage within 0..=100.
pub fn fill_percentage(depth_cm: f64, container_height_cm: f64) -> f64 {
    (depth_cm.max(0.0) / container_height_cm * 100.0).min(100.0)
}

/// Returns the banner for a reading, or `None` below the warning threshold.
pub fn check_depth(depth_cm: f64, thresholds: &GaugeThresholds) -> Option<FloodAlert> {
    let shown = depth_cm.max(0.0);
    match classify(depth_cm, thresholds) {
        SeverityTier::Critical => Some(FloodAlert {
            severity: SeverityTier::Critical,
            title: "CRITICAL WATER LEVEL".to_string(),
            message: format!("Water is {:.0}cm deep. Capacity limit reached.", shown),
        }),
        SeverityTier::Warning => Some(FloodAlert {
            severity: SeverityTier::Warning,
            title: "Water Rising".to_string(),
            message: format!("Water level is {:.0}cm. Approaching safe limits.", shown),
        }),
        SeverityTier::Normal => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> GaugeThresholds {
        GaugeThresholds {
            container_height_cm: 100.0,
            warning_cm: 70.0,
            flood_cm: 90.0,
        }
    }

    #[test]
    fn test_below_warning_is_normal() {
        assert_eq!(classify(69.9, &thresholds()), SeverityTier::Normal);
        assert_eq!(classify(0.0, &thresholds()), SeverityTier::Normal);
    }

    #[test]
    fn test_thresholds_are_inclusive() {
        assert_eq!(classify(70.0, &thresholds()), SeverityTier::Warning);
        assert_eq!(classify(90.0, &thresholds()), SeverityTier::Critical);
    }

    #[test]
    fn test_between_thresholds_is_warning() {
        assert_eq!(classify(89.99, &thresholds()), SeverityTier::Warning);
    }

    #[test]
    fn test_negative_and_over_capacity_depths_are_classified_literally() {
        assert_eq!(classify(-15.0, &thresholds()), SeverityTier::Normal);
        assert_eq!(classify(150.0, &thresholds()), SeverityTier::Critical);
    }

    #[test]
    fn test_classification_partitions_the_depth_range() {
        let t = thresholds();
        let mut depth = -20.0;
        while depth <= 160.0 {
            let tier = classify(depth, &t);
            assert_eq!(tier == SeverityTier::Critical, depth >= t.flood_cm, "depth {}", depth);
            assert_eq!(
                tier == SeverityTier::Warning,
                depth >= t.warning_cm && depth < t.flood_cm,
                "depth {}",
                depth
            );
            assert_eq!(tier == SeverityTier::Normal, depth < t.warning_cm, "depth {}", depth);
            depth += 0.5;
        }
    }

    #[test]
    fn test_fill_percentage_scenarios() {
        assert_eq!(fill_percentage(70.0, 100.0), 70.0);
        assert_eq!(fill_percentage(90.0, 100.0), 90.0);
        assert_eq!(fill_percentage(150.0, 100.0), 100.0);
        assert_eq!(fill_percentage(-5.0, 100.0), 0.0);
        assert_eq!(fill_percentage(25.0, 50.0), 50.0);
    }

    #[test]
    fn test_no_banner_for_normal_depth() {
        assert!(check_depth(12.0, &thresholds()).is_none());
    }

    #[test]
    fn test_warning_banner_text() {
        let alert = check_depth(74.6, &thresholds()).expect("warning depth should raise a banner");
        assert_eq!(alert.severity, SeverityTier::Warning);
        assert_eq!(alert.title, "Water Rising");
        assert_eq!(alert.message, "Water level is 75cm. Approaching safe limits.");
    }

    #[test]
    fn test_critical_banner_text() {
        let alert = check_depth(95.0, &thresholds()).expect("flood depth should raise a banner");
        assert_eq!(alert.severity, SeverityTier::Critical);
        assert_eq!(alert.title, "CRITICAL WATER LEVEL");
        assert!(alert.message.starts_with("Water is 95cm deep"));
    }
}
