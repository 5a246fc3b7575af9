//! Dose anomaly classification.
//!
//! Two checks per reading: did the weight drop by one prescribed dose, and
//! was the bottle opened inside a dosing window (widened by a grace margin).
//! A timing anomaly takes precedence over a count anomaly.

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use dose_core::models::{Anomaly, DosingWindow};

/// Grace period on either side of a dosing window.
pub const DEFAULT_WINDOW_MARGIN_MINUTES: u32 = 30;

/// Result of classifying one reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// Pills removed since the previous reading
    pub pills_taken: i64,
    pub anomaly: Anomaly,
}

/// Classifies readings against a prescription and its dosing windows.
#[derive(Debug, Clone, Copy)]
pub struct DoseClassifier {
    margin_seconds: i64,
}

impl Default for DoseClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl DoseClassifier {
    pub fn new() -> Self {
        Self::with_margin_minutes(DEFAULT_WINDOW_MARGIN_MINUTES)
    }

    pub fn with_margin_minutes(minutes: u32) -> Self {
        Self {
            margin_seconds: i64::from(minutes) * 60,
        }
    }

    /// Pills removed between two weights; 0 when the pill weight is unknown.
    pub fn pills_taken(previous_grams: f64, grams: f64, grams_per_pill: f64) -> i64 {
        if grams_per_pill <= 0.0 || !grams_per_pill.is_finite() {
            return 0;
        }
        ((previous_grams - grams) / grams_per_pill).round() as i64
    }

    /// Early or late when `at` falls outside every widened window.
    ///
    /// `None` when the time is inside a window or no window is readable.
    pub fn timing(&self, at: NaiveTime, windows: &[DosingWindow]) -> Option<Anomaly> {
        let t = i64::from(at.num_seconds_from_midnight());

        let spans: Vec<(i64, i64)> = windows
            .iter()
            .filter_map(|w| {
                let start = i64::from(w.start_time()?.num_seconds_from_midnight());
                let end = w
                    .end_time()
                    .map(|e| i64::from(e.num_seconds_from_midnight()))
                    .unwrap_or(start)
                    .max(start);
                Some((start, end))
            })
            .collect();

        if spans.is_empty() {
            return None;
        }

        let inside = spans
            .iter()
            .any(|&(start, end)| t >= start - self.margin_seconds && t <= end + self.margin_seconds);
        if inside {
            return None;
        }

        let distance = |&(start, end): &(i64, i64)| {
            if t < start {
                start - t
            } else {
                (t - end).max(0)
            }
        };
        let nearest = spans.iter().min_by_key(|span| distance(span))?;

        if t < nearest.0 {
            Some(Anomaly::Early)
        } else {
            Some(Anomaly::Late)
        }
    }

    /// Classify a reading.
    ///
    /// Without a previous weight there is nothing to compare, so only timing
    /// is checked.
    pub fn classify(
        &self,
        previous_grams: Option<f64>,
        grams: f64,
        grams_per_pill: f64,
        pills_per_dose: u32,
        at: NaiveTime,
        windows: &[DosingWindow],
    ) -> Classification {
        let pills_taken = previous_grams
            .map(|previous| Self::pills_taken(previous, grams, grams_per_pill))
            .unwrap_or(0);

        let count_anomaly = match previous_grams {
            Some(_) if pills_taken != i64::from(pills_per_dose) => Anomaly::DoseMismatch,
            _ => Anomaly::None,
        };

        Classification {
            pills_taken,
            anomaly: self.timing(at, windows).unwrap_or(count_anomaly),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, "%H:%M").unwrap()
    }

    fn windows() -> Vec<DosingWindow> {
        vec![
            DosingWindow::new("08:00", "08:00"),
            DosingWindow::new("20:00", "20:30"),
        ]
    }

    #[test]
    fn test_pills_taken_rounds() {
        assert_eq!(DoseClassifier::pills_taken(30.0, 29.1, 0.45), 2);
        assert_eq!(DoseClassifier::pills_taken(30.0, 31.0, 0.5), -2);
        assert_eq!(DoseClassifier::pills_taken(30.0, 29.0, 0.0), 0);
    }

    #[test]
    fn test_timing_inside_margin() {
        let classifier = DoseClassifier::new();
        assert_eq!(classifier.timing(t("07:30"), &windows()), None);
        assert_eq!(classifier.timing(t("08:30"), &windows()), None);
        assert_eq!(classifier.timing(t("21:00"), &windows()), None);
    }

    #[test]
    fn test_timing_outside_windows() {
        let classifier = DoseClassifier::new();
        assert_eq!(classifier.timing(t("07:29"), &windows()), Some(Anomaly::Early));
        assert_eq!(classifier.timing(t("10:00"), &windows()), Some(Anomaly::Late));
        assert_eq!(classifier.timing(t("18:00"), &windows()), Some(Anomaly::Early));
        assert_eq!(classifier.timing(t("23:00"), &windows()), Some(Anomaly::Late));
    }

    #[test]
    fn test_timing_without_windows() {
        let classifier = DoseClassifier::new();
        assert_eq!(classifier.timing(t("03:00"), &[]), None);
        let unreadable = vec![DosingWindow::new("morning", "")];
        assert_eq!(classifier.timing(t("03:00"), &unreadable), None);
    }

    #[test]
    fn test_classify_count_and_timing() {
        let classifier = DoseClassifier::new();

        let on_time = classifier.classify(Some(30.0), 29.5, 0.5, 1, t("08:10"), &windows());
        assert_eq!(on_time.pills_taken, 1);
        assert_eq!(on_time.anomaly, Anomaly::None);

        let wrong_count = classifier.classify(Some(30.0), 29.0, 0.5, 1, t("08:10"), &windows());
        assert_eq!(wrong_count.anomaly, Anomaly::DoseMismatch);

        // Timing overrides the count anomaly
        let late_and_wrong = classifier.classify(Some(30.0), 29.0, 0.5, 1, t("12:00"), &windows());
        assert_eq!(late_and_wrong.anomaly, Anomaly::Late);

        let first = classifier.classify(None, 29.0, 0.5, 1, t("08:00"), &windows());
        assert_eq!(first.pills_taken, 0);
        assert_eq!(first.anomaly, Anomaly::None);
    }

    #[test]
    fn test_custom_margin() {
        let strict = DoseClassifier::with_margin_minutes(5);
        assert_eq!(strict.timing(t("07:50"), &windows()), Some(Anomaly::Early));
    }
}
