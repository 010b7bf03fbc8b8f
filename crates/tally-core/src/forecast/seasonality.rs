//! Calendar-month seasonality detection
//!
//! Groups a monthly series by calendar month across years and reports months
//! whose average sits well above or below the overall average. The overall
//! average is the mean of the per-month averages, so a month observed three
//! times does not outweigh one observed twice.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{Metric, MonthlyBucket};
use crate::period::month_name;
use crate::stats::{mean, round2};

use super::types::{PatternKind, SeasonalPattern};

/// Seasonality thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonalityConfig {
    /// Minimum buckets before seasonality is considered
    pub min_months: usize,
    /// Minimum times a calendar month must appear to be retained
    pub min_occurrences: usize,
    /// Absolute deviation (percent) a month must exceed to be reported
    pub deviation_threshold_percent: f64,
}

impl Default for SeasonalityConfig {
    fn default() -> Self {
        Self {
            min_months: 12,
            min_occurrences: 2,
            deviation_threshold_percent: 15.0,
        }
    }
}

/// Finds months that consistently deviate from the norm
#[derive(Debug, Clone, Default)]
pub struct SeasonalityDetector {
    config: SeasonalityConfig,
}

impl SeasonalityDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SeasonalityConfig) -> Self {
        Self { config }
    }

    /// Per-calendar-month values for months seen often enough
    fn retained_months(&self, buckets: &[MonthlyBucket], metric: Metric) -> BTreeMap<u32, Vec<f64>> {
        let mut by_month: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
        for bucket in buckets {
            by_month
                .entry(bucket.period.month())
                .or_default()
                .push(metric.value(bucket));
        }
        by_month.retain(|_, values| values.len() >= self.config.min_occurrences.max(1));
        by_month
    }

    /// Mean of per-month averages, `None` when there is too little history
    pub fn overall_average(&self, buckets: &[MonthlyBucket], metric: Metric) -> Option<f64> {
        if buckets.len() < self.config.min_months {
            return None;
        }
        let averages: Vec<f64> = self
            .retained_months(buckets, metric)
            .values()
            .map(|values| mean(values))
            .collect();
        if averages.is_empty() {
            return None;
        }
        Some(mean(&averages))
    }

    /// Detect significant months, most pronounced first.
    ///
    /// Returns `None` for short history, a zero overall average, or when no
    /// month crosses the threshold.
    pub fn detect(&self, buckets: &[MonthlyBucket], metric: Metric) -> Option<Vec<SeasonalPattern>> {
        if buckets.len() < self.config.min_months {
            debug!(
                months = buckets.len(),
                required = self.config.min_months,
                "Too few months for seasonality"
            );
            return None;
        }

        let months = self.retained_months(buckets, metric);
        if months.is_empty() {
            return None;
        }
        let averages: Vec<(u32, f64, usize)> = months
            .iter()
            .map(|(month, values)| (*month, mean(values), values.len()))
            .collect();
        let overall = mean(&averages.iter().map(|(_, avg, _)| *avg).collect::<Vec<_>>());
        if overall == 0.0 || !overall.is_finite() {
            return None;
        }

        let mut patterns: Vec<SeasonalPattern> = averages
            .into_iter()
            .filter_map(|(month, avg, occurrences)| {
                let deviation = (avg - overall) / overall * 100.0;
                if deviation.abs() <= self.config.deviation_threshold_percent {
                    return None;
                }
                Some(SeasonalPattern {
                    month,
                    month_name: month_name(month).to_string(),
                    deviation_percent: round2(deviation),
                    pattern: if deviation > 0.0 {
                        PatternKind::High
                    } else {
                        PatternKind::Low
                    },
                    average_value: round2(avg),
                    occurrences,
                })
            })
            .collect();

        patterns.sort_by(|a, b| {
            b.deviation_percent
                .abs()
                .total_cmp(&a.deviation_percent.abs())
        });

        debug!(
            metric = %metric,
            overall_average = overall,
            patterns = patterns.len(),
            "Seasonality pass complete"
        );

        if patterns.is_empty() {
            None
        } else {
            Some(patterns)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::YearMonth;

    /// Revenue series starting at `start` where `value_for(month)` picks each value
    fn series(start: &str, months: usize, value_for: impl Fn(u32) -> f64) -> Vec<MonthlyBucket> {
        let start: YearMonth = start.parse().unwrap();
        (0..months)
            .map(|i| {
                let period = start.plus_months(i as i64);
                let mut b = MonthlyBucket::empty(period);
                b.revenue = value_for(period.month());
                b
            })
            .collect()
    }

    #[test]
    fn test_short_history_returns_none() {
        let buckets = series("2024-01", 11, |_| 1000.0);
        assert!(SeasonalityDetector::new().detect(&buckets, Metric::Revenue).is_none());
        assert!(SeasonalityDetector::new()
            .overall_average(&buckets, Metric::Revenue)
            .is_none());
    }

    #[test]
    fn test_december_spike_detected() {
        let buckets = series("2022-01", 24, |m| if m == 12 { 1500.0 } else { 1000.0 });
        let patterns = SeasonalityDetector::new()
            .detect(&buckets, Metric::Revenue)
            .unwrap();

        assert_eq!(patterns.len(), 1);
        let december = &patterns[0];
        assert_eq!(december.month, 12);
        assert_eq!(december.month_name, "December");
        assert_eq!(december.pattern, PatternKind::High);
        assert_eq!(december.occurrences, 2);
        assert_eq!(december.average_value, 1500.0);
        assert!(december.deviation_percent >= 40.0 && december.deviation_percent <= 60.0);
    }

    #[test]
    fn test_months_seen_once_are_ignored() {
        // Only January and February repeat; the July spike is seen once
        let buckets = series("2023-01", 14, |m| if m == 7 { 9000.0 } else { 1000.0 });
        assert!(SeasonalityDetector::new().detect(&buckets, Metric::Revenue).is_none());
    }

    #[test]
    fn test_flat_and_zero_series() {
        let flat = series("2022-01", 24, |_| 1000.0);
        assert!(SeasonalityDetector::new().detect(&flat, Metric::Revenue).is_none());

        let zero = series("2022-01", 24, |_| 0.0);
        assert!(SeasonalityDetector::new().detect(&zero, Metric::Revenue).is_none());
    }

    #[test]
    fn test_sorted_by_absolute_deviation() {
        let buckets = series("2022-01", 24, |m| match m {
            3 => 500.0,
            11 => 1300.0,
            _ => 1000.0,
        });
        let patterns = SeasonalityDetector::new()
            .detect(&buckets, Metric::Revenue)
            .unwrap();
        assert_eq!(patterns.len(), 2);
        assert_eq!(patterns[0].month, 3);
        assert_eq!(patterns[0].pattern, PatternKind::Low);
        assert_eq!(patterns[1].month, 11);
        assert_eq!(patterns[1].pattern, PatternKind::High);
    }

    #[test]
    fn test_threshold_is_configurable() {
        let buckets = series("2022-01", 24, |m| if m == 6 { 1100.0 } else { 1000.0 });
        assert!(SeasonalityDetector::new().detect(&buckets, Metric::Revenue).is_none());

        let sensitive = SeasonalityDetector::with_config(SeasonalityConfig {
            deviation_threshold_percent: 5.0,
            ..Default::default()
        });
        let patterns = sensitive.detect(&buckets, Metric::Revenue).unwrap();
        assert_eq!(patterns[0].month, 6);
    }

    #[test]
    fn test_overall_average_is_two_level() {
        // 2023-01..2024-03: Jan-Mar appear twice, the rest once and are dropped
        let buckets = series("2023-01", 15, |m| match m {
            1 => 100.0,
            2 => 200.0,
            3 => 300.0,
            _ => 10_000.0,
        });
        let overall = SeasonalityDetector::new()
            .overall_average(&buckets, Metric::Revenue)
            .unwrap();
        assert_eq!(overall, 200.0);
    }
}
