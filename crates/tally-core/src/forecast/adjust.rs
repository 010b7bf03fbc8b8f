//! Seasonal adjustment of projected points

use tracing::debug;

use crate::stats::round2;

use super::types::{ForecastPoint, SeasonalPattern};

/// Rescales forecast points that land in a seasonal month.
///
/// Adjustment is not idempotent: running it over already-adjusted points
/// scales them again. Apply it exactly once per forecast.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeasonalAdjuster;

impl SeasonalAdjuster {
    /// Multiply each point whose calendar month has a pattern by
    /// `1 + deviation / 100`, recording the deviation and the original value.
    ///
    /// `overall_average` is the two-level average the patterns were measured
    /// against; deviations are already relative to it.
    pub fn adjust(
        points: &[ForecastPoint],
        patterns: Option<&[SeasonalPattern]>,
        overall_average: f64,
    ) -> Vec<ForecastPoint> {
        let Some(patterns) = patterns.filter(|p| !p.is_empty()) else {
            return points.to_vec();
        };

        points
            .iter()
            .map(|point| {
                let Some(pattern) = patterns.iter().find(|p| p.month == point.period.month())
                else {
                    return point.clone();
                };
                let factor = 1.0 + pattern.deviation_percent / 100.0;
                debug!(
                    period = %point.period,
                    deviation = pattern.deviation_percent,
                    overall_average,
                    "Applying seasonal adjustment"
                );
                ForecastPoint {
                    value: round2(point.value * factor),
                    seasonal_adjustment: Some(pattern.deviation_percent),
                    unadjusted_value: Some(point.value),
                    ..point.clone()
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::types::PatternKind;
    use crate::period::YearMonth;

    fn point(index: u32, period: &str, value: f64) -> ForecastPoint {
        ForecastPoint {
            period_index: index,
            period: period.parse::<YearMonth>().unwrap(),
            value,
            seasonal_adjustment: None,
            unadjusted_value: None,
        }
    }

    fn december_high() -> Vec<SeasonalPattern> {
        vec![SeasonalPattern {
            month: 12,
            month_name: "December".to_string(),
            deviation_percent: 40.0,
            pattern: PatternKind::High,
            average_value: 1400.0,
            occurrences: 2,
        }]
    }

    #[test]
    fn test_no_patterns_is_noop() {
        let points = vec![point(1, "2024-12", 1000.0)];
        assert_eq!(SeasonalAdjuster::adjust(&points, None, 1000.0), points);
        assert_eq!(SeasonalAdjuster::adjust(&points, Some(&[]), 1000.0), points);
    }

    #[test]
    fn test_matching_month_scaled() {
        let points = vec![point(1, "2024-11", 1000.0), point(2, "2024-12", 1000.0)];
        let patterns = december_high();
        let adjusted = SeasonalAdjuster::adjust(&points, Some(&patterns), 1000.0);

        assert_eq!(adjusted[0], points[0]);
        assert_eq!(adjusted[1].value, 1400.0);
        assert_eq!(adjusted[1].seasonal_adjustment, Some(40.0));
        assert_eq!(adjusted[1].unadjusted_value, Some(1000.0));
        assert_eq!(adjusted[1].period_index, 2);
    }

    #[test]
    fn test_second_application_compounds() {
        let points = vec![point(1, "2024-12", 1000.0)];
        let patterns = december_high();

        let once = SeasonalAdjuster::adjust(&points, Some(&patterns), 1000.0);
        assert_eq!(once[0].unadjusted_value, Some(1000.0));

        let twice = SeasonalAdjuster::adjust(&once, Some(&patterns), 1000.0);
        assert_eq!(twice[0].value, 1960.0);
        assert_eq!(twice[0].unadjusted_value, Some(1400.0));
        assert_ne!(twice, once);
    }
}
