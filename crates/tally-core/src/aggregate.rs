//! Monthly aggregation of ledger records
//!
//! Turns a tenant's raw ledger into a gap-free monthly series, plus the
//! category breakdown and moving averages the reporting endpoints expose.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{CategoryTotal, LedgerRecord, MonthlyBucket, MonthlySummary, MovingAveragePoint};
use crate::period::YearMonth;
use crate::stats::round2;

/// Maximum rows in a category breakdown
pub const CATEGORY_BREAKDOWN_LIMIT: usize = 15;

/// Category label that counts as "no category"
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Build one bucket per month from `start` through `end` inclusive.
///
/// Months without activity are zero-filled and records dated outside the
/// window are ignored, so the result always has exactly
/// `start.months_until(end) + 1` entries.
pub fn monthly_buckets(
    records: &[LedgerRecord],
    start: YearMonth,
    end: YearMonth,
) -> Result<Vec<MonthlyBucket>> {
    if start > end {
        return Err(Error::InvalidData(format!(
            "Window start {} is after end {}",
            start, end
        )));
    }

    let mut by_month: BTreeMap<YearMonth, MonthlyBucket> = start
        .through(end)
        .map(|m| (m, MonthlyBucket::empty(m)))
        .collect();

    let mut ignored = 0usize;
    for record in records {
        let Some(bucket) = by_month.get_mut(&record.period()) else {
            ignored += 1;
            continue;
        };
        if record.is_income() {
            bucket.revenue += record.magnitude();
        } else {
            bucket.expenses += record.magnitude();
        }
        bucket.transaction_count += 1;
    }

    if ignored > 0 {
        debug!(ignored, %start, %end, "Records outside the aggregation window");
    }

    Ok(by_month
        .into_values()
        .map(|mut b| {
            b.profit = b.revenue - b.expenses;
            b
        })
        .collect())
}

/// Expense totals per category for records dated on or after `since`.
///
/// Missing, blank and "Uncategorized" categories are left out. Ordered by
/// total descending (ties by name) and capped at [`CATEGORY_BREAKDOWN_LIMIT`].
pub fn category_breakdown(records: &[LedgerRecord], since: NaiveDate) -> Vec<CategoryTotal> {
    let mut totals: HashMap<&str, (f64, u64)> = HashMap::new();

    for record in records.iter().filter(|r| r.is_expense() && r.date >= since) {
        let Some(category) = record.category.as_deref().map(str::trim) else {
            continue;
        };
        if category.is_empty() || category == UNCATEGORIZED {
            continue;
        }
        let entry = totals.entry(category).or_insert((0.0, 0));
        entry.0 += record.magnitude();
        entry.1 += 1;
    }

    let mut breakdown: Vec<CategoryTotal> = totals
        .into_iter()
        .map(|(category, (total, count))| CategoryTotal {
            category: category.to_string(),
            total: round2(total),
            count,
            average: round2(total / count as f64),
        })
        .collect();

    breakdown.sort_by(|a, b| {
        b.total
            .total_cmp(&a.total)
            .then_with(|| a.category.cmp(&b.category))
    });
    breakdown.truncate(CATEGORY_BREAKDOWN_LIMIT);
    breakdown
}

/// Trailing moving average over `window` buckets.
///
/// The window shrinks at the start of the series, so the first point is
/// the first bucket itself.
pub fn moving_average(buckets: &[MonthlyBucket], window: usize) -> Result<Vec<MovingAveragePoint>> {
    if window == 0 {
        return Err(Error::InvalidData(
            "Moving average window must be at least 1".to_string(),
        ));
    }

    Ok(buckets
        .iter()
        .enumerate()
        .map(|(i, bucket)| {
            let subset = &buckets[i.saturating_sub(window - 1)..=i];
            let n = subset.len() as f64;
            MovingAveragePoint {
                period: bucket.period,
                revenue: round2(subset.iter().map(|b| b.revenue).sum::<f64>() / n),
                expenses: round2(subset.iter().map(|b| b.expenses).sum::<f64>() / n),
                profit: round2(subset.iter().map(|b| b.profit).sum::<f64>() / n),
            }
        })
        .collect())
}

/// Totals and per-month averages across a series
pub fn summarize(buckets: &[MonthlyBucket]) -> MonthlySummary {
    let total_revenue: f64 = buckets.iter().map(|b| b.revenue).sum();
    let total_expenses: f64 = buckets.iter().map(|b| b.expenses).sum();
    let months = buckets.len().max(1) as f64;

    MonthlySummary {
        total_revenue: round2(total_revenue),
        total_expenses: round2(total_expenses),
        total_profit: round2(total_revenue - total_expenses),
        average_monthly_revenue: round2(total_revenue / months),
        average_monthly_expenses: round2(total_expenses / months),
        transaction_count: buckets.iter().map(|b| b.transaction_count).sum(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn ym(s: &str) -> YearMonth {
        s.parse().unwrap()
    }

    #[test]
    fn test_buckets_zero_fill_gaps() {
        let records = vec![
            LedgerRecord::income(d(2024, 1, 5), 500.0),
            LedgerRecord::expense(d(2024, 1, 9), 200.0),
            LedgerRecord::income(d(2024, 3, 2), 300.0),
        ];

        let buckets = monthly_buckets(&records, ym("2024-01"), ym("2024-04")).unwrap();
        assert_eq!(buckets.len(), 4);

        assert_eq!(buckets[0].revenue, 500.0);
        assert_eq!(buckets[0].expenses, 200.0);
        assert_eq!(buckets[0].profit, 300.0);
        assert_eq!(buckets[0].transaction_count, 2);

        assert_eq!(buckets[1], MonthlyBucket::empty(ym("2024-02")));
        assert_eq!(buckets[2].revenue, 300.0);
        assert_eq!(buckets[3].transaction_count, 0);
    }

    #[test]
    fn test_buckets_empty_input_and_outside_records() {
        let records = vec![LedgerRecord::income(d(2023, 6, 1), 1000.0)];
        let buckets = monthly_buckets(&records, ym("2024-01"), ym("2024-06")).unwrap();
        assert_eq!(buckets.len(), 6);
        assert!(buckets.iter().all(|b| b.revenue == 0.0 && b.transaction_count == 0));

        let buckets = monthly_buckets(&[], ym("2023-11"), ym("2024-02")).unwrap();
        let periods: Vec<String> = buckets.iter().map(|b| b.period.to_string()).collect();
        assert_eq!(periods, vec!["2023-11", "2023-12", "2024-01", "2024-02"]);
    }

    #[test]
    fn test_buckets_negative_amounts_use_kind() {
        let records = vec![
            LedgerRecord::expense(d(2024, 1, 1), -75.0),
            LedgerRecord::expense(d(2024, 1, 2), 25.0),
            LedgerRecord::income(d(2024, 1, 3), f64::NAN),
        ];
        let buckets = monthly_buckets(&records, ym("2024-01"), ym("2024-01")).unwrap();
        assert_eq!(buckets[0].expenses, 100.0);
        assert_eq!(buckets[0].revenue, 0.0);
        assert_eq!(buckets[0].profit, -100.0);
        assert_eq!(buckets[0].transaction_count, 3);
    }

    #[test]
    fn test_buckets_reject_inverted_window() {
        assert!(monthly_buckets(&[], ym("2024-05"), ym("2024-01")).is_err());
    }

    #[test]
    fn test_category_breakdown_filters_and_orders() {
        let since = d(2024, 1, 1);
        let records = vec![
            LedgerRecord::expense(d(2024, 1, 3), 50.0).with_category("Food"),
            LedgerRecord::expense(d(2024, 1, 4), 30.0).with_category("Food"),
            LedgerRecord::expense(d(2024, 1, 5), 120.0).with_category("Rent"),
            LedgerRecord::expense(d(2024, 1, 6), 999.0).with_category("Uncategorized"),
            LedgerRecord::expense(d(2024, 1, 7), 999.0),
            LedgerRecord::income(d(2024, 1, 8), 5000.0).with_category("Sales"),
            LedgerRecord::expense(d(2023, 12, 31), 10_000.0).with_category("Travel"),
        ];

        let breakdown = category_breakdown(&records, since);
        assert_eq!(breakdown.len(), 2);
        assert_eq!(breakdown[0].category, "Rent");
        assert_eq!(breakdown[1].category, "Food");
        assert_eq!(breakdown[1].total, 80.0);
        assert_eq!(breakdown[1].count, 2);
        assert_eq!(breakdown[1].average, 40.0);
    }

    #[test]
    fn test_category_breakdown_limit() {
        let since = d(2024, 1, 1);
        let records: Vec<LedgerRecord> = (0..20)
            .map(|i| {
                LedgerRecord::expense(d(2024, 1, 10), 100.0 + i as f64)
                    .with_category(&format!("Cat{:02}", i))
            })
            .collect();
        let breakdown = category_breakdown(&records, since);
        assert_eq!(breakdown.len(), CATEGORY_BREAKDOWN_LIMIT);
        assert_eq!(breakdown[0].category, "Cat19");
    }

    #[test]
    fn test_moving_average_shrinks_at_start() {
        let mut buckets: Vec<MonthlyBucket> = ym("2024-01")
            .through(ym("2024-04"))
            .map(MonthlyBucket::empty)
            .collect();
        for (i, b) in buckets.iter_mut().enumerate() {
            b.revenue = 100.0 * (i + 1) as f64;
            b.profit = b.revenue;
        }

        let avg = moving_average(&buckets, 3).unwrap();
        assert_eq!(avg.len(), 4);
        assert_eq!(avg[0].revenue, 100.0);
        assert_eq!(avg[1].revenue, 150.0);
        assert_eq!(avg[2].revenue, 200.0);
        assert_eq!(avg[3].revenue, 300.0);
        assert!(moving_average(&buckets, 0).is_err());
    }

    #[test]
    fn test_summarize() {
        let records = vec![
            LedgerRecord::income(d(2024, 1, 5), 1000.0),
            LedgerRecord::expense(d(2024, 2, 5), 400.0),
        ];
        let buckets = monthly_buckets(&records, ym("2024-01"), ym("2024-02")).unwrap();
        let summary = summarize(&buckets);
        assert_eq!(summary.total_revenue, 1000.0);
        assert_eq!(summary.total_profit, 600.0);
        assert_eq!(summary.average_monthly_expenses, 200.0);
        assert_eq!(summary.transaction_count, 2);
    }
}
