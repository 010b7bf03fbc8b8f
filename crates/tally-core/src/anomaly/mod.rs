//! Anomaly detection over a tenant's ledger
//!
//! Detects:
//! - Spending spikes: a top category's current month well above its recent months
//! - Expense outliers: individual expenses with a high z-score against their peers
//! - Repeated transactions: the same amount and description seen several times
//! - Income drops: the latest month's income under half of the one before
//! - Unusual patterns: clusters of expenses in the small hours
//!
//! Every sub-check runs independently. A sub-check that fails is logged and
//! contributes nothing; the others still run.

pub mod types;

use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use chrono::{NaiveDate, Timelike};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::models::{CategoryTotal, LedgerRecord};
use crate::period::YearMonth;
use crate::stats::{mean, round2};

pub use types::{
    Anomaly, AnomalyKind, AnomalyReport, AnomalySummary, ExpectedRange, Sensitivity, Severity,
};

/// Anomaly detection thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    // Category spikes
    /// How many of the largest categories are checked for spikes
    pub spike_top_categories: usize,
    /// Months before the current one that form the baseline
    pub spike_history_months: u32,
    /// Current month must exceed baseline by this factor
    pub spike_multiplier: f64,

    // Z-score outliers
    /// z-score threshold at low sensitivity
    pub zscore_threshold_low: f64,
    /// z-score threshold at medium sensitivity
    pub zscore_threshold_medium: f64,
    /// z-score threshold at high sensitivity
    pub zscore_threshold_high: f64,
    /// Severity becomes high above threshold times this
    pub zscore_high_multiplier: f64,
    /// Minimum other expenses needed to score one expense
    pub zscore_min_peers: usize,
    /// Peer std-dev floor as a fraction of |peer mean|
    pub zscore_std_floor_ratio: f64,

    // Repeated transactions
    /// Occurrences at which a repeat is flagged (low severity)
    pub repeat_min_count: usize,
    /// Occurrences at which a repeat becomes medium severity
    pub repeat_medium_count: usize,

    // Income drop
    /// Flag when the latest month's income is strictly below previous * ratio
    pub income_drop_ratio: f64,

    // Unusual hours
    /// Flag a (category, hour) group with more than this many expenses
    pub unusual_min_count: usize,
    /// Hours strictly before this are unusual
    pub unusual_early_hour: u32,
    /// Hours strictly after this are unusual
    pub unusual_late_hour: u32,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            spike_top_categories: 5,
            spike_history_months: 6,
            spike_multiplier: 2.0,
            zscore_threshold_low: 3.5,
            zscore_threshold_medium: 2.5,
            zscore_threshold_high: 2.0,
            zscore_high_multiplier: 1.5,
            zscore_min_peers: 3,
            zscore_std_floor_ratio: 0.01, // 1% of peer mean
            repeat_min_count: 2,
            repeat_medium_count: 5,
            income_drop_ratio: 0.5,
            unusual_min_count: 5,
            unusual_early_hour: 6,
            unusual_late_hour: 22,
        }
    }
}

impl AnomalyConfig {
    /// z-score threshold for a sensitivity level
    pub fn threshold(&self, sensitivity: Sensitivity) -> f64 {
        match sensitivity {
            Sensitivity::Low => self.zscore_threshold_low,
            Sensitivity::Medium => self.zscore_threshold_medium,
            Sensitivity::High => self.zscore_threshold_high,
        }
    }
}

/// Per-run options
#[derive(Debug, Clone, Copy)]
pub struct DetectOptions {
    pub sensitivity: Sensitivity,
    /// "Today": defines the current month for spike and income checks
    pub as_of: NaiveDate,
    /// First date considered by the outlier, repeat and hour checks
    pub window_start: NaiveDate,
}

impl DetectOptions {
    pub fn new(sensitivity: Sensitivity, as_of: NaiveDate, window_start: NaiveDate) -> Self {
        Self {
            sensitivity,
            as_of,
            window_start,
        }
    }

    fn in_window(&self, date: NaiveDate) -> bool {
        date >= self.window_start && date <= self.as_of
    }
}

/// Runs all anomaly sub-checks
#[derive(Debug, Clone, Default)]
pub struct OutlierDetector {
    config: AnomalyConfig,
}

impl OutlierDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: AnomalyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnomalyConfig {
        &self.config
    }

    /// Run every sub-check and return anomalies ordered high to low severity.
    ///
    /// `transactions` should reach back at least `spike_history_months`
    /// before the current month so spike baselines are complete.
    pub fn detect(
        &self,
        transactions: &[LedgerRecord],
        category_breakdown: &[CategoryTotal],
        options: &DetectOptions,
    ) -> Vec<Anomaly> {
        let mut anomalies = Vec::new();

        self.run_check("category_spike", &mut anomalies, || {
            Ok(self.check_category_spikes(transactions, category_breakdown, options))
        });
        self.run_check("expense_outlier", &mut anomalies, || {
            self.check_expense_outliers(transactions, options)
        });
        self.run_check("repeated_transaction", &mut anomalies, || {
            Ok(self.check_repeated_transactions(transactions, options))
        });
        self.run_check("income_drop", &mut anomalies, || {
            self.check_income_drop(transactions, options)
        });
        self.run_check("unusual_pattern", &mut anomalies, || {
            Ok(self.check_unusual_hours(transactions, options))
        });

        // Stable: equal severities keep the order they were found in
        anomalies.sort_by_key(|a| a.severity.rank());

        info!(
            transactions = transactions.len(),
            anomalies = anomalies.len(),
            sensitivity = %options.sensitivity,
            "Anomaly detection complete"
        );

        anomalies
    }

    fn run_check<F>(&self, name: &str, anomalies: &mut Vec<Anomaly>, check: F)
    where
        F: FnOnce() -> Result<Vec<Anomaly>>,
    {
        match check() {
            Ok(found) => {
                debug!(check = name, found = found.len(), "Sub-check finished");
                anomalies.extend(found);
            }
            Err(e) => warn!(check = name, error = %e, "Sub-check failed, skipping"),
        }
    }

    /// Top categories whose current-month spend exceeds the multiplier times
    /// their average over prior months with activity
    fn check_category_spikes(
        &self,
        transactions: &[LedgerRecord],
        breakdown: &[CategoryTotal],
        options: &DetectOptions,
    ) -> Vec<Anomaly> {
        let current_month = YearMonth::from_date(options.as_of);
        let mut anomalies = Vec::new();

        for category in breakdown.iter().take(self.config.spike_top_categories) {
            match self.category_spike(transactions, &category.category, current_month, options.as_of)
            {
                Ok(Some(anomaly)) => anomalies.push(anomaly),
                Ok(None) => {}
                Err(e) => {
                    warn!(category = %category.category, error = %e, "Category spike check failed")
                }
            }
        }

        anomalies
    }

    fn category_spike(
        &self,
        transactions: &[LedgerRecord],
        category: &str,
        current_month: YearMonth,
        as_of: NaiveDate,
    ) -> Result<Option<Anomaly>> {
        let history_start = current_month.plus_months(-(self.config.spike_history_months as i64));
        let mut current = 0.0;
        let mut history: HashMap<YearMonth, f64> = HashMap::new();

        for record in transactions
            .iter()
            .filter(|r| r.is_expense() && r.date <= as_of)
            .filter(|r| r.category.as_deref().map(str::trim) == Some(category))
        {
            let month = record.period();
            if month == current_month {
                current += record.magnitude();
            } else if month >= history_start && month < current_month {
                *history.entry(month).or_insert(0.0) += record.magnitude();
            }
        }

        let monthly: Vec<f64> = history.into_values().filter(|v| *v > 0.0).collect();
        let baseline = mean(&monthly);
        if !baseline.is_finite() || !current.is_finite() {
            return Err(Error::InvalidData(format!(
                "Non-finite spending totals for {}",
                category
            )));
        }
        if baseline == 0.0 {
            return Ok(None);
        }

        if current > self.config.spike_multiplier * baseline {
            let increase = (current - baseline) / baseline * 100.0;
            return Ok(Some(
                Anomaly::new(
                    AnomalyKind::SpendingSpike,
                    Severity::High,
                    format!(
                        "Spending spike in {}: {:.0}% above the monthly average",
                        category, increase
                    ),
                )
                .with_category(category)
                .with_amount(round2(current))
                .with_expected_range(0.0, round2(baseline)),
            ));
        }

        Ok(None)
    }

    /// Expenses whose distance from the other expenses in the window exceeds
    /// the sensitivity threshold, measured in peer standard deviations
    fn check_expense_outliers(
        &self,
        transactions: &[LedgerRecord],
        options: &DetectOptions,
    ) -> Result<Vec<Anomaly>> {
        let expenses: Vec<&LedgerRecord> = transactions
            .iter()
            .filter(|r| r.is_expense() && options.in_window(r.date))
            .collect();

        let n = expenses.len();
        if n < self.config.zscore_min_peers + 1 {
            debug!(expenses = n, "Too few expenses for z-scores");
            return Ok(Vec::new());
        }

        let amounts: Vec<f64> = expenses.iter().map(|r| r.magnitude()).collect();
        let sum: f64 = amounts.iter().sum();
        let sum_sq: f64 = amounts.iter().map(|a| a * a).sum();
        if !sum.is_finite() || !sum_sq.is_finite() {
            return Err(Error::InvalidData(
                "Expense totals overflowed".to_string(),
            ));
        }

        let threshold = self.config.threshold(options.sensitivity);
        let peers = (n - 1) as f64;
        let mut anomalies = Vec::new();

        for (record, amount) in expenses.iter().zip(&amounts) {
            let peer_mean = (sum - amount) / peers;
            let peer_var = ((sum_sq - amount * amount) / peers - peer_mean * peer_mean).max(0.0);
            let floor = self.config.zscore_std_floor_ratio * peer_mean.abs();
            let std_dev = peer_var.sqrt().max(floor);
            if std_dev == 0.0 {
                continue;
            }

            let z = (amount - peer_mean).abs() / std_dev;
            if z <= threshold {
                continue;
            }

            let severity = if z > threshold * self.config.zscore_high_multiplier {
                Severity::High
            } else {
                Severity::Medium
            };
            let mut anomaly = Anomaly::new(
                AnomalyKind::ExpenseOutlier,
                severity,
                format!("Expense {:.2} standard deviations from average", z),
            )
            .with_amount(round2(*amount))
            .with_date(record.date)
            .with_transaction_id(record.id)
            .with_z_score(round2(z))
            .with_expected_range(
                round2(peer_mean - threshold * std_dev),
                round2(peer_mean + threshold * std_dev),
            );
            if !record.description.is_empty() {
                anomaly = anomaly.with_description(&record.description);
            }
            if let Some(category) = &record.category {
                anomaly = anomaly.with_category(category);
            }
            anomalies.push(anomaly);
        }

        Ok(anomalies)
    }

    /// Expenses sharing an amount and a normalized description
    fn check_repeated_transactions(
        &self,
        transactions: &[LedgerRecord],
        options: &DetectOptions,
    ) -> Vec<Anomaly> {
        // Encounter order is kept so output is deterministic
        let mut groups: Vec<((i64, String), &LedgerRecord, usize)> = Vec::new();
        let mut index: HashMap<(i64, String), usize> = HashMap::new();

        for record in transactions
            .iter()
            .filter(|r| r.is_expense() && options.in_window(r.date))
        {
            let description = normalize_description(&record.description);
            if description.is_empty() {
                continue;
            }
            let key = ((record.magnitude() * 100.0).round() as i64, description);
            match index.get(&key) {
                Some(&i) => groups[i].2 += 1,
                None => {
                    index.insert(key.clone(), groups.len());
                    groups.push((key, record, 1));
                }
            }
        }

        groups
            .into_iter()
            .filter(|(_, _, count)| *count >= self.config.repeat_min_count)
            .map(|(_, first, count)| {
                let severity = if count >= self.config.repeat_medium_count {
                    Severity::Medium
                } else {
                    Severity::Low
                };
                Anomaly::new(
                    AnomalyKind::RepeatedTransaction,
                    severity,
                    format!(
                        "Repeated transaction: {} (${:.2}, count: {})",
                        first.description.trim(),
                        first.magnitude(),
                        count
                    ),
                )
                .with_amount(round2(first.magnitude()))
                .with_description(first.description.trim())
                .with_occurrences(count)
            })
            .collect()
    }

    /// Latest month with income against the month with income before it
    ///
    /// Months without income are skipped, so a month whose income has not
    /// posted yet is not read as a drop.
    fn check_income_drop(
        &self,
        transactions: &[LedgerRecord],
        options: &DetectOptions,
    ) -> Result<Vec<Anomaly>> {
        let mut totals: BTreeMap<YearMonth, f64> = BTreeMap::new();
        for record in transactions
            .iter()
            .filter(|r| r.is_income() && r.date <= options.as_of)
        {
            *totals.entry(record.period()).or_default() += record.magnitude();
        }

        let mut with_income = totals.into_iter().rev().filter(|(_, total)| *total > 0.0);
        let Some((current_month, current)) = with_income.next() else {
            return Ok(Vec::new());
        };
        let Some((previous_month, previous)) = with_income.next() else {
            return Ok(Vec::new());
        };

        if !current.is_finite() || !previous.is_finite() {
            return Err(Error::InvalidData("Non-finite income totals".to_string()));
        }
        if current < previous * self.config.income_drop_ratio {
            return Ok(vec![Anomaly::new(
                AnomalyKind::IncomeDrop,
                Severity::High,
                format!(
                    "Income dropped by more than {:.0}% from {} to {}",
                    (1.0 - self.config.income_drop_ratio) * 100.0,
                    previous_month,
                    current_month
                ),
            )
            .with_amount(round2(current))
            .with_expected_range(0.0, round2(previous))]);
        }

        Ok(Vec::new())
    }

    /// Clusters of same-category expenses outside normal hours
    fn check_unusual_hours(
        &self,
        transactions: &[LedgerRecord],
        options: &DetectOptions,
    ) -> Vec<Anomaly> {
        let mut groups: Vec<((String, u32), usize)> = Vec::new();
        let mut index: HashMap<(String, u32), usize> = HashMap::new();

        for record in transactions
            .iter()
            .filter(|r| r.is_expense() && options.in_window(r.date))
        {
            let Some(time) = record.time else {
                continue;
            };
            let category = record
                .category
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .unwrap_or(crate::aggregate::UNCATEGORIZED)
                .to_string();
            let key = (category, time.hour());
            match index.get(&key) {
                Some(&i) => groups[i].1 += 1,
                None => {
                    index.insert(key.clone(), groups.len());
                    groups.push((key, 1));
                }
            }
        }

        groups
            .into_iter()
            .filter(|((_, hour), count)| {
                *count > self.config.unusual_min_count
                    && (*hour < self.config.unusual_early_hour
                        || *hour > self.config.unusual_late_hour)
            })
            .map(|((category, hour), count)| {
                Anomaly::new(
                    AnomalyKind::UnusualPattern,
                    Severity::Medium,
                    format!(
                        "Unusual spending pattern: {} at {:02}:00 ({} transactions)",
                        category, hour, count
                    ),
                )
                .with_category(&category)
                .with_occurrences(count)
            })
            .collect()
    }
}

/// Lowercase, trim and collapse internal whitespace
fn normalize_description(description: &str) -> String {
    static WHITESPACE_RE: OnceLock<Regex> = OnceLock::new();
    let re = WHITESPACE_RE.get_or_init(|| Regex::new(r"\s+").expect("valid regex"));
    re.replace_all(description.trim(), " ").to_lowercase()
}
