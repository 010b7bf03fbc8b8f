//! Anomaly result types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// What kind of irregularity was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    /// A single expense far from its peers
    ExpenseOutlier,
    /// Same amount and description seen several times
    RepeatedTransaction,
    /// A category's month-to-date spend well above its usual month
    SpendingSpike,
    /// Income fell sharply month over month
    IncomeDrop,
    /// Repeated spending at odd hours
    UnusualPattern,
}

impl AnomalyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExpenseOutlier => "expense_outlier",
            Self::RepeatedTransaction => "repeated_transaction",
            Self::SpendingSpike => "spending_spike",
            Self::IncomeDrop => "income_drop",
            Self::UnusualPattern => "unusual_pattern",
        }
    }
}

impl std::fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Anomaly severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    /// Sort rank, most severe first
    pub fn rank(&self) -> u8 {
        match self {
            Self::High => 0,
            Self::Medium => 1,
            Self::Low => 2,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How eagerly expenses are flagged as outliers
///
/// Higher sensitivity means a lower z-score threshold and more flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    Low,
    #[default]
    Medium,
    High,
}

impl Sensitivity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::str::FromStr for Sensitivity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(format!(
                "Unknown sensitivity: {} (expected low, medium, or high)",
                s
            )),
        }
    }
}

impl std::fmt::Display for Sensitivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Range a flagged value would normally fall in
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExpectedRange {
    pub min: f64,
    pub max: f64,
}

/// A single detected anomaly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    pub severity: Severity,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occurrences: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_range: Option<ExpectedRange>,
}

impl Anomaly {
    pub fn new(kind: AnomalyKind, severity: Severity, reason: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            reason: reason.into(),
            amount: None,
            occurrences: None,
            date: None,
            category: None,
            description: None,
            transaction_id: None,
            z_score: None,
            expected_range: None,
        }
    }

    pub fn with_amount(mut self, amount: f64) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_occurrences(mut self, occurrences: usize) -> Self {
        self.occurrences = Some(occurrences);
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_transaction_id(mut self, id: Option<i64>) -> Self {
        self.transaction_id = id;
        self
    }

    pub fn with_z_score(mut self, z: f64) -> Self {
        self.z_score = Some(z);
        self
    }

    pub fn with_expected_range(mut self, min: f64, max: f64) -> Self {
        self.expected_range = Some(ExpectedRange { min, max });
        self
    }
}

/// Anomaly counts per kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnomalySummary {
    pub expense_outliers: usize,
    pub repeated_transactions: usize,
    pub spending_spikes: usize,
    pub income_drops: usize,
    pub unusual_patterns: usize,
}

impl AnomalySummary {
    pub fn from_anomalies(anomalies: &[Anomaly]) -> Self {
        let mut summary = Self::default();
        for anomaly in anomalies {
            let slot = match anomaly.kind {
                AnomalyKind::ExpenseOutlier => &mut summary.expense_outliers,
                AnomalyKind::RepeatedTransaction => &mut summary.repeated_transactions,
                AnomalyKind::SpendingSpike => &mut summary.spending_spikes,
                AnomalyKind::IncomeDrop => &mut summary.income_drops,
                AnomalyKind::UnusualPattern => &mut summary.unusual_patterns,
            };
            *slot += 1;
        }
        summary
    }
}

/// Everything the anomalies endpoint returns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub period: String,
    pub sensitivity: Sensitivity,
    pub anomalies_found: usize,
    pub anomalies: Vec<Anomaly>,
    pub summary: AnomalySummary,
}

impl AnomalyReport {
    pub fn new(period: &str, sensitivity: Sensitivity, anomalies: Vec<Anomaly>) -> Self {
        Self {
            period: period.to_string(),
            sensitivity,
            anomalies_found: anomalies.len(),
            summary: AnomalySummary::from_anomalies(&anomalies),
            anomalies,
        }
    }
}
