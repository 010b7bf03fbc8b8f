//! Domain models for Tally

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::period::YearMonth;

/// Direction of money movement for a ledger record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowKind {
    Income,
    Expense,
}

impl FlowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl std::str::FromStr for FlowKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "income" | "revenue" => Ok(Self::Income),
            "expense" | "expenses" => Ok(Self::Expense),
            _ => Err(format!("Unknown transaction type: {}", s)),
        }
    }
}

impl std::fmt::Display for FlowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single ledger entry for one tenant
///
/// `kind` is authoritative; `amount` is read as a magnitude so a negative
/// expense and a positive expense aggregate the same way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRecord {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub client_id: Option<String>,
    pub date: NaiveDate,
    /// Time of day, when the source system recorded one
    #[serde(default)]
    pub time: Option<NaiveTime>,
    pub amount: f64,
    #[serde(rename = "type")]
    pub kind: FlowKind,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: String,
}

impl LedgerRecord {
    pub fn new(date: NaiveDate, amount: f64, kind: FlowKind) -> Self {
        Self {
            id: None,
            user_id: String::new(),
            client_id: None,
            date,
            time: None,
            amount,
            kind,
            category: None,
            description: String::new(),
        }
    }

    pub fn income(date: NaiveDate, amount: f64) -> Self {
        Self::new(date, amount, FlowKind::Income)
    }

    pub fn expense(date: NaiveDate, amount: f64) -> Self {
        Self::new(date, amount, FlowKind::Expense)
    }

    /// Build a record from a signed amount: negative is an expense,
    /// zero or positive is income
    pub fn from_signed(date: NaiveDate, signed_amount: f64) -> Self {
        let kind = if signed_amount < 0.0 {
            FlowKind::Expense
        } else {
            FlowKind::Income
        };
        Self::new(date, signed_amount.abs(), kind)
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_time(mut self, time: NaiveTime) -> Self {
        self.time = Some(time);
        self
    }

    pub fn with_tenant(mut self, user_id: &str, client_id: Option<&str>) -> Self {
        self.user_id = user_id.to_string();
        self.client_id = client_id.map(str::to_string);
        self
    }

    /// Non-negative amount used by every aggregate. Non-finite amounts count as zero.
    pub fn magnitude(&self) -> f64 {
        if self.amount.is_finite() {
            self.amount.abs()
        } else {
            0.0
        }
    }

    pub fn is_income(&self) -> bool {
        self.kind == FlowKind::Income
    }

    pub fn is_expense(&self) -> bool {
        self.kind == FlowKind::Expense
    }

    pub fn period(&self) -> YearMonth {
        YearMonth::from_date(self.date)
    }
}

/// Totals for one calendar month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyBucket {
    pub period: YearMonth,
    pub revenue: f64,
    pub expenses: f64,
    pub profit: f64,
    pub transaction_count: u64,
}

impl MonthlyBucket {
    /// A month with no activity
    pub fn empty(period: YearMonth) -> Self {
        Self {
            period,
            revenue: 0.0,
            expenses: 0.0,
            profit: 0.0,
            transaction_count: 0,
        }
    }
}

/// The series a forecast or seasonality pass is computed over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Revenue,
    Expenses,
    Profit,
    TransactionCount,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Revenue => "revenue",
            Self::Expenses => "expenses",
            Self::Profit => "profit",
            Self::TransactionCount => "transaction_count",
        }
    }

    /// Read this metric from a bucket
    pub fn value(&self, bucket: &MonthlyBucket) -> f64 {
        match self {
            Self::Revenue => bucket.revenue,
            Self::Expenses => bucket.expenses,
            Self::Profit => bucket.profit,
            Self::TransactionCount => bucket.transaction_count as f64,
        }
    }

    /// Extract the whole series in bucket order
    pub fn series(&self, buckets: &[MonthlyBucket]) -> Vec<f64> {
        buckets.iter().map(|b| self.value(b)).collect()
    }

    /// Whether projections of this metric are floored at zero
    pub fn is_non_negative(&self) -> bool {
        matches!(self, Self::Revenue | Self::TransactionCount)
    }
}

impl std::str::FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "revenue" | "income" => Ok(Self::Revenue),
            "expenses" | "expense" => Ok(Self::Expenses),
            "profit" | "net" => Ok(Self::Profit),
            "transaction_count" | "count" | "transactions" => Ok(Self::TransactionCount),
            _ => Err(format!("Unknown metric: {}", s)),
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Expense total for one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: String,
    pub total: f64,
    pub count: u64,
    pub average: f64,
}

/// Trailing average of one bucket's neighbourhood
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovingAveragePoint {
    pub period: YearMonth,
    pub revenue: f64,
    pub expenses: f64,
    pub profit: f64,
}

/// Totals across a monthly series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySummary {
    pub total_revenue: f64,
    pub total_expenses: f64,
    pub total_profit: f64,
    pub average_monthly_revenue: f64,
    pub average_monthly_expenses: f64,
    pub transaction_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 17).unwrap()
    }

    #[test]
    fn test_from_signed_derives_kind() {
        let expense = LedgerRecord::from_signed(date(), -42.5);
        assert_eq!(expense.kind, FlowKind::Expense);
        assert_eq!(expense.amount, 42.5);

        let income = LedgerRecord::from_signed(date(), 100.0);
        assert_eq!(income.kind, FlowKind::Income);
    }

    #[test]
    fn test_magnitude_normalizes_sign_and_nan() {
        let mut record = LedgerRecord::expense(date(), -25.0);
        assert_eq!(record.magnitude(), 25.0);

        record.amount = f64::NAN;
        assert_eq!(record.magnitude(), 0.0);

        record.amount = f64::INFINITY;
        assert_eq!(record.magnitude(), 0.0);
    }

    #[test]
    fn test_record_json_uses_type_field() {
        let json = r#"{"date":"2024-05-17","amount":12.0,"type":"expense","category":"Food"}"#;
        let record: LedgerRecord = serde_json::from_str(json).unwrap();
        assert!(record.is_expense());
        assert_eq!(record.category.as_deref(), Some("Food"));
        assert_eq!(record.description, "");
        assert!(record.time.is_none());
    }

    #[test]
    fn test_metric_parse_and_value() {
        let bucket = MonthlyBucket {
            period: YearMonth::from_date(date()),
            revenue: 10.0,
            expenses: 4.0,
            profit: 6.0,
            transaction_count: 3,
        };
        assert_eq!("revenue".parse::<Metric>().unwrap().value(&bucket), 10.0);
        assert_eq!("net".parse::<Metric>().unwrap().value(&bucket), 6.0);
        assert_eq!(Metric::TransactionCount.value(&bucket), 3.0);
        assert!("margin".parse::<Metric>().is_err());
        assert!(Metric::Revenue.is_non_negative());
        assert!(!Metric::Profit.is_non_negative());
    }
}
