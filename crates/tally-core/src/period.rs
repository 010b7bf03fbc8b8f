//! Calendar periods used by the analytics layer
//!
//! - `YearMonth` - a calendar month, rendered as `YYYY-MM`
//! - `Lookback` - a relative window such as `30d`, `3m`, `1y`
//! - `TimeRange` - forecast history presets (`30days`, `1year`, ...)

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{Datelike, Duration, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// English name of a 1-based calendar month ("" when out of range)
pub fn month_name(month: u32) -> &'static str {
    match month {
        1..=12 => MONTH_NAMES[(month - 1) as usize],
        _ => "",
    }
}

/// A calendar month
///
/// Ordering is chronological. Serialized as a `YYYY-MM` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    /// Create a month, validating `month` is 1-12
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(Error::InvalidData(format!(
                "Month must be 1-12, got {}",
                month
            )));
        }
        Ok(Self { year, month })
    }

    /// The month a date falls in
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn month_name(&self) -> &'static str {
        month_name(self.month)
    }

    /// First calendar day of the month
    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Last calendar day of the month
    pub fn last_day(&self) -> NaiveDate {
        self.succ()
            .first_day()
            .pred_opt()
            .unwrap_or(NaiveDate::MAX)
    }

    /// Whether `date` falls in this month
    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    /// The following month
    pub fn succ(self) -> Self {
        self.plus_months(1)
    }

    /// Shift by `n` months (negative shifts go back in time)
    pub fn plus_months(self, n: i64) -> Self {
        let index = self.year as i64 * 12 + (self.month as i64 - 1) + n;
        Self {
            year: index.div_euclid(12) as i32,
            month: index.rem_euclid(12) as u32 + 1,
        }
    }

    /// Number of months from `self` to `other` (negative if `other` is earlier)
    pub fn months_until(&self, other: YearMonth) -> i64 {
        (other.year as i64 - self.year as i64) * 12 + (other.month as i64 - self.month as i64)
    }

    /// Inclusive iterator from `self` through `end`
    pub fn through(self, end: YearMonth) -> impl Iterator<Item = YearMonth> {
        let count = self.months_until(end).max(-1) + 1;
        (0..count).map(move |i| self.plus_months(i))
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| format!("Invalid month (use YYYY-MM): {}", s))?;
        let year: i32 = year
            .parse()
            .map_err(|_| format!("Invalid year in month: {}", s))?;
        let month: u32 = month
            .parse()
            .map_err(|_| format!("Invalid month number in month: {}", s))?;
        YearMonth::new(year, month).map_err(|e| e.to_string())
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for YearMonth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A relative lookback window, always expressed in days
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lookback {
    days: i64,
}

impl Lookback {
    /// Window used when a period string is missing or malformed
    pub const DEFAULT_DAYS: i64 = 30;

    /// Parse `<n><unit>` where unit is `d` (days), `m` (30-day months) or
    /// `y` (365-day years). Anything else falls back to 30 days.
    pub fn parse(period: &str) -> Self {
        static PERIOD_RE: OnceLock<Regex> = OnceLock::new();
        let re = PERIOD_RE.get_or_init(|| Regex::new(r"^(\d+)([dmy])$").expect("valid regex"));

        let days = re
            .captures(period.trim())
            .and_then(|caps| {
                let value: i64 = caps[1].parse().ok()?;
                let multiplier = match &caps[2] {
                    "d" => 1,
                    "m" => 30,
                    "y" => 365,
                    _ => return None,
                };
                value.checked_mul(multiplier)
            })
            .unwrap_or(Self::DEFAULT_DAYS);

        Self { days }
    }

    pub fn days(&self) -> i64 {
        self.days
    }

    /// First date inside the window ending at `as_of`
    pub fn since(&self, as_of: NaiveDate) -> NaiveDate {
        Duration::try_days(self.days)
            .and_then(|window| as_of.checked_sub_signed(window))
            .unwrap_or(NaiveDate::MIN)
    }
}

impl Default for Lookback {
    fn default() -> Self {
        Self {
            days: Self::DEFAULT_DAYS,
        }
    }
}

/// History window presets accepted by the forecast endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeRange {
    #[serde(rename = "30days")]
    Days30,
    #[default]
    #[serde(rename = "90days")]
    Days90,
    #[serde(rename = "180days")]
    Days180,
    #[serde(rename = "1year")]
    Year1,
    #[serde(rename = "2years")]
    Years2,
}

impl TimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Days30 => "30days",
            Self::Days90 => "90days",
            Self::Days180 => "180days",
            Self::Year1 => "1year",
            Self::Years2 => "2years",
        }
    }

    /// Months of monthly history to feed the forecaster
    pub fn months(&self) -> u32 {
        match self {
            Self::Days30 => 3,
            Self::Days90 => 6,
            Self::Days180 => 12,
            Self::Year1 => 12,
            Self::Years2 => 24,
        }
    }

    /// Parse a preset, falling back to the default for unknown values
    pub fn parse_or_default(s: Option<&str>) -> Self {
        s.and_then(|s| s.parse().ok()).unwrap_or_default()
    }
}

impl FromStr for TimeRange {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "30days" => Ok(Self::Days30),
            "90days" => Ok(Self::Days90),
            "180days" => Ok(Self::Days180),
            "1year" => Ok(Self::Year1),
            "2years" => Ok(Self::Years2),
            _ => Err(format!("Unknown time range: {}", s)),
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The inclusive month window of `months` calendar months ending with the
/// month of `as_of`
pub fn trailing_months(as_of: NaiveDate, months: u32) -> (YearMonth, YearMonth) {
    let end = YearMonth::from_date(as_of);
    let start = end.plus_months(-(months.max(1) as i64 - 1));
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ym(s: &str) -> YearMonth {
        s.parse().unwrap()
    }

    #[test]
    fn test_year_month_display_and_parse() {
        let m = YearMonth::new(2024, 3).unwrap();
        assert_eq!(m.to_string(), "2024-03");
        assert_eq!(ym("2024-03"), m);
        assert!("2024-13".parse::<YearMonth>().is_err());
        assert!("202403".parse::<YearMonth>().is_err());
        assert!(YearMonth::new(2024, 0).is_err());
    }

    #[test]
    fn test_year_month_arithmetic_crosses_years() {
        assert_eq!(ym("2023-12").succ(), ym("2024-01"));
        assert_eq!(ym("2024-01").plus_months(-1), ym("2023-12"));
        assert_eq!(ym("2024-05").plus_months(-17), ym("2022-12"));
        assert_eq!(ym("2023-01").months_until(ym("2024-06")), 17);
        assert_eq!(ym("2024-06").months_until(ym("2023-01")), -17);
    }

    #[test]
    fn test_year_month_days() {
        let feb = ym("2024-02");
        assert_eq!(feb.first_day(), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(feb.last_day(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(ym("2023-12").last_day(), NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());
        assert!(feb.contains(NaiveDate::from_ymd_opt(2024, 2, 15).unwrap()));
        assert!(!feb.contains(NaiveDate::from_ymd_opt(2023, 2, 15).unwrap()));
    }

    #[test]
    fn test_year_month_through() {
        let months: Vec<String> = ym("2023-11")
            .through(ym("2024-02"))
            .map(|m| m.to_string())
            .collect();
        assert_eq!(months, vec!["2023-11", "2023-12", "2024-01", "2024-02"]);
        assert_eq!(ym("2024-02").through(ym("2023-11")).count(), 0);
        assert_eq!(ym("2024-02").through(ym("2024-02")).count(), 1);
    }

    #[test]
    fn test_year_month_serde() {
        let json = serde_json::to_string(&ym("2024-07")).unwrap();
        assert_eq!(json, "\"2024-07\"");
        let back: YearMonth = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ym("2024-07"));
    }

    #[test]
    fn test_lookback_grammar() {
        assert_eq!(Lookback::parse("7d").days(), 7);
        assert_eq!(Lookback::parse("3m").days(), 90);
        assert_eq!(Lookback::parse("1y").days(), 365);
        assert_eq!(Lookback::parse("2w").days(), 30);
        assert_eq!(Lookback::parse("").days(), 30);
        assert_eq!(Lookback::parse("m3").days(), 30);
    }

    #[test]
    fn test_lookback_since() {
        let as_of = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        assert_eq!(
            Lookback::parse("30d").since(as_of),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
        // Windows past the calendar clamp instead of overflowing
        assert_eq!(Lookback::parse("999999999999y").since(as_of), NaiveDate::MIN);
    }

    #[test]
    fn test_time_range_months() {
        assert_eq!(TimeRange::parse_or_default(Some("30days")).months(), 3);
        assert_eq!(TimeRange::parse_or_default(Some("90days")).months(), 6);
        assert_eq!(TimeRange::parse_or_default(Some("180days")).months(), 12);
        assert_eq!(TimeRange::parse_or_default(Some("1year")).months(), 12);
        assert_eq!(TimeRange::parse_or_default(Some("2years")).months(), 24);
        assert_eq!(TimeRange::parse_or_default(Some("forever")).months(), 6);
        assert_eq!(TimeRange::parse_or_default(None).months(), 6);
    }

    #[test]
    fn test_trailing_months() {
        let as_of = NaiveDate::from_ymd_opt(2024, 2, 10).unwrap();
        let (start, end) = trailing_months(as_of, 6);
        assert_eq!(start, ym("2023-09"));
        assert_eq!(end, ym("2024-02"));
        assert_eq!(start.months_until(end) + 1, 6);
    }
}
