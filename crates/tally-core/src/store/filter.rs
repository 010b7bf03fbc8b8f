//! Ledger filter builder for constructing dynamic SQL queries
//!
//! Every value reaches SQLite as a bound parameter; only fixed column names
//! and operators are interpolated into the statement.

use chrono::NaiveDate;

/// Builder for ledger query filters
///
/// The lifetime `'query` is how long the borrowed tenant ids must stay valid.
#[derive(Debug, Default)]
pub struct LedgerFilter<'query> {
    pub user_id: Option<&'query str>,
    pub client_id: Option<&'query str>,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
}

/// Result of building a filter - SQL components and parameters
pub struct FilterResult {
    /// WHERE clause including "WHERE" keyword (empty if no conditions)
    pub where_clause: String,
    /// ORDER BY clause including "ORDER BY" keyword
    pub order_clause: &'static str,
    /// Parameters for the query (boxed for rusqlite compatibility)
    pub params: Vec<Box<dyn rusqlite::ToSql>>,
}

impl<'query> LedgerFilter<'query> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_id(mut self, id: &'query str) -> Self {
        self.user_id = Some(id);
        self
    }

    /// Restrict to one client; `None` keeps all of the tenant's clients
    pub fn client_id(mut self, id: Option<&'query str>) -> Self {
        self.client_id = id;
        self
    }

    /// Inclusive date range
    pub fn date_range(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.date_range = Some((start, end));
        self
    }

    pub fn build(self) -> FilterResult {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(uid) = self.user_id {
            conditions.push("t.user_id = ?");
            params.push(Box::new(uid.to_string()));
        }

        if let Some(cid) = self.client_id {
            if !cid.trim().is_empty() {
                conditions.push("t.client_id = ?");
                params.push(Box::new(cid.trim().to_string()));
            }
        }

        // Dates are stored as ISO strings, so text comparison orders correctly
        if let Some((from_date, to_date)) = self.date_range {
            conditions.push("t.date >= ? AND t.date <= ?");
            params.push(Box::new(from_date.to_string()));
            params.push(Box::new(to_date.to_string()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        FilterResult {
            where_clause,
            order_clause: "ORDER BY t.date ASC, t.id ASC",
            params,
        }
    }
}

impl FilterResult {
    /// Full SELECT for ledger rows, columns in `row_to_record` order
    pub fn build_select_query(&self) -> String {
        format!(
            "SELECT t.id, t.user_id, t.client_id, t.date, t.time, t.amount, t.type, t.category, t.description \
             FROM ledger_transactions t {} {}",
            self.where_clause, self.order_clause
        )
    }

    pub fn build_count_query(&self) -> String {
        format!("SELECT COUNT(*) FROM ledger_transactions t {}", self.where_clause)
    }

    /// Get parameter references for query execution
    pub fn params_refs(&self) -> Vec<&dyn rusqlite::ToSql> {
        self.params.iter().map(|p| p.as_ref()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter() {
        let result = LedgerFilter::new().build();
        assert!(result.where_clause.is_empty());
        assert!(result.params.is_empty());
        assert!(result.build_count_query().ends_with("ledger_transactions t "));
    }

    #[test]
    fn test_tenant_and_range() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        let result = LedgerFilter::new()
            .user_id("u1")
            .client_id(Some("c1"))
            .date_range(start, end)
            .build();

        assert_eq!(
            result.where_clause,
            "WHERE t.user_id = ? AND t.client_id = ? AND t.date >= ? AND t.date <= ?"
        );
        assert_eq!(result.params.len(), 4);
        assert!(result.build_select_query().contains("ORDER BY t.date ASC"));
    }

    #[test]
    fn test_blank_client_ignored() {
        let result = LedgerFilter::new()
            .user_id("u1")
            .client_id(Some("  "))
            .build();
        assert_eq!(result.where_clause, "WHERE t.user_id = ?");
        assert_eq!(result.params.len(), 1);
    }
}
