//! Report command implementations

use anyhow::{anyhow, Result};
use serde::Serialize;
use tally_core::{
    AnalyticsService, ForecastResult, Lookback, Sensitivity, Severity, Tenant, TimeRange,
};

use super::{parse_as_of, truncate};
use crate::cli::TenantArgs;

fn tenant_of(args: &TenantArgs) -> Tenant {
    Tenant::new(&args.user, args.client.as_deref())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn cmd_monthly(service: &AnalyticsService, args: &TenantArgs, months: u32) -> Result<()> {
    let as_of = parse_as_of(args.as_of.as_deref())?;
    let report = service.monthly(&tenant_of(args), months, as_of)?;

    if args.json {
        return print_json(&report);
    }

    println!();
    println!("📊 Monthly Summary ({})", args.user);
    println!("   ─────────────────────────────────────────────────────────────");
    println!(
        "   {:8} │ {:>12} │ {:>12} │ {:>12} │ {:>5}",
        "Month", "Revenue", "Expenses", "Profit", "Count"
    );
    println!("   ─────────┼──────────────┼──────────────┼──────────────┼──────");
    for bucket in &report.months {
        println!(
            "   {:8} │ {:>12.2} │ {:>12.2} │ {:>12.2} │ {:>5}",
            bucket.period.to_string(),
            bucket.revenue,
            bucket.expenses,
            bucket.profit,
            bucket.transaction_count
        );
    }
    println!();
    println!("   Total revenue:  ${:.2}", report.summary.total_revenue);
    println!("   Total expenses: ${:.2}", report.summary.total_expenses);
    println!("   Net profit:     ${:.2}", report.summary.total_profit);

    Ok(())
}

fn print_forecast(label: &str, result: &ForecastResult) {
    println!();
    match result.trend {
        Some(trend) => println!(
            "   {} (trend: {}, confidence: {:.0}%)",
            label,
            trend,
            result.confidence * 100.0
        ),
        None => println!("   {} ({})", label, result.method.as_str()),
    }
    for point in &result.points {
        match point.seasonal_adjustment {
            Some(adj) => println!(
                "     {}  {:>12.2}  ({:+.1}% seasonal)",
                point.period, point.value, adj
            ),
            None => println!("     {}  {:>12.2}", point.period, point.value),
        }
    }
}

pub fn cmd_forecast(
    service: &AnalyticsService,
    args: &TenantArgs,
    time_range: &str,
    periods: Option<u32>,
) -> Result<()> {
    let as_of = parse_as_of(args.as_of.as_deref())?;
    let time_range: TimeRange = time_range.parse().map_err(|e: String| anyhow!(e))?;
    if periods == Some(0) {
        anyhow::bail!("--periods must be at least 1");
    }

    let report = service.forecast(&tenant_of(args), time_range, periods, as_of)?;

    if args.json {
        return print_json(&report);
    }

    println!();
    println!("🔮 Forecast ({}, history: {})", args.user, time_range);
    println!("   ─────────────────────────────────────────────────────────────");
    print_forecast("Revenue", &report.forecasts.revenue);
    print_forecast("Expenses", &report.forecasts.expenses);
    print_forecast("Profit", &report.forecasts.profit);

    if let Some(patterns) = &report.seasonality {
        println!();
        println!("   Seasonal months:");
        for pattern in patterns {
            println!(
                "     {:10} {:+.1}% ({} occurrences)",
                pattern.month_name, pattern.deviation_percent, pattern.occurrences
            );
        }
    }

    Ok(())
}

pub fn cmd_anomalies(
    service: &AnalyticsService,
    args: &TenantArgs,
    period: &str,
    sensitivity: &str,
) -> Result<()> {
    let as_of = parse_as_of(args.as_of.as_deref())?;
    let sensitivity: Sensitivity = sensitivity.parse().map_err(|e: String| anyhow!(e))?;

    let report = service.anomalies(&tenant_of(args), Lookback::parse(period), sensitivity, as_of)?;

    if args.json {
        return print_json(&report);
    }

    println!();
    println!(
        "🔍 Anomalies ({}, last {}, sensitivity {})",
        args.user, report.period, report.sensitivity
    );
    println!("   ─────────────────────────────────────────────────────────────");

    if report.anomalies.is_empty() {
        println!("   ✅ Nothing unusual found.");
        return Ok(());
    }

    for anomaly in &report.anomalies {
        let icon = match anomaly.severity {
            Severity::High => "🔴",
            Severity::Medium => "🟠",
            Severity::Low => "🟡",
        };
        println!(
            "   {} {:22} {}",
            icon,
            anomaly.kind.as_str(),
            truncate(&anomaly.reason, 60)
        );
    }

    println!();
    println!("   {} anomalies found", report.anomalies_found);

    Ok(())
}
