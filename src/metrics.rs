use std::collections::HashSet;

use chrono::{Days, NaiveDate, Utc};
use log::debug;

use crate::schema::{MetricBreakdown, Record, SchemaGuess};
use crate::utils::{coerce_date, coerce_float_opt, round2};

pub const GROWTH_WINDOW_DAYS: u64 = 7;
pub const PROJECTION_STEPS: usize = 4;
pub const PROJECTION_STEP_GROWTH: f64 = 0.02;

/// Computes headline metrics with the growth window anchored on today (UTC).
///
/// Because the window follows the wall clock, uploading the same historical
/// file on different days gives different growth figures.
pub fn compute_metrics(records: &[Record], schema: &SchemaGuess) -> MetricBreakdown {
    compute_metrics_as_of(records, schema, Utc::now().date_naive())
}

pub fn compute_metrics_as_of(
    records: &[Record],
    schema: &SchemaGuess,
    today: NaiveDate,
) -> MetricBreakdown {
    let column_values = |column: &Option<String>| -> Vec<f64> {
        match column {
            Some(col) => records
                .iter()
                .map(|r| coerce_float_opt(r.get(col)))
                .collect(),
            None => vec![0.0; records.len()],
        }
    };

    let revenues = column_values(&schema.revenue);
    let costs = column_values(&schema.cost);
    let profits = column_values(&schema.profit);
    let dates: Vec<Option<NaiveDate>> = match &schema.date {
        Some(col) => records
            .iter()
            .map(|r| r.get(col).and_then(coerce_date))
            .collect(),
        None => vec![None; records.len()],
    };

    let total_revenue: f64 = revenues.iter().sum();
    let total_cost: f64 = costs.iter().sum();
    let total_profit: f64 = profits.iter().sum();

    let distinct_days = dates.iter().flatten().collect::<HashSet<_>>().len();
    let avg_daily_revenue = total_revenue / distinct_days.max(1) as f64;

    let weekly_growth_pct = weekly_growth(&revenues, &dates, today);
    let projections = project(&revenues);

    debug!(
        "Metrics over {} rows: revenue={:.2}, {} distinct days, growth={:.2}%",
        records.len(),
        total_revenue,
        distinct_days,
        weekly_growth_pct
    );

    MetricBreakdown {
        total_revenue: round2(total_revenue),
        total_cost: round2(total_cost),
        total_profit: round2(total_profit),
        avg_daily_revenue: round2(avg_daily_revenue),
        weekly_growth_pct: round2(weekly_growth_pct),
        projections: projections.map(round2),
    }
}

/// Percentage change of revenue in (today-7, today] against
/// (today-14, today-7]. Zero when the earlier window has no revenue.
pub fn weekly_growth(revenues: &[f64], dates: &[Option<NaiveDate>], today: NaiveDate) -> f64 {
    let days_back = |n: u64| today.checked_sub_days(Days::new(n)).unwrap_or(NaiveDate::MIN);

    let window_sum = |newest: NaiveDate, oldest_excluded: NaiveDate| -> f64 {
        revenues
            .iter()
            .zip(dates)
            .filter_map(|(value, date)| date.map(|d| (value, d)))
            .filter(|(_, d)| oldest_excluded < *d && *d <= newest)
            .map(|(value, _)| value)
            .sum()
    };

    let recent = window_sum(today, days_back(GROWTH_WINDOW_DAYS));
    let previous = window_sum(
        days_back(GROWTH_WINDOW_DAYS),
        days_back(2 * GROWTH_WINDOW_DAYS),
    );

    if previous == 0.0 {
        0.0
    } else {
        (recent - previous) / previous * 100.0
    }
}

/// Mean of the last four revenue values in row order, grown 2% per step.
pub fn project(revenues: &[f64]) -> [f64; PROJECTION_STEPS] {
    let tail = &revenues[revenues.len().saturating_sub(PROJECTION_STEPS)..];
    let mean = if tail.is_empty() {
        0.0
    } else {
        tail.iter().sum::<f64>() / tail.len() as f64
    };
    std::array::from_fn(|i| mean * (1.0 + (i + 1) as f64 * PROJECTION_STEP_GROWTH))
}
