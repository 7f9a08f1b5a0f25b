use std::collections::BTreeMap;

use chrono::NaiveDate;
use log::debug;

use crate::schema::{Record, SchemaGuess, TimeSeriesPoint};
use crate::utils::{coerce_date, coerce_float_opt};

/// Sums revenue per calendar day, oldest first.
///
/// Rows whose date does not parse are left out entirely. Without both a
/// date and a revenue column the series is empty.
pub fn build_timeseries(records: &[Record], schema: &SchemaGuess) -> Vec<TimeSeriesPoint> {
    let (Some(date_col), Some(revenue_col)) = (&schema.date, &schema.revenue) else {
        return Vec::new();
    };

    let mut rollup: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    let mut skipped = 0usize;

    for record in records {
        let Some(date) = record.get(date_col).and_then(coerce_date) else {
            skipped += 1;
            continue;
        };
        *rollup.entry(date).or_insert(0.0) += coerce_float_opt(record.get(revenue_col));
    }

    debug!(
        "Built {} daily points ({} rows without a usable date)",
        rollup.len(),
        skipped
    );

    rollup
        .into_iter()
        .map(|(date, revenue)| TimeSeriesPoint { date, revenue })
        .collect()
}
