use std::collections::HashMap;

use log::debug;

use crate::schema::{CategoryBreakdown, Record, SchemaGuess};
use crate::utils::{coerce_float_opt, round2};

pub const TOP_CATEGORY_LIMIT: usize = 8;

/// Revenue per category value, highest first, capped at eight entries.
///
/// Rows with an empty category are skipped. Equal totals keep the order in
/// which the categories were first seen.
pub fn build_categories(records: &[Record], schema: &SchemaGuess) -> Vec<CategoryBreakdown> {
    let (Some(category_col), Some(revenue_col)) = (&schema.product, &schema.revenue) else {
        return Vec::new();
    };

    let mut totals: Vec<(String, f64)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in records {
        let name = match record.get(category_col) {
            Some(name) if !name.is_empty() => name,
            _ => continue,
        };
        let revenue = coerce_float_opt(record.get(revenue_col));
        match index.get(name) {
            Some(&slot) => totals[slot].1 += revenue,
            None => {
                index.insert(name.to_string(), totals.len());
                totals.push((name.to_string(), revenue));
            }
        }
    }

    debug!("Aggregated revenue across {} categories", totals.len());

    // sort_by is stable, so ties stay in encounter order
    totals.sort_by(|a, b| b.1.total_cmp(&a.1));

    totals
        .into_iter()
        .take(TOP_CATEGORY_LIMIT)
        .map(|(name, total)| CategoryBreakdown {
            name,
            total: round2(total),
        })
        .collect()
}
