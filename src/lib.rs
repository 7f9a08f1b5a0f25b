//! # Data Insights
//!
//! A library for turning ad-hoc tabular business exports (CSV or
//! spreadsheets) into a compact analytics payload.
//!
//! ## Core Concepts
//!
//! - **Records**: Uploaded rows normalised to header-keyed string maps
//! - **Schema Guess**: Which columns hold the date, revenue, cost, profit,
//!   category and quantity, inferred from header names
//! - **Fail-soft Coercion**: Bad cells become `0.0` or "no date" instead of
//!   aborting the analysis
//! - **Payload**: Totals, a daily revenue series, z-score anomalies, top
//!   categories and a short narrative
//!
//! ## Example
//!
//! ```rust
//! use data_insights::*;
//!
//! let csv = b"Date,Sales,SKU\n2024-01-01,100,A\n2024-01-02,200,B\n";
//! let payload = analyze(csv, SourceKind::DelimitedText, &ColumnOverrides::default()).unwrap();
//!
//! assert_eq!(payload.schema.revenue.as_deref(), Some("Sales"));
//! assert_eq!(payload.metrics.total_revenue, 300.0);
//! assert_eq!(payload.categories[0].name, "B");
//! ```

pub mod anomaly;
pub mod categories;
pub mod error;
pub mod inference;
pub mod ingestion;
pub mod metrics;
pub mod narrative;
pub mod schema;
pub mod timeseries;
pub mod utils;

#[cfg(feature = "workers-ai")]
pub mod llm;

pub use anomaly::detect_anomalies;
pub use categories::build_categories;
pub use error::{EnrichmentError, InsightsError, Result};
pub use inference::{apply_overrides, guess_schema, require_roles};
pub use ingestion::{parse_csv, parse_records, parse_spreadsheet};
pub use metrics::{compute_metrics, compute_metrics_as_of};
pub use narrative::{build_narrative, explain, synthesize_narrative, TextGenerator};
pub use schema::*;
pub use timeseries::build_timeseries;
pub use utils::{coerce_date, coerce_float};

use log::{debug, info};

/// Runs an upload through parsing, schema resolution and every analysis stage.
pub struct InsightsPipeline;

impl InsightsPipeline {
    /// Parses an upload, resolves its schema and builds the payload.
    pub fn process(
        content: &[u8],
        kind: SourceKind,
        overrides: &ColumnOverrides,
        generator: Option<&dyn TextGenerator>,
    ) -> Result<AnalyticsPayload> {
        let records = parse_records(content, kind)?;
        let schema = Self::resolve_schema(&records, overrides)?;

        info!(
            "Analysing {} rows (date={:?}, revenue={:?}, category={:?})",
            records.len(),
            schema.date,
            schema.revenue,
            schema.product
        );

        Ok(Self::assemble(&records, schema, generator))
    }

    /// Infers the schema from the first record, applies overrides, and
    /// checks that date and revenue point at real columns.
    pub fn resolve_schema(
        records: &[Record],
        overrides: &ColumnOverrides,
    ) -> Result<SchemaGuess> {
        let columns = discovered_columns(records);
        let inferred = records.first().map(guess_schema).unwrap_or_default();
        let schema = apply_overrides(&inferred, overrides);

        if let Err(e) = require_roles(&schema, &columns) {
            debug!("Schema unresolved: {:?} against columns {:?}", schema, columns);
            return Err(e);
        }
        Ok(schema)
    }

    /// Runs every analysis stage over already-parsed records.
    pub fn assemble(
        records: &[Record],
        schema: SchemaGuess,
        generator: Option<&dyn TextGenerator>,
    ) -> AnalyticsPayload {
        let metrics = compute_metrics(records, &schema);
        let timeseries = build_timeseries(records, &schema);
        let anomalies = detect_anomalies(&timeseries);
        let categories = build_categories(records, &schema);
        let narrative =
            synthesize_narrative(&schema, &metrics, &anomalies, &categories, generator);

        info!(
            "Built payload: {} days, {} anomalies, {} categories",
            timeseries.len(),
            anomalies.len(),
            categories.len()
        );

        AnalyticsPayload {
            schema,
            metrics,
            timeseries,
            anomalies,
            narrative,
            columns: discovered_columns(records),
            categories,
        }
    }
}

/// Analyses an upload with the deterministic narrative.
pub fn analyze(
    content: &[u8],
    kind: SourceKind,
    overrides: &ColumnOverrides,
) -> Result<AnalyticsPayload> {
    InsightsPipeline::process(content, kind, overrides, None)
}

/// Analyses an upload, letting `generator` write the narrative when it can.
pub fn analyze_with_generator(
    content: &[u8],
    kind: SourceKind,
    overrides: &ColumnOverrides,
    generator: &dyn TextGenerator,
) -> Result<AnalyticsPayload> {
    InsightsPipeline::process(content, kind, overrides, Some(generator))
}

/// Builds a payload from records whose schema is already resolved.
pub fn assemble_payload(records: &[Record], schema: SchemaGuess) -> AnalyticsPayload {
    InsightsPipeline::assemble(records, schema, None)
}

fn discovered_columns(records: &[Record]) -> Vec<String> {
    records
        .first()
        .map(|r| r.columns().map(str::to_string).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const SAMPLE: &[u8] = b"Date,Sales,SKU\n2024-01-01,100,A\n2024-01-02,200,B\n";

    #[test]
    fn test_end_to_end_processing() {
        let payload = analyze(SAMPLE, SourceKind::DelimitedText, &ColumnOverrides::default())
            .unwrap();

        assert_eq!(payload.schema.date.as_deref(), Some("Date"));
        assert_eq!(payload.schema.revenue.as_deref(), Some("Sales"));
        assert_eq!(payload.schema.product.as_deref(), Some("SKU"));
        assert_eq!(payload.columns, vec!["Date", "Sales", "SKU"]);

        assert_eq!(
            payload.timeseries,
            vec![
                TimeSeriesPoint {
                    date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                    revenue: 100.0
                },
                TimeSeriesPoint {
                    date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                    revenue: 200.0
                },
            ]
        );
        assert_eq!(payload.metrics.total_revenue, 300.0);
        assert_eq!(payload.metrics.avg_daily_revenue, 150.0);
        assert_eq!(
            payload.categories,
            vec![
                CategoryBreakdown {
                    name: "B".to_string(),
                    total: 200.0
                },
                CategoryBreakdown {
                    name: "A".to_string(),
                    total: 100.0
                },
            ]
        );
        assert!(payload.anomalies.is_empty());
        assert!(payload
            .narrative
            .starts_with("Detected revenue column: Sales. Total revenue 300.00"));
    }

    #[test]
    fn test_unresolved_schema_carries_columns() {
        let csv = b"When,Amount\n2024-01-01,5\n";
        let err = analyze(csv, SourceKind::DelimitedText, &ColumnOverrides::default())
            .unwrap_err();
        match &err {
            InsightsError::SchemaUnresolved { columns, .. } => {
                assert_eq!(columns, &vec!["When".to_string(), "Amount".to_string()]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_overrides_rescue_unmapped_upload() {
        let csv = b"When,Amount,Region\n2024-01-01,5,North\n2024-01-01,7,South\n";
        let overrides = ColumnOverrides {
            date_column: Some("When".to_string()),
            revenue_column: Some("Amount".to_string()),
            category_column: Some("Region".to_string()),
        };
        let payload = analyze(csv, SourceKind::DelimitedText, &overrides).unwrap();
        assert_eq!(payload.metrics.total_revenue, 12.0);
        assert_eq!(payload.timeseries.len(), 1);
        assert_eq!(payload.categories[0].name, "South");
    }

    #[test]
    fn test_resolve_schema_applies_overrides() {
        let records = parse_csv(b"When,Sales\n2024-01-01,5\n").unwrap();
        let overrides = ColumnOverrides {
            date_column: Some("When".to_string()),
            ..Default::default()
        };
        let schema = InsightsPipeline::resolve_schema(&records, &overrides).unwrap();
        assert_eq!(schema.date.as_deref(), Some("When"));
        assert_eq!(schema.revenue.as_deref(), Some("Sales"));

        let payload = InsightsPipeline::assemble(&records, schema, None);
        assert_eq!(payload.columns, vec!["When", "Sales"]);
    }

    #[test]
    fn test_override_to_missing_column_is_rejected() {
        let overrides = ColumnOverrides {
            revenue_column: Some("Gross".to_string()),
            ..Default::default()
        };
        let err = analyze(SAMPLE, SourceKind::DelimitedText, &overrides).unwrap_err();
        assert_eq!(err.columns().len(), 3);
    }

    #[test]
    fn test_generator_replaces_narrative() {
        let generator =
            |_: &str| -> std::result::Result<String, EnrichmentError> { Ok("Custom.".to_string()) };
        let payload = analyze_with_generator(
            SAMPLE,
            SourceKind::DelimitedText,
            &ColumnOverrides::default(),
            &generator,
        )
        .unwrap();
        assert_eq!(payload.narrative, "Custom.");
        assert_eq!(payload.metrics.total_revenue, 300.0);
    }
}
