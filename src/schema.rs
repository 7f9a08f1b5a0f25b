use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One input row: column name to raw cell text, in header order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a column value. A repeated column keeps its first position and
    /// takes the latest value.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        let column = column.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| *name == column) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(_, value)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// True when every value is empty or whitespace.
    pub fn is_blank(&self) -> bool {
        self.values().all(|v| v.trim().is_empty())
    }
}

impl<K, V> FromIterator<(K, V)> for Record
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (column, value) in iter {
            record.insert(column, value);
        }
        record
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    #[schemars(description = "Comma-delimited text such as a CSV export")]
    DelimitedText,

    #[schemars(description = "Excel or OpenDocument workbook; only the first sheet is read")]
    Spreadsheet,
}

impl SourceKind {
    /// Picks the parser an upload handler would use for this file name.
    pub fn from_filename(filename: &str) -> Self {
        let lower = filename.to_ascii_lowercase();
        if [".xlsx", ".xls", ".xlsm", ".ods"]
            .iter()
            .any(|ext| lower.ends_with(ext))
        {
            Self::Spreadsheet
        } else {
            Self::DelimitedText
        }
    }
}

/// Column names the caller wants to force for the overridable roles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ColumnOverrides {
    #[serde(default)]
    #[schemars(description = "Column to use as the transaction date")]
    pub date_column: Option<String>,

    #[serde(default)]
    #[schemars(description = "Column to use as the revenue/amount")]
    pub revenue_column: Option<String>,

    #[serde(default)]
    #[schemars(description = "Column to group revenue by")]
    pub category_column: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SchemaGuess {
    #[schemars(description = "Column holding the transaction date")]
    pub date: Option<String>,

    #[schemars(description = "Column holding revenue, sales or GMV")]
    pub revenue: Option<String>,

    #[schemars(description = "Column holding cost, COGS or spend")]
    pub cost: Option<String>,

    #[schemars(description = "Column holding profit or margin")]
    pub profit: Option<String>,

    #[schemars(description = "Column holding the product, SKU or other category label")]
    pub product: Option<String>,

    #[schemars(description = "Column holding quantity or units")]
    pub qty: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TimeSeriesPoint {
    pub date: NaiveDate,
    pub revenue: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MetricBreakdown {
    pub total_revenue: f64,
    pub total_cost: f64,
    pub total_profit: f64,

    #[schemars(description = "Total revenue divided by the number of distinct dates")]
    pub avg_daily_revenue: f64,

    #[schemars(
        description = "Revenue of the last 7 days against the 7 days before that, as a percentage. Measured against today's date, not the dataset's."
    )]
    pub weekly_growth_pct: f64,

    #[schemars(
        description = "Four naive forward values: mean of the last four rows grown by 2% per step"
    )]
    pub projections: [f64; 4],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Anomaly {
    pub date: NaiveDate,
    pub value: f64,
    pub z_score: f64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CategoryBreakdown {
    pub name: String,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalyticsPayload {
    pub schema: SchemaGuess,
    pub metrics: MetricBreakdown,
    pub timeseries: Vec<TimeSeriesPoint>,
    pub anomalies: Vec<Anomaly>,
    pub narrative: String,

    #[schemars(description = "Header names discovered in the upload, in file order")]
    pub columns: Vec<String>,

    #[schemars(description = "Top categories by revenue, highest first, at most eight")]
    pub categories: Vec<CategoryBreakdown>,
}

impl AnalyticsPayload {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(AnalyticsPayload)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

/// Input to [`crate::narrative::explain`]: a previously produced analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExplainRequest {
    pub metrics: MetricBreakdown,
    #[serde(default)]
    pub anomalies: Vec<Anomaly>,
    #[serde(default)]
    pub categories: Vec<CategoryBreakdown>,
    #[serde(default)]
    #[schemars(description = "Free-form label for the analysed period, e.g. 'March 2024'")]
    pub period: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ExplainResponse {
    pub explanation: String,
    pub tags: Vec<String>,
}
