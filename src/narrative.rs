//! Human-readable summaries of an analysis.
//!
//! Everything here has a deterministic template. A [`TextGenerator`] can be
//! injected to replace the template text with model output, but a missing,
//! failing or empty generator always falls back to the template.

use log::{debug, warn};

use crate::error::EnrichmentError;
use crate::schema::{
    Anomaly, CategoryBreakdown, ExplainRequest, ExplainResponse, MetricBreakdown, SchemaGuess,
};

pub const TAG_POSITIVE: &str = "✅ Positive trend";
pub const TAG_WARNING: &str = "⚠️ Warning";
pub const TAG_ANOMALY: &str = "🔍 Anomaly";
pub const TAG_DEFAULT: &str = "Insight ready";

/// Growth percentage at or above which a trend is tagged positive.
pub const POSITIVE_GROWTH_PCT: f64 = 5.0;

/// An external text-generation capability, e.g. a hosted LLM.
pub trait TextGenerator {
    fn generate(&self, prompt: &str) -> Result<String, EnrichmentError>;
}

impl<F> TextGenerator for F
where
    F: Fn(&str) -> Result<String, EnrichmentError>,
{
    fn generate(&self, prompt: &str) -> Result<String, EnrichmentError> {
        self(prompt)
    }
}

/// Template narrative: revenue column, totals, growth, then the first
/// anomaly or an all-clear.
pub fn build_narrative(
    schema: &SchemaGuess,
    metrics: &MetricBreakdown,
    anomalies: &[Anomaly],
) -> String {
    let mut parts = vec![
        format!(
            "Detected revenue column: {}.",
            schema.revenue.as_deref().unwrap_or("unknown")
        ),
        format!(
            "Total revenue {:.2} with avg daily {:.2}.",
            metrics.total_revenue, metrics.avg_daily_revenue
        ),
        format!(
            "Weekly growth {:.2}% vs prior week.",
            metrics.weekly_growth_pct
        ),
    ];
    match anomalies.first() {
        Some(top) => parts.push(format!("Anomaly: {}", top.message)),
        None => parts.push("No major anomalies detected this week.".to_string()),
    }
    parts.join(" ")
}

/// Narrative for a payload, enriched by `generator` when it produces text.
pub fn synthesize_narrative(
    schema: &SchemaGuess,
    metrics: &MetricBreakdown,
    anomalies: &[Anomaly],
    categories: &[CategoryBreakdown],
    generator: Option<&dyn TextGenerator>,
) -> String {
    let prompt = build_insight_prompt(metrics, categories, anomalies, None);
    generate_or_none(generator, &prompt)
        .unwrap_or_else(|| build_narrative(schema, metrics, anomalies))
}

/// Structured analyst prompt handed to a [`TextGenerator`].
pub fn build_insight_prompt(
    metrics: &MetricBreakdown,
    categories: &[CategoryBreakdown],
    anomalies: &[Anomaly],
    period: Option<&str>,
) -> String {
    let categories: Vec<String> = categories
        .iter()
        .map(|c| format!("{}:{:?}", c.name, c.total))
        .collect();
    let anomalies: Vec<&str> = anomalies.iter().map(|a| a.message.as_str()).collect();

    format!(
        "You are a sharp business analyst. Provide a concise 3-5 sentence explanation. \
         Include positive, warning, and anomaly cues if present.\n\
         Metrics: total_revenue={:?}, total_profit={:?}, avg_daily={:?}, weekly_growth={:?}.\n\
         Categories: [{}].\n\
         Anomalies: [{}].\n\
         Period: {}.",
        metrics.total_revenue,
        metrics.total_profit,
        metrics.avg_daily_revenue,
        metrics.weekly_growth_pct,
        categories.join(", "),
        anomalies.join(", "),
        period.unwrap_or("latest upload"),
    )
}

/// Short explanation plus cue tags for an existing analysis.
pub fn explain(request: &ExplainRequest, generator: Option<&dyn TextGenerator>) -> ExplainResponse {
    let prompt = build_insight_prompt(
        &request.metrics,
        &request.categories,
        &request.anomalies,
        request.period.as_deref(),
    );

    let explanation =
        generate_or_none(generator, &prompt).unwrap_or_else(|| fallback_explanation(request));

    ExplainResponse {
        explanation,
        tags: insight_tags(&request.metrics, &request.anomalies),
    }
}

/// Deterministic explanation: growth direction, top category, first anomaly.
pub fn fallback_explanation(request: &ExplainRequest) -> String {
    let growth = request.metrics.weekly_growth_pct;
    let mut parts = vec![if growth >= 0.0 {
        format!("Revenue trending up {:?}% week over week.", growth)
    } else {
        format!("Revenue down {:?}% week over week.", growth.abs())
    }];

    // max_by returns the last maximum; fold keeps the first one seen
    let top = request.categories.iter().fold(None::<&CategoryBreakdown>, |best, c| match best {
        Some(b) if b.total >= c.total => Some(b),
        _ => Some(c),
    });
    if let Some(top) = top {
        parts.push(format!("Top category: {} at {:?}.", top.name, top.total));
    }

    parts.push(
        request
            .anomalies
            .first()
            .map(|a| a.message.clone())
            .unwrap_or_else(|| "No anomalies spotted.".to_string()),
    );
    parts.join(" ")
}

pub fn insight_tags(metrics: &MetricBreakdown, anomalies: &[Anomaly]) -> Vec<String> {
    let mut tags = Vec::new();
    if metrics.weekly_growth_pct >= POSITIVE_GROWTH_PCT {
        tags.push(TAG_POSITIVE.to_string());
    }
    if metrics.weekly_growth_pct < 0.0 {
        tags.push(TAG_WARNING.to_string());
    }
    if !anomalies.is_empty() {
        tags.push(TAG_ANOMALY.to_string());
    }
    if tags.is_empty() {
        tags.push(TAG_DEFAULT.to_string());
    }
    tags
}

fn generate_or_none(generator: Option<&dyn TextGenerator>, prompt: &str) -> Option<String> {
    let generator = generator?;
    match generator.generate(prompt) {
        Ok(text) if !text.trim().is_empty() => {
            debug!("Using generated narrative ({} chars)", text.len());
            Some(text.trim().to_string())
        }
        Ok(_) => {
            warn!("Text generator returned nothing; using template narrative");
            None
        }
        Err(e) => {
            warn!("Text generator failed, using template narrative: {}", e);
            None
        }
    }
}
