use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InsightsError {
    /// The upload could not be decoded, or no usable rows survived filtering.
    #[error("{0}")]
    Parse(String),

    /// Date or revenue role is still missing after inference and overrides.
    #[error("{message} (available columns: {})", columns.join(", "))]
    SchemaUnresolved {
        message: String,
        columns: Vec<String>,
    },
}

impl InsightsError {
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Column names a human can use to remap the upload, if any were discovered.
    pub fn columns(&self) -> &[String] {
        match self {
            Self::Parse(_) => &[],
            Self::SchemaUnresolved { columns, .. } => columns,
        }
    }
}

pub type Result<T> = std::result::Result<T, InsightsError>;

/// Failure reported by a text-generation collaborator.
///
/// The pipeline never propagates these; they only decide whether the
/// deterministic narrative is used.
#[derive(Error, Debug)]
pub enum EnrichmentError {
    #[error("Text generation is not configured: {0}")]
    Unavailable(String),

    #[error("Text generation request failed: {0}")]
    Http(String),

    #[error("Text generation API error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("Could not decode text generation response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Text generation returned an empty response")]
    Empty,
}
