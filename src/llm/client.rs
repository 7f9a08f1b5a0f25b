use std::time::Duration;

use log::debug;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::error::EnrichmentError;
use crate::narrative::TextGenerator;

const WORKERS_AI_BASE_URL: &str = "https://api.cloudflare.com/client/v4";
const DEFAULT_MODEL: &str = "@cf/meta/llama-3-8b-instruct";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for Cloudflare Workers AI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkersAiConfig {
    pub account_id: String,
    pub api_token: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl WorkersAiConfig {
    pub fn new(account_id: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            api_token: api_token.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: WORKERS_AI_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Reads `CLOUDFLARE_ACCOUNT_ID` and `CLOUDFLARE_API_TOKEN` (required),
    /// plus optional `CLOUDFLARE_MODEL` and `CLOUDFLARE_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, EnrichmentError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, EnrichmentError> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| EnrichmentError::Unavailable(format!("{} is not set", key)))
        };

        let mut config = Self::new(
            required("CLOUDFLARE_ACCOUNT_ID")?,
            required("CLOUDFLARE_API_TOKEN")?,
        );
        if let Some(model) = lookup("CLOUDFLARE_MODEL").filter(|m| !m.trim().is_empty()) {
            config.model = model;
        }
        if let Some(secs) = lookup("CLOUDFLARE_TIMEOUT_SECS").and_then(|s| s.parse::<u64>().ok()) {
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn run_url(&self) -> String {
        format!(
            "{}/accounts/{}/ai/run/{}",
            self.base_url.trim_end_matches('/'),
            self.account_id,
            self.model
        )
    }
}

#[derive(Debug, Serialize)]
struct RunRequest<'a> {
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct RunResponse {
    result: Option<RunResult>,
}

#[derive(Debug, Deserialize)]
struct RunResult {
    response: Option<String>,
}

/// Blocking Workers AI client used as a best-effort [`TextGenerator`].
///
/// Makes exactly one request per prompt; callers fall back to the template
/// narrative on any error.
#[derive(Clone)]
pub struct WorkersAiClient {
    client: Client,
    config: WorkersAiConfig,
}

impl WorkersAiClient {
    pub fn new(config: WorkersAiConfig) -> Result<Self, EnrichmentError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EnrichmentError::Http(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self, EnrichmentError> {
        Self::new(WorkersAiConfig::from_env()?)
    }

    pub fn config(&self) -> &WorkersAiConfig {
        &self.config
    }

    pub fn run(&self, prompt: &str) -> Result<String, EnrichmentError> {
        let url = self.config.run_url();
        debug!("Requesting narrative from {}", self.config.model);

        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_token)
            .json(&RunRequest { prompt })
            .send()
            .map_err(|e| EnrichmentError::Http(e.to_string()))?;

        let status = res.status();
        let body = res
            .text()
            .map_err(|e| EnrichmentError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(EnrichmentError::Status {
                status: status.as_u16(),
                body,
            });
        }

        parse_run_response(&body)
    }
}

impl TextGenerator for WorkersAiClient {
    fn generate(&self, prompt: &str) -> Result<String, EnrichmentError> {
        self.run(prompt)
    }
}

/// Pulls `result.response` out of a Workers AI reply.
pub fn parse_run_response(body: &str) -> Result<String, EnrichmentError> {
    let parsed: RunResponse = serde_json::from_str(body)?;
    parsed
        .result
        .and_then(|r| r.response)
        .filter(|text| !text.trim().is_empty())
        .ok_or(EnrichmentError::Empty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_config_requires_credentials() {
        let err = WorkersAiConfig::from_lookup(env(&[("CLOUDFLARE_ACCOUNT_ID", "acc")])).unwrap_err();
        assert!(matches!(err, EnrichmentError::Unavailable(_)));

        let err = WorkersAiConfig::from_lookup(env(&[
            ("CLOUDFLARE_ACCOUNT_ID", " "),
            ("CLOUDFLARE_API_TOKEN", "tok"),
        ]))
        .unwrap_err();
        assert!(matches!(err, EnrichmentError::Unavailable(_)));
    }

    #[test]
    fn test_config_defaults_and_overrides() {
        let config = WorkersAiConfig::from_lookup(env(&[
            ("CLOUDFLARE_ACCOUNT_ID", "acc"),
            ("CLOUDFLARE_API_TOKEN", "tok"),
        ]))
        .unwrap();
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(
            config.run_url(),
            "https://api.cloudflare.com/client/v4/accounts/acc/ai/run/@cf/meta/llama-3-8b-instruct"
        );

        let config = WorkersAiConfig::from_lookup(env(&[
            ("CLOUDFLARE_ACCOUNT_ID", "acc"),
            ("CLOUDFLARE_API_TOKEN", "tok"),
            ("CLOUDFLARE_MODEL", "@cf/mistral/mistral-7b-instruct-v0.1"),
            ("CLOUDFLARE_TIMEOUT_SECS", "5"),
        ]))
        .unwrap()
        .with_base_url("http://localhost:8787/");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(
            config.run_url(),
            "http://localhost:8787/accounts/acc/ai/run/@cf/mistral/mistral-7b-instruct-v0.1"
        );
    }

    #[test]
    fn test_parse_run_response() {
        let body = r#"{"result":{"response":"Revenue is up."},"success":true,"errors":[]}"#;
        assert_eq!(parse_run_response(body).unwrap(), "Revenue is up.");

        let empty = r#"{"result":{"response":""},"success":true}"#;
        assert!(matches!(parse_run_response(empty), Err(EnrichmentError::Empty)));

        let missing = r#"{"success":false,"errors":[{"code":10000}]}"#;
        assert!(matches!(parse_run_response(missing), Err(EnrichmentError::Empty)));

        assert!(matches!(
            parse_run_response("<html>"),
            Err(EnrichmentError::Decode(_))
        ));
    }

    #[test]
    fn test_unreachable_endpoint_falls_back() {
        let config = WorkersAiConfig::new("acc", "tok").with_base_url("http://127.0.0.1:9");
        let client = WorkersAiClient::new(WorkersAiConfig {
            timeout: Duration::from_secs(2),
            ..config
        })
        .unwrap();

        let metrics = crate::MetricBreakdown::default();
        let schema = crate::SchemaGuess::default();
        let text =
            crate::synthesize_narrative(&schema, &metrics, &[], &[], Some(&client));
        assert!(text.starts_with("Detected revenue column: unknown."));
    }
}
