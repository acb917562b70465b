use std::time::Duration;

use async_trait::async_trait;
use intel_core::{
    AccessCredential, AnalysisExecutor, AnalysisReport, IntelError, MarketContext,
    MarketContextProvider,
};
use serde::Serialize;

const MAX_ERROR_BODY_CHARS: usize = 300;

/// Configuration for the analysis computation service.
#[derive(Debug, Clone)]
pub struct AnalysisClientConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for AnalysisClientConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("ANALYSIS_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8010".to_string()),
            timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    ticker: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    market_context: Option<&'a MarketContext>,
}

/// HTTP implementation of the Analysis Executor interface. The analysis
/// computation (scoring, LLM summarization) lives behind this service;
/// this client transports requests, bounds stuck calls with a request
/// timeout, and classifies provider failures for the retry loop.
#[derive(Clone)]
pub struct HttpAnalysisExecutor {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAnalysisExecutor {
    pub fn new(config: &AnalysisClientConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: config.base_url.clone(),
        }
    }
}

#[async_trait]
impl AnalysisExecutor for HttpAnalysisExecutor {
    async fn analyze(
        &self,
        ticker: &str,
        credential: &AccessCredential,
        context: Option<&MarketContext>,
    ) -> Result<AnalysisReport, IntelError> {
        let request = AnalyzeRequest {
            ticker,
            market_context: context,
        };

        let response = self
            .client
            .post(format!("{}/v1/analyze", self.base_url))
            .bearer_auth(credential.expose())
            .json(&request)
            .send()
            .await
            .map_err(|e| IntelError::Api(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_error(status.as_u16(), &body));
        }

        response
            .json::<AnalysisReport>()
            .await
            .map_err(|e| IntelError::Api(format!("Malformed analysis response: {e}")))
    }
}

/// Map an analysis-service response to the core error taxonomy. Quota and
/// overload statuses are the retryable classes; everything else returns
/// to the caller immediately.
fn map_error(status: u16, body: &str) -> IntelError {
    let body = truncate(body);
    match status {
        429 => IntelError::QuotaExceeded(body),
        503 => IntelError::Overloaded(body),
        400 | 422 => IntelError::Validation(body),
        404 => IntelError::InvalidTicker(body),
        _ => IntelError::Api(format!("HTTP {status}: {body}")),
    }
}

fn truncate(body: &str) -> String {
    if body.chars().count() > MAX_ERROR_BODY_CHARS {
        body.chars().take(MAX_ERROR_BODY_CHARS).collect()
    } else {
        body.to_string()
    }
}

/// Market-context endpoint of the same service, consumed through the TTL
/// cache in `market-context`.
#[derive(Clone)]
pub struct HttpMarketContextProvider {
    client: reqwest::Client,
    base_url: String,
    service_token: String,
}

impl HttpMarketContextProvider {
    pub fn new(config: &AnalysisClientConfig, service_token: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: config.base_url.clone(),
            service_token,
        }
    }
}

#[async_trait]
impl MarketContextProvider for HttpMarketContextProvider {
    async fn fetch(&self) -> Result<MarketContext, IntelError> {
        let response = self
            .client
            .get(format!("{}/v1/market-context", self.base_url))
            .bearer_auth(&self.service_token)
            .send()
            .await
            .map_err(|e| IntelError::Api(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IntelError::Api(format!("HTTP {status}: {}", truncate(&body))));
        }

        response
            .json::<MarketContext>()
            .await
            .map_err(|e| IntelError::Api(format!("Malformed market context: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_provider_statuses_to_error_classes() {
        assert!(matches!(
            map_error(429, "quota exceeded, retry after 30 seconds"),
            IntelError::QuotaExceeded(_)
        ));
        assert!(matches!(
            map_error(503, "model overloaded"),
            IntelError::Overloaded(_)
        ));
        assert!(matches!(map_error(400, "bad request"), IntelError::Validation(_)));
        assert!(matches!(map_error(422, "bad payload"), IntelError::Validation(_)));
        assert!(matches!(
            map_error(404, "unknown ticker"),
            IntelError::InvalidTicker(_)
        ));
        assert!(matches!(map_error(500, "boom"), IntelError::Api(_)));
    }

    #[test]
    fn truncates_long_error_bodies() {
        let body = "x".repeat(1000);
        let mapped = map_error(500, &body);
        let rendered = mapped.to_string();
        assert!(rendered.len() < body.len());
    }

    #[test]
    fn deserializes_partial_reports() {
        // Score fields the service could not compute arrive as nulls or
        // are absent entirely; both must deserialize.
        let json = r#"{
            "ticker": "AAPL",
            "timestamp": "2026-01-05T21:00:00Z",
            "current_price": 231.4,
            "technical_score": 3.2,
            "fundamental_score": null
        }"#;
        let report: AnalysisReport = serde_json::from_str(json).unwrap();
        assert_eq!(report.ticker, "AAPL");
        assert!(!report.is_complete());
        assert!(report.missing_scores().contains(&"fundamental"));
    }

    #[test]
    fn analyze_request_omits_missing_context() {
        let request = AnalyzeRequest {
            ticker: "AAPL",
            market_context: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("market_context").is_none());
    }
}
