use std::time::Duration;

use intel_core::AccessCredential;
use reqwest::Method;
use serde_json::{json, Value};

const BASE_URL: &str = "https://api.notion.com/v1";
const NOTION_VERSION: &str = "2022-06-28";
const RATE_LIMIT_WAIT: Duration = Duration::from_secs(2);

/// Failure from the workspace API, kept structured so callers can
/// classify capability errors.
#[derive(Debug)]
pub enum NotionApiError {
    Http { status: u16, body: String },
    Transport(String),
}

impl std::fmt::Display for NotionApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotionApiError::Http { status, body } => write!(f, "HTTP {status}: {body}"),
            NotionApiError::Transport(e) => write!(f, "transport error: {e}"),
        }
    }
}

impl NotionApiError {
    /// Schema-level rejection, e.g. a property the database does not have.
    pub fn is_validation_error(&self) -> bool {
        matches!(self, NotionApiError::Http { status: 400, body } if body.contains("validation_error"))
    }
}

/// Low-level versioned client for the workspace API. Each call carries the
/// subscriber's own credential; requests that hit the shared rate limit
/// are retried a bounded number of times after a short wait.
pub struct NotionApi {
    client: reqwest::Client,
    base_url: String,
}

impl NotionApi {
    pub fn new(timeout: Duration) -> Self {
        Self::with_base_url(BASE_URL.to_string(), timeout)
    }

    pub fn with_base_url(base_url: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { client, base_url }
    }

    pub async fn query_database(
        &self,
        credential: &AccessCredential,
        database_id: &str,
        body: &Value,
    ) -> Result<Value, NotionApiError> {
        self.send(
            Method::POST,
            &format!("databases/{database_id}/query"),
            credential,
            Some(body),
        )
        .await
    }

    pub async fn create_page(
        &self,
        credential: &AccessCredential,
        body: &Value,
    ) -> Result<Value, NotionApiError> {
        self.send(Method::POST, "pages", credential, Some(body)).await
    }

    pub async fn update_page(
        &self,
        credential: &AccessCredential,
        page_id: &str,
        body: &Value,
    ) -> Result<Value, NotionApiError> {
        self.send(Method::PATCH, &format!("pages/{page_id}"), credential, Some(body))
            .await
    }

    /// Locate a record by its Ticker title property. `None` covers both
    /// "no such page" and a failed lookup; callers fall through to create.
    pub async fn find_page_by_ticker(
        &self,
        credential: &AccessCredential,
        database_id: &str,
        ticker: &str,
    ) -> Option<String> {
        let body = json!({
            "filter": {"property": "Ticker", "title": {"equals": ticker}},
            "page_size": 1,
        });
        match self.query_database(credential, database_id, &body).await {
            Ok(response) => response["results"]
                .as_array()
                .and_then(|results| results.first())
                .and_then(|page| page["id"].as_str())
                .map(str::to_string),
            Err(e) => {
                tracing::debug!("Page lookup for {} failed: {}", ticker, e);
                None
            }
        }
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        credential: &AccessCredential,
        body: Option<&Value>,
    ) -> Result<Value, NotionApiError> {
        let url = format!("{}/{}", self.base_url, path);

        for attempt in 0..3u32 {
            let mut request = self
                .client
                .request(method.clone(), &url)
                .bearer_auth(credential.expose())
                .header("Notion-Version", NOTION_VERSION);
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request
                .send()
                .await
                .map_err(|e| NotionApiError::Transport(e.to_string()))?;

            let status = response.status();
            if status.as_u16() == 429 {
                tracing::warn!(
                    "Workspace API rate limited, waiting {:?} before retry {}/3",
                    RATE_LIMIT_WAIT,
                    attempt + 1
                );
                tokio::time::sleep(RATE_LIMIT_WAIT).await;
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(NotionApiError::Http {
                    status: status.as_u16(),
                    body: truncate(&body),
                });
            }

            return response
                .json::<Value>()
                .await
                .map_err(|e| NotionApiError::Transport(e.to_string()));
        }

        Err(NotionApiError::Http {
            status: 429,
            body: "rate limited after 3 attempts".to_string(),
        })
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(300).collect()
}
