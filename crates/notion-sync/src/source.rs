use std::sync::Arc;

use async_trait::async_trait;
use intel_core::{IntelError, RequestSource, Subscriber};
use serde_json::{json, Value};

use crate::api::NotionApi;

/// Reads a subscriber's watchlist database: every page whose Cadence
/// select is "Recurring" contributes its Ticker title to the run.
pub struct NotionRequestSource {
    api: Arc<NotionApi>,
}

impl NotionRequestSource {
    pub fn new(api: Arc<NotionApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl RequestSource for NotionRequestSource {
    async fn list_recurring_tickers(
        &self,
        subscriber: &Subscriber,
    ) -> Result<Vec<String>, IntelError> {
        let Some(db_id) = &subscriber.watchlist_db_id else {
            tracing::debug!(
                subscriber_id = subscriber.id,
                "No watchlist database configured"
            );
            return Ok(Vec::new());
        };

        let mut tickers = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut body = json!({
                "filter": {"property": "Cadence", "select": {"equals": "Recurring"}},
                "page_size": 100,
            });
            if let Some(cursor) = &cursor {
                body["start_cursor"] = json!(cursor);
            }

            let response = self
                .api
                .query_database(&subscriber.credential, db_id, &body)
                .await
                .map_err(|e| IntelError::RequestSource(e.to_string()))?;

            if let Some(results) = response["results"].as_array() {
                for page in results {
                    if let Some(ticker) = extract_ticker_title(page) {
                        tickers.push(ticker);
                    }
                }
            }

            if response["has_more"].as_bool() == Some(true) {
                cursor = response["next_cursor"].as_str().map(str::to_string);
                if cursor.is_none() {
                    break;
                }
            } else {
                break;
            }
        }

        Ok(tickers)
    }
}

/// Pull the plain text out of a page's Ticker title property.
pub(crate) fn extract_ticker_title(page: &Value) -> Option<String> {
    let fragments = page["properties"]["Ticker"]["title"].as_array()?;
    let text: String = fragments
        .iter()
        .filter_map(|fragment| {
            fragment["plain_text"]
                .as_str()
                .or_else(|| fragment["text"]["content"].as_str())
        })
        .collect();
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}
