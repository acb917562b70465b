use std::sync::Arc;

use async_trait::async_trait;
use chrono_tz::Tz;
use dashmap::DashMap;
use intel_core::{
    AnalysisReport, DeliveryStatus, DestinationWriter, IntelError, Subscriber,
};
use serde_json::{json, Value};

use crate::api::{NotionApi, NotionApiError};

/// Rich text payload limit on the workspace API.
const MAX_RICH_TEXT_CHARS: usize = 2000;

/// Writes analysis results and status updates into each subscriber's
/// destination database. Status marking is capability-gated: a database
/// whose schema rejects the status property is remembered and every later
/// status call for it degrades to a no-op.
pub struct NotionDestination {
    api: Arc<NotionApi>,
    status_unsupported: DashMap<String, ()>,
}

impl NotionDestination {
    pub fn new(api: Arc<NotionApi>) -> Self {
        Self {
            api,
            status_unsupported: DashMap::new(),
        }
    }
}

#[async_trait]
impl DestinationWriter for NotionDestination {
    async fn write_result(
        &self,
        subscriber: &Subscriber,
        report: &AnalysisReport,
    ) -> Result<(), IntelError> {
        let db_id = destination_db(subscriber)?;
        let properties = build_properties(report, &subscriber.timezone);

        let existing = self
            .api
            .find_page_by_ticker(&subscriber.credential, db_id, &report.ticker)
            .await;

        let result = match existing {
            Some(page_id) => {
                self.api
                    .update_page(
                        &subscriber.credential,
                        &page_id,
                        &json!({"properties": properties}),
                    )
                    .await
            }
            None => {
                self.api
                    .create_page(
                        &subscriber.credential,
                        &json!({
                            "parent": {"database_id": db_id},
                            "properties": properties,
                        }),
                    )
                    .await
            }
        };

        result
            .map(|_| ())
            .map_err(|e| IntelError::Destination(e.to_string()))
    }

    async fn mark_status(
        &self,
        subscriber: &Subscriber,
        ticker: &str,
        status: &DeliveryStatus,
    ) -> Result<(), IntelError> {
        let db_id = destination_db(subscriber)?;

        if self.status_unsupported.contains_key(db_id) {
            return Err(IntelError::StatusUnsupported(format!(
                "database {db_id} has no status property"
            )));
        }

        let mut properties = json!({
            "Content Status": {"select": {"name": status.as_str()}},
        });
        if let Some(detail) = status.detail() {
            properties["Status Detail"] = rich_text(detail);
        }

        let result = match self
            .api
            .find_page_by_ticker(&subscriber.credential, db_id, ticker)
            .await
        {
            Some(page_id) => {
                self.api
                    .update_page(
                        &subscriber.credential,
                        &page_id,
                        &json!({"properties": properties}),
                    )
                    .await
            }
            None => {
                // First status update for a new ticker arrives before any
                // content write; seed the record with its title.
                properties["Ticker"] = json!({"title": [{"text": {"content": ticker}}]});
                self.api
                    .create_page(
                        &subscriber.credential,
                        &json!({
                            "parent": {"database_id": db_id},
                            "properties": properties,
                        }),
                    )
                    .await
            }
        };

        match result {
            Ok(_) => Ok(()),
            Err(e) if e.is_validation_error() => {
                self.status_unsupported.insert(db_id.to_string(), ());
                Err(IntelError::StatusUnsupported(e.to_string()))
            }
            Err(e) => Err(IntelError::Destination(e.to_string())),
        }
    }
}

fn destination_db(subscriber: &Subscriber) -> Result<&str, IntelError> {
    subscriber
        .analyses_db_id
        .as_deref()
        .ok_or_else(|| IntelError::Destination("no destination database configured".to_string()))
}

/// Build the destination page properties for one report. Timestamps are
/// rendered in the subscriber's timezone; an unparseable zone falls back
/// to UTC.
pub(crate) fn build_properties(report: &AnalysisReport, timezone: &str) -> Value {
    let tz: Tz = timezone.parse().unwrap_or(Tz::UTC);
    let local_ts = report.timestamp.with_timezone(&tz);

    let mut props = json!({
        "Ticker": {"title": [{"text": {"content": report.ticker}}]},
        "Analysis Date": {"date": {"start": local_ts.to_rfc3339()}},
    });

    if let Some(name) = &report.company_name {
        props["Company Name"] = rich_text(name);
    }
    if let Some(price) = report.current_price {
        props["Current Price"] = number(price, 2);
    }

    if let Some(score) = report.composite_score {
        props["Composite Score"] = number(score, 2);
    }
    if let Some(score) = report.technical_score {
        props["Technical Score"] = number(score, 2);
    }
    if let Some(score) = report.fundamental_score {
        props["Fundamental Score"] = number(score, 2);
    }
    if let Some(score) = report.macro_score {
        props["Macro Score"] = number(score, 2);
    }
    if let Some(score) = report.risk_score {
        props["Risk Score"] = number(score, 2);
    }
    if let Some(score) = report.sentiment_score {
        props["Sentiment Score"] = number(score, 2);
    }

    if let Some(recommendation) = &report.recommendation {
        props["Recommendation"] = json!({"select": {"name": recommendation}});
    }
    if let Some(summary) = &report.summary {
        props["Summary"] = rich_text(summary);
    }
    if let Some(completeness) = report.data_completeness {
        props["Data Completeness"] = number(completeness, 2);
    }
    if let Some(calls) = report.api_calls_used {
        props["API Calls Used"] = json!({"number": calls});
    }

    props
}

fn rich_text(text: &str) -> Value {
    let clipped: String = text.chars().take(MAX_RICH_TEXT_CHARS).collect();
    json!({"rich_text": [{"text": {"content": clipped}}]})
}

fn number(value: f64, decimals: u32) -> Value {
    let factor = 10f64.powi(decimals as i32);
    json!({"number": (value * factor).round() / factor})
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{TimeZone, Utc};

    fn report() -> AnalysisReport {
        AnalysisReport {
            ticker: "AMZN".to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 1, 5, 21, 0, 0).unwrap(),
            company_name: Some("Amazon.com Inc".to_string()),
            current_price: Some(233.456),
            technical_score: Some(3.456),
            fundamental_score: Some(4.0),
            macro_score: Some(2.8),
            risk_score: Some(3.1),
            sentiment_score: Some(3.333),
            composite_score: Some(3.42),
            recommendation: Some("Buy".to_string()),
            summary: Some("Solid quarter.".to_string()),
            data_completeness: Some(0.857),
            api_calls_used: Some(17),
        }
    }

    #[test]
    fn builds_score_properties_rounded() {
        let props = build_properties(&report(), "UTC");

        assert_eq!(
            props["Ticker"]["title"][0]["text"]["content"],
            json!("AMZN")
        );
        assert_eq!(props["Technical Score"]["number"], json!(3.46));
        assert_eq!(props["Sentiment Score"]["number"], json!(3.33));
        assert_eq!(props["Data Completeness"]["number"], json!(0.86));
        assert_eq!(props["Recommendation"]["select"]["name"], json!("Buy"));
        assert_eq!(props["API Calls Used"]["number"], json!(17));
    }

    #[test]
    fn renders_timestamps_in_subscriber_timezone() {
        let props = build_properties(&report(), "America/Los_Angeles");
        let start = props["Analysis Date"]["date"]["start"].as_str().unwrap();
        // 21:00 UTC on Jan 5 is 13:00 PST.
        assert!(start.starts_with("2026-01-05T13:00:00"), "got {start}");
        assert!(start.ends_with("-08:00"), "got {start}");
    }

    #[test]
    fn unparseable_timezone_falls_back_to_utc() {
        let props = build_properties(&report(), "Mars/Olympus_Mons");
        let start = props["Analysis Date"]["date"]["start"].as_str().unwrap();
        assert!(start.starts_with("2026-01-05T21:00:00"), "got {start}");
    }

    #[test]
    fn omits_absent_fields() {
        let mut partial = report();
        partial.summary = None;
        partial.macro_score = None;
        let props = build_properties(&partial, "UTC");

        assert!(props.get("Summary").is_none());
        assert!(props.get("Macro Score").is_none());
        assert!(props.get("Composite Score").is_some());
    }

    #[test]
    fn clips_oversized_summaries() {
        let mut long = report();
        long.summary = Some("y".repeat(5000));
        let props = build_properties(&long, "UTC");
        let content = props["Summary"]["rich_text"][0]["text"]["content"]
            .as_str()
            .unwrap();
        assert_eq!(content.len(), MAX_RICH_TEXT_CHARS);
    }

    #[test]
    fn validation_errors_are_classified() {
        let err = NotionApiError::Http {
            status: 400,
            body: r#"{"code":"validation_error","message":"Content Status is not a property"}"#
                .to_string(),
        };
        assert!(err.is_validation_error());

        let other = NotionApiError::Http {
            status: 500,
            body: "internal".to_string(),
        };
        assert!(!other.is_validation_error());
    }
}
