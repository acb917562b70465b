use std::collections::BTreeMap;

use intel_core::{RequestSource, Subscriber};

/// Normalize raw ticker text for dedup: uppercase, trimmed. Empty strings
/// are dropped.
pub fn normalize_ticker(raw: &str) -> Option<String> {
    let ticker = raw.trim().to_uppercase();
    if ticker.is_empty() {
        None
    } else {
        Some(ticker)
    }
}

/// Collect recurring-analysis requests across all subscribers, grouped by
/// normalized ticker. One subscriber's source failure is logged and does
/// not affect the others. The BTreeMap keeps iteration order deterministic
/// by ticker symbol, which fixes the queue's equal-priority tie-break.
pub async fn collect_requests(
    source: &dyn RequestSource,
    subscribers: &[Subscriber],
) -> BTreeMap<String, Vec<Subscriber>> {
    let mut grouped: BTreeMap<String, Vec<Subscriber>> = BTreeMap::new();

    for subscriber in subscribers {
        // Not yet onboarded: no destination to deliver to.
        if subscriber.analyses_db_id.is_none() {
            tracing::debug!(
                subscriber_id = subscriber.id,
                "Skipping subscriber without a configured destination"
            );
            continue;
        }

        let tickers = match source.list_recurring_tickers(subscriber).await {
            Ok(tickers) => tickers,
            Err(e) => {
                tracing::warn!(
                    subscriber_id = subscriber.id,
                    "Failed to query request source: {}",
                    e
                );
                continue;
            }
        };

        for raw in tickers {
            let Some(ticker) = normalize_ticker(&raw) else {
                continue;
            };
            let entry = grouped.entry(ticker).or_default();
            // One subscriber flagging the same ticker twice is still one
            // delivery.
            if !entry.iter().any(|s| s.id == subscriber.id) {
                entry.push(subscriber.clone());
            }
        }
    }

    grouped
}
