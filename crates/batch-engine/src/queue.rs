use std::collections::BTreeMap;

use chrono::Utc;
use intel_core::{Subscriber, TickerRequest};

/// Convert the ticker->subscribers mapping into the processing queue,
/// ascending by priority rank (1 = Pro ... 4 = Free). The sort is stable,
/// so equal-rank tickers keep the mapping's alphabetical order. One-shot
/// transformation, no side effects.
pub fn build_queue(grouped: BTreeMap<String, Vec<Subscriber>>) -> Vec<TickerRequest> {
    let requested_at = Utc::now();
    let mut queue: Vec<TickerRequest> = grouped
        .into_iter()
        .filter(|(_, subscribers)| !subscribers.is_empty())
        .map(|(ticker, subscribers)| {
            let priority = subscribers
                .iter()
                .map(|s| s.tier.rank())
                .min()
                .unwrap_or(u8::MAX);
            TickerRequest {
                ticker,
                subscribers,
                priority,
                requested_at,
            }
        })
        .collect();

    queue.sort_by_key(|request| request.priority);
    queue
}
