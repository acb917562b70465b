use std::time::Duration;

use futures_util::future::join_all;
use intel_core::{
    AnalysisReport, DeliveryStatus, DestinationWriter, IntelError, Subscriber, TickerRequest,
};

/// Per-subscriber result of one broadcast fan-out.
#[derive(Debug, Clone)]
pub struct BroadcastOutcome {
    pub subscriber_id: i64,
    pub delivered: bool,
    pub error: Option<String>,
}

/// Deliver one report to every subscriber of a ticker concurrently.
/// Settle-all semantics: each delivery is isolated, no fail-fast. A
/// delivery is retried up to `retries` times with a fixed delay before it
/// is recorded as failed.
pub async fn broadcast_report(
    writer: &dyn DestinationWriter,
    request: &TickerRequest,
    report: &AnalysisReport,
    retries: u32,
    retry_delay: Duration,
) -> Vec<BroadcastOutcome> {
    let deliveries = request
        .subscribers
        .iter()
        .map(|subscriber| deliver_to_subscriber(writer, subscriber, report, retries, retry_delay));

    join_all(deliveries).await
}

async fn deliver_to_subscriber(
    writer: &dyn DestinationWriter,
    subscriber: &Subscriber,
    report: &AnalysisReport,
    retries: u32,
    retry_delay: Duration,
) -> BroadcastOutcome {
    let mut last_error = String::new();

    for attempt in 0..=retries {
        match writer.write_result(subscriber, report).await {
            Ok(()) => {
                // The content write is the success criterion; a failed
                // status update is logged and does not undo the delivery.
                mark_status_best_effort(writer, subscriber, &report.ticker, &DeliveryStatus::Complete)
                    .await;
                tracing::debug!(
                    subscriber_id = subscriber.id,
                    ticker = %report.ticker,
                    "Delivered analysis result"
                );
                return BroadcastOutcome {
                    subscriber_id: subscriber.id,
                    delivered: true,
                    error: None,
                };
            }
            Err(e) => {
                last_error = e.to_string();
                tracing::warn!(
                    subscriber_id = subscriber.id,
                    ticker = %report.ticker,
                    attempt = attempt + 1,
                    "Delivery failed: {}",
                    last_error
                );
                if attempt < retries {
                    tokio::time::sleep(retry_delay).await;
                }
            }
        }
    }

    mark_status_best_effort(
        writer,
        subscriber,
        &report.ticker,
        &DeliveryStatus::Error(format!("Delivery failed: {last_error}")),
    )
    .await;

    BroadcastOutcome {
        subscriber_id: subscriber.id,
        delivered: false,
        error: Some(last_error),
    }
}

/// Mark a destination status without letting the outcome affect the run.
/// Destinations that do not support a status property are skipped quietly.
pub async fn mark_status_best_effort(
    writer: &dyn DestinationWriter,
    subscriber: &Subscriber,
    ticker: &str,
    status: &DeliveryStatus,
) {
    match writer.mark_status(subscriber, ticker, status).await {
        Ok(()) => {}
        Err(IntelError::StatusUnsupported(detail)) => {
            tracing::debug!(
                subscriber_id = subscriber.id,
                "Destination does not support status marking: {}",
                detail
            );
        }
        Err(e) => {
            tracing::warn!(
                subscriber_id = subscriber.id,
                status = status.as_str(),
                "Failed to mark destination status: {}",
                e
            );
        }
    }
}
