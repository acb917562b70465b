use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use intel_core::{
    AnalysisExecutor, AnalysisReport, DeliveryStatus, DestinationWriter, IntelError, MarketContext,
    RequestSource, Subscriber, SubscriberRegistry, TickerRequest,
};
use market_context::MarketContextCache;

use crate::broadcast::{broadcast_report, mark_status_best_effort};
use crate::collector::collect_requests;
use crate::metrics::RunMetrics;
use crate::queue::build_queue;
use crate::retry::{is_retryable, RetryPolicy};

/// Tuning knobs for one orchestration run.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Pause between tickers, skipped after the last one. Protects shared
    /// provider quotas.
    pub inter_ticker_delay: Duration,
    pub retry_policy: RetryPolicy,
    /// Delivery retries per subscriber after the initial attempt.
    pub broadcast_retries: u32,
    pub broadcast_retry_delay: Duration,
    /// External calls one analysis consumes, for the savings estimate.
    pub calls_per_analysis: u32,
    /// Exercise dedup and priority logic without any provider calls.
    pub dry_run: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            inter_ticker_delay: Duration::from_secs(5),
            retry_policy: RetryPolicy::default(),
            broadcast_retries: 2,
            broadcast_retry_delay: Duration::from_secs(5),
            calls_per_analysis: 17,
            dry_run: false,
        }
    }
}

/// The orchestration engine: collects per-subscriber requests, dedups by
/// ticker, processes the priority queue strictly sequentially, and fans
/// each result out to all subscribers of the ticker.
pub struct BatchEngine {
    registry: Arc<dyn SubscriberRegistry>,
    source: Arc<dyn RequestSource>,
    executor: Arc<dyn AnalysisExecutor>,
    writer: Arc<dyn DestinationWriter>,
    context_cache: Arc<MarketContextCache>,
    config: BatchConfig,
}

impl BatchEngine {
    pub fn new(
        registry: Arc<dyn SubscriberRegistry>,
        source: Arc<dyn RequestSource>,
        executor: Arc<dyn AnalysisExecutor>,
        writer: Arc<dyn DestinationWriter>,
        context_cache: Arc<MarketContextCache>,
        config: BatchConfig,
    ) -> Self {
        Self {
            registry,
            source,
            executor,
            writer,
            context_cache,
            config,
        }
    }

    /// Execute one orchestration run over a frozen snapshot of subscribers.
    /// Only a registry failure is run-fatal; every subscriber- and
    /// ticker-level error is isolated and reflected in the metrics.
    pub async fn run(&self) -> Result<RunMetrics, IntelError> {
        let run_start = Instant::now();
        let mut metrics = RunMetrics::new();

        let subscribers = self.registry.list_active_subscribers().await?;
        tracing::info!(
            subscribers = subscribers.len(),
            dry_run = self.config.dry_run,
            "Starting orchestration run"
        );

        let grouped = collect_requests(self.source.as_ref(), &subscribers).await;
        let queue = build_queue(grouped);

        metrics.unique_tickers = queue.len() as u64;
        metrics.subscriber_pairs = queue.iter().map(|r| r.subscriber_count() as u64).sum();
        tracing::info!(
            unique_tickers = metrics.unique_tickers,
            subscriber_pairs = metrics.subscriber_pairs,
            "Priority queue built"
        );

        // Fetched once per run, passed read-only into every analysis. A
        // miss degrades the analyses, never the run.
        let context = if self.config.dry_run {
            None
        } else {
            self.context_cache.get().await
        };
        if !self.config.dry_run && context.is_none() {
            tracing::warn!("No market context available; analyses run without macro snapshot");
        }

        let total = queue.len();
        for (index, request) in queue.iter().enumerate() {
            self.process_ticker(request, context.as_ref(), &mut metrics)
                .await;

            if !self.config.dry_run && index + 1 < total {
                tokio::time::sleep(self.config.inter_ticker_delay).await;
            }
        }

        metrics.finish(run_start);
        metrics.log_summary();
        Ok(metrics)
    }

    /// Run one ticker through analysis and broadcast. Exactly one request
    /// is in flight at any time; failures never block the next ticker.
    async fn process_ticker(
        &self,
        request: &TickerRequest,
        context: Option<&MarketContext>,
        metrics: &mut RunMetrics,
    ) {
        metrics.record_saved_calls(request.subscriber_count(), self.config.calls_per_analysis);

        if self.config.dry_run {
            metrics.tickers_analyzed += 1;
            tracing::info!(
                ticker = %request.ticker,
                subscribers = request.subscriber_count(),
                priority = request.priority,
                "Dry run: would analyze"
            );
            return;
        }

        tracing::info!(
            ticker = %request.ticker,
            subscribers = request.subscriber_count(),
            priority = request.priority,
            "Processing ticker"
        );

        self.mark_all(request, &DeliveryStatus::InProgress).await;

        match self.analyze_with_retry(request, context).await {
            Ok(report) => {
                metrics.tickers_analyzed += 1;
                let outcomes = broadcast_report(
                    self.writer.as_ref(),
                    request,
                    &report,
                    self.config.broadcast_retries,
                    self.config.broadcast_retry_delay,
                )
                .await;
                metrics.record_broadcasts(&outcomes);
            }
            Err(e) => {
                metrics.tickers_failed += 1;
                tracing::warn!(ticker = %request.ticker, "Analysis failed: {}", e);
                self.mark_all(request, &DeliveryStatus::Error(e.to_string()))
                    .await;
            }
        }
    }

    /// Call the executor with bounded retry on transient provider errors.
    /// A provider-supplied "retry after N seconds" directive overrides the
    /// exponential backoff. Incomplete reports are failures.
    async fn analyze_with_retry(
        &self,
        request: &TickerRequest,
        context: Option<&MarketContext>,
    ) -> Result<AnalysisReport, IntelError> {
        let Some(representative) = representative_subscriber(request) else {
            return Err(IntelError::Validation(format!(
                "no subscribers for {}",
                request.ticker
            )));
        };
        let policy = &self.config.retry_policy;
        let mut attempt = 1u32;

        loop {
            match self
                .executor
                .analyze(&request.ticker, &representative.credential, context)
                .await
            {
                Ok(report) => {
                    if report.is_complete() {
                        return Ok(report);
                    }
                    return Err(IntelError::Incomplete(format!(
                        "missing score fields: {}",
                        report.missing_scores().join(", ")
                    )));
                }
                Err(e) if is_retryable(&e) && attempt < policy.max_attempts => {
                    let delay = policy.delay_after(attempt, &e.to_string());
                    tracing::warn!(
                        ticker = %request.ticker,
                        attempt,
                        delay_secs = delay.as_secs(),
                        "Transient provider error, backing off: {}",
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Best-effort status update for every subscriber of a ticker,
    /// concurrently. Unsupported destinations are skipped quietly.
    async fn mark_all(&self, request: &TickerRequest, status: &DeliveryStatus) {
        let updates = request.subscribers.iter().map(|subscriber| {
            mark_status_best_effort(self.writer.as_ref(), subscriber, &request.ticker, status)
        });
        join_all(updates).await;
    }
}

/// The subscriber whose credential runs the single shared analysis: the
/// highest-tier requester of the ticker.
fn representative_subscriber(request: &TickerRequest) -> Option<&Subscriber> {
    request.subscribers.iter().min_by_key(|s| s.tier.rank())
}
