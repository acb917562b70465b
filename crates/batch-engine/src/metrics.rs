use std::time::Instant;

use crate::broadcast::BroadcastOutcome;

/// Aggregate counters for one orchestration run. Created empty at run
/// start, mutated incrementally, returned as the run's final output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunMetrics {
    /// Unique tickers in the queue after dedup.
    pub unique_tickers: u64,
    /// Subscriber-ticker pairs before dedup.
    pub subscriber_pairs: u64,
    pub tickers_analyzed: u64,
    pub tickers_failed: u64,
    pub broadcasts_attempted: u64,
    pub broadcasts_succeeded: u64,
    pub broadcasts_failed: u64,
    /// Redundant external calls avoided by dedup:
    /// (subscribers - 1) x calls_per_analysis, summed across tickers.
    pub api_calls_saved: u64,
    pub duration_ms: u64,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_saved_calls(&mut self, subscriber_count: usize, calls_per_analysis: u32) {
        let redundant = subscriber_count.saturating_sub(1) as u64;
        self.api_calls_saved += redundant * u64::from(calls_per_analysis);
    }

    pub fn record_broadcasts(&mut self, outcomes: &[BroadcastOutcome]) {
        self.broadcasts_attempted += outcomes.len() as u64;
        for outcome in outcomes {
            if outcome.delivered {
                self.broadcasts_succeeded += 1;
            } else {
                self.broadcasts_failed += 1;
            }
        }
    }

    pub fn finish(&mut self, run_start: Instant) {
        self.duration_ms = run_start.elapsed().as_millis() as u64;
    }

    /// Emit a structured run summary via tracing.
    pub fn log_summary(&self) {
        tracing::info!(
            unique_tickers = self.unique_tickers,
            subscriber_pairs = self.subscriber_pairs,
            tickers_analyzed = self.tickers_analyzed,
            tickers_failed = self.tickers_failed,
            broadcasts_attempted = self.broadcasts_attempted,
            broadcasts_succeeded = self.broadcasts_succeeded,
            broadcasts_failed = self.broadcasts_failed,
            api_calls_saved = self.api_calls_saved,
            duration_ms = self.duration_ms,
            "Run metrics summary"
        );
    }

    /// Serialize for the trigger response / state persistence.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "unique_tickers": self.unique_tickers,
            "subscriber_pairs": self.subscriber_pairs,
            "tickers_analyzed": self.tickers_analyzed,
            "tickers_failed": self.tickers_failed,
            "broadcasts_attempted": self.broadcasts_attempted,
            "broadcasts_succeeded": self.broadcasts_succeeded,
            "broadcasts_failed": self.broadcasts_failed,
            "api_calls_saved": self.api_calls_saved,
            "duration_ms": self.duration_ms,
        })
    }
}
