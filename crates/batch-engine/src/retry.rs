use std::sync::OnceLock;
use std::time::Duration;

use intel_core::IntelError;
use regex::Regex;

/// Retry policy for transient provider failures during analysis.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempt cap, initial call included.
    pub max_attempts: u32,
    /// First backoff delay; doubles each retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay, including provider directives.
    pub ceiling: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            ceiling: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt, after `attempt` (1-based) just
    /// failed. A "retry after N seconds" directive in the provider error
    /// text overrides the computed backoff; both are capped at the ceiling.
    pub fn delay_after(&self, attempt: u32, error_text: &str) -> Duration {
        if let Some(directive) = parse_retry_after(error_text) {
            return directive.min(self.ceiling);
        }
        let exponent = attempt.saturating_sub(1).min(16);
        let backoff = self.base_delay.saturating_mul(2u32.saturating_pow(exponent));
        backoff.min(self.ceiling)
    }
}

/// Whether the processing loop should retry after this error. Quota and
/// overload failures are transient; everything else returns immediately.
/// Raw API error text is inspected for retryability markers since some
/// providers only surface a status line in the message.
pub fn is_retryable(err: &IntelError) -> bool {
    match err {
        IntelError::QuotaExceeded(_) | IntelError::Overloaded(_) => true,
        IntelError::Api(text) => {
            let text = text.to_ascii_lowercase();
            text.contains("429")
                || text.contains("503")
                || text.contains("quota")
                || text.contains("rate limit")
                || text.contains("overloaded")
                || text.contains("unavailable")
        }
        _ => false,
    }
}

/// Extract an explicit "retry after N seconds" directive from provider
/// error text. Handles the shapes seen in the wild: "retry after 30
/// seconds", "Please retry in 32.5s", "Retry-After: 30". Fractional
/// seconds round up.
pub fn parse_retry_after(text: &str) -> Option<Duration> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?i)retry(?:-|\s+)?(?:after|in)\s*:?\s*(\d+(?:\.\d+)?)").unwrap()
    });

    let captures = re.captures(text)?;
    let secs: f64 = captures.get(1)?.as_str().parse().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some(Duration::from_secs(secs.ceil() as u64))
}
