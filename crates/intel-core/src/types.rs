use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Subscription tier, used to compute ticker priority.
/// Pro outranks Analyst outranks Starter outranks Free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionTier {
    Pro,
    Analyst,
    Starter,
    Free,
}

impl SubscriptionTier {
    /// Priority rank: 1 is highest (Pro), 4 is lowest (Free).
    pub fn rank(&self) -> u8 {
        match self {
            SubscriptionTier::Pro => 1,
            SubscriptionTier::Analyst => 2,
            SubscriptionTier::Starter => 3,
            SubscriptionTier::Free => 4,
        }
    }

    /// Parse a tier string from the registry. Unknown tiers rank lowest.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "pro" => SubscriptionTier::Pro,
            "analyst" => SubscriptionTier::Analyst,
            "starter" => SubscriptionTier::Starter,
            _ => SubscriptionTier::Free,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SubscriptionTier::Pro => "Pro",
            SubscriptionTier::Analyst => "Analyst",
            SubscriptionTier::Starter => "Starter",
            SubscriptionTier::Free => "Free",
        }
    }
}

/// A decrypted workspace access token. Held in memory for the duration of a
/// run only: redacted in Debug output and never serialized.
#[derive(Clone)]
pub struct AccessCredential(String);

impl AccessCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for building Authorization headers.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AccessCredential(***)")
    }
}

/// One tenant's subscription, constructed fresh from the registry at the
/// start of each run and discarded at run end.
#[derive(Debug, Clone)]
pub struct Subscriber {
    pub id: i64,
    pub email: String,
    pub tier: SubscriptionTier,
    pub credential: AccessCredential,
    /// Destination database for analysis results. None = not yet onboarded.
    pub analyses_db_id: Option<String>,
    /// The subscriber's watchlist database (their request source).
    pub watchlist_db_id: Option<String>,
    /// IANA timezone name, e.g. "America/Los_Angeles".
    pub timezone: String,
}

/// The deduplicated unit of work: one ticker and every subscriber that
/// requested it this run.
#[derive(Debug, Clone)]
pub struct TickerRequest {
    pub ticker: String,
    pub subscribers: Vec<Subscriber>,
    /// Minimum tier rank among the subscribers (1 = highest priority).
    pub priority: u8,
    pub requested_at: DateTime<Utc>,
}

impl TickerRequest {
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

/// The computed outcome for one ticker, produced exactly once per run
/// regardless of how many subscribers requested it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub ticker: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub current_price: Option<f64>,

    // Score fields, 1.0-5.0. All five are required for a report to count
    // as complete.
    #[serde(default)]
    pub technical_score: Option<f64>,
    #[serde(default)]
    pub fundamental_score: Option<f64>,
    #[serde(default)]
    pub macro_score: Option<f64>,
    #[serde(default)]
    pub risk_score: Option<f64>,
    #[serde(default)]
    pub sentiment_score: Option<f64>,

    #[serde(default)]
    pub composite_score: Option<f64>,
    #[serde(default)]
    pub recommendation: Option<String>,
    /// LLM-generated prose summary, opaque to the orchestrator.
    #[serde(default)]
    pub summary: Option<String>,
    /// Fraction of source fields the analysis managed to populate.
    #[serde(default)]
    pub data_completeness: Option<f64>,
    /// External provider calls the analysis consumed.
    #[serde(default)]
    pub api_calls_used: Option<u32>,
}

impl AnalysisReport {
    /// Completeness gate: all five score fields must be present.
    pub fn is_complete(&self) -> bool {
        self.missing_scores().is_empty()
    }

    /// Names of absent score fields, for error detail.
    pub fn missing_scores(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.technical_score.is_none() {
            missing.push("technical");
        }
        if self.fundamental_score.is_none() {
            missing.push("fundamental");
        }
        if self.macro_score.is_none() {
            missing.push("macro");
        }
        if self.risk_score.is_none() {
            missing.push("risk");
        }
        if self.sentiment_score.is_none() {
            missing.push("sentiment");
        }
        missing
    }
}

/// Shared macro snapshot, fetched once per run and passed read-only into
/// every analysis. A missing snapshot degrades the analysis, never the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketContext {
    pub as_of: DateTime<Utc>,
    /// e.g. "Risk-On", "Risk-Off", "Neutral"
    pub regime: String,
    /// e.g. "Low", "Elevated", "High"
    pub risk_level: String,
    #[serde(default)]
    pub sp500: Option<f64>,
    #[serde(default)]
    pub nasdaq: Option<f64>,
    #[serde(default)]
    pub dow: Option<f64>,
    #[serde(default)]
    pub vix: Option<f64>,
    #[serde(default)]
    pub fed_funds_rate: Option<f64>,
    #[serde(default)]
    pub unemployment: Option<f64>,
    #[serde(default)]
    pub inflation: Option<f64>,
}

/// Status written to a subscriber's destination record.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryStatus {
    InProgress,
    Complete,
    Error(String),
}

impl DeliveryStatus {
    /// Select-option name on the destination's status property.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::InProgress => "In Progress",
            DeliveryStatus::Complete => "Complete",
            DeliveryStatus::Error(_) => "Error",
        }
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            DeliveryStatus::Error(reason) => Some(reason),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_ranks_are_ordered() {
        assert!(SubscriptionTier::Pro.rank() < SubscriptionTier::Analyst.rank());
        assert!(SubscriptionTier::Analyst.rank() < SubscriptionTier::Starter.rank());
        assert!(SubscriptionTier::Starter.rank() < SubscriptionTier::Free.rank());
    }

    #[test]
    fn unknown_tier_ranks_lowest() {
        assert_eq!(SubscriptionTier::parse("platinum"), SubscriptionTier::Free);
        assert_eq!(SubscriptionTier::parse(""), SubscriptionTier::Free);
        assert_eq!(SubscriptionTier::parse(" PRO "), SubscriptionTier::Pro);
        assert_eq!(SubscriptionTier::parse("Analyst"), SubscriptionTier::Analyst);
    }

    #[test]
    fn credential_debug_is_redacted() {
        let cred = AccessCredential::new("secret_ntn_token");
        let rendered = format!("{:?}", cred);
        assert!(!rendered.contains("secret_ntn_token"));
        assert_eq!(cred.expose(), "secret_ntn_token");
    }

    #[test]
    fn report_completeness_gate() {
        let mut report = AnalysisReport {
            ticker: "AAPL".to_string(),
            timestamp: Utc::now(),
            company_name: None,
            current_price: Some(231.5),
            technical_score: Some(3.4),
            fundamental_score: Some(4.1),
            macro_score: Some(2.9),
            risk_score: Some(3.0),
            sentiment_score: Some(3.2),
            composite_score: Some(3.4),
            recommendation: Some("Moderate Buy".to_string()),
            summary: None,
            data_completeness: Some(0.86),
            api_calls_used: Some(17),
        };
        assert!(report.is_complete());

        report.macro_score = None;
        report.risk_score = None;
        assert!(!report.is_complete());
        assert_eq!(report.missing_scores(), vec!["macro", "risk"]);
    }
}
