use async_trait::async_trait;

use crate::{
    AccessCredential, AnalysisReport, DeliveryStatus, IntelError, MarketContext, Subscriber,
};

/// Source of the active subscriber set. The only collaborator whose failure
/// is run-fatal.
#[async_trait]
pub trait SubscriberRegistry: Send + Sync {
    async fn list_active_subscribers(&self) -> Result<Vec<Subscriber>, IntelError>;
}

/// Per-subscriber request source: which tickers has this subscriber flagged
/// for recurring analysis. May fail independently per subscriber.
#[async_trait]
pub trait RequestSource: Send + Sync {
    async fn list_recurring_tickers(
        &self,
        subscriber: &Subscriber,
    ) -> Result<Vec<String>, IntelError>;
}

/// The per-ticker analysis computation, invoked exactly once per unique
/// ticker per run. Implementations bound stuck provider calls with their
/// own timeouts.
#[async_trait]
pub trait AnalysisExecutor: Send + Sync {
    async fn analyze(
        &self,
        ticker: &str,
        credential: &AccessCredential,
        context: Option<&MarketContext>,
    ) -> Result<AnalysisReport, IntelError>;
}

/// Writes results and status updates to one subscriber's destination.
#[async_trait]
pub trait DestinationWriter: Send + Sync {
    async fn write_result(
        &self,
        subscriber: &Subscriber,
        report: &AnalysisReport,
    ) -> Result<(), IntelError>;

    /// Best-effort: destinations without a status property return
    /// `StatusUnsupported`, which callers treat as a no-op.
    async fn mark_status(
        &self,
        subscriber: &Subscriber,
        ticker: &str,
        status: &DeliveryStatus,
    ) -> Result<(), IntelError>;
}

/// Produces the shared macro snapshot. Consumed through a TTL cache that
/// degrades to `None` on failure.
#[async_trait]
pub trait MarketContextProvider: Send + Sync {
    async fn fetch(&self) -> Result<MarketContext, IntelError>;
}
