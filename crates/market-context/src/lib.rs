use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use intel_core::{MarketContext, MarketContextProvider};
use tokio::sync::RwLock;

/// Internal cache entry with timestamp
struct CacheEntry {
    data: MarketContext,
    cached_at: DateTime<Utc>,
}

/// Explicit TTL cache over the market-context collaborator. The snapshot
/// is fetched at most once per TTL window and shared read-only across a
/// run; a provider failure degrades to the stale snapshot if one exists,
/// else to `None`. Never fails the run.
pub struct MarketContextCache {
    provider: Arc<dyn MarketContextProvider>,
    ttl: Duration,
    entry: RwLock<Option<CacheEntry>>,
}

impl MarketContextCache {
    pub fn new(provider: Arc<dyn MarketContextProvider>, ttl: Duration) -> Self {
        Self {
            provider,
            ttl,
            entry: RwLock::new(None),
        }
    }

    pub async fn get(&self) -> Option<MarketContext> {
        {
            let entry = self.entry.read().await;
            if let Some(entry) = entry.as_ref() {
                let age = (Utc::now() - entry.cached_at).num_seconds();
                if age >= 0 && (age as u64) < self.ttl.as_secs() {
                    return Some(entry.data.clone());
                }
            }
        }

        match self.provider.fetch().await {
            Ok(data) => {
                let mut entry = self.entry.write().await;
                *entry = Some(CacheEntry {
                    data: data.clone(),
                    cached_at: Utc::now(),
                });
                Some(data)
            }
            Err(e) => {
                tracing::warn!("Market context fetch failed: {}", e);
                let entry = self.entry.read().await;
                entry.as_ref().map(|stale| {
                    tracing::warn!(
                        cached_at = %stale.cached_at,
                        "Falling back to stale market context"
                    );
                    stale.data.clone()
                })
            }
        }
    }
}
