use async_trait::async_trait;
use intel_core::{
    AccessCredential, IntelError, Subscriber, SubscriberRegistry, SubscriptionTier,
};
use sqlx::AnyPool;

/// Subscriber registry over the opaque subscriber store. Tokens come back
/// from the store's decryption layer and are wrapped in the redacting
/// credential type immediately; nothing here persists them.
pub struct SqlSubscriberRegistry {
    pool: AnyPool,
}

impl SqlSubscriberRegistry {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SubscriberRow {
    id: i64,
    email: String,
    tier: String,
    access_token: String,
    analyses_db_id: Option<String>,
    watchlist_db_id: Option<String>,
    timezone: Option<String>,
}

impl From<SubscriberRow> for Subscriber {
    fn from(row: SubscriberRow) -> Self {
        Subscriber {
            id: row.id,
            email: row.email,
            tier: SubscriptionTier::parse(&row.tier),
            credential: AccessCredential::new(row.access_token),
            analyses_db_id: row.analyses_db_id,
            watchlist_db_id: row.watchlist_db_id,
            timezone: row.timezone.unwrap_or_else(|| "UTC".to_string()),
        }
    }
}

#[async_trait]
impl SubscriberRegistry for SqlSubscriberRegistry {
    async fn list_active_subscribers(&self) -> Result<Vec<Subscriber>, IntelError> {
        let rows: Vec<SubscriberRow> = sqlx::query_as(
            "SELECT id, email, tier, access_token, analyses_db_id, watchlist_db_id, timezone
             FROM subscribers WHERE active = 1 ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IntelError::Registry(e.to_string()))?;

        Ok(rows.into_iter().map(Subscriber::from).collect())
    }
}
