use std::env;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use batch_engine::engine::BatchConfig;
use batch_engine::retry::RetryPolicy;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    // Scheduling
    pub run_interval_seconds: u64, // 86400 (daily)
    pub run_once: bool,            // single run then exit (cron-style)
    pub dry_run: bool,             // dedup/priority validation without provider calls

    // Rate limiting and retry
    pub inter_ticker_delay_seconds: u64, // 5
    pub analysis_retry_attempts: u32,    // 3 total
    pub broadcast_retries: u32,          // 2 after the initial attempt
    pub broadcast_retry_delay_seconds: u64, // 5
    pub calls_per_analysis: u32,         // 17

    // Collaborators
    pub database_url: String,
    pub analysis_service_url: String,
    pub analysis_timeout_seconds: u64, // 120
    pub service_token: String,
    pub market_context_ttl_seconds: u64, // 3600
    pub notion_timeout_seconds: u64,     // 40
}

impl SchedulerConfig {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            run_interval_seconds: env::var("RUN_INTERVAL_SECONDS")
                .unwrap_or_else(|_| "86400".to_string())
                .parse()?,
            run_once: env::var("RUN_ONCE")
                .unwrap_or_else(|_| "false".to_string())
                .parse()?,
            dry_run: env::var("DRY_RUN")
                .unwrap_or_else(|_| "false".to_string())
                .parse()?,

            inter_ticker_delay_seconds: env::var("INTER_TICKER_DELAY_SECONDS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
            analysis_retry_attempts: env::var("ANALYSIS_RETRY_ATTEMPTS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()?,
            broadcast_retries: env::var("BROADCAST_RETRIES")
                .unwrap_or_else(|_| "2".to_string())
                .parse()?,
            broadcast_retry_delay_seconds: env::var("BROADCAST_RETRY_DELAY_SECONDS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
            calls_per_analysis: env::var("CALLS_PER_ANALYSIS")
                .unwrap_or_else(|_| "17".to_string())
                .parse()?,

            database_url: env::var("DATABASE_URL").context("DATABASE_URL not set")?,
            analysis_service_url: env::var("ANALYSIS_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8010".to_string()),
            analysis_timeout_seconds: env::var("ANALYSIS_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "120".to_string())
                .parse()?,
            service_token: env::var("SERVICE_TOKEN").unwrap_or_default(),
            market_context_ttl_seconds: env::var("MARKET_CONTEXT_TTL_SECONDS")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()?,
            notion_timeout_seconds: env::var("NOTION_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "40".to_string())
                .parse()?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.analysis_retry_attempts == 0 {
            bail!("ANALYSIS_RETRY_ATTEMPTS must be at least 1");
        }
        if self.calls_per_analysis == 0 {
            bail!("CALLS_PER_ANALYSIS must be at least 1");
        }
        if !self.run_once && self.run_interval_seconds < 60 {
            bail!("RUN_INTERVAL_SECONDS below 60 would hammer providers");
        }
        Ok(())
    }

    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            inter_ticker_delay: Duration::from_secs(self.inter_ticker_delay_seconds),
            retry_policy: RetryPolicy {
                max_attempts: self.analysis_retry_attempts,
                ..RetryPolicy::default()
            },
            broadcast_retries: self.broadcast_retries,
            broadcast_retry_delay: Duration::from_secs(self.broadcast_retry_delay_seconds),
            calls_per_analysis: self.calls_per_analysis,
            dry_run: self.dry_run,
        }
    }
}
