use std::sync::Arc;
use std::time::Duration;

use analysis_client::{AnalysisClientConfig, HttpAnalysisExecutor, HttpMarketContextProvider};
use anyhow::Result;
use batch_engine::BatchEngine;
use market_context::MarketContextCache;
use notion_sync::{NotionApi, NotionDestination, NotionRequestSource};
use tokio::signal::unix::SignalKind;
use tokio::time;

mod config;
mod registry;

use config::SchedulerConfig;
use registry::SqlSubscriberRegistry;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load .env, init tracing
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    tracing::info!("Starting Stock Intelligence scheduler");

    // 2. Load configuration
    let config = SchedulerConfig::from_env()?;
    tracing::info!("Configuration loaded and validated");
    tracing::info!("  Run interval: {}s", config.run_interval_seconds);
    tracing::info!("  Inter-ticker delay: {}s", config.inter_ticker_delay_seconds);
    tracing::info!(
        "  Analysis retry attempts: {} | Broadcast retries: {}",
        config.analysis_retry_attempts,
        config.broadcast_retries
    );
    tracing::info!("  Calls per analysis: {}", config.calls_per_analysis);
    if config.dry_run {
        tracing::warn!("DRY RUN mode: no analyses or deliveries will be made");
    }

    // 3. Connect the subscriber store
    sqlx::any::install_default_drivers();
    let db_pool = sqlx::AnyPool::connect(&config.database_url).await?;

    // 4. Startup connectivity checks
    sqlx::query("SELECT 1")
        .execute(&db_pool)
        .await
        .map_err(|e| anyhow::anyhow!("Database connectivity check failed: {}", e))?;
    tracing::info!("Startup check: database OK");

    // Analysis service check (warn-only, not fatal)
    match reqwest::Client::new()
        .get(format!("{}/health", config.analysis_service_url))
        .timeout(Duration::from_secs(5))
        .send()
        .await
    {
        Ok(resp) if resp.status().is_success() => {
            tracing::info!("Startup check: analysis service OK");
        }
        Ok(resp) => {
            tracing::warn!(
                "Startup check: analysis service returned {} — runs may fail until it recovers",
                resp.status()
            );
        }
        Err(e) => {
            tracing::warn!(
                "Startup check: analysis service unreachable ({}) — runs may fail until it recovers",
                e
            );
        }
    }

    // 5. Wire the collaborators
    let registry = Arc::new(SqlSubscriberRegistry::new(db_pool.clone()));

    let notion_api = Arc::new(NotionApi::new(Duration::from_secs(
        config.notion_timeout_seconds,
    )));
    let source = Arc::new(NotionRequestSource::new(Arc::clone(&notion_api)));
    let destination = Arc::new(NotionDestination::new(Arc::clone(&notion_api)));

    let analysis_config = AnalysisClientConfig {
        base_url: config.analysis_service_url.clone(),
        timeout: Duration::from_secs(config.analysis_timeout_seconds),
    };
    let executor = Arc::new(HttpAnalysisExecutor::new(&analysis_config));
    let context_provider = Arc::new(HttpMarketContextProvider::new(
        &analysis_config,
        config.service_token.clone(),
    ));
    let context_cache = Arc::new(MarketContextCache::new(
        context_provider,
        Duration::from_secs(config.market_context_ttl_seconds),
    ));

    let engine = BatchEngine::new(
        registry,
        source,
        executor,
        destination,
        context_cache,
        config.batch_config(),
    );
    tracing::info!("Orchestration engine initialized");

    // 6. Single-run mode (cron-style invocation)
    if config.run_once {
        let metrics = engine.run().await?;
        println!("{}", metrics.to_json());
        return Ok(());
    }

    // 7. Recurring schedule with graceful shutdown (SIGINT + SIGTERM)
    tracing::info!(
        "Scheduler running every {}s. Press Ctrl+C to stop.",
        config.run_interval_seconds
    );

    let mut interval = time::interval(Duration::from_secs(config.run_interval_seconds));
    let mut sigterm = tokio::signal::unix::signal(SignalKind::terminate())?;
    let shutdown = async {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received SIGINT");
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM");
            }
        }
    };
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match engine.run().await {
                    Ok(metrics) => {
                        tracing::info!(
                            "Run complete: {}/{} tickers analyzed, {} broadcasts ({} failed), {} API calls saved",
                            metrics.tickers_analyzed,
                            metrics.unique_tickers,
                            metrics.broadcasts_attempted,
                            metrics.broadcasts_failed,
                            metrics.api_calls_saved,
                        );
                    }
                    Err(e) => {
                        // Registry outage: skip this run, keep the schedule.
                        tracing::error!("Run aborted: {}", e);
                    }
                }
            }
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received, exiting gracefully...");
                break;
            }
        }
    }

    tracing::info!("Scheduler shut down.");
    Ok(())
}
