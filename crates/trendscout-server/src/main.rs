mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;
use trendscout_scraper::{ApifyClient, ContentSource, UnconfiguredSource};
use trendscout_search::{PgSearchStore, SearchOrchestrator, SearchQueue, SearchStore};

use crate::{
    api::{build_app, default_rate_limit_state, AppState},
    middleware::AuthState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(trendscout_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = trendscout_db::PoolConfig::from_app_config(&config);
    let pool = trendscout_db::connect_pool(&config.database_url, pool_config).await?;
    trendscout_db::run_migrations(&pool).await?;

    let store: Arc<dyn SearchStore> = Arc::new(PgSearchStore::new(pool));
    let source = build_source(&config)?;
    let orchestrator = SearchOrchestrator::new(
        Arc::clone(&store),
        source,
        Duration::from_secs(config.source_timeout_secs),
    );
    let (queue, worker) = SearchQueue::new(orchestrator, config.worker_queue_depth);
    let worker_handle = tokio::spawn(worker.run(config.worker_concurrency));

    let _scheduler = scheduler::build_scheduler(Arc::clone(&store), Arc::clone(&config)).await?;

    let auth = AuthState::from_env(matches!(
        config.env,
        trendscout_core::Environment::Development
    ))?;
    let app = build_app(AppState { store, queue }, auth, default_rate_limit_state());

    tracing::info!(bind_addr = %config.bind_addr, env = %config.env, "trendscout server listening");
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router owned the last queue handle; the worker now drains and exits.
    let grace = Duration::from_secs(config.source_timeout_secs);
    if tokio::time::timeout(grace, worker_handle).await.is_err() {
        tracing::warn!("search worker did not drain before shutdown deadline");
    }
    Ok(())
}

fn build_source(config: &trendscout_core::AppConfig) -> anyhow::Result<Arc<dyn ContentSource>> {
    match config.apify_token.as_deref() {
        Some(token) => {
            let client = ApifyClient::with_base_url(
                token,
                &config.apify_base_url,
                config.source_max_retries,
                config.source_retry_backoff_base_ms,
            )?;
            Ok(Arc::new(client))
        }
        None => {
            tracing::warn!("APIFY_TOKEN not set; every search will fail until it is configured");
            Ok(Arc::new(UnconfiguredSource::new("APIFY_TOKEN is not set")))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
