//! Background job scheduler.
//!
//! Initialises a [`JobScheduler`] at server startup and registers the
//! recurring maintenance jobs.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use trendscout_search::SearchStore;

/// Every ten minutes, on the minute.
pub const DEFAULT_STALE_SWEEP_CRON: &str = "0 */10 * * * *";

/// Recorded on queries the sweep gives up on.
pub const STALE_SEARCH_MESSAGE: &str = "search abandoned before completion";

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive for
/// the lifetime of the process. Dropping it shuts down all scheduled jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(
    store: Arc<dyn SearchStore>,
    config: Arc<trendscout_core::AppConfig>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    let cron = std::env::var("TRENDSCOUT_STALE_SWEEP_CRON")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_STALE_SWEEP_CRON.to_string());
    register_stale_sweep_job(&scheduler, store, config.stale_search_minutes, &cron).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

/// Register the job that fails queries stuck in `PENDING`/`PROCESSING`,
/// typically left behind by a restart mid-search. No quota is charged.
async fn register_stale_sweep_job(
    scheduler: &JobScheduler,
    store: Arc<dyn SearchStore>,
    stale_after_minutes: i64,
    cron: &str,
) -> Result<(), JobSchedulerError> {
    tracing::info!(cron, stale_after_minutes, "scheduler: registering stale search sweep");

    let job = Job::new_async(cron, move |_uuid, _lock| {
        let store = Arc::clone(&store);
        Box::pin(async move {
            run_stale_sweep(store.as_ref(), stale_after_minutes).await;
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

async fn run_stale_sweep(store: &dyn SearchStore, stale_after_minutes: i64) -> u64 {
    let cutoff = Utc::now() - Duration::minutes(stale_after_minutes);
    match store.fail_stale_searches(cutoff, STALE_SEARCH_MESSAGE).await {
        Ok(0) => {
            tracing::debug!("scheduler: no stale searches");
            0
        }
        Ok(count) => {
            tracing::warn!(count, %cutoff, "scheduler: failed stale searches");
            count
        }
        Err(e) => {
            tracing::error!(error = %e, "scheduler: stale search sweep failed");
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trendscout_core::{PlanTier, Platform, SearchStatus};
    use trendscout_search::{MemoryStore, NewSearch};

    #[tokio::test]
    async fn sweep_fails_only_old_open_searches() {
        let store = MemoryStore::new();
        let user = store
            .find_or_create_user("idp|s", "s@example.com", None, PlanTier::Free)
            .await
            .expect("user");
        let new_search = || NewSearch {
            user_id: user.id,
            keyword: "k".to_string(),
            platform: Platform::Tiktok,
            target_url: "https://www.tiktok.com/@k".to_string(),
            max_results: 10,
        };
        let old = store.create_search(new_search()).await.expect("old");
        let fresh = store.create_search(new_search()).await.expect("fresh");
        store
            .set_created_at(old.id, Utc::now() - Duration::hours(3))
            .await
            .expect("backdate");

        assert_eq!(run_stale_sweep(&store, 30).await, 1);

        let old = store.get_search(old.id).await.expect("get").expect("old row");
        assert_eq!(old.status, SearchStatus::Failed);
        assert_eq!(old.error_message.as_deref(), Some(STALE_SEARCH_MESSAGE));
        let fresh = store.get_search(fresh.id).await.expect("get").expect("fresh row");
        assert_eq!(fresh.status, SearchStatus::Pending);

        let user = store.get_user(user.id).await.expect("get").expect("user");
        assert_eq!(user.searches_used, 0);
    }
}
