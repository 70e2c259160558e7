//! Background execution of fire-and-forget searches.
//!
//! [`SearchQueue::submit`] reserves a slot on a bounded channel before the
//! query row is written, so a full queue turns into [`SearchError::Busy`]
//! with no state left behind. [`SearchWorker::run`] drains the channel,
//! running at most `concurrency` searches at once. Job failures are logged;
//! the HTTP response for the submission is long gone by then.

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use trendscout_core::SearchRequest;

use crate::error::SearchError;
use crate::model::SearchQuery;
use crate::orchestrator::SearchOrchestrator;

#[derive(Debug)]
struct SearchJob {
    query: SearchQuery,
}

#[derive(Clone)]
pub struct SearchQueue {
    tx: mpsc::Sender<SearchJob>,
    orchestrator: SearchOrchestrator,
}

pub struct SearchWorker {
    rx: mpsc::Receiver<SearchJob>,
    orchestrator: SearchOrchestrator,
}

impl SearchQueue {
    /// Creates a queue holding at most `depth` waiting searches, and the
    /// worker that drains it.
    #[must_use]
    pub fn new(orchestrator: SearchOrchestrator, depth: usize) -> (Self, SearchWorker) {
        let (tx, rx) = mpsc::channel(depth.max(1));
        (
            Self {
                tx,
                orchestrator: orchestrator.clone(),
            },
            SearchWorker { rx, orchestrator },
        )
    }

    #[must_use]
    pub fn orchestrator(&self) -> &SearchOrchestrator {
        &self.orchestrator
    }

    /// Records a `PENDING` query and queues it for background execution.
    ///
    /// # Errors
    ///
    /// - [`SearchError::Busy`] when the queue is full or the worker is gone.
    /// - Anything [`SearchOrchestrator::submit`] returns.
    pub async fn submit(
        &self,
        user_id: i64,
        request: SearchRequest,
    ) -> Result<SearchQuery, SearchError> {
        let permit = self.tx.try_reserve().map_err(|e| {
            match e {
                TrySendError::Full(()) => tracing::warn!(user_id, "search queue full"),
                TrySendError::Closed(()) => tracing::error!("search worker has stopped"),
            }
            SearchError::Busy
        })?;

        let query = self.orchestrator.submit(user_id, request).await?;
        permit.send(SearchJob {
            query: query.clone(),
        });
        Ok(query)
    }
}

impl SearchWorker {
    /// Runs until every [`SearchQueue`] handle is dropped and in-flight jobs
    /// have finished.
    pub async fn run(mut self, concurrency: usize) {
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut tasks: JoinSet<()> = JoinSet::new();

        loop {
            tokio::select! {
                job = self.rx.recv() => {
                    let Some(job) = job else { break };
                    let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                        break;
                    };
                    let orchestrator = self.orchestrator.clone();
                    tasks.spawn(async move {
                        let _permit = permit;
                        run_job(&orchestrator, job).await;
                    });
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    log_join(joined);
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            log_join(joined);
        }
        tracing::info!("search worker stopped");
    }
}

async fn run_job(orchestrator: &SearchOrchestrator, job: SearchJob) {
    let search_id = job.query.public_id;
    match orchestrator.execute(&job.query).await {
        Ok(result) => {
            tracing::debug!(%search_id, status = %result.query.status, "background search finished");
        }
        Err(e) => {
            tracing::error!(%search_id, error = %e, "background search failed");
        }
    }
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        tracing::error!(error = %e, "background search task panicked or was cancelled");
    }
}
