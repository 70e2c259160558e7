//! HTTP client for the Apify actor REST API.
//!
//! One search is one actor run: [`ApifyClient::start_run`] posts the actor
//! input, [`ApifyClient::wait_for_run`] long-polls until the run reaches a
//! terminal status, and [`ApifyClient::get_dataset_items`] downloads the
//! run's default dataset as raw JSON values. A run whose caller gives up
//! before it finishes is aborted through [`RunAbortGuard`].

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ScraperError;
use crate::retry::{is_connect_failure, is_retriable, retry_with_backoff};
use crate::types::{ApiResponse, RunData};

pub const DEFAULT_BASE_URL: &str = "https://api.apify.com/v2";

/// Seconds the API holds a run-status request open waiting for the run to finish.
const WAIT_FOR_FINISH_SECS: u64 = 60;

/// Per-request timeout. Must exceed [`WAIT_FOR_FINISH_SECS`].
const REQUEST_TIMEOUT_SECS: u64 = 90;

/// Client for the Apify actor API.
///
/// Use [`ApifyClient::new`] for production or [`ApifyClient::with_base_url`]
/// to point at a mock server in tests.
#[derive(Clone)]
pub struct ApifyClient {
    client: Client,
    base_url: Url,
    token: String,
    /// Additional attempts per HTTP call on transient errors.
    max_retries: u32,
    backoff_base_ms: u64,
    /// Pause between two status polls of a run that is still in progress.
    poll_interval: Duration,
}

impl ApifyClient {
    /// Creates a client pointed at the production Apify API.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(token: &str, max_retries: u32, backoff_base_ms: u64) -> Result<Self, ScraperError> {
        Self::with_base_url(token, DEFAULT_BASE_URL, max_retries, backoff_base_ms)
    }

    /// Creates a client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`ScraperError::InvalidBaseUrl`] if
    /// `base_url` does not parse.
    pub fn with_base_url(
        token: &str,
        base_url: &str,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("trendscout/0.1 (content-discovery)")
            .build()?;

        // Exactly one trailing slash, so Url::join appends instead of
        // replacing the last path segment.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let parsed = Url::parse(&normalised).map_err(|e| ScraperError::InvalidBaseUrl {
            base_url: base_url.to_owned(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            base_url: parsed,
            token: token.to_owned(),
            max_retries,
            backoff_base_ms,
            poll_interval: Duration::from_secs(1),
        })
    }

    /// Overrides the pause between status polls.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Starts a run of `actor_id` with `input` and returns immediately.
    ///
    /// Only connection failures are retried: any later failure may come from
    /// a request the API already accepted.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::Api`] on a non-2xx response.
    /// - [`ScraperError::Http`] on network failure.
    /// - [`ScraperError::Deserialize`] if the run metadata does not parse.
    pub async fn start_run<I>(&self, actor_id: &str, input: &I) -> Result<RunData, ScraperError>
    where
        I: Serialize + Sync,
    {
        let url = self.endpoint(&format!("acts/{actor_id}/runs"))?;
        let envelope: ApiResponse<RunData> = self
            .send_json(&format!("start run of {actor_id}"), is_connect_failure, || {
                self.client.post(url.clone()).json(input)
            })
            .await?;

        tracing::info!(actor_id, run_id = %envelope.data.id, "content source run started");
        Ok(envelope.data)
    }

    /// Polls a run until it reaches a terminal status.
    ///
    /// Each poll asks the API to hold the request for up to 60 s while the
    /// run is in progress. There is no overall deadline here; callers bound
    /// the wait.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::RunFailed`] when the run ends `FAILED`,
    /// `ABORTED` or `TIMED-OUT`, plus any error of a single poll.
    pub async fn wait_for_run(&self, run_id: &str) -> Result<RunData, ScraperError> {
        let mut url = self.endpoint(&format!("actor-runs/{run_id}"))?;
        url.query_pairs_mut()
            .append_pair("waitForFinish", &WAIT_FOR_FINISH_SECS.to_string());

        loop {
            let envelope: ApiResponse<RunData> = self
                .send_json(&format!("status of run {run_id}"), is_retriable, || {
                    self.client.get(url.clone())
                })
                .await?;
            let run = envelope.data;

            if run.is_succeeded() {
                return Ok(run);
            }
            if run.is_failed() {
                tracing::warn!(
                    run_id,
                    status = %run.status,
                    status_message = run.status_message.as_deref().unwrap_or(""),
                    "content source run did not succeed"
                );
                return Err(ScraperError::RunFailed {
                    run_id: run.id,
                    status: run.status,
                });
            }

            tracing::debug!(run_id, status = %run.status, "run still in progress");
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Downloads every item of a dataset as raw JSON values.
    ///
    /// Items are not decoded here, so one malformed item cannot fail the
    /// whole download.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Deserialize`] if the body is not a JSON array,
    /// plus the usual HTTP errors.
    pub async fn get_dataset_items(
        &self,
        dataset_id: &str,
    ) -> Result<Vec<serde_json::Value>, ScraperError> {
        let mut url = self.endpoint(&format!("datasets/{dataset_id}/items"))?;
        url.query_pairs_mut().append_pair("format", "json");

        self.send_json(&format!("items of dataset {dataset_id}"), is_retriable, || {
            self.client.get(url.clone())
        })
        .await
    }

    /// Asks the API to stop a run that is still in progress.
    ///
    /// # Errors
    ///
    /// Returns the usual HTTP errors; aborting a run that already finished is
    /// reported by the API as a non-2xx response.
    pub async fn abort_run(&self, run_id: &str) -> Result<RunData, ScraperError> {
        let url = self.endpoint(&format!("actor-runs/{run_id}/abort"))?;
        let envelope: ApiResponse<RunData> = self
            .send_json(&format!("abort of run {run_id}"), is_retriable, || {
                self.client.post(url.clone())
            })
            .await?;
        Ok(envelope.data)
    }

    /// Returns a guard that aborts `run_id` if dropped before
    /// [`RunAbortGuard::disarm`] is called.
    #[must_use]
    pub fn abort_on_drop(&self, run_id: &str) -> RunAbortGuard {
        RunAbortGuard {
            client: Some(self.clone()),
            run_id: run_id.to_owned(),
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, ScraperError> {
        self.base_url
            .join(path)
            .map_err(|e| ScraperError::InvalidBaseUrl {
                base_url: self.base_url.to_string(),
                reason: e.to_string(),
            })
    }

    /// Sends the request built by `build` with bearer auth, retrying the
    /// failures `should_retry` accepts, and parses a 2xx body as `T`.
    async fn send_json<T, B>(
        &self,
        context: &str,
        should_retry: fn(&ScraperError) -> bool,
        build: B,
    ) -> Result<T, ScraperError>
    where
        T: DeserializeOwned,
        B: Fn() -> RequestBuilder,
    {
        retry_with_backoff(self.max_retries, self.backoff_base_ms, should_retry, || {
            let request = build().bearer_auth(&self.token);
            async move {
                let response = request.send().await?;
                let status = response.status();
                if !status.is_success() {
                    let message = response.text().await.unwrap_or_default();
                    return Err(ScraperError::Api {
                        status: status.as_u16(),
                        message,
                    });
                }

                let body = response.text().await?;
                serde_json::from_str::<T>(&body).map_err(|e| ScraperError::Deserialize {
                    context: context.to_owned(),
                    source: e,
                })
            }
        })
        .await
    }
}

/// Aborts an actor run when dropped while still armed.
///
/// A fetch future cancelled by its caller's timeout never reaches the code
/// after its `await`, so the abort has to happen in `Drop`. It is sent from a
/// spawned task on the current runtime.
pub struct RunAbortGuard {
    client: Option<ApifyClient>,
    run_id: String,
}

impl RunAbortGuard {
    /// The run reached a terminal status; nothing to abort.
    pub fn disarm(mut self) {
        self.client = None;
    }
}

impl Drop for RunAbortGuard {
    fn drop(&mut self) {
        let Some(client) = self.client.take() else {
            return;
        };
        let run_id = std::mem::take(&mut self.run_id);
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(run_id = %run_id, "no runtime left to abort content source run");
            return;
        };
        runtime.spawn(async move {
            match client.abort_run(&run_id).await {
                Ok(run) => {
                    tracing::info!(
                        run_id = %run_id,
                        status = %run.status,
                        "abandoned content source run aborted"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        run_id = %run_id,
                        error = %e,
                        "could not abort abandoned content source run"
                    );
                }
            }
        });
    }
}
