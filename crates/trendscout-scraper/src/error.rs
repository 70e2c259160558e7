use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// The actor API answered with a non-2xx status.
    #[error("content source API returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// The actor run reached a terminal status other than `SUCCEEDED`.
    #[error("content source run {run_id} finished with status {status}")]
    RunFailed { run_id: String, status: String },

    #[error("invalid base URL \"{base_url}\": {reason}")]
    InvalidBaseUrl { base_url: String, reason: String },

    #[error("content source is not configured: {0}")]
    NotConfigured(String),
}
