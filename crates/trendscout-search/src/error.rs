use thiserror::Error;
use trendscout_core::CoreError;
use trendscout_db::DbError;
use uuid::Uuid;

/// Failures of a [`crate::SearchStore`] backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    /// A lifecycle update found the query outside the status it requires.
    #[error("search query {id} is not {expected}")]
    InvalidTransition { id: i64, expected: &'static str },

    /// A stored value does not map back onto the domain (unknown enum text).
    #[error("corrupt stored value: {0}")]
    Corrupt(String),

    /// The backend refused the write (constraint, encoding, and so on).
    #[error("rejected write: {0}")]
    Rejected(String),

    #[error(transparent)]
    Database(DbError),
}

impl From<DbError> for StoreError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound => StoreError::NotFound,
            DbError::InvalidSearchTransition {
                id,
                expected_status,
            } => StoreError::InvalidTransition {
                id,
                expected: expected_status,
            },
            other => StoreError::Database(other),
        }
    }
}

impl From<CoreError> for StoreError {
    fn from(e: CoreError) -> Self {
        StoreError::Corrupt(e.to_string())
    }
}

/// Caller-facing outcome of a search operation.
///
/// Content source failures are not represented here: they end the query in
/// `FAILED` and the caller reads that state.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("{0}")]
    Validation(String),

    #[error("monthly search quota exhausted ({used}/{quota})")]
    QuotaExceeded { used: i32, quota: i32 },

    /// Missing, or owned by someone else. The two are never distinguished.
    #[error("search not found")]
    NotFound,

    /// The background queue is full; nothing was created.
    #[error("search queue is full, try again shortly")]
    Busy,

    #[error("storage failure: {0}")]
    Store(#[from] StoreError),

    /// The query row exists but could not be driven to a terminal status.
    /// `search_id` is the public id the caller can poll.
    #[error("search {search_id} could not be finished: {source}")]
    Incomplete {
        search_id: Uuid,
        #[source]
        source: StoreError,
    },
}

impl From<CoreError> for SearchError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Validation(msg) => SearchError::Validation(msg),
            other => SearchError::Validation(other.to_string()),
        }
    }
}
