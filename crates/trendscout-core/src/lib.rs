pub mod app_config;
pub mod config;
pub mod content;
pub mod search;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use content::{engagement_score, ContentDraft};
pub use search::{
    PlanTier, Platform, SearchRequest, SearchStatus, ValidatedSearch, DEFAULT_MAX_RESULTS,
    MAX_KEYWORD_CHARS, MAX_RESULTS_LIMIT,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid platform: {0}")]
    InvalidPlatform(String),
    #[error("invalid search status: {0}")]
    InvalidStatus(String),
    #[error("invalid plan tier: {0}")]
    InvalidPlanTier(String),
    #[error("{0}")]
    Validation(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
