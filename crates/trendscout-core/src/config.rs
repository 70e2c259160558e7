use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function,
/// so parsing can be tested against a plain `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_positive_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        match raw.parse::<usize>() {
            Ok(0) => Err(ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: "must be greater than zero".to_string(),
            }),
            Ok(v) => Ok(v),
            Err(e) => Err(ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            }),
        }
    };

    let database_url = require("DATABASE_URL")?;

    let env = parse_environment(&or_default("TRENDSCOUT_ENV", "development"));
    let bind_addr = parse_addr("TRENDSCOUT_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("TRENDSCOUT_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("TRENDSCOUT_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("TRENDSCOUT_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("TRENDSCOUT_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let apify_token = lookup("APIFY_TOKEN").ok().filter(|t| !t.trim().is_empty());
    let apify_base_url = or_default("APIFY_BASE_URL", "https://api.apify.com/v2");

    let source_timeout_secs = parse_u64("TRENDSCOUT_SOURCE_TIMEOUT_SECS", "300")?;
    let source_max_retries = parse_u32("TRENDSCOUT_SOURCE_MAX_RETRIES", "3")?;
    let source_retry_backoff_base_ms =
        parse_u64("TRENDSCOUT_SOURCE_RETRY_BACKOFF_BASE_MS", "1000")?;

    let worker_concurrency = parse_positive_usize("TRENDSCOUT_WORKER_CONCURRENCY", "4")?;
    let worker_queue_depth = parse_positive_usize("TRENDSCOUT_WORKER_QUEUE_DEPTH", "256")?;
    let stale_search_minutes = i64::from(parse_u32("TRENDSCOUT_STALE_SEARCH_MINUTES", "30")?);
    // The sweep must never catch a search whose fetch may still be running.
    if stale_search_minutes.unsigned_abs().saturating_mul(60) <= source_timeout_secs {
        return Err(ConfigError::InvalidEnvVar {
            var: "TRENDSCOUT_STALE_SEARCH_MINUTES".to_string(),
            reason: format!(
                "must be longer than TRENDSCOUT_SOURCE_TIMEOUT_SECS ({source_timeout_secs}s)"
            ),
        });
    }

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        apify_token,
        apify_base_url,
        source_timeout_secs,
        source_max_retries,
        source_retry_backoff_base_ms,
        worker_concurrency,
        worker_queue_depth,
        stale_search_minutes,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}
