mod account;
mod searches;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use trendscout_search::{accounts, SearchError, SearchOrchestrator, SearchQueue, SearchStore, User};
use uuid::Uuid;

use crate::middleware::{
    enforce_rate_limit, request_id, require_bearer_auth, require_identity, AuthState, Identity,
    RateLimitState, RequestId, IDENTITY_EMAIL_HEADER, IDENTITY_NAME_HEADER,
    IDENTITY_SUBJECT_HEADER,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SearchStore>,
    pub queue: SearchQueue,
}

impl AppState {
    fn orchestrator(&self) -> &SearchOrchestrator {
        self.queue.orchestrator()
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    /// Set when the search row exists despite the error, so it can be polled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_id: Option<Uuid>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub(super) fn new(data: T, request_id: String) -> Self {
        Self {
            data,
            meta: ResponseMeta::new(request_id),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
                search_id: None,
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }

    #[must_use]
    pub fn with_search_id(mut self, search_id: Uuid) -> Self {
        self.error.search_id = Some(search_id);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            "rate_limited" | "quota_exceeded" => StatusCode::TOO_MANY_REQUESTS,
            "busy" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn map_search_error(request_id: String, error: SearchError) -> ApiError {
    match error {
        SearchError::Validation(message) => ApiError::new(request_id, "validation_error", message),
        e @ SearchError::QuotaExceeded { .. } => {
            ApiError::new(request_id, "quota_exceeded", e.to_string())
        }
        SearchError::NotFound => ApiError::new(request_id, "not_found", "search not found"),
        e @ SearchError::Busy => ApiError::new(request_id, "busy", e.to_string()),
        SearchError::Store(e) => {
            tracing::error!(error = %e, "storage operation failed");
            ApiError::new(request_id, "internal_error", "storage operation failed")
        }
        SearchError::Incomplete { search_id, source } => {
            tracing::error!(%search_id, error = %source, "search left unfinished");
            ApiError::new(
                request_id,
                "internal_error",
                "the search could not be finished; poll it later for its final status",
            )
            .with_search_id(search_id)
        }
    }
}

/// Provisions the caller on first contact and returns their account.
pub(super) async fn current_user(
    state: &AppState,
    identity: &Identity,
    request_id: &str,
) -> Result<User, ApiError> {
    accounts::provision_user(
        state.store.as_ref(),
        &identity.subject,
        identity.email.as_deref(),
        identity.display_name.as_deref(),
    )
    .await
    .map_err(|e| map_search_error(request_id.to_string(), e))
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
            HeaderName::from_static(IDENTITY_SUBJECT_HEADER),
            HeaderName::from_static(IDENTITY_EMAIL_HEADER),
            HeaderName::from_static(IDENTITY_NAME_HEADER),
        ])
}

fn protected_router(auth: AuthState, rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/searches",
            get(searches::list_searches).post(searches::submit_search),
        )
        .route("/api/v1/searches/sync", post(searches::run_search_sync))
        .route("/api/v1/searches/{id}", get(searches::get_search))
        .route("/api/v1/searches/{id}/chart", get(searches::get_search_chart))
        .route("/api/v1/quota", get(account::get_quota))
        .route("/api/v1/dashboard", get(account::get_dashboard))
        .route(
            "/api/v1/me",
            get(account::get_me).patch(account::update_me),
        )
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    rate_limit,
                    enforce_rate_limit,
                ))
                .layer(axum::middleware::from_fn_with_state(
                    auth,
                    require_bearer_auth,
                ))
                .layer(axum::middleware::from_fn(require_identity)),
        )
}

pub fn build_app(state: AppState, auth: AuthState, rate_limit: RateLimitState) -> Router {
    let public_routes = Router::new().route("/api/v1/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(protected_router(auth, rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

pub fn default_rate_limit_state() -> RateLimitState {
    RateLimitState::new(120, Duration::from_secs(60))
}
