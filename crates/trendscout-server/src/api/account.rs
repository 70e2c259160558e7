//! Caller-scoped account handlers: profile, quota, and dashboard.

use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use chrono::Utc;
use serde::Deserialize;
use trendscout_search::{accounts, dashboard, DashboardStats, QuotaView, SearchError, User};

use crate::middleware::{Identity, RequestId};

use super::{current_user, map_search_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct UpdateMeRequest {
    pub email: Option<String>,
    pub display_name: Option<String>,
}

pub(super) async fn get_me(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let user = current_user(&state, &identity, &req_id.0).await?;
    Ok(Json(ApiResponse::new(user, req_id.0)))
}

pub(super) async fn update_me(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(identity): Extension<Identity>,
    body: Result<Json<UpdateMeRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let Json(body) =
        body.map_err(|e| ApiError::new(req_id.0.as_str(), "validation_error", e.body_text()))?;
    let user = current_user(&state, &identity, &req_id.0).await?;

    let updated = accounts::update_profile(
        state.store.as_ref(),
        user.id,
        body.email.as_deref(),
        body.display_name.as_deref(),
    )
    .await
    .map_err(|e| map_search_error(req_id.0.clone(), e))?;

    tracing::info!(user_id = user.id, "profile updated");
    Ok(Json(ApiResponse::new(updated, req_id.0)))
}

pub(super) async fn get_quota(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<ApiResponse<QuotaView>>, ApiError> {
    let user = current_user(&state, &identity, &req_id.0).await?;
    let view = state
        .orchestrator()
        .ledger()
        .quota_view(user.id, Utc::now())
        .await
        .map_err(|e| map_search_error(req_id.0.clone(), SearchError::Store(e)))?;

    Ok(Json(ApiResponse::new(view, req_id.0)))
}

pub(super) async fn get_dashboard(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<ApiResponse<DashboardStats>>, ApiError> {
    let user = current_user(&state, &identity, &req_id.0).await?;
    let stats = dashboard(state.store.as_ref(), user.id)
        .await
        .map_err(|e| map_search_error(req_id.0.clone(), e))?;

    Ok(Json(ApiResponse::new(stats, req_id.0)))
}
