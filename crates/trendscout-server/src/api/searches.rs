//! Search submission, history, results, and chart handlers.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use trendscout_core::{SearchRequest, SearchStatus};
use trendscout_search::{chart, ChartData, Content, SearchQuery, SearchResult};
use uuid::Uuid;

use crate::middleware::{Identity, RequestId};

use super::{current_user, map_search_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct HistoryQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct SubmittedSearch {
    id: Uuid,
    status: SearchStatus,
}

/// A query, its user-facing message when it failed, and its ranked contents.
#[derive(Debug, Serialize)]
pub(super) struct SearchResultBody {
    search: SearchQuery,
    message: Option<&'static str>,
    contents: Vec<Content>,
}

impl From<SearchResult> for SearchResultBody {
    fn from(result: SearchResult) -> Self {
        Self {
            message: result.query.public_message(),
            search: result.query,
            contents: result.contents,
        }
    }
}

fn parse_body(
    req_id: &str,
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<SearchRequest, ApiError> {
    body.map(|Json(request)| request)
        .map_err(|e| ApiError::new(req_id, "validation_error", e.body_text()))
}

/// Unparseable ids are reported the same way as unknown ones.
fn parse_search_id(req_id: &str, raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::new(req_id, "not_found", "search not found"))
}

pub(super) async fn submit_search(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(identity): Extension<Identity>,
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<SubmittedSearch>>), ApiError> {
    let request = parse_body(&req_id.0, body)?;
    let user = current_user(&state, &identity, &req_id.0).await?;

    let query = state
        .queue
        .submit(user.id, request)
        .await
        .map_err(|e| map_search_error(req_id.0.clone(), e))?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::new(
            SubmittedSearch {
                id: query.public_id,
                status: query.status,
            },
            req_id.0,
        )),
    ))
}

pub(super) async fn run_search_sync(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(identity): Extension<Identity>,
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<SearchResultBody>>, ApiError> {
    let request = parse_body(&req_id.0, body)?;
    let user = current_user(&state, &identity, &req_id.0).await?;

    let result = state
        .orchestrator()
        .run_sync(user.id, request)
        .await
        .map_err(|e| map_search_error(req_id.0.clone(), e))?;

    Ok(Json(ApiResponse::new(result.into(), req_id.0)))
}

pub(super) async fn list_searches(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<Vec<SearchQuery>>>, ApiError> {
    let user = current_user(&state, &identity, &req_id.0).await?;
    let searches = state
        .orchestrator()
        .list_searches(user.id, query.limit)
        .await
        .map_err(|e| map_search_error(req_id.0.clone(), e))?;

    Ok(Json(ApiResponse::new(searches, req_id.0)))
}

pub(super) async fn get_search(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<SearchResultBody>>, ApiError> {
    let public_id = parse_search_id(&req_id.0, &id)?;
    let user = current_user(&state, &identity, &req_id.0).await?;

    let result = state
        .orchestrator()
        .load_result(user.id, public_id)
        .await
        .map_err(|e| map_search_error(req_id.0.clone(), e))?;

    Ok(Json(ApiResponse::new(result.into(), req_id.0)))
}

pub(super) async fn get_search_chart(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ChartData>>, ApiError> {
    let public_id = parse_search_id(&req_id.0, &id)?;
    let user = current_user(&state, &identity, &req_id.0).await?;

    let data = chart(state.store.as_ref(), user.id, public_id)
        .await
        .map_err(|e| map_search_error(req_id.0.clone(), e))?;

    Ok(Json(ApiResponse::new(data, req_id.0)))
}
