use axum::{
    extract::{Query, State},
    response::Json,
    Extension,
};
use serde::Deserialize;

use crate::database::models::{Assignment, AssignmentWithPatrol};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::types::{PageParams, Paginated};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub patrol_id: Option<i32>,
}

/// POST /api/assignments/start - open a new interval, closing any prior one.
/// This is the only way an assignment transitions.
pub async fn start(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<StartRequest>,
) -> ApiResult<Assignment> {
    let patrol_id = req
        .patrol_id
        .ok_or_else(|| ApiError::bad_request("patrol_id is required"))?;

    // The token may outlive the account; re-check before writing the ledger
    let user = state.users.get_by_id(auth.user_id).await?;
    match user {
        Some(u) if u.is_active => {}
        _ => return Err(ApiError::unauthorized("User is inactive or does not exist")),
    }

    let assignment = state.assignments.start(auth.user_id, patrol_id).await?;
    Ok(ApiResponse::created(assignment))
}

/// POST /api/assignments/end - close the open interval
pub async fn end(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Assignment> {
    let assignment = state.assignments.end(auth.user_id).await?;
    Ok(ApiResponse::success(assignment))
}

/// GET /api/assignments/current - the open interval or null
pub async fn current(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Option<AssignmentWithPatrol>> {
    let assignment = state.assignments.current(auth.user_id).await?;
    Ok(ApiResponse::success(assignment))
}

/// GET /api/assignments/mine - the caller's full history, newest first
pub async fn mine(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(params): Query<PageParams>,
) -> ApiResult<Paginated<AssignmentWithPatrol>> {
    let (page, size, _) = params.clamp(10, 100);
    let history = state.assignments.history(auth.user_id, page, size).await?;
    Ok(ApiResponse::success(history))
}
