use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::database::models::Patrol;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::types::Paginated;
use crate::AppState;

use super::require_admin;

#[derive(Debug, Deserialize)]
pub struct PatrolListQuery {
    pub page: Option<i64>,
    pub size: Option<i64>,
    pub q: Option<String>,
}

/// GET /api/patrols - admin listing with optional code/alias/plate search
pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<PatrolListQuery>,
) -> ApiResult<Paginated<Patrol>> {
    require_admin(&state, &auth).await?;

    let data = state
        .patrols
        .list(
            query.page.unwrap_or(1),
            query.size.unwrap_or(10),
            query.q.as_deref().unwrap_or(""),
        )
        .await?;
    Ok(ApiResponse::success(data))
}

#[derive(Debug, Deserialize)]
pub struct CreatePatrolRequest {
    pub code: Option<String>,
    pub alias: Option<String>,
    pub plate: Option<String>,
    pub is_active: Option<bool>,
}

/// POST /api/patrols
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<CreatePatrolRequest>,
) -> ApiResult<Patrol> {
    require_admin(&state, &auth).await?;

    let code = req.code.as_deref().map(str::trim).unwrap_or_default();
    if code.is_empty() {
        return Err(ApiError::bad_request("code is required"));
    }
    let alias = req.alias.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let plate = req.plate.as_deref().map(str::trim).filter(|s| !s.is_empty());

    let patrol = state
        .patrols
        .create(code, alias, plate, req.is_active.unwrap_or(true))
        .await?;
    Ok(ApiResponse::created(patrol))
}

/// GET /api/patrols/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i32>,
) -> ApiResult<Patrol> {
    require_admin(&state, &auth).await?;

    let patrol = state
        .patrols
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Patrol not found"))?;
    Ok(ApiResponse::success(patrol))
}

#[derive(Debug, Deserialize)]
pub struct UpdatePatrolRequest {
    pub code: Option<String>,
    pub alias: Option<String>,
    pub plate: Option<String>,
    pub is_active: Option<bool>,
}

/// PUT /api/patrols/:id - partial update
pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i32>,
    Json(req): Json<UpdatePatrolRequest>,
) -> ApiResult<Patrol> {
    require_admin(&state, &auth).await?;

    let patrol = state
        .patrols
        .update(
            id,
            req.code.as_deref().map(str::trim),
            req.alias.as_deref().map(str::trim),
            req.plate.as_deref().map(str::trim),
            req.is_active,
        )
        .await?
        .ok_or_else(|| ApiError::not_found("Patrol not found"))?;
    Ok(ApiResponse::success(patrol))
}

/// DELETE /api/patrols/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i32>,
) -> ApiResult<Value> {
    require_admin(&state, &auth).await?;

    if !state.patrols.delete(id).await? {
        return Err(ApiError::not_found("Patrol not found"));
    }
    Ok(ApiResponse::success(json!({ "deleted": true })))
}
