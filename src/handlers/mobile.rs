use axum::{
    extract::{Query, State},
    Extension,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::database::models::PatrolSummary;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::types::Paginated;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct MobilePatrolQuery {
    pub q: Option<String>,
    pub page: Option<i64>,
    pub size: Option<i64>,
}

/// GET /api/mobile/patrols - minimal rows for the unit picker
pub async fn patrols(
    State(state): State<AppState>,
    Query(query): Query<MobilePatrolQuery>,
) -> ApiResult<Paginated<PatrolSummary>> {
    let data = state
        .patrols
        .list_minimal(
            query.page.unwrap_or(1),
            query.size.unwrap_or(100),
            query.q.as_deref().unwrap_or(""),
        )
        .await?;
    Ok(ApiResponse::success(data))
}

/// GET /api/mobile/assignment - the caller's resolved patrol or null.
/// No resolvable patrol is an ordinary answer here, never an error.
pub async fn assignment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Value> {
    let resolved = state.resolver.resolve(auth.user_id, &auth.email).await;

    let payload = resolved.map(|p| {
        json!({
            "patrol_id": p.id,
            "alias": p.alias,
            "code": p.code,
        })
    });

    Ok(ApiResponse::success(json!({ "assignment": payload })))
}
