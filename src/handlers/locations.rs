use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::api::geo::{self, BoundingBox, GeoFilters};
use crate::database::models::Location;
use crate::error::ApiError;
use crate::middleware::response::raw_json;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::location_service::{LocationPayload, LocationSummary};
use crate::AppState;

/// POST /api/locations - record a position report for the caller's patrol
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<LocationPayload>,
) -> ApiResult<Location> {
    let resolved = state.resolver.resolve(auth.user_id, &auth.email).await;
    let location = state.locations.record(resolved.as_ref(), &payload).await?;
    Ok(ApiResponse::created(location))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub bbox: Option<String>,
    pub page: Option<i64>,
    pub size: Option<i64>,
}

/// GET /api/locations - bbox list when a bbox is supplied, paginated table
/// otherwise. A malformed bbox yields an empty list, never an error.
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Response, ApiError> {
    if let Some(bbox_str) = query.bbox.as_deref() {
        let items = match BoundingBox::parse(bbox_str) {
            Some(bbox) => state.locations.list_bbox(&bbox).await?,
            None => Vec::new(),
        };
        return Ok(ApiResponse::success(items).into_response());
    }

    let page = query.page.unwrap_or(1);
    let size = query.size.unwrap_or(100);
    let data = state.locations.list(page, size).await?;
    Ok(ApiResponse::success(data).into_response())
}

/// GET /api/locations/:id
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Location> {
    let location = state
        .locations
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Location not found"))?;
    Ok(ApiResponse::success(location))
}

/// PUT /api/locations/:id - edit name/position/active flag
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<LocationPayload>,
) -> ApiResult<Location> {
    let location = state.locations.update(id, &payload).await?;
    Ok(ApiResponse::success(location))
}

/// DELETE /api/locations/:id
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<serde_json::Value> {
    if !state.locations.delete(id).await? {
        return Err(ApiError::not_found("Location not found"));
    }
    Ok(ApiResponse::success(json!({ "deleted": true })))
}

#[derive(Debug, Deserialize)]
pub struct GeoQuery {
    pub limit: Option<String>,
    pub patrol_id: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub bbox: Option<String>,
    #[serde(rename = "minLng")]
    pub min_lng: Option<String>,
    #[serde(rename = "minLat")]
    pub min_lat: Option<String>,
    #[serde(rename = "maxLng")]
    pub max_lng: Option<String>,
    #[serde(rename = "maxLat")]
    pub max_lat: Option<String>,
}

/// GET /api/locations/geo - GeoJSON FeatureCollection for map rendering.
///
/// limit is clamped to [1, 5000] (default 1000, non-numeric falls back).
/// from/to filter the report timestamp inclusively; unparseable values are
/// ignored. bbox may arrive as one string or four loose params; a malformed
/// bbox is ignored. patrol_id must be numeric when present.
pub async fn geo(
    State(state): State<AppState>,
    Query(query): Query<GeoQuery>,
) -> Result<Response, ApiError> {
    let limit = geo::clamp_limit(query.limit.as_deref().and_then(|v| v.parse().ok()));

    let patrol_id = match query.patrol_id.as_deref().filter(|v| !v.is_empty()) {
        Some(raw) => Some(
            raw.parse::<i32>()
                .map_err(|_| ApiError::bad_request("patrol_id must be an integer"))?,
        ),
        None => None,
    };

    let from = query.from.as_deref().and_then(geo::parse_timestamp);
    let to = query.to.as_deref().and_then(geo::parse_timestamp);

    let bbox_str = query.bbox.clone().or_else(|| {
        match (&query.min_lng, &query.min_lat, &query.max_lng, &query.max_lat) {
            (Some(a), Some(b), Some(c), Some(d)) => Some(format!("{},{},{},{}", a, b, c, d)),
            _ => None,
        }
    });
    let bbox = bbox_str.as_deref().and_then(BoundingBox::parse);

    let filters = GeoFilters {
        patrol_id,
        from,
        to,
        limit,
        bbox,
    };

    let rows = state.locations.points(&filters).await?;
    Ok(raw_json(geo::feature_collection(&rows)))
}

/// GET /api/locations/summary - dashboard counters and recent reports
pub async fn summary(State(state): State<AppState>) -> ApiResult<LocationSummary> {
    let summary = state.locations.summary().await?;
    Ok(ApiResponse::success(summary))
}
