use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use thiserror::Error;

use crate::api::geo::{BoundingBox, GeoFilters};
use crate::database::models::{Location, PatrolSummary};
use crate::types::Paginated;

#[derive(Debug, Error)]
pub enum LocationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },
    #[error("Name must not be empty")]
    EmptyName,
    #[error("No patrol could be resolved and none was supplied")]
    UnresolvedPatrol,
    #[error("Location not found")]
    NotFound,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Incoming position report. `patrol_id` is honored only when the resolver
/// found nothing for the caller; a resolved assignment always wins.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocationPayload {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub name: Option<String>,
    pub patrol_id: Option<i32>,
    pub active: Option<bool>,
}

/// Dashboard summary payload
#[derive(Debug, Serialize)]
pub struct LocationSummary {
    pub total: i64,
    pub active: i64,
    pub last_updated: Option<DateTime<Utc>>,
    pub recent: Vec<Location>,
}

pub fn validate_lat(lat: f64) -> Result<(), LocationError> {
    if (-90.0..=90.0).contains(&lat) {
        Ok(())
    } else {
        Err(LocationError::OutOfRange {
            field: "lat",
            value: lat,
        })
    }
}

pub fn validate_lng(lng: f64) -> Result<(), LocationError> {
    if (-180.0..=180.0).contains(&lng) {
        Ok(())
    } else {
        Err(LocationError::OutOfRange {
            field: "lng",
            value: lng,
        })
    }
}

/// Validates and persists position reports and answers the read-side
/// queries (paginated table, bbox list, point collection, summary).
#[derive(Clone)]
pub struct LocationService {
    pool: PgPool,
}

impl LocationService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Persist a report attributed to `resolved` (the caller's active
    /// patrol) or, only when resolution failed, the payload's patrol id.
    /// The stored name falls back to patrol alias, then code, then
    /// "Patrol {id}".
    pub async fn record(
        &self,
        resolved: Option<&PatrolSummary>,
        payload: &LocationPayload,
    ) -> Result<Location, LocationError> {
        let patrol_id = match resolved {
            Some(patrol) => patrol.id,
            None => payload.patrol_id.ok_or(LocationError::UnresolvedPatrol)?,
        };

        let lat = payload.lat.ok_or(LocationError::MissingField("lat"))?;
        let lng = payload.lng.ok_or(LocationError::MissingField("lng"))?;
        validate_lat(lat)?;
        validate_lng(lng)?;

        let name = match payload.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.default_name(resolved, patrol_id).await,
        };

        let active = payload.active.unwrap_or(true);

        let row = sqlx::query_as::<_, Location>(
            "INSERT INTO locations (patrol_id, name, lat, lng, is_active, updated_at) \
             VALUES ($1, $2, $3, $4, $5, NOW()) \
             RETURNING id, patrol_id, name, lat, lng, is_active, updated_at",
        )
        .bind(patrol_id)
        .bind(&name)
        .bind(lat)
        .bind(lng)
        .bind(active)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    /// Alias, then code, then "Patrol {id}". Consults the registry when the
    /// resolver gave us nothing to name the report after.
    async fn default_name(&self, resolved: Option<&PatrolSummary>, patrol_id: i32) -> String {
        if let Some(patrol) = resolved {
            if let Some(alias) = patrol.alias.as_deref().filter(|a| !a.is_empty()) {
                return alias.to_string();
            }
            if !patrol.code.is_empty() {
                return patrol.code.clone();
            }
        }

        let looked_up: Option<Option<String>> = sqlx::query_scalar(
            "SELECT COALESCE(NULLIF(alias, ''), NULLIF(code, '')) FROM patrols WHERE id = $1",
        )
        .bind(patrol_id)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or(None);

        match looked_up.flatten() {
            Some(name) => name,
            None => format!("Patrol {}", patrol_id),
        }
    }

    pub async fn get(&self, id: i64) -> Result<Option<Location>, LocationError> {
        let row = sqlx::query_as::<_, Location>(
            "SELECT id, patrol_id, name, lat, lng, is_active, updated_at \
             FROM locations WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Partial update of name/position/active flag; coordinates are
    /// re-validated, the timestamp is refreshed.
    pub async fn update(
        &self,
        id: i64,
        payload: &LocationPayload,
    ) -> Result<Location, LocationError> {
        if let Some(lat) = payload.lat {
            validate_lat(lat)?;
        }
        if let Some(lng) = payload.lng {
            validate_lng(lng)?;
        }
        let name = match payload.name.as_deref().map(str::trim) {
            Some("") => return Err(LocationError::EmptyName),
            other => other,
        };

        let row = sqlx::query_as::<_, Location>(
            "UPDATE locations SET \
                 name = COALESCE($2, name), \
                 lat = COALESCE($3, lat), \
                 lng = COALESCE($4, lng), \
                 is_active = COALESCE($5, is_active), \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING id, patrol_id, name, lat, lng, is_active, updated_at",
        )
        .bind(id)
        .bind(name)
        .bind(payload.lat)
        .bind(payload.lng)
        .bind(payload.active)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or(LocationError::NotFound)
    }

    pub async fn delete(&self, id: i64) -> Result<bool, LocationError> {
        let result = sqlx::query("DELETE FROM locations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Paginated table of recent reports, newest first.
    /// Size clamped to [1, 200].
    pub async fn list(&self, page: i64, size: i64) -> Result<Paginated<Location>, LocationError> {
        let page = page.max(1);
        let size = size.clamp(1, 200);
        let offset = (page - 1) * size;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM locations")
            .fetch_one(&self.pool)
            .await?;

        let items = sqlx::query_as::<_, Location>(
            "SELECT id, patrol_id, name, lat, lng, is_active, updated_at \
             FROM locations \
             ORDER BY updated_at DESC \
             LIMIT $1 OFFSET $2",
        )
        .bind(size)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(Paginated::new(items, page, size, total))
    }

    /// Reports inside a bounding box, newest first. Callers that accept a
    /// raw bbox string must map parse failures to an empty list, not here.
    pub async fn list_bbox(&self, bbox: &BoundingBox) -> Result<Vec<Location>, LocationError> {
        let rows = sqlx::query_as::<_, Location>(
            "SELECT id, patrol_id, name, lat, lng, is_active, updated_at \
             FROM locations \
             WHERE lng BETWEEN $1 AND $2 AND lat BETWEEN $3 AND $4 \
             ORDER BY updated_at DESC",
        )
        .bind(bbox.min_lng)
        .bind(bbox.max_lng)
        .bind(bbox.min_lat)
        .bind(bbox.max_lat)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Rows for the point-collection view: optional patrol filter,
    /// inclusive time window on the report timestamp, optional bbox,
    /// ascending timestamp, limit already clamped by the caller.
    pub async fn points(&self, filters: &GeoFilters) -> Result<Vec<Location>, LocationError> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT id, patrol_id, name, lat, lng, is_active, updated_at FROM locations WHERE 1=1",
        );

        if let Some(patrol_id) = filters.patrol_id {
            query.push(" AND patrol_id = ").push_bind(patrol_id);
        }
        if let Some(from) = filters.from {
            query.push(" AND updated_at >= ").push_bind(from);
        }
        if let Some(to) = filters.to {
            query.push(" AND updated_at <= ").push_bind(to);
        }
        if let Some(bbox) = filters.bbox {
            query
                .push(" AND lng BETWEEN ")
                .push_bind(bbox.min_lng)
                .push(" AND ")
                .push_bind(bbox.max_lng)
                .push(" AND lat BETWEEN ")
                .push_bind(bbox.min_lat)
                .push(" AND ")
                .push_bind(bbox.max_lat);
        }

        query.push(" ORDER BY updated_at ASC LIMIT ").push_bind(filters.limit);

        let rows = query
            .build_query_as::<Location>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Dashboard numbers plus the 20 most recent reports
    pub async fn summary(&self) -> Result<LocationSummary, LocationError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM locations")
            .fetch_one(&self.pool)
            .await?;
        let active: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM locations WHERE is_active")
                .fetch_one(&self.pool)
                .await?;
        let last_updated: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT MAX(updated_at) FROM locations")
                .fetch_one(&self.pool)
                .await?;
        let recent = sqlx::query_as::<_, Location>(
            "SELECT id, patrol_id, name, lat, lng, is_active, updated_at \
             FROM locations ORDER BY updated_at DESC LIMIT 20",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(LocationSummary {
            total,
            active,
            last_updated,
            recent,
        })
    }
}
