use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A single position observation, stamped with the resolved patrol and a
/// server-assigned timestamp used for ordering and time-window filtering.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Location {
    pub id: i64,
    pub patrol_id: Option<i32>,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}
