use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Patrol {
    pub id: i32,
    pub code: String,
    pub alias: Option<String>,
    pub plate: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Minimal patrol payload for the mobile app and resolver results
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PatrolSummary {
    pub id: i32,
    pub code: String,
    pub alias: Option<String>,
}
