use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One continuous period during which a user represents a patrol unit.
/// `ended_at = NULL` means the interval is open (currently active); closing
/// it is the only transition, there is no way back to open.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Assignment {
    pub id: i64,
    pub user_id: i64,
    pub patrol_id: i32,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Assignment {
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// Assignment joined with the patrol's code/alias for history and current views
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AssignmentWithPatrol {
    pub id: i64,
    pub user_id: i64,
    pub patrol_id: i32,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub patrol_code: String,
    pub patrol_alias: Option<String>,
}
