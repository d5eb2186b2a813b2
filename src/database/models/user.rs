use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Full user row. The password hash never leaves the service layer.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub badge: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Wire shape for user payloads: no hash, roles attached
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: i64,
    pub email: String,
    pub full_name: Option<String>,
    pub badge: Option<String>,
    pub is_active: bool,
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn into_public(self, roles: Vec<String>) -> PublicUser {
        PublicUser {
            id: self.id,
            email: self.email,
            full_name: self.full_name,
            badge: self.badge,
            is_active: self.is_active,
            roles,
            created_at: self.created_at,
        }
    }
}
