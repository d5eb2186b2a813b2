use sqlx::PgPool;
use thiserror::Error;

use crate::database::models::{PublicUser, User};
use crate::database::schema::ALLOWED_ROLE_CODES;
use crate::types::Paginated;

#[derive(Debug, Error)]
pub enum UserError {
    #[error("User not found")]
    NotFound,
    #[error("Email already exists")]
    EmailExists,
    #[error("Badge already exists")]
    BadgeExists,
    #[error("Invalid badge format")]
    InvalidBadge,
    #[error("Invalid roles: {0:?}")]
    InvalidRoles(Vec<String>),
    #[error(transparent)]
    Hash(#[from] bcrypt::BcryptError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Badge format: five digits, dash, one uppercase letter (e.g. "12345-A").
/// Mirrors the CHECK constraint on users.badge.
pub fn is_valid_badge(badge: &str) -> bool {
    let bytes = badge.as_bytes();
    bytes.len() == 7
        && bytes[..5].iter().all(|b| b.is_ascii_digit())
        && bytes[5] == b'-'
        && bytes[6].is_ascii_uppercase()
}

/// Identity subsystem: user CRUD, password verification, role management.
/// The assignment core only ever reads users; everything here is plumbing
/// around it.
#[derive(Clone)]
pub struct UserService {
    pool: PgPool,
}

impl UserService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>, UserError> {
        let row = sqlx::query_as::<_, User>(
            "SELECT id, email, password_hash, full_name, badge, is_active, created_at, updated_at \
             FROM users WHERE email = $1",
        )
        .bind(email.trim().to_lowercase())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserError> {
        let row = sqlx::query_as::<_, User>(
            "SELECT id, email, password_hash, full_name, badge, is_active, created_at, updated_at \
             FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn create_user(
        &self,
        email: &str,
        password: &str,
        is_active: bool,
        full_name: Option<&str>,
        badge: Option<&str>,
    ) -> Result<User, UserError> {
        if let Some(badge) = badge {
            if !is_valid_badge(badge) {
                return Err(UserError::InvalidBadge);
            }
        }

        let password_hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;

        sqlx::query_as::<_, User>(
            "INSERT INTO users (email, password_hash, is_active, full_name, badge) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, email, password_hash, full_name, badge, is_active, created_at, updated_at",
        )
        .bind(email.trim().to_lowercase())
        .bind(password_hash)
        .bind(is_active)
        .bind(full_name)
        .bind(badge)
        .fetch_one(&self.pool)
        .await
        .map_err(map_user_constraint)
    }

    /// Partial update; None leaves the column untouched. A new password is
    /// re-hashed, a new email is lowercased, a new badge is re-validated.
    pub async fn update_user(
        &self,
        id: i64,
        email: Option<&str>,
        password: Option<&str>,
        is_active: Option<bool>,
        full_name: Option<&str>,
        badge: Option<&str>,
    ) -> Result<Option<User>, UserError> {
        if let Some(badge) = badge {
            if !is_valid_badge(badge) {
                return Err(UserError::InvalidBadge);
            }
        }

        let password_hash = match password {
            Some(p) => Some(bcrypt::hash(p, bcrypt::DEFAULT_COST)?),
            None => None,
        };
        let email = email.map(|e| e.trim().to_lowercase());

        let row = sqlx::query_as::<_, User>(
            "UPDATE users SET \
                 email = COALESCE($2, email), \
                 password_hash = COALESCE($3, password_hash), \
                 is_active = COALESCE($4, is_active), \
                 full_name = COALESCE($5, full_name), \
                 badge = COALESCE($6, badge), \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING id, email, password_hash, full_name, badge, is_active, created_at, updated_at",
        )
        .bind(id)
        .bind(email)
        .bind(password_hash)
        .bind(is_active)
        .bind(full_name)
        .bind(badge)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_user_constraint)?;
        Ok(row)
    }

    pub async fn delete_user(&self, id: i64) -> Result<bool, UserError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub fn verify_password(&self, password: &str, password_hash: &str) -> bool {
        bcrypt::verify(password, password_hash).unwrap_or(false)
    }

    /// Paginated listing with roles attached, optional q over
    /// email/full_name/badge. Size clamped to [1, 200].
    pub async fn list_users(
        &self,
        page: i64,
        size: i64,
        q: &str,
    ) -> Result<Paginated<PublicUser>, UserError> {
        let page = page.max(1);
        let size = size.clamp(1, 200);
        let offset = (page - 1) * size;
        let pattern = format!("%{}%", q.trim().to_lowercase());

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users \
             WHERE LOWER(email) LIKE $1 \
                OR LOWER(COALESCE(full_name, '')) LIKE $1 \
                OR LOWER(COALESCE(badge, '')) LIKE $1",
        )
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        let users = sqlx::query_as::<_, User>(
            "SELECT id, email, password_hash, full_name, badge, is_active, created_at, updated_at \
             FROM users \
             WHERE LOWER(email) LIKE $1 \
                OR LOWER(COALESCE(full_name, '')) LIKE $1 \
                OR LOWER(COALESCE(badge, '')) LIKE $1 \
             ORDER BY id DESC \
             LIMIT $2 OFFSET $3",
        )
        .bind(&pattern)
        .bind(size)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let mut items = Vec::with_capacity(users.len());
        for user in users {
            let roles = self.list_role_codes(user.id).await?;
            items.push(user.into_public(roles));
        }

        Ok(Paginated::new(items, page, size, total))
    }

    pub async fn get_public(&self, id: i64) -> Result<Option<PublicUser>, UserError> {
        match self.get_by_id(id).await? {
            Some(user) => {
                let roles = self.list_role_codes(user.id).await?;
                Ok(Some(user.into_public(roles)))
            }
            None => Ok(None),
        }
    }

    // ----- roles -----

    pub async fn list_role_codes(&self, user_id: i64) -> Result<Vec<String>, UserError> {
        let codes: Vec<String> = sqlx::query_scalar(
            "SELECT r.code FROM user_roles ur \
             JOIN roles r ON r.id = ur.role_id \
             WHERE ur.user_id = $1 \
             ORDER BY r.code",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(codes)
    }

    pub async fn all_role_codes(&self) -> Result<Vec<String>, UserError> {
        let codes: Vec<String> =
            sqlx::query_scalar("SELECT code FROM roles ORDER BY code")
                .fetch_all(&self.pool)
                .await?;
        Ok(codes)
    }

    pub async fn is_admin(&self, user_id: i64) -> Result<bool, UserError> {
        Ok(self
            .list_role_codes(user_id)
            .await?
            .iter()
            .any(|c| c == "admin"))
    }

    /// Replace the user's role set. Codes are lowercased and validated
    /// against the seeded catalog before anything changes.
    pub async fn set_roles(&self, user_id: i64, codes: &[String]) -> Result<(), UserError> {
        let (valid, invalid) = normalize_role_codes(codes);
        if !invalid.is_empty() {
            return Err(UserError::InvalidRoles(invalid));
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        for code in &valid {
            sqlx::query(
                "INSERT INTO user_roles (user_id, role_id) \
                 SELECT $1, id FROM roles WHERE code = $2 \
                 ON CONFLICT DO NOTHING",
            )
            .bind(user_id)
            .bind(code)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

/// Lowercase, de-blank and split role codes into (valid, invalid)
pub fn normalize_role_codes(codes: &[String]) -> (Vec<String>, Vec<String>) {
    let cleaned: Vec<String> = codes
        .iter()
        .map(|c| c.trim().to_lowercase())
        .filter(|c| !c.is_empty())
        .collect();
    let (valid, invalid) = cleaned
        .into_iter()
        .partition(|c| ALLOWED_ROLE_CODES.contains(&c.as_str()));
    (valid, invalid)
}

fn map_user_constraint(err: sqlx::Error) -> UserError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some("23505") {
            let constraint = db.constraint().unwrap_or_default();
            if constraint.contains("badge") {
                return UserError::BadgeExists;
            }
            return UserError::EmailExists;
        }
        // CHECK violation on badge format
        if db.code().as_deref() == Some("23514") {
            return UserError::InvalidBadge;
        }
    }
    UserError::Database(err)
}
