use sqlx::PgPool;
use thiserror::Error;

use crate::database::models::{Patrol, PatrolSummary};
use crate::types::Paginated;

#[derive(Debug, Error)]
pub enum PatrolError {
    #[error("Patrol not found")]
    NotFound,
    #[error("Patrol code already exists: {0}")]
    CodeExists(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// CRUD over patrol unit identity. The resolver and the assignment ledger
/// reference patrols; they never own them.
#[derive(Clone)]
pub struct PatrolService {
    pool: PgPool,
}

impl PatrolService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Paginated listing, optional q filter over code/alias/plate.
    /// Size clamped to [1, 200], newest patrols first.
    pub async fn list(
        &self,
        page: i64,
        size: i64,
        q: &str,
    ) -> Result<Paginated<Patrol>, PatrolError> {
        let page = page.max(1);
        let size = size.clamp(1, 200);
        let offset = (page - 1) * size;
        let pattern = format!("%{}%", q.trim().to_lowercase());

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM patrols \
             WHERE LOWER(code) LIKE $1 \
                OR LOWER(COALESCE(alias, '')) LIKE $1 \
                OR LOWER(COALESCE(plate, '')) LIKE $1",
        )
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        let items = sqlx::query_as::<_, Patrol>(
            "SELECT id, code, alias, plate, is_active, created_at FROM patrols \
             WHERE LOWER(code) LIKE $1 \
                OR LOWER(COALESCE(alias, '')) LIKE $1 \
                OR LOWER(COALESCE(plate, '')) LIKE $1 \
             ORDER BY id DESC \
             LIMIT $2 OFFSET $3",
        )
        .bind(&pattern)
        .bind(size)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(Paginated::new(items, page, size, total))
    }

    /// Minimal rows for the mobile app: id/code/alias only, alias search,
    /// named units first.
    pub async fn list_minimal(
        &self,
        page: i64,
        size: i64,
        q: &str,
    ) -> Result<Paginated<PatrolSummary>, PatrolError> {
        let page = page.max(1);
        let size = size.clamp(1, 200);
        let offset = (page - 1) * size;
        let q = q.trim();

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM patrols p \
             WHERE ($1 = '' \
                OR COALESCE(p.alias, '') ILIKE '%' || $1 || '%' \
                OR COALESCE(p.code, '') ILIKE '%' || $1 || '%')",
        )
        .bind(q)
        .fetch_one(&self.pool)
        .await?;

        let items = sqlx::query_as::<_, PatrolSummary>(
            "SELECT p.id, p.code, p.alias FROM patrols p \
             WHERE ($1 = '' \
                OR COALESCE(p.alias, '') ILIKE '%' || $1 || '%' \
                OR COALESCE(p.code, '') ILIKE '%' || $1 || '%') \
             ORDER BY NULLIF(p.alias, '') IS NULL, p.alias ASC, p.code ASC \
             LIMIT $2 OFFSET $3",
        )
        .bind(q)
        .bind(size)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(Paginated::new(items, page, size, total))
    }

    pub async fn get(&self, id: i32) -> Result<Option<Patrol>, PatrolError> {
        let row = sqlx::query_as::<_, Patrol>(
            "SELECT id, code, alias, plate, is_active, created_at FROM patrols WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn create(
        &self,
        code: &str,
        alias: Option<&str>,
        plate: Option<&str>,
        is_active: bool,
    ) -> Result<Patrol, PatrolError> {
        sqlx::query_as::<_, Patrol>(
            "INSERT INTO patrols (code, alias, plate, is_active) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, code, alias, plate, is_active, created_at",
        )
        .bind(code)
        .bind(alias)
        .bind(plate)
        .bind(is_active)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                PatrolError::CodeExists(code.to_string())
            } else {
                PatrolError::Database(e)
            }
        })
    }

    /// Partial update: only supplied fields change.
    pub async fn update(
        &self,
        id: i32,
        code: Option<&str>,
        alias: Option<&str>,
        plate: Option<&str>,
        is_active: Option<bool>,
    ) -> Result<Option<Patrol>, PatrolError> {
        let row = sqlx::query_as::<_, Patrol>(
            "UPDATE patrols SET \
                 code = COALESCE($2, code), \
                 alias = COALESCE($3, alias), \
                 plate = COALESCE($4, plate), \
                 is_active = COALESCE($5, is_active) \
             WHERE id = $1 \
             RETURNING id, code, alias, plate, is_active, created_at",
        )
        .bind(id)
        .bind(code)
        .bind(alias)
        .bind(plate)
        .bind(is_active)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                PatrolError::CodeExists(code.unwrap_or_default().to_string())
            } else {
                PatrolError::Database(e)
            }
        })?;
        Ok(row)
    }

    pub async fn delete(&self, id: i32) -> Result<bool, PatrolError> {
        let result = sqlx::query("DELETE FROM patrols WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some("23505"),
        _ => false,
    }
}
