use chrono::Utc;
use sqlx::PgPool;
use thiserror::Error;

use crate::database::models::{Assignment, AssignmentWithPatrol};
use crate::types::Paginated;

#[derive(Debug, Error)]
pub enum AssignmentError {
    #[error("Patrol not found: {0}")]
    PatrolNotFound(i32),
    #[error("User not found: {0}")]
    UserNotFound(i64),
    #[error("No active assignment")]
    NoActiveAssignment,
    #[error("Assignment changed concurrently")]
    AlreadyReassigned,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// The assignment ledger: append-style intervals of (user, patrol, start, end).
/// Invariant: at most one interval per user has `ended_at IS NULL`. `start`
/// serializes per-user transitions with a row lock; the partial unique index
/// `ux_patrol_assignments_open` backstops the invariant inside the store.
#[derive(Clone)]
pub struct AssignmentService {
    pool: PgPool,
}

impl AssignmentService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a new interval for `user_id` on `patrol_id`, closing any interval
    /// that is still open. The close and the insert share one transaction and
    /// one timestamp, so the closed interval's end equals the new start.
    pub async fn start(&self, user_id: i64, patrol_id: i32) -> Result<Assignment, AssignmentError> {
        let mut tx = self.pool.begin().await?;

        // Serialize concurrent starts/ends for the same user
        let locked: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Err(AssignmentError::UserNotFound(user_id));
        }

        let patrol: Option<i32> = sqlx::query_scalar("SELECT id FROM patrols WHERE id = $1")
            .bind(patrol_id)
            .fetch_optional(&mut *tx)
            .await?;
        if patrol.is_none() {
            return Err(AssignmentError::PatrolNotFound(patrol_id));
        }

        let now = Utc::now();

        sqlx::query(
            "UPDATE patrol_assignments SET ended_at = $1 \
             WHERE user_id = $2 AND ended_at IS NULL",
        )
        .bind(now)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        let assignment = sqlx::query_as::<_, Assignment>(
            "INSERT INTO patrol_assignments (user_id, patrol_id, started_at) \
             VALUES ($1, $2, $3) \
             RETURNING id, user_id, patrol_id, started_at, ended_at",
        )
        .bind(user_id)
        .bind(patrol_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AssignmentError::AlreadyReassigned
            } else {
                AssignmentError::Database(e)
            }
        })?;

        tx.commit().await?;
        Ok(assignment)
    }

    /// Close the open interval for `user_id`. Single atomic statement.
    pub async fn end(&self, user_id: i64) -> Result<Assignment, AssignmentError> {
        let closed = sqlx::query_as::<_, Assignment>(
            "UPDATE patrol_assignments SET ended_at = $1 \
             WHERE user_id = $2 AND ended_at IS NULL \
             RETURNING id, user_id, patrol_id, started_at, ended_at",
        )
        .bind(Utc::now())
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        closed.ok_or(AssignmentError::NoActiveAssignment)
    }

    /// The open interval for `user_id`, joined with patrol code/alias, or None.
    pub async fn current(
        &self,
        user_id: i64,
    ) -> Result<Option<AssignmentWithPatrol>, AssignmentError> {
        let row = sqlx::query_as::<_, AssignmentWithPatrol>(
            "SELECT a.id, a.user_id, a.patrol_id, a.started_at, a.ended_at, \
                    p.code AS patrol_code, p.alias AS patrol_alias \
             FROM patrol_assignments a \
             JOIN patrols p ON p.id = a.patrol_id \
             WHERE a.user_id = $1 AND a.ended_at IS NULL \
             ORDER BY a.started_at DESC \
             LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Closed and open intervals for `user_id`, most recent start first.
    /// Page size is clamped to [1, 100].
    pub async fn history(
        &self,
        user_id: i64,
        page: i64,
        size: i64,
    ) -> Result<Paginated<AssignmentWithPatrol>, AssignmentError> {
        let page = page.max(1);
        let size = size.clamp(1, 100);
        let offset = (page - 1) * size;

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM patrol_assignments WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;

        let items = sqlx::query_as::<_, AssignmentWithPatrol>(
            "SELECT a.id, a.user_id, a.patrol_id, a.started_at, a.ended_at, \
                    p.code AS patrol_code, p.alias AS patrol_alias \
             FROM patrol_assignments a \
             JOIN patrols p ON p.id = a.patrol_id \
             WHERE a.user_id = $1 \
             ORDER BY a.started_at DESC \
             LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(size)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(Paginated::new(items, page, size, total))
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some("23505"),
        _ => false,
    }
}
