use async_trait::async_trait;
use sqlx::PgPool;
use tracing::warn;

use crate::database::models::PatrolSummary;
use crate::database::schema::LegacyCapabilities;

/// One way of determining the patrol a user currently represents.
/// Strategies are consulted in priority order; a strategy that errors is
/// treated as "no match" so a broken fallback source can never take down
/// the request.
#[async_trait]
trait ResolutionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn resolve(
        &self,
        pool: &PgPool,
        user_id: i64,
        email: &str,
    ) -> Result<Option<PatrolSummary>, sqlx::Error>;
}

/// Resolves the caller's active patrol: canonical assignment ledger first,
/// legacy operator schema second (when the startup probe found one).
#[derive(Clone)]
pub struct AssignmentResolver {
    pool: PgPool,
    strategies: std::sync::Arc<Vec<Box<dyn ResolutionStrategy>>>,
}

impl AssignmentResolver {
    pub fn new(pool: PgPool, legacy: LegacyCapabilities) -> Self {
        let mut strategies: Vec<Box<dyn ResolutionStrategy>> = vec![Box::new(LedgerStrategy)];
        if legacy.available {
            strategies.push(Box::new(LegacyStrategy { caps: legacy }));
        }
        Self {
            pool,
            strategies: std::sync::Arc::new(strategies),
        }
    }

    /// First strategy hit wins. None means "no resolvable patrol", which
    /// callers must treat as an ordinary outcome, not an error.
    pub async fn resolve(&self, user_id: i64, email: &str) -> Option<PatrolSummary> {
        let email = email.trim().to_lowercase();
        for strategy in self.strategies.iter() {
            match strategy.resolve(&self.pool, user_id, &email).await {
                Ok(Some(patrol)) => return Some(patrol),
                Ok(None) => continue,
                Err(e) => {
                    warn!(strategy = strategy.name(), "resolution strategy failed: {}", e);
                    continue;
                }
            }
        }
        None
    }
}

/// Canonical source: the open interval in the assignment ledger.
struct LedgerStrategy;

#[async_trait]
impl ResolutionStrategy for LedgerStrategy {
    fn name(&self) -> &'static str {
        "ledger"
    }

    async fn resolve(
        &self,
        pool: &PgPool,
        user_id: i64,
        _email: &str,
    ) -> Result<Option<PatrolSummary>, sqlx::Error> {
        sqlx::query_as::<_, PatrolSummary>(
            "SELECT p.id, p.code, p.alias \
             FROM patrol_assignments a \
             JOIN patrols p ON p.id = a.patrol_id \
             WHERE a.user_id = $1 AND a.ended_at IS NULL \
             ORDER BY a.started_at DESC \
             LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }
}

/// Migration-era source: operators matched by email (or user link when the
/// column survived), joined to whichever notion of "active" the legacy
/// schema carries. The query is shaped by capabilities probed once at
/// startup, never by per-request catalog lookups.
struct LegacyStrategy {
    caps: LegacyCapabilities,
}

#[async_trait]
impl ResolutionStrategy for LegacyStrategy {
    fn name(&self) -> &'static str {
        "legacy"
    }

    async fn resolve(
        &self,
        pool: &PgPool,
        user_id: i64,
        email: &str,
    ) -> Result<Option<PatrolSummary>, sqlx::Error> {
        if email.is_empty() && !self.caps.has_user_link {
            return Ok(None);
        }

        let Some(sql) = legacy_query(&self.caps) else {
            return Ok(None);
        };

        let query = sqlx::query_as::<_, PatrolSummary>(&sql).bind(email);
        let query = if self.caps.has_user_link {
            query.bind(user_id)
        } else {
            query
        };
        query.fetch_optional(pool).await
    }
}

/// Build the legacy lookup for the probed capabilities. Returns None when
/// the schema has no usable notion of an active assignment.
fn legacy_query(caps: &LegacyCapabilities) -> Option<String> {
    let mut active_conds: Vec<&str> = Vec::new();
    if caps.has_active_flag {
        active_conds.push("ap.is_active = TRUE");
    }
    if caps.has_window {
        if caps.has_window_end {
            active_conds
                .push("(ap.started_at <= NOW() AND (ap.ended_at IS NULL OR ap.ended_at >= NOW()))");
        } else {
            active_conds.push("ap.started_at <= NOW()");
        }
    }
    if active_conds.is_empty() {
        return None;
    }

    let operator_match = if caps.has_user_link {
        "(($1 <> '' AND LOWER(o.email) = $1) OR o.user_id = $2)"
    } else {
        "($1 <> '' AND LOWER(o.email) = $1)"
    };

    // Most recent assignment wins, highest id as tiebreak
    let order = if caps.has_window {
        "ap.started_at DESC NULLS LAST, ap.id DESC"
    } else {
        "ap.id DESC"
    };

    Some(format!(
        "SELECT p.id, p.code, p.alias \
         FROM operator_assignments ap \
         JOIN operators o ON o.id = ap.operator_id \
         JOIN patrols p ON p.id = ap.patrol_id \
         WHERE {} AND ({}) \
         ORDER BY {} \
         LIMIT 1",
        operator_match,
        active_conds.join(" OR "),
        order
    ))
}
