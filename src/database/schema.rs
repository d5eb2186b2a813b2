use sqlx::PgPool;
use tracing::{info, warn};

use crate::config::{AppConfig, LegacyMode};
use crate::database::manager::DatabaseError;

/// Role codes this application understands. Seeded at startup.
pub const ALLOWED_ROLE_CODES: &[&str] = &["admin", "patroller", "user"];

/// What the legacy assignment schema offers, decided once at startup.
/// The resolver consults this instead of probing the catalog per request.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyCapabilities {
    /// Both legacy tables (operators + operator_assignments) exist
    pub available: bool,
    /// operators.user_id column exists, allowing id-based matching
    pub has_user_link: bool,
    /// operator_assignments.is_active column exists
    pub has_active_flag: bool,
    /// operator_assignments.started_at column exists (time-window matching)
    pub has_window: bool,
    /// operator_assignments.ended_at column exists (bounded windows)
    pub has_window_end: bool,
}

const SCHEMA_DDL: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id            BIGSERIAL PRIMARY KEY,
        email         TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        full_name     TEXT,
        badge         TEXT,
        is_active     BOOLEAN NOT NULL DEFAULT TRUE,
        created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        CONSTRAINT ck_users_badge_format
            CHECK (badge IS NULL OR badge ~ '^[0-9]{5}-[A-Z]$')
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS ux_users_badge ON users (badge) WHERE badge IS NOT NULL",
    r#"
    CREATE TABLE IF NOT EXISTS roles (
        id   SERIAL PRIMARY KEY,
        code TEXT NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_roles (
        user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        role_id INT    NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
        PRIMARY KEY (user_id, role_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS patrols (
        id         SERIAL PRIMARY KEY,
        code       VARCHAR(50) NOT NULL UNIQUE,
        alias      VARCHAR(100),
        plate      VARCHAR(50),
        is_active  BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS patrol_assignments (
        id         BIGSERIAL PRIMARY KEY,
        user_id    BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        patrol_id  INT    NOT NULL REFERENCES patrols(id) ON DELETE CASCADE,
        started_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        ended_at   TIMESTAMPTZ
    )
    "#,
    // At most one open interval per user, enforced by the store itself
    "CREATE UNIQUE INDEX IF NOT EXISTS ux_patrol_assignments_open \
     ON patrol_assignments (user_id) WHERE ended_at IS NULL",
    "CREATE INDEX IF NOT EXISTS idx_patrol_assignments_user_started \
     ON patrol_assignments (user_id, started_at DESC)",
    r#"
    CREATE TABLE IF NOT EXISTS locations (
        id         BIGSERIAL PRIMARY KEY,
        patrol_id  INT REFERENCES patrols(id) ON DELETE SET NULL,
        name       TEXT NOT NULL,
        lat        DOUBLE PRECISION NOT NULL,
        lng        DOUBLE PRECISION NOT NULL,
        is_active  BOOLEAN NOT NULL DEFAULT TRUE,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_locations_updated ON locations (updated_at)",
];

/// Create tables and indexes if they do not exist, then seed the role catalog.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), DatabaseError> {
    for ddl in SCHEMA_DDL {
        sqlx::query(ddl).execute(pool).await?;
    }
    seed_roles(pool).await?;
    info!("Database schema ensured");
    Ok(())
}

/// Insert the known role codes. Explicit startup step, runs exactly once.
async fn seed_roles(pool: &PgPool) -> Result<(), DatabaseError> {
    for code in ALLOWED_ROLE_CODES {
        sqlx::query("INSERT INTO roles (code) VALUES ($1) ON CONFLICT (code) DO NOTHING")
            .bind(code)
            .execute(pool)
            .await?;
    }
    Ok(())
}

/// Probe the legacy assignment schema once. Any probe failure degrades to
/// "legacy unavailable" rather than failing startup.
pub async fn probe_legacy(pool: &PgPool, config: &AppConfig) -> LegacyCapabilities {
    if config.resolver.legacy_assignments == LegacyMode::Off {
        info!("Legacy assignment fallback disabled by configuration");
        return LegacyCapabilities::default();
    }

    let operators = table_exists(pool, "operators").await;
    let assignments = table_exists(pool, "operator_assignments").await;

    if !(operators && assignments) {
        info!("Legacy assignment tables not present; fallback disabled");
        return LegacyCapabilities::default();
    }

    let caps = LegacyCapabilities {
        available: true,
        has_user_link: column_exists(pool, "operators", "user_id").await,
        has_active_flag: column_exists(pool, "operator_assignments", "is_active").await,
        has_window: column_exists(pool, "operator_assignments", "started_at").await,
        has_window_end: column_exists(pool, "operator_assignments", "ended_at").await,
    };
    info!(?caps, "Legacy assignment fallback enabled");
    caps
}

async fn table_exists(pool: &PgPool, table: &str) -> bool {
    let result: Result<Option<bool>, sqlx::Error> =
        sqlx::query_scalar("SELECT to_regclass($1) IS NOT NULL")
            .bind(format!("public.{}", table))
            .fetch_one(pool)
            .await;

    match result {
        Ok(Some(exists)) => exists,
        Ok(None) => false,
        Err(e) => {
            warn!("Legacy table probe failed for {}: {}", table, e);
            false
        }
    }
}

async fn column_exists(pool: &PgPool, table: &str, column: &str) -> bool {
    let result: Result<Option<i64>, sqlx::Error> = sqlx::query_scalar(
        "SELECT 1::bigint FROM information_schema.columns \
         WHERE table_schema = 'public' AND table_name = $1 AND column_name = $2",
    )
    .bind(table)
    .bind(column)
    .fetch_optional(pool)
    .await;

    match result {
        Ok(found) => found.is_some(),
        Err(e) => {
            warn!("Legacy column probe failed for {}.{}: {}", table, column, e);
            false
        }
    }
}
