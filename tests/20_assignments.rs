mod common;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use patrol_api_rust::database::schema;
use patrol_api_rust::services::assignment_service::AssignmentError;
use patrol_api_rust::services::{AssignmentService, PatrolService, UserService};

struct Fixture {
    pool: PgPool,
    user_id: i64,
    patrol_a: i32,
    patrol_b: i32,
}

/// Connect, ensure schema, and create one user with two patrols.
/// Returns None when no database is configured so tests can skip.
async fn setup() -> Result<Option<Fixture>> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("skipping: DATABASE_URL not set");
        return Ok(None);
    };

    let pool = PgPoolOptions::new().max_connections(5).connect(&url).await?;
    schema::ensure_schema(&pool).await?;

    let suffix = common::unique_suffix();
    let users = UserService::new(pool.clone());
    let patrols = PatrolService::new(pool.clone());

    let user = users
        .create_user(&format!("ledger-{}@test.dev", suffix), "secret", true, None, None)
        .await?;
    let patrol_a = patrols
        .create(&format!("PA-{}", suffix), Some("Alpha"), None, true)
        .await?;
    let patrol_b = patrols
        .create(&format!("PB-{}", suffix), None, None, true)
        .await?;

    Ok(Some(Fixture {
        pool,
        user_id: user.id,
        patrol_a: patrol_a.id,
        patrol_b: patrol_b.id,
    }))
}

#[tokio::test]
async fn start_then_current_round_trips() -> Result<()> {
    let Some(fx) = setup().await? else { return Ok(()) };
    let assignments = AssignmentService::new(fx.pool.clone());

    let started = assignments.start(fx.user_id, fx.patrol_a).await?;
    assert_eq!(started.user_id, fx.user_id);
    assert_eq!(started.patrol_id, fx.patrol_a);
    assert!(started.ended_at.is_none());

    let current = assignments.current(fx.user_id).await?.expect("open interval");
    assert_eq!(current.id, started.id);
    assert_eq!(current.patrol_id, fx.patrol_a);
    Ok(())
}

#[tokio::test]
async fn restart_closes_the_previous_interval() -> Result<()> {
    let Some(fx) = setup().await? else { return Ok(()) };
    let assignments = AssignmentService::new(fx.pool.clone());

    let first = assignments.start(fx.user_id, fx.patrol_a).await?;
    let second = assignments.start(fx.user_id, fx.patrol_b).await?;
    assert_eq!(second.patrol_id, fx.patrol_b);
    assert!(second.ended_at.is_none());

    // First interval is now closed, with its end no later than the new start
    let open_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM patrol_assignments WHERE user_id = $1 AND ended_at IS NULL",
    )
    .bind(fx.user_id)
    .fetch_one(&fx.pool)
    .await?;
    assert_eq!(open_count, 1);

    let first_end: Option<chrono::DateTime<chrono::Utc>> =
        sqlx::query_scalar("SELECT ended_at FROM patrol_assignments WHERE id = $1")
            .bind(first.id)
            .fetch_one(&fx.pool)
            .await?;
    let first_end = first_end.expect("first interval must be closed");
    assert!(first_end <= second.started_at);
    Ok(())
}

#[tokio::test]
async fn end_twice_reports_no_active_assignment() -> Result<()> {
    let Some(fx) = setup().await? else { return Ok(()) };
    let assignments = AssignmentService::new(fx.pool.clone());

    assignments.start(fx.user_id, fx.patrol_a).await?;
    let closed = assignments.end(fx.user_id).await?;
    assert!(closed.ended_at.is_some());

    let err = assignments.end(fx.user_id).await.unwrap_err();
    assert!(matches!(err, AssignmentError::NoActiveAssignment));
    Ok(())
}

#[tokio::test]
async fn start_with_unknown_patrol_fails() -> Result<()> {
    let Some(fx) = setup().await? else { return Ok(()) };
    let assignments = AssignmentService::new(fx.pool.clone());

    let err = assignments.start(fx.user_id, -1).await.unwrap_err();
    assert!(matches!(err, AssignmentError::PatrolNotFound(-1)));
    Ok(())
}

#[tokio::test]
async fn concurrent_starts_leave_exactly_one_open_interval() -> Result<()> {
    let Some(fx) = setup().await? else { return Ok(()) };
    let assignments = AssignmentService::new(fx.pool.clone());

    let mut handles = Vec::new();
    for i in 0..8 {
        let svc = assignments.clone();
        let patrol = if i % 2 == 0 { fx.patrol_a } else { fx.patrol_b };
        let user = fx.user_id;
        handles.push(tokio::spawn(async move { svc.start(user, patrol).await }));
    }
    for handle in handles {
        handle.await?.expect("start must serialize, not fail");
    }

    let open: Vec<(i64, chrono::DateTime<chrono::Utc>)> = sqlx::query_as(
        "SELECT id, started_at FROM patrol_assignments \
         WHERE user_id = $1 AND ended_at IS NULL",
    )
    .bind(fx.user_id)
    .fetch_all(&fx.pool)
    .await?;
    assert_eq!(open.len(), 1, "exactly one interval may stay open");

    let (survivor_id, survivor_start) = open[0];
    let closed_ends: Vec<Option<chrono::DateTime<chrono::Utc>>> = sqlx::query_scalar(
        "SELECT ended_at FROM patrol_assignments WHERE user_id = $1 AND id <> $2",
    )
    .bind(fx.user_id)
    .bind(survivor_id)
    .fetch_all(&fx.pool)
    .await?;
    assert_eq!(closed_ends.len(), 7);
    for end in closed_ends {
        let end = end.expect("every loser must be closed");
        assert!(end <= survivor_start);
    }
    Ok(())
}

#[tokio::test]
async fn history_is_newest_first_and_clamped() -> Result<()> {
    let Some(fx) = setup().await? else { return Ok(()) };
    let assignments = AssignmentService::new(fx.pool.clone());

    assignments.start(fx.user_id, fx.patrol_a).await?;
    assignments.start(fx.user_id, fx.patrol_b).await?;
    assignments.start(fx.user_id, fx.patrol_a).await?;

    let history = assignments.history(fx.user_id, 1, 500).await?;
    assert_eq!(history.size, 100, "size must clamp to 100");
    assert_eq!(history.total, 3);
    assert_eq!(history.items.len(), 3);
    for pair in history.items.windows(2) {
        assert!(pair[0].started_at >= pair[1].started_at);
    }
    // Only the newest interval is open
    assert!(history.items[0].ended_at.is_none());
    assert!(history.items[1].ended_at.is_some());
    Ok(())
}
