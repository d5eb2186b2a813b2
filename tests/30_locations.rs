mod common;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use patrol_api_rust::api::geo::{BoundingBox, GeoFilters};
use patrol_api_rust::database::schema;
use patrol_api_rust::database::schema::LegacyCapabilities;
use patrol_api_rust::services::location_service::{LocationError, LocationPayload};
use patrol_api_rust::services::{
    AssignmentResolver, AssignmentService, LocationService, PatrolService, UserService,
};

struct Fixture {
    pool: PgPool,
    user_id: i64,
    user_email: String,
    patrol_aliased: i32,
    patrol_plain: i32,
}

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

    let email = format!("recorder-{}@test.dev", suffix);
    let user = users.create_user(&email, "secret", true, None, None).await?;
    let aliased = patrols
        .create(&format!("LA-{}", suffix), Some("Night Watch"), None, true)
        .await?;
    let plain = patrols
        .create(&format!("LP-{}", suffix), None, None, true)
        .await?;

    Ok(Some(Fixture {
        pool,
        user_id: user.id,
        user_email: email,
        patrol_aliased: aliased.id,
        patrol_plain: plain.id,
    }))
}

fn payload(lat: f64, lng: f64) -> LocationPayload {
    LocationPayload {
        lat: Some(lat),
        lng: Some(lng),
        ..Default::default()
    }
}

#[tokio::test]
async fn resolver_returns_none_without_any_assignment() -> Result<()> {
    let Some(fx) = setup().await? else { return Ok(()) };
    let resolver = AssignmentResolver::new(fx.pool.clone(), LegacyCapabilities::default());

    let resolved = resolver.resolve(fx.user_id, &fx.user_email).await;
    assert!(resolved.is_none());
    Ok(())
}

#[tokio::test]
async fn resolver_finds_the_open_ledger_interval() -> Result<()> {
    let Some(fx) = setup().await? else { return Ok(()) };
    let assignments = AssignmentService::new(fx.pool.clone());
    let resolver = AssignmentResolver::new(fx.pool.clone(), LegacyCapabilities::default());

    assignments.start(fx.user_id, fx.patrol_aliased).await?;
    let resolved = resolver.resolve(fx.user_id, &fx.user_email).await.expect("hit");
    assert_eq!(resolved.id, fx.patrol_aliased);
    assert_eq!(resolved.alias.as_deref(), Some("Night Watch"));
    Ok(())
}

#[tokio::test]
async fn record_without_resolution_or_patrol_id_is_unresolved() -> Result<()> {
    let Some(fx) = setup().await? else { return Ok(()) };
    let locations = LocationService::new(fx.pool.clone());

    let err = locations.record(None, &payload(1.0, 2.0)).await.unwrap_err();
    assert!(matches!(err, LocationError::UnresolvedPatrol));
    Ok(())
}

#[tokio::test]
async fn record_rejects_out_of_range_coordinates() -> Result<()> {
    let Some(fx) = setup().await? else { return Ok(()) };
    let locations = LocationService::new(fx.pool.clone());

    let mut p = payload(91.0, 0.0);
    p.patrol_id = Some(fx.patrol_plain);
    let err = locations.record(None, &p).await.unwrap_err();
    assert!(matches!(err, LocationError::OutOfRange { field: "lat", .. }));

    let mut p = payload(0.0, -180.0001);
    p.patrol_id = Some(fx.patrol_plain);
    let err = locations.record(None, &p).await.unwrap_err();
    assert!(matches!(err, LocationError::OutOfRange { field: "lng", .. }));
    Ok(())
}

#[tokio::test]
async fn record_accepts_boundary_coordinates() -> Result<()> {
    let Some(fx) = setup().await? else { return Ok(()) };
    let locations = LocationService::new(fx.pool.clone());

    let mut p = payload(90.0, 180.0);
    p.patrol_id = Some(fx.patrol_plain);
    let stored = locations.record(None, &p).await?;
    assert_eq!(stored.lat, 90.0);
    assert_eq!(stored.lng, 180.0);

    let mut p = payload(-90.0, -180.0);
    p.patrol_id = Some(fx.patrol_plain);
    assert!(locations.record(None, &p).await.is_ok());
    Ok(())
}

#[tokio::test]
async fn resolved_assignment_beats_client_supplied_patrol() -> Result<()> {
    let Some(fx) = setup().await? else { return Ok(()) };
    let assignments = AssignmentService::new(fx.pool.clone());
    let resolver = AssignmentResolver::new(fx.pool.clone(), LegacyCapabilities::default());
    let locations = LocationService::new(fx.pool.clone());

    assignments.start(fx.user_id, fx.patrol_aliased).await?;
    let resolved = resolver.resolve(fx.user_id, &fx.user_email).await;

    let mut p = payload(10.0, 20.0);
    p.patrol_id = Some(fx.patrol_plain);
    let stored = locations.record(resolved.as_ref(), &p).await?;
    assert_eq!(stored.patrol_id, Some(fx.patrol_aliased));
    // Name defaults to the resolved patrol's alias
    assert_eq!(stored.name, "Night Watch");
    Ok(())
}

#[tokio::test]
async fn name_falls_back_to_code_then_patrol_id() -> Result<()> {
    let Some(fx) = setup().await? else { return Ok(()) };
    let locations = LocationService::new(fx.pool.clone());

    // Patrol without alias: code wins
    let mut p = payload(1.0, 1.0);
    p.patrol_id = Some(fx.patrol_plain);
    let stored = locations.record(None, &p).await?;
    assert!(stored.name.starts_with("LP-"));

    // Explicit name wins over everything
    let mut p = payload(1.0, 1.0);
    p.patrol_id = Some(fx.patrol_plain);
    p.name = Some("  Custom  ".to_string());
    let stored = locations.record(None, &p).await?;
    assert_eq!(stored.name, "Custom");
    Ok(())
}

#[tokio::test]
async fn bbox_listing_filters_by_rectangle() -> Result<()> {
    let Some(fx) = setup().await? else { return Ok(()) };
    let locations = LocationService::new(fx.pool.clone());

    let mut inside = payload(10.0, 10.0);
    inside.patrol_id = Some(fx.patrol_plain);
    inside.name = Some(format!("inside-{}", fx.patrol_plain));
    let inside = locations.record(None, &inside).await?;

    let mut outside = payload(50.0, 50.0);
    outside.patrol_id = Some(fx.patrol_plain);
    let outside = locations.record(None, &outside).await?;

    let bbox = BoundingBox::parse("0,0,20,20").unwrap();
    let rows = locations.list_bbox(&bbox).await?;
    assert!(rows.iter().any(|l| l.id == inside.id));
    assert!(rows.iter().all(|l| l.id != outside.id));
    Ok(())
}

#[tokio::test]
async fn point_collection_respects_patrol_filter_and_limit() -> Result<()> {
    let Some(fx) = setup().await? else { return Ok(()) };
    let locations = LocationService::new(fx.pool.clone());

    for i in 0..3 {
        let mut p = payload(5.0 + i as f64, 5.0);
        p.patrol_id = Some(fx.patrol_plain);
        locations.record(None, &p).await?;
    }
    let mut other = payload(6.0, 6.0);
    other.patrol_id = Some(fx.patrol_aliased);
    locations.record(None, &other).await?;

    let filters = GeoFilters {
        patrol_id: Some(fx.patrol_plain),
        limit: 2,
        ..Default::default()
    };
    let rows = locations.points(&filters).await?;
    assert_eq!(rows.len(), 2, "limit applies");
    assert!(rows.iter().all(|l| l.patrol_id == Some(fx.patrol_plain)));
    // Ascending timestamp order
    for pair in rows.windows(2) {
        assert!(pair[0].updated_at <= pair[1].updated_at);
    }
    Ok(())
}

#[tokio::test]
async fn update_revalidates_and_refreshes() -> Result<()> {
    let Some(fx) = setup().await? else { return Ok(()) };
    let locations = LocationService::new(fx.pool.clone());

    let mut p = payload(1.0, 1.0);
    p.patrol_id = Some(fx.patrol_plain);
    let stored = locations.record(None, &p).await?;

    let bad = LocationPayload {
        lat: Some(90.0001),
        ..Default::default()
    };
    assert!(matches!(
        locations.update(stored.id, &bad).await.unwrap_err(),
        LocationError::OutOfRange { field: "lat", .. }
    ));

    let rename = LocationPayload {
        name: Some("Renamed".to_string()),
        active: Some(false),
        ..Default::default()
    };
    let updated = locations.update(stored.id, &rename).await?;
    assert_eq!(updated.name, "Renamed");
    assert!(!updated.is_active);
    assert!(updated.updated_at >= stored.updated_at);
    Ok(())
}
