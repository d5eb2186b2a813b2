use axum::{handler::Handler, routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

use patrol_api_rust::database::{manager, schema};
use patrol_api_rust::middleware::jwt_auth_middleware;
use patrol_api_rust::{config, handlers, AppState};

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Initialize configuration (this loads the config singleton)
    let config = config::config();
    tracing::info!("Starting patrol API in {:?} mode", config.environment);

    let pool = manager::connect_pool(config)
        .await
        .expect("failed to connect to database");

    schema::ensure_schema(&pool)
        .await
        .expect("failed to ensure database schema");

    // Legacy fallback availability is decided once, here, not per request
    let legacy = schema::probe_legacy(&pool, config).await;

    let state = AppState::new(pool, legacy);
    let app = app(state);

    let bind_addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    tracing::info!("Patrol API listening on http://{}", bind_addr);

    axum::serve(listener, app).await.expect("server");
}

fn app(state: AppState) -> Router {
    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(handlers::health::health))
        .merge(auth_routes())
        .merge(user_routes())
        .merge(patrol_routes())
        .merge(assignment_routes())
        .merge(location_routes())
        .merge(mobile_routes())
        // Global middleware
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn auth_routes() -> Router<AppState> {
    use axum::routing::post;
    use patrol_api_rust::handlers::auth;

    Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route(
            "/api/auth/me",
            get(auth::me.layer(axum::middleware::from_fn(jwt_auth_middleware))),
        )
        .route(
            "/api/auth/logout",
            post(auth::logout.layer(axum::middleware::from_fn(jwt_auth_middleware))),
        )
}

fn user_routes() -> Router<AppState> {
    use axum::routing::put;
    use patrol_api_rust::handlers::users;

    Router::new()
        .route("/api/users", get(users::list).post(users::create))
        .route("/api/users/roles", get(users::list_roles))
        .route(
            "/api/users/:id",
            get(users::get).put(users::update).delete(users::delete),
        )
        .route("/api/users/:id/password", put(users::change_password))
        .route("/api/users/:id/roles", put(users::set_roles))
        .route_layer(axum::middleware::from_fn(jwt_auth_middleware))
}

fn patrol_routes() -> Router<AppState> {
    use patrol_api_rust::handlers::patrols;

    Router::new()
        .route("/api/patrols", get(patrols::list).post(patrols::create))
        .route(
            "/api/patrols/:id",
            get(patrols::get).put(patrols::update).delete(patrols::delete),
        )
        .route_layer(axum::middleware::from_fn(jwt_auth_middleware))
}

fn assignment_routes() -> Router<AppState> {
    use axum::routing::post;
    use patrol_api_rust::handlers::assignments;

    Router::new()
        .route("/api/assignments/start", post(assignments::start))
        .route("/api/assignments/end", post(assignments::end))
        .route("/api/assignments/current", get(assignments::current))
        .route("/api/assignments/mine", get(assignments::mine))
        .route_layer(axum::middleware::from_fn(jwt_auth_middleware))
}

fn location_routes() -> Router<AppState> {
    use patrol_api_rust::handlers::locations;

    // Reads stay public for the dashboard; writes require a session
    Router::new()
        .route(
            "/api/locations",
            get(locations::list)
                .post(locations::create.layer(axum::middleware::from_fn(jwt_auth_middleware))),
        )
        .route("/api/locations/geo", get(locations::geo))
        .route("/api/locations/summary", get(locations::summary))
        .route(
            "/api/locations/:id",
            get(locations::get)
                .put(locations::update.layer(axum::middleware::from_fn(jwt_auth_middleware)))
                .delete(locations::delete.layer(axum::middleware::from_fn(jwt_auth_middleware))),
        )
}

fn mobile_routes() -> Router<AppState> {
    use patrol_api_rust::handlers::mobile;

    Router::new()
        .route("/api/mobile/patrols", get(mobile::patrols))
        .route("/api/mobile/assignment", get(mobile::assignment))
        .route_layer(axum::middleware::from_fn(jwt_auth_middleware))
}

async fn root() -> Json<Value> {
    Json(json!({
        "name": "patrol-api",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
