pub mod api;
pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod services;
pub mod types;

use sqlx::PgPool;

use crate::database::schema::LegacyCapabilities;
use crate::services::{
    AssignmentResolver, AssignmentService, LocationService, PatrolService, UserService,
};

/// Application state built once at startup and handed to every request
/// handler via axum's State extractor. Services share the pool by clone;
/// no service holds a connection outside its own operations.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub users: UserService,
    pub patrols: PatrolService,
    pub assignments: AssignmentService,
    pub locations: LocationService,
    pub resolver: AssignmentResolver,
}

impl AppState {
    pub fn new(pool: PgPool, legacy: LegacyCapabilities) -> Self {
        Self {
            users: UserService::new(pool.clone()),
            patrols: PatrolService::new(pool.clone()),
            assignments: AssignmentService::new(pool.clone()),
            locations: LocationService::new(pool.clone()),
            resolver: AssignmentResolver::new(pool.clone(), legacy),
            pool,
        }
    }
}
