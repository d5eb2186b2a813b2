use axum::{extract::State, response::Json, Extension};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::{generate_jwt, Claims};
use crate::config;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// POST /api/auth/register - create an account with the default role set
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<Value> {
    let email = req.email.as_deref().map(str::trim).unwrap_or_default().to_lowercase();
    let password = req.password.as_deref().unwrap_or_default();

    if email.is_empty() || password.is_empty() {
        return Err(ApiError::bad_request("email and password are required"));
    }

    if state.users.get_by_email(&email).await?.is_some() {
        return Err(ApiError::conflict("Email already exists"));
    }

    let user = state.users.create_user(&email, password, true, None, None).await?;
    let public = user.into_public(vec![]);

    Ok(ApiResponse::created(json!({ "user": public })))
}

/// POST /api/auth/login - verify credentials and hand back a JWT
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Value> {
    let email = req.email.as_deref().map(str::trim).unwrap_or_default().to_lowercase();
    let password = req.password.as_deref().unwrap_or_default();

    if email.is_empty() || password.is_empty() {
        return Err(ApiError::bad_request("email and password are required"));
    }

    let user = state.users.get_by_email(&email).await?;
    let user = match user {
        Some(u) if u.is_active && state.users.verify_password(password, &u.password_hash) => u,
        // One message for every failure mode so credentials can't be probed
        _ => return Err(ApiError::unauthorized("Invalid credentials")),
    };

    let claims = Claims::new(user.id, user.email.clone());
    let token = generate_jwt(claims).map_err(|e| {
        tracing::error!("token generation failed: {}", e);
        ApiError::internal_server_error("Could not issue token")
    })?;

    let roles = state.users.list_role_codes(user.id).await?;
    let expires_in = config::config().security.jwt_expiry_minutes * 60;
    let public = user.into_public(roles);

    Ok(ApiResponse::success(json!({
        "token": token,
        "user": public,
        "expires_in": expires_in,
    })))
}

/// GET /api/auth/me - profile of the authenticated caller
pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Value> {
    let user = state
        .users
        .get_public(auth.user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("User no longer exists"))?;

    Ok(ApiResponse::success(json!({ "user": user })))
}

/// POST /api/auth/logout - stateless tokens, nothing to revoke server-side
pub async fn logout() -> ApiResult<Value> {
    Ok(ApiResponse::success(json!({ "logged_out": true })))
}
