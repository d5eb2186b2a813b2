use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::database::models::PublicUser;
use crate::database::schema::ALLOWED_ROLE_CODES;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::user_service::normalize_role_codes;
use crate::types::Paginated;
use crate::AppState;

use super::require_admin;

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    pub page: Option<i64>,
    pub size: Option<i64>,
    pub q: Option<String>,
}

/// GET /api/users - admin listing, q matches email/full_name/badge
pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<UserListQuery>,
) -> ApiResult<Paginated<PublicUser>> {
    require_admin(&state, &auth).await?;

    let data = state
        .users
        .list_users(
            query.page.unwrap_or(1),
            query.size.unwrap_or(10),
            query.q.as_deref().unwrap_or(""),
        )
        .await?;
    Ok(ApiResponse::success(data))
}

/// GET /api/users/roles - role catalog for the admin frontend
pub async fn list_roles(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Value> {
    require_admin(&state, &auth).await?;

    // Catalog from the database, falling back to the built-in set
    let mut codes = state
        .users
        .all_role_codes()
        .await
        .unwrap_or_else(|_| ALLOWED_ROLE_CODES.iter().map(|c| c.to_string()).collect());
    codes.sort();
    Ok(ApiResponse::success(json!({ "roles": codes })))
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub is_active: Option<bool>,
    pub full_name: Option<String>,
    pub badge: Option<String>,
    pub roles: Option<Vec<String>>,
}

/// POST /api/users - admin create, optionally with roles
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<Value> {
    require_admin(&state, &auth).await?;

    let email = req.email.as_deref().map(str::trim).unwrap_or_default().to_lowercase();
    let password = req.password.as_deref().unwrap_or_default();
    if email.is_empty() || password.is_empty() {
        return Err(ApiError::bad_request("email and password are required"));
    }

    // Reject unknown roles before touching the users table
    if let Some(roles) = &req.roles {
        let (_, invalid) = normalize_role_codes(roles);
        if !invalid.is_empty() {
            return Err(ApiError::bad_request(format!("Invalid roles: {:?}", invalid)));
        }
    }

    if state.users.get_by_email(&email).await?.is_some() {
        return Err(ApiError::conflict("Email already exists"));
    }

    // Badge arrives uppercased; validation happens in the service
    let badge = req.badge.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let badge_upper = badge.map(|b| b.to_uppercase());

    let user = state
        .users
        .create_user(
            &email,
            password,
            req.is_active.unwrap_or(true),
            req.full_name.as_deref().map(str::trim).filter(|s| !s.is_empty()),
            badge_upper.as_deref(),
        )
        .await?;

    if let Some(roles) = &req.roles {
        state.users.set_roles(user.id, roles).await?;
    }

    let public = state
        .users
        .get_public(user.id)
        .await?
        .ok_or_else(|| ApiError::internal_server_error("User vanished after create"))?;
    Ok(ApiResponse::created(json!({ "user": public })))
}

/// GET /api/users/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Value> {
    require_admin(&state, &auth).await?;

    let user = state
        .users
        .get_public(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(ApiResponse::success(json!({ "user": user })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub is_active: Option<bool>,
    pub full_name: Option<String>,
    pub badge: Option<String>,
    pub roles: Option<Vec<String>>,
}

/// PUT /api/users/:id - partial update, optionally replacing roles
pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<Value> {
    require_admin(&state, &auth).await?;

    let email = req
        .email
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase());

    // Email change must not collide with another account
    if let Some(email) = &email {
        if let Some(existing) = state.users.get_by_email(email).await? {
            if existing.id != id {
                return Err(ApiError::conflict("Email already exists"));
            }
        }
    }

    let badge = req
        .badge
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|b| b.to_uppercase());

    let updated = state
        .users
        .update_user(
            id,
            email.as_deref(),
            req.password.as_deref().filter(|s| !s.is_empty()),
            req.is_active,
            req.full_name.as_deref().map(str::trim).filter(|s| !s.is_empty()),
            badge.as_deref(),
        )
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if let Some(roles) = &req.roles {
        state.users.set_roles(updated.id, roles).await?;
    }

    let public = state
        .users
        .get_public(updated.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(ApiResponse::success(json!({ "user": public })))
}

/// DELETE /api/users/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Value> {
    require_admin(&state, &auth).await?;

    if !state.users.delete_user(id).await? {
        return Err(ApiError::not_found("User not found"));
    }
    Ok(ApiResponse::success(json!({ "deleted": true })))
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub password: Option<String>,
}

/// PUT /api/users/:id/password - owner or admin
pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<Value> {
    if auth.user_id != id {
        require_admin(&state, &auth).await?;
    }

    let password = req.password.as_deref().unwrap_or_default();
    if password.is_empty() {
        return Err(ApiError::bad_request("password is required"));
    }

    state
        .users
        .update_user(id, None, Some(password), None, None, None)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(ApiResponse::success(json!({ "changed": true })))
}

#[derive(Debug, Deserialize)]
pub struct SetRolesRequest {
    pub roles: Option<Vec<String>>,
}

/// PUT /api/users/:id/roles - replace the role set
pub async fn set_roles(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(req): Json<SetRolesRequest>,
) -> ApiResult<Value> {
    require_admin(&state, &auth).await?;

    let roles = req
        .roles
        .ok_or_else(|| ApiError::bad_request("roles must be an array of strings"))?;

    if state.users.get_by_id(id).await?.is_none() {
        return Err(ApiError::not_found("User not found"));
    }

    state.users.set_roles(id, &roles).await?;

    let public = state
        .users
        .get_public(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(ApiResponse::success(json!({ "user": public })))
}
