pub mod assignments;
pub mod auth;
pub mod health;
pub mod locations;
pub mod mobile;
pub mod patrols;
pub mod users;

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::AppState;

/// Admin gate shared by the user and patrol management handlers.
/// A missing role catalog or lookup failure means "not admin".
pub(crate) async fn require_admin(state: &AppState, auth: &AuthUser) -> Result<(), ApiError> {
    let is_admin = state.users.is_admin(auth.user_id).await.unwrap_or(false);
    if is_admin {
        Ok(())
    } else {
        Err(ApiError::forbidden("Permission denied"))
    }
}
