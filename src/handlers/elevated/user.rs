// handlers/elevated/user.rs - GET /user/full, DELETE /user/:userId (ADMIN)

use axum::extract::{Path, State};
use axum::Extension;
use serde::Serialize;
use tracing::info;

use crate::database::models::ProfileView;
use crate::middleware::{ApiResponse, ApiResult, AuthContext};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct FullUsers {
    pub users: Vec<ProfileView>,
}

#[derive(Debug, Serialize)]
pub struct DeactivatedUser {
    pub user: ProfileView,
}

/// GET /user/full - every profile with all of its fields
pub async fn list_full(State(state): State<AppState>) -> ApiResult<FullUsers> {
    let users = state.users.list_full().await?;
    Ok(ApiResponse::success("Users retrieved successfully", FullUsers { users }))
}

/// DELETE /user/:userId - soft delete; the profile is kept with `status: false`
/// and the credential stays in the identity provider
pub async fn deactivate(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthContext>,
    Path(user_id): Path<String>,
) -> ApiResult<DeactivatedUser> {
    let user = state.users.deactivate(&user_id).await?;
    info!("admin {} deactivated user {}", caller.uid, user_id);
    Ok(ApiResponse::success("User deactivated successfully", DeactivatedUser { user }))
}
