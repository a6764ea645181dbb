// handlers/public/user.rs - GET /user/, POST /user/reset-password

use axum::extract::State;
use serde::Serialize;

use crate::database::models::PublicProfile;
use crate::middleware::{ApiResponse, ApiResult, Empty, FormPayload};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct PublicUsers {
    pub users: Vec<PublicProfile>,
}

/// GET /user/ - yearbook listing of active users, non-sensitive fields only
pub async fn list(State(state): State<AppState>) -> ApiResult<PublicUsers> {
    let users = state.users.list_public().await?;
    Ok(ApiResponse::success("Users retrieved successfully", PublicUsers { users }))
}

/// POST /user/reset-password - email a reset link; the answer does not reveal
/// whether the address is registered
pub async fn reset_password(State(state): State<AppState>, form: FormPayload) -> ApiResult<Empty> {
    state.users.reset_password(form.text("email")).await?;
    Ok(ApiResponse::message(
        "If the email is registered, a password reset link has been sent",
    ))
}
