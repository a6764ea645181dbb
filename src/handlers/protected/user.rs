// handlers/protected/user.rs - GET /user/:userId, PUT /user/updateUser/:userId

use axum::extract::{Path, State};
use axum::Extension;
use serde::Serialize;
use tracing::warn;

use crate::database::models::ProfileView;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthContext, FormPayload};
use crate::services::UserUpdate;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UserBody {
    pub user: ProfileView,
}

/// GET /user/:userId - full profile of one user
pub async fn get(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<UserBody> {
    let user = state.users.get(&user_id).await?;
    Ok(ApiResponse::success("User found", UserBody { user }))
}

/**
 * PUT /user/updateUser/:userId - Replace a profile's editable fields
 *
 * Multipart (file field `profilePicture`), JSON or urlencoded. `name`,
 * `surname`, `email`, `carnet`, `seccionAcademica`, `seccionTecnica` and
 * `frase` are required. Only administrators may send `role` and `status`.
 * Without a new picture the stored one is kept.
 */
pub async fn update(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthContext>,
    Path(user_id): Path<String>,
    mut form: FormPayload,
) -> ApiResult<UserBody> {
    if !caller.may_act_on(&user_id) {
        warn!("user {} tried to update profile {}", caller.uid, user_id);
        return Err(ApiError::forbidden("You can only update your own profile"));
    }

    let update = UserUpdate {
        name: form.text_any(&["name", "nombre"]),
        surname: form.text_any(&["surname", "apellido"]),
        email: form.owned("email"),
        carnet: form.owned("carnet"),
        seccion_academica: form.owned("seccionAcademica"),
        seccion_tecnica: form.owned("seccionTecnica"),
        frase: form.owned("frase"),
        role: form.owned("role"),
        status: form.owned("status"),
        picture: form.take_file("profilePicture"),
    };

    let user = state
        .users
        .update(&caller.uid, caller.role(), &user_id, update)
        .await?;
    Ok(ApiResponse::success("User updated successfully", UserBody { user }))
}
