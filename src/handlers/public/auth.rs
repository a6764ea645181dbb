// handlers/public/auth.rs - POST /auth/register, POST /auth/login

use axum::extract::State;
use serde::Serialize;

use crate::middleware::{ApiResponse, ApiResult, FormPayload};
use crate::services::user_service::RegisteredUser;
use crate::services::{LoginOutcome, Registration};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetails<T> {
    pub user_details: T,
}

/**
 * POST /auth/register - Create an account and its profile
 *
 * Accepts multipart (file field `profilePicture`), JSON or urlencoded bodies.
 * `nombre` / `apellido` are accepted in place of `name` / `surname`.
 *
 * Expected Output (201):
 * ```json
 * {
 *   "success": true,
 *   "message": "User created successfully",
 *   "userDetails": { "uid": "...", "name": "Ana", "email": "ana@example.com", "profilePicture": "https://..." }
 * }
 * ```
 */
pub async fn register(
    State(state): State<AppState>,
    mut form: FormPayload,
) -> ApiResult<UserDetails<RegisteredUser>> {
    let registration = Registration {
        name: form.text_any(&["name", "nombre"]),
        surname: form.text_any(&["surname", "apellido"]),
        email: form.owned("email"),
        password: form.owned("password"),
        carnet: form.owned("carnet"),
        seccion_academica: form.owned("seccionAcademica"),
        seccion_tecnica: form.owned("seccionTecnica"),
        frase: form.owned("frase"),
        picture: form.take_file("profilePicture"),
    };

    let created = state.users.register(registration).await?;
    Ok(ApiResponse::created(
        "User created successfully",
        UserDetails { user_details: created },
    ))
}

/**
 * POST /auth/login - Verify credentials and issue a session token
 *
 * Expected Input: `{ "email": "...", "password": "..." }`
 *
 * Expected Output:
 * ```json
 * {
 *   "success": true,
 *   "message": "Login successful",
 *   "userDetails": { "token": "eyJ...", "uid": "...", "role": "USER", "name": "Ana", "surname": "Pérez", "profilePicture": null }
 * }
 * ```
 */
pub async fn login(
    State(state): State<AppState>,
    form: FormPayload,
) -> ApiResult<UserDetails<LoginOutcome>> {
    let outcome = state
        .users
        .login(form.text("email"), form.text("password"))
        .await?;

    Ok(ApiResponse::success(
        "Login successful",
        UserDetails { user_details: outcome },
    ))
}
