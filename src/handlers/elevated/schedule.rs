// handlers/elevated/schedule.rs - POST /schedule/, PUT|DELETE /schedule/:scheduleId (ADMIN)

use axum::extract::{Path, State};

use crate::handlers::protected::schedule::ScheduleBody;
use crate::middleware::{ApiResponse, ApiResult, Empty, FormPayload};
use crate::services::ScheduleInput;
use crate::state::AppState;

fn schedule_input(form: &mut FormPayload) -> ScheduleInput {
    ScheduleInput {
        title: form.owned("title"),
        schedule_type: form.owned("type"),
        jornada: form.owned("jornada"),
        photo: form.take_file("photo"),
    }
}

/**
 * POST /schedule/ - Create a schedule
 *
 * Multipart (file field `photo`), JSON or urlencoded with `title`,
 * `type` (profesor | seccion | salon) and `jornada` (matutina | vespertina).
 * Without a photo the stored `photo` is an empty string.
 */
pub async fn create(State(state): State<AppState>, mut form: FormPayload) -> ApiResult<ScheduleBody> {
    let schedule = state.schedules.create(schedule_input(&mut form)).await?;
    Ok(ApiResponse::created("Schedule created successfully", ScheduleBody { schedule }))
}

/// PUT /schedule/:scheduleId - partial update; the photo only changes when a
/// new one is uploaded
pub async fn update(
    State(state): State<AppState>,
    Path(schedule_id): Path<String>,
    mut form: FormPayload,
) -> ApiResult<ScheduleBody> {
    let schedule = state
        .schedules
        .update(&schedule_id, schedule_input(&mut form))
        .await?;
    Ok(ApiResponse::success("Schedule updated successfully", ScheduleBody { schedule }))
}

/// DELETE /schedule/:scheduleId - hard delete
pub async fn delete(State(state): State<AppState>, Path(schedule_id): Path<String>) -> ApiResult<Empty> {
    state.schedules.delete(&schedule_id).await?;
    Ok(ApiResponse::message("Schedule deleted successfully"))
}
