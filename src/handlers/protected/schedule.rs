// handlers/protected/schedule.rs - GET /schedule/, GET /schedule/:scheduleId

use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};

use crate::database::models::ScheduleView;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::ScheduleFilter;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(rename = "type")]
    pub schedule_type: Option<String>,
    pub jornada: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SchedulesBody {
    pub schedules: Vec<ScheduleView>,
}

#[derive(Debug, Serialize)]
pub struct ScheduleBody {
    pub schedule: ScheduleView,
}

/// GET /schedule/?type=profesor|seccion|salon&jornada=matutina|vespertina
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<SchedulesBody> {
    let filter = ScheduleFilter::parse(query.schedule_type.as_deref(), query.jornada.as_deref())?;
    let schedules = state.schedules.list(&filter).await?;
    Ok(ApiResponse::success("Schedules retrieved successfully", SchedulesBody { schedules }))
}

/// GET /schedule/:scheduleId
pub async fn get(
    State(state): State<AppState>,
    Path(schedule_id): Path<String>,
) -> ApiResult<ScheduleBody> {
    let schedule = state.schedules.get(&schedule_id).await?;
    Ok(ApiResponse::success("Schedule found", ScheduleBody { schedule }))
}
