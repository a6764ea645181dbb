use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::database::Record;
use crate::types::{Jornada, ScheduleType};

/// A schedule (horario) stored at `schedules/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub title: String,
    #[serde(rename = "type")]
    pub schedule_type: ScheduleType,
    pub jornada: Jornada,
    /// Public image URL, empty when none was uploaded.
    #[serde(default)]
    pub photo: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleView {
    pub id: String,
    #[serde(flatten)]
    pub schedule: Schedule,
}

impl From<Record<Schedule>> for ScheduleView {
    fn from(record: Record<Schedule>) -> Self {
        Self {
            id: record.id,
            schedule: record.data,
        }
    }
}
