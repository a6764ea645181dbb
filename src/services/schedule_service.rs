use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use super::validation::FieldErrors;
use super::{ServiceError, UploadRelay};
use crate::database::models::{Schedule, ScheduleView};
use crate::database::{FieldFilter, Repository};
use crate::services::relay::SCHEDULE_FOLDER;
use crate::types::{Jornada, ScheduleType, UploadedFile};

/// Schedule form. On create `title`, `type` and `jornada` are required; on
/// update any subset may be given.
#[derive(Debug, Clone, Default)]
pub struct ScheduleInput {
    pub title: Option<String>,
    pub schedule_type: Option<String>,
    pub jornada: Option<String>,
    pub photo: Option<UploadedFile>,
}

/// Optional equality filters for listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScheduleFilter {
    pub schedule_type: Option<ScheduleType>,
    pub jornada: Option<Jornada>,
}

impl ScheduleFilter {
    pub fn parse(schedule_type: Option<&str>, jornada: Option<&str>) -> Result<Self, ServiceError> {
        let mut errors = FieldErrors::new();
        let schedule_type = parse_optional(&mut errors, "type", schedule_type);
        let jornada = parse_optional(&mut errors, "jornada", jornada);
        if !errors.is_empty() {
            return Err(ServiceError::invalid_fields("Invalid schedule filter", errors));
        }
        Ok(Self { schedule_type, jornada })
    }

    fn to_filters(&self) -> Vec<FieldFilter> {
        let mut filters = Vec::new();
        if let Some(t) = self.schedule_type {
            filters.push(FieldFilter::eq("type", t.as_str()));
        }
        if let Some(j) = self.jornada {
            filters.push(FieldFilter::eq("jornada", j.as_str()));
        }
        filters
    }
}

fn parse_optional<T>(errors: &mut FieldErrors, field: &str, raw: Option<&str>) -> Option<T>
where
    T: std::str::FromStr<Err = String>,
{
    let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(message) => {
            errors.add(field, message);
            None
        }
    }
}

pub struct ScheduleService {
    relay: Arc<dyn UploadRelay>,
    schedules: Repository<Schedule>,
}

impl ScheduleService {
    pub fn new(relay: Arc<dyn UploadRelay>, schedules: Repository<Schedule>) -> Self {
        Self { relay, schedules }
    }

    pub async fn create(&self, input: ScheduleInput) -> Result<ScheduleView, ServiceError> {
        let mut errors = FieldErrors::new();
        let title = errors.require("title", input.title.as_deref());
        errors.require("type", input.schedule_type.as_deref());
        errors.require("jornada", input.jornada.as_deref());
        let schedule_type = parse_optional::<ScheduleType>(&mut errors, "type", input.schedule_type.as_deref());
        let jornada = parse_optional::<Jornada>(&mut errors, "jornada", input.jornada.as_deref());

        let (Some(schedule_type), Some(jornada)) = (schedule_type, jornada) else {
            return Err(ServiceError::invalid_fields("Missing or invalid fields", errors));
        };
        if !errors.is_empty() {
            return Err(ServiceError::invalid_fields("Missing or invalid fields", errors));
        }

        let photo = match &input.photo {
            Some(file) => self.relay.upload(SCHEDULE_FOLDER, file).await?,
            None => String::new(),
        };

        let now = Utc::now();
        let schedule = Schedule {
            title,
            schedule_type,
            jornada,
            photo,
            created_at: now,
            updated_at: now,
        };

        let id = self.schedules.insert(None, &schedule).await?;
        info!("schedule {} created", id);
        Ok(ScheduleView { id, schedule })
    }

    pub async fn list(&self, filter: &ScheduleFilter) -> Result<Vec<ScheduleView>, ServiceError> {
        let records = self.schedules.select_any(&filter.to_filters()).await?;
        Ok(records.into_iter().map(ScheduleView::from).collect())
    }

    pub async fn get(&self, id: &str) -> Result<ScheduleView, ServiceError> {
        self.schedules
            .select_one(id)
            .await?
            .map(ScheduleView::from)
            .ok_or_else(|| ServiceError::NotFound("Schedule not found".to_string()))
    }

    /// Partial update. The photo only changes when a new upload succeeds.
    pub async fn update(&self, id: &str, input: ScheduleInput) -> Result<ScheduleView, ServiceError> {
        let mut errors = FieldErrors::new();
        let title = match input.title.as_deref().map(str::trim) {
            Some("") => {
                errors.add("title", "Title cannot be empty");
                None
            }
            other => other.map(str::to_string),
        };
        let schedule_type = parse_optional::<ScheduleType>(&mut errors, "type", input.schedule_type.as_deref());
        let jornada = parse_optional::<Jornada>(&mut errors, "jornada", input.jornada.as_deref());
        if !errors.is_empty() {
            return Err(ServiceError::invalid_fields("Invalid fields", errors));
        }

        let mut record = self
            .schedules
            .select_one(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Schedule not found".to_string()))?;

        if let Some(file) = &input.photo {
            record.data.photo = self.relay.upload(SCHEDULE_FOLDER, file).await?;
        }
        if let Some(title) = title {
            record.data.title = title;
        }
        if let Some(schedule_type) = schedule_type {
            record.data.schedule_type = schedule_type;
        }
        if let Some(jornada) = jornada {
            record.data.jornada = jornada;
        }
        record.data.updated_at = Utc::now();

        self.schedules.save(id, &record.data).await?;
        info!("schedule {} updated", id);
        Ok(ScheduleView::from(record))
    }

    pub async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        if self.schedules.select_one(id).await?.is_none() {
            return Err(ServiceError::NotFound("Schedule not found".to_string()));
        }
        self.schedules.delete(id).await?;
        info!("schedule {} deleted", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{MemoryStore, SCHEDULES};
    use crate::services::MemoryRelay;
    use axum::body::Bytes;

    fn service() -> (ScheduleService, MemoryRelay) {
        let relay = MemoryRelay::new();
        let store = Arc::new(MemoryStore::new());
        let service = ScheduleService::new(Arc::new(relay.clone()), Repository::new(SCHEDULES, store));
        (service, relay)
    }

    fn input(title: &str, t: &str, j: &str) -> ScheduleInput {
        ScheduleInput {
            title: Some(title.into()),
            schedule_type: Some(t.into()),
            jornada: Some(j.into()),
            photo: None,
        }
    }

    fn photo() -> UploadedFile {
        UploadedFile {
            file_name: "horario.jpg".into(),
            content_type: "image/jpeg".into(),
            bytes: Bytes::from_static(b"jpeg"),
        }
    }

    #[tokio::test]
    async fn create_validates_enums() {
        let (service, _) = service();
        let err = service.create(input("6A", "aula", "nocturna")).await.unwrap_err();
        match err {
            ServiceError::Validation { field_errors: Some(fields), .. } => {
                assert!(fields.contains_key("type"));
                assert!(fields.contains_key("jornada"));
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let err = service.create(ScheduleInput::default()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation { .. }));
    }

    #[tokio::test]
    async fn create_without_photo_stores_empty_string() {
        let (service, _) = service();
        let created = service.create(input("6A", "seccion", "matutina")).await.unwrap();
        assert_eq!(created.schedule.photo, "");
        assert_eq!(service.get(&created.id).await.unwrap().schedule, created.schedule);
    }

    #[tokio::test]
    async fn failed_upload_keeps_previous_photo() {
        let (service, relay) = service();
        let mut first = input("6A", "seccion", "matutina");
        first.photo = Some(photo());
        let created = service.create(first).await.unwrap();
        assert!(!created.schedule.photo.is_empty());

        relay.set_failing(true);
        let update = ScheduleInput {
            title: Some("6B".into()),
            photo: Some(photo()),
            ..ScheduleInput::default()
        };
        assert!(matches!(service.update(&created.id, update).await, Err(ServiceError::Upload(_))));

        let stored = service.get(&created.id).await.unwrap();
        assert_eq!(stored.schedule.title, "6A");
        assert_eq!(stored.schedule.photo, created.schedule.photo);
    }

    #[tokio::test]
    async fn list_filters_by_type_and_jornada() {
        let (service, _) = service();
        service.create(input("Prof. López", "profesor", "matutina")).await.unwrap();
        service.create(input("6A", "seccion", "matutina")).await.unwrap();
        service.create(input("6B", "seccion", "vespertina")).await.unwrap();

        let all = service.list(&ScheduleFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);

        let filter = ScheduleFilter::parse(Some("seccion"), Some("matutina")).unwrap();
        let found = service.list(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].schedule.title, "6A");

        assert!(ScheduleFilter::parse(Some("aula"), None).is_err());
    }

    #[tokio::test]
    async fn delete_requires_existing_schedule() {
        let (service, _) = service();
        let created = service.create(input("Salón 12", "salon", "vespertina")).await.unwrap();
        service.delete(&created.id).await.unwrap();
        assert!(matches!(service.get(&created.id).await, Err(ServiceError::NotFound(_))));
        assert!(matches!(service.delete(&created.id).await, Err(ServiceError::NotFound(_))));
    }
}
