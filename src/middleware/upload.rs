use std::collections::HashMap;

use axum::{
    async_trait,
    body::Bytes,
    extract::{multipart::MultipartError, FromRef, FromRequest, Multipart, Request},
    http::{header, StatusCode},
};
use serde_json::Value;
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;
use crate::types::UploadedFile;

/// Image types accepted for profile pictures and schedule photos.
pub const ALLOWED_IMAGE_TYPES: [&str; 3] = ["image/png", "image/jpg", "image/jpeg"];

/// Form fields that may carry a file.
pub const FILE_FIELDS: [&str; 2] = ["profilePicture", "photo"];

/// Request form decoded from multipart, JSON or urlencoded bodies.
///
/// Files are checked while they stream in: only the image types above are
/// accepted, and a file larger than the configured maximum is rejected with a
/// validation error before the handler runs. A file of exactly the maximum
/// size is accepted.
#[derive(Debug, Default)]
pub struct FormPayload {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl FormPayload {
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// First present field among `names`, for fields with legacy aliases.
    pub fn text_any(&self, names: &[&str]) -> Option<String> {
        names.iter().find_map(|name| self.text(name)).map(str::to_string)
    }

    pub fn owned(&self, name: &str) -> Option<String> {
        self.text(name).map(str::to_string)
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }

    fn insert_value(&mut self, name: String, value: Value) {
        let text = match value {
            Value::Null => return,
            Value::String(s) => s,
            other => other.to_string(),
        };
        self.fields.insert(name, text);
    }
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large("Request body is too large")
    } else {
        ApiError::bad_request(format!("Malformed multipart body: {}", err.body_text()))
    }
}

/// Read one file field chunk by chunk, stopping as soon as it exceeds `max_bytes`.
async fn read_file(
    field: &mut axum::extract::multipart::Field<'_>,
    name: &str,
    max_bytes: usize,
) -> Result<Bytes, ApiError> {
    let mut buffer: Vec<u8> = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        if buffer.len() + chunk.len() > max_bytes {
            return Err(ApiError::invalid_field(
                name,
                format!("File exceeds the maximum size of {} bytes", max_bytes),
            ));
        }
        buffer.extend_from_slice(&chunk);
    }
    Ok(Bytes::from(buffer))
}

impl FormPayload {
    async fn from_multipart(mut multipart: Multipart, max_upload_bytes: usize) -> Result<Self, ApiError> {
        let mut payload = FormPayload::default();

        while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            let Some(file_name) = field.file_name().map(str::to_string) else {
                let text = field.text().await.map_err(multipart_error)?;
                payload.fields.insert(name, text);
                continue;
            };

            if !FILE_FIELDS.contains(&name.as_str()) {
                return Err(ApiError::invalid_field(&name, "Unexpected file field"));
            }

            let content_type = field
                .content_type()
                .map(|ct| ct.to_ascii_lowercase())
                .unwrap_or_default();
            if !ALLOWED_IMAGE_TYPES.contains(&content_type.as_str()) {
                return Err(ApiError::invalid_field(
                    &name,
                    "Only image/png, image/jpg and image/jpeg files are allowed",
                ));
            }

            let bytes = read_file(&mut field, &name, max_upload_bytes).await?;
            debug!("received file field {} ({} bytes)", name, bytes.len());
            payload.files.insert(
                name,
                UploadedFile {
                    file_name,
                    content_type,
                    bytes,
                },
            );
        }

        Ok(payload)
    }

    fn from_json(bytes: &[u8]) -> Result<Self, ApiError> {
        let mut payload = FormPayload::default();
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(payload);
        }

        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {}", e)))?;
        let Value::Object(map) = value else {
            return Err(ApiError::bad_request("JSON body must be an object"));
        };
        for (name, value) in map {
            payload.insert_value(name, value);
        }
        Ok(payload)
    }

    fn from_urlencoded(bytes: &[u8]) -> Self {
        let mut payload = FormPayload::default();
        for (name, value) in url::form_urlencoded::parse(bytes) {
            payload.fields.insert(name.into_owned(), value.into_owned());
        }
        payload
    }
}

#[async_trait]
impl<S> FromRequest<S> for FormPayload
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let app = AppState::from_ref(state);
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or_default().trim().to_ascii_lowercase())
            .unwrap_or_default();

        match content_type.as_str() {
            "multipart/form-data" => {
                let multipart = Multipart::from_request(req, state)
                    .await
                    .map_err(|e| ApiError::bad_request(e.body_text()))?;
                Self::from_multipart(multipart, app.config.api.max_upload_bytes).await
            }
            "application/json" | "application/x-www-form-urlencoded" | "" => {
                let bytes = Bytes::from_request(req, state).await.map_err(|e| {
                    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                        ApiError::payload_too_large("Request body is too large")
                    } else {
                        ApiError::bad_request(e.body_text())
                    }
                })?;
                if content_type == "application/x-www-form-urlencoded" {
                    Ok(Self::from_urlencoded(&bytes))
                } else {
                    Self::from_json(&bytes)
                }
            }
            other => Err(ApiError::bad_request(format!("Unsupported content type '{}'", other))),
        }
    }
}
