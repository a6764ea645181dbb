use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::{json, Map, Value};

/// Wrapper for API responses that automatically adds the success envelope.
///
/// Object payloads are merged into the envelope next to `success` and
/// `message`; anything else is placed under `data`.
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub message: String,
    pub data: T,
    pub status_code: Option<StatusCode>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a successful API response with default 200 status
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            data,
            status_code: None,
        }
    }

    /// Create an API response with custom status code
    pub fn with_status(message: impl Into<String>, data: T, status_code: StatusCode) -> Self {
        Self {
            message: message.into(),
            data,
            status_code: Some(status_code),
        }
    }

    /// Create a 201 Created response
    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self::with_status(message, data, StatusCode::CREATED)
    }
}

impl ApiResponse<Empty> {
    /// Envelope with only `success` and `message`.
    pub fn message(message: impl Into<String>) -> Self {
        Self::success(message, Empty {})
    }
}

/// Payload for responses that carry nothing besides the message.
#[derive(Debug, Serialize)]
pub struct Empty {}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status_code.unwrap_or(StatusCode::OK);

        let data_value = match serde_json::to_value(&self.data) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("Failed to serialize response data: {}", e);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "success": false,
                        "message": "Failed to serialize response data",
                        "error": "INTERNAL_SERVER_ERROR"
                    })),
                )
                    .into_response();
            }
        };

        let mut envelope = Map::new();
        envelope.insert("success".to_string(), Value::Bool(true));
        envelope.insert("message".to_string(), Value::String(self.message));
        match data_value {
            Value::Object(fields) => {
                for (key, value) in fields {
                    envelope.entry(key).or_insert(value);
                }
            }
            Value::Null => {}
            other => {
                envelope.insert("data".to_string(), other);
            }
        }

        (status, Json(Value::Object(envelope))).into_response()
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, crate::error::ApiError>;
