pub mod identity;
pub mod relay;
pub mod schedule_service;
pub mod user_service;
pub mod validation;

use std::collections::HashMap;

use thiserror::Error;

use crate::auth::TokenError;
use crate::database::DatabaseError;
pub use identity::{FirebaseIdentity, IdentityError, IdentityStore, MemoryIdentity, NewAccount};
pub use relay::{CloudinaryRelay, MemoryRelay, RelayError, UploadRelay};
pub use schedule_service::{ScheduleFilter, ScheduleInput, ScheduleService};
pub use user_service::{LoginOutcome, Registration, UserService, UserUpdate};

/// Domain failures of the user and schedule operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{message}")]
    Validation {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Image upload failed: {0}")]
    Upload(#[from] RelayError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Token(#[from] TokenError),
}

impl ServiceError {
    pub fn invalid_fields(message: impl Into<String>, errors: validation::FieldErrors) -> Self {
        ServiceError::Validation {
            message: message.into(),
            field_errors: Some(errors.into_inner()),
        }
    }
}
