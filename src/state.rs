use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::auth::{TokenError, TokenIssuer};
use crate::config::{AppConfig, Backend};
use crate::database::{DatabaseError, DocumentStore, FirestoreStore, MemoryStore, Repository, SCHEDULES, USERS};
use crate::services::{
    CloudinaryRelay, FirebaseIdentity, IdentityError, IdentityStore, MemoryIdentity, MemoryRelay, RelayError,
    ScheduleService, UploadRelay, UserService,
};
use crate::types::RoleSet;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("token issuer: {0}")]
    Token(#[from] TokenError),

    #[error("profile store: {0}")]
    Database(#[from] DatabaseError),

    #[error("identity provider: {0}")]
    Identity(#[from] IdentityError),

    #[error("upload relay: {0}")]
    Relay(#[from] RelayError),
}

/// External systems the services talk to.
#[derive(Clone)]
pub struct Collaborators {
    pub identity: Arc<dyn IdentityStore>,
    pub store: Arc<dyn DocumentStore>,
    pub relay: Arc<dyn UploadRelay>,
}

impl Collaborators {
    pub fn memory() -> Self {
        Self {
            identity: Arc::new(MemoryIdentity::new()),
            store: Arc::new(MemoryStore::new()),
            relay: Arc::new(MemoryRelay::new()),
        }
    }

    pub fn firebase(config: &AppConfig) -> Result<Self, StateError> {
        let timeout = config.dependencies.timeout();
        Ok(Self {
            identity: Arc::new(FirebaseIdentity::new(&config.firebase, timeout)?),
            store: Arc::new(FirestoreStore::new(&config.firebase, timeout)?),
            relay: Arc::new(CloudinaryRelay::new(&config.cloudinary, timeout)?),
        })
    }
}

/// Shared, immutable application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub tokens: Arc<TokenIssuer>,
    pub users: Arc<UserService>,
    pub schedules: Arc<ScheduleService>,
}

impl AppState {
    /// Build the state with the collaborators selected by `config.backend`.
    pub fn from_config(config: AppConfig) -> Result<Self, StateError> {
        let collaborators = match config.backend {
            Backend::Firebase => Collaborators::firebase(&config)?,
            Backend::Memory => Collaborators::memory(),
        };
        info!("using {:?} backend", config.backend);
        Self::with_collaborators(config, collaborators)
    }

    pub fn with_collaborators(config: AppConfig, collaborators: Collaborators) -> Result<Self, StateError> {
        let tokens = Arc::new(TokenIssuer::from_config(&config.security)?);

        let users = UserService::new(
            Arc::clone(&collaborators.identity),
            Arc::clone(&collaborators.relay),
            Repository::new(USERS, Arc::clone(&collaborators.store)),
            Arc::clone(&tokens),
            config.registration.require_photo,
        );
        let schedules = ScheduleService::new(
            Arc::clone(&collaborators.relay),
            Repository::new(SCHEDULES, Arc::clone(&collaborators.store)),
        );

        Ok(Self {
            config: Arc::new(config),
            tokens,
            users: Arc::new(users),
            schedules: Arc::new(schedules),
        })
    }

    pub fn schedule_readers(&self) -> RoleSet {
        self.config.access.schedule_readers()
    }
}
