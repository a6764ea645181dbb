use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use thiserror::Error;

use crate::types::RoleSet;

/// Largest image the upload extractor accepts, in bytes.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10_000_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub backend: Backend,
    pub firebase: FirebaseConfig,
    pub cloudinary: CloudinaryConfig,
    pub dependencies: DependencyConfig,
    pub access: AccessConfig,
    pub registration: RegistrationConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

/// Which collaborators back the Identity Store, Profile Store and Upload Relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Backend {
    Firebase,
    Memory,
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "firebase" => Ok(Backend::Firebase),
            "memory" => Ok(Backend::Memory),
            other => Err(format!("unknown backend '{}', expected 'firebase' or 'memory'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enable_request_logging: bool,
    pub max_request_size_bytes: usize,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirebaseConfig {
    #[serde(skip_serializing)]
    pub api_key: String,
    pub project_id: String,
    pub auth_base_url: String,
    pub firestore_base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    #[serde(skip_serializing)]
    pub api_secret: String,
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyConfig {
    pub timeout_ms: u64,
}

impl DependencyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Roles allowed to list and read schedules.
    #[serde(skip)]
    pub schedule_read_roles: Option<RoleSet>,
}

impl AccessConfig {
    pub fn schedule_readers(&self) -> RoleSet {
        self.schedule_read_roles.clone().unwrap_or_else(RoleSet::any_role)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationConfig {
    pub require_photo: bool,
}

impl AppConfig {
    /// Build configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from any key lookup. Defaults come from the
    /// environment preset selected by `APP_ENV`, then individual keys override.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup("APP_ENV").as_deref() {
            Some("production") | Some("prod") => Environment::Production,
            Some("staging") | Some("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        let config = match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_overrides(&lookup)?;

        config.validate()?;
        Ok(config)
    }

    fn with_overrides<F>(mut self, lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server
        if let Some(v) = lookup("ANUARIO_API_PORT").or_else(|| lookup("PORT")) {
            self.server.port = parse_key("PORT", &v)?;
        }

        // API overrides
        if let Some(v) = lookup("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = parse_key("API_ENABLE_REQUEST_LOGGING", &v)?;
        }
        if let Some(v) = lookup("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = parse_key("API_MAX_REQUEST_SIZE_BYTES", &v)?;
        }
        if let Some(v) = lookup("API_MAX_UPLOAD_BYTES") {
            self.api.max_upload_bytes = parse_key("API_MAX_UPLOAD_BYTES", &v)?;
        }

        // Security overrides
        if let Some(v) = lookup("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Some(v) = lookup("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = parse_key("SECURITY_JWT_EXPIRY_HOURS", &v)?;
        }
        if let Some(v) = lookup("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = parse_key("SECURITY_ENABLE_CORS", &v)?;
        }
        if let Some(v) = lookup("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Backend selection
        if let Some(v) = lookup("ANUARIO_BACKEND") {
            self.backend = v
                .parse()
                .map_err(|message| ConfigError::Invalid { key: "ANUARIO_BACKEND", message })?;
        }

        // Firebase
        if let Some(v) = lookup("API_KEY") {
            self.firebase.api_key = v;
        }
        if let Some(v) = lookup("PROJECT_ID") {
            self.firebase.project_id = v;
        }
        if let Some(v) = lookup("FIREBASE_AUTH_BASE_URL") {
            self.firebase.auth_base_url = v;
        }
        if let Some(v) = lookup("FIRESTORE_BASE_URL") {
            self.firebase.firestore_base_url = v;
        }

        // Cloudinary
        if let Some(v) = lookup("CLOUDINARY_CLOUD_NAME") {
            self.cloudinary.cloud_name = v;
        }
        if let Some(v) = lookup("CLOUDINARY_API_KEY") {
            self.cloudinary.api_key = v;
        }
        if let Some(v) = lookup("CLOUDINARY_API_SECRET") {
            self.cloudinary.api_secret = v;
        }
        if let Some(v) = lookup("CLOUDINARY_BASE_URL") {
            self.cloudinary.base_url = v;
        }

        // Dependencies
        if let Some(v) = lookup("DEPENDENCY_TIMEOUT_MS") {
            self.dependencies.timeout_ms = parse_key("DEPENDENCY_TIMEOUT_MS", &v)?;
        }

        // Access
        if let Some(v) = lookup("SCHEDULE_READ_ROLES") {
            let roles = RoleSet::parse_list(&v)
                .map_err(|message| ConfigError::Invalid { key: "SCHEDULE_READ_ROLES", message })?;
            self.access.schedule_read_roles = Some(roles);
        }

        // Registration
        if let Some(v) = lookup("REGISTRATION_REQUIRE_PHOTO") {
            self.registration.require_photo = parse_key("REGISTRATION_REQUIRE_PHOTO", &v)?;
        }

        Ok(self)
    }

    /// Refuse to start with missing secrets or credentials.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.security.jwt_secret.trim().is_empty() {
            return Err(ConfigError::Missing("JWT_SECRET"));
        }
        if self.api.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid {
                key: "API_MAX_UPLOAD_BYTES",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.dependencies.timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "DEPENDENCY_TIMEOUT_MS",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.api.max_request_size_bytes < self.api.max_upload_bytes {
            return Err(ConfigError::Invalid {
                key: "API_MAX_REQUEST_SIZE_BYTES",
                message: "must not be smaller than API_MAX_UPLOAD_BYTES".to_string(),
            });
        }

        match self.backend {
            Backend::Memory => {
                if self.environment == Environment::Production {
                    return Err(ConfigError::Invalid {
                        key: "ANUARIO_BACKEND",
                        message: "the memory backend is not allowed in production".to_string(),
                    });
                }
            }
            Backend::Firebase => {
                if self.firebase.api_key.is_empty() {
                    return Err(ConfigError::Missing("API_KEY"));
                }
                if self.firebase.project_id.is_empty() {
                    return Err(ConfigError::Missing("PROJECT_ID"));
                }
                if self.cloudinary.cloud_name.is_empty() {
                    return Err(ConfigError::Missing("CLOUDINARY_CLOUD_NAME"));
                }
                if self.cloudinary.api_key.is_empty() {
                    return Err(ConfigError::Missing("CLOUDINARY_API_KEY"));
                }
                if self.cloudinary.api_secret.is_empty() {
                    return Err(ConfigError::Missing("CLOUDINARY_API_SECRET"));
                }
            }
        }

        Ok(())
    }

    fn base(environment: Environment) -> Self {
        Self {
            environment,
            server: ServerConfig { port: 3000 },
            api: ApiConfig {
                enable_request_logging: true,
                max_request_size_bytes: 12 * 1024 * 1024, // room for a full-size image plus form fields
                max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                enable_cors: true,
                cors_origins: Vec::new(),
            },
            backend: Backend::Firebase,
            firebase: FirebaseConfig {
                api_key: String::new(),
                project_id: String::new(),
                auth_base_url: "https://identitytoolkit.googleapis.com/v1".to_string(),
                firestore_base_url: "https://firestore.googleapis.com/v1".to_string(),
            },
            cloudinary: CloudinaryConfig {
                cloud_name: String::new(),
                api_key: String::new(),
                api_secret: String::new(),
                base_url: "https://api.cloudinary.com/v1_1".to_string(),
            },
            dependencies: DependencyConfig { timeout_ms: 10_000 },
            access: AccessConfig { schedule_read_roles: None },
            registration: RegistrationConfig { require_photo: true },
        }
    }

    fn development() -> Self {
        let mut config = Self::base(Environment::Development);
        config.backend = Backend::Memory;
        config.security.jwt_expiry_hours = 24 * 7; // 1 week
        config.security.cors_origins = vec![
            "http://localhost:3000".to_string(),
            "http://localhost:5173".to_string(),
        ];
        config
    }

    fn staging() -> Self {
        let mut config = Self::base(Environment::Staging);
        config.security.cors_origins = vec!["https://staging.example.com".to_string()];
        config.dependencies.timeout_ms = 8_000;
        config
    }

    fn production() -> Self {
        let mut config = Self::base(Environment::Production);
        config.api.enable_request_logging = false;
        config.security.jwt_expiry_hours = 8;
        config.security.cors_origins = vec!["https://app.example.com".to_string()];
        config.dependencies.timeout_ms = 5_000;
        config
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

fn parse_key<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::Invalid { key, message: e.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_development_defaults_to_memory_backend() {
        let config = AppConfig::from_lookup(lookup(&[("JWT_SECRET", "dev-secret")])).unwrap();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.backend, Backend::Memory);
        assert_eq!(config.api.max_upload_bytes, 10_000_000);
        assert!(config.registration.require_photo);
        assert_eq!(config.access.schedule_readers(), RoleSet::any_role());
    }

    #[test]
    fn test_missing_jwt_secret_aborts() {
        let err = AppConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("JWT_SECRET")));
    }

    #[test]
    fn test_production_requires_firebase_credentials() {
        let err = AppConfig::from_lookup(lookup(&[
            ("APP_ENV", "production"),
            ("JWT_SECRET", "s3cret"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("API_KEY")));

        let err = AppConfig::from_lookup(lookup(&[
            ("APP_ENV", "production"),
            ("JWT_SECRET", "s3cret"),
            ("ANUARIO_BACKEND", "memory"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "ANUARIO_BACKEND", .. }));
    }

    #[test]
    fn test_env_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("JWT_SECRET", "s3cret"),
            ("PORT", "8080"),
            ("SCHEDULE_READ_ROLES", "ADMIN"),
            ("REGISTRATION_REQUIRE_PHOTO", "false"),
            ("DEPENDENCY_TIMEOUT_MS", "250"),
        ]))
        .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.access.schedule_readers(), RoleSet::admin());
        assert!(!config.registration.require_photo);
        assert_eq!(config.dependencies.timeout(), Duration::from_millis(250));

        let err = AppConfig::from_lookup(lookup(&[("JWT_SECRET", "s"), ("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));
    }

    #[test]
    fn test_zero_limits_are_rejected() {
        let err = AppConfig::from_lookup(lookup(&[("JWT_SECRET", "s"), ("DEPENDENCY_TIMEOUT_MS", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "DEPENDENCY_TIMEOUT_MS", .. }));

        let err = AppConfig::from_lookup(lookup(&[("JWT_SECRET", "s"), ("API_MAX_UPLOAD_BYTES", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "API_MAX_UPLOAD_BYTES", .. }));
    }
}
