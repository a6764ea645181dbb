use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::{error, info, warn};

use super::validation::{is_valid_email, normalize_email, password_problems, FieldErrors};
use super::{IdentityError, IdentityStore, ServiceError, UploadRelay};
use crate::auth::TokenIssuer;
use crate::database::models::{Profile, ProfileView, PublicProfile};
use crate::database::{FieldFilter, Fields, Repository};
use crate::services::relay::PROFILE_FOLDER;
use crate::types::{AccountState, Role, UploadedFile};

/// Registration form. Every field is optional here so that all missing ones
/// can be reported at once.
#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub name: Option<String>,
    pub surname: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub carnet: Option<String>,
    pub seccion_academica: Option<String>,
    pub seccion_tecnica: Option<String>,
    pub frase: Option<String>,
    pub picture: Option<UploadedFile>,
}

/// Profile update form.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub surname: Option<String>,
    pub email: Option<String>,
    pub carnet: Option<String>,
    pub seccion_academica: Option<String>,
    pub seccion_tecnica: Option<String>,
    pub frase: Option<String>,
    pub role: Option<String>,
    pub status: Option<String>,
    pub picture: Option<UploadedFile>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredUser {
    pub uid: String,
    pub name: String,
    pub email: String,
    pub profile_picture: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginOutcome {
    pub token: String,
    pub uid: String,
    pub role: Role,
    pub name: String,
    pub surname: String,
    pub profile_picture: Option<String>,
}

/// Account registration, login and profile lifecycle.
pub struct UserService {
    identity: Arc<dyn IdentityStore>,
    relay: Arc<dyn UploadRelay>,
    users: Repository<Profile>,
    tokens: Arc<TokenIssuer>,
    require_photo: bool,
}

impl UserService {
    pub fn new(
        identity: Arc<dyn IdentityStore>,
        relay: Arc<dyn UploadRelay>,
        users: Repository<Profile>,
        tokens: Arc<TokenIssuer>,
        require_photo: bool,
    ) -> Self {
        Self {
            identity,
            relay,
            users,
            tokens,
            require_photo,
        }
    }

    pub fn repository(&self) -> &Repository<Profile> {
        &self.users
    }

    pub async fn register(&self, form: Registration) -> Result<RegisteredUser, ServiceError> {
        let mut errors = FieldErrors::new();
        let name = errors.require("name", form.name.as_deref());
        let surname = errors.require("surname", form.surname.as_deref());
        let email = normalize_email(&errors.require("email", form.email.as_deref()));
        let carnet = errors.require("carnet", form.carnet.as_deref());
        let seccion_academica = errors.require("seccionAcademica", form.seccion_academica.as_deref());
        let seccion_tecnica = errors.require("seccionTecnica", form.seccion_tecnica.as_deref());
        let frase = errors.require("frase", form.frase.as_deref());

        // Passwords are taken verbatim, whitespace included
        let password = form.password.unwrap_or_default();
        if password.is_empty() {
            errors.add("password", "This field is required");
        } else {
            let problems = password_problems(&password);
            if !problems.is_empty() {
                errors.add("password", format!("Password must contain {}", problems.join(", ")));
            }
        }

        if !email.is_empty() && !is_valid_email(&email) {
            errors.add("email", "Invalid email format");
        }
        if self.require_photo && form.picture.is_none() {
            errors.add("profilePicture", "A profile picture is required");
        }
        if !errors.is_empty() {
            return Err(ServiceError::invalid_fields("Validation failed", errors));
        }

        if self.identity.email_exists(&email).await? {
            return Err(ServiceError::Conflict("Email is already registered".to_string()));
        }

        let profile_picture = match &form.picture {
            Some(file) => Some(self.relay.upload(PROFILE_FOLDER, file).await?),
            None => None,
        };

        let account = match self.identity.create_account(&email, &password).await {
            Ok(account) => account,
            Err(IdentityError::EmailExists) => {
                return Err(ServiceError::Conflict("Email is already registered".to_string()))
            }
            Err(IdentityError::Rejected(message)) => {
                let mut errors = FieldErrors::new();
                errors.add("password", message);
                return Err(ServiceError::invalid_fields("Validation failed", errors));
            }
            Err(e) => return Err(e.into()),
        };

        let now = Utc::now();
        let profile = Profile {
            name,
            surname,
            email,
            role: Role::User,
            status: AccountState::Active,
            profile_picture,
            carnet: Some(carnet),
            seccion_academica: Some(seccion_academica),
            seccion_tecnica: Some(seccion_tecnica),
            frase: Some(frase),
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = self.users.insert(Some(&account.uid), &profile).await {
            error!("profile write for {} failed, removing account: {}", account.uid, e);
            if let Err(rollback) = self.identity.delete_account(&account).await {
                error!("rollback of account {} failed: {}", account.uid, rollback);
            }
            return Err(e.into());
        }

        info!("registered user {}", account.uid);
        Ok(RegisteredUser {
            uid: account.uid,
            name: profile.name,
            email: profile.email,
            profile_picture: profile.profile_picture,
        })
    }

    pub async fn login(&self, email: Option<&str>, password: Option<&str>) -> Result<LoginOutcome, ServiceError> {
        let mut errors = FieldErrors::new();
        let email = normalize_email(&errors.require("email", email));
        let password = password.unwrap_or_default();
        if password.is_empty() {
            errors.add("password", "This field is required");
        }
        if !errors.is_empty() {
            return Err(ServiceError::invalid_fields("Email and password are required", errors));
        }

        let uid = match self.identity.verify_password(&email, password).await {
            Ok(uid) => uid,
            Err(IdentityError::InvalidCredentials) => {
                warn!("failed login attempt");
                return Err(ServiceError::Unauthenticated("Invalid email or password".to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let record = self
            .users
            .select_one(&uid)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User profile not found".to_string()))?;

        let token = self.tokens.issue(&uid)?;
        info!("user {} logged in", uid);

        Ok(LoginOutcome {
            token,
            uid: record.id,
            role: record.data.role,
            name: record.data.name,
            surname: record.data.surname,
            profile_picture: record.data.profile_picture,
        })
    }

    /// Active profiles with their non-sensitive fields.
    pub async fn list_public(&self) -> Result<Vec<PublicProfile>, ServiceError> {
        let records = self
            .users
            .select_any(&[FieldFilter::eq("status", AccountState::Active.is_active())])
            .await?;
        Ok(records.into_iter().map(PublicProfile::from).collect())
    }

    pub async fn list_full(&self) -> Result<Vec<ProfileView>, ServiceError> {
        let records = self.users.select_any(&[]).await?;
        Ok(records.into_iter().map(ProfileView::from).collect())
    }

    pub async fn get(&self, uid: &str) -> Result<ProfileView, ServiceError> {
        self.users
            .select_one(uid)
            .await?
            .map(ProfileView::from)
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))
    }

    /// Replace a profile's editable fields. Callers may edit themselves;
    /// administrators may edit anyone and change role and status.
    pub async fn update(
        &self,
        actor_uid: &str,
        actor_role: Role,
        target: &str,
        form: UserUpdate,
    ) -> Result<ProfileView, ServiceError> {
        let is_admin = actor_role == Role::Admin;
        if !is_admin && actor_uid != target {
            return Err(ServiceError::Forbidden("You can only update your own profile".to_string()));
        }
        if !is_admin && (form.role.is_some() || form.status.is_some()) {
            return Err(ServiceError::Forbidden(
                "Only administrators can change role or status".to_string(),
            ));
        }

        let mut errors = FieldErrors::new();
        let name = errors.require("name", form.name.as_deref());
        let surname = errors.require("surname", form.surname.as_deref());
        let email = normalize_email(&errors.require("email", form.email.as_deref()));
        let carnet = errors.require("carnet", form.carnet.as_deref());
        let seccion_academica = errors.require("seccionAcademica", form.seccion_academica.as_deref());
        let seccion_tecnica = errors.require("seccionTecnica", form.seccion_tecnica.as_deref());
        let frase = errors.require("frase", form.frase.as_deref());
        if !email.is_empty() && !is_valid_email(&email) {
            errors.add("email", "Invalid email format");
        }

        let role = match form.role.as_deref().map(str::trim) {
            Some(raw) => match raw.parse::<Role>() {
                Ok(role) => Some(role),
                Err(message) => {
                    errors.add("role", message);
                    None
                }
            },
            None => None,
        };
        let status = match form.status.as_deref().map(str::trim) {
            Some(raw) => match raw.parse::<bool>() {
                Ok(active) => Some(AccountState::from(active)),
                Err(_) => {
                    errors.add("status", "Status must be true or false");
                    None
                }
            },
            None => None,
        };

        if !errors.is_empty() {
            return Err(ServiceError::invalid_fields("Missing or invalid fields", errors));
        }

        let existing = self
            .users
            .select_one(target)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;

        let profile_picture = match &form.picture {
            Some(file) => Some(self.relay.upload(PROFILE_FOLDER, file).await?),
            None => existing.data.profile_picture,
        };

        let profile = Profile {
            name,
            surname,
            email,
            role: role.unwrap_or(existing.data.role),
            status: status.unwrap_or(existing.data.status),
            profile_picture,
            carnet: Some(carnet),
            seccion_academica: Some(seccion_academica),
            seccion_tecnica: Some(seccion_tecnica),
            frase: Some(frase),
            created_at: existing.data.created_at,
            updated_at: Utc::now(),
        };

        self.users.save(target, &profile).await?;
        info!("user {} updated by {}", target, actor_uid);

        Ok(ProfileView {
            uid: target.to_string(),
            profile,
        })
    }

    /// Soft delete: the profile is kept but marked deactivated. Repeating the
    /// call leaves the same state.
    pub async fn deactivate(&self, uid: &str) -> Result<ProfileView, ServiceError> {
        let mut record = self
            .users
            .select_one(uid)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;

        record.data.status = record.data.status.deactivate();
        record.data.updated_at = Utc::now();

        let mut fields = Fields::new();
        fields.insert("status".to_string(), json!(record.data.status));
        fields.insert("updatedAt".to_string(), json!(record.data.updated_at));
        self.users.patch(uid, fields).await?;

        info!("user {} deactivated", uid);
        Ok(ProfileView::from(record))
    }

    /// Ask the identity provider to email a reset link. Unknown addresses are
    /// answered the same way as known ones.
    pub async fn reset_password(&self, email: Option<&str>) -> Result<(), ServiceError> {
        let mut errors = FieldErrors::new();
        let email = normalize_email(&errors.require("email", email));
        if !email.is_empty() && !is_valid_email(&email) {
            errors.add("email", "Invalid email format");
        }
        if !errors.is_empty() {
            return Err(ServiceError::invalid_fields("A valid email is required", errors));
        }

        match self.identity.send_password_reset(&email).await {
            Ok(()) => info!("password reset requested"),
            Err(IdentityError::UnknownEmail) => info!("password reset requested for unknown email"),
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}
