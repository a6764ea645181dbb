use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, error};
use uuid::Uuid;

use crate::config::FirebaseConfig;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("An account already exists for this email")]
    EmailExists,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("No account exists for this email")]
    UnknownEmail,

    #[error("Identity provider rejected the request: {0}")]
    Rejected(String),

    #[error("Identity provider timed out after {0} ms")]
    Timeout(u64),

    #[error("Identity provider request failed: {0}")]
    Transport(String),

    #[error("Identity provider returned {status}: {message}")]
    Backend { status: u16, message: String },
}

/// Account created in the identity provider. The session token is kept so the
/// account can be removed again if the profile write fails.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub uid: String,
    pub id_token: Option<String>,
}

/// Credential records (email, password) managed outside this service.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn email_exists(&self, email: &str) -> Result<bool, IdentityError>;

    async fn create_account(&self, email: &str, password: &str) -> Result<NewAccount, IdentityError>;

    /// Check a credential, returning the account uid.
    async fn verify_password(&self, email: &str, password: &str) -> Result<String, IdentityError>;

    async fn send_password_reset(&self, email: &str) -> Result<(), IdentityError>;

    async fn delete_account(&self, account: &NewAccount) -> Result<(), IdentityError>;
}

/// Firebase Authentication through the Identity Toolkit REST API.
pub struct FirebaseIdentity {
    client: Client,
    base_url: String,
    api_key: String,
    timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignUpResponse {
    local_id: String,
    id_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    local_id: String,
}

#[derive(Debug, Deserialize)]
struct CreateAuthUriResponse {
    #[serde(default)]
    registered: bool,
}

impl FirebaseIdentity {
    pub fn new(config: &FirebaseConfig, timeout: Duration) -> Result<Self, IdentityError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IdentityError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.auth_base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            timeout_ms: timeout.as_millis() as u64,
        })
    }

    async fn call(&self, method: &str, body: Value) -> Result<Value, IdentityError> {
        let url = format!("{}/accounts:{}", self.base_url, method);
        debug!("identity provider call: accounts:{}", method);

        let response = self
            .client
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let payload = response
            .json::<Value>()
            .await
            .map_err(|e| self.transport_error(e))?;

        if status.is_success() {
            return Ok(payload);
        }

        let message = payload
            .pointer("/error/message")
            .and_then(Value::as_str)
            .unwrap_or("unexpected response")
            .to_string();
        Err(map_provider_error(status.as_u16(), message))
    }

    fn transport_error(&self, err: reqwest::Error) -> IdentityError {
        if err.is_timeout() {
            IdentityError::Timeout(self.timeout_ms)
        } else {
            error!("identity provider request failed: {}", err);
            IdentityError::Transport(err.to_string())
        }
    }
}

/// Map Identity Toolkit error codes (`EMAIL_EXISTS`, `WEAK_PASSWORD : ...`).
fn map_provider_error(status: u16, message: String) -> IdentityError {
    let code = message.split([' ', ':']).next().unwrap_or_default();
    match code {
        "EMAIL_EXISTS" => IdentityError::EmailExists,
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" | "USER_DISABLED" => {
            IdentityError::InvalidCredentials
        }
        "INVALID_EMAIL" | "WEAK_PASSWORD" | "MISSING_PASSWORD" => IdentityError::Rejected(message),
        _ => IdentityError::Backend { status, message },
    }
}

#[async_trait]
impl IdentityStore for FirebaseIdentity {
    async fn email_exists(&self, email: &str) -> Result<bool, IdentityError> {
        // With email enumeration protection enabled `registered` is omitted;
        // a duplicate then surfaces as EMAIL_EXISTS from signUp.
        let payload = self
            .call(
                "createAuthUri",
                json!({ "identifier": email, "continueUri": "http://localhost" }),
            )
            .await?;
        let parsed: CreateAuthUriResponse = serde_json::from_value(payload)
            .map_err(|e| IdentityError::Transport(e.to_string()))?;
        Ok(parsed.registered)
    }

    async fn create_account(&self, email: &str, password: &str) -> Result<NewAccount, IdentityError> {
        let payload = self
            .call(
                "signUp",
                json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;
        let parsed: SignUpResponse = serde_json::from_value(payload)
            .map_err(|e| IdentityError::Transport(e.to_string()))?;
        Ok(NewAccount {
            uid: parsed.local_id,
            id_token: parsed.id_token,
        })
    }

    async fn verify_password(&self, email: &str, password: &str) -> Result<String, IdentityError> {
        let payload = self
            .call(
                "signInWithPassword",
                json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;
        let parsed: SignInResponse = serde_json::from_value(payload)
            .map_err(|e| IdentityError::Transport(e.to_string()))?;
        Ok(parsed.local_id)
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), IdentityError> {
        match self
            .call("sendOobCode", json!({ "requestType": "PASSWORD_RESET", "email": email }))
            .await
        {
            Ok(_) => Ok(()),
            Err(IdentityError::InvalidCredentials) => Err(IdentityError::UnknownEmail),
            Err(e) => Err(e),
        }
    }

    async fn delete_account(&self, account: &NewAccount) -> Result<(), IdentityError> {
        let id_token = account.id_token.as_deref().ok_or_else(|| {
            IdentityError::Rejected(format!("no session token to delete account {}", account.uid))
        })?;
        self.call("delete", json!({ "idToken": id_token })).await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct MemoryAccount {
    uid: String,
    password_hash: String,
}

/// Identity provider kept in process memory, for development and tests.
#[derive(Clone, Default)]
pub struct MemoryIdentity {
    accounts: Arc<RwLock<HashMap<String, MemoryAccount>>>,
    resets: Arc<RwLock<Vec<String>>>,
}

impl MemoryIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn account_count(&self) -> usize {
        self.accounts.read().await.len()
    }

    /// Emails a password reset was requested for, in order.
    pub async fn reset_requests(&self) -> Vec<String> {
        self.resets.read().await.clone()
    }

    fn hash(password: &str) -> String {
        format!("{:x}", Sha256::digest(password.as_bytes()))
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentity {
    async fn email_exists(&self, email: &str) -> Result<bool, IdentityError> {
        Ok(self.accounts.read().await.contains_key(email))
    }

    async fn create_account(&self, email: &str, password: &str) -> Result<NewAccount, IdentityError> {
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(email) {
            return Err(IdentityError::EmailExists);
        }

        let uid = Uuid::new_v4().simple().to_string();
        accounts.insert(
            email.to_string(),
            MemoryAccount {
                uid: uid.clone(),
                password_hash: Self::hash(password),
            },
        );
        Ok(NewAccount {
            uid,
            id_token: None,
        })
    }

    async fn verify_password(&self, email: &str, password: &str) -> Result<String, IdentityError> {
        let accounts = self.accounts.read().await;
        match accounts.get(email) {
            Some(account) if account.password_hash == Self::hash(password) => Ok(account.uid.clone()),
            _ => Err(IdentityError::InvalidCredentials),
        }
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), IdentityError> {
        if !self.accounts.read().await.contains_key(email) {
            return Err(IdentityError::UnknownEmail);
        }
        self.resets.write().await.push(email.to_string());
        Ok(())
    }

    async fn delete_account(&self, account: &NewAccount) -> Result<(), IdentityError> {
        self.accounts
            .write()
            .await
            .retain(|_, stored| stored.uid != account.uid);
        Ok(())
    }
}
