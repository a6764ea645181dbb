#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

use anuario_api::database::{DocumentStore, MemoryStore, USERS};
use anuario_api::services::{MemoryIdentity, MemoryRelay};
use anuario_api::{app, AppConfig, AppState, Collaborators, API_PREFIX};

pub const PASSWORD: &str = "Str0ng!pass";

/// The real router served on an ephemeral port, backed by in-memory
/// collaborators the test can inspect and seed.
pub struct TestServer {
    pub base_url: String,
    pub client: Client,
    pub store: MemoryStore,
    pub identity: MemoryIdentity,
    pub relay: MemoryRelay,
}

impl TestServer {
    pub async fn spawn() -> Result<Self> {
        Self::spawn_with(&[]).await
    }

    /// Start a server with extra configuration keys on top of the test defaults.
    pub async fn spawn_with(overrides: &[(&str, &str)]) -> Result<Self> {
        init_tracing();

        let mut env: HashMap<String, String> = [
            ("JWT_SECRET", "integration-test-secret"),
            ("ANUARIO_BACKEND", "memory"),
            ("API_ENABLE_REQUEST_LOGGING", "false"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        for (k, v) in overrides {
            env.insert(k.to_string(), v.to_string());
        }

        let config = AppConfig::from_lookup(|key| env.get(key).cloned()).context("test config")?;

        let store = MemoryStore::new();
        let identity = MemoryIdentity::new();
        let relay = MemoryRelay::new();
        let collaborators = Collaborators {
            identity: Arc::new(identity.clone()),
            store: Arc::new(store.clone()),
            relay: Arc::new(relay.clone()),
        };
        let state = AppState::with_collaborators(config, collaborators)?;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app(state)).await;
        });

        Ok(Self {
            base_url: format!("http://{}", addr),
            client: Client::new(),
            store,
            identity,
            relay,
        })
    }

    /// URL of an API route, e.g. `api("/user/")`.
    pub fn api(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, API_PREFIX, path)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Register through the HTTP API and return the new uid.
    pub async fn register(&self, email: &str) -> Result<String> {
        let res = self
            .client
            .post(self.api("/auth/register"))
            .multipart(registration_form(email)?)
            .send()
            .await?;
        let status = res.status();
        let body: Value = res.json().await?;
        anyhow::ensure!(status == StatusCode::CREATED, "register failed: {} {}", status, body);
        body["userDetails"]["uid"]
            .as_str()
            .map(str::to_string)
            .context("register response without uid")
    }

    pub async fn login(&self, email: &str) -> Result<String> {
        let res = self
            .client
            .post(self.api("/auth/login"))
            .json(&json!({ "email": email, "password": PASSWORD }))
            .send()
            .await?;
        let status = res.status();
        let body: Value = res.json().await?;
        anyhow::ensure!(status == StatusCode::OK, "login failed: {} {}", status, body);
        body["userDetails"]["token"]
            .as_str()
            .map(str::to_string)
            .context("login response without token")
    }

    /// Register and log in, returning `(uid, token)`.
    pub async fn user(&self, email: &str) -> Result<(String, String)> {
        let uid = self.register(email).await?;
        let token = self.login(email).await?;
        Ok((uid, token))
    }

    /// Register a user and grant ADMIN directly in the store.
    pub async fn admin(&self, email: &str) -> Result<(String, String)> {
        let uid = self.register(email).await?;
        let mut fields = serde_json::Map::new();
        fields.insert("role".to_string(), json!("ADMIN"));
        self.store.update_doc(USERS, &uid, fields).await?;
        let token = self.login(email).await?;
        Ok((uid, token))
    }
}

/// Server logs for failing tests, e.g. `RUST_LOG=anuario_api=debug cargo test`.
/// Every test binary shares one subscriber, so later calls are no-ops.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("off")))
        .with_test_writer()
        .try_init();
}

/// A small valid-looking PNG of exactly `len` bytes.
pub fn png(len: usize) -> Vec<u8> {
    let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
    bytes.resize(len.max(8), 0);
    bytes.truncate(len);
    bytes
}

pub fn image_part(len: usize, name: &str, mime: &str) -> Result<Part> {
    Ok(Part::bytes(png(len)).file_name(name.to_string()).mime_str(mime)?)
}

/// Registration fields shared by the helpers and tests, without the picture.
pub fn registration_fields(email: &str) -> Form {
    Form::new()
        .text("name", "Ana")
        .text("surname", "Pérez")
        .text("email", email.to_string())
        .text("password", PASSWORD)
        .text("carnet", "2024001")
        .text("seccionAcademica", "6A")
        .text("seccionTecnica", "Informática")
        .text("frase", "Hasta pronto")
}

pub fn registration_form(email: &str) -> Result<Form> {
    Ok(registration_fields(email).part("profilePicture", image_part(64, "ana.png", "image/png")?))
}

/// JSON body for a full profile update.
pub fn profile_update(email: &str, frase: &str) -> Value {
    json!({
        "name": "Ana",
        "surname": "Pérez",
        "email": email,
        "carnet": "2024001",
        "seccionAcademica": "6A",
        "seccionTecnica": "Informática",
        "frase": frase,
    })
}
