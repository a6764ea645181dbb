use axum::{
    body::{to_bytes, Body, Bytes},
    extract::{FromRequest, Multipart, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::auth::TokenIssuer;
use crate::database::models::Profile;
use crate::database::{DatabaseError, Repository};
use crate::error::ApiError;
use crate::state::AppState;
use crate::types::{Role, RoleSet};

static BEARER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*Bearer\s+").unwrap());

/// Caller resolved by the authorization pipeline, available to handlers as an
/// `Extension<AuthContext>`.
#[derive(Clone, Debug)]
pub struct AuthContext {
    pub uid: String,
    pub profile: Profile,
}

impl AuthContext {
    pub fn role(&self) -> Role {
        self.profile.role
    }

    /// Administrators act on anyone, everyone else only on themselves.
    pub fn may_act_on(&self, target_uid: &str) -> bool {
        self.profile.is_admin() || self.uid == target_uid
    }
}

#[derive(Debug, Error)]
pub enum AuthFailure {
    #[error("Authentication token required")]
    Unauthenticated,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Token does not belong to a registered user")]
    UnknownSubject,

    #[error("Account is deactivated")]
    AccountDeactivated,

    #[error("Role {role} is not allowed, requires one of: {allowed}")]
    Forbidden { role: Role, allowed: RoleSet },

    #[error(transparent)]
    Store(#[from] DatabaseError),
}

impl From<AuthFailure> for ApiError {
    fn from(failure: AuthFailure) -> Self {
        match failure {
            AuthFailure::Unauthenticated | AuthFailure::InvalidToken => {
                ApiError::unauthorized(failure.to_string())
            }
            AuthFailure::UnknownSubject => ApiError::bad_request(failure.to_string()),
            AuthFailure::AccountDeactivated => ApiError::account_deactivated(failure.to_string()),
            AuthFailure::Forbidden { .. } => ApiError::forbidden(failure.to_string()),
            AuthFailure::Store(e) => e.into(),
        }
    }
}

/// Strip a leading `Bearer ` scheme. Returns `None` when nothing is left.
pub fn strip_bearer(raw: &str) -> Option<&str> {
    let token = match BEARER_RE.find(raw) {
        Some(m) => &raw[m.end()..],
        None => raw,
    }
    .trim();
    (!token.is_empty()).then_some(token)
}

/// First usable token among the candidates, in priority order.
pub fn select_token<'a>(candidates: impl IntoIterator<Item = Option<&'a str>>) -> Option<&'a str> {
    candidates.into_iter().flatten().find_map(strip_bearer)
}

fn token_from_query(query: Option<&str>) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(key, _)| key == "token")
        .map(|(_, value)| value.into_owned())
}

fn token_from_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::AUTHORIZATION)?.to_str().ok()
}

enum BodyKind {
    Json,
    UrlEncoded,
    Multipart,
}

fn body_kind(headers: &HeaderMap) -> Option<BodyKind> {
    let content_type = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
    let mime = content_type.split(';').next()?.trim().to_ascii_lowercase();
    match mime.as_str() {
        "application/json" => Some(BodyKind::Json),
        "application/x-www-form-urlencoded" => Some(BodyKind::UrlEncoded),
        "multipart/form-data" => Some(BodyKind::Multipart),
        _ => None,
    }
}

async fn token_from_body(kind: &BodyKind, parts: &Parts, bytes: &Bytes) -> Option<String> {
    match kind {
        BodyKind::Json => serde_json::from_slice::<Value>(bytes)
            .ok()?
            .get("token")?
            .as_str()
            .map(str::to_string),
        BodyKind::UrlEncoded => url::form_urlencoded::parse(bytes)
            .find(|(key, _)| key == "token")
            .map(|(_, value)| value.into_owned()),
        BodyKind::Multipart => token_from_multipart(parts, bytes.clone()).await,
    }
}

/// Text field `token` of a buffered multipart body. File parts are skipped
/// unread; a malformed body yields no token and is rejected later by the
/// handler's extractor.
async fn token_from_multipart(parts: &Parts, bytes: Bytes) -> Option<String> {
    let mut copy = Request::new(Body::from(bytes));
    *copy.headers_mut() = parts.headers.clone();
    // carries the router's body limit
    *copy.extensions_mut() = parts.extensions.clone();

    let mut multipart = Multipart::from_request(copy, &()).await.ok()?;
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.file_name().is_none() && field.name() == Some("token") {
            return field.text().await.ok();
        }
    }
    None
}

/// Verify the token and resolve the caller's active profile.
pub async fn resolve_caller(
    tokens: &TokenIssuer,
    users: &Repository<Profile>,
    token: Option<&str>,
) -> Result<AuthContext, AuthFailure> {
    let token = token.ok_or(AuthFailure::Unauthenticated)?;

    let claims = tokens.verify(token).map_err(|e| {
        debug!("token rejected: {}", e);
        AuthFailure::InvalidToken
    })?;

    let record = users
        .select_one(&claims.uid)
        .await?
        .ok_or(AuthFailure::UnknownSubject)?;

    if !record.data.status.is_active() {
        return Err(AuthFailure::AccountDeactivated);
    }

    Ok(AuthContext {
        uid: record.id,
        profile: record.data,
    })
}

/// Role gate: membership of any allowed role passes.
pub fn check_roles(context: &AuthContext, allowed: &RoleSet) -> Result<(), AuthFailure> {
    if allowed.contains(context.role()) {
        Ok(())
    } else {
        Err(AuthFailure::Forbidden {
            role: context.role(),
            allowed: allowed.clone(),
        })
    }
}

/// Authentication middleware: finds the token in body, query or header,
/// resolves the caller and injects an `AuthContext` into the request.
pub async fn authenticate(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (parts, body) = request.into_parts();

    // Form bodies are buffered to look for a token, then put back
    let (body, body_token) = match body_kind(&parts.headers) {
        Some(kind) => {
            let bytes = to_bytes(body, state.config.api.max_request_size_bytes)
                .await
                .map_err(|_| ApiError::payload_too_large("Request body is too large"))?;
            let token = token_from_body(&kind, &parts, &bytes).await;
            (Body::from(bytes), token)
        }
        None => (body, None),
    };

    let query_token = token_from_query(parts.uri.query());
    let token = select_token([
        body_token.as_deref(),
        query_token.as_deref(),
        token_from_header(&parts.headers),
    ]);

    let context = resolve_caller(&state.tokens, state.users.repository(), token)
        .await
        .map_err(|failure| {
            warn!("{} {} rejected: {}", parts.method, parts.uri.path(), failure);
            ApiError::from(failure)
        })?;

    debug!("authenticated {} as {}", context.uid, context.role());

    let mut request = Request::from_parts(parts, body);
    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

/// Role-gate middleware, layered inside `authenticate`.
pub async fn require_roles(
    State(allowed): State<RoleSet>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let context = request
        .extensions()
        .get::<AuthContext>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    check_roles(context, &allowed).map_err(|failure| {
        warn!("{} {} rejected for {}: {}", request.method(), request.uri().path(), context.uid, failure);
        ApiError::from(failure)
    })?;

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{MemoryStore, USERS};
    use crate::types::AccountState;
    use chrono::{Duration, Utc};
    use std::sync::Arc;

    fn profile(role: Role, status: AccountState) -> Profile {
        Profile {
            name: "Ana".into(),
            surname: "Pérez".into(),
            email: "ana@example.com".into(),
            role,
            status,
            profile_picture: None,
            carnet: None,
            seccion_academica: None,
            seccion_tecnica: None,
            frase: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn setup() -> (TokenIssuer, Repository<Profile>) {
        let tokens = TokenIssuer::new("pipeline-secret", Duration::hours(1)).unwrap();
        let users = Repository::new(USERS, Arc::new(MemoryStore::new()));
        (tokens, users)
    }

    #[test]
    fn token_priority_and_bearer_stripping() {
        assert_eq!(select_token([Some("body"), Some("query"), Some("Bearer header")]), Some("body"));
        assert_eq!(select_token([None, Some("query"), Some("Bearer header")]), Some("query"));
        assert_eq!(select_token([None, None, Some("Bearer   header")]), Some("header"));
        // a candidate that is empty after stripping falls through
        assert_eq!(select_token([Some("Bearer "), Some(""), Some("Bearer abc")]), Some("abc"));
        assert_eq!(select_token([None, None, Some("Bearer")]), Some("Bearer"));
        assert_eq!(select_token([None, None, None]), None);
    }

    fn parts_with(content_type: &str) -> Parts {
        let (parts, _) = axum::http::Request::builder()
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::empty())
            .unwrap()
            .into_parts();
        parts
    }

    #[tokio::test]
    async fn body_token_is_read_from_json_and_forms() {
        let json = parts_with("application/json");
        let form = parts_with("application/x-www-form-urlencoded");
        let body = |raw: &'static [u8]| Bytes::from_static(raw);

        assert_eq!(
            token_from_body(&BodyKind::Json, &json, &body(br#"{"token":"abc"}"#)).await.as_deref(),
            Some("abc")
        );
        assert_eq!(token_from_body(&BodyKind::Json, &json, &body(br#"{"token":42}"#)).await, None);
        assert_eq!(
            token_from_body(&BodyKind::UrlEncoded, &form, &body(b"a=1&token=x%2By")).await.as_deref(),
            Some("x+y")
        );
        assert_eq!(token_from_query(Some("type=salon&token=q")).as_deref(), Some("q"));
    }

    #[tokio::test]
    async fn body_token_is_read_from_multipart_text_fields() {
        let parts = parts_with("multipart/form-data; boundary=XyZ");
        let raw = "--XyZ\r\n\
            Content-Disposition: form-data; name=\"photo\"; filename=\"a.png\"\r\n\
            Content-Type: image/png\r\n\r\n\
            not-really-a-png\r\n\
            --XyZ\r\n\
            Content-Disposition: form-data; name=\"token\"\r\n\r\n\
            Bearer abc\r\n\
            --XyZ--\r\n";
        let token = token_from_body(&BodyKind::Multipart, &parts, &Bytes::from(raw)).await;
        assert_eq!(token.as_deref(), Some("Bearer abc"));

        let without = "--XyZ\r\nContent-Disposition: form-data; name=\"frase\"\r\n\r\nhola\r\n--XyZ--\r\n";
        assert_eq!(token_from_body(&BodyKind::Multipart, &parts, &Bytes::from(without)).await, None);
        assert_eq!(token_from_body(&BodyKind::Multipart, &parts, &Bytes::from("garbage")).await, None);
    }

    #[tokio::test]
    async fn pipeline_failures_in_order() {
        let (tokens, users) = setup();

        assert!(matches!(resolve_caller(&tokens, &users, None).await, Err(AuthFailure::Unauthenticated)));
        assert!(matches!(
            resolve_caller(&tokens, &users, Some("not-a-jwt")).await,
            Err(AuthFailure::InvalidToken)
        ));

        let orphan = tokens.issue("ghost").unwrap();
        assert!(matches!(
            resolve_caller(&tokens, &users, Some(&orphan)).await,
            Err(AuthFailure::UnknownSubject)
        ));

        users.insert(Some("u1"), &profile(Role::User, AccountState::Deactivated)).await.unwrap();
        let token = tokens.issue("u1").unwrap();
        assert!(matches!(
            resolve_caller(&tokens, &users, Some(&token)).await,
            Err(AuthFailure::AccountDeactivated)
        ));
    }

    #[tokio::test]
    async fn role_gate_is_set_membership() {
        let (tokens, users) = setup();
        users.insert(Some("u1"), &profile(Role::User, AccountState::Active)).await.unwrap();
        let token = tokens.issue("u1").unwrap();

        let context = resolve_caller(&tokens, &users, Some(&token)).await.unwrap();
        assert_eq!(context.uid, "u1");
        assert!(check_roles(&context, &RoleSet::any_role()).is_ok());
        assert!(matches!(check_roles(&context, &RoleSet::admin()), Err(AuthFailure::Forbidden { .. })));
        assert!(context.may_act_on("u1"));
        assert!(!context.may_act_on("u2"));
    }

    #[test]
    fn failures_map_to_status_codes() {
        use axum::http::StatusCode;
        assert_eq!(ApiError::from(AuthFailure::InvalidToken).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::from(AuthFailure::UnknownSubject).status_code(), StatusCode::BAD_REQUEST);
        let err = ApiError::from(AuthFailure::AccountDeactivated);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_code(), "ACCOUNT_DEACTIVATED");
    }
}
