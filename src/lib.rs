pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod services;
pub mod state;
pub mod types;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue},
    middleware::from_fn_with_state,
    response::{IntoResponse, Json},
    routing::{delete, get, post, put, MethodRouter},
    Router,
};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::config::SecurityConfig;
use crate::error::ApiError;
use crate::middleware::{authenticate, require_roles};
use crate::types::RoleSet;

pub use crate::config::AppConfig;
pub use crate::state::{AppState, Collaborators};

/// Every API route is mounted under this prefix.
pub const API_PREFIX: &str = "/anuario/v1";

/// Build the full application router.
pub fn app(state: AppState) -> Router {
    let body_limit = state.config.api.max_request_size_bytes;
    let cors = cors_layer(&state.config.security);

    let mut router = Router::new()
        .route("/health", get(health))
        .nest(API_PREFIX, api_routes(&state))
        .fallback(fallback)
        .with_state(state.clone())
        .layer(
            ServiceBuilder::new()
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    HeaderName::from_static("x-frame-options"),
                    HeaderValue::from_static("DENY"),
                ))
                .layer(DefaultBodyLimit::max(body_limit)),
        );

    if let Some(cors) = cors {
        router = router.layer(cors);
    }
    if state.config.api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }
    router
}

fn api_routes(state: &AppState) -> Router<AppState> {
    use handlers::{elevated, protected, public};

    let any_role = RoleSet::any_role();
    let admin = RoleSet::admin();
    let schedule_readers = state.schedule_readers();

    Router::new()
        // Public
        .route("/auth/register", post(public::auth::register))
        .route("/auth/login", post(public::auth::login))
        .route("/user", get(public::user::list))
        .route("/user/", get(public::user::list))
        .route("/user/reset-password", post(public::user::reset_password))
        // Admin listing
        .route("/user/full", gated(get(elevated::user::list_full), state, &admin))
        // Single user
        .route(
            "/user/:userId",
            gated(get(protected::user::get), state, &any_role)
                .merge(gated(delete(elevated::user::deactivate), state, &admin)),
        )
        .route(
            "/user/updateUser/:userId",
            gated(put(protected::user::update), state, &any_role),
        )
        // Schedules
        .route("/schedule", schedule_collection(state, &schedule_readers, &admin))
        .route("/schedule/", schedule_collection(state, &schedule_readers, &admin))
        .route(
            "/schedule/:scheduleId",
            gated(get(protected::schedule::get), state, &schedule_readers)
                .merge(gated(put(elevated::schedule::update), state, &admin))
                .merge(gated(delete(elevated::schedule::delete), state, &admin)),
        )
}

fn schedule_collection(state: &AppState, readers: &RoleSet, admin: &RoleSet) -> MethodRouter<AppState> {
    use handlers::{elevated, protected};

    gated(get(protected::schedule::list), state, readers)
        .merge(gated(post(elevated::schedule::create), state, admin))
}

/// Put a route behind the authorization pipeline: `authenticate` runs first
/// and attaches the `AuthContext`, then the role gate checks it.
fn gated(route: MethodRouter<AppState>, state: &AppState, roles: &RoleSet) -> MethodRouter<AppState> {
    route
        .route_layer(from_fn_with_state(roles.clone(), require_roles))
        .route_layer(from_fn_with_state(state.clone(), authenticate))
}

fn cors_layer(security: &SecurityConfig) -> Option<CorsLayer> {
    if !security.enable_cors {
        return None;
    }
    if security.cors_origins.is_empty() {
        return Some(CorsLayer::permissive());
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    Some(
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any),
    )
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "success": true,
        "message": "ok",
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now(),
    }))
}

async fn fallback() -> ApiError {
    ApiError::not_found("Route not found")
}
