use axum::{
    extract::{DefaultBodyLimit, State},
    http::{HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Json},
    routing::{delete, get, post, put},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::handlers::{elevated, protected, public};
use crate::identity::IdentityProvider;
use crate::middleware::session_auth_middleware;
use crate::notify::MailGateway;
use crate::services::Store;

/// Shared dependencies handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub identity: Arc<dyn IdentityProvider>,
    pub mailer: Arc<dyn MailGateway>,
    pub config: Arc<AppConfig>,
}

pub fn app(state: AppState) -> Router {
    let protected = Router::new()
        .merge(session_routes())
        .merge(file_routes())
        .merge(user_routes())
        .merge(catalog_routes())
        .merge(notification_routes())
        .merge(elevated_routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            session_auth_middleware,
        ));

    let mut router = Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(auth_public_routes())
        // Protected
        .merge(protected)
        .layer(DefaultBodyLimit::max(state.config.api.max_upload_bytes))
        .layer(cors_layer(&state.config));

    if state.config.api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }

    router.with_state(state)
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    if config.is_development() || origins.is_empty() {
        return CorsLayer::permissive();
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

fn auth_public_routes() -> Router<AppState> {
    Router::new().route("/auth/ug", post(public::ug_login))
}

fn session_routes() -> Router<AppState> {
    use protected::session;

    Router::new()
        .route("/api/auth/whoami", get(session::whoami))
        .route("/api/permissions/modules", get(session::module_permissions))
}

fn file_routes() -> Router<AppState> {
    use protected::files;

    Router::new()
        .route("/upload", post(files::upload))
        .route("/files", get(files::list))
        .route("/download/:id", get(files::download))
        .route("/delete/by-name/:filename", delete(files::delete_by_name))
}

fn user_routes() -> Router<AppState> {
    use protected::users;

    Router::new()
        .route("/usuarios", get(users::list).post(users::create))
        .route("/usuarios/:id", get(users::show).put(users::update))
}

fn catalog_routes() -> Router<AppState> {
    use protected::catalogs;

    Router::new()
        .route("/api/roles", get(catalogs::roles))
        .route(
            "/api/facultades",
            get(catalogs::faculties).post(catalogs::create_faculty),
        )
        .route(
            "/api/facultades/:cod",
            put(catalogs::update_faculty).delete(catalogs::delete_faculty),
        )
        .route(
            "/api/carreras/:cod",
            get(catalogs::careers)
                .put(catalogs::update_career)
                .delete(catalogs::delete_career),
        )
        .route("/api/carreras", post(catalogs::create_career))
}

fn notification_routes() -> Router<AppState> {
    use protected::{authority, email, templates};

    Router::new()
        .route("/plantillas", get(templates::show).post(templates::update))
        .route("/plantillas/tipos", get(templates::kinds))
        .route(
            "/correo-autoridad",
            get(authority::show).post(authority::update),
        )
        .route("/send-email", post(email::send))
}

fn elevated_routes() -> Router<AppState> {
    Router::new().route("/debug/files", get(elevated::storage::debug_files))
}

async fn root(State(state): State<AppState>) -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "FACAF API",
            "version": version,
            "description": "Role-based administrative backend for FACAF",
            "environment": format!("{:?}", state.config.environment),
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "auth": "/auth/ug (public - token acquisition), /api/auth/whoami",
                "files": "/upload, /files, /download/:id, /delete/by-name/:filename",
                "users": "/usuarios[/:id]",
                "catalogs": "/api/roles, /api/facultades[/:cod], /api/carreras[/:cod]",
                "notifications": "/plantillas[/tipos], /correo-autoridad, /send-email",
                "permissions": "/api/permissions/modules",
                "debug": "/debug/files (admin)",
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();
    let backend = state.store.backend();

    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok",
                    "backend": backend
                }
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "code": "SERVICE_UNAVAILABLE",
                    "data": {
                        "status": "degraded",
                        "timestamp": now,
                        "backend": backend
                    }
                })),
            )
        }
    }
}
