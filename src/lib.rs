use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
    routing::get,
};
use utoipa::OpenApi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Building blocks: credential hashing, token codec, permission cache, authorizer.
pub mod authorize;
pub mod cache;
pub mod password;
pub mod token;

// Services and persistence.
pub mod permissions;
pub mod repository;
pub mod session;

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod models;

// Module for routing segregation (Public, Authenticated, Admin).
pub mod routes;
use auth::AuthUser;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use authorize::{Authorizer, BypassRole};
pub use cache::PermissionCache;
pub use config::AppConfig;
pub use error::{AuthError, AuthResult};
pub use permissions::PermissionService;
pub use repository::{PostgresRepository, Repository, RepositoryState};
pub use session::SessionService;
pub use token::{TokenCodec, TokenSettings};

/// ApiDoc
///
/// OpenAPI document for every handler decorated with `#[utoipa::path]`.
/// Served as JSON at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::login, handlers::register, handlers::refresh_token, handlers::get_me,
        handlers::grant_permission, handlers::revoke_permission
    ),
    components(
        schemas(
            models::Account, models::Role, models::Permission, models::LoginRequest,
            models::RegisterRequest, models::RefreshTokenRequest, models::LoginResponse,
            models::RefreshResponse,
        )
    ),
    tags(
        (name = "authz-core", description = "Authentication and authorization API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// The single shared container of services. Every clone shares the same store and
/// permission cache.
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    pub config: AppConfig,
    pub tokens: TokenCodec,
    pub sessions: SessionService,
    pub authorizer: Authorizer,
    pub permissions: PermissionService,
}

impl AppState {
    /// Wires every service over one store and one permission cache.
    ///
    /// Fails only if the token codec rejects the configured secret.
    pub fn new(repo: RepositoryState, config: AppConfig) -> AuthResult<Self> {
        let tokens = TokenCodec::new(TokenSettings::from_config(&config))?;
        let cache = Arc::new(PermissionCache::new(repo.clone()));
        let bypass = BypassRole::new(config.admin_role_id);

        Ok(Self {
            sessions: SessionService::new(repo.clone(), tokens.clone(), bypass),
            authorizer: Authorizer::new(cache.clone(), bypass),
            permissions: PermissionService::new(repo.clone(), cache),
            tokens,
            repo,
            config,
        })
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for TokenCodec {
    fn from_ref(app_state: &AppState) -> TokenCodec {
        app_state.tokens.clone()
    }
}

/// auth_middleware
///
/// Rejects the request with 401 before the handler runs unless `AuthUser` extracts.
/// The verified identity is stored in the request extensions, so the handler's own
/// `AuthUser` reads it back instead of verifying the token a second time.
async fn auth_middleware(auth_user: AuthUser, mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(auth_user);
    next.run(request).await
}

/// create_router
///
/// Assembles the routing structure, applies global and scoped middleware,
/// and registers the application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .merge(public::public_routes())
        // Authenticated and admin routes both require a valid access token. The
        // permission each one needs is checked inside the handler.
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .nest(
            "/admin",
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Span for `TraceLayer` carrying method, URI and the `x-request-id` so every log line
/// of one request correlates.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
