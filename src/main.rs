use authz_core::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    repository::{PostgresRepository, RepositoryState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, initializes logging, connects to Postgres, wires the services
/// and serves HTTP.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (Fail-Fast)
    dotenv::dotenv().ok();

    // 2. Logging Filter Setup
    // RUST_LOG wins; otherwise debug for this crate and info for the HTTP layer.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "authz_core=debug,tower_http=info".into());

    // APP_ENV is read ahead of the full config so the log format is settled before
    // `AppConfig::load` can emit its own warnings.
    let env = match std::env::var("APP_ENV").as_deref() {
        Ok("production") => Env::Production,
        _ => Env::Local,
    };

    // 3. Initialize Logging based on Environment
    match env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    let config = AppConfig::load();
    tracing::info!("Application starting in {:?} mode", config.env);

    // 4. Database Initialization (Postgres)
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    // 5. Unified State Assembly
    let port = config.port;
    let app_state =
        AppState::new(repo, config).expect("FATAL: Failed to initialize token codec. Check JWT_SECRET.");

    // 6. Router and Server Startup
    let app = create_router(app_state);

    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("FATAL: Failed to bind {addr}: {e}"));

    tracing::info!("Listening on {addr}");
    tracing::info!("OpenAPI document available at: http://localhost:{port}/api-docs/openapi.json");

    axum::serve(listener, app).await.expect("HTTP server error");
}
