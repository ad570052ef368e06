//! API Server Entry Point
//!
//! Application entry point and server initialization.
//! Uses `anyhow` for startup errors, but application-level
//! errors should use `kernel::error::AppError`.

use audit::{AuditConfig, AuditService, Difficulty, PgAuditRepository, audit_router, spawn_sealer};
use axum::{
    Router, http,
    http::{Method, header},
};
use sqlx::postgres::PgPoolOptions;
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Re-export unified error types for use in handlers
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api=info,audit=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Database connection
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set in environment");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("../../../database/migrations")
        .run(&pool)
        .await?;

    tracing::info!("Migrations completed");

    // Audit configuration
    let audit_config = if cfg!(debug_assertions) {
        AuditConfig::development()
    } else {
        let mut config = AuditConfig::default();
        if let Ok(raw) = env::var("AUDIT_DIFFICULTY") {
            let zeros: u8 = raw.parse()?;
            // An out-of-range difficulty makes the nonce search unsatisfiable
            let difficulty = Difficulty::new(zeros).ok_or_else(|| {
                anyhow::anyhow!(
                    "AUDIT_DIFFICULTY must be between {} and {}, got {zeros}",
                    Difficulty::MIN,
                    Difficulty::MAX
                )
            })?;
            config.difficulty = difficulty.zeros();
        }
        if let Ok(batch) = env::var("AUDIT_MAX_BATCH_SIZE") {
            config.max_batch_size = batch.parse()?;
        }
        config
    };

    // Bootstrap the audit service: rehydrate the chain (or mint genesis)
    let repo = Arc::new(PgAuditRepository::new(pool.clone()));
    let persisted = repo.count_blocks().await.unwrap_or(0);
    let service = AuditService::bootstrap(repo, Arc::new(audit_config)).await?;

    let report = service.validation_report();
    tracing::info!(
        persisted_blocks = persisted,
        is_valid = report.is_valid,
        "audit chain ready"
    );

    // Timer-driven sealer runs for the process lifetime
    spawn_sealer(service.clone());

    // CORS configuration
    let frontend_origins = env::var("FRONTEND_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:40922,http://127.0.0.1:40922".to_string());

    let allowed_origins: Vec<http::HeaderValue> = frontend_origins
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]))
        .allow_credentials(true);

    // Build router
    let app = Router::new()
        .nest("/api/audit", audit_router(service))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], 31113));
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
