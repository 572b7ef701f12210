//! Folio Server - Book Lending Platform
//!
//! REST API server for loan lifecycle management and request fulfillment.

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use folio_server::{api, config::AppConfig, repository::Repository, services::Services, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().expect("Failed to load configuration");

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("folio_server={},tower_http=debug", config.logging.level).into());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Folio Server v{}", env!("CARGO_PKG_VERSION"));

    // Create database connection pool
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    tracing::info!("Database migrations completed");

    // Save server address before moving config
    let server_host = config.server.host.clone();
    let server_port = config.server.port;

    // Create repository and services
    let repository = Repository::new(pool);
    let services = Services::new(repository, config.email.clone())
        .expect("Failed to create services");

    // Start the reminder sweep on its timer
    let sweep = services.reminders.clone();
    let sweep_interval = config.reminders.sweep_interval_secs;
    tokio::spawn(sweep.run(sweep_interval));
    tracing::info!("Reminder sweep scheduled every {}s", sweep_interval);

    // Create application state
    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(
        server_host.parse().expect("Invalid host address"),
        server_port,
    );

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API v1 routes
    let api_v1 = Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        .route("/ready", get(api::health::readiness_check))
        // Loans
        .route("/loans", post(api::loans::borrow))
        .route("/loans/:id/approve", post(api::loans::approve))
        .route("/loans/:id/reject", post(api::loans::reject))
        .route("/loans/:id/return", post(api::loans::return_own))
        .route("/users/:id/loans", get(api::loans::get_user_loans))
        // Admin loan management
        .route("/admin/loans", post(api::loans::admin_create))
        .route("/admin/loans/:id", delete(api::loans::admin_delete))
        .route("/admin/loans/:id/return", post(api::loans::admin_return))
        .route("/admin/loans/:id/lost", post(api::loans::mark_lost))
        // Book requests
        .route("/book-requests", post(api::requests::create_request))
        .route("/book-requests", get(api::requests::list_open))
        .route("/book-requests/:id/fulfill", post(api::requests::fulfill_manually))
        .route("/books/:id/fulfill-requests", post(api::requests::auto_fulfill))
        .route("/users/:id/requests", get(api::requests::list_user_requests))
        // Settings
        .route("/settings", get(api::settings::get_settings))
        .route("/settings", put(api::settings::update_settings))
        .with_state(state.clone());

    // OpenAPI documentation
    let openapi = api::openapi::create_openapi_router();

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
