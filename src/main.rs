//! slotd - device slot allocation and hit counting server
//!
//! Main entry point.

use slotd::{
    db,
    device_registry::DeviceRegistry,
    state::{AppConfig, AppState},
    user_store::UserStore,
    web_api,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slotd=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting slotd v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::default();
    tracing::info!(
        database_url = %config.database_url,
        host = %config.host,
        port = config.port,
        "Configuration loaded"
    );

    // Create database pool
    let connect_options =
        SqliteConnectOptions::from_str(&config.database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(connect_options)
        .await?;

    tracing::info!("Database connected");

    db::init_schema(&pool).await?;
    tracing::info!("Schema initialized");

    // Initialize components
    let registry = Arc::new(DeviceRegistry::new(pool.clone()));
    let users = Arc::new(UserStore::new(pool.clone()));

    // First-run bootstrap: create the initial key user from the environment
    if let (Some(username), Some(password)) = (&config.admin_user, &config.admin_password) {
        if users.bootstrap(username, password).await? {
            tracing::info!(username = %username, "Initial key user created");
        }
    } else {
        tracing::warn!("No bootstrap credentials configured (SLOTD_ADMIN_USER/SLOTD_ADMIN_PASSWORD)");
    }

    // Create application state
    let state = AppState {
        pool,
        config,
        registry,
        users,
    };

    let app = web_api::create_router(state.clone())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
