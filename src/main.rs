use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use feedrank::config::Config;
use feedrank::db::Database;
use feedrank::feed::FeedService;
use feedrank::routes::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "feedrank=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path =
        std::env::var("FEEDRANK_CONFIG").unwrap_or_else(|_| "feedrank.toml".to_string());
    let config = Config::load(&config_path)?;
    info!("Loaded configuration from {}", config_path);

    // Initialize database
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| config.database_url.clone());
    let db = Database::new(&database_url).await?;
    db.initialize().await?;
    info!("Database initialized");

    let db = Arc::new(db);

    let state = Arc::new(AppState {
        feed: FeedService::new(db.clone(), db, &config),
    });
    let app = routes::router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!("Server starting on http://{}", config.bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
