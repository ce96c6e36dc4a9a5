//! Herald - episode release tracker daemon
//!
//! Boot order: configuration, tracing, database, portal clients, messenger,
//! sweep scheduler, then the health endpoint server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use herald::AppState;
use herald::api;
use herald::config::Config;
use herald::db::Database;
use herald::jobs::{self, SweepService};
use herald::portal::{Portal, PortalClient};
use herald::services::telegram::{Messenger, TelegramMessenger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "herald=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Herald");

    let db = Database::connect_with_retry(&config.database_url, Duration::from_secs(5)).await;
    db.migrate().await?;
    tracing::info!("Database connected");

    let aniworld = PortalClient::new(Portal::AniWorld, &config.aniworld_base_url)?;
    let sto = PortalClient::new(Portal::Sto, &config.sto_base_url)?;
    tracing::info!(
        aniworld = %config.aniworld_base_url,
        sto = %config.sto_base_url,
        "Portal clients initialized"
    );

    let messenger: Arc<dyn Messenger> =
        Arc::new(TelegramMessenger::new(&config.telegram_bot_token));

    let sweep_service = Arc::new(SweepService::new(
        db.clone(),
        aniworld,
        sto,
        messenger,
        config.telegram_admin_chat.clone(),
        config.sweep_concurrency,
    ));

    let _scheduler = jobs::start_scheduler(sweep_service, config.sweep_interval_minutes).await?;

    let state = AppState { db };

    let app = Router::new()
        .merge(api::health::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
