//! SiteGuard Server - always-on worksite tracking with proximity alerts

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use siteguard_server::alerts::{radio, ChannelRadioLink, InMemoryAlertBus, LoggingSound};
use siteguard_server::config::Config;
use siteguard_server::session::{SessionDeps, TrackingSession};
use siteguard_server::state::AppState;
use siteguard_server::{api, persistence};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("siteguard_server=debug".parse()?),
        )
        .init();

    tracing::info!("Starting SiteGuard Server...");

    let config = Config::from_env();
    let port = config.server_port;

    let db = persistence::init_database(&config.database_path, config.database_max_connections)
        .await?;

    let bus = Arc::new(InMemoryAlertBus::new());
    let (state, sensor_rx) = AppState::new(config.clone(), bus);
    let state = Arc::new(state.with_database(db));
    state.load_from_database().await?;

    if let Some(device_id) = config.device_id.as_deref() {
        if !state.contains_entity(device_id) {
            tracing::warn!(
                "Device {} is not registered; its location will not be published",
                device_id
            );
        }
    }

    // Radio transport; commands are logged until a wearable link is attached
    let (radio, radio_rx) = ChannelRadioLink::new(config.queue_depth);
    let radio_task = tokio::spawn(radio::run_logging_transport(radio_rx));

    let session = TrackingSession::start(
        state.clone(),
        sensor_rx,
        SessionDeps {
            radio: Arc::new(radio),
            sound: Arc::new(LoggingSound),
        },
    );

    // Build the app
    let app = api::routes()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Run server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    session.stop().await;
    // Stopping the session dropped every radio handle; the transport exits
    // once the queued commands are written.
    if let Err(err) = radio_task.await {
        tracing::error!("Radio transport ended abnormally: {}", err);
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
