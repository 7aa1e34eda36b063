//! PassFlow Gateway
//!
//! Main entry point: wire the sensor link, control bus, recorders and
//! stores, then run until interrupted.

use passflow_gateway::{
    audit_log::AuditLog,
    message_bus::MessageBus,
    sensor_control::{CommandDispatcher, SensorControl},
    settings_store::SettingsStore,
    state::AppConfig,
    video_control::VideoControl,
};
use sqlx::mysql::MySqlPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "passflow_gateway=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting PassFlow Gateway v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::from_env()?;
    tracing::info!(
        video_root = %config.video_root.display(),
        extract_jobs = config.extract_jobs,
        "Configuration loaded"
    );

    // Create database pool; settings are mandatory, so failure here aborts
    let pool = MySqlPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&config.database_url)
        .await?;
    tracing::info!("Database connected");

    let settings_store = Arc::new(SettingsStore::load(pool.clone()).await?);
    let settings = settings_store.settings().await;

    let (audit, audit_writer) = AuditLog::start(pool.clone());
    tracing::info!("AuditLog initialized");

    let bus = Arc::new(MessageBus::new());
    let dispatcher = Arc::new(CommandDispatcher::new());

    let video_control = Arc::new(
        VideoControl::from_settings(&settings, &config, bus.clone(), audit.clone()).await?,
    );
    tracing::info!("VideoControl initialized");

    let sensor_control = Arc::new(
        SensorControl::initialize(
            &config,
            &settings,
            bus.clone(),
            dispatcher.clone(),
            audit.clone(),
        )
        .await?,
    );
    tracing::info!("SensorControl initialized");

    // Start components
    video_control.start().await;
    sensor_control.start().await;
    tracing::info!("PassFlow Gateway running, Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");

    // Sensor side first so no new requests reach the bus, then video
    sensor_control.stop().await;
    video_control.stop().await;

    // Every sink clone is gone after the components drop; the writer task
    // then drains the queue and exits
    drop(sensor_control);
    drop(video_control);
    drop(audit);
    if tokio::time::timeout(Duration::from_secs(5), audit_writer)
        .await
        .is_err()
    {
        tracing::warn!("Audit writer did not drain in time");
    }

    tracing::info!("PassFlow Gateway stopped");
    Ok(())
}
