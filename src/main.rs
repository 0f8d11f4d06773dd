use std::sync::Arc;

use health_storage::{Catalog, Config, DirAssets, Storage};
use mimalloc::MiMalloc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = Config::load()?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.basic.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        database_url = %cfg.storage.database_url,
        database_name = %cfg.storage.database_name,
        timeout_secs = cfg.storage.timeout_secs,
        seeds_dir = %cfg.seeds.dir.display(),
        symptom_versions = ?cfg.seeds.symptom_versions,
        loglevel = %cfg.basic.loglevel
    );

    let storage = Storage::start(
        &cfg.storage,
        Catalog::standard(&cfg.seeds),
        Arc::new(DirAssets::new(cfg.seeds.dir.clone())),
        Arc::new(|| info!("configuration changed; reload pending")),
    )
    .await?;

    shutdown_signal().await;
    storage.stop().await;
    info!("Storage has shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Ctrl+C received, shutting down"),
        () = terminate => info!("SIGTERM received, shutting down"),
    }
}
