//! Health monitor (I): probes the other three services on two intervals
//! and serves the uptime rollups the gateway proxies for dashboards.

use std::sync::Arc;
use telemetry_pipeline::config::{self, MonitorConfig};
use telemetry_pipeline::db::{self, monitor_db::MonitorStore};
use telemetry_pipeline::monitor;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "monitor=info".into()))
        .init();

    info!("starting health monitor v{}", env!("CARGO_PKG_VERSION"));
    let config = MonitorConfig::default();
    let shutdown = CancellationToken::new();

    let pool = db::connect_pool(&config.postgres.connection_string()).await?;
    let store = Arc::new(MonitorStore::new(pool));
    store.init_schema().await?;

    let scheduler = monitor::build_scheduler(store.clone(), &config);
    let scheduler_shutdown = shutdown.clone();
    let scheduler_task = tokio::spawn(scheduler.run(scheduler_shutdown));

    let http_app = monitor::build_router(store.clone());
    let http_addr = format!("{}:{}", config.http_host, config.http_port);
    let listener = tokio::net::TcpListener::bind(&http_addr).await?;
    info!(addr = %http_addr, "uptime endpoint listening");
    let http_shutdown = shutdown.clone();
    let http_task = tokio::spawn(async move {
        axum::serve(listener, http_app).with_graceful_shutdown(http_shutdown.cancelled_owned()).await
    });

    shutdown_signal().await;
    shutdown.cancel();

    let _ = scheduler_task.await;
    let _ = http_task.await;

    info!("monitor shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
