//! Raw-event persister (E) and its read RPC (F): consumes validated events
//! off AMQP into Postgres, and serves `RawEventsService` for the
//! aggregator to pull from.

use async_trait::async_trait;
use std::sync::Arc;
use telemetry_pipeline::broker::{consumer, QUEUE_CLICKS, QUEUE_CUSTOM_EVENTS, QUEUE_ERRORS, QUEUE_PAGE_VIEWS, QUEUE_PERFORMANCE};
use telemetry_pipeline::config::{self, PersisterConfig};
use telemetry_pipeline::db::{self, raw::RawStore};
use telemetry_pipeline::health;
use telemetry_pipeline::rpc::raw::raw_events_service_server::RawEventsServiceServer;
use telemetry_pipeline::rpc::raw_events_server::RawEventsRpc;
use telemetry_pipeline::schemas::events::{ClickEvent, CustomEvent, ErrorEvent, PageViewEvent, PerformanceEvent};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

struct PersisterHandler {
    store: Arc<RawStore>,
}

#[async_trait]
impl consumer::EventHandler for PersisterHandler {
    async fn handle(&self, queue: &str, body: &[u8]) -> anyhow::Result<()> {
        match queue {
            QUEUE_PAGE_VIEWS => {
                let event: PageViewEvent = serde_json::from_slice(body)?;
                self.store.insert_page_view(&event).await?;
            }
            QUEUE_CLICKS => {
                let event: ClickEvent = serde_json::from_slice(body)?;
                self.store.insert_click(&event).await?;
            }
            QUEUE_PERFORMANCE => {
                let event: PerformanceEvent = serde_json::from_slice(body)?;
                self.store.insert_performance(&event).await?;
            }
            QUEUE_ERRORS => {
                let event: ErrorEvent = serde_json::from_slice(body)?;
                self.store.insert_error(&event).await?;
            }
            QUEUE_CUSTOM_EVENTS => {
                let event: CustomEvent = serde_json::from_slice(body)?;
                self.store.insert_custom_event(&event).await?;
            }
            other => warn!(queue = other, "message on unknown queue, dropping"),
        }
        Ok(())
    }
}

struct DbReady(Arc<RawStore>);

#[async_trait]
impl health::ReadinessProbe for DbReady {
    async fn is_ready(&self) -> bool {
        self.0.ping().await.is_ok()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "persister=info".into()))
        .init();

    info!("starting raw-event persister v{}", env!("CARGO_PKG_VERSION"));
    let config = PersisterConfig::default();
    let shutdown = CancellationToken::new();

    let pool = db::connect_pool(&config.postgres.connection_string()).await?;
    let store = Arc::new(RawStore::new(pool));
    store.init_schema().await?;

    let handler: Arc<dyn consumer::EventHandler> = Arc::new(PersisterHandler { store: store.clone() });
    let consumer_task = tokio::spawn(consumer::run(
        config.rabbitmq.amqp_uri(),
        handler,
        config.worker_pool_size,
        config.reconnect_wait,
        shutdown.clone(),
    ));

    let grpc_addr = format!("{}:{}", config.grpc_host, config.grpc_port).parse()?;
    let grpc_service = RawEventsServiceServer::new(RawEventsRpc::new(store.clone()));
    let grpc_shutdown = shutdown.clone();
    let grpc_task = tokio::spawn(async move {
        info!(addr = %grpc_addr, "raw-events RPC listening");
        Server::builder()
            .add_service(grpc_service)
            .serve_with_shutdown(grpc_addr, grpc_shutdown.cancelled_owned())
            .await
    });

    let http_app = health::router("metrics-service", Arc::new(DbReady(store.clone()))).layer(TraceLayer::new_for_http());
    let http_addr = format!("{}:{}", config.http_host, config.http_port);
    let listener = tokio::net::TcpListener::bind(&http_addr).await?;
    info!(addr = %http_addr, "health endpoint listening");
    let http_shutdown = shutdown.clone();
    let http_task = tokio::spawn(async move {
        axum::serve(listener, http_app).with_graceful_shutdown(http_shutdown.cancelled_owned()).await
    });

    shutdown_signal().await;
    shutdown.cancel();

    let _ = consumer_task.await;
    let _ = grpc_task.await;
    let _ = http_task.await;

    info!("persister shutdown complete");
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
