//! Watermark-driven aggregator (G) and its read RPC (H): pulls raw events
//! from the persister on a fixed interval, rolls them up into fixed
//! buckets, and serves `AggregationService` for the gateway to proxy.

use async_trait::async_trait;
use std::sync::Arc;
use telemetry_pipeline::aggregation::Aggregator;
use telemetry_pipeline::config::{self, AggregatorConfig};
use telemetry_pipeline::db::{self, agg::AggStore};
use telemetry_pipeline::health;
use telemetry_pipeline::rpc::aggregation::aggregation_service_server::AggregationServiceServer;
use telemetry_pipeline::rpc::aggregation_server::AggregationRpc;
use telemetry_pipeline::rpc::raw_events_client::RawEventsClient;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tower_http::trace::TraceLayer;
use tracing::info;

struct DbReady(Arc<AggStore>);

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
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "aggregator=info".into()))
        .init();

    info!("starting aggregator v{}", env!("CARGO_PKG_VERSION"));
    let config = AggregatorConfig::default();
    let shutdown = CancellationToken::new();

    let pool = db::connect_pool(&config.postgres.connection_string()).await?;
    let store = Arc::new(AggStore::new(pool));
    store.init_schema().await?;

    let raw_client = RawEventsClient::connect(config.metrics_grpc_uri()).await?;
    let aggregator = Aggregator::new(store.clone(), raw_client, config.bucket_minutes, config.aggregation_interval);
    let aggregator_shutdown = shutdown.clone();
    let aggregator_task = tokio::spawn(aggregator.run(aggregator_shutdown));

    let grpc_addr = format!("{}:{}", config.grpc_host, config.grpc_port).parse()?;
    let grpc_service = AggregationServiceServer::new(AggregationRpc::new(store.clone()));
    let grpc_shutdown = shutdown.clone();
    let grpc_task = tokio::spawn(async move {
        info!(addr = %grpc_addr, "aggregation RPC listening");
        Server::builder()
            .add_service(grpc_service)
            .serve_with_shutdown(grpc_addr, grpc_shutdown.cancelled_owned())
            .await
    });

    let http_app = health::router("aggregation-service", Arc::new(DbReady(store.clone()))).layer(TraceLayer::new_for_http());
    let http_addr = format!("{}:{}", config.http_host, config.http_port);
    let listener = tokio::net::TcpListener::bind(&http_addr).await?;
    info!(addr = %http_addr, "health endpoint listening");
    let http_shutdown = shutdown.clone();
    let http_task = tokio::spawn(async move {
        axum::serve(listener, http_app).with_graceful_shutdown(http_shutdown.cancelled_owned()).await
    });

    shutdown_signal().await;
    shutdown.cancel();

    let _ = aggregator_task.await;
    let _ = grpc_task.await;
    let _ = http_task.await;

    info!("aggregator shutdown complete");
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
