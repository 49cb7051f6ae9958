//! Ingestion gateway (D): validates events over HTTP, publishes them to
//! AMQP, and proxies aggregate/uptime reads to the aggregator and monitor.

use std::sync::Arc;
use telemetry_pipeline::broker::{self, publisher::Publisher};
use telemetry_pipeline::config::{self, GatewayConfig};
use telemetry_pipeline::gateway::{self, GatewayState};
use telemetry_pipeline::rpc::aggregation::aggregation_service_client::AggregationServiceClient;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tonic::transport::Endpoint;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "gateway=info,tower_http=info".into()))
        .init();

    info!("starting ingestion gateway v{}", env!("CARGO_PKG_VERSION"));
    let config = GatewayConfig::default();
    let shutdown = CancellationToken::new();

    let connection = broker::connect(&config.rabbitmq.amqp_uri()).await?;
    let channel = connection.create_channel().await?;
    broker::declare_all_queues(&channel).await?;
    let publisher = Publisher::spawn(channel, config.publish_queue_capacity, shutdown.clone());

    let agg_channel = Endpoint::from_shared(config.aggregation_grpc_uri())?.connect_lazy();
    let agg_client = AggregationServiceClient::new(agg_channel);

    let state = Arc::new(GatewayState {
        publisher,
        agg_client,
        http_client: reqwest::Client::new(),
        config: config.clone(),
    });

    let app = gateway::build_router(state);
    let addr = format!("{}:{}", config.http_host, config.http_port);
    info!(addr, "listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    let shutdown_for_serve = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown_for_serve.cancel();
        })
        .await?;

    info!("gateway shutdown complete");
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
