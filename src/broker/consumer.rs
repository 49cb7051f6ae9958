//! Durable consumer with manual ack, reconnect-with-bounded-wait, and a
//! worker pool draining a bounded in-process channel.
//!
//! Grounded in `metrics-service/src/rabbitmq.cpp`'s `onReceived` callback
//! (ack on success, `reject(tag, requeue=true)` on failure) and
//! `main.cpp`'s `hardware_concurrency()`-sized worker pool pulling off a
//! shared queue.

use super::{connect, declare_all_queues, ALL_QUEUES};
use async_trait::async_trait;
use futures::StreamExt;
use lapin::{
    options::{BasicAckOptions, BasicConsumeOptions, BasicNackOptions},
    types::FieldTable,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn handle(&self, queue: &str, body: &[u8]) -> anyhow::Result<()>;
}

struct Delivered {
    queue: &'static str,
    delivery: lapin::message::Delivery,
}

/// Runs the reconnect loop forever until `shutdown` is triggered. Each
/// connection attempt re-declares queues and re-subscribes, per spec's
/// reconnection contract.
pub async fn run(
    uri: String,
    handler: Arc<dyn EventHandler>,
    worker_pool_size: usize,
    reconnect_wait: Duration,
    shutdown: CancellationToken,
) {
    loop {
        if shutdown.is_cancelled() {
            break;
        }
        match connect_and_consume(&uri, handler.clone(), worker_pool_size, shutdown.clone()).await {
            Ok(()) => {
                info!("consumer stopped (shutdown requested)");
                break;
            }
            Err(e) => {
                error!(error = %e, "broker consumer disconnected, retrying");
                tokio::select! {
                    _ = tokio::time::sleep(reconnect_wait) => {}
                    _ = shutdown.cancelled() => break,
                }
            }
        }
    }
}

async fn connect_and_consume(
    uri: &str,
    handler: Arc<dyn EventHandler>,
    worker_pool_size: usize,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let connection = connect(uri).await?;
    let channel = connection.create_channel().await?;
    declare_all_queues(&channel).await?;

    let (tx, rx) = mpsc::channel::<Delivered>(worker_pool_size.max(1) * 4);
    let attempt_failed = CancellationToken::new();

    let mut consume_handles = Vec::new();
    for queue in ALL_QUEUES {
        let channel = connection.create_channel().await?;
        let tx = tx.clone();
        let attempt_failed = attempt_failed.clone();
        let shutdown = shutdown.clone();
        consume_handles.push(tokio::spawn(async move {
            let consumer = match channel
                .basic_consume(queue, "persister", BasicConsumeOptions::default(), FieldTable::default())
                .await
            {
                Ok(c) => c,
                Err(e) => {
                    warn!(queue, error = %e, "failed to start consuming");
                    attempt_failed.cancel();
                    return;
                }
            };
            let mut consumer = consumer;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = attempt_failed.cancelled() => break,
                    next = consumer.next() => {
                        match next {
                            Some(Ok(delivery)) => {
                                if tx.send(Delivered { queue, delivery }).await.is_err() {
                                    break;
                                }
                            }
                            Some(Err(e)) => {
                                warn!(queue, error = %e, "consumer stream error");
                                attempt_failed.cancel();
                                break;
                            }
                            None => {
                                attempt_failed.cancel();
                                break;
                            }
                        }
                    }
                }
            }
        }));
    }
    drop(tx);

    let rx = Arc::new(tokio::sync::Mutex::new(rx));
    let mut worker_handles = Vec::new();
    for _ in 0..worker_pool_size.max(1) {
        let rx = rx.clone();
        let handler = handler.clone();
        worker_handles.push(tokio::spawn(async move {
            loop {
                let item = { rx.lock().await.recv().await };
                let Some(Delivered { queue, delivery }) = item else { break };
                let result = handler.handle(queue, &delivery.data).await;
                match result {
                    Ok(()) => {
                        if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                            error!(queue, error = %e, "ack failed");
                        }
                    }
                    Err(e) => {
                        warn!(queue, error = %e, "processing failed, nacking with requeue");
                        if let Err(e) = delivery.nack(BasicNackOptions { requeue: true, ..Default::default() }).await {
                            error!(queue, error = %e, "nack failed");
                        }
                    }
                }
            }
        }));
    }

    tokio::select! {
        _ = shutdown.cancelled() => {}
        _ = attempt_failed.cancelled() => {}
    }

    for h in consume_handles {
        let _ = h.await;
    }
    drop(rx);
    for h in worker_handles {
        let _ = h.await;
    }

    if shutdown.is_cancelled() {
        Ok(())
    } else {
        Err(anyhow::anyhow!("broker connection lost"))
    }
}
