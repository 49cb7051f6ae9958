//! Bounded async publisher used by the gateway.
//!
//! HTTP handlers never touch the AMQP channel directly: they push a job
//! onto an in-process bounded `mpsc` channel (`EventIngester`'s pattern in
//! the teacher) and a single background task, owning the one AMQP channel,
//! drains it and publishes. If the channel is full the handler gets an
//! immediate `QueueFull` error and returns 503 without ever blocking on
//! broker I/O.

use crate::errors::BrokerError;
use lapin::{options::BasicPublishOptions, BasicProperties, Channel};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

struct PublishJob {
    queue: &'static str,
    body: Vec<u8>,
}

#[derive(Clone)]
pub struct Publisher {
    tx: mpsc::Sender<PublishJob>,
}

impl Publisher {
    /// Spawns the background worker owning `channel` and returns a handle
    /// that can be cloned freely across HTTP handler tasks.
    pub fn spawn(channel: Channel, capacity: usize, shutdown: CancellationToken) -> Self {
        let (tx, mut rx) = mpsc::channel::<PublishJob>(capacity);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("publisher worker shutting down");
                        break;
                    }
                    job = rx.recv() => {
                        let Some(job) = job else { break };
                        let result = channel
                            .basic_publish(
                                "",
                                job.queue,
                                BasicPublishOptions::default(),
                                &job.body,
                                BasicProperties::default().with_delivery_mode(2),
                            )
                            .await;
                        match result {
                            Ok(confirm) => {
                                if let Err(e) = confirm.await {
                                    error!(queue = job.queue, error = %e, "publish confirm failed");
                                }
                            }
                            Err(e) => warn!(queue = job.queue, error = %e, "publish failed"),
                        }
                    }
                }
            }
        });

        Self { tx }
    }

    /// Enqueues `body` on `queue` without blocking. Returns `QueueFull` if
    /// the internal buffer is saturated, which handlers map to 503.
    pub fn try_publish(&self, queue: &'static str, body: Vec<u8>) -> Result<(), BrokerError> {
        self.tx
            .try_send(PublishJob { queue, body })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => BrokerError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => BrokerError::ChannelClosed,
            })
    }
}
