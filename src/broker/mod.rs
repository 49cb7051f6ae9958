//! AMQP broker plumbing shared by the gateway (publish) and the persister
//! (consume). Queue names and durability match spec.md §3/§6 exactly.

pub mod publisher;
pub mod consumer;

pub const QUEUE_PAGE_VIEWS: &str = "page_views";
pub const QUEUE_CLICKS: &str = "clicks";
pub const QUEUE_PERFORMANCE: &str = "performance_events";
pub const QUEUE_ERRORS: &str = "error_events";
pub const QUEUE_CUSTOM_EVENTS: &str = "custom_events";

pub const ALL_QUEUES: [&str; 5] = [
    QUEUE_PAGE_VIEWS,
    QUEUE_CLICKS,
    QUEUE_PERFORMANCE,
    QUEUE_ERRORS,
    QUEUE_CUSTOM_EVENTS,
];

use lapin::{
    options::QueueDeclareOptions, types::FieldTable, Channel, Connection, ConnectionProperties,
};

/// Opens a connection and declares all five queues durable. Shared by both
/// the gateway's publisher and the persister's consumer so queue topology
/// never depends on which side boots first.
pub async fn connect(uri: &str) -> Result<Connection, lapin::Error> {
    Connection::connect(uri, ConnectionProperties::default()).await
}

pub async fn declare_all_queues(channel: &Channel) -> Result<(), lapin::Error> {
    for queue in ALL_QUEUES {
        channel
            .queue_declare(queue, QueueDeclareOptions { durable: true, ..Default::default() }, FieldTable::default())
            .await?;
    }
    Ok(())
}
