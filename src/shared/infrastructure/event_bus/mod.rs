// Durable event bus port.
//
// Purpose
// - Topic based publish and subscribe with work-queue semantics per consumer group.
//
// Responsibilities
// - Deliver each message to exactly one subscriber of each group at a time.
// - Redeliver a message after a nack's delay, or when it is not acknowledged within the ack
//   timeout. A subscriber still working on a delivery restarts that timeout with in_progress.
//
// Boundaries
// - Payloads are opaque JSON. Decoding belongs to the consumers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::shared::infrastructure::retry::Retryable;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("backend error: {0}")]
    Backend(String),

    #[error("bus call timed out after {0:?}")]
    Timeout(Duration),

    #[error("payload could not be encoded: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("event bus is closed")]
    Closed,

    #[error("delivery {0} is not in flight")]
    UnknownDelivery(Uuid),
}

impl Retryable for BusError {
    fn is_transient(&self) -> bool {
        matches!(self, BusError::Backend(_) | BusError::Timeout(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BusMessage {
    pub id: Uuid,
    pub topic: String,
    pub payload: serde_json::Value,
    pub published_at: DateTime<Utc>,
}

/// A message handed to one subscriber. `attempt` starts at 1 and grows on every redelivery.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub message: BusMessage,
    pub attempt: u32,
}

#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, topic: &str, payload: serde_json::Value) -> Result<Uuid, BusError>;

    async fn subscribe(
        &self,
        topic: &str,
        group: &str,
    ) -> Result<Arc<dyn Subscription>, BusError>;
}

#[async_trait]
pub trait Subscription: Send + Sync {
    /// Waits for the next delivery. `None` once the bus is closed.
    async fn next(&self) -> Option<Delivery>;

    /// How long a delivery stays in flight without an ack, a nack or a progress signal.
    fn ack_timeout(&self) -> Duration;

    async fn ack(&self, delivery: &Delivery) -> Result<(), BusError>;

    /// Hands the delivery back; it is redelivered with a higher attempt once `delay` has passed.
    async fn nack(&self, delivery: &Delivery, delay: Duration) -> Result<(), BusError>;

    /// Restarts the ack timeout of a delivery that is still being handled.
    async fn in_progress(&self, delivery: &Delivery) -> Result<(), BusError>;
}

pub async fn publish_json<TBus, T>(bus: &TBus, topic: &str, payload: &T) -> Result<Uuid, BusError>
where
    TBus: EventBus + ?Sized,
    T: Serialize + Sync,
{
    let value = serde_json::to_value(payload)?;
    bus.publish(topic, value).await
}

pub mod consumer;
pub mod in_memory;
