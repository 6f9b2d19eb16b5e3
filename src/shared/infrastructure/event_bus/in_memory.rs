// In memory implementation of the EventBus port.
//
// Purpose
// - Support consumer tests, end to end flows and local development without a broker.
//
// Responsibilities
// - Keep one work queue per (topic, group). Subscribers of the same group compete for messages.
// - Track in-flight deliveries and put them back on the queue on ack timeout.
// - Hold nacked deliveries until their delay passes, then queue them again.
// - Hold messages published before any group subscribed and hand them to the first group.

use crate::shared::infrastructure::event_bus::{
    BusError, BusMessage, Delivery, EventBus, Subscription,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

struct Pending {
    delivery: Delivery,
    deadline: Instant,
}

#[derive(Default)]
struct GroupState {
    ready: VecDeque<Delivery>,
    in_flight: HashMap<Uuid, Pending>,
    delayed: Vec<Pending>,
}

impl GroupState {
    fn requeue_due(&mut self, now: Instant) {
        let expired: Vec<Uuid> = self
            .in_flight
            .iter()
            .filter(|(_, entry)| entry.deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        for id in expired {
            if let Some(entry) = self.in_flight.remove(&id) {
                tracing::debug!(message_id = %id, attempt = entry.delivery.attempt, "ack timeout, redelivering");
                self.ready.push_back(redelivery(entry.delivery));
            }
        }

        let (due, waiting): (Vec<Pending>, Vec<Pending>) = self
            .delayed
            .drain(..)
            .partition(|entry| entry.deadline <= now);
        self.delayed = waiting;
        self.ready
            .extend(due.into_iter().map(|entry| redelivery(entry.delivery)));
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.in_flight
            .values()
            .chain(self.delayed.iter())
            .map(|entry| entry.deadline)
            .min()
    }

    /// The in-flight entry for this exact delivery. A stale attempt of a redelivered message
    /// does not match.
    fn in_flight_mut(&mut self, delivery: &Delivery) -> Result<&mut Pending, BusError> {
        self.in_flight
            .get_mut(&delivery.message.id)
            .filter(|entry| entry.delivery.attempt == delivery.attempt)
            .ok_or(BusError::UnknownDelivery(delivery.message.id))
    }

    fn settle(&mut self, delivery: &Delivery) -> Result<Pending, BusError> {
        self.in_flight_mut(delivery)?;
        self.in_flight
            .remove(&delivery.message.id)
            .ok_or(BusError::UnknownDelivery(delivery.message.id))
    }
}

fn redelivery(delivery: Delivery) -> Delivery {
    Delivery {
        attempt: delivery.attempt + 1,
        message: delivery.message,
    }
}

#[derive(Default)]
struct GroupQueue {
    state: Mutex<GroupState>,
    notify: Notify,
}

impl GroupQueue {
    async fn push(&self, delivery: Delivery) {
        self.state.lock().await.ready.push_back(delivery);
        self.notify.notify_one();
    }
}

#[derive(Default)]
struct TopicState {
    published: Vec<BusMessage>,
    backlog: VecDeque<BusMessage>,
    groups: HashMap<String, Arc<GroupQueue>>,
}

pub struct InMemoryEventBus {
    ack_timeout: Duration,
    topics: Mutex<HashMap<String, TopicState>>,
    offline: AtomicBool,
    closed: CancellationToken,
}

impl InMemoryEventBus {
    pub fn new(ack_timeout: Duration) -> Self {
        Self {
            ack_timeout,
            topics: Mutex::new(HashMap::new()),
            offline: AtomicBool::new(false),
            closed: CancellationToken::new(),
        }
    }

    pub fn toggle_offline(&self) {
        self.offline.fetch_xor(true, Ordering::SeqCst);
    }

    /// Wakes every waiting subscriber; `next` returns `None` from then on.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Every message ever published on `topic`, in publish order.
    pub async fn published(&self, topic: &str) -> Vec<BusMessage> {
        self.topics
            .lock()
            .await
            .get(topic)
            .map(|state| state.published.clone())
            .unwrap_or_default()
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, topic: &str, payload: serde_json::Value) -> Result<Uuid, BusError> {
        if self.closed.is_cancelled() {
            return Err(BusError::Closed);
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(BusError::Backend("Event bus offline".into()));
        }

        let message = BusMessage {
            id: Uuid::now_v7(),
            topic: topic.to_string(),
            payload,
            published_at: Utc::now(),
        };

        let groups: Vec<Arc<GroupQueue>> = {
            let mut topics = self.topics.lock().await;
            let state = topics.entry(topic.to_string()).or_default();
            state.published.push(message.clone());
            if state.groups.is_empty() {
                state.backlog.push_back(message.clone());
            }
            state.groups.values().cloned().collect()
        };

        for group in groups {
            group
                .push(Delivery {
                    message: message.clone(),
                    attempt: 1,
                })
                .await;
        }
        Ok(message.id)
    }

    async fn subscribe(
        &self,
        topic: &str,
        group: &str,
    ) -> Result<Arc<dyn Subscription>, BusError> {
        if self.closed.is_cancelled() {
            return Err(BusError::Closed);
        }

        let (queue, backlog) = {
            let mut topics = self.topics.lock().await;
            let state = topics.entry(topic.to_string()).or_default();
            match state.groups.get(group) {
                Some(queue) => (queue.clone(), Vec::new()),
                None => {
                    let queue = Arc::new(GroupQueue::default());
                    state.groups.insert(group.to_string(), queue.clone());
                    (queue, state.backlog.drain(..).collect())
                }
            }
        };

        for message in backlog {
            queue.push(Delivery { message, attempt: 1 }).await;
        }

        Ok(Arc::new(InMemorySubscription {
            queue,
            ack_timeout: self.ack_timeout,
            closed: self.closed.clone(),
        }))
    }
}

pub struct InMemorySubscription {
    queue: Arc<GroupQueue>,
    ack_timeout: Duration,
    closed: CancellationToken,
}

#[async_trait]
impl Subscription for InMemorySubscription {
    async fn next(&self) -> Option<Delivery> {
        loop {
            if self.closed.is_cancelled() {
                return None;
            }

            let next_deadline = {
                let mut state = self.queue.state.lock().await;
                let now = Instant::now();
                state.requeue_due(now);
                if let Some(delivery) = state.ready.pop_front() {
                    state.in_flight.insert(
                        delivery.message.id,
                        Pending {
                            delivery: delivery.clone(),
                            deadline: now + self.ack_timeout,
                        },
                    );
                    return Some(delivery);
                }
                state.next_deadline()
            };

            let expiry = async {
                match next_deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                _ = self.closed.cancelled() => return None,
                _ = self.queue.notify.notified() => {}
                _ = expiry => {}
            }
        }
    }

    fn ack_timeout(&self) -> Duration {
        self.ack_timeout
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), BusError> {
        self.queue.state.lock().await.settle(delivery).map(|_| ())
    }

    async fn nack(&self, delivery: &Delivery, delay: Duration) -> Result<(), BusError> {
        {
            let mut state = self.queue.state.lock().await;
            let entry = state.settle(delivery)?;
            state.delayed.push(Pending {
                delivery: entry.delivery,
                deadline: Instant::now() + delay,
            });
        }
        self.queue.notify.notify_one();
        Ok(())
    }

    async fn in_progress(&self, delivery: &Delivery) -> Result<(), BusError> {
        let mut state = self.queue.state.lock().await;
        state.in_flight_mut(delivery)?.deadline = Instant::now() + self.ack_timeout;
        Ok(())
    }
}
