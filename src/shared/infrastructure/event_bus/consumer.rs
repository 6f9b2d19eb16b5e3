// Consumer loop that feeds deliveries from one subscription into a handler.
//
// Responsibilities
// - Bound the number of deliveries handled concurrently.
// - Report progress while a handler runs, so a slow delivery is not redelivered under it.
// - Ack on success or on a failure that a retry cannot fix. Nack with a backoff delay otherwise,
//   until the redelivery budget is spent; then ack and log the message as dropped.
// - Stop taking deliveries once the shutdown token fires, then let in-flight handlers finish.

use crate::shared::infrastructure::event_bus::{BusMessage, Delivery, Subscription};
use crate::shared::infrastructure::retry::RetryConfig;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait DeliveryHandler: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn handle(&self, message: &BusMessage) -> Result<(), Self::Error>;

    fn should_redeliver(&self, error: &Self::Error) -> bool;
}

/// `redelivery.max_retries` bounds how often one message is redelivered after a retryable
/// failure; `delay_for_attempt` spaces the redeliveries out.
pub async fn run_consumer<H: DeliveryHandler>(
    name: &'static str,
    subscription: Arc<dyn Subscription>,
    handler: Arc<H>,
    max_in_flight: usize,
    redelivery: RetryConfig,
    shutdown: CancellationToken,
) {
    let permits = Arc::new(Semaphore::new(max_in_flight.max(1)));
    let mut tasks = JoinSet::new();
    tracing::info!(
        consumer = name,
        max_in_flight,
        max_redeliveries = redelivery.max_retries,
        "consumer started"
    );

    loop {
        let permit = tokio::select! {
            _ = shutdown.cancelled() => break,
            permit = permits.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };
        let delivery = tokio::select! {
            _ = shutdown.cancelled() => break,
            delivery = subscription.next() => match delivery {
                Some(delivery) => delivery,
                None => break,
            },
        };

        while let Some(joined) = tasks.try_join_next() {
            if let Err(error) = joined {
                tracing::error!(consumer = name, error = %error, "delivery task panicked");
            }
        }

        let subscription = subscription.clone();
        let handler = handler.clone();
        tasks.spawn(async move {
            let _permit = permit;
            settle(name, subscription.as_ref(), handler.as_ref(), redelivery, delivery).await;
        });
    }

    tracing::info!(consumer = name, in_flight = tasks.len(), "consumer draining");
    while let Some(joined) = tasks.join_next().await {
        if let Err(error) = joined {
            tracing::error!(consumer = name, error = %error, "delivery task panicked");
        }
    }
    tracing::info!(consumer = name, "consumer stopped");
}

/// Runs the handler, signalling progress three times per ack timeout until it returns.
async fn handle_with_progress<H: DeliveryHandler>(
    name: &'static str,
    subscription: &dyn Subscription,
    handler: &H,
    delivery: &Delivery,
) -> Result<(), H::Error> {
    let period = (subscription.ack_timeout() / 3).max(Duration::from_millis(1));
    let mut progress = tokio::time::interval_at(Instant::now() + period, period);
    progress.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut handling = handler.handle(&delivery.message);

    loop {
        tokio::select! {
            result = &mut handling => return result,
            _ = progress.tick() => {
                if let Err(error) = subscription.in_progress(delivery).await {
                    tracing::warn!(
                        consumer = name,
                        message_id = %delivery.message.id,
                        error = %error,
                        "could not extend delivery"
                    );
                }
            }
        }
    }
}

async fn settle<H: DeliveryHandler>(
    name: &'static str,
    subscription: &dyn Subscription,
    handler: &H,
    redelivery: RetryConfig,
    delivery: Delivery,
) {
    let message_id = delivery.message.id;
    let attempt = delivery.attempt;
    let outcome = match handle_with_progress(name, subscription, handler, &delivery).await {
        Ok(()) => subscription.ack(&delivery).await,
        Err(error) if handler.should_redeliver(&error) && attempt <= redelivery.max_retries => {
            let delay = redelivery.delay_for_attempt(attempt.saturating_sub(1));
            tracing::warn!(
                consumer = name,
                %message_id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "delivery failed, requesting redelivery"
            );
            subscription.nack(&delivery, delay).await
        }
        Err(error) if handler.should_redeliver(&error) => {
            tracing::error!(
                consumer = name,
                %message_id,
                attempt,
                error = %error,
                "delivery failed with no redeliveries left, dropping"
            );
            subscription.ack(&delivery).await
        }
        Err(error) => {
            tracing::error!(
                consumer = name,
                %message_id,
                attempt,
                error = %error,
                "delivery rejected, acknowledging"
            );
            subscription.ack(&delivery).await
        }
    };
    if let Err(error) = outcome {
        tracing::warn!(consumer = name, %message_id, error = %error, "could not settle delivery");
    }
}
