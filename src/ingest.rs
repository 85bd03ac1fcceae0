//! Bus connection ownership and message ingestion
//!
//! The ingestor owns the single bus connection, subscribes to one topic, and
//! forwards every inbound message body onto the in-process queue. That enqueue
//! is the network loop's only per-message obligation — O(1), never blocking,
//! no inline processing. Reconnection after transient loss is delegated to the
//! transport, driven by the backoff policy handed to it at connect time;
//! health transitions are reported through a single callback.

use async_nats::{ConnectOptions, Event};
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

use crate::consumer::QueueItem;
use crate::errors::{ProvisionError, ProvisionResult};
use crate::metrics::{ConnectionHealth, HealthCallback};

/// Exponential reconnect backoff: `initial * factor^(attempt-1)`, capped.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub factor: f64,
    pub max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(5),
            factor: 1.5,
            max: Duration::from_secs(60),
        }
    }
}

impl BackoffPolicy {
    /// Delay before the given reconnect attempt (1-based).
    pub fn delay(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let secs = self.initial.as_secs_f64() * self.factor.powi(exponent);
        Duration::from_secs_f64(secs.min(self.max.as_secs_f64()))
    }
}

/// Configuration for the bus connection.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Broker URL
    pub url: String,
    /// Topic to subscribe to; qualified with `topic://` if no scheme given
    pub topic: String,
    /// Heartbeat (ping) interval handed to the transport
    pub heartbeat: Duration,
    /// Reconnect backoff handed to the transport
    pub backoff: BackoffPolicy,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
            topic: "new_app_topic".to_string(),
            heartbeat: Duration::from_secs(10),
            backoff: BackoffPolicy::default(),
        }
    }
}

/// Qualify a bare topic name with the `topic://` address form.
pub fn qualify_topic(topic: &str) -> String {
    if topic.contains("://") {
        topic.to_string()
    } else {
        format!("topic://{topic}")
    }
}

/// Owns the bus connection and feeds the in-process queue.
pub struct MessageIngestor {
    client: async_nats::Client,
    topic: String,
    health: HealthCallback,
}

impl MessageIngestor {
    /// Open the bus connection.
    ///
    /// Heartbeat and backoff are supplied to the transport so reconnection is
    /// handled there; the health callback fires on connect success and on
    /// every transport-level transition afterwards.
    pub async fn connect(config: BusConfig, health: HealthCallback) -> ProvisionResult<Self> {
        let topic = qualify_topic(&config.topic);
        info!(url = %config.url, %topic, "Connecting to bus");

        let backoff = config.backoff.clone();
        let event_health = health.clone();
        let connect_options = ConnectOptions::new()
            .ping_interval(config.heartbeat)
            .retry_on_initial_connect()
            .reconnect_delay_callback(move |attempt| backoff.delay(attempt))
            .event_callback(move |event| {
                let health = event_health.clone();
                async move {
                    match event {
                        Event::Connected => {
                            info!("Bus connection established");
                            health(ConnectionHealth::Up);
                        }
                        Event::Disconnected => {
                            error!("Bus connection lost");
                            health(ConnectionHealth::Down);
                        }
                        Event::ClientError(err) => {
                            error!(error = %err, "Bus client error");
                            health(ConnectionHealth::Down);
                        }
                        other => {
                            warn!(event = %other, "Bus event");
                        }
                    }
                }
            });

        let client = async_nats::connect_with_options(&config.url, connect_options)
            .await
            .map_err(|e| ProvisionError::BusConnection(e.to_string()))?;

        health(ConnectionHealth::Up);

        Ok(Self {
            client,
            topic,
            health,
        })
    }

    /// The qualified topic this ingestor subscribes to.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// The underlying bus client, for sibling publishers (dead-letter sink).
    pub fn client(&self) -> async_nats::Client {
        self.client.clone()
    }

    /// Subscribe and forward message bodies onto the queue until the
    /// subscription ends or the queue side is dropped.
    pub async fn run(&self, queue: UnboundedSender<QueueItem>) -> ProvisionResult<()> {
        let mut subscriber = self
            .client
            .subscribe(self.topic.clone())
            .await
            .map_err(|e| ProvisionError::BusSubscribe(e.to_string()))?;

        info!(topic = %self.topic, "Subscribed");

        while let Some(message) = subscriber.next().await {
            debug!(payload_size = message.payload.len(), "Received message");
            if queue.send(QueueItem::Message(message.payload.to_vec())).is_err() {
                warn!("Queue closed, stopping ingestion");
                break;
            }
        }

        warn!(topic = %self.topic, "Subscription ended");
        (self.health)(ConnectionHealth::Down);
        Ok(())
    }

    /// Flush in-flight operations and report the connection down.
    pub async fn disconnect(self) {
        if let Err(e) = self.client.flush().await {
            error!(error = %e, "Error flushing bus connection");
        }
        (self.health)(ConnectionHealth::Down);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn topic_gains_scheme_when_bare() {
        assert_eq!(qualify_topic("new_app_topic"), "topic://new_app_topic");
        assert_eq!(qualify_topic("topic://already"), "topic://already");
        assert_eq!(qualify_topic("queue://other"), "queue://other");
    }

    #[test]
    fn backoff_grows_and_caps() {
        let policy = BackoffPolicy {
            initial: Duration::from_secs(5),
            factor: 1.5,
            max: Duration::from_secs(60),
        };
        assert_eq!(policy.delay(1), Duration::from_secs(5));
        assert!(policy.delay(2) > policy.delay(1));
        assert!(policy.delay(3) > policy.delay(2));
        assert_eq!(policy.delay(50), Duration::from_secs(60));
    }

    #[test]
    fn backoff_first_attempt_uses_initial_delay() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay(0), policy.initial);
        assert_eq!(policy.delay(1), policy.initial);
    }
}
