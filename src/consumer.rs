//! Out-of-band message consumption
//!
//! The consumer loop runs on its own task and drains the in-process queue that
//! the ingestor fills. Processing is strictly serialized: one message is fully
//! handled, including all of its remote calls, before the next is dequeued.
//! Failures are counted and forwarded to the dead-letter sink; the loop itself
//! keeps running after any single message's failure.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::errors::{ProvisionError, ProvisionResult};
use crate::metrics::Counters;
use crate::router::{MessageRouter, Outcome};

/// An item on the in-process queue. `Shutdown` is the reserved sentinel that
/// makes the consumer exit after the items queued before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueItem {
    Message(Vec<u8>),
    Shutdown,
}

/// A message whose processing failed, wrapped for the dead-letter topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetterRecord {
    /// Original message body
    pub message: String,
    /// Human-readable failure reason
    pub reason: String,
}

impl DeadLetterRecord {
    pub fn new(original: &[u8], reason: impl Into<String>) -> Self {
        Self {
            message: String::from_utf8_lossy(original).into_owned(),
            reason: reason.into(),
        }
    }
}

/// Destination for failed messages.
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn send(&self, record: DeadLetterRecord) -> ProvisionResult<()>;
}

/// Dead-letter sink publishing to the sibling `{topic}.DLQ` bus topic.
pub struct BusDeadLetterSink {
    client: async_nats::Client,
    dlq_topic: String,
}

impl BusDeadLetterSink {
    /// Build a sink for the dead-letter sibling of the given topic.
    pub fn new(client: async_nats::Client, topic: &str) -> Self {
        Self {
            client,
            dlq_topic: format!("{topic}.DLQ"),
        }
    }

    /// The topic this sink publishes to.
    pub fn topic(&self) -> &str {
        &self.dlq_topic
    }
}

#[async_trait]
impl DeadLetterSink for BusDeadLetterSink {
    async fn send(&self, record: DeadLetterRecord) -> ProvisionResult<()> {
        let payload = serde_json::to_vec(&record)?;
        self.client
            .publish(self.dlq_topic.clone(), payload.into())
            .await
            .map_err(|e| ProvisionError::BusPublish(e.to_string()))?;
        warn!(topic = %self.dlq_topic, "Message moved to dead-letter topic");
        Ok(())
    }
}

/// Serialized consumer over the in-process queue.
pub struct ConsumerLoop {
    router: MessageRouter,
    counters: Arc<dyn Counters>,
    dead_letters: Arc<dyn DeadLetterSink>,
}

impl ConsumerLoop {
    pub fn new(
        router: MessageRouter,
        counters: Arc<dyn Counters>,
        dead_letters: Arc<dyn DeadLetterSink>,
    ) -> Self {
        Self {
            router,
            counters,
            dead_letters,
        }
    }

    /// Spawn the loop on its own task and return a handle for shutdown.
    pub fn spawn(self, queue: UnboundedReceiver<QueueItem>) -> JoinHandle<()> {
        tokio::spawn(self.run(queue))
    }

    async fn run(self, mut queue: UnboundedReceiver<QueueItem>) {
        info!("Consumer loop started");
        while let Some(item) = queue.recv().await {
            match item {
                QueueItem::Shutdown => {
                    info!("Shutdown sentinel received, consumer loop exiting");
                    break;
                }
                QueueItem::Message(payload) => self.process(&payload).await,
            }
        }
    }

    async fn process(&self, payload: &[u8]) {
        match self.router.route(payload).await {
            Ok(Outcome::Processed) => {
                debug!("Message processed");
                self.counters.processed();
            }
            Ok(Outcome::Ignored) => {
                self.counters.ignored();
            }
            Err(e) => {
                error!(error = %e, "Message processing failed");
                self.counters.failed();
                let record = DeadLetterRecord::new(payload, e.to_string());
                if let Err(send_err) = self.dead_letters.send(record).await {
                    error!(error = %send_err, "Failed to publish dead-letter record");
                }
            }
        }
    }
}

/// Handle to a running consumer: enqueue side plus cooperative shutdown.
pub struct ConsumerHandle {
    sender: UnboundedSender<QueueItem>,
    join: JoinHandle<()>,
}

impl ConsumerHandle {
    pub fn new(sender: UnboundedSender<QueueItem>, join: JoinHandle<()>) -> Self {
        Self { sender, join }
    }

    /// Clone of the enqueue side for the ingestor.
    pub fn sender(&self) -> UnboundedSender<QueueItem> {
        self.sender.clone()
    }

    /// Push the shutdown sentinel and wait for the consumer to drain and exit.
    pub async fn shutdown(self) {
        if self.sender.send(QueueItem::Shutdown).is_err() {
            // consumer already gone
            return;
        }
        if let Err(e) = self.join.await {
            error!(error = %e, "Consumer task join failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn dead_letter_record_wraps_original_body() {
        let record = DeadLetterRecord::new(b"{\"app-id\": \"x\"}", "boom");
        assert_eq!(record.message, "{\"app-id\": \"x\"}");
        assert_eq!(record.reason, "boom");

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["message"], "{\"app-id\": \"x\"}");
        assert_eq!(json["reason"], "boom");
    }
}
