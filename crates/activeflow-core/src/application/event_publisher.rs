use crate::domain::activeflow::ActiveflowId;
use crate::domain::events::DomainEvent;
use crate::CoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

/// Handler for domain events
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DomainEventHandler: Send + Sync {
    /// Handle a domain event
    async fn handle_event(&self, event: Box<dyn DomainEvent>) -> Result<(), CoreError>;
}

/// A domain event as handed to subscribers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishedEvent {
    /// `activeflow_created`, `activeflow_updated` or `activeflow_deleted`
    pub event_type: String,
    /// Activeflow the event is about
    pub activeflow_id: ActiveflowId,
    /// When the change happened
    pub timestamp: DateTime<Utc>,
    /// The full record after the change
    pub payload: serde_json::Value,
}

/// Publishes domain events on a tokio broadcast channel
pub struct BroadcastEventHandler {
    tx: broadcast::Sender<PublishedEvent>,
}

impl BroadcastEventHandler {
    /// Create a publisher buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to events published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl DomainEventHandler for BroadcastEventHandler {
    async fn handle_event(&self, event: Box<dyn DomainEvent>) -> Result<(), CoreError> {
        let published = PublishedEvent {
            event_type: event.event_type().to_string(),
            activeflow_id: *event.activeflow_id(),
            timestamp: event.timestamp(),
            payload: event.payload()?,
        };

        // no subscribers is not an error
        if self.tx.send(published).is_err() {
            trace!(event_type = event.event_type(), "Event dropped, no subscribers");
        }
        Ok(())
    }
}
