//! Event system for portfolio operations
//!
//! Provides an event bus for notifying listeners about portfolio
//! operations. Useful for:
//! - Audit logging
//! - Cache invalidation in embedding servers
//! - Profile refresh triggers

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::model::{ItemStatus, ItemType, Visibility};

/// Events emitted by services
#[derive(Debug, Clone)]
pub enum PortfolioEvent {
    ItemCreated {
        id: String,
        user_id: String,
        title: String,
        item_type: ItemType,
    },
    ItemUpdated {
        id: String,
    },
    ItemDeleted {
        id: String,
    },
    StatusChanged {
        id: String,
        from: ItemStatus,
        to: ItemStatus,
    },
    ReviewSubmitted {
        id: String,
        item_id: String,
        total_score: f64,
    },
    VisibilitySynced {
        user_id: String,
        visibility: Visibility,
        items_updated: usize,
    },
    ProfileRefreshed {
        user_id: String,
        health_score: f64,
    },
    TelemetryRecorded {
        item_id: String,
    },
}

/// Trait for event listeners
pub trait EventListener: Send + Sync {
    /// Handle an event
    fn on_event(&self, event: &PortfolioEvent);
}

/// Event bus for broadcasting portfolio events
pub struct EventBus {
    sender: broadcast::Sender<PortfolioEvent>,
}

impl EventBus {
    /// Create a new event bus with default capacity
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    /// Create a new event bus with specified capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers
    pub fn emit(&self, event: PortfolioEvent) {
        trace!(event = ?event, "Emitting portfolio event");
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(event);
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<PortfolioEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Logging event listener for audit trails
pub struct LoggingEventListener;

impl EventListener for LoggingEventListener {
    fn on_event(&self, event: &PortfolioEvent) {
        match event {
            PortfolioEvent::ItemCreated { id, user_id, title, .. } => {
                debug!(id = %id, user = %user_id, title = %title, "Item created");
            }
            PortfolioEvent::StatusChanged { id, from, to } => {
                debug!(id = %id, from = %from, to = %to, "Item status changed");
            }
            PortfolioEvent::ReviewSubmitted { item_id, total_score, .. } => {
                debug!(item = %item_id, total = %total_score, "Review submitted");
            }
            PortfolioEvent::VisibilitySynced { user_id, visibility, items_updated } => {
                debug!(
                    user = %user_id,
                    visibility = %visibility,
                    updated = items_updated,
                    "Visibility synced"
                );
            }
            _ => {
                trace!(event = ?event, "Portfolio event");
            }
        }
    }
}

/// Spawn a background task that logs all events
pub fn spawn_logging_listener(event_bus: Arc<EventBus>) -> tokio::task::JoinHandle<()> {
    let mut receiver = event_bus.subscribe();
    let listener = LoggingEventListener;

    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => listener.on_event(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "Event listener lagged, skipped events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed, stopping listener");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_event_bus_emit_receive() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();

        bus.emit(PortfolioEvent::ItemCreated {
            id: "item-1".into(),
            user_id: "user-1".into(),
            title: "Network scanner".into(),
            item_type: ItemType::Mission,
        });

        let event = timeout(Duration::from_millis(100), receiver.recv())
            .await
            .expect("timeout")
            .expect("receive error");

        match event {
            PortfolioEvent::ItemCreated { id, title, .. } => {
                assert_eq!(id, "item-1");
                assert_eq!(title, "Network scanner");
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn test_event_bus_no_subscribers() {
        let bus = EventBus::new();
        // Should not panic even with no subscribers
        bus.emit(PortfolioEvent::ItemDeleted { id: "item".into() });
    }
}
