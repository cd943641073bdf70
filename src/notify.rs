//! Notification and readiness sinks
//!
//! Item creation fans out to the user's assigned mentors and program
//! directors through an external notification service. Delivery is
//! fire-and-forget relative to the creating transaction: the dispatcher
//! enqueues on an unbounded channel and a detached worker drives the sink,
//! logging and dropping failures. The caller never awaits delivery.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::PortfolioError;

/// Payload delivered to the external notification service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub user_id: String,
    pub portfolio_item_id: String,
    pub portfolio_item_title: String,
}

/// Payload pushed to the external analytics service when a user's
/// competency aggregates change
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessUpdate {
    pub user_id: String,
    /// Refreshed portfolio health on the 0-10 scale
    pub score: f64,
    pub updated_at: String,
}

/// Delivery boundary for mentor/director notifications
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<(), PortfolioError>;
}

/// Delivery boundary for readiness-score pushes
#[async_trait]
pub trait ReadinessSink: Send + Sync {
    async fn push(&self, update: &ReadinessUpdate) -> Result<(), PortfolioError>;
}

/// Default sink: logs deliveries. Embedders swap in an HTTP-backed sink.
pub struct LogNotificationSink;

#[async_trait]
impl NotificationSink for LogNotificationSink {
    async fn deliver(&self, notification: &Notification) -> Result<(), PortfolioError> {
        debug!(
            user = %notification.user_id,
            item = %notification.portfolio_item_id,
            "Notification delivered (log sink)"
        );
        Ok(())
    }
}

/// Queued dispatcher decoupling item creation from notification delivery.
///
/// Dropping the dispatcher closes the channel and lets the worker drain
/// and exit.
#[derive(Clone)]
pub struct NotificationDispatcher {
    tx: mpsc::UnboundedSender<Notification>,
}

impl NotificationDispatcher {
    /// Spawn the delivery worker and return the dispatcher handle
    pub fn spawn(sink: Arc<dyn NotificationSink>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Notification>();

        tokio::spawn(async move {
            while let Some(notification) = rx.recv().await {
                if let Err(e) = sink.deliver(&notification).await {
                    // Never retried, never surfaced to the creating caller
                    warn!(
                        user = %notification.user_id,
                        item = %notification.portfolio_item_id,
                        error = %e,
                        "Notification delivery failed, dropping"
                    );
                }
            }
            debug!("Notification worker stopped");
        });

        Self { tx }
    }

    /// Enqueue a notification. Never blocks, never fails the caller.
    pub fn enqueue(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            warn!("Notification channel closed, dropping notification");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::{sleep, Duration};

    struct CountingSink {
        delivered: AtomicUsize,
    }

    #[async_trait]
    impl NotificationSink for CountingSink {
        async fn deliver(&self, _n: &Notification) -> Result<(), PortfolioError> {
            self.delivered.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl NotificationSink for FailingSink {
        async fn deliver(&self, _n: &Notification) -> Result<(), PortfolioError> {
            Err(PortfolioError::ExternalService("503 from notifier".into()))
        }
    }

    fn notification(id: &str) -> Notification {
        Notification {
            user_id: "user-1".into(),
            portfolio_item_id: id.into(),
            portfolio_item_title: "Item".into(),
        }
    }

    #[tokio::test]
    async fn test_dispatch_delivers() {
        let sink = Arc::new(CountingSink {
            delivered: AtomicUsize::new(0),
        });
        let dispatcher = NotificationDispatcher::spawn(sink.clone());

        dispatcher.enqueue(notification("a"));
        dispatcher.enqueue(notification("b"));

        // Give the worker a moment to drain
        for _ in 0..50 {
            if sink.delivered.load(Ordering::SeqCst) == 2 {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(sink.delivered.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_sink_failure_never_reaches_caller() {
        let dispatcher = NotificationDispatcher::spawn(Arc::new(FailingSink));
        // enqueue has no Result to propagate; failures are logged and dropped
        dispatcher.enqueue(notification("a"));
        sleep(Duration::from_millis(20)).await;
    }
}
