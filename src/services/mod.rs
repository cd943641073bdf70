//! Service layer for portfolio-engine
//!
//! Services encapsulate business logic between embedding hosts and
//! repositories. Each service wraps database operations with:
//! - Input validation
//! - Cross-entity orchestration
//! - Event emission for audit/notifications
//! - Transaction boundaries
//!
//! ## Architecture
//!
//! ```text
//! Host handlers (thin)
//!     ↓
//! Service Layer (business logic)
//!     ↓
//! Repository Layer (db/*.rs)
//!     ↓
//! SQLite Database
//! ```

pub mod events;
pub mod item_service;
pub mod review_service;
pub mod coordination;
pub mod profile_service;

// Re-exports
pub use events::{EventBus, EventListener, PortfolioEvent};
pub use item_service::ItemService;
pub use review_service::{ReviewDecision, ReviewOutcome, ReviewService};
pub use coordination::CoordinationService;
pub use profile_service::ProfileService;

use std::sync::Arc;

use crate::config::Config;
use crate::db::PortfolioDb;
use crate::importers::Importer;
use crate::notify::{LogNotificationSink, NotificationDispatcher, NotificationSink, ReadinessSink};

/// Service container for dependency injection
///
/// Holds all services with shared database connection.
pub struct Services {
    pub items: Arc<ItemService>,
    pub reviews: Arc<ReviewService>,
    pub coordination: Arc<CoordinationService>,
    pub profiles: Arc<ProfileService>,
    pub importer: Arc<Importer>,
    pub events: Arc<EventBus>,
}

impl Services {
    /// Create all services with shared database and external sinks
    pub fn new(
        db: Arc<PortfolioDb>,
        config: Config,
        notification_sink: Arc<dyn NotificationSink>,
        readiness_sink: Option<Arc<dyn ReadinessSink>>,
    ) -> Self {
        let events = Arc::new(EventBus::with_capacity(config.event_capacity));
        let dispatcher = NotificationDispatcher::spawn(notification_sink);

        let items = Arc::new(ItemService::new(db.clone(), events.clone(), dispatcher));
        let profiles = Arc::new(ProfileService::new(
            db.clone(),
            events.clone(),
            readiness_sink,
            config.clone(),
        ));
        let reviews = Arc::new(ReviewService::new(
            db.clone(),
            events.clone(),
            items.clone(),
            profiles.clone(),
            config.clone(),
        ));
        let coordination = Arc::new(CoordinationService::new(
            db.clone(),
            events.clone(),
            items.clone(),
            profiles.clone(),
            config,
        ));
        let importer = Arc::new(Importer::new(db, items.clone()));

        Self {
            items,
            reviews,
            coordination,
            profiles,
            importer,
            events,
        }
    }

    /// Create services with the log-only notification sink (for testing
    /// and embedding hosts that wire sinks later)
    pub fn with_defaults(db: Arc<PortfolioDb>) -> Self {
        Self::new(db, Config::default(), Arc::new(LogNotificationSink), None)
    }
}

/// Spawn a background task that keeps profile projections fresh.
///
/// Mission auto-creation and review verdicts refresh inline; this listener
/// additionally covers publishes and telemetry for hosts that want every
/// status change reflected without an explicit refresh call.
pub fn spawn_profile_refresher(
    db: Arc<PortfolioDb>,
    events: Arc<EventBus>,
    profiles: Arc<ProfileService>,
) -> tokio::task::JoinHandle<()> {
    use tokio::sync::broadcast;
    use tracing::{debug, warn};

    let mut receiver = events.subscribe();

    tokio::spawn(async move {
        loop {
            let event = match receiver.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "Profile refresher lagged, skipped events");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed, stopping profile refresher");
                    break;
                }
            };

            let item_id = match &event {
                PortfolioEvent::StatusChanged { id, .. } => id.clone(),
                PortfolioEvent::TelemetryRecorded { item_id } => item_id.clone(),
                _ => continue,
            };

            let owner = db
                .with_conn(|conn| crate::db::items::get_item(conn, &item_id))
                .ok()
                .flatten()
                .map(|item| item.user_id);

            if let Some(user_id) = owner {
                if let Err(e) = profiles.refresh(&user_id) {
                    warn!(user = %user_id, error = %e, "Profile refresh failed");
                }
            }
        }
    })
}
