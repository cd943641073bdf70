//! Item service - business logic for portfolio item operations
//!
//! Wraps the item repository with validation, lifecycle rules, event
//! emission and notification fan-out.

use std::sync::Arc;

use tracing::info;

use crate::db::{self, items, reviews, CreateItemInput, ItemQuery, ItemRow, UpdateItemInput};
use crate::db::PortfolioDb;
use crate::error::PortfolioError;
use crate::model::{ItemStatus, Visibility};
use crate::notify::{Notification, NotificationDispatcher};

use super::events::{EventBus, PortfolioEvent};

/// Item service for lifecycle and content operations
pub struct ItemService {
    db: Arc<PortfolioDb>,
    events: Arc<EventBus>,
    notifications: NotificationDispatcher,
}

impl ItemService {
    /// Create a new item service
    pub fn new(
        db: Arc<PortfolioDb>,
        events: Arc<EventBus>,
        notifications: NotificationDispatcher,
    ) -> Self {
        Self {
            db,
            events,
            notifications,
        }
    }

    // =========================================================================
    // Read Operations
    // =========================================================================

    /// Get item by ID
    pub fn get(&self, id: &str) -> Result<Option<ItemRow>, PortfolioError> {
        self.db.with_conn(|conn| items::get_item(conn, id))
    }

    /// List items with filters
    pub fn list(&self, query: &ItemQuery) -> Result<Vec<ItemRow>, PortfolioError> {
        self.db.with_conn(|conn| items::list_items(conn, query))
    }

    /// List all items owned by a user
    pub fn list_for_user(&self, user_id: &str) -> Result<Vec<ItemRow>, PortfolioError> {
        self.list(&ItemQuery {
            user_id: Some(user_id.to_string()),
            limit: u32::MAX,
            ..Default::default()
        })
    }

    // =========================================================================
    // Write Operations
    // =========================================================================

    /// Create an item with validation.
    ///
    /// Emits `ItemCreated` and enqueues the mentor/director notification;
    /// the notification is fire-and-forget and cannot fail this call.
    pub fn create(&self, input: CreateItemInput) -> Result<ItemRow, PortfolioError> {
        self.validate_create(&input)?;

        let result = self
            .db
            .with_conn_mut(|conn| items::create_item(conn, input))?;

        self.events.emit(PortfolioEvent::ItemCreated {
            id: result.id.clone(),
            user_id: result.user_id.clone(),
            title: result.title.clone(),
            item_type: result.item_type,
        });

        self.notifications.enqueue(Notification {
            user_id: result.user_id.clone(),
            portfolio_item_id: result.id.clone(),
            portfolio_item_title: result.title.clone(),
        });

        Ok(result)
    }

    /// Update item content (owner edit).
    ///
    /// `expected_version` is the version the caller loaded; a stale version
    /// or a non-editable status fails with `Conflict` and changes nothing.
    pub fn update_content(
        &self,
        id: &str,
        expected_version: i64,
        input: &UpdateItemInput,
    ) -> Result<ItemRow, PortfolioError> {
        if let Some(ref title) = input.title {
            validate_title(title)?;
        }
        if let Some(ref competencies) = input.competencies {
            validate_competencies(competencies)?;
        }

        let result = self
            .db
            .with_conn_mut(|conn| items::update_content(conn, id, expected_version, input))?;

        self.events
            .emit(PortfolioEvent::ItemUpdated { id: id.to_string() });

        Ok(result)
    }

    /// Delete an item. Reviews survive as audit history.
    pub fn delete(&self, id: &str) -> Result<bool, PortfolioError> {
        let deleted = self.db.with_conn_mut(|conn| items::delete_item(conn, id))?;

        if deleted {
            self.events
                .emit(PortfolioEvent::ItemDeleted { id: id.to_string() });
        }

        Ok(deleted)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Submit a draft (or changes-requested) item for review.
    ///
    /// Creates the pending review record in the same transaction as the
    /// status change.
    pub fn submit(&self, id: &str) -> Result<ItemRow, PortfolioError> {
        let (item, from) = self.db.with_conn_mut(|conn| {
            let tx = conn
                .transaction()
                .map_err(|e| PortfolioError::Internal(format!("Transaction failed: {}", e)))?;

            let before = items::get_item(&tx, id)?
                .ok_or_else(|| PortfolioError::NotFound(format!("item {}", id)))?;
            let item = items::transition(&tx, id, ItemStatus::Submitted)?;
            reviews::create_review(
                &tx,
                db::CreateReviewInput {
                    item_id: id.to_string(),
                    reviewer_id: None,
                    reviewer_name: None,
                },
            )?;

            tx.commit()
                .map_err(|e| PortfolioError::Internal(format!("Commit failed: {}", e)))?;
            Ok((item, before.status))
        })?;

        info!(id = %id, "Item submitted for review");
        self.events.emit(PortfolioEvent::StatusChanged {
            id: id.to_string(),
            from,
            to: ItemStatus::Submitted,
        });

        Ok(item)
    }

    /// Move a submitted item to in_review and claim its pending review
    pub fn start_review(
        &self,
        id: &str,
        reviewer_id: &str,
        reviewer_name: Option<&str>,
    ) -> Result<ItemRow, PortfolioError> {
        let item = self.db.with_conn_mut(|conn| {
            let tx = conn
                .transaction()
                .map_err(|e| PortfolioError::Internal(format!("Transaction failed: {}", e)))?;

            let item = items::transition(&tx, id, ItemStatus::InReview)?;

            let review = match reviews::latest_pending_review(&tx, id)? {
                Some(review) => review,
                None => reviews::create_review(
                    &tx,
                    db::CreateReviewInput {
                        item_id: id.to_string(),
                        reviewer_id: None,
                        reviewer_name: None,
                    },
                )?,
            };
            reviews::claim_review(&tx, &review.id, reviewer_id, reviewer_name)?;

            tx.commit()
                .map_err(|e| PortfolioError::Internal(format!("Commit failed: {}", e)))?;
            Ok(item)
        })?;

        self.events.emit(PortfolioEvent::StatusChanged {
            id: id.to_string(),
            from: ItemStatus::Submitted,
            to: ItemStatus::InReview,
        });

        Ok(item)
    }

    /// Approve an item. `approved_at` is set on first approval only.
    pub fn approve(&self, id: &str) -> Result<ItemRow, PortfolioError> {
        let item = self
            .db
            .with_conn_mut(|conn| items::transition(conn, id, ItemStatus::Approved))?;

        info!(id = %id, "Item approved");
        self.events.emit(PortfolioEvent::StatusChanged {
            id: id.to_string(),
            from: ItemStatus::InReview,
            to: ItemStatus::Approved,
        });

        Ok(item)
    }

    /// Send an item back to its owner for changes
    pub fn request_changes(&self, id: &str) -> Result<ItemRow, PortfolioError> {
        let item = self
            .db
            .with_conn_mut(|conn| items::transition(conn, id, ItemStatus::ChangesRequested))?;

        self.events.emit(PortfolioEvent::StatusChanged {
            id: id.to_string(),
            from: ItemStatus::InReview,
            to: ItemStatus::ChangesRequested,
        });

        Ok(item)
    }

    /// Publish an approved item, making it visible beyond private.
    ///
    /// `published_at` is set exactly once.
    pub fn publish(&self, id: &str, visibility: Visibility) -> Result<ItemRow, PortfolioError> {
        if visibility == Visibility::Private {
            return Err(PortfolioError::InvalidInput(
                "published items must be visible beyond private".to_string(),
            ));
        }

        let item = self.db.with_conn_mut(|conn| {
            let tx = conn
                .transaction()
                .map_err(|e| PortfolioError::Internal(format!("Transaction failed: {}", e)))?;

            items::transition(&tx, id, ItemStatus::Published)?;
            let item = items::set_visibility(&tx, id, visibility)?;

            tx.commit()
                .map_err(|e| PortfolioError::Internal(format!("Commit failed: {}", e)))?;
            Ok(item)
        })?;

        info!(id = %id, visibility = %visibility, "Item published");
        self.events.emit(PortfolioEvent::StatusChanged {
            id: id.to_string(),
            from: ItemStatus::Approved,
            to: ItemStatus::Published,
        });

        Ok(item)
    }

    /// Set visibility on a single item (public gated on approval)
    pub fn set_visibility(
        &self,
        id: &str,
        visibility: Visibility,
    ) -> Result<ItemRow, PortfolioError> {
        let item = self
            .db
            .with_conn_mut(|conn| items::set_visibility(conn, id, visibility))?;

        self.events
            .emit(PortfolioEvent::ItemUpdated { id: id.to_string() });

        Ok(item)
    }

    // =========================================================================
    // Telemetry
    // =========================================================================

    /// Record a marketplace view
    pub fn record_view(&self, id: &str) -> Result<(), PortfolioError> {
        self.db.with_conn_mut(|conn| items::record_view(conn, id))?;
        self.events.emit(PortfolioEvent::TelemetryRecorded {
            item_id: id.to_string(),
        });
        Ok(())
    }

    /// Record an employer contact
    pub fn record_contact(&self, id: &str) -> Result<(), PortfolioError> {
        self.db.with_conn_mut(|conn| items::record_contact(conn, id))?;
        self.events.emit(PortfolioEvent::TelemetryRecorded {
            item_id: id.to_string(),
        });
        Ok(())
    }

    // =========================================================================
    // Validation
    // =========================================================================

    fn validate_create(&self, input: &CreateItemInput) -> Result<(), PortfolioError> {
        if input.user_id.is_empty() {
            return Err(PortfolioError::InvalidInput("user_id is required".into()));
        }
        validate_title(&input.title)?;
        validate_competencies(&input.competencies)?;

        // Items cannot be born public unless born approved (fast-path)
        if input.visibility == Visibility::Public && !input.status.allows_public_visibility() {
            return Err(PortfolioError::InvalidInput(
                "new items cannot be public before approval".into(),
            ));
        }

        // Creation states are draft, or approved via the mission fast-path
        if !matches!(input.status, ItemStatus::Draft | ItemStatus::Approved) {
            return Err(PortfolioError::InvalidInput(format!(
                "items cannot be created in status '{}'",
                input.status
            )));
        }

        Ok(())
    }
}

fn validate_title(title: &str) -> Result<(), PortfolioError> {
    if title.trim().is_empty() {
        return Err(PortfolioError::InvalidInput("title is required".into()));
    }
    if title.len() > 500 {
        return Err(PortfolioError::InvalidInput(
            "title must be <= 500 characters".into(),
        ));
    }
    Ok(())
}

fn validate_competencies(
    competencies: &std::collections::HashMap<String, f64>,
) -> Result<(), PortfolioError> {
    for (name, score) in competencies {
        if !(0.0..=10.0).contains(score) {
            return Err(PortfolioError::InvalidInput(format!(
                "competency '{}' score {} outside 0-10",
                name, score
            )));
        }
    }
    Ok(())
}
