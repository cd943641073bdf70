//! Coordination service - cross-subsystem consistency
//!
//! Three independent, idempotent operations:
//! 1. Visibility sync: a settings change propagates to every approved item
//!    the user owns, transactionally.
//! 2. Mission auto-creation: completed missions above the policy cutoff
//!    become portfolio items, deduplicated per (user, mission).
//! 3. Notification fan-out: handled by the dispatcher the item service
//!    enqueues to on every creation; nothing here awaits delivery.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::Config;
use crate::db::{items, CreateItemInput, ItemRow, PortfolioDb};
use crate::error::PortfolioError;
use crate::model::{ItemStatus, ItemType, MissionCompleted, Visibility, VisibilityChanged};
use crate::skills;

use super::events::{EventBus, PortfolioEvent};
use super::item_service::ItemService;
use super::profile_service::ProfileService;

/// Coordination service
pub struct CoordinationService {
    db: Arc<PortfolioDb>,
    events: Arc<EventBus>,
    items: Arc<ItemService>,
    profiles: Arc<ProfileService>,
    config: Config,
}

impl CoordinationService {
    /// Create a new coordination service
    pub fn new(
        db: Arc<PortfolioDb>,
        events: Arc<EventBus>,
        items: Arc<ItemService>,
        profiles: Arc<ProfileService>,
        config: Config,
    ) -> Self {
        Self {
            db,
            events,
            items,
            profiles,
            config,
        }
    }

    // =========================================================================
    // Visibility Sync
    // =========================================================================

    /// Propagate a user's portfolio-visibility preference to all their
    /// approved items.
    ///
    /// Items still in draft or review keep their visibility; it is
    /// finalized only once approved. The update runs in one transaction:
    /// on failure a `Sync` error surfaces and no partial state remains.
    /// Returns the number of items updated.
    pub fn sync_visibility(&self, event: &VisibilityChanged) -> Result<usize, PortfolioError> {
        if event.user_id.is_empty() {
            return Err(PortfolioError::InvalidInput("user_id is required".into()));
        }

        let updated = self.db.with_conn_mut(|conn| {
            items::sync_user_visibility(conn, &event.user_id, event.new_visibility)
        })?;

        info!(
            user = %event.user_id,
            visibility = %event.new_visibility,
            updated = updated,
            "Visibility preference synced"
        );
        self.events.emit(PortfolioEvent::VisibilitySynced {
            user_id: event.user_id.clone(),
            visibility: event.new_visibility,
            items_updated: updated,
        });

        Ok(updated)
    }

    // =========================================================================
    // Mission Auto-Creation
    // =========================================================================

    /// Turn a completed mission into a portfolio item, once.
    ///
    /// Policy: below the auto-create cutoff nothing happens; in
    /// [auto_create, auto_approve) the item starts in draft; at or above
    /// the auto-approve cutoff it is created approved outright, a fast-path
    /// that skips human review for very high scores.
    ///
    /// Idempotent per (user, mission): re-invocation returns the existing
    /// item and creates nothing.
    pub fn complete_mission(
        &self,
        event: &MissionCompleted,
    ) -> Result<Option<ItemRow>, PortfolioError> {
        if event.user_id.is_empty() || event.mission_id.is_empty() {
            return Err(PortfolioError::InvalidInput(
                "user_id and mission_id are required".into(),
            ));
        }

        if let Some(existing) = self.db.with_conn(|conn| {
            items::get_item_by_mission(conn, &event.user_id, &event.mission_id)
        })? {
            debug!(
                user = %event.user_id,
                mission = %event.mission_id,
                item = %existing.id,
                "Mission already has a portfolio item"
            );
            return Ok(Some(existing));
        }

        if event.score < self.config.auto_create_min_score {
            debug!(
                user = %event.user_id,
                mission = %event.mission_id,
                score = event.score,
                "Mission score below auto-create cutoff"
            );
            return Ok(None);
        }

        let status = if event.score >= self.config.auto_approve_min_score {
            ItemStatus::Approved
        } else {
            ItemStatus::Draft
        };

        let extracted = skills::extract_skills(&event.title, &event.evidence_files, &event.skills);

        let mut competencies = HashMap::new();
        competencies.insert("overall".to_string(), (event.score / 10.0).clamp(0.0, 10.0));

        let input = CreateItemInput {
            id: None,
            user_id: event.user_id.clone(),
            title: event.title.clone(),
            summary: Some(format!("Completed mission with a score of {:.0}", event.score)),
            item_type: ItemType::Mission,
            mission_id: Some(event.mission_id.clone()),
            provider: None,
            competencies,
            evidence: event.evidence_files.clone(),
            status,
            visibility: Visibility::Private,
            skills: extracted,
        };

        let item = match self.items.create(input) {
            Ok(item) => item,
            Err(PortfolioError::Internal(e)) if e.contains("UNIQUE") => {
                // Lost a race against a concurrent completion event; the
                // unique (user, mission) index kept the dedupe invariant
                return self.db.with_conn(|conn| {
                    items::get_item_by_mission(conn, &event.user_id, &event.mission_id)
                });
            }
            Err(e) => return Err(e),
        };

        info!(
            user = %event.user_id,
            mission = %event.mission_id,
            item = %item.id,
            status = %item.status,
            "Mission auto-created portfolio item"
        );

        // Fast-path items change the user's approved set immediately
        if status == ItemStatus::Approved {
            self.profiles.refresh(&event.user_id)?;
        }

        Ok(Some(item))
    }
}
