//! Review service - reviewer workflow over submitted items
//!
//! A verdict both finalizes the review record and mirrors onto the item's
//! lifecycle: approve moves the item to `approved`, anything else sends it
//! back to `changes_requested`. Review history is append-only once the item
//! is published.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::Config;
use crate::db::{reviews, ItemRow, PortfolioDb, ReviewRow};
use crate::error::PortfolioError;
use crate::model::{ItemStatus, ReviewStatus};
use crate::rubric;
use crate::scorer;

use super::events::{EventBus, PortfolioEvent};
use super::item_service::ItemService;
use super::profile_service::ProfileService;

/// Explicit reviewer decision, overriding the score threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    RequestChanges,
}

/// Result of submitting a review
#[derive(Debug, Clone)]
pub struct ReviewOutcome {
    pub review: ReviewRow,
    pub item: ItemRow,
    pub approved: bool,
}

/// Review service
pub struct ReviewService {
    db: Arc<PortfolioDb>,
    events: Arc<EventBus>,
    items: Arc<ItemService>,
    profiles: Arc<ProfileService>,
    config: Config,
}

impl ReviewService {
    /// Create a new review service
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

    /// Get review by ID
    pub fn get(&self, id: &str) -> Result<Option<ReviewRow>, PortfolioError> {
        self.db.with_conn(|conn| reviews::get_review(conn, id))
    }

    /// List reviews for an item, newest first
    pub fn list_for_item(&self, item_id: &str) -> Result<Vec<ReviewRow>, PortfolioError> {
        self.db
            .with_conn(|conn| reviews::get_reviews_for_item(conn, item_id))
    }

    /// Submit a reviewer's verdict for an item currently in review.
    ///
    /// Raw criterion scores are clamped to 0-10 before weighting; unknown
    /// criterion ids are rejected. Without an explicit decision, the
    /// weighted total against the configured publish threshold decides.
    pub fn submit_review(
        &self,
        item_id: &str,
        reviewer_id: &str,
        reviewer_name: Option<&str>,
        raw_scores: &HashMap<String, f64>,
        comments: Option<&str>,
        decision: Option<ReviewDecision>,
    ) -> Result<ReviewOutcome, PortfolioError> {
        let item = self
            .items
            .get(item_id)?
            .ok_or_else(|| PortfolioError::NotFound(format!("item {}", item_id)))?;

        if item.status == ItemStatus::Published {
            return Err(PortfolioError::Conflict(format!(
                "item {} is published; its review history is append-only",
                item_id
            )));
        }
        if item.status != ItemStatus::InReview {
            return Err(PortfolioError::Conflict(format!(
                "item {} is not in review (status {})",
                item_id, item.status
            )));
        }

        let rubric = rubric::rubric_for(item.item_type);

        let mut scores: HashMap<String, f64> = HashMap::new();
        for (criterion_id, raw) in raw_scores {
            if !rubric.criteria.iter().any(|c| c.id == criterion_id) {
                return Err(PortfolioError::InvalidInput(format!(
                    "unknown criterion '{}' for {} rubric",
                    criterion_id, item.item_type
                )));
            }
            scores.insert(criterion_id.clone(), scorer::clamp_score(*raw));
        }

        let total = scorer::weighted_total(rubric, &scores);

        let approve = match decision {
            Some(ReviewDecision::Approve) => true,
            Some(ReviewDecision::RequestChanges) => false,
            None => total >= self.config.publish_threshold,
        };
        let review_status = if approve {
            ReviewStatus::Approved
        } else {
            ReviewStatus::ChangesRequested
        };

        let review = self.db.with_conn_mut(|conn| {
            let review = match reviews::latest_pending_review(conn, item_id)? {
                Some(review) => review,
                None => reviews::create_review(
                    conn,
                    crate::db::CreateReviewInput {
                        item_id: item_id.to_string(),
                        reviewer_id: None,
                        reviewer_name: None,
                    },
                )?,
            };
            reviews::claim_review(conn, &review.id, reviewer_id, reviewer_name)?;
            reviews::finalize_review(conn, &review.id, &scores, total, comments, review_status)
        })?;

        // Mirror the verdict onto the item lifecycle
        let item = if approve {
            self.items.approve(item_id)?
        } else {
            self.items.request_changes(item_id)?
        };

        info!(
            item = %item_id,
            total = total,
            approved = approve,
            "Review submitted"
        );
        self.events.emit(PortfolioEvent::ReviewSubmitted {
            id: review.id.clone(),
            item_id: item_id.to_string(),
            total_score: total,
        });

        // A verdict changes the user's approved set (or its quality signal)
        self.profiles.refresh(&item.user_id)?;

        Ok(ReviewOutcome {
            review,
            item,
            approved: approve,
        })
    }
}
