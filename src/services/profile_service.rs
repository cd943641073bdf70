//! Profile service - marketplace profile materialization and ranking
//!
//! Profiles are a derived view: `refresh` rebuilds one from the user's item
//! set at any time, and the ranking query recomputes the full population
//! ordering from current rows. Stale reads are acceptable; mutations go
//! through the item store.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::db::{items, profiles, reviews, ItemRow, PortfolioDb, ProfileRow, UpsertProfileInput};
use crate::error::PortfolioError;
use crate::model::{current_timestamp, ItemStatus};
use crate::notify::{ReadinessSink, ReadinessUpdate};
use crate::ranking::{self, ProfileSnapshot, RankedProfile};

use super::events::{EventBus, PortfolioEvent};

/// Profile service
pub struct ProfileService {
    db: Arc<PortfolioDb>,
    events: Arc<EventBus>,
    readiness: Option<Arc<dyn ReadinessSink>>,
    config: Config,
}

impl ProfileService {
    /// Create a new profile service
    pub fn new(
        db: Arc<PortfolioDb>,
        events: Arc<EventBus>,
        readiness: Option<Arc<dyn ReadinessSink>>,
        config: Config,
    ) -> Self {
        Self {
            db,
            events,
            readiness,
            config,
        }
    }

    /// Get profile by user ID
    pub fn get(&self, user_id: &str) -> Result<Option<ProfileRow>, PortfolioError> {
        self.db.with_conn(|conn| profiles::get_profile(conn, user_id))
    }

    // =========================================================================
    // Materialization
    // =========================================================================

    /// Rebuild a user's profile projection from their item set.
    ///
    /// Creates the profile row the first time portfolio health reaches the
    /// configured threshold; before that, returns `None` and writes nothing.
    /// Pushes the refreshed health to the readiness sink (best-effort).
    pub fn refresh(&self, user_id: &str) -> Result<Option<ProfileRow>, PortfolioError> {
        let (existing, item_rows) = self.db.with_conn(|conn| {
            let existing = profiles::get_profile(conn, user_id)?;
            let item_rows = items::list_items(
                conn,
                &crate::db::ItemQuery {
                    user_id: Some(user_id.to_string()),
                    limit: u32::MAX,
                    ..Default::default()
                },
            )?;
            Ok((existing, item_rows))
        })?;

        let visible: Vec<&ItemRow> = item_rows
            .iter()
            .filter(|i| matches!(i.status, ItemStatus::Approved | ItemStatus::Published))
            .collect();

        let qualities: Vec<f64> = self.db.with_conn(|conn| {
            visible
                .iter()
                .map(|item| item_quality(conn, item))
                .collect()
        })?;

        let health_score = mean(&qualities);

        if existing.is_none() && health_score < self.config.profile_health_threshold {
            debug!(
                user = %user_id,
                health = health_score,
                "Portfolio health below profile threshold, no profile yet"
            );
            return Ok(None);
        }

        // Aggregate skills: each skill carries the best quality of an item
        // evidencing it
        let mut skills: HashMap<String, f64> = HashMap::new();
        for (item, quality) in visible.iter().zip(&qualities) {
            for skill in &item.skills {
                let entry = skills.entry(skill.clone()).or_insert(0.0);
                if *quality > *entry {
                    *entry = *quality;
                }
            }
        }

        let total_views: i64 = item_rows.iter().map(|i| i.view_count).sum();

        // Featured: newest approved/published first
        let mut featured_items: Vec<&&ItemRow> = visible.iter().collect();
        featured_items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let featured: Vec<String> = featured_items
            .iter()
            .take(self.config.featured_limit)
            .map(|i| i.id.clone())
            .collect();

        let username = existing
            .as_ref()
            .map(|p| p.username.clone())
            .unwrap_or_else(|| user_id.to_string());

        let profile = self.db.with_conn(|conn| {
            profiles::upsert_profile(
                conn,
                &UpsertProfileInput {
                    user_id: user_id.to_string(),
                    username,
                    health_score,
                    total_views,
                    featured,
                    skills,
                },
            )
        })?;

        if existing.is_none() {
            info!(user = %user_id, health = health_score, "Marketplace profile created");
        }

        self.events.emit(PortfolioEvent::ProfileRefreshed {
            user_id: user_id.to_string(),
            health_score,
        });

        self.push_readiness(user_id, health_score);

        Ok(Some(profile))
    }

    /// Best-effort push of refreshed aggregates to the analytics service.
    /// Failures are logged and swallowed; nothing here blocks the refresh.
    fn push_readiness(&self, user_id: &str, score: f64) {
        let Some(sink) = &self.readiness else {
            return;
        };

        let update = ReadinessUpdate {
            user_id: user_id.to_string(),
            score,
            updated_at: current_timestamp(),
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let sink = sink.clone();
                handle.spawn(async move {
                    if let Err(e) = sink.push(&update).await {
                        warn!(user = %update.user_id, error = %e, "Readiness push failed");
                    }
                });
            }
            Err(_) => {
                debug!("No async runtime, skipping readiness push");
            }
        }
    }

    // =========================================================================
    // Ranking
    // =========================================================================

    /// Rank the active profile population.
    ///
    /// Read-only; tolerates snapshots taken while mutations are in flight.
    pub fn rank_marketplace(&self) -> Result<Vec<RankedProfile>, PortfolioError> {
        let snapshots = self.db.with_conn(|conn| {
            let rows = profiles::list_active_profiles(conn)?;

            let mut snapshots = Vec::with_capacity(rows.len());
            for profile in rows {
                let item_rows = items::list_items(
                    conn,
                    &crate::db::ItemQuery {
                        user_id: Some(profile.user_id.clone()),
                        limit: u32::MAX,
                        ..Default::default()
                    },
                )?;

                let visible: Vec<&ItemRow> = item_rows
                    .iter()
                    .filter(|i| {
                        matches!(i.status, ItemStatus::Approved | ItemStatus::Published)
                    })
                    .collect();

                let competency_means: Vec<f64> = visible
                    .iter()
                    .filter_map(|item| {
                        let competencies = item.competencies();
                        if competencies.is_empty() {
                            None
                        } else {
                            let values: Vec<f64> = competencies.values().copied().collect();
                            Some(mean(&values))
                        }
                    })
                    .collect();

                snapshots.push(ProfileSnapshot {
                    user_id: profile.user_id.clone(),
                    username: profile.username.clone(),
                    created_at: profile.created_at.clone(),
                    total_views: profile.total_views,
                    readiness_score: profile.readiness_score,
                    health_score: profile.health_score,
                    approved_items: visible.len() as i64,
                    avg_competency: mean(&competency_means),
                    age_days: age_days(&profile.created_at),
                });
            }
            Ok(snapshots)
        })?;

        Ok(ranking::rank_profiles(snapshots))
    }

    // =========================================================================
    // Telemetry & presentation
    // =========================================================================

    /// Store the externally computed readiness score (clamped to 0-100)
    pub fn set_readiness(&self, user_id: &str, score: f64) -> Result<(), PortfolioError> {
        let score = score.clamp(0.0, 100.0);
        self.db
            .with_conn(|conn| profiles::set_readiness(conn, user_id, score))
    }

    /// Store an externally computed weekly rank delta
    pub fn set_weekly_rank_delta(&self, user_id: &str, delta: i64) -> Result<(), PortfolioError> {
        self.db
            .with_conn(|conn| profiles::set_weekly_rank_delta(conn, user_id, delta))
    }

    /// Update the public presentation fields
    pub fn set_identity(
        &self,
        user_id: &str,
        username: &str,
        headline: Option<&str>,
        bio: Option<&str>,
        avatar_url: Option<&str>,
    ) -> Result<ProfileRow, PortfolioError> {
        if username.trim().is_empty() {
            return Err(PortfolioError::InvalidInput("username is required".into()));
        }
        self.db.with_conn(|conn| {
            profiles::set_identity(conn, user_id, username, headline, bio, avatar_url)
        })
    }

    /// Deactivate a profile (rows are never deleted)
    pub fn deactivate(&self, user_id: &str) -> Result<(), PortfolioError> {
        self.db
            .with_conn(|conn| profiles::set_active(conn, user_id, false))
    }

    /// Reactivate a profile
    pub fn reactivate(&self, user_id: &str) -> Result<(), PortfolioError> {
        self.db
            .with_conn(|conn| profiles::set_active(conn, user_id, true))
    }
}

/// Quality signal for one item: the latest finalized review total, else the
/// mean of its competency scores (fast-path items have no review), else 0.
fn item_quality(
    conn: &rusqlite::Connection,
    item: &ItemRow,
) -> Result<f64, PortfolioError> {
    let review_total = reviews::get_reviews_for_item(conn, &item.id)?
        .into_iter()
        .find(|r| r.status != crate::model::ReviewStatus::Pending)
        .map(|r| r.total_score);

    if let Some(total) = review_total {
        return Ok(total);
    }

    let competencies = item.competencies();
    if competencies.is_empty() {
        return Ok(0.0);
    }
    let values: Vec<f64> = competencies.values().copied().collect();
    Ok(mean(&values))
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Profile age in days from an ISO 8601 or SQLite datetime string
fn age_days(created_at: &str) -> f64 {
    let parsed = chrono::DateTime::parse_from_rfc3339(created_at)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(created_at, "%Y-%m-%d %H:%M:%S")
                .map(|n| n.and_utc())
        });

    match parsed {
        Ok(dt) => ((chrono::Utc::now() - dt).num_seconds() as f64 / 86_400.0).max(0.0),
        Err(_) => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(mean(&[4.0, 6.0]), 5.0);
    }

    #[test]
    fn test_age_days_parses_both_formats() {
        assert!(age_days("2020-01-01T00:00:00Z") > 365.0);
        assert!(age_days("2020-01-01 00:00:00") > 365.0);
        assert_eq!(age_days("not a date"), 0.0);
    }
}
