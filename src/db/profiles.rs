//! Marketplace profile CRUD operations
//!
//! Profiles are a materialized view owned by the ranking side: rebuildable
//! at any time from items plus external telemetry. Rows are never deleted,
//! only deactivated.

use std::collections::HashMap;

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::error::PortfolioError;
use crate::model::current_timestamp;

/// Profile row from database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileRow {
    pub user_id: String,
    pub username: String,
    pub headline: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub readiness_score: f64,
    pub health_score: f64,
    pub total_views: i64,
    pub weekly_rank_delta: i64,
    pub featured_json: Option<String>,
    pub skills_json: Option<String>,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl ProfileRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        let active: i64 = row.get("active")?;
        Ok(Self {
            user_id: row.get("user_id")?,
            username: row.get("username")?,
            headline: row.get("headline")?,
            bio: row.get("bio")?,
            avatar_url: row.get("avatar_url")?,
            readiness_score: row.get("readiness_score")?,
            health_score: row.get("health_score")?,
            total_views: row.get("total_views")?,
            weekly_rank_delta: row.get("weekly_rank_delta")?,
            featured_json: row.get("featured_json")?,
            skills_json: row.get("skills_json")?,
            active: active != 0,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Featured item ids, in display order
    pub fn featured(&self) -> Vec<String> {
        self.featured_json
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_default()
    }

    /// Aggregated skill -> score map
    pub fn skills(&self) -> HashMap<String, f64> {
        self.skills_json
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_default()
    }
}

/// Input for creating/refreshing a profile projection
#[derive(Debug, Clone, Deserialize)]
pub struct UpsertProfileInput {
    pub user_id: String,
    pub username: String,
    pub health_score: f64,
    pub total_views: i64,
    #[serde(default)]
    pub featured: Vec<String>,
    #[serde(default)]
    pub skills: HashMap<String, f64>,
}

/// Get profile by user ID
pub fn get_profile(conn: &Connection, user_id: &str) -> Result<Option<ProfileRow>, PortfolioError> {
    let mut stmt = conn
        .prepare("SELECT * FROM profiles WHERE user_id = ?")
        .map_err(|e| PortfolioError::Internal(format!("Prepare failed: {}", e)))?;

    let mut rows = stmt
        .query(params![user_id])
        .map_err(|e| PortfolioError::Internal(format!("Query failed: {}", e)))?;

    match rows
        .next()
        .map_err(|e| PortfolioError::Internal(format!("Row fetch failed: {}", e)))?
    {
        Some(row) => Ok(Some(ProfileRow::from_row(row).map_err(|e| {
            PortfolioError::Internal(format!("Row parse failed: {}", e))
        })?)),
        None => Ok(None),
    }
}

/// List active profiles, oldest first (stable ranking tie-break order)
pub fn list_active_profiles(conn: &Connection) -> Result<Vec<ProfileRow>, PortfolioError> {
    let mut stmt = conn
        .prepare("SELECT * FROM profiles WHERE active = 1 ORDER BY created_at ASC, user_id ASC")
        .map_err(|e| PortfolioError::Internal(format!("Prepare failed: {}", e)))?;

    let rows = stmt
        .query_map([], |row| ProfileRow::from_row(row))
        .map_err(|e| PortfolioError::Internal(format!("Query failed: {}", e)))?;

    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| PortfolioError::Internal(format!("Row parse failed: {}", e)))
}

/// Create or refresh a profile projection. `created_at` and the
/// presentation fields survive refreshes.
pub fn upsert_profile(
    conn: &Connection,
    input: &UpsertProfileInput,
) -> Result<ProfileRow, PortfolioError> {
    let now = current_timestamp();
    let featured_json = serde_json::to_string(&input.featured)?;
    let skills_json = serde_json::to_string(&input.skills)?;

    conn.execute(
        r#"
        INSERT INTO profiles (
            user_id, username, health_score, total_views,
            featured_json, skills_json, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
        ON CONFLICT(user_id) DO UPDATE SET
            health_score = excluded.health_score,
            total_views = excluded.total_views,
            featured_json = excluded.featured_json,
            skills_json = excluded.skills_json,
            updated_at = excluded.updated_at
        "#,
        params![
            input.user_id,
            input.username,
            input.health_score,
            input.total_views,
            featured_json,
            skills_json,
            now,
        ],
    )
    .map_err(|e| PortfolioError::Internal(format!("Upsert failed: {}", e)))?;

    get_profile(conn, &input.user_id)?
        .ok_or_else(|| PortfolioError::Internal("Profile not found after upsert".to_string()))
}

/// Update the public presentation fields
pub fn set_identity(
    conn: &Connection,
    user_id: &str,
    username: &str,
    headline: Option<&str>,
    bio: Option<&str>,
    avatar_url: Option<&str>,
) -> Result<ProfileRow, PortfolioError> {
    let changed = conn
        .execute(
            "UPDATE profiles SET username = ?, headline = ?, bio = ?, avatar_url = ?, \
             updated_at = ? WHERE user_id = ?",
            params![username, headline, bio, avatar_url, current_timestamp(), user_id],
        )
        .map_err(|e| PortfolioError::Internal(format!("Update failed: {}", e)))?;

    if changed == 0 {
        return Err(PortfolioError::NotFound(format!("profile {}", user_id)));
    }

    get_profile(conn, user_id)?
        .ok_or_else(|| PortfolioError::Internal("Profile not found after update".to_string()))
}

/// Store the externally computed readiness score (0-100)
pub fn set_readiness(conn: &Connection, user_id: &str, score: f64) -> Result<(), PortfolioError> {
    let changed = conn
        .execute(
            "UPDATE profiles SET readiness_score = ?, updated_at = ? WHERE user_id = ?",
            params![score, current_timestamp(), user_id],
        )
        .map_err(|e| PortfolioError::Internal(format!("Update failed: {}", e)))?;

    if changed == 0 {
        return Err(PortfolioError::NotFound(format!("profile {}", user_id)));
    }
    Ok(())
}

/// Store an externally computed weekly rank delta
pub fn set_weekly_rank_delta(
    conn: &Connection,
    user_id: &str,
    delta: i64,
) -> Result<(), PortfolioError> {
    let changed = conn
        .execute(
            "UPDATE profiles SET weekly_rank_delta = ?, updated_at = ? WHERE user_id = ?",
            params![delta, current_timestamp(), user_id],
        )
        .map_err(|e| PortfolioError::Internal(format!("Update failed: {}", e)))?;

    if changed == 0 {
        return Err(PortfolioError::NotFound(format!("profile {}", user_id)));
    }
    Ok(())
}

/// Activate or deactivate a profile (profiles are never deleted)
pub fn set_active(conn: &Connection, user_id: &str, active: bool) -> Result<(), PortfolioError> {
    let changed = conn
        .execute(
            "UPDATE profiles SET active = ?, updated_at = ? WHERE user_id = ?",
            params![active as i64, current_timestamp(), user_id],
        )
        .map_err(|e| PortfolioError::Internal(format!("Update failed: {}", e)))?;

    if changed == 0 {
        return Err(PortfolioError::NotFound(format!("profile {}", user_id)));
    }
    Ok(())
}
