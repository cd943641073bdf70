//! Review CRUD operations
//!
//! Reviews link 1:N to items and double as audit history: they are never
//! deleted with their item, and the service layer freezes them once the
//! item reaches `published`.

use std::collections::HashMap;

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PortfolioError;
use crate::model::{current_timestamp, ReviewStatus};

/// Review row from database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRow {
    pub id: String,
    pub item_id: String,
    pub reviewer_id: Option<String>,
    pub reviewer_name: Option<String>,
    pub scores_json: Option<String>,
    pub total_score: f64,
    pub comments: Option<String>,
    pub status: ReviewStatus,
    pub created_at: String,
    pub updated_at: String,
}

impl ReviewRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        let status: String = row.get("status")?;
        Ok(Self {
            id: row.get("id")?,
            item_id: row.get("item_id")?,
            reviewer_id: row.get("reviewer_id")?,
            reviewer_name: row.get("reviewer_name")?,
            scores_json: row.get("scores_json")?,
            total_score: row.get("total_score")?,
            comments: row.get("comments")?,
            status: ReviewStatus::parse(&status).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    format!("unknown review status '{}'", status).into(),
                )
            })?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Parsed criterion scores; storage parse failures read as empty
    pub fn scores(&self) -> HashMap<String, f64> {
        self.scores_json
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_default()
    }
}

/// Input for creating a review (pending, created on submit)
#[derive(Debug, Clone, Deserialize)]
pub struct CreateReviewInput {
    pub item_id: String,
    #[serde(default)]
    pub reviewer_id: Option<String>,
    #[serde(default)]
    pub reviewer_name: Option<String>,
}

/// Get review by ID
pub fn get_review(conn: &Connection, id: &str) -> Result<Option<ReviewRow>, PortfolioError> {
    let mut stmt = conn
        .prepare("SELECT * FROM reviews WHERE id = ?")
        .map_err(|e| PortfolioError::Internal(format!("Prepare failed: {}", e)))?;

    let mut rows = stmt
        .query(params![id])
        .map_err(|e| PortfolioError::Internal(format!("Query failed: {}", e)))?;

    match rows
        .next()
        .map_err(|e| PortfolioError::Internal(format!("Row fetch failed: {}", e)))?
    {
        Some(row) => Ok(Some(ReviewRow::from_row(row).map_err(|e| {
            PortfolioError::Internal(format!("Row parse failed: {}", e))
        })?)),
        None => Ok(None),
    }
}

/// List reviews for an item, newest first
pub fn get_reviews_for_item(
    conn: &Connection,
    item_id: &str,
) -> Result<Vec<ReviewRow>, PortfolioError> {
    let mut stmt = conn
        .prepare("SELECT * FROM reviews WHERE item_id = ? ORDER BY created_at DESC, id DESC")
        .map_err(|e| PortfolioError::Internal(format!("Prepare failed: {}", e)))?;

    let rows = stmt
        .query_map(params![item_id], |row| ReviewRow::from_row(row))
        .map_err(|e| PortfolioError::Internal(format!("Query failed: {}", e)))?;

    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| PortfolioError::Internal(format!("Row parse failed: {}", e)))
}

/// Get the most recent pending review for an item, if any
pub fn latest_pending_review(
    conn: &Connection,
    item_id: &str,
) -> Result<Option<ReviewRow>, PortfolioError> {
    let mut stmt = conn
        .prepare(
            "SELECT * FROM reviews WHERE item_id = ? AND status = 'pending' \
             ORDER BY created_at DESC, id DESC LIMIT 1",
        )
        .map_err(|e| PortfolioError::Internal(format!("Prepare failed: {}", e)))?;

    let mut rows = stmt
        .query(params![item_id])
        .map_err(|e| PortfolioError::Internal(format!("Query failed: {}", e)))?;

    match rows
        .next()
        .map_err(|e| PortfolioError::Internal(format!("Row fetch failed: {}", e)))?
    {
        Some(row) => Ok(Some(ReviewRow::from_row(row).map_err(|e| {
            PortfolioError::Internal(format!("Row parse failed: {}", e))
        })?)),
        None => Ok(None),
    }
}

/// Create a pending review
pub fn create_review(
    conn: &Connection,
    input: CreateReviewInput,
) -> Result<ReviewRow, PortfolioError> {
    let id = Uuid::new_v4().to_string();
    let now = current_timestamp();

    conn.execute(
        r#"
        INSERT INTO reviews (id, item_id, reviewer_id, reviewer_name, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, 'pending', ?, ?)
        "#,
        params![id, input.item_id, input.reviewer_id, input.reviewer_name, now, now],
    )
    .map_err(|e| PortfolioError::Internal(format!("Insert failed: {}", e)))?;

    get_review(conn, &id)?
        .ok_or_else(|| PortfolioError::Internal("Review not found after insert".to_string()))
}

/// Claim a pending review when a reviewer starts scoring
pub fn claim_review(
    conn: &Connection,
    id: &str,
    reviewer_id: &str,
    reviewer_name: Option<&str>,
) -> Result<ReviewRow, PortfolioError> {
    let changed = conn
        .execute(
            "UPDATE reviews SET reviewer_id = ?, reviewer_name = ?, updated_at = ? \
             WHERE id = ? AND status = 'pending'",
            params![reviewer_id, reviewer_name, current_timestamp(), id],
        )
        .map_err(|e| PortfolioError::Internal(format!("Update failed: {}", e)))?;

    if changed == 0 {
        return Err(PortfolioError::Conflict(format!(
            "review {} is not pending",
            id
        )));
    }

    get_review(conn, id)?
        .ok_or_else(|| PortfolioError::Internal("Review not found after update".to_string()))
}

/// Record a reviewer's verdict: scores, total, comments and outcome status
pub fn finalize_review(
    conn: &Connection,
    id: &str,
    scores: &HashMap<String, f64>,
    total_score: f64,
    comments: Option<&str>,
    status: ReviewStatus,
) -> Result<ReviewRow, PortfolioError> {
    let scores_json = serde_json::to_string(scores)?;

    let changed = conn
        .execute(
            "UPDATE reviews SET scores_json = ?, total_score = ?, comments = ?, status = ?, \
             updated_at = ? WHERE id = ?",
            params![
                scores_json,
                total_score,
                comments,
                status.as_str(),
                current_timestamp(),
                id
            ],
        )
        .map_err(|e| PortfolioError::Internal(format!("Update failed: {}", e)))?;

    if changed == 0 {
        return Err(PortfolioError::NotFound(format!("review {}", id)));
    }

    get_review(conn, id)?
        .ok_or_else(|| PortfolioError::Internal("Review not found after update".to_string()))
}
