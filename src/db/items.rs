//! Portfolio item CRUD and lifecycle operations
//!
//! All status changes go through [`transition`], an atomic check-and-set on
//! the current status. Content updates carry the caller's expected `version`
//! and fail with `Conflict` when a concurrent writer got there first.

use std::collections::HashMap;

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::PortfolioError;
use crate::model::{
    current_timestamp, EvidenceFile, ItemStatus, ItemType, ProviderMetadata, Visibility,
};

/// Portfolio item row from database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRow {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub summary: Option<String>,
    pub item_type: ItemType,
    pub mission_id: Option<String>,
    pub provider_json: Option<String>,
    pub competencies_json: Option<String>,
    pub evidence_json: Option<String>,
    pub status: ItemStatus,
    pub visibility: Visibility,
    pub view_count: i64,
    pub contact_count: i64,
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
    pub approved_at: Option<String>,
    pub published_at: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
}

impl ItemRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        let item_type: String = row.get("item_type")?;
        let status: String = row.get("status")?;
        let visibility: String = row.get("visibility")?;

        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            title: row.get("title")?,
            summary: row.get("summary")?,
            item_type: ItemType::parse(&item_type)
                .ok_or_else(|| bad_enum("item_type", &item_type))?,
            mission_id: row.get("mission_id")?,
            provider_json: row.get("provider_json")?,
            competencies_json: row.get("competencies_json")?,
            evidence_json: row.get("evidence_json")?,
            status: ItemStatus::parse(&status).ok_or_else(|| bad_enum("status", &status))?,
            visibility: Visibility::parse(&visibility)
                .ok_or_else(|| bad_enum("visibility", &visibility))?,
            view_count: row.get("view_count")?,
            contact_count: row.get("contact_count")?,
            version: row.get("version")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            approved_at: row.get("approved_at")?,
            published_at: row.get("published_at")?,
            skills: vec![], // Loaded separately
        })
    }

    /// Parsed evidence list; storage parse failures read as empty
    pub fn evidence(&self) -> Vec<EvidenceFile> {
        self.evidence_json
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_default()
    }

    /// Parsed competency map; storage parse failures read as empty
    pub fn competencies(&self) -> HashMap<String, f64> {
        self.competencies_json
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_default()
    }

    /// Parsed provider metadata, if any
    pub fn provider(&self) -> Option<ProviderMetadata> {
        self.provider_json
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok())
    }
}

fn bad_enum(field: &str, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        format!("unknown {} '{}'", field, value).into(),
    )
}

/// Input for creating an item
#[derive(Debug, Clone, Deserialize)]
pub struct CreateItemInput {
    /// Generated when absent
    #[serde(default)]
    pub id: Option<String>,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default = "default_item_type")]
    pub item_type: ItemType,
    #[serde(default)]
    pub mission_id: Option<String>,
    #[serde(default)]
    pub provider: Option<ProviderMetadata>,
    #[serde(default)]
    pub competencies: HashMap<String, f64>,
    #[serde(default)]
    pub evidence: Vec<EvidenceFile>,
    /// Items normally start in draft; the mission fast-path creates
    /// directly in approved
    #[serde(default = "default_status")]
    pub status: ItemStatus,
    #[serde(default = "default_visibility")]
    pub visibility: Visibility,
    #[serde(default)]
    pub skills: Vec<String>,
}

fn default_item_type() -> ItemType {
    ItemType::Mission
}
fn default_status() -> ItemStatus {
    ItemStatus::Draft
}
fn default_visibility() -> Visibility {
    Visibility::Private
}

/// Content fields the owner may edit
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateItemInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub competencies: Option<HashMap<String, f64>>,
    #[serde(default)]
    pub evidence: Option<Vec<EvidenceFile>>,
    #[serde(default)]
    pub skills: Option<Vec<String>>,
}

/// Query parameters for listing items
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemQuery {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub status: Option<ItemStatus>,
    #[serde(default)]
    pub item_type: Option<ItemType>,
    #[serde(default)]
    pub visibility: Option<Visibility>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    100
}

impl Default for ItemQuery {
    fn default() -> Self {
        Self {
            user_id: None,
            status: None,
            item_type: None,
            visibility: None,
            search: None,
            limit: default_limit(),
            offset: 0,
        }
    }
}

// ============================================================================
// Read Operations
// ============================================================================

/// Get item by ID
pub fn get_item(conn: &Connection, id: &str) -> Result<Option<ItemRow>, PortfolioError> {
    let mut stmt = conn
        .prepare("SELECT * FROM items WHERE id = ?")
        .map_err(|e| PortfolioError::Internal(format!("Prepare failed: {}", e)))?;

    let mut rows = stmt
        .query(params![id])
        .map_err(|e| PortfolioError::Internal(format!("Query failed: {}", e)))?;

    if let Some(row) = rows
        .next()
        .map_err(|e| PortfolioError::Internal(format!("Row fetch failed: {}", e)))?
    {
        let mut item = ItemRow::from_row(row)
            .map_err(|e| PortfolioError::Internal(format!("Row parse failed: {}", e)))?;
        item.skills = get_item_skills(conn, id)?;
        Ok(Some(item))
    } else {
        Ok(None)
    }
}

/// Get the item auto-created for a mission, if any (dedupe key)
pub fn get_item_by_mission(
    conn: &Connection,
    user_id: &str,
    mission_id: &str,
) -> Result<Option<ItemRow>, PortfolioError> {
    let mut stmt = conn
        .prepare("SELECT * FROM items WHERE user_id = ? AND mission_id = ?")
        .map_err(|e| PortfolioError::Internal(format!("Prepare failed: {}", e)))?;

    let mut rows = stmt
        .query(params![user_id, mission_id])
        .map_err(|e| PortfolioError::Internal(format!("Query failed: {}", e)))?;

    if let Some(row) = rows
        .next()
        .map_err(|e| PortfolioError::Internal(format!("Row fetch failed: {}", e)))?
    {
        let mut item = ItemRow::from_row(row)
            .map_err(|e| PortfolioError::Internal(format!("Row parse failed: {}", e)))?;
        item.skills = get_item_skills(conn, &item.id)?;
        Ok(Some(item))
    } else {
        Ok(None)
    }
}

/// Get skill tags for an item
fn get_item_skills(conn: &Connection, item_id: &str) -> Result<Vec<String>, PortfolioError> {
    let mut stmt = conn
        .prepare("SELECT skill FROM item_skills WHERE item_id = ? ORDER BY skill")
        .map_err(|e| PortfolioError::Internal(format!("Prepare failed: {}", e)))?;

    let skills: Vec<String> = stmt
        .query_map(params![item_id], |row| row.get(0))
        .map_err(|e| PortfolioError::Internal(format!("Query failed: {}", e)))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| PortfolioError::Internal(format!("Row parse failed: {}", e)))?;

    Ok(skills)
}

/// List items with optional filters
pub fn list_items(conn: &Connection, query: &ItemQuery) -> Result<Vec<ItemRow>, PortfolioError> {
    let mut sql = String::from("SELECT * FROM items");
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![];
    let mut conditions = vec![];

    if let Some(ref user_id) = query.user_id {
        conditions.push("user_id = ?".to_string());
        params.push(Box::new(user_id.clone()));
    }

    if let Some(status) = query.status {
        conditions.push("status = ?".to_string());
        params.push(Box::new(status.as_str().to_string()));
    }

    if let Some(item_type) = query.item_type {
        conditions.push("item_type = ?".to_string());
        params.push(Box::new(item_type.as_str().to_string()));
    }

    if let Some(visibility) = query.visibility {
        conditions.push("visibility = ?".to_string());
        params.push(Box::new(visibility.as_str().to_string()));
    }

    if let Some(ref search) = query.search {
        conditions.push("(title LIKE ? OR summary LIKE ?)".to_string());
        let pattern = format!("%{}%", search);
        params.push(Box::new(pattern.clone()));
        params.push(Box::new(pattern));
    }

    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }

    sql.push_str(" ORDER BY created_at DESC LIMIT ? OFFSET ?");
    params.push(Box::new(query.limit as i64));
    params.push(Box::new(query.offset as i64));

    debug!("Executing query: {}", sql);

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| PortfolioError::Internal(format!("Prepare failed: {}", e)))?;

    let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

    let rows = stmt
        .query_map(param_refs.as_slice(), |row| ItemRow::from_row(row))
        .map_err(|e| PortfolioError::Internal(format!("Query failed: {}", e)))?;

    let mut results = vec![];
    for row_result in rows {
        let mut item = row_result
            .map_err(|e| PortfolioError::Internal(format!("Row parse failed: {}", e)))?;
        item.skills = get_item_skills(conn, &item.id)?;
        results.push(item);
    }

    Ok(results)
}

// ============================================================================
// Write Operations
// ============================================================================

/// Create a single item
pub fn create_item(conn: &mut Connection, input: CreateItemInput) -> Result<ItemRow, PortfolioError> {
    let id = input.id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let now = current_timestamp();

    let provider_json = match &input.provider {
        Some(p) => Some(serde_json::to_string(p)?),
        None => None,
    };
    let competencies_json = if input.competencies.is_empty() {
        None
    } else {
        Some(serde_json::to_string(&input.competencies)?)
    };
    let evidence_json = if input.evidence.is_empty() {
        None
    } else {
        Some(serde_json::to_string(&input.evidence)?)
    };

    // Items created directly in approved (mission fast-path) carry their
    // approval timestamp from birth
    let approved_at = if input.status == ItemStatus::Approved {
        Some(now.clone())
    } else {
        None
    };

    let tx = conn
        .transaction()
        .map_err(|e| PortfolioError::Internal(format!("Transaction failed: {}", e)))?;

    tx.execute(
        r#"
        INSERT INTO items (
            id, user_id, title, summary, item_type, mission_id,
            provider_json, competencies_json, evidence_json,
            status, visibility, created_at, updated_at, approved_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            id,
            input.user_id,
            input.title,
            input.summary,
            input.item_type.as_str(),
            input.mission_id,
            provider_json,
            competencies_json,
            evidence_json,
            input.status.as_str(),
            input.visibility.as_str(),
            now,
            now,
            approved_at,
        ],
    )
    .map_err(|e| PortfolioError::Internal(format!("Insert failed: {}", e)))?;

    for skill in &input.skills {
        tx.execute(
            "INSERT OR IGNORE INTO item_skills (item_id, skill) VALUES (?, ?)",
            params![id, skill],
        )
        .map_err(|e| PortfolioError::Internal(format!("Skill insert failed: {}", e)))?;
    }

    tx.commit()
        .map_err(|e| PortfolioError::Internal(format!("Commit failed: {}", e)))?;

    get_item(conn, &id)?
        .ok_or_else(|| PortfolioError::Internal("Item not found after insert".to_string()))
}

/// Update item content with an optimistic version check.
///
/// Only editable states (draft, changes_requested) accept updates; anything
/// with a review in flight or already approved fails with `Conflict`.
pub fn update_content(
    conn: &mut Connection,
    id: &str,
    expected_version: i64,
    input: &UpdateItemInput,
) -> Result<ItemRow, PortfolioError> {
    let now = current_timestamp();

    let mut sets = vec![
        "updated_at = ?".to_string(),
        "version = version + 1".to_string(),
    ];
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(now)];

    if let Some(ref title) = input.title {
        sets.push("title = ?".to_string());
        params.push(Box::new(title.clone()));
    }
    if let Some(ref summary) = input.summary {
        sets.push("summary = ?".to_string());
        params.push(Box::new(summary.clone()));
    }
    if let Some(ref competencies) = input.competencies {
        sets.push("competencies_json = ?".to_string());
        params.push(Box::new(serde_json::to_string(competencies)?));
    }
    if let Some(ref evidence) = input.evidence {
        sets.push("evidence_json = ?".to_string());
        params.push(Box::new(serde_json::to_string(evidence)?));
    }

    let sql = format!(
        "UPDATE items SET {} WHERE id = ? AND version = ? \
         AND status IN ('draft', 'changes_requested')",
        sets.join(", ")
    );
    params.push(Box::new(id.to_string()));
    params.push(Box::new(expected_version));

    let tx = conn
        .transaction()
        .map_err(|e| PortfolioError::Internal(format!("Transaction failed: {}", e)))?;

    let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let changed = tx
        .execute(&sql, param_refs.as_slice())
        .map_err(|e| PortfolioError::Internal(format!("Update failed: {}", e)))?;

    if changed == 0 {
        // Diagnose: missing row, locked state, or lost race
        drop(tx);
        let current = get_item(conn, id)?
            .ok_or_else(|| PortfolioError::NotFound(format!("item {}", id)))?;
        if !current.status.is_editable() {
            return Err(PortfolioError::Conflict(format!(
                "item {} is not editable while {}",
                id, current.status
            )));
        }
        return Err(PortfolioError::Conflict(format!(
            "item {} was modified concurrently (expected version {}, now {})",
            id, expected_version, current.version
        )));
    }

    if let Some(ref skills) = input.skills {
        tx.execute("DELETE FROM item_skills WHERE item_id = ?", params![id])
            .map_err(|e| PortfolioError::Internal(format!("Skill delete failed: {}", e)))?;
        for skill in skills {
            tx.execute(
                "INSERT OR IGNORE INTO item_skills (item_id, skill) VALUES (?, ?)",
                params![id, skill],
            )
            .map_err(|e| PortfolioError::Internal(format!("Skill insert failed: {}", e)))?;
        }
    }

    tx.commit()
        .map_err(|e| PortfolioError::Internal(format!("Commit failed: {}", e)))?;

    get_item(conn, id)?
        .ok_or_else(|| PortfolioError::Internal("Item not found after update".to_string()))
}

/// Move an item through the lifecycle state machine.
///
/// Validates the transition against the current status, then applies it as
/// an atomic check-and-set; an illegal pair fails with `InvalidTransition`
/// and changes nothing. `approved_at`/`published_at` are set on the first
/// passage only.
pub fn transition(conn: &Connection, id: &str, to: ItemStatus) -> Result<ItemRow, PortfolioError> {
    let current = get_item(conn, id)?
        .ok_or_else(|| PortfolioError::NotFound(format!("item {}", id)))?;

    if !current.status.can_transition(to) {
        return Err(PortfolioError::InvalidTransition {
            from: current.status,
            to,
        });
    }

    let now = current_timestamp();
    let changed = conn
        .execute(
            r#"
            UPDATE items SET
                status = ?1,
                updated_at = ?2,
                version = version + 1,
                approved_at = CASE WHEN ?1 = 'approved'
                    THEN COALESCE(approved_at, ?2) ELSE approved_at END,
                published_at = CASE WHEN ?1 = 'published'
                    THEN COALESCE(published_at, ?2) ELSE published_at END
            WHERE id = ?3 AND status = ?4
            "#,
            params![to.as_str(), now, id, current.status.as_str()],
        )
        .map_err(|e| PortfolioError::Internal(format!("Update failed: {}", e)))?;

    if changed == 0 {
        return Err(PortfolioError::Conflict(format!(
            "item {} changed concurrently during transition to {}",
            id, to
        )));
    }

    get_item(conn, id)?
        .ok_or_else(|| PortfolioError::Internal("Item not found after transition".to_string()))
}

/// Set an item's visibility, enforcing the public-visibility gate
pub fn set_visibility(
    conn: &Connection,
    id: &str,
    visibility: Visibility,
) -> Result<ItemRow, PortfolioError> {
    let current = get_item(conn, id)?
        .ok_or_else(|| PortfolioError::NotFound(format!("item {}", id)))?;

    if visibility == Visibility::Public && !current.status.allows_public_visibility() {
        return Err(PortfolioError::InvalidInput(format!(
            "item {} cannot be public while {}",
            id, current.status
        )));
    }

    conn.execute(
        "UPDATE items SET visibility = ?, updated_at = ?, version = version + 1 WHERE id = ?",
        params![visibility.as_str(), current_timestamp(), id],
    )
    .map_err(|e| PortfolioError::Internal(format!("Update failed: {}", e)))?;

    get_item(conn, id)?
        .ok_or_else(|| PortfolioError::Internal("Item not found after update".to_string()))
}

/// Propagate a visibility preference to all of a user's approved items.
///
/// Runs as one transaction so a failure leaves no partial state observable.
/// Returns the number of items updated.
pub fn sync_user_visibility(
    conn: &mut Connection,
    user_id: &str,
    visibility: Visibility,
) -> Result<usize, PortfolioError> {
    let tx = conn
        .transaction()
        .map_err(|e| PortfolioError::Sync(format!("Transaction failed: {}", e)))?;

    let changed = tx
        .execute(
            "UPDATE items SET visibility = ?, updated_at = ?, version = version + 1 \
             WHERE user_id = ? AND status = 'approved'",
            params![visibility.as_str(), current_timestamp(), user_id],
        )
        .map_err(|e| PortfolioError::Sync(format!("Propagation failed: {}", e)))?;

    tx.commit()
        .map_err(|e| PortfolioError::Sync(format!("Commit failed: {}", e)))?;

    Ok(changed)
}

/// Record a marketplace view (monotonic counter)
pub fn record_view(conn: &Connection, id: &str) -> Result<(), PortfolioError> {
    let changed = conn
        .execute(
            "UPDATE items SET view_count = view_count + 1 WHERE id = ?",
            params![id],
        )
        .map_err(|e| PortfolioError::Internal(format!("Update failed: {}", e)))?;

    if changed == 0 {
        return Err(PortfolioError::NotFound(format!("item {}", id)));
    }
    Ok(())
}

/// Record an employer contact (monotonic counter)
pub fn record_contact(conn: &Connection, id: &str) -> Result<(), PortfolioError> {
    let changed = conn
        .execute(
            "UPDATE items SET contact_count = contact_count + 1 WHERE id = ?",
            params![id],
        )
        .map_err(|e| PortfolioError::Internal(format!("Update failed: {}", e)))?;

    if changed == 0 {
        return Err(PortfolioError::NotFound(format!("item {}", id)));
    }
    Ok(())
}

/// Delete an item. Reviews are kept as audit history.
pub fn delete_item(conn: &Connection, id: &str) -> Result<bool, PortfolioError> {
    let deleted = conn
        .execute("DELETE FROM items WHERE id = ?", params![id])
        .map_err(|e| PortfolioError::Internal(format!("Delete failed: {}", e)))?;

    Ok(deleted > 0)
}
