//! Database schema definitions

use rusqlite::Connection;
use tracing::info;

use crate::error::PortfolioError;

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<(), PortfolioError> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating new database schema v{}", SCHEMA_VERSION);
        create_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!("Migrating schema from v{} to v{}", current_version, SCHEMA_VERSION);
        migrate_schema(conn, current_version)?;
    } else {
        info!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get current schema version (0 if not initialized)
fn get_schema_version(conn: &Connection) -> Result<i32, PortfolioError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    ).map_err(|e| PortfolioError::Internal(format!("Failed to create schema_version table: {}", e)))?;

    let version: i32 = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .unwrap_or(0);

    Ok(version)
}

/// Set schema version
fn set_schema_version(conn: &Connection, version: i32) -> Result<(), PortfolioError> {
    conn.execute("DELETE FROM schema_version", [])
        .map_err(|e| PortfolioError::Internal(format!("Failed to clear schema_version: {}", e)))?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?)", [version])
        .map_err(|e| PortfolioError::Internal(format!("Failed to set schema_version: {}", e)))?;
    Ok(())
}

/// Create all tables
fn create_tables(conn: &Connection) -> Result<(), PortfolioError> {
    conn.execute_batch(ITEMS_SCHEMA)
        .map_err(|e| PortfolioError::Internal(format!("Failed to create item tables: {}", e)))?;

    conn.execute_batch(REVIEWS_SCHEMA)
        .map_err(|e| PortfolioError::Internal(format!("Failed to create review tables: {}", e)))?;

    conn.execute_batch(PROFILES_SCHEMA)
        .map_err(|e| PortfolioError::Internal(format!("Failed to create profile tables: {}", e)))?;

    conn.execute_batch(INDEXES_SCHEMA)
        .map_err(|e| PortfolioError::Internal(format!("Failed to create indexes: {}", e)))?;

    Ok(())
}

/// Migrate schema from older version
fn migrate_schema(conn: &Connection, from_version: i32) -> Result<(), PortfolioError> {
    // Add migration steps here as schema evolves
    match from_version {
        _ => {}
    }

    set_schema_version(conn, SCHEMA_VERSION)?;
    Ok(())
}

/// Items table schema
const ITEMS_SCHEMA: &str = r#"
-- Portfolio items: one row per unit of evidenced learner work.
-- Flexible payloads (evidence, competencies, provider metadata) are JSON TEXT.
CREATE TABLE IF NOT EXISTS items (
    id TEXT PRIMARY KEY NOT NULL,
    user_id TEXT NOT NULL,
    title TEXT NOT NULL,
    summary TEXT,
    item_type TEXT NOT NULL DEFAULT 'mission',

    -- Provenance
    mission_id TEXT,
    provider_json TEXT,

    -- Classification
    competencies_json TEXT,

    -- Evidence files (ordered JSON array)
    evidence_json TEXT,

    -- Workflow
    status TEXT NOT NULL DEFAULT 'draft',
    visibility TEXT NOT NULL DEFAULT 'private',

    -- Telemetry (monotonic counters)
    view_count INTEGER NOT NULL DEFAULT 0,
    contact_count INTEGER NOT NULL DEFAULT 0,

    -- Optimistic concurrency token
    version INTEGER NOT NULL DEFAULT 0,

    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    approved_at TEXT,
    published_at TEXT
);

-- Skill tags stored separately for efficient querying
CREATE TABLE IF NOT EXISTS item_skills (
    item_id TEXT NOT NULL,
    skill TEXT NOT NULL,
    PRIMARY KEY (item_id, skill),
    FOREIGN KEY (item_id) REFERENCES items(id) ON DELETE CASCADE
);
"#;

/// Reviews table schema
const REVIEWS_SCHEMA: &str = r#"
-- Reviewer feedback. 1:N per item; rows may outlive their item as audit
-- history, so no foreign key cascade.
CREATE TABLE IF NOT EXISTS reviews (
    id TEXT PRIMARY KEY NOT NULL,
    item_id TEXT NOT NULL,
    reviewer_id TEXT,
    reviewer_name TEXT,
    scores_json TEXT,
    total_score REAL NOT NULL DEFAULT 0,
    comments TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// Profiles table schema
const PROFILES_SCHEMA: &str = r#"
-- Marketplace profiles: materialized view over a user's item set plus
-- externally sourced telemetry. Never deleted, only deactivated.
CREATE TABLE IF NOT EXISTS profiles (
    user_id TEXT PRIMARY KEY NOT NULL,
    username TEXT NOT NULL,
    headline TEXT,
    bio TEXT,
    avatar_url TEXT,
    readiness_score REAL NOT NULL DEFAULT 0,
    health_score REAL NOT NULL DEFAULT 0,
    total_views INTEGER NOT NULL DEFAULT 0,
    weekly_rank_delta INTEGER NOT NULL DEFAULT 0,
    featured_json TEXT,
    skills_json TEXT,
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// Indexes
const INDEXES_SCHEMA: &str = r#"
CREATE INDEX IF NOT EXISTS idx_items_user ON items(user_id);
CREATE INDEX IF NOT EXISTS idx_items_status ON items(status);
CREATE INDEX IF NOT EXISTS idx_items_type ON items(item_type);

-- Dedupe backstop for mission auto-creation (one item per user+mission)
CREATE UNIQUE INDEX IF NOT EXISTS idx_items_user_mission
    ON items(user_id, mission_id) WHERE mission_id IS NOT NULL;

CREATE INDEX IF NOT EXISTS idx_reviews_item ON reviews(item_id);
CREATE INDEX IF NOT EXISTS idx_skills_skill ON item_skills(skill);
"#;
