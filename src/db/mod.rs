//! SQLite database module for portfolio storage
//!
//! Fast local storage for items, reviews and marketplace profile
//! projections behind a simple CRUD interface.
//!
//! ## Tables
//!
//! - `items` - Portfolio items with lifecycle status, visibility, telemetry
//! - `item_skills` - Skill tag index for fast lookup
//! - `reviews` - Reviewer feedback, 1:N per item, append-only after publish
//! - `profiles` - Materialized marketplace profiles, rebuildable from items

pub mod schema;
pub mod items;
pub mod reviews;
pub mod profiles;

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::PortfolioError;

/// SQLite database for portfolio data
pub struct PortfolioDb {
    conn: Mutex<Connection>,
}

impl PortfolioDb {
    /// Open or create the portfolio database
    pub fn open(data_dir: &Path) -> Result<Self, PortfolioError> {
        let db_path = data_dir.join("portfolio.db");
        info!("Opening SQLite database at {:?}", db_path);

        let conn = Connection::open(&db_path)
            .map_err(|e| PortfolioError::Internal(format!("Failed to open SQLite: {}", e)))?;

        // Enable WAL mode for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| PortfolioError::Internal(format!("Failed to set PRAGMA: {}", e)))?;

        let db = Self {
            conn: Mutex::new(conn),
        };

        db.init_schema()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, PortfolioError> {
        debug!("Opening in-memory SQLite database");

        let conn = Connection::open_in_memory()
            .map_err(|e| PortfolioError::Internal(format!("Failed to open in-memory SQLite: {}", e)))?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| PortfolioError::Internal(format!("Failed to set PRAGMA: {}", e)))?;

        let db = Self {
            conn: Mutex::new(conn),
        };

        db.init_schema()?;

        Ok(db)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<(), PortfolioError> {
        let conn = self.conn.lock()
            .map_err(|e| PortfolioError::Internal(format!("Lock poisoned: {}", e)))?;

        schema::init_schema(&conn)?;

        Ok(())
    }

    /// Run a read operation against the connection
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, PortfolioError>
    where
        F: FnOnce(&Connection) -> Result<T, PortfolioError>,
    {
        let conn = self.conn.lock()
            .map_err(|e| PortfolioError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&conn)
    }

    /// Execute a write operation with exclusive access
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T, PortfolioError>
    where
        F: FnOnce(&mut Connection) -> Result<T, PortfolioError>,
    {
        let mut conn = self.conn.lock()
            .map_err(|e| PortfolioError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&mut conn)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats, PortfolioError> {
        self.with_conn(|conn| {
            let item_count: i64 = conn
                .query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))
                .map_err(|e| PortfolioError::Internal(format!("Query failed: {}", e)))?;

            let review_count: i64 = conn
                .query_row("SELECT COUNT(*) FROM reviews", [], |row| row.get(0))
                .map_err(|e| PortfolioError::Internal(format!("Query failed: {}", e)))?;

            let profile_count: i64 = conn
                .query_row("SELECT COUNT(*) FROM profiles", [], |row| row.get(0))
                .map_err(|e| PortfolioError::Internal(format!("Query failed: {}", e)))?;

            let skill_count: i64 = conn
                .query_row("SELECT COUNT(DISTINCT skill) FROM item_skills", [], |row| row.get(0))
                .map_err(|e| PortfolioError::Internal(format!("Query failed: {}", e)))?;

            Ok(DbStats {
                item_count: item_count as u64,
                review_count: review_count as u64,
                profile_count: profile_count as u64,
                unique_skills: skill_count as u64,
            })
        })
    }
}

/// Database statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct DbStats {
    pub item_count: u64,
    pub review_count: u64,
    pub profile_count: u64,
    pub unique_skills: u64,
}

// Re-exports
pub use items::{CreateItemInput, ItemQuery, ItemRow, UpdateItemInput};
pub use profiles::{ProfileRow, UpsertProfileInput};
pub use reviews::{CreateReviewInput, ReviewRow};
