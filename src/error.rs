//! Error types for portfolio-engine

use thiserror::Error;

use crate::model::ItemStatus;

#[derive(Error, Debug)]
pub enum PortfolioError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition { from: ItemStatus, to: ItemStatus },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Visibility sync failed: {0}")]
    Sync(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}
