//! Portfolio Engine - lifecycle, scoring and marketplace ranking core
//!
//! The rules behind a learner's public portfolio: item lifecycle from draft
//! to published, weighted rubric scoring, cross-subsystem visibility sync,
//! mission auto-creation, and the marketplace ranking formula. Everything
//! user-facing (routing, auth, OAuth token exchange, rendering) lives in
//! the embedding host; this crate owns the decisions.
//!
//! ## Architecture
//!
//! - **Storage**: SQLite via [`db::PortfolioDb`] - items, reviews and
//!   materialized marketplace profiles behind a simple CRUD layer
//! - **Services**: validation, lifecycle rules, event emission
//! - **Pure cores**: [`scorer`], [`ranking`], [`skills`] are deterministic
//!   functions with no I/O, testable in isolation
//! - **Boundaries**: [`notify`] sinks for mentor notifications (fire-and-
//!   forget) and readiness pushes; [`importers`] adapt provider payloads
//!
//! ## Lifecycle
//!
//! ```text
//! draft -> submitted -> in_review -> approved -> published
//!              ^              |
//!              └── changes_requested
//! ```
//!
//! Mission completions scoring >= 90 enter at `approved` directly (policy
//! fast-path, see [`config::Config`]).

pub mod config;
pub mod db;
pub mod error;
pub mod importers;
pub mod model;
pub mod notify;
pub mod ranking;
pub mod rubric;
pub mod scorer;
pub mod services;
pub mod skills;

// Re-exports
pub use config::Config;
pub use db::PortfolioDb;
pub use error::PortfolioError;
pub use importers::Importer;
pub use model::{
    EvidenceFile, ItemStatus, ItemType, MissionCompleted, ProviderMetadata, ReviewStatus,
    Visibility, VisibilityChanged,
};
pub use notify::{
    LogNotificationSink, Notification, NotificationDispatcher, NotificationSink, ReadinessSink,
    ReadinessUpdate,
};
pub use ranking::{ProfileSnapshot, RankedProfile};
pub use services::{
    CoordinationService, EventBus, ItemService, PortfolioEvent, ProfileService, ReviewDecision,
    ReviewService, Services,
};
