//! Domain model for portfolio items, reviews and marketplace profiles
//!
//! Enums are stored in SQLite as their snake_case string form and parsed
//! back when rows are read. Flexible payloads (evidence, competencies,
//! provider metadata) are serialized to `*_json` TEXT columns.

use serde::{Deserialize, Serialize};

/// Get current UTC timestamp as ISO 8601 string for SQLite TEXT columns
pub fn current_timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

// ============================================================================
// Item Lifecycle
// ============================================================================

/// Workflow status of a portfolio item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Draft,
    Submitted,
    InReview,
    ChangesRequested,
    Approved,
    Published,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Draft => "draft",
            ItemStatus::Submitted => "submitted",
            ItemStatus::InReview => "in_review",
            ItemStatus::ChangesRequested => "changes_requested",
            ItemStatus::Approved => "approved",
            ItemStatus::Published => "published",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(ItemStatus::Draft),
            "submitted" => Some(ItemStatus::Submitted),
            "in_review" => Some(ItemStatus::InReview),
            "changes_requested" => Some(ItemStatus::ChangesRequested),
            "approved" => Some(ItemStatus::Approved),
            "published" => Some(ItemStatus::Published),
            _ => None,
        }
    }

    /// Whether a lifecycle transition from `self` to `to` is legal.
    ///
    /// draft -> submitted -> in_review -> {changes_requested | approved},
    /// changes_requested -> submitted (resubmit loop, unbounded),
    /// approved -> published.
    pub fn can_transition(self, to: ItemStatus) -> bool {
        use ItemStatus::*;
        matches!(
            (self, to),
            (Draft, Submitted)
                | (Submitted, InReview)
                | (InReview, ChangesRequested)
                | (InReview, Approved)
                | (ChangesRequested, Submitted)
                | (Approved, Published)
        )
    }

    /// Whether the owner may edit item content in this state.
    ///
    /// Anything with a pending or finished review is locked; revisions to
    /// approved work go through a new item.
    pub fn is_editable(self) -> bool {
        matches!(self, ItemStatus::Draft | ItemStatus::ChangesRequested)
    }

    /// Whether `public` visibility is allowed in this state
    pub fn allows_public_visibility(self) -> bool {
        matches!(self, ItemStatus::Approved | ItemStatus::Published)
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Visibility of a portfolio item or a synced user preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Private,
    Unlisted,
    MarketplacePreview,
    Public,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Private => "private",
            Visibility::Unlisted => "unlisted",
            Visibility::MarketplacePreview => "marketplace_preview",
            Visibility::Public => "public",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "private" => Some(Visibility::Private),
            "unlisted" => Some(Visibility::Unlisted),
            "marketplace_preview" => Some(Visibility::MarketplacePreview),
            "public" => Some(Visibility::Public),
            _ => None,
        }
    }
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of work a portfolio item evidences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Mission,
    Reflection,
    Certification,
    Github,
    Tryhackme,
    External,
    MarketplaceWork,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Mission => "mission",
            ItemType::Reflection => "reflection",
            ItemType::Certification => "certification",
            ItemType::Github => "github",
            ItemType::Tryhackme => "tryhackme",
            ItemType::External => "external",
            ItemType::MarketplaceWork => "marketplace_work",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "mission" => Some(ItemType::Mission),
            "reflection" => Some(ItemType::Reflection),
            "certification" => Some(ItemType::Certification),
            "github" => Some(ItemType::Github),
            "tryhackme" => Some(ItemType::Tryhackme),
            "external" => Some(ItemType::External),
            "marketplace_work" => Some(ItemType::MarketplaceWork),
            _ => None,
        }
    }

    pub fn all() -> &'static [ItemType] {
        &[
            ItemType::Mission,
            ItemType::Reflection,
            ItemType::Certification,
            ItemType::Github,
            ItemType::Tryhackme,
            ItemType::External,
            ItemType::MarketplaceWork,
        ]
    }
}

impl std::fmt::Display for ItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Review verdict, mirrored back onto the item's status transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Approved,
    ChangesRequested,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Approved => "approved",
            ReviewStatus::ChangesRequested => "changes_requested",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ReviewStatus::Pending),
            "approved" => Some(ReviewStatus::Approved),
            "changes_requested" => Some(ReviewStatus::ChangesRequested),
            _ => None,
        }
    }
}

// ============================================================================
// Evidence & Provider Metadata
// ============================================================================

/// A single evidence file attached to an item
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceFile {
    pub url: String,
    /// MIME-ish kind: "image", "pdf", "code", "archive", ...
    pub kind: String,
    #[serde(default)]
    pub size_bytes: Option<i64>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// External-provider metadata, one variant per import source.
///
/// A tagged union so the coordination layer and importers can match
/// exhaustively instead of probing string keys in an open map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum ProviderMetadata {
    Github {
        repo: String,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        stars: u32,
        #[serde(default)]
        forks: u32,
        #[serde(default)]
        languages: Vec<String>,
        #[serde(default)]
        topics: Vec<String>,
    },
    Tryhackme {
        username: String,
        #[serde(default)]
        rank: u32,
        #[serde(default)]
        rooms_completed: u32,
        #[serde(default)]
        badges: Vec<String>,
    },
    External {
        source: String,
        reference: String,
        #[serde(default)]
        attributes: serde_json::Value,
    },
}

impl ProviderMetadata {
    /// Stable reference used to deduplicate repeated imports
    pub fn external_ref(&self) -> &str {
        match self {
            ProviderMetadata::Github { repo, .. } => repo,
            ProviderMetadata::Tryhackme { username, .. } => username,
            ProviderMetadata::External { reference, .. } => reference,
        }
    }

    /// Item type the import lands as
    pub fn item_type(&self) -> ItemType {
        match self {
            ProviderMetadata::Github { .. } => ItemType::Github,
            ProviderMetadata::Tryhackme { .. } => ItemType::Tryhackme,
            ProviderMetadata::External { .. } => ItemType::External,
        }
    }
}

// ============================================================================
// Boundary Events (consumed)
// ============================================================================

/// Mission-completion event from the curriculum service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionCompleted {
    pub user_id: String,
    pub mission_id: String,
    pub title: String,
    /// Mission score on a 0-100 scale
    pub score: f64,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub evidence_files: Vec<EvidenceFile>,
}

/// Global portfolio-visibility preference change from settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityChanged {
    pub user_id: String,
    pub new_visibility: Visibility,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for s in [
            ItemStatus::Draft,
            ItemStatus::Submitted,
            ItemStatus::InReview,
            ItemStatus::ChangesRequested,
            ItemStatus::Approved,
            ItemStatus::Published,
        ] {
            assert_eq!(ItemStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(ItemStatus::parse("bogus"), None);
    }

    #[test]
    fn test_transition_table() {
        use ItemStatus::*;
        assert!(Draft.can_transition(Submitted));
        assert!(Submitted.can_transition(InReview));
        assert!(InReview.can_transition(ChangesRequested));
        assert!(InReview.can_transition(Approved));
        assert!(ChangesRequested.can_transition(Submitted));
        assert!(Approved.can_transition(Published));

        // Everything else is illegal
        assert!(!Draft.can_transition(Approved));
        assert!(!Draft.can_transition(Published));
        assert!(!Submitted.can_transition(Approved));
        assert!(!Published.can_transition(Draft));
        assert!(!Approved.can_transition(Submitted));
    }

    #[test]
    fn test_public_visibility_gate() {
        assert!(!ItemStatus::Draft.allows_public_visibility());
        assert!(!ItemStatus::InReview.allows_public_visibility());
        assert!(ItemStatus::Approved.allows_public_visibility());
        assert!(ItemStatus::Published.allows_public_visibility());
    }

    #[test]
    fn test_provider_metadata_tagged_serde() {
        let meta = ProviderMetadata::Github {
            repo: "user/netscan".into(),
            description: Some("port scanner".into()),
            stars: 12,
            forks: 3,
            languages: vec!["Rust".into()],
            topics: vec![],
        };
        let json = serde_json::to_string(&meta).unwrap();
        assert!(json.contains("\"provider\":\"github\""));
        let back: ProviderMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back.external_ref(), "user/netscan");
        assert_eq!(back.item_type(), ItemType::Github);
    }
}
