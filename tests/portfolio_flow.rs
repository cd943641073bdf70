//! End-to-end flows over an in-memory database: mission auto-creation,
//! the review loop, visibility sync, imports and marketplace ranking.

use std::collections::HashMap;
use std::sync::Arc;

use portfolio_engine::db::{CreateItemInput, ItemQuery, UpdateItemInput};
use portfolio_engine::{
    EvidenceFile, ItemStatus, ItemType, MissionCompleted, PortfolioDb, PortfolioError,
    ProviderMetadata, ReviewStatus, Services, Visibility, VisibilityChanged,
};

fn services() -> Services {
    let db = Arc::new(PortfolioDb::open_in_memory().unwrap());
    Services::with_defaults(db)
}

fn draft_input(user_id: &str, title: &str) -> CreateItemInput {
    CreateItemInput {
        id: None,
        user_id: user_id.to_string(),
        title: title.to_string(),
        summary: None,
        item_type: ItemType::Mission,
        mission_id: None,
        provider: None,
        competencies: HashMap::new(),
        evidence: vec![],
        status: ItemStatus::Draft,
        visibility: Visibility::Private,
        skills: vec![],
    }
}

fn mission(user_id: &str, mission_id: &str, score: f64) -> MissionCompleted {
    MissionCompleted {
        user_id: user_id.to_string(),
        mission_id: mission_id.to_string(),
        title: "Recon and enumeration lab".to_string(),
        score,
        skills: vec!["nmap".to_string()],
        evidence_files: vec![EvidenceFile {
            url: "https://cdn.example/report.py".to_string(),
            kind: "code".to_string(),
            size_bytes: Some(2048),
            thumbnail_url: None,
            name: None,
        }],
    }
}

// ============================================================================
// Mission auto-creation
// ============================================================================

#[tokio::test]
async fn high_scoring_mission_is_auto_approved_once() {
    let services = services();

    let item = services
        .coordination
        .complete_mission(&mission("user-1", "m-1", 92.0))
        .unwrap()
        .expect("item created");

    assert_eq!(item.status, ItemStatus::Approved);
    assert!(item.approved_at.is_some());
    assert!(item.published_at.is_none());
    // Skill extraction ran over title, explicit skills and evidence
    assert!(item.skills.contains(&"Nmap".to_string()));
    assert!(item.skills.contains(&"Python".to_string()));

    // Re-delivery of the same completion event must not duplicate
    let again = services
        .coordination
        .complete_mission(&mission("user-1", "m-1", 92.0))
        .unwrap()
        .expect("existing item returned");
    assert_eq!(again.id, item.id);

    let all = services.items.list_for_user("user-1").unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn mid_scoring_mission_lands_in_draft() {
    let services = services();

    let item = services
        .coordination
        .complete_mission(&mission("user-2", "m-7", 87.0))
        .unwrap()
        .expect("item created");

    assert_eq!(item.status, ItemStatus::Draft);
    assert!(item.approved_at.is_none());
}

#[tokio::test]
async fn low_scoring_mission_creates_nothing() {
    let services = services();

    let created = services
        .coordination
        .complete_mission(&mission("user-3", "m-9", 71.0))
        .unwrap();

    assert!(created.is_none());
    assert!(services.items.list_for_user("user-3").unwrap().is_empty());
}

#[tokio::test]
async fn cutoff_is_inclusive() {
    let services = services();

    let item = services
        .coordination
        .complete_mission(&mission("user-4", "m-2", 85.0))
        .unwrap()
        .expect("85 is inside the cutoff");
    assert_eq!(item.status, ItemStatus::Draft);

    let fast = services
        .coordination
        .complete_mission(&mission("user-4", "m-3", 90.0))
        .unwrap()
        .expect("90 is inside the fast-path cutoff");
    assert_eq!(fast.status, ItemStatus::Approved);
}

// ============================================================================
// Review loop
// ============================================================================

#[tokio::test]
async fn full_review_loop_with_resubmission() {
    let services = services();

    let item = services
        .items
        .create(draft_input("user-1", "Threat model writeup"))
        .unwrap();

    // Submit creates the pending review
    services.items.submit(&item.id).unwrap();
    let reviews = services.reviews.list_for_item(&item.id).unwrap();
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0].status, ReviewStatus::Pending);

    services
        .items
        .start_review(&item.id, "mentor-9", Some("Dana"))
        .unwrap();

    // Low scores send it back
    let low = HashMap::from([
        ("technical_execution".to_string(), 4.0),
        ("documentation".to_string(), 5.0),
        ("autonomy".to_string(), 4.0),
    ]);
    let outcome = services
        .reviews
        .submit_review(&item.id, "mentor-9", Some("Dana"), &low, Some("thin evidence"), None)
        .unwrap();
    assert!(!outcome.approved);
    assert_eq!(outcome.item.status, ItemStatus::ChangesRequested);
    assert!(outcome.item.approved_at.is_none());

    // Owner may edit in changes_requested, then resubmit
    let current = services.items.get(&item.id).unwrap().unwrap();
    services
        .items
        .update_content(
            &item.id,
            current.version,
            &UpdateItemInput {
                summary: Some("Added attack tree and mitigations".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

    services.items.submit(&item.id).unwrap();
    services
        .items
        .start_review(&item.id, "mentor-9", Some("Dana"))
        .unwrap();

    // 8*0.4 + 6*0.3 + 10*0.3 = 8.0 >= 7.0 threshold
    let high = HashMap::from([
        ("technical_execution".to_string(), 8.0),
        ("documentation".to_string(), 6.0),
        ("autonomy".to_string(), 10.0),
    ]);
    let outcome = services
        .reviews
        .submit_review(&item.id, "mentor-9", Some("Dana"), &high, None, None)
        .unwrap();
    assert!(outcome.approved);
    assert!((outcome.review.total_score - 8.0).abs() < 1e-9);
    assert_eq!(outcome.item.status, ItemStatus::Approved);
    let approved_at = outcome.item.approved_at.clone().expect("approved_at set");

    // Two review records now exist, newest first
    let history = services.reviews.list_for_item(&item.id).unwrap();
    assert_eq!(history.len(), 2);

    // Publish stamps published_at and lifts visibility
    let published = services.items.publish(&item.id, Visibility::Public).unwrap();
    assert_eq!(published.status, ItemStatus::Published);
    assert_eq!(published.visibility, Visibility::Public);
    assert!(published.published_at.is_some());
    assert_eq!(published.approved_at.as_deref(), Some(approved_at.as_str()));

    // Review history is append-only once published
    let err = services
        .reviews
        .submit_review(&item.id, "mentor-9", None, &high, None, None)
        .unwrap_err();
    assert!(matches!(err, PortfolioError::Conflict(_)));
}

#[tokio::test]
async fn unknown_criterion_is_rejected_before_mutation() {
    let services = services();

    let item = services.items.create(draft_input("user-1", "Lab")).unwrap();
    services.items.submit(&item.id).unwrap();
    services.items.start_review(&item.id, "mentor-1", None).unwrap();

    let scores = HashMap::from([("vibes".to_string(), 10.0)]);
    let err = services
        .reviews
        .submit_review(&item.id, "mentor-1", None, &scores, None, None)
        .unwrap_err();
    assert!(matches!(err, PortfolioError::InvalidInput(_)));

    // Item untouched
    let current = services.items.get(&item.id).unwrap().unwrap();
    assert_eq!(current.status, ItemStatus::InReview);
}

// ============================================================================
// Lifecycle legality and edit conflicts
// ============================================================================

#[tokio::test]
async fn illegal_transitions_change_nothing() {
    let services = services();
    let item = services.items.create(draft_input("user-1", "Draft")).unwrap();

    // draft -> approved directly
    let err = services.items.approve(&item.id).unwrap_err();
    assert!(matches!(err, PortfolioError::InvalidTransition { .. }));

    // draft -> published directly
    let err = services.items.publish(&item.id, Visibility::Public).unwrap_err();
    assert!(matches!(err, PortfolioError::InvalidTransition { .. }));

    let current = services.items.get(&item.id).unwrap().unwrap();
    assert_eq!(current.status, ItemStatus::Draft);
    assert_eq!(current.version, item.version);
}

#[tokio::test]
async fn edits_rejected_while_in_review() {
    let services = services();
    let item = services.items.create(draft_input("user-1", "Lab")).unwrap();
    services.items.submit(&item.id).unwrap();
    services.items.start_review(&item.id, "mentor-1", None).unwrap();

    let current = services.items.get(&item.id).unwrap().unwrap();
    let err = services
        .items
        .update_content(
            &item.id,
            current.version,
            &UpdateItemInput {
                title: Some("sneaky rewrite".to_string()),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, PortfolioError::Conflict(_)));

    // State and content unchanged
    let after = services.items.get(&item.id).unwrap().unwrap();
    assert_eq!(after.status, ItemStatus::InReview);
    assert_eq!(after.title, "Lab");
    assert_eq!(after.version, current.version);
}

#[tokio::test]
async fn stale_version_loses_the_race() {
    let services = services();
    let item = services.items.create(draft_input("user-1", "Notes")).unwrap();

    // First writer wins
    services
        .items
        .update_content(
            &item.id,
            item.version,
            &UpdateItemInput {
                title: Some("Notes v2".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

    // Second writer still holds the old version
    let err = services
        .items
        .update_content(
            &item.id,
            item.version,
            &UpdateItemInput {
                title: Some("Notes v2-conflicting".to_string()),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, PortfolioError::Conflict(_)));

    let after = services.items.get(&item.id).unwrap().unwrap();
    assert_eq!(after.title, "Notes v2");
}

#[tokio::test]
async fn telemetry_counters_are_monotonic() {
    let services = services();
    let item = services.items.create(draft_input("user-1", "Lab")).unwrap();

    services.items.record_view(&item.id).unwrap();
    services.items.record_view(&item.id).unwrap();
    services.items.record_contact(&item.id).unwrap();

    let after = services.items.get(&item.id).unwrap().unwrap();
    assert_eq!(after.view_count, 2);
    assert_eq!(after.contact_count, 1);
}

#[tokio::test]
async fn reviews_outlive_deleted_items() {
    let services = services();
    let item = services.items.create(draft_input("user-1", "Lab")).unwrap();
    services.items.submit(&item.id).unwrap();

    assert!(services.items.delete(&item.id).unwrap());
    assert!(services.items.get(&item.id).unwrap().is_none());

    // Audit history remains
    let history = services.reviews.list_for_item(&item.id).unwrap();
    assert_eq!(history.len(), 1);
}

// ============================================================================
// Visibility sync
// ============================================================================

#[tokio::test]
async fn visibility_sync_touches_only_approved_items() {
    let services = services();

    // Two approved items via the fast-path, one draft
    services
        .coordination
        .complete_mission(&mission("user-1", "m-1", 95.0))
        .unwrap();
    services
        .coordination
        .complete_mission(&mission("user-1", "m-2", 91.0))
        .unwrap();
    let draft = services.items.create(draft_input("user-1", "WIP")).unwrap();

    let updated = services
        .coordination
        .sync_visibility(&VisibilityChanged {
            user_id: "user-1".to_string(),
            new_visibility: Visibility::Public,
        })
        .unwrap();
    assert_eq!(updated, 2);

    let approved = services
        .items
        .list(&ItemQuery {
            user_id: Some("user-1".to_string()),
            status: Some(ItemStatus::Approved),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(approved.len(), 2);
    assert!(approved.iter().all(|i| i.visibility == Visibility::Public));

    let draft_after = services.items.get(&draft.id).unwrap().unwrap();
    assert_eq!(draft_after.visibility, Visibility::Private);

    // Idempotent: re-running changes the same rows to the same value
    let updated = services
        .coordination
        .sync_visibility(&VisibilityChanged {
            user_id: "user-1".to_string(),
            new_visibility: Visibility::Public,
        })
        .unwrap();
    assert_eq!(updated, 2);
}

#[tokio::test]
async fn single_item_public_visibility_gated_on_approval() {
    let services = services();
    let item = services.items.create(draft_input("user-1", "Draft")).unwrap();

    let err = services
        .items
        .set_visibility(&item.id, Visibility::Public)
        .unwrap_err();
    assert!(matches!(err, PortfolioError::InvalidInput(_)));

    // Unlisted is fine pre-approval
    let unlisted = services
        .items
        .set_visibility(&item.id, Visibility::Unlisted)
        .unwrap();
    assert_eq!(unlisted.visibility, Visibility::Unlisted);
}

// ============================================================================
// Importers
// ============================================================================

#[tokio::test]
async fn github_import_is_idempotent_and_tagged() {
    let services = services();

    let payload = ProviderMetadata::Github {
        repo: "user/netscan".to_string(),
        description: Some("Async port scanner in rust with docker packaging".to_string()),
        stars: 41,
        forks: 3,
        languages: vec!["Rust".to_string()],
        topics: vec!["networking".to_string()],
    };

    let item = services.importer.import("user-1", payload.clone()).unwrap();
    assert_eq!(item.item_type, ItemType::Github);
    assert_eq!(item.status, ItemStatus::Draft);
    assert!(item.skills.contains(&"Rust".to_string()));
    assert!(item.skills.contains(&"Docker".to_string()));

    let again = services.importer.import("user-1", payload).unwrap();
    assert_eq!(again.id, item.id);
    assert_eq!(services.items.list_for_user("user-1").unwrap().len(), 1);
}

// ============================================================================
// Profiles and ranking
// ============================================================================

#[tokio::test]
async fn profile_created_at_health_threshold_and_ranked() {
    let services = services();

    // user-1 crosses the health threshold via the fast-path (overall 9.5)
    services
        .coordination
        .complete_mission(&mission("user-1", "m-1", 95.0))
        .unwrap();
    let profile = services
        .profiles
        .get("user-1")
        .unwrap()
        .expect("profile auto-created");
    assert!(profile.health_score > 9.0);
    assert!(profile.skills().contains_key("Nmap"));

    // user-2 has only a draft: no profile
    services.items.create(draft_input("user-2", "WIP")).unwrap();
    services.profiles.refresh("user-2").unwrap();
    assert!(services.profiles.get("user-2").unwrap().is_none());

    services.profiles.set_readiness("user-1", 80.0).unwrap();

    let ranked = services.profiles.rank_marketplace().unwrap();
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].user_id, "user-1");
    assert_eq!(ranked[0].rank, 1);
    assert_eq!(ranked[0].approved_items_count, 1);
    assert!(ranked[0].score > 0);

    // Deterministic re-run
    let ranked_again = services.profiles.rank_marketplace().unwrap();
    assert_eq!(ranked[0].score, ranked_again[0].score);
    assert_eq!(ranked[0].rank, ranked_again[0].rank);
}

#[tokio::test]
async fn database_persists_across_reopen() {
    let dir = tempfile::TempDir::new().unwrap();

    {
        let db = Arc::new(PortfolioDb::open(dir.path()).unwrap());
        let services = Services::with_defaults(db);
        services
            .items
            .create(draft_input("user-1", "Persistent item"))
            .unwrap();
    }

    let db = Arc::new(PortfolioDb::open(dir.path()).unwrap());
    assert_eq!(db.stats().unwrap().item_count, 1);

    let services = Services::with_defaults(db);
    assert_eq!(services.items.list_for_user("user-1").unwrap().len(), 1);
}

#[tokio::test]
async fn deactivated_profiles_leave_the_marketplace() {
    let services = services();

    services
        .coordination
        .complete_mission(&mission("user-1", "m-1", 95.0))
        .unwrap();
    services
        .coordination
        .complete_mission(&mission("user-2", "m-2", 93.0))
        .unwrap();

    assert_eq!(services.profiles.rank_marketplace().unwrap().len(), 2);

    services.profiles.deactivate("user-2").unwrap();
    let ranked = services.profiles.rank_marketplace().unwrap();
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].user_id, "user-1");

    // Never deleted: reactivation restores it
    services.profiles.reactivate("user-2").unwrap();
    assert_eq!(services.profiles.rank_marketplace().unwrap().len(), 2);
}
