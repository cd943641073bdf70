//! Marketplace ranking computation
//!
//! Pure full-population ranking: six normalized factors combined with fixed
//! weights into a 0-100 score, sorted descending with a stable tie-break on
//! profile creation order. Recomputed from scratch on every call; weekly
//! rank deltas are a caller concern (snapshot and diff externally).

use serde::{Deserialize, Serialize};

/// Views beyond this cap no longer raise the score
pub const VIEW_CAP: f64 = 1000.0;
/// Approved items beyond this cap no longer raise the score
pub const ITEM_CAP: f64 = 20.0;
/// Profile age cap in days
pub const AGE_CAP_DAYS: f64 = 365.0;

const W_VIEWS: f64 = 0.15;
const W_READINESS: f64 = 0.25;
const W_HEALTH: f64 = 0.20;
const W_ITEMS: f64 = 0.15;
const W_AVG_COMPETENCY: f64 = 0.15;
const W_AGE: f64 = 0.10;

/// Read-only snapshot of one profile, as fed to the ranking computation.
///
/// Built from the profiles table plus item aggregates; a slightly stale
/// snapshot is acceptable (ranking has no strong-consistency requirement).
#[derive(Debug, Clone)]
pub struct ProfileSnapshot {
    pub user_id: String,
    pub username: String,
    /// ISO 8601; used for the deterministic tie-break (earlier first)
    pub created_at: String,
    pub total_views: i64,
    /// Externally sourced, 0-100
    pub readiness_score: f64,
    /// Derived portfolio health, 0-10
    pub health_score: f64,
    pub approved_items: i64,
    /// Mean competency score across approved items, 0-10
    pub avg_competency: f64,
    /// Profile age in days
    pub age_days: f64,
}

/// One row of the ranking query result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedProfile {
    pub user_id: String,
    pub username: String,
    pub readiness_score: f64,
    pub portfolio_health: f64,
    pub total_views: i64,
    pub approved_items_count: i64,
    /// 0-100
    pub score: u32,
    /// 1 = best; dense 1..N even when scores tie
    pub rank: u32,
}

fn normalize(value: f64, cap: f64) -> f64 {
    if cap <= 0.0 {
        return 0.0;
    }
    (value / cap).clamp(0.0, 1.0)
}

/// Compute the 0-100 ranking score for one profile
pub fn ranking_score(snapshot: &ProfileSnapshot) -> u32 {
    let weighted = normalize(snapshot.total_views as f64, VIEW_CAP) * W_VIEWS
        + normalize(snapshot.readiness_score, 100.0) * W_READINESS
        + normalize(snapshot.health_score, 10.0) * W_HEALTH
        + normalize(snapshot.approved_items as f64, ITEM_CAP) * W_ITEMS
        + normalize(snapshot.avg_competency, 10.0) * W_AVG_COMPETENCY
        + normalize(snapshot.age_days, AGE_CAP_DAYS) * W_AGE;

    (weighted * 100.0).round() as u32
}

/// Rank the full population: descending by score, ties broken by earlier
/// profile creation, dense ranks 1..N.
pub fn rank_profiles(snapshots: Vec<ProfileSnapshot>) -> Vec<RankedProfile> {
    let mut scored: Vec<(u32, ProfileSnapshot)> = snapshots
        .into_iter()
        .map(|s| (ranking_score(&s), s))
        .collect();

    scored.sort_by(|(score_a, a), (score_b, b)| {
        score_b
            .cmp(score_a)
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.user_id.cmp(&b.user_id))
    });

    scored
        .into_iter()
        .enumerate()
        .map(|(i, (score, s))| RankedProfile {
            user_id: s.user_id,
            username: s.username,
            readiness_score: s.readiness_score,
            portfolio_health: s.health_score,
            total_views: s.total_views,
            approved_items_count: s.approved_items,
            score,
            rank: (i + 1) as u32,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(user_id: &str) -> ProfileSnapshot {
        ProfileSnapshot {
            user_id: user_id.to_string(),
            username: user_id.to_string(),
            created_at: "2025-01-01T00:00:00Z".to_string(),
            total_views: 0,
            readiness_score: 0.0,
            health_score: 0.0,
            approved_items: 0,
            avg_competency: 0.0,
            age_days: 0.0,
        }
    }

    #[test]
    fn test_maxed_and_empty_profiles() {
        let a = ProfileSnapshot {
            total_views: 1000,
            readiness_score: 100.0,
            health_score: 10.0,
            approved_items: 20,
            avg_competency: 10.0,
            age_days: 400.0,
            ..snapshot("a")
        };
        let b = snapshot("b");

        assert_eq!(ranking_score(&a), 100);
        assert_eq!(ranking_score(&b), 0);

        let ranked = rank_profiles(vec![b, a]);
        assert_eq!(ranked[0].user_id, "a");
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[1].user_id, "b");
        assert_eq!(ranked[1].rank, 2);
    }

    #[test]
    fn test_caps_clamp_excess() {
        let over = ProfileSnapshot {
            total_views: 1_000_000,
            approved_items: 500,
            age_days: 10_000.0,
            ..snapshot("x")
        };
        let at_cap = ProfileSnapshot {
            total_views: 1000,
            approved_items: 20,
            age_days: 365.0,
            ..snapshot("y")
        };
        assert_eq!(ranking_score(&over), ranking_score(&at_cap));
    }

    #[test]
    fn test_deterministic_reruns() {
        let population: Vec<ProfileSnapshot> = (0..25i64)
            .map(|i| ProfileSnapshot {
                total_views: (i * 37) % 1100,
                readiness_score: ((i * 13) % 101) as f64,
                health_score: ((i * 7) % 11) as f64,
                approved_items: i % 23,
                avg_competency: ((i * 3) % 11) as f64,
                age_days: ((i * 29) % 400) as f64,
                ..snapshot(&format!("user-{:02}", i))
            })
            .collect();

        let first = rank_profiles(population.clone());
        let second = rank_profiles(population);
        let ids_a: Vec<_> = first.iter().map(|r| (&r.user_id, r.score, r.rank)).collect();
        let ids_b: Vec<_> = second.iter().map(|r| (&r.user_id, r.score, r.rank)).collect();
        assert_eq!(ids_a, ids_b);
    }

    #[test]
    fn test_tie_break_earlier_profile_first() {
        let mut older = snapshot("older");
        older.created_at = "2024-06-01T00:00:00Z".to_string();
        let mut newer = snapshot("newer");
        newer.created_at = "2025-06-01T00:00:00Z".to_string();

        let ranked = rank_profiles(vec![newer, older]);
        assert_eq!(ranked[0].user_id, "older");
        assert_eq!(ranked[0].score, ranked[1].score);
        assert_eq!((ranked[0].rank, ranked[1].rank), (1, 2));
    }

    #[test]
    fn test_monotone_in_each_factor() {
        let base = ProfileSnapshot {
            total_views: 200,
            readiness_score: 40.0,
            health_score: 5.0,
            approved_items: 4,
            avg_competency: 6.0,
            age_days: 100.0,
            ..snapshot("m")
        };
        let base_score = ranking_score(&base);

        let bumps: Vec<ProfileSnapshot> = vec![
            ProfileSnapshot { total_views: 400, ..base.clone() },
            ProfileSnapshot { readiness_score: 60.0, ..base.clone() },
            ProfileSnapshot { health_score: 7.0, ..base.clone() },
            ProfileSnapshot { approved_items: 8, ..base.clone() },
            ProfileSnapshot { avg_competency: 8.0, ..base.clone() },
            ProfileSnapshot { age_days: 200.0, ..base.clone() },
        ];

        for bumped in bumps {
            assert!(
                ranking_score(&bumped) >= base_score,
                "raising a factor must never lower the score"
            );
        }
    }

    #[test]
    fn test_ranks_dense_with_ties() {
        let ranked = rank_profiles(vec![snapshot("a"), snapshot("b"), snapshot("c")]);
        let ranks: Vec<u32> = ranked.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
    }
}
