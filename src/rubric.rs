//! Static rubric catalog
//!
//! One rubric per item type. Criterion weights within a rubric sum to 1.0;
//! `catalog_weights_sum_to_one` guards that when rubrics are edited.

use once_cell::sync::Lazy;

use crate::model::ItemType;

/// A single weighted scoring criterion
#[derive(Debug, Clone)]
pub struct RubricCriterion {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    /// Weight in [0,1]; weights across a rubric sum to 1.0
    pub weight: f64,
}

/// Weighted criteria for one item type
#[derive(Debug, Clone)]
pub struct Rubric {
    pub item_type: ItemType,
    pub criteria: Vec<RubricCriterion>,
}

fn criterion(
    id: &'static str,
    name: &'static str,
    description: &'static str,
    weight: f64,
) -> RubricCriterion {
    RubricCriterion {
        id,
        name,
        description,
        weight,
    }
}

static CATALOG: Lazy<Vec<Rubric>> = Lazy::new(|| {
    vec![
        Rubric {
            item_type: ItemType::Mission,
            criteria: vec![
                criterion(
                    "technical_execution",
                    "Technical execution",
                    "Correctness and depth of the technical work",
                    0.4,
                ),
                criterion(
                    "documentation",
                    "Documentation",
                    "Write-up quality: approach, findings, reproduction steps",
                    0.3,
                ),
                criterion(
                    "autonomy",
                    "Autonomy",
                    "Degree of independent problem solving shown",
                    0.3,
                ),
            ],
        },
        Rubric {
            item_type: ItemType::Reflection,
            criteria: vec![
                criterion(
                    "depth",
                    "Depth of reflection",
                    "Goes beyond summary into analysis of choices made",
                    0.5,
                ),
                criterion(
                    "clarity",
                    "Clarity",
                    "Structured, readable writing",
                    0.3,
                ),
                criterion(
                    "growth",
                    "Growth evidence",
                    "Identifies concrete next steps",
                    0.2,
                ),
            ],
        },
        Rubric {
            item_type: ItemType::Certification,
            criteria: vec![
                criterion(
                    "relevance",
                    "Relevance",
                    "Certification matches the learner's track",
                    0.5,
                ),
                criterion(
                    "verifiability",
                    "Verifiability",
                    "Credential link or certificate file checks out",
                    0.5,
                ),
            ],
        },
        Rubric {
            item_type: ItemType::Github,
            criteria: vec![
                criterion(
                    "code_quality",
                    "Code quality",
                    "Structure, tests, idiomatic use of the language",
                    0.4,
                ),
                criterion(
                    "documentation",
                    "Documentation",
                    "README explains what it is and how to run it",
                    0.3,
                ),
                criterion(
                    "activity",
                    "Activity",
                    "Commit history shows sustained work, not a single dump",
                    0.3,
                ),
            ],
        },
        Rubric {
            item_type: ItemType::Tryhackme,
            criteria: vec![
                criterion(
                    "coverage",
                    "Room coverage",
                    "Breadth and difficulty of completed rooms",
                    0.6,
                ),
                criterion(
                    "writeups",
                    "Write-ups",
                    "Attached notes demonstrate understanding, not walkthrough copying",
                    0.4,
                ),
            ],
        },
        Rubric {
            item_type: ItemType::External,
            criteria: vec![
                criterion(
                    "evidence",
                    "Evidence quality",
                    "Artifacts substantiate the claimed work",
                    0.6,
                ),
                criterion(
                    "relevance",
                    "Relevance",
                    "Work relates to the learner's target role",
                    0.4,
                ),
            ],
        },
        Rubric {
            item_type: ItemType::MarketplaceWork,
            criteria: vec![
                criterion(
                    "delivery",
                    "Delivery",
                    "Scope delivered as agreed with the client",
                    0.4,
                ),
                criterion(
                    "quality",
                    "Quality",
                    "Craftsmanship of the delivered work",
                    0.4,
                ),
                criterion(
                    "communication",
                    "Communication",
                    "Client-facing communication during the engagement",
                    0.2,
                ),
            ],
        },
    ]
});

/// Get the rubric for an item type
pub fn rubric_for(item_type: ItemType) -> &'static Rubric {
    CATALOG
        .iter()
        .find(|r| r.item_type == item_type)
        .expect("catalog covers every item type")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_covers_every_item_type() {
        for &t in ItemType::all() {
            let rubric = rubric_for(t);
            assert!(!rubric.criteria.is_empty());
        }
    }

    #[test]
    fn catalog_weights_sum_to_one() {
        for &t in ItemType::all() {
            let rubric = rubric_for(t);
            let sum: f64 = rubric.criteria.iter().map(|c| c.weight).sum();
            assert!(
                (sum - 1.0).abs() < 1e-9,
                "{} rubric weights sum to {}",
                t,
                sum
            );
        }
    }

    #[test]
    fn criterion_ids_unique_within_rubric() {
        for &t in ItemType::all() {
            let rubric = rubric_for(t);
            let mut ids: Vec<_> = rubric.criteria.iter().map(|c| c.id).collect();
            ids.sort();
            ids.dedup();
            assert_eq!(ids.len(), rubric.criteria.len());
        }
    }
}
