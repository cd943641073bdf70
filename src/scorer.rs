//! Weighted rubric scoring
//!
//! Pure functions, no I/O. Raw criterion scores are assumed to be on a 0-10
//! scale and are not validated here; callers clamp before scoring.

use std::collections::HashMap;

use crate::rubric::Rubric;

/// Clamp a raw criterion score to the 0-10 scale
pub fn clamp_score(score: f64) -> f64 {
    score.clamp(0.0, 10.0)
}

/// Compute the weighted total for a rubric given criterion scores.
///
/// Divides by the sum of weights actually scored, so a partially-scored
/// rubric still lands on the 0-10 scale instead of being dragged toward
/// zero by unscored criteria. An empty rubric (or one with no scored
/// criteria) returns 0 rather than dividing by zero.
pub fn weighted_total(rubric: &Rubric, scores: &HashMap<String, f64>) -> f64 {
    let mut acc = 0.0;
    let mut weight_sum = 0.0;

    for criterion in &rubric.criteria {
        if let Some(&score) = scores.get(criterion.id) {
            acc += score * criterion.weight;
            weight_sum += criterion.weight;
        }
    }

    if weight_sum == 0.0 {
        0.0
    } else {
        acc / weight_sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ItemType;
    use crate::rubric::{Rubric, RubricCriterion};

    fn test_rubric() -> Rubric {
        Rubric {
            item_type: ItemType::Mission,
            criteria: vec![
                RubricCriterion {
                    id: "tech",
                    name: "Tech",
                    description: "",
                    weight: 0.5,
                },
                RubricCriterion {
                    id: "docs",
                    name: "Docs",
                    description: "",
                    weight: 0.3,
                },
                RubricCriterion {
                    id: "comms",
                    name: "Comms",
                    description: "",
                    weight: 0.2,
                },
            ],
        }
    }

    #[test]
    fn test_weighted_total() {
        let rubric = test_rubric();
        let scores = HashMap::from([
            ("tech".to_string(), 8.0),
            ("docs".to_string(), 6.0),
            ("comms".to_string(), 10.0),
        ]);
        // 8*0.5 + 6*0.3 + 10*0.2 = 7.8
        let total = weighted_total(&rubric, &scores);
        assert!((total - 7.8).abs() < 1e-9);
    }

    #[test]
    fn test_partial_scoring_divides_by_scored_weight() {
        let rubric = test_rubric();
        let scores = HashMap::from([("tech".to_string(), 8.0)]);
        // 8*0.5 / 0.5 = 8.0, not 4.0
        let total = weighted_total(&rubric, &scores);
        assert!((total - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_rubric_returns_zero() {
        let rubric = Rubric {
            item_type: ItemType::Mission,
            criteria: vec![],
        };
        assert_eq!(weighted_total(&rubric, &HashMap::new()), 0.0);
    }

    #[test]
    fn test_no_matching_scores_returns_zero() {
        let rubric = test_rubric();
        let scores = HashMap::from([("unknown".to_string(), 9.0)]);
        assert_eq!(weighted_total(&rubric, &scores), 0.0);
    }

    #[test]
    fn test_output_bounded_for_clamped_inputs() {
        let rubric = test_rubric();
        for raw in [-5.0, 0.0, 3.3, 10.0, 99.0] {
            let s = clamp_score(raw);
            let scores = HashMap::from([
                ("tech".to_string(), s),
                ("docs".to_string(), s),
                ("comms".to_string(), s),
            ]);
            let total = weighted_total(&rubric, &scores);
            assert!((0.0..=10.0).contains(&total));
        }
    }
}
