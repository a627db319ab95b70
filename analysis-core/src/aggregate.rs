//! Score aggregation.
//!
//! Two rules live here and they are not interchangeable:
//!
//! ```text
//! axis_mean   single result    overall = mean(nonzero axes)            0..10
//! composite   five analyses    Σ weight_i · score_i (risk inverted)    0..100
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{clamp_axis, ContentAnalysisResult};

/// Tolerance for the weight-sum check.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Upper bound of a category score and of the composite.
pub const MAX_CATEGORY_SCORE: f64 = 100.0;

/// Mean of the nonzero entries of `axes`, or 0 when none are present.
///
/// A zero axis means "not assessed", so it never drags the mean down.
pub fn axis_mean(axes: &[f64]) -> f64 {
    let assessed: Vec<f64> = axes
        .iter()
        .map(|v| clamp_axis(*v))
        .filter(|v| *v > 0.0)
        .collect();
    if assessed.is_empty() {
        return 0.0;
    }
    assessed.iter().sum::<f64>() / assessed.len() as f64
}

/// Errors raised when a weight table cannot be used.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AggregationError {
    #[error("composite weights sum to {0}, expected 1.0")]
    WeightSum(f64),

    #[error("weight for {analysis} is {weight}, expected a value in [0, 1]")]
    WeightRange { analysis: SubAnalysis, weight: f64 },
}

/// The five independent sub-analyses of comprehensive mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubAnalysis {
    ComputerVision,
    SportSpecific,
    Benchmarking,
    InjuryRisk,
    Coaching,
}

impl SubAnalysis {
    pub const ALL: [SubAnalysis; 5] = [
        Self::ComputerVision,
        Self::SportSpecific,
        Self::Benchmarking,
        Self::InjuryRisk,
        Self::Coaching,
    ];

    /// Whether a higher raw score means a worse outcome.
    pub fn is_inverted(self) -> bool {
        matches!(self, Self::InjuryRisk)
    }
}

impl fmt::Display for SubAnalysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ComputerVision => write!(f, "computer_vision"),
            Self::SportSpecific => write!(f, "sport_specific"),
            Self::Benchmarking => write!(f, "benchmarking"),
            Self::InjuryRisk => write!(f, "injury_risk"),
            Self::Coaching => write!(f, "coaching"),
        }
    }
}

/// Weight table for the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositeWeights {
    pub computer_vision: f64,
    pub sport_specific: f64,
    pub benchmarking: f64,
    pub injury_risk: f64,
    pub coaching: f64,
}

impl Default for CompositeWeights {
    fn default() -> Self {
        Self {
            computer_vision: 0.25,
            sport_specific: 0.30,
            benchmarking: 0.20,
            injury_risk: 0.10,
            coaching: 0.15,
        }
    }
}

impl CompositeWeights {
    pub fn weight(&self, analysis: SubAnalysis) -> f64 {
        match analysis {
            SubAnalysis::ComputerVision => self.computer_vision,
            SubAnalysis::SportSpecific => self.sport_specific,
            SubAnalysis::Benchmarking => self.benchmarking,
            SubAnalysis::InjuryRisk => self.injury_risk,
            SubAnalysis::Coaching => self.coaching,
        }
    }

    pub fn sum(&self) -> f64 {
        SubAnalysis::ALL.iter().map(|a| self.weight(*a)).sum()
    }

    /// Check every weight is in `[0, 1]` and they sum to 1.
    pub fn validate(&self) -> Result<(), AggregationError> {
        for analysis in SubAnalysis::ALL {
            let weight = self.weight(analysis);
            if !(0.0..=1.0).contains(&weight) {
                return Err(AggregationError::WeightRange { analysis, weight });
            }
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(AggregationError::WeightSum(sum));
        }
        Ok(())
    }
}

/// Reduce one result to its 0–100 category score.
///
/// An unassessed result (every axis 0) of an inverted category reads as the
/// worst raw score, so missing risk data is never credited as "no risk".
pub fn category_score(analysis: SubAnalysis, result: &ContentAnalysisResult) -> f64 {
    if analysis.is_inverted() && result.performance.is_insufficient() {
        return MAX_CATEGORY_SCORE;
    }
    (result.performance.overall() * 10.0).clamp(0.0, MAX_CATEGORY_SCORE)
}

/// One weighted contribution to the composite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub analysis: SubAnalysis,
    /// 0–100 score as reported by the sub-analysis (a risk score for injury risk).
    pub raw_score: f64,
    /// Score after inversion, the value that is weighted.
    pub effective_score: f64,
    pub weight: f64,
    pub weighted: f64,
}

/// Composite score plus its per-category breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeScore {
    pub overall: u32,
    pub categories: Vec<CategoryScore>,
}

/// Combine five 0–100 category scores into a rounded composite.
///
/// Categories missing from `scores` contribute nothing: an absent inverted
/// category reads as the worst raw score. The injury-risk term is inverted
/// before weighting.
pub fn composite(
    scores: &BTreeMap<SubAnalysis, f64>,
    weights: &CompositeWeights,
) -> CompositeScore {
    let mut total = 0.0;
    let categories = SubAnalysis::ALL
        .iter()
        .map(|analysis| {
            let absent = if analysis.is_inverted() {
                MAX_CATEGORY_SCORE
            } else {
                0.0
            };
            let raw_score = scores
                .get(analysis)
                .copied()
                .filter(|v| !v.is_nan())
                .unwrap_or(absent)
                .clamp(0.0, MAX_CATEGORY_SCORE);
            let effective_score = if analysis.is_inverted() {
                MAX_CATEGORY_SCORE - raw_score
            } else {
                raw_score
            };
            let weight = weights.weight(*analysis);
            let weighted = weight * effective_score;
            total += weighted;
            CategoryScore {
                analysis: *analysis,
                raw_score,
                effective_score,
                weight,
                weighted,
            }
        })
        .collect();

    CompositeScore {
        overall: total.round().clamp(0.0, MAX_CATEGORY_SCORE) as u32,
        categories,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MediaKind;

    fn uniform(score: f64) -> BTreeMap<SubAnalysis, f64> {
        SubAnalysis::ALL.iter().map(|a| (*a, score)).collect()
    }

    #[test]
    fn default_weights_sum_to_one() {
        let weights = CompositeWeights::default();
        assert!((weights.sum() - 1.0).abs() <= WEIGHT_SUM_TOLERANCE);
        weights.validate().expect("default weights must validate");
    }

    #[test]
    fn weight_sum_violation_is_rejected() {
        let weights = CompositeWeights {
            coaching: 0.25,
            ..Default::default()
        };
        assert!(matches!(
            weights.validate(),
            Err(AggregationError::WeightSum(_))
        ));
    }

    #[test]
    fn negative_weight_is_rejected() {
        let weights = CompositeWeights {
            computer_vision: -0.05,
            sport_specific: 0.60,
            ..Default::default()
        };
        assert!(matches!(
            weights.validate(),
            Err(AggregationError::WeightRange {
                analysis: SubAnalysis::ComputerVision,
                ..
            })
        ));
    }

    #[test]
    fn axis_mean_ignores_zeros() {
        assert_eq!(axis_mean(&[8.0, 0.0, 6.0, 0.0]), 7.0);
        assert_eq!(axis_mean(&[0.0, 0.0]), 0.0);
        assert_eq!(axis_mean(&[]), 0.0);
    }

    #[test]
    fn axis_mean_clamps_before_averaging() {
        assert_eq!(axis_mean(&[15.0, 5.0]), 7.5);
    }

    #[test]
    fn injury_risk_is_inverted() {
        let weights = CompositeWeights::default();
        let low_risk = {
            let mut s = uniform(80.0);
            s.insert(SubAnalysis::InjuryRisk, 10.0);
            composite(&s, &weights)
        };
        let high_risk = {
            let mut s = uniform(80.0);
            s.insert(SubAnalysis::InjuryRisk, 90.0);
            composite(&s, &weights)
        };
        assert!(low_risk.overall > high_risk.overall);
    }

    #[test]
    fn composite_of_fallback_scores() {
        // Every sub-analysis at 60, risk inverted to 40:
        // 15 + 18 + 12 + 4 + 9 = 58
        let result = composite(&uniform(60.0), &CompositeWeights::default());
        assert_eq!(result.overall, 58);
        assert_eq!(result.categories.len(), 5);
        let risk = result
            .categories
            .iter()
            .find(|c| c.analysis == SubAnalysis::InjuryRisk)
            .unwrap();
        assert_eq!(risk.effective_score, 40.0);
    }

    #[test]
    fn composite_stays_in_range() {
        let weights = CompositeWeights::default();
        for score in [0.0, 25.0, 50.0, 100.0, 250.0, -40.0, f64::NAN] {
            let result = composite(&uniform(score), &weights);
            assert!(result.overall <= 100);
        }
        let mut best = uniform(100.0);
        best.insert(SubAnalysis::InjuryRisk, 0.0);
        assert_eq!(composite(&best, &weights).overall, 100);
    }

    #[test]
    fn missing_category_contributes_nothing() {
        let mut scores = BTreeMap::new();
        scores.insert(SubAnalysis::SportSpecific, 100.0);
        // Injury risk absent → raw 100 → inverted to 0
        let result = composite(&scores, &CompositeWeights::default());
        assert_eq!(result.overall, 30);
        let risk = result
            .categories
            .iter()
            .find(|c| c.analysis == SubAnalysis::InjuryRisk)
            .unwrap();
        assert_eq!(risk.effective_score, 0.0);
    }

    #[test]
    fn unassessed_risk_is_never_credited() {
        let unassessed = ContentAnalysisResult::empty(MediaKind::Video, "soccer");
        assert!(unassessed.performance.is_insufficient());
        assert_eq!(category_score(SubAnalysis::InjuryRisk, &unassessed), 100.0);
        assert_eq!(category_score(SubAnalysis::Coaching, &unassessed), 0.0);
    }
}
