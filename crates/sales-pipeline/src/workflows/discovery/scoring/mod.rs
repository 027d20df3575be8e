mod config;
mod policy;
mod rules;

pub use config::QualificationThresholds;

use super::domain::{DiscoveryId, DiscoveryRecord, QualificationStatus, ValidationError};
use policy::decide_status;
use serde::{Deserialize, Serialize};

/// Stateless calculator that turns a discovery record into a qualification score.
#[derive(Debug, Clone, Default)]
pub struct ScoringEngine {
    thresholds: QualificationThresholds,
}

impl ScoringEngine {
    pub fn new(thresholds: QualificationThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &QualificationThresholds {
        &self.thresholds
    }

    pub fn score(&self, record: &DiscoveryRecord) -> Result<QualificationScore, ValidationError> {
        let profile = record.profile()?;
        let (scores, components) = rules::score_profile(&profile);
        let overall = scores.overall();
        let status = decide_status(overall, scores.budget_authority, &self.thresholds);

        Ok(QualificationScore {
            discovery_id: record.discovery_id.clone(),
            pain: scores.pain,
            budget_authority: scores.budget_authority,
            timeline_urgency: scores.timeline_urgency,
            technical_fit: scores.technical_fit,
            overall,
            status,
            components,
        })
    }

    /// Re-applies the thresholds to an arbitrary set of sub-scores.
    pub fn decide(&self, score: &QualificationScore) -> QualificationStatus {
        decide_status(score.overall, score.budget_authority, &self.thresholds)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreFactor {
    Pain,
    BudgetAuthority,
    TimelineUrgency,
    TechnicalFit,
}

/// One sub-score with the inputs that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreComponent {
    pub factor: ScoreFactor,
    pub score: u8,
    pub notes: String,
}

/// Sub-scores are 0..=10; `overall` is 0..=100. A re-score yields a new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualificationScore {
    pub discovery_id: DiscoveryId,
    pub pain: u8,
    pub budget_authority: u8,
    pub timeline_urgency: u8,
    pub technical_fit: u8,
    pub overall: u8,
    pub status: QualificationStatus,
    pub components: Vec<ScoreComponent>,
}

impl QualificationScore {
    /// Composite of arbitrary sub-scores using the same rule as [`ScoringEngine::score`].
    pub fn composite(pain: u8, budget_authority: u8, timeline_urgency: u8, technical_fit: u8) -> u8 {
        rules::SubScores {
            pain,
            budget_authority,
            timeline_urgency,
            technical_fit,
        }
        .overall()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} scored {} (pain {}, budget/authority {}, urgency {}, fit {})",
            self.status.label(),
            self.overall,
            self.pain,
            self.budget_authority,
            self.timeline_urgency,
            self.technical_fit
        )
    }
}
