use serde::{Deserialize, Serialize};

/// Cut-offs applied to the composite score. Loaded from configuration; the defaults are
/// starting points inferred from the scoring ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualificationThresholds {
    pub qualified_threshold: u8,
    pub disqualified_floor: u8,
    pub budget_authority_floor: u8,
}

impl Default for QualificationThresholds {
    fn default() -> Self {
        Self {
            qualified_threshold: 60,
            disqualified_floor: 30,
            budget_authority_floor: 4,
        }
    }
}
