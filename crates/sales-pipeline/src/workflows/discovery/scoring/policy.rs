use super::super::domain::QualificationStatus;
use super::config::QualificationThresholds;

pub(crate) fn decide_status(
    overall: u8,
    budget_authority: u8,
    thresholds: &QualificationThresholds,
) -> QualificationStatus {
    if overall >= thresholds.qualified_threshold
        && budget_authority >= thresholds.budget_authority_floor
    {
        return QualificationStatus::Qualified;
    }

    if overall < thresholds.disqualified_floor {
        return QualificationStatus::Disqualified;
    }

    QualificationStatus::Nurture
}
