//! Service recommendation, conditional pricing rules and price assembly.

pub mod assembler;
pub mod catalog;
pub mod money;
pub mod recommender;
pub mod rules;

pub use assembler::{assemble, Milestone, MilestoneTiers, PriceBreakdown, ProjectTier};
pub use catalog::{
    CatalogError, CatalogService, ServiceCatalog, ServiceCategory, ServiceId, StaticCatalog,
};
pub use money::{BasisPoints, Money};
pub use recommender::{RecommenderConfig, ServiceLine, ServiceRecommender, ServiceSelection};
pub use rules::{evaluate, AppliedAdjustment, PricingRule, RuleEvaluation, RuleId, RuleKind};

use crate::workflows::discovery::{DiscoveryRecord, QualificationScore, ValidationError};
use serde::{Deserialize, Serialize};

/// Pricing failures. None of these are retried; they need operator review.
#[derive(Debug, thiserror::Error)]
pub enum PricingError {
    #[error("total project cost {total} is negative; review the active pricing rules")]
    NegativeTotal { total: Money },
    #[error("selection subtotal {selection} does not match evaluated subtotal {evaluated}")]
    SubtotalMismatch { selection: Money, evaluated: Money },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Recommendation, rule evaluation and assembly for one scored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingQuote {
    pub selection: ServiceSelection,
    pub evaluation: RuleEvaluation,
    pub breakdown: PriceBreakdown,
}

#[derive(Debug, Clone, Default)]
pub struct PricingEngine {
    recommender: ServiceRecommender,
    tiers: MilestoneTiers,
}

impl PricingEngine {
    pub fn new(recommender: ServiceRecommender, tiers: MilestoneTiers) -> Self {
        Self { recommender, tiers }
    }

    pub fn tiers(&self) -> &MilestoneTiers {
        &self.tiers
    }

    pub fn quote(
        &self,
        record: &DiscoveryRecord,
        score: &QualificationScore,
        catalog: &dyn ServiceCatalog,
    ) -> Result<PricingQuote, PricingError> {
        let services = catalog.services()?;
        let rules = catalog.active_rules()?;
        let selection = self.recommender.recommend(record, score, &services)?;
        let profile = record.profile()?;
        let evaluation = evaluate(&profile, &selection, &rules);
        let breakdown = assemble(&selection, &evaluation, &self.tiers)?;

        tracing::info!(
            discovery_id = %record.discovery_id,
            total = breakdown.total_project_cost.cents(),
            rules_applied = evaluation.adjustments.len(),
            "pricing quote assembled"
        );

        Ok(PricingQuote {
            selection,
            evaluation,
            breakdown,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::discovery::{
        BudgetRange, CompanySize, ContactInfo, DiscoveryId, Industry, ScoringEngine,
        TimelineUrgency,
    };

    fn record() -> DiscoveryRecord {
        let mut record = DiscoveryRecord::new(
            DiscoveryId("dc-1".to_string()),
            "Northwind Clinics",
            ContactInfo {
                name: "Dana Reyes".to_string(),
                email: None,
                title: None,
            },
        );
        record.company_size = Some(CompanySize::Micro);
        record.industry = Some(Industry::Healthcare);
        record.budget_range = Some(BudgetRange::From50kTo100k);
        record.timeline_urgency = Some(TimelineUrgency::Immediate);
        record.weekly_hours_wasted = 15;
        record.team_size_affected = 12;
        record
    }

    #[test]
    fn standard_catalog_prices_the_healthcare_scenario() {
        let record = record();
        let score = ScoringEngine::default().score(&record).expect("scores");
        let quote = PricingEngine::default()
            .quote(&record, &score, &StaticCatalog::standard())
            .expect("quote builds");

        assert_eq!(quote.breakdown.total_project_cost, Money::from_cents(8_186_563));
        assert_eq!(quote.breakdown.total_project_cost.to_string(), "$81,865.63");
        assert_eq!(
            quote.evaluation.pairs().iter().map(|(id, _)| id.0).collect::<Vec<_>>(),
            vec![1, 6, 9]
        );
        assert!(quote.breakdown.reconciles());
    }

    #[test]
    fn oversized_discount_surfaces_negative_total() {
        let record = record();
        let score = ScoringEngine::default().score(&record).expect("scores");
        let catalog = StaticCatalog::standard()
            .with_rules(vec![PricingRule {
                rule_id: RuleId(99),
                name: "Misconfigured giveaway".to_string(),
                kind: RuleKind::Discount,
                conditions: Vec::new(),
                percentage: Some(BasisPoints::percent(-120)),
                fixed_amount: None,
                priority: 1,
                active: true,
            }])
            .expect("rule is well formed");

        let error = PricingEngine::default()
            .quote(&record, &score, &catalog)
            .expect_err("negative total fails");
        assert!(matches!(error, PricingError::NegativeTotal { .. }));
    }
}
