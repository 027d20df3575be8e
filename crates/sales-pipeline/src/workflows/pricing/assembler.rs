use super::money::{BasisPoints, Money};
use super::recommender::ServiceSelection;
use super::rules::{AppliedAdjustment, RuleEvaluation};
use super::PricingError;
use serde::{Deserialize, Serialize};

const HOURS_PER_WEEK: u32 = 40;

/// Total-cost boundaries for choosing a milestone schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneTiers {
    /// Totals strictly below this use the two-payment schedule.
    pub small_project_max: Money,
    /// Totals strictly above this use the four-payment schedule.
    pub large_project_min: Money,
}

impl Default for MilestoneTiers {
    fn default() -> Self {
        Self {
            small_project_max: Money::from_dollars(50_000),
            large_project_min: Money::from_dollars(150_000),
        }
    }
}

impl MilestoneTiers {
    pub fn tier_for(&self, total: Money) -> ProjectTier {
        if total < self.small_project_max {
            ProjectTier::Small
        } else if total <= self.large_project_min {
            ProjectTier::Medium
        } else {
            ProjectTier::Large
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectTier {
    Small,
    Medium,
    Large,
}

impl ProjectTier {
    fn schedule(self) -> &'static [(&'static str, i32, &'static str)] {
        match self {
            Self::Small => &[
                ("Project Start", 50, "Initial payment to begin project development"),
                ("Project Completion", 50, "Final payment upon successful project delivery"),
            ],
            Self::Medium => &[
                ("Project Start", 30, "Initial payment to begin project development"),
                ("Development Milestone", 40, "Payment upon completion of core development"),
                ("Project Completion", 30, "Final payment upon successful project delivery"),
            ],
            Self::Large => &[
                ("Project Start", 25, "Initial payment to begin project development"),
                ("Development Phase 1", 25, "Payment upon completion of the first development phase"),
                ("Development Phase 2", 25, "Payment upon completion of the second development phase"),
                ("Project Completion", 25, "Final payment upon successful project delivery"),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub sequence: u8,
    pub name: String,
    pub fraction: BasisPoints,
    pub amount: Money,
    pub trigger: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    /// Mandatory core automation service.
    pub base_services_cost: Money,
    /// Optional services selected by the recommender.
    pub additional_services_cost: Money,
    pub complexity_adjustments: Money,
    pub discounts_applied: Money,
    pub total_project_cost: Money,
    pub estimated_hours: u32,
    pub timeline_weeks: u32,
    pub effective_hourly_rate: Money,
    pub tier: ProjectTier,
    pub milestones: Vec<Milestone>,
    pub adjustments: Vec<AppliedAdjustment>,
}

impl PriceBreakdown {
    pub fn reconciles(&self) -> bool {
        self.base_services_cost + self.additional_services_cost + self.complexity_adjustments
            - self.discounts_applied
            == self.total_project_cost
    }

    pub fn milestone_fraction_total(&self) -> BasisPoints {
        BasisPoints::new(self.milestones.iter().map(|m| m.fraction.value()).sum())
    }

    pub fn milestone_amount_total(&self) -> Money {
        self.milestones.iter().map(|m| m.amount).sum()
    }

    pub fn first_milestone(&self) -> Option<&Milestone> {
        self.milestones.first()
    }
}

/// Combines selection costs with rule adjustments. Adjustments are split by sign:
/// positive amounts are complexity, negative amounts are discounts.
pub fn assemble(
    selection: &ServiceSelection,
    evaluation: &RuleEvaluation,
    tiers: &MilestoneTiers,
) -> Result<PriceBreakdown, PricingError> {
    let subtotal = selection.subtotal();
    if subtotal != evaluation.starting_subtotal {
        return Err(PricingError::SubtotalMismatch {
            selection: subtotal,
            evaluated: evaluation.starting_subtotal,
        });
    }

    let base_services_cost = selection.core_cost();
    let additional_services_cost = selection.optional_cost();
    let complexity_adjustments: Money = evaluation
        .adjustments
        .iter()
        .map(|adjustment| adjustment.amount)
        .filter(|amount| *amount > Money::ZERO)
        .sum();
    let discounts_applied: Money = evaluation
        .adjustments
        .iter()
        .map(|adjustment| adjustment.amount)
        .filter(|amount| amount.is_negative())
        .map(Money::abs)
        .sum();
    let total_project_cost =
        base_services_cost + additional_services_cost + complexity_adjustments - discounts_applied;

    if total_project_cost.is_negative() {
        return Err(PricingError::NegativeTotal {
            total: total_project_cost,
        });
    }

    let estimated_hours = selection.total_hours();
    let effective_hourly_rate = if estimated_hours == 0 {
        Money::ZERO
    } else {
        Money::from_cents(total_project_cost.cents() / estimated_hours as i64)
    };
    let tier = tiers.tier_for(total_project_cost);

    Ok(PriceBreakdown {
        base_services_cost,
        additional_services_cost,
        complexity_adjustments,
        discounts_applied,
        total_project_cost,
        estimated_hours,
        timeline_weeks: estimated_hours / HOURS_PER_WEEK + 1,
        effective_hourly_rate,
        tier,
        milestones: milestones_for(tier, total_project_cost),
        adjustments: evaluation.adjustments.clone(),
    })
}

fn milestones_for(tier: ProjectTier, total: Money) -> Vec<Milestone> {
    let schedule = tier.schedule();
    let mut allocated = Money::ZERO;
    let mut milestones = Vec::with_capacity(schedule.len());

    for (index, (name, percent, trigger)) in schedule.iter().enumerate() {
        let fraction = BasisPoints::percent(*percent);
        let amount = if index + 1 == schedule.len() {
            total - allocated
        } else {
            total.portion(fraction)
        };
        allocated += amount;
        milestones.push(Milestone {
            sequence: index as u8 + 1,
            name: name.to_string(),
            fraction,
            amount,
            trigger: trigger.to_string(),
        });
    }

    milestones
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::discovery::DiscoveryId;
    use crate::workflows::pricing::catalog::{ServiceCategory, ServiceId};
    use crate::workflows::pricing::recommender::ServiceLine;
    use crate::workflows::pricing::rules::{RuleId, RuleKind};

    fn line(category: ServiceCategory, dollars: i64, quantity: u32, hours: u32) -> ServiceLine {
        ServiceLine {
            service_id: ServiceId(format!("svc-{}", category.label())),
            service_name: category.label().to_string(),
            category,
            quantity,
            hours,
            unit_price: Money::from_dollars(dollars),
        }
    }

    fn scenario_selection() -> ServiceSelection {
        ServiceSelection {
            discovery_id: DiscoveryId("dc-1".to_string()),
            lines: vec![
                line(ServiceCategory::AutomationDevelopment, 45_000, 1, 200),
                line(ServiceCategory::ProcessOptimization, 15_000, 1, 80),
                line(ServiceCategory::Training, 3_500, 2, 32),
            ],
        }
    }

    fn adjustment(id: u32, kind: RuleKind, before: i64, cents: i64) -> AppliedAdjustment {
        AppliedAdjustment {
            rule_id: RuleId(id),
            rule_name: format!("rule {id}"),
            kind,
            amount: Money::from_cents(cents),
            subtotal_before: Money::from_cents(before),
            subtotal_after: Money::from_cents(before + cents),
        }
    }

    fn scenario_evaluation() -> RuleEvaluation {
        RuleEvaluation {
            starting_subtotal: Money::from_dollars(67_000),
            adjustments: vec![
                adjustment(1, RuleKind::Discount, 6_700_000, -1_005_000),
                adjustment(6, RuleKind::Premium, 5_695_000, 854_250),
                adjustment(9, RuleKind::Premium, 6_549_250, 1_637_313),
            ],
            subtotal: Money::from_cents(8_186_563),
        }
    }

    #[test]
    fn scenario_breakdown_reconciles() {
        let breakdown = assemble(
            &scenario_selection(),
            &scenario_evaluation(),
            &MilestoneTiers::default(),
        )
        .expect("breakdown assembles");

        assert_eq!(breakdown.base_services_cost, Money::from_dollars(45_000));
        assert_eq!(breakdown.additional_services_cost, Money::from_dollars(22_000));
        assert_eq!(breakdown.complexity_adjustments, Money::from_cents(2_491_563));
        assert_eq!(breakdown.discounts_applied, Money::from_dollars(10_050));
        assert_eq!(breakdown.total_project_cost, Money::from_cents(8_186_563));
        assert!(breakdown.reconciles());
        assert_eq!(breakdown.estimated_hours, 312);
        assert_eq!(breakdown.timeline_weeks, 8);
        assert_eq!(breakdown.effective_hourly_rate, Money::from_cents(26_238));
    }

    #[test]
    fn medium_tier_carries_rounding_remainder_into_last_milestone() {
        let breakdown = assemble(
            &scenario_selection(),
            &scenario_evaluation(),
            &MilestoneTiers::default(),
        )
        .expect("breakdown assembles");

        assert_eq!(breakdown.tier, ProjectTier::Medium);
        let amounts: Vec<i64> = breakdown.milestones.iter().map(|m| m.amount.cents()).collect();
        assert_eq!(amounts, vec![2_455_968, 3_274_625, 2_455_970]);
        assert_eq!(breakdown.milestone_fraction_total(), BasisPoints::percent(100));
        assert_eq!(breakdown.milestone_amount_total(), breakdown.total_project_cost);
        assert_eq!(
            breakdown.first_milestone().map(|m| m.name.as_str()),
            Some("Project Start")
        );
    }

    #[test]
    fn tier_boundaries() {
        let tiers = MilestoneTiers::default();
        assert_eq!(tiers.tier_for(Money::from_cents(4_999_999)), ProjectTier::Small);
        assert_eq!(tiers.tier_for(Money::from_dollars(50_000)), ProjectTier::Medium);
        assert_eq!(tiers.tier_for(Money::from_dollars(150_000)), ProjectTier::Medium);
        assert_eq!(tiers.tier_for(Money::from_cents(15_000_001)), ProjectTier::Large);
        assert_eq!(ProjectTier::Large.schedule().len(), 4);
    }

    #[test]
    fn negative_premium_is_reported_as_discount() {
        let selection = ServiceSelection {
            discovery_id: DiscoveryId("dc-2".to_string()),
            lines: vec![line(ServiceCategory::AutomationDevelopment, 45_000, 1, 200)],
        };
        let evaluation = RuleEvaluation {
            starting_subtotal: Money::from_dollars(45_000),
            adjustments: vec![adjustment(3, RuleKind::Premium, 4_500_000, -500_000)],
            subtotal: Money::from_dollars(40_000),
        };

        let breakdown = assemble(&selection, &evaluation, &MilestoneTiers::default())
            .expect("breakdown assembles");
        assert_eq!(breakdown.complexity_adjustments, Money::ZERO);
        assert_eq!(breakdown.discounts_applied, Money::from_dollars(5_000));
        assert_eq!(breakdown.tier, ProjectTier::Small);
        assert_eq!(breakdown.milestones.len(), 2);
    }

    #[test]
    fn negative_total_is_an_error() {
        let selection = ServiceSelection {
            discovery_id: DiscoveryId("dc-3".to_string()),
            lines: vec![line(ServiceCategory::AutomationDevelopment, 45_000, 1, 200)],
        };
        let evaluation = RuleEvaluation {
            starting_subtotal: Money::from_dollars(45_000),
            adjustments: vec![adjustment(1, RuleKind::Discount, 4_500_000, -5_400_000)],
            subtotal: Money::from_dollars(-9_000),
        };

        match assemble(&selection, &evaluation, &MilestoneTiers::default()) {
            Err(PricingError::NegativeTotal { total }) => {
                assert_eq!(total, Money::from_dollars(-9_000));
            }
            other => panic!("expected negative total, got {other:?}"),
        }
    }
}
