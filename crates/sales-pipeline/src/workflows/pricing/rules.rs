use super::catalog::CatalogError;
use super::money::{BasisPoints, Money};
use super::recommender::ServiceSelection;
use crate::workflows::discovery::{
    BudgetRange, CompanySize, DiscoveryProfile, Industry, RevenueBracket, TimelineUrgency,
};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RuleId(pub u32);

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Declared intent of a rule. Reporting classifies adjustments by sign, not by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Discount,
    Premium,
    ComplexityMultiplier,
    VolumeDiscount,
}

/// Everything a condition may inspect while a rule is being evaluated.
#[derive(Debug, Clone, Copy)]
pub struct PricingContext<'a> {
    pub profile: &'a DiscoveryProfile,
    pub selection: &'a ServiceSelection,
    pub subtotal: Money,
}

pub trait ConditionMatcher {
    fn matches(&self, context: &PricingContext<'_>) -> bool;
    fn describe(&self) -> String;
}

/// One attribute checked for membership in a fixed set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalMatch {
    CompanySize(Vec<CompanySize>),
    Industry(Vec<Industry>),
    Budget(Vec<BudgetRange>),
    Timeline(Vec<TimelineUrgency>),
    Revenue(Vec<RevenueBracket>),
}

impl CategoricalMatch {
    fn is_empty(&self) -> bool {
        match self {
            Self::CompanySize(values) => values.is_empty(),
            Self::Industry(values) => values.is_empty(),
            Self::Budget(values) => values.is_empty(),
            Self::Timeline(values) => values.is_empty(),
            Self::Revenue(values) => values.is_empty(),
        }
    }
}

impl ConditionMatcher for CategoricalMatch {
    fn matches(&self, context: &PricingContext<'_>) -> bool {
        let profile = context.profile;
        match self {
            Self::CompanySize(values) => values.contains(&profile.company_size),
            Self::Industry(values) => values.contains(&profile.industry),
            Self::Budget(values) => values.contains(&profile.budget_range),
            Self::Timeline(values) => values.contains(&profile.timeline_urgency),
            Self::Revenue(values) => profile
                .annual_revenue
                .map(|revenue| values.contains(&revenue))
                .unwrap_or(false),
        }
    }

    fn describe(&self) -> String {
        fn join<T>(values: &[T], label: impl Fn(&T) -> String) -> String {
            values.iter().map(label).collect::<Vec<_>>().join(", ")
        }

        match self {
            Self::CompanySize(values) => {
                format!("company size in [{}]", join(values, |v| v.label().to_string()))
            }
            Self::Industry(values) => {
                format!("industry in [{}]", join(values, |v| v.label().to_string()))
            }
            Self::Budget(values) => {
                format!("budget in [{}]", join(values, |v| v.label().to_string()))
            }
            Self::Timeline(values) => {
                format!("timeline in [{}]", join(values, |v| v.label().to_string()))
            }
            Self::Revenue(values) => {
                format!("revenue in [{}]", join(values, |v| format!("{v:?}")))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericAttribute {
    WeeklyHoursWasted,
    TeamSizeAffected,
    /// Cents.
    EstimatedCostInefficiency,
    /// Cents, measured before the rule applies.
    RunningSubtotal,
    SelectedServices,
}

impl NumericAttribute {
    fn read(self, context: &PricingContext<'_>) -> i64 {
        match self {
            Self::WeeklyHoursWasted => context.profile.weekly_hours_wasted as i64,
            Self::TeamSizeAffected => context.profile.team_size_affected as i64,
            Self::EstimatedCostInefficiency => context.profile.estimated_cost_inefficiency.cents(),
            Self::RunningSubtotal => context.subtotal.cents(),
            Self::SelectedServices => context.selection.lines.len() as i64,
        }
    }
}

/// Inclusive range; an absent bound is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeMatch {
    pub attribute: NumericAttribute,
    #[serde(default)]
    pub min: Option<i64>,
    #[serde(default)]
    pub max: Option<i64>,
}

impl ConditionMatcher for RangeMatch {
    fn matches(&self, context: &PricingContext<'_>) -> bool {
        let value = self.attribute.read(context);
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }

    fn describe(&self) -> String {
        let bound = |value: Option<i64>| value.map_or_else(|| "..".to_string(), |v| v.to_string());
        format!(
            "{:?} within [{}, {}]",
            self.attribute,
            bound(self.min),
            bound(self.max)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCondition {
    Categorical(CategoricalMatch),
    Range(RangeMatch),
}

impl RuleCondition {
    fn matcher(&self) -> &dyn ConditionMatcher {
        match self {
            Self::Categorical(condition) => condition,
            Self::Range(condition) => condition,
        }
    }
}

impl ConditionMatcher for RuleCondition {
    fn matches(&self, context: &PricingContext<'_>) -> bool {
        self.matcher().matches(context)
    }

    fn describe(&self) -> String {
        self.matcher().describe()
    }
}

/// Immutable catalog data. An empty condition list matches every deal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingRule {
    pub rule_id: RuleId,
    pub name: String,
    pub kind: RuleKind,
    #[serde(default)]
    pub conditions: Vec<RuleCondition>,
    #[serde(default)]
    pub percentage: Option<BasisPoints>,
    #[serde(default)]
    pub fixed_amount: Option<Money>,
    pub priority: i32,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl PricingRule {
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.percentage.is_none() && self.fixed_amount.is_none() {
            return Err(CatalogError::InvalidRule {
                rule_id: self.rule_id,
                reason: "rule defines neither a percentage nor a fixed amount".to_string(),
            });
        }
        for condition in &self.conditions {
            let empty = match condition {
                RuleCondition::Categorical(set) => set.is_empty(),
                RuleCondition::Range(range) => matches!(
                    (range.min, range.max),
                    (Some(min), Some(max)) if min > max
                ),
            };
            if empty {
                return Err(CatalogError::InvalidRule {
                    rule_id: self.rule_id,
                    reason: format!("condition `{}` can never match", condition.describe()),
                });
            }
        }
        Ok(())
    }

    pub fn matches(&self, context: &PricingContext<'_>) -> bool {
        self.conditions
            .iter()
            .all(|condition| condition.matches(context))
    }

    /// Signed adjustment against the subtotal accumulated so far.
    pub fn adjustment(&self, subtotal: Money) -> Money {
        let percentage = self
            .percentage
            .map(|rate| subtotal.apply(rate))
            .unwrap_or(Money::ZERO);
        percentage + self.fixed_amount.unwrap_or(Money::ZERO)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedAdjustment {
    pub rule_id: RuleId,
    pub rule_name: String,
    pub kind: RuleKind,
    pub amount: Money,
    pub subtotal_before: Money,
    pub subtotal_after: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleEvaluation {
    pub starting_subtotal: Money,
    pub adjustments: Vec<AppliedAdjustment>,
    pub subtotal: Money,
}

impl RuleEvaluation {
    pub fn pairs(&self) -> Vec<(RuleId, Money)> {
        self.adjustments
            .iter()
            .map(|adjustment| (adjustment.rule_id, adjustment.amount))
            .collect()
    }
}

/// Applies matching active rules in ascending (priority, rule id) order. Each adjustment
/// is computed against the subtotal produced by the rules before it.
pub fn evaluate(
    profile: &DiscoveryProfile,
    selection: &ServiceSelection,
    rules: &[PricingRule],
) -> RuleEvaluation {
    let mut ordered: Vec<&PricingRule> = rules.iter().filter(|rule| rule.active).collect();
    ordered.sort_by_key(|rule| (rule.priority, rule.rule_id));

    let starting_subtotal = selection.subtotal();
    let mut subtotal = starting_subtotal;
    let mut adjustments = Vec::new();

    for rule in ordered {
        let context = PricingContext {
            profile,
            selection,
            subtotal,
        };
        if !rule.matches(&context) {
            continue;
        }

        let amount = rule.adjustment(subtotal);
        let subtotal_after = subtotal + amount;
        tracing::debug!(
            rule_id = rule.rule_id.0,
            amount = amount.cents(),
            subtotal = subtotal_after.cents(),
            "pricing rule applied"
        );
        adjustments.push(AppliedAdjustment {
            rule_id: rule.rule_id,
            rule_name: rule.name.clone(),
            kind: rule.kind,
            amount,
            subtotal_before: subtotal,
            subtotal_after,
        });
        subtotal = subtotal_after;
    }

    RuleEvaluation {
        starting_subtotal,
        adjustments,
        subtotal,
    }
}
