use super::money::{BasisPoints, Money};
use super::rules::{
    CategoricalMatch, NumericAttribute, PricingRule, RangeMatch, RuleCondition, RuleId, RuleKind,
};
use crate::workflows::discovery::{CompanySize, Industry, TimelineUrgency};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServiceId(pub String);

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceCategory {
    AutomationDevelopment,
    ProcessOptimization,
    IntegrationSetup,
    OngoingManagement,
    Training,
}

impl ServiceCategory {
    pub const fn ordered() -> [Self; 5] {
        [
            Self::AutomationDevelopment,
            Self::ProcessOptimization,
            Self::IntegrationSetup,
            Self::OngoingManagement,
            Self::Training,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::AutomationDevelopment => "automation_development",
            Self::ProcessOptimization => "process_optimization",
            Self::IntegrationSetup => "integration_setup",
            Self::OngoingManagement => "ongoing_management",
            Self::Training => "training",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        Self::ordered()
            .into_iter()
            .find(|category| category.label() == normalized)
    }

    pub const fn is_core(self) -> bool {
        matches!(self, Self::AutomationDevelopment)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogService {
    pub service_id: ServiceId,
    pub service_name: String,
    pub category: ServiceCategory,
    pub base_price: Money,
    pub base_hours: u32,
    pub active: bool,
}

/// Read-only catalog lookups. Implementations may be backed by the relational store.
pub trait ServiceCatalog: Send + Sync {
    fn service(&self, id: &ServiceId) -> Result<CatalogService, CatalogError>;
    fn services(&self) -> Result<Vec<CatalogService>, CatalogError>;
    /// Active rules ordered by ascending priority, ties by ascending rule id.
    fn active_rules(&self) -> Result<Vec<PricingRule>, CatalogError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("service {0} not found in catalog")]
    UnknownService(ServiceId),
    #[error("catalog has no active `{}` service", .0.label())]
    MissingCategory(ServiceCategory),
    #[error("catalog row {line}: {reason}")]
    InvalidRow { line: u64, reason: String },
    #[error("pricing rule {rule_id}: {reason}")]
    InvalidRule { rule_id: RuleId, reason: String },
    #[error("failed to read catalog data: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid catalog CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid pricing rules JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Catalog held in memory, seeded from the standard offering or imported files.
#[derive(Debug, Clone)]
pub struct StaticCatalog {
    services: Vec<CatalogService>,
    rules: Vec<PricingRule>,
}

impl StaticCatalog {
    pub fn new(services: Vec<CatalogService>, rules: Vec<PricingRule>) -> Result<Self, CatalogError> {
        for rule in &rules {
            rule.validate()?;
        }
        Ok(Self { services, rules })
    }

    pub fn standard() -> Self {
        Self {
            services: standard_services(),
            rules: standard_rules(),
        }
    }

    pub fn with_services(mut self, services: Vec<CatalogService>) -> Self {
        self.services = services;
        self
    }

    pub fn with_rules(mut self, rules: Vec<PricingRule>) -> Result<Self, CatalogError> {
        for rule in &rules {
            rule.validate()?;
        }
        self.rules = rules;
        Ok(self)
    }

    pub fn services_from_csv_path<P: AsRef<Path>>(
        path: P,
    ) -> Result<Vec<CatalogService>, CatalogError> {
        let file = std::fs::File::open(path)?;
        Self::services_from_csv_reader(file)
    }

    /// Columns: `service_id,service_name,service_category,base_price,base_hours_required,is_active`.
    pub fn services_from_csv_reader<R: Read>(reader: R) -> Result<Vec<CatalogService>, CatalogError> {
        let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut services = Vec::new();

        for row in csv_reader.deserialize::<CatalogRow>() {
            let row = row?;
            services.push(row.into_service()?);
        }

        Ok(services)
    }

    pub fn rules_from_json_path<P: AsRef<Path>>(path: P) -> Result<Vec<PricingRule>, CatalogError> {
        let file = std::fs::File::open(path)?;
        Self::rules_from_json_reader(file)
    }

    pub fn rules_from_json_reader<R: Read>(reader: R) -> Result<Vec<PricingRule>, CatalogError> {
        let rules: Vec<PricingRule> = serde_json::from_reader(reader)?;
        for rule in &rules {
            rule.validate()?;
        }
        Ok(rules)
    }
}

impl ServiceCatalog for StaticCatalog {
    fn service(&self, id: &ServiceId) -> Result<CatalogService, CatalogError> {
        self.services
            .iter()
            .find(|service| &service.service_id == id)
            .cloned()
            .ok_or_else(|| CatalogError::UnknownService(id.clone()))
    }

    fn services(&self) -> Result<Vec<CatalogService>, CatalogError> {
        Ok(self.services.clone())
    }

    fn active_rules(&self) -> Result<Vec<PricingRule>, CatalogError> {
        let mut rules: Vec<PricingRule> =
            self.rules.iter().filter(|rule| rule.active).cloned().collect();
        rules.sort_by_key(|rule| (rule.priority, rule.rule_id));
        Ok(rules)
    }
}

#[derive(Debug, Deserialize)]
struct CatalogRow {
    service_id: String,
    service_name: String,
    service_category: String,
    base_price: String,
    base_hours_required: u32,
    #[serde(default)]
    is_active: Option<String>,
}

impl CatalogRow {
    fn into_service(self) -> Result<CatalogService, CatalogError> {
        let category = ServiceCategory::parse(&self.service_category).ok_or_else(|| {
            CatalogError::InvalidRow {
                line: 0,
                reason: format!("unknown service category `{}`", self.service_category),
            }
        })?;
        let base_price = parse_dollars(&self.base_price).ok_or_else(|| CatalogError::InvalidRow {
            line: 0,
            reason: format!("base price `{}` is not a dollar amount", self.base_price),
        })?;
        let active = match self.is_active.as_deref().map(str::to_ascii_lowercase) {
            None => true,
            Some(flag) => matches!(flag.as_str(), "" | "1" | "true" | "yes"),
        };

        Ok(CatalogService {
            service_id: ServiceId(self.service_id),
            service_name: self.service_name,
            category,
            base_price,
            base_hours: self.base_hours_required,
            active,
        })
    }
}

/// Parses `45000`, `45000.5` or `45,000.50` into cents.
fn parse_dollars(raw: &str) -> Option<Money> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches('$')
        .chars()
        .filter(|c| *c != ',')
        .collect();
    let (whole, fraction) = match cleaned.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (cleaned.as_str(), ""),
    };
    if whole.is_empty() || fraction.len() > 2 {
        return None;
    }
    let whole: i64 = whole.parse().ok()?;
    let fraction: i64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().ok()? * 10,
        _ => fraction.parse().ok()?,
    };
    Some(Money::from_cents(whole * 100 + fraction))
}

pub fn standard_services() -> Vec<CatalogService> {
    let service = |id: &str, name: &str, category, dollars, hours| CatalogService {
        service_id: ServiceId(id.to_string()),
        service_name: name.to_string(),
        category,
        base_price: Money::from_dollars(dollars),
        base_hours: hours,
        active: true,
    };

    vec![
        service(
            "svc-automation",
            "Custom Automation Development",
            ServiceCategory::AutomationDevelopment,
            45_000,
            200,
        ),
        service(
            "svc-process",
            "Process Optimization Consulting",
            ServiceCategory::ProcessOptimization,
            15_000,
            80,
        ),
        service(
            "svc-integration",
            "System Integration Setup",
            ServiceCategory::IntegrationSetup,
            8_000,
            40,
        ),
        service(
            "svc-ongoing",
            "Ongoing Automation Management",
            ServiceCategory::OngoingManagement,
            6_000,
            24,
        ),
        service(
            "svc-training",
            "Team Training & Enablement",
            ServiceCategory::Training,
            3_500,
            16,
        ),
    ]
}

/// Company-size, industry, urgency and volume adjustments, evaluated in that order.
pub fn standard_rules() -> Vec<PricingRule> {
    let percent_rule = |id: u32, name: &str, kind, priority, percent, conditions| PricingRule {
        rule_id: RuleId(id),
        name: name.to_string(),
        kind,
        conditions,
        percentage: Some(BasisPoints::percent(percent)),
        fixed_amount: None,
        priority,
        active: true,
    };
    let size = |sizes: &[CompanySize]| {
        vec![RuleCondition::Categorical(CategoricalMatch::CompanySize(
            sizes.to_vec(),
        ))]
    };
    let industry = |industries: &[Industry]| {
        vec![RuleCondition::Categorical(CategoricalMatch::Industry(
            industries.to_vec(),
        ))]
    };
    let timeline = |timelines: &[TimelineUrgency]| {
        vec![RuleCondition::Categorical(CategoricalMatch::Timeline(
            timelines.to_vec(),
        ))]
    };
    let range = |attribute, min, max| {
        vec![RuleCondition::Range(RangeMatch {
            attribute,
            min,
            max,
        })]
    };

    let mut new_client = percent_rule(
        15,
        "New client discount",
        RuleKind::Discount,
        50,
        -5,
        Vec::new(),
    );
    new_client.active = false;

    vec![
        percent_rule(1, "Small company discount", RuleKind::Discount, 10, -15, size(&[CompanySize::Micro])),
        percent_rule(2, "Growth company discount", RuleKind::Discount, 10, -5, size(&[CompanySize::Small])),
        percent_rule(3, "Upper mid-market premium", RuleKind::Premium, 10, 10, size(&[CompanySize::UpperMid])),
        percent_rule(4, "Large company premium", RuleKind::Premium, 10, 15, size(&[CompanySize::Large])),
        percent_rule(5, "Enterprise premium", RuleKind::Premium, 10, 20, size(&[CompanySize::Enterprise])),
        percent_rule(6, "Healthcare compliance premium", RuleKind::Premium, 20, 15, industry(&[Industry::Healthcare])),
        percent_rule(7, "Financial services premium", RuleKind::Premium, 20, 20, industry(&[Industry::Finance])),
        percent_rule(8, "Government premium", RuleKind::Premium, 20, 25, industry(&[Industry::Government])),
        percent_rule(
            16,
            "Large team complexity",
            RuleKind::ComplexityMultiplier,
            25,
            10,
            range(NumericAttribute::TeamSizeAffected, Some(21), None),
        ),
        percent_rule(9, "Immediate timeline premium", RuleKind::Premium, 30, 25, timeline(&[TimelineUrgency::Immediate])),
        percent_rule(10, "One month timeline premium", RuleKind::Premium, 30, 15, timeline(&[TimelineUrgency::OneMonth])),
        percent_rule(11, "Three month timeline premium", RuleKind::Premium, 30, 5, timeline(&[TimelineUrgency::ThreeMonths])),
        percent_rule(12, "Flexible timeline discount", RuleKind::Discount, 30, -5, timeline(&[TimelineUrgency::TwelveMonths])),
        percent_rule(
            13,
            "Volume discount over $200K",
            RuleKind::VolumeDiscount,
            40,
            -10,
            range(
                NumericAttribute::RunningSubtotal,
                Some(Money::from_dollars(200_000).cents() + 1),
                None,
            ),
        ),
        percent_rule(
            14,
            "Volume discount over $100K",
            RuleKind::VolumeDiscount,
            40,
            -5,
            range(
                NumericAttribute::RunningSubtotal,
                Some(Money::from_dollars(100_000).cents() + 1),
                Some(Money::from_dollars(200_000).cents()),
            ),
        ),
        new_client,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn active_rules_are_sorted_and_filtered() {
        let catalog = StaticCatalog::standard();
        let rules = catalog.active_rules().expect("rules available");

        assert!(rules.iter().all(|rule| rule.active));
        assert!(!rules.iter().any(|rule| rule.rule_id == RuleId(15)));
        let keys: Vec<(i32, RuleId)> = rules.iter().map(|rule| (rule.priority, rule.rule_id)).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn csv_import_parses_prices_and_flags() {
        let csv = "service_id,service_name,service_category,base_price,base_hours_required,is_active\n\
svc-a,Automation,automation_development,\"45,000.50\",200,1\n\
svc-t,Training,training,3500,16,false\n";
        let services =
            StaticCatalog::services_from_csv_reader(Cursor::new(csv)).expect("catalog parses");

        assert_eq!(services.len(), 2);
        assert_eq!(services[0].base_price, Money::from_cents(4_500_050));
        assert_eq!(services[0].category, ServiceCategory::AutomationDevelopment);
        assert!(services[0].active);
        assert!(!services[1].active);
    }

    #[test]
    fn csv_import_rejects_unknown_category() {
        let csv = "service_id,service_name,service_category,base_price,base_hours_required,is_active\n\
svc-x,Mystery,consulting,100,1,1\n";
        let error = StaticCatalog::services_from_csv_reader(Cursor::new(csv))
            .expect_err("unknown category fails");
        assert!(matches!(error, CatalogError::InvalidRow { .. }));
    }

    #[test]
    fn lookup_by_id_reports_unknown_services() {
        let catalog = StaticCatalog::standard();
        let found = catalog
            .service(&ServiceId("svc-training".to_string()))
            .expect("training exists");
        assert_eq!(found.base_hours, 16);

        match catalog.service(&ServiceId("svc-missing".to_string())) {
            Err(CatalogError::UnknownService(id)) => assert_eq!(id.0, "svc-missing"),
            other => panic!("expected unknown service, got {other:?}"),
        }
    }

    #[test]
    fn rules_round_trip_through_json_files() {
        let json = serde_json::to_string(&standard_rules()).expect("serialize rules");
        let rules = StaticCatalog::rules_from_json_reader(Cursor::new(json)).expect("parse rules");
        assert_eq!(rules, standard_rules());
    }

    #[test]
    fn parse_dollars_accepts_common_formats() {
        assert_eq!(parse_dollars("45000"), Some(Money::from_dollars(45_000)));
        assert_eq!(parse_dollars("$1,250.5"), Some(Money::from_cents(125_050)));
        assert_eq!(parse_dollars("12.345"), None);
        assert_eq!(parse_dollars("abc"), None);
    }
}
