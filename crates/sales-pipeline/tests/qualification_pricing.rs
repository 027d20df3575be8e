//! Qualification scoring and pricing exercised through the public engine facades.

mod common {
    use sales_pipeline::workflows::discovery::{
        BudgetRange, CompanySize, ContactInfo, DiscoveryId, DiscoveryRecord, Industry,
        TimelineUrgency,
    };
    use sales_pipeline::workflows::pricing::Money;

    pub(super) fn contact(name: &str) -> ContactInfo {
        ContactInfo {
            name: name.to_string(),
            email: None,
            title: None,
        }
    }

    pub(super) fn clinic() -> DiscoveryRecord {
        let mut record = DiscoveryRecord::new(
            DiscoveryId("dc-clinic".to_string()),
            "Northwind Clinics",
            contact("Dana Reyes"),
        );
        record.company_size = Some(CompanySize::Micro);
        record.industry = Some(Industry::Healthcare);
        record.budget_range = Some(BudgetRange::From50kTo100k);
        record.timeline_urgency = Some(TimelineUrgency::Immediate);
        record.weekly_hours_wasted = 15;
        record.team_size_affected = 12;
        record
    }

    pub(super) fn small_practice() -> DiscoveryRecord {
        let mut record = clinic();
        record.discovery_id = DiscoveryId("dc-practice".to_string());
        record.timeline_urgency = Some(TimelineUrgency::ThreeMonths);
        record.weekly_hours_wasted = 5;
        record.team_size_affected = 3;
        record
    }

    pub(super) fn enterprise() -> DiscoveryRecord {
        let mut record = DiscoveryRecord::new(
            DiscoveryId("dc-enterprise".to_string()),
            "Contoso Systems",
            contact("Morgan Lee"),
        );
        record.company_size = Some(CompanySize::Enterprise);
        record.industry = Some(Industry::Technology);
        record.budget_range = Some(BudgetRange::Over250k);
        record.timeline_urgency = Some(TimelineUrgency::Immediate);
        record.decision_maker = Some(contact("Avery Chen"));
        record.weekly_hours_wasted = 40;
        record.estimated_cost_inefficiency = Money::from_dollars(250_000);
        record.team_size_affected = 60;
        record.notes.integration_requirements =
            "salesforce and hubspot and a postgres database".to_string();
        record
    }
}

use std::io::Cursor;

use common::*;
use sales_pipeline::workflows::discovery::{QualificationStatus, ScoringEngine};
use sales_pipeline::workflows::pricing::{
    BasisPoints, CatalogError, Money, PricingEngine, PricingError, ProjectTier,
    ServiceCategory, StaticCatalog,
};

#[test]
fn clinic_scenario_prices_with_three_rules() {
    let record = clinic();
    let score = ScoringEngine::default().score(&record).expect("record scores");
    assert_eq!(score.overall, 75);
    assert_eq!(score.status, QualificationStatus::Qualified);

    let quote = PricingEngine::default()
        .quote(&record, &score, &StaticCatalog::standard())
        .expect("quote assembles");
    let breakdown = &quote.breakdown;

    assert_eq!(quote.selection.subtotal(), Money::from_dollars(67_000));
    assert_eq!(breakdown.base_services_cost, Money::from_dollars(45_000));
    assert_eq!(breakdown.additional_services_cost, Money::from_dollars(22_000));
    assert_eq!(breakdown.discounts_applied, Money::from_dollars(10_050));
    assert_eq!(breakdown.total_project_cost.to_string(), "$81,865.63");
    assert_eq!(breakdown.tier, ProjectTier::Medium);
    assert_eq!(
        breakdown
            .milestones
            .iter()
            .map(|milestone| milestone.amount.cents())
            .collect::<Vec<_>>(),
        vec![2_455_968, 3_274_625, 2_455_970]
    );
    assert!(breakdown.reconciles());
}

#[test]
fn small_project_uses_two_payments() {
    let record = small_practice();
    let score = ScoringEngine::default().score(&record).expect("record scores");
    let quote = PricingEngine::default()
        .quote(&record, &score, &StaticCatalog::standard())
        .expect("quote assembles");
    let breakdown = &quote.breakdown;

    assert_eq!(
        quote.selection.categories(),
        vec![ServiceCategory::AutomationDevelopment]
    );
    assert_eq!(breakdown.total_project_cost, Money::from_cents(4_618_688));
    assert_eq!(breakdown.tier, ProjectTier::Small);
    assert_eq!(breakdown.milestones.len(), 2);
    assert_eq!(breakdown.milestones[0].amount, Money::from_cents(2_309_344));
    assert_eq!(breakdown.milestone_amount_total(), breakdown.total_project_cost);
    assert_eq!(breakdown.milestone_fraction_total(), BasisPoints::percent(100));
}

#[test]
fn enterprise_project_uses_four_payments() {
    let record = enterprise();
    let score = ScoringEngine::default().score(&record).expect("record scores");
    assert_eq!(score.budget_authority, 10);

    let quote = PricingEngine::default()
        .quote(&record, &score, &StaticCatalog::standard())
        .expect("quote assembles");
    let breakdown = &quote.breakdown;

    assert_eq!(quote.selection.categories().len(), 5);
    assert_eq!(quote.selection.subtotal(), Money::from_dollars(111_000));
    assert_eq!(
        quote
            .evaluation
            .pairs()
            .iter()
            .map(|(rule, _)| rule.0)
            .collect::<Vec<_>>(),
        vec![5, 16, 9, 14]
    );
    assert_eq!(breakdown.total_project_cost, Money::from_cents(17_399_250));
    assert_eq!(breakdown.complexity_adjustments, Money::from_cents(7_215_000));
    assert_eq!(breakdown.discounts_applied, Money::from_cents(915_750));
    assert_eq!(breakdown.tier, ProjectTier::Large);
    assert_eq!(
        breakdown
            .milestones
            .iter()
            .map(|milestone| milestone.amount.cents())
            .collect::<Vec<_>>(),
        vec![4_349_812, 4_349_812, 4_349_812, 4_349_814]
    );
    assert!(breakdown.reconciles());
}

#[test]
fn imported_catalog_drives_prices() {
    let csv = "service_id,service_name,service_category,base_price,base_hours_required,is_active\n\
core,Automation Build,automation_development,30000,150,true\n\
ops,Process Review,process_optimization,10000,40,true\n\
edu,Team Training,training,2000,8,true\n";
    let services =
        StaticCatalog::services_from_csv_reader(Cursor::new(csv)).expect("catalog parses");
    let catalog = StaticCatalog::standard()
        .with_services(services)
        .with_rules(Vec::new())
        .expect("no rules is valid");

    let record = clinic();
    let score = ScoringEngine::default().score(&record).expect("record scores");
    let quote = PricingEngine::default()
        .quote(&record, &score, &catalog)
        .expect("quote assembles");

    assert_eq!(quote.breakdown.total_project_cost, Money::from_dollars(44_000));
    assert!(quote.evaluation.adjustments.is_empty());
    assert_eq!(quote.breakdown.tier, ProjectTier::Small);
}

#[test]
fn missing_core_service_is_a_catalog_error() {
    let csv = "service_id,service_name,service_category,base_price,base_hours_required,is_active\n\
core,Automation Build,automation_development,30000,150,false\n";
    let services =
        StaticCatalog::services_from_csv_reader(Cursor::new(csv)).expect("catalog parses");
    let catalog = StaticCatalog::standard().with_services(services);

    let record = small_practice();
    let score = ScoringEngine::default().score(&record).expect("record scores");
    let result = PricingEngine::default().quote(&record, &score, &catalog);

    assert!(matches!(
        result,
        Err(PricingError::Catalog(CatalogError::MissingCategory(
            ServiceCategory::AutomationDevelopment
        )))
    ));
}

#[test]
fn json_rules_replace_the_standard_set() {
    let rules = r#"[
        {
            "rule_id": 40,
            "name": "Partner rate",
            "kind": "discount",
            "conditions": [{"categorical": {"industry": ["Healthcare"]}}],
            "percentage": -1000,
            "priority": 5
        }
    ]"#;
    let rules = StaticCatalog::rules_from_json_reader(Cursor::new(rules)).expect("rules parse");
    let catalog = StaticCatalog::standard()
        .with_rules(rules)
        .expect("rules validate");

    let record = clinic();
    let score = ScoringEngine::default().score(&record).expect("record scores");
    let quote = PricingEngine::default()
        .quote(&record, &score, &catalog)
        .expect("quote assembles");

    assert_eq!(quote.breakdown.total_project_cost, Money::from_dollars(60_300));
    assert_eq!(quote.breakdown.discounts_applied, Money::from_dollars(6_700));
}
