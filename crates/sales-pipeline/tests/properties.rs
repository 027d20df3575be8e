//! Property checks for scoring bounds and price reconciliation.

mod common {
    use proptest::prelude::*;
    use sales_pipeline::workflows::discovery::{
        BudgetRange, CompanySize, ContactInfo, DiscoveryId, DiscoveryRecord, Industry,
        TimelineUrgency,
    };
    use sales_pipeline::workflows::pricing::Money;

    fn company_size() -> impl Strategy<Value = CompanySize> {
        prop::sample::select(CompanySize::ordered().to_vec())
    }

    fn industry() -> impl Strategy<Value = Industry> {
        prop::sample::select(vec![
            Industry::Technology,
            Industry::ProfessionalServices,
            Industry::Healthcare,
            Industry::Finance,
            Industry::RealEstate,
            Industry::Government,
            Industry::Manufacturing,
            Industry::Retail,
            Industry::Other("Mining".to_string()),
        ])
    }

    fn budget() -> impl Strategy<Value = BudgetRange> {
        prop::sample::select(vec![
            BudgetRange::NotDisclosed,
            BudgetRange::Under25k,
            BudgetRange::From25kTo50k,
            BudgetRange::From50kTo100k,
            BudgetRange::From100kTo250k,
            BudgetRange::Over250k,
        ])
    }

    fn timeline() -> impl Strategy<Value = TimelineUrgency> {
        prop::sample::select(vec![
            TimelineUrgency::Immediate,
            TimelineUrgency::OneMonth,
            TimelineUrgency::ThreeMonths,
            TimelineUrgency::SixMonths,
            TimelineUrgency::TwelveMonths,
        ])
    }

    fn integration_notes() -> impl Strategy<Value = String> {
        prop::sample::select(vec![
            String::new(),
            "export to quickbooks".to_string(),
            "salesforce and hubspot".to_string(),
            "sync netsuite, shopify, stripe, slack, jira and the crm".to_string(),
        ])
    }

    prop_compose! {
        pub(super) fn discovery_record()(
            size in company_size(),
            industry in industry(),
            budget in budget(),
            timeline in timeline(),
            has_decision_maker in any::<bool>(),
            hours in 0u32..80,
            inefficiency in 0i64..300_000,
            team in 0u32..120,
            integrations in integration_notes(),
        ) -> DiscoveryRecord {
            let contact = |name: &str| ContactInfo {
                name: name.to_string(),
                email: None,
                title: None,
            };
            let mut record = DiscoveryRecord::new(
                DiscoveryId("dc-prop".to_string()),
                "Generated Co",
                contact("Sam Doe"),
            );
            record.company_size = Some(size);
            record.industry = Some(industry);
            record.budget_range = Some(budget);
            record.timeline_urgency = Some(timeline);
            if has_decision_maker {
                record.decision_maker = Some(contact("Pat Doe"));
            }
            record.weekly_hours_wasted = hours;
            record.estimated_cost_inefficiency = Money::from_dollars(inefficiency);
            record.team_size_affected = team;
            record.notes.integration_requirements = integrations;
            record
        }
    }
}

use common::*;
use proptest::prelude::*;
use sales_pipeline::workflows::discovery::{
    DiscoveryId, QualificationScore, QualificationStatus, ScoringEngine,
};
use sales_pipeline::workflows::pricing::{BasisPoints, PricingEngine, StaticCatalog};

fn scored(subs: [u8; 4]) -> QualificationScore {
    let [pain, budget_authority, timeline_urgency, technical_fit] = subs;
    QualificationScore {
        discovery_id: DiscoveryId("dc-prop".to_string()),
        pain,
        budget_authority,
        timeline_urgency,
        technical_fit,
        overall: QualificationScore::composite(
            pain,
            budget_authority,
            timeline_urgency,
            technical_fit,
        ),
        status: QualificationStatus::Nurture,
        components: Vec::new(),
    }
}

fn rank(status: QualificationStatus) -> u8 {
    match status {
        QualificationStatus::Disqualified => 0,
        QualificationStatus::Nurture => 1,
        QualificationStatus::Qualified => 2,
    }
}

proptest! {
    #[test]
    fn raising_one_sub_score_never_demotes(
        subs in prop::array::uniform4(0u8..=10),
        index in 0usize..4,
        raise in 1u8..=10,
    ) {
        let engine = ScoringEngine::default();
        let before = engine.decide(&scored(subs));

        let mut raised = subs;
        raised[index] = (raised[index] + raise).min(10);
        let after = engine.decide(&scored(raised));

        prop_assert!(rank(after) >= rank(before));
        if before == QualificationStatus::Qualified {
            prop_assert_eq!(after, QualificationStatus::Qualified);
        }
    }

    #[test]
    fn scores_stay_in_range_and_repeat(record in discovery_record()) {
        let engine = ScoringEngine::default();
        let score = engine.score(&record).expect("generated records are complete");

        for sub in [score.pain, score.budget_authority, score.timeline_urgency, score.technical_fit] {
            prop_assert!(sub <= 10);
        }
        prop_assert!(score.overall <= 100);
        prop_assert_eq!(
            score.overall,
            QualificationScore::composite(
                score.pain,
                score.budget_authority,
                score.timeline_urgency,
                score.technical_fit,
            )
        );
        prop_assert_eq!(engine.score(&record).expect("second pass scores"), score);
    }

    #[test]
    fn status_follows_thresholds(record in discovery_record()) {
        let score = ScoringEngine::default().score(&record).expect("record scores");
        let expected = if score.overall >= 60 && score.budget_authority >= 4 {
            QualificationStatus::Qualified
        } else if score.overall < 30 {
            QualificationStatus::Disqualified
        } else {
            QualificationStatus::Nurture
        };
        prop_assert_eq!(score.status, expected);
    }

    #[test]
    fn more_wasted_hours_never_lower_pain(record in discovery_record(), extra in 0u32..40) {
        let engine = ScoringEngine::default();
        let before = engine.score(&record).expect("record scores");
        let mut worse = record.clone();
        worse.weekly_hours_wasted += extra;
        worse.team_size_affected += extra;
        let after = engine.score(&worse).expect("record scores");
        prop_assert!(after.pain >= before.pain);
    }

    #[test]
    fn quotes_reconcile_and_split_fully(record in discovery_record()) {
        let score = ScoringEngine::default().score(&record).expect("record scores");
        let quote = PricingEngine::default()
            .quote(&record, &score, &StaticCatalog::standard())
            .expect("standard catalog never prices below zero");
        let breakdown = &quote.breakdown;

        prop_assert!(breakdown.reconciles());
        prop_assert_eq!(breakdown.total_project_cost, quote.evaluation.subtotal);
        prop_assert_eq!(breakdown.milestone_amount_total(), breakdown.total_project_cost);
        prop_assert_eq!(breakdown.milestone_fraction_total(), BasisPoints::percent(100));
        prop_assert!(breakdown.milestones.iter().all(|milestone| !milestone.amount.is_negative()));
        prop_assert_eq!(
            quote.selection.lines.first().map(|line| line.category.is_core()),
            Some(true)
        );
    }
}
