use crate::infra::{load_record, sandbox_collaborators};
use clap::Args;
use sales_pipeline::config::AppConfig;
use sales_pipeline::error::AppError;
use sales_pipeline::workflows::discovery::{
    BudgetRange, CompanySize, ContactInfo, DiscoveryId, DiscoveryRecord, Industry,
    QualificationScore, ScoringEngine, TimelineUrgency,
};
use sales_pipeline::workflows::pipeline::{
    Deal, PipelineAnalytics, PipelineOrchestrator, Signal, StepReport,
};
use sales_pipeline::workflows::pricing::{
    Money, PricingEngine, PricingQuote, ServiceRecommender,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct RecordArgs {
    /// Discovery record as JSON
    #[arg(long)]
    pub(crate) input: PathBuf,
    /// Print the result as JSON instead of a summary
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Discovery record as JSON. Defaults to a built-in qualified clinic.
    #[arg(long)]
    pub(crate) record: Option<PathBuf>,
    /// Stop once the SOW is proposed instead of simulating client signals
    #[arg(long)]
    pub(crate) skip_signals: bool,
    /// Print the final deal and analytics as JSON
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Debug, Serialize)]
struct DemoSummary {
    deal: Deal,
    analytics: PipelineAnalytics,
}

pub(crate) fn run_score(args: RecordArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let record = load_record(&args.input)?;
    let score = ScoringEngine::new(config.pipeline.thresholds)
        .score(&record)
        .map_err(|err| AppError::Pipeline(err.into()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&score)?);
    } else {
        render_score(&record, &score);
    }
    Ok(())
}

pub(crate) fn run_quote(args: RecordArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let catalog = config.catalog.build()?;
    let record = load_record(&args.input)?;

    let score = ScoringEngine::new(config.pipeline.thresholds)
        .score(&record)
        .map_err(|err| AppError::Pipeline(err.into()))?;
    let engine = PricingEngine::new(
        ServiceRecommender::new(config.pipeline.recommender.clone()),
        config.pipeline.tiers,
    );
    let quote = engine
        .quote(&record, &score, &catalog)
        .map_err(|err| AppError::Pipeline(err.into()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&quote)?);
    } else {
        render_score(&record, &score);
        render_quote(&quote);
    }
    Ok(())
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let catalog = config.catalog.build()?;
    let record = match &args.record {
        Some(path) => load_record(path)?,
        None => sample_record(),
    };
    let deal_id = record.discovery_id.clone();

    let (collaborators, store) = sandbox_collaborators(Arc::new(catalog));
    store
        .insert_record(record)
        .map_err(|err| AppError::Pipeline(err.into()))?;
    let orchestrator = PipelineOrchestrator::new(collaborators, config.pipeline.clone());

    if !args.json {
        println!("Sales pipeline demo for {deal_id}");
    }
    let report = orchestrator.start_from_store(&deal_id).await?;
    if !args.json {
        render_report("discovery submitted", &report);
    }

    let proposed = orchestrator.deal(&deal_id).await?.sow.is_some();
    if proposed && !args.skip_signals {
        for signal in [
            Signal::SowApproved,
            Signal::ContractExecuted,
            Signal::FirstPaymentReceived,
            Signal::KickoffHeld,
        ] {
            let report = orchestrator.signal(&deal_id, signal).await?;
            if !args.json {
                render_report(&format!("{signal:?}"), &report);
            }
        }
    }

    let deal = orchestrator.deal(&deal_id).await?;
    let analytics = orchestrator.analytics().await;
    if args.json {
        let summary = DemoSummary { deal, analytics };
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("\nFinal state: {}", deal.state);
    if let Some(sow) = &deal.sow {
        println!(
            "- SOW {} for {} ({} milestones)",
            sow.sow_id,
            sow.breakdown.total_project_cost,
            sow.breakdown.milestones.len()
        );
    }
    if let Some(contract) = &deal.contract {
        println!(
            "- Contract {} runs {} to {}",
            contract.contract_id, contract.project_start, contract.project_end
        );
    }
    if let Some(payment) = &deal.payment {
        println!(
            "- Invoice {} for {} due {}",
            payment.first_invoice.invoice_number,
            payment.first_invoice.amount,
            payment.first_invoice.due_date
        );
    }
    if let Some(kickoff) = &deal.kickoff {
        println!(
            "- Project {} kicks off {} ({:?} template)",
            kickoff.project_code, kickoff.kickoff_date, kickoff.template
        );
    }
    println!(
        "- {} automation log entries mirrored to the store",
        store.log_len()
    );
    println!(
        "- Conversion: {:.2}% call to qualified, {:.2}% overall",
        analytics.conversion.call_to_qualified, analytics.conversion.overall
    );

    println!("\nAutomation log");
    for entry in orchestrator.deal_history(&deal_id) {
        println!(
            "  #{} {} {} -> {} [{}] retries {} ({} ms)",
            entry.entry_id,
            entry.process,
            entry.source_record_id,
            entry.target_record_id.as_deref().unwrap_or("-"),
            entry.status.label(),
            entry.retry_count,
            entry.duration_ms
        );
    }

    Ok(())
}

fn render_report(label: &str, report: &StepReport) {
    println!("\n{label} -> {}", report.state);
    for step in &report.steps {
        let detail = step
            .outcome
            .as_ref()
            .map(|outcome| outcome.summary())
            .or_else(|| step.error.clone())
            .unwrap_or_default();
        println!("  - {} [{}] {}", step.process, step.status.label(), detail);
    }
}

fn render_score(record: &DiscoveryRecord, score: &QualificationScore) {
    println!("{}: {}", record.company_name, score.summary());
    for component in &score.components {
        println!(
            "  - {:?}: {} ({})",
            component.factor, component.score, component.notes
        );
    }
}

fn render_quote(quote: &PricingQuote) {
    let breakdown = &quote.breakdown;
    println!("\nRecommended services:");
    for line in &quote.selection.lines {
        println!(
            "  - {} x{} @ {} ({} hours)",
            line.service_name, line.quantity, line.unit_price, line.hours
        );
    }
    println!("Adjustments:");
    for adjustment in &breakdown.adjustments {
        println!(
            "  - {} {}: {} -> {}",
            adjustment.rule_id, adjustment.rule_name, adjustment.amount, adjustment.subtotal_after
        );
    }
    println!(
        "Total {} ({:?} tier, {} hours, ~{} weeks, {} per hour)",
        breakdown.total_project_cost,
        breakdown.tier,
        breakdown.estimated_hours,
        breakdown.timeline_weeks,
        breakdown.effective_hourly_rate
    );
    for milestone in &breakdown.milestones {
        println!(
            "  {}. {} {} = {}",
            milestone.sequence, milestone.name, milestone.fraction, milestone.amount
        );
    }
}

pub(crate) fn sample_record() -> DiscoveryRecord {
    let mut record = DiscoveryRecord::new(
        DiscoveryId("dc-demo-001".to_string()),
        "Northwind Clinics",
        ContactInfo {
            name: "Dana Reyes".to_string(),
            email: Some("dana@northwind.example".to_string()),
            title: Some("Operations Director".to_string()),
        },
    );
    record.company_size = Some(CompanySize::Micro);
    record.industry = Some(Industry::Healthcare);
    record.budget_range = Some(BudgetRange::From50kTo100k);
    record.timeline_urgency = Some(TimelineUrgency::Immediate);
    record.weekly_hours_wasted = 15;
    record.estimated_cost_inefficiency = Money::from_dollars(8_000);
    record.team_size_affected = 12;
    record.notes.manual_processes = "Patient intake re-keyed into two systems".to_string();
    record.sales_rep = "Jordan Blake".to_string();
    record
}
