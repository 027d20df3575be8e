use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::audit::{AutomationLogEntry, EntryStatus};
use super::collaborators::ReceiptStatus;
use super::orchestrator::Deal;
use super::state::ProcessType;
use crate::workflows::discovery::{DiscoveryId, QualificationStatus};
use crate::workflows::pricing::Money;

/// Funnel snapshot computed from deal state and the automation log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineAnalytics {
    pub discovery: DiscoveryMetrics,
    pub proposals: ProposalMetrics,
    pub contracts: ContractMetrics,
    pub projects_kicked_off: usize,
    pub projects_closed: usize,
    pub conversion: ConversionRates,
    pub deals_by_state: BTreeMap<String, usize>,
    pub automation: Vec<ProcessEfficiency>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveryMetrics {
    pub total_calls: usize,
    pub scored: usize,
    pub qualified: usize,
    pub nurture: usize,
    pub disqualified: usize,
    pub average_score: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProposalMetrics {
    pub sows_generated: usize,
    pub sows_approved: usize,
    pub pipeline_value: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractMetrics {
    pub contracts_requested: usize,
    pub contracts_executed: usize,
    pub closed_value: Money,
}

/// Percentages rounded to two decimals; zero when the denominator is empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionRates {
    pub call_to_qualified: f64,
    pub qualified_to_approved_sow: f64,
    pub approved_sow_to_contract: f64,
    pub overall: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessEfficiency {
    pub process: ProcessType,
    pub total: usize,
    pub successful: usize,
    pub success_rate: f64,
    pub average_duration_ms: u64,
}

impl PipelineAnalytics {
    pub fn compute(deals: &[Deal], entries: &[AutomationLogEntry]) -> Self {
        let scores: Vec<_> = deals.iter().filter_map(|deal| deal.score.as_ref()).collect();
        let count_status = |status: QualificationStatus| {
            scores.iter().filter(|score| score.status == status).count()
        };
        let average_score = if scores.is_empty() {
            0.0
        } else {
            let sum: u32 = scores.iter().map(|score| u32::from(score.overall)).sum();
            round2(f64::from(sum) / scores.len() as f64)
        };
        let discovery = DiscoveryMetrics {
            total_calls: deals.len(),
            scored: scores.len(),
            qualified: count_status(QualificationStatus::Qualified),
            nurture: count_status(QualificationStatus::Nurture),
            disqualified: count_status(QualificationStatus::Disqualified),
            average_score,
        };

        let approved = completed_deals(entries, ProcessType::SowApproval);
        let proposals = ProposalMetrics {
            sows_generated: deals.iter().filter(|deal| deal.sow.is_some()).count(),
            sows_approved: approved.len(),
            pipeline_value: deals
                .iter()
                .filter_map(|deal| deal.sow.as_ref())
                .map(|sow| sow.breakdown.total_project_cost)
                .sum(),
        };

        let executed: Vec<_> = deals
            .iter()
            .filter_map(|deal| deal.contract.as_ref())
            .filter(|contract| contract.signature_status == ReceiptStatus::Completed)
            .collect();
        let contracts = ContractMetrics {
            contracts_requested: deals.iter().filter(|deal| deal.contract.is_some()).count(),
            contracts_executed: executed.len(),
            closed_value: executed.iter().map(|contract| contract.total_value).sum(),
        };

        let conversion = ConversionRates {
            call_to_qualified: percent(discovery.qualified, discovery.total_calls),
            qualified_to_approved_sow: percent(proposals.sows_approved, discovery.qualified),
            approved_sow_to_contract: percent(contracts.contracts_executed, proposals.sows_approved),
            overall: percent(contracts.contracts_executed, discovery.total_calls),
        };

        let mut deals_by_state = BTreeMap::new();
        for deal in deals {
            *deals_by_state.entry(deal.state.to_string()).or_insert(0) += 1;
        }

        Self {
            discovery,
            proposals,
            contracts,
            projects_kicked_off: deals.iter().filter(|deal| deal.kickoff.is_some()).count(),
            projects_closed: deals.iter().filter(|deal| deal.state.is_closed()).count(),
            conversion,
            deals_by_state,
            automation: efficiency(entries),
        }
    }
}

fn completed_deals(entries: &[AutomationLogEntry], process: ProcessType) -> BTreeSet<&DiscoveryId> {
    entries
        .iter()
        .filter(|entry| entry.process == process && entry.status == EntryStatus::Completed)
        .map(|entry| &entry.deal_id)
        .collect()
}

/// Attempts that actually executed. Duplicates, rejections and resumes are bookkeeping.
fn efficiency(entries: &[AutomationLogEntry]) -> Vec<ProcessEfficiency> {
    ProcessType::all()
        .into_iter()
        .filter_map(|process| {
            let attempts: Vec<_> = entries
                .iter()
                .filter(|entry| entry.process == process)
                .filter(|entry| {
                    matches!(
                        entry.status,
                        EntryStatus::Completed
                            | EntryStatus::Failed
                            | EntryStatus::ManualInterventionRequired
                    )
                })
                .collect();
            if attempts.is_empty() {
                return None;
            }
            let successful = attempts
                .iter()
                .filter(|entry| entry.status == EntryStatus::Completed)
                .count();
            let total_ms: u64 = attempts.iter().map(|entry| entry.duration_ms).sum();
            Some(ProcessEfficiency {
                process,
                total: attempts.len(),
                successful,
                success_rate: percent(successful, attempts.len()),
                average_duration_ms: total_ms / attempts.len() as u64,
            })
        })
        .collect()
}

fn percent(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    round2(numerator as f64 * 100.0 / denominator as f64)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::pipeline::audit::{AuditLog, NewLogEntry};
    use crate::workflows::pipeline::state::TriggerKind;
    use chrono::Utc;

    fn attempt(process: ProcessType, status: EntryStatus, duration_ms: u64) -> NewLogEntry {
        NewLogEntry {
            deal_id: DiscoveryId("dc-1".to_string()),
            process,
            source_record_id: format!("src-{duration_ms}"),
            target_record_id: None,
            trigger: TriggerKind::Internal,
            action: process.to_string(),
            status,
            retry_count: 0,
            started_at: Utc::now(),
            duration_ms,
            error: None,
            outcome: None,
        }
    }

    #[test]
    fn percentages_round_to_two_decimals() {
        assert_eq!(percent(1, 3), 33.33);
        assert_eq!(percent(2, 3), 66.67);
        assert_eq!(percent(5, 0), 0.0);
    }

    #[test]
    fn efficiency_ignores_bookkeeping_entries() {
        let mut log = AuditLog::new();
        log.append(attempt(ProcessType::SowToContract, EntryStatus::Completed, 100));
        log.append(attempt(ProcessType::SowToContract, EntryStatus::ManualInterventionRequired, 300));
        log.append(attempt(ProcessType::SowToContract, EntryStatus::Duplicate, 0));
        log.append(attempt(ProcessType::SowToContract, EntryStatus::Rejected, 0));

        let rows = efficiency(log.entries());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].process, ProcessType::SowToContract);
        assert_eq!(rows[0].total, 2);
        assert_eq!(rows[0].successful, 1);
        assert_eq!(rows[0].success_rate, 50.0);
        assert_eq!(rows[0].average_duration_ms, 200);
    }

    #[test]
    fn empty_pipeline_reports_zeroes() {
        let analytics = PipelineAnalytics::compute(&[], &[]);
        assert_eq!(analytics.discovery.total_calls, 0);
        assert_eq!(analytics.discovery.average_score, 0.0);
        assert_eq!(analytics.proposals.pipeline_value, Money::ZERO);
        assert_eq!(analytics.conversion.overall, 0.0);
        assert!(analytics.automation.is_empty());
    }
}
