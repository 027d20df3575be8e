use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex as DealLock;
use tracing::{error, info, warn};

use super::analytics::PipelineAnalytics;
use super::audit::{AuditLog, AuditQuery, AutomationLogEntry, EntryStatus, NewLogEntry};
use super::collaborators::{
    CollaboratorError, PipelineCollaborators, ReceiptStatus, StorageError,
};
use super::config::PipelineConfig;
use super::proposal::{
    contract_dates, contract_merge_fields, kickoff_date, payment_setup_request, project_code,
    project_title, sow_expiry, sow_merge_fields, ContractId, ContractRecord, KickoffRecord,
    KickoffRequest, KickoffTemplate, PaymentRecord, SignatureRequest, SowId, SowProposal,
    TransitionOutcome, CONTRACT_TEMPLATE_ID, SOW_TEMPLATE_ID,
};
use super::state::{PipelineState, ProcessType, Signal, StageStatus, TriggerKind};
use crate::workflows::discovery::{
    DiscoveryId, DiscoveryRecord, QualificationScore, QualificationStatus, ScoringEngine,
    ValidationError,
};
use crate::workflows::pricing::{PricingEngine, PricingError, PricingQuote, ServiceRecommender};

/// One deal's progress through the pipeline together with the records it produced.
#[derive(Debug, Clone, Serialize)]
pub struct Deal {
    pub deal_id: DiscoveryId,
    pub record: DiscoveryRecord,
    pub state: PipelineState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<QualificationScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sow: Option<SowProposal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract: Option<ContractRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kickoff: Option<KickoffRecord>,
    #[serde(skip)]
    resume_to: Option<PipelineState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub halted_process: Option<ProcessType>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Deal {
    fn new(record: DiscoveryRecord) -> Self {
        let now = Utc::now();
        Self {
            deal_id: record.discovery_id.clone(),
            record,
            state: PipelineState::discovery_completed(),
            score: None,
            sow: None,
            contract: None,
            payment: None,
            kickoff: None,
            resume_to: None,
            halted_process: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Idempotency source for `process`; `None` until the prior stage produced it.
    pub fn source_record_id(&self, process: ProcessType) -> Option<String> {
        match process {
            ProcessType::DiscoveryToSow => Some(self.deal_id.to_string()),
            ProcessType::SowApproval | ProcessType::SowToContract => {
                self.sow.as_ref().map(|sow| sow.sow_id.to_string())
            }
            ProcessType::ContractExecution | ProcessType::ContractToPayment => self
                .contract
                .as_ref()
                .map(|contract| contract.contract_id.to_string()),
            ProcessType::FirstPayment | ProcessType::PaymentToKickoff => {
                self.payment
                    .as_ref()
                    .map(|payment| payment.first_invoice.invoice_number.clone())
            }
            ProcessType::KickoffCompletion => self
                .kickoff
                .as_ref()
                .map(|kickoff| kickoff.project_code.clone()),
        }
    }

    fn apply(&mut self, outcome: &TransitionOutcome) {
        match outcome {
            TransitionOutcome::SowProposed(sow) => self.sow = Some(sow.clone()),
            TransitionOutcome::ContractRequested(contract) => {
                self.contract = Some(contract.clone())
            }
            TransitionOutcome::ContractExecuted { .. } => {
                if let Some(contract) = self.contract.as_mut() {
                    contract.signature_status = ReceiptStatus::Completed;
                }
            }
            TransitionOutcome::PaymentConfigured(payment) => self.payment = Some(payment.clone()),
            TransitionOutcome::PaymentReceived { .. } => {
                if let Some(payment) = self.payment.as_mut() {
                    payment.status = ReceiptStatus::Completed;
                }
            }
            TransitionOutcome::KickoffScheduled(kickoff) => self.kickoff = Some(kickoff.clone()),
            TransitionOutcome::NotQualified { .. }
            | TransitionOutcome::SowApproved { .. }
            | TransitionOutcome::KickoffCompleted { .. } => {}
        }
    }
}

/// A deal waiting on an operator.
#[derive(Debug, Clone, Serialize)]
pub struct Intervention {
    pub deal_id: DiscoveryId,
    pub company_name: String,
    pub state: PipelineState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process: Option<ProcessType>,
    pub reason: String,
    pub since: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub process: ProcessType,
    pub status: EntryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<TransitionOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The requested step followed by any internal steps chained after it.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub deal_id: DiscoveryId,
    pub steps: Vec<StepRecord>,
    pub state: PipelineState,
}

impl StepReport {
    pub fn first(&self) -> Option<&StepRecord> {
        self.steps.first()
    }
}

/// Error surfaced by the orchestrator. Every variant has already been logged and, for
/// transition attempts, written to the audit log.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Pricing(#[from] PricingError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
    #[error("deal {deal_id}: {process} is not allowed from {state}")]
    StateConflict {
        deal_id: DiscoveryId,
        process: ProcessType,
        state: PipelineState,
    },
    #[error("deal {deal_id} has no internal step to run from {state}")]
    NothingToAdvance {
        deal_id: DiscoveryId,
        state: PipelineState,
    },
    #[error("deal {deal_id} is not halted ({state})")]
    NotHalted {
        deal_id: DiscoveryId,
        state: PipelineState,
    },
    #[error("deal {0} not found")]
    UnknownDeal(DiscoveryId),
    #[error("deal {deal_id} has no {record} on file")]
    MissingRecord {
        deal_id: DiscoveryId,
        record: &'static str,
    },
    #[error("{service} still failing after {retries} retries: {last_error}")]
    RetriesExhausted {
        service: String,
        retries: u32,
        last_error: String,
    },
    #[error("deal {deal_id} requires manual intervention: {reason}")]
    ManualInterventionRequired { deal_id: DiscoveryId, reason: String },
}

impl PipelineError {
    /// Only store outages, collaborator timeouts and 5xx-equivalents are retried.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Storage(StorageError::Unavailable(_)) => true,
            Self::Collaborator(error) => error.is_transient(),
            _ => false,
        }
    }
}

/// Stage-transition engine. Deals progress independently; each deal runs one transition
/// at a time under its own lock.
pub struct PipelineOrchestrator {
    collaborators: PipelineCollaborators,
    scoring: ScoringEngine,
    pricing: PricingEngine,
    config: PipelineConfig,
    deals: Mutex<HashMap<DiscoveryId, Arc<DealLock<Deal>>>>,
    audit: Mutex<AuditLog>,
    sow_sequence: AtomicU64,
    contract_sequence: AtomicU64,
    invoice_sequence: AtomicU64,
    kickoff_sequence: AtomicU64,
}

impl PipelineOrchestrator {
    pub fn new(collaborators: PipelineCollaborators, config: PipelineConfig) -> Self {
        let scoring = ScoringEngine::new(config.thresholds);
        let pricing = PricingEngine::new(
            ServiceRecommender::new(config.recommender.clone()),
            config.tiers,
        );

        Self {
            collaborators,
            scoring,
            pricing,
            config,
            deals: Mutex::new(HashMap::new()),
            audit: Mutex::new(AuditLog::new()),
            sow_sequence: AtomicU64::new(1),
            contract_sequence: AtomicU64::new(1),
            invoice_sequence: AtomicU64::new(1),
            kickoff_sequence: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Pure scoring, no state touched.
    pub fn score(&self, record: &DiscoveryRecord) -> Result<QualificationScore, ValidationError> {
        self.scoring.score(record)
    }

    /// Pure recommendation and pricing, regardless of qualification outcome.
    pub fn quote(
        &self,
        record: &DiscoveryRecord,
    ) -> Result<(QualificationScore, PricingQuote), PipelineError> {
        let score = self.scoring.score(record)?;
        let quote = self
            .pricing
            .quote(record, &score, self.collaborators.catalog.as_ref())?;
        Ok((score, quote))
    }

    /// Registers the deal (once) and, when SOW generation is automatic, runs the
    /// discovery-to-SOW transition. Resubmitting a known deal replays the cached result.
    pub async fn submit_discovery(
        &self,
        record: DiscoveryRecord,
    ) -> Result<StepReport, PipelineError> {
        if record.discovery_id.0.trim().is_empty() {
            return Err(ValidationError::MissingField("discovery_id").into());
        }
        let deal_id = record.discovery_id.clone();
        let handle = {
            let mut deals = self.deals.lock().unwrap_or_else(PoisonError::into_inner);
            deals
                .entry(deal_id.clone())
                .or_insert_with(|| {
                    info!(deal_id = %record.discovery_id, "deal registered");
                    Arc::new(DealLock::new(Deal::new(record)))
                })
                .clone()
        };

        let mut deal = handle.lock().await;
        if !self.config.auto_advance.allows(ProcessType::DiscoveryToSow) {
            return Ok(StepReport {
                deal_id,
                steps: Vec::new(),
                state: deal.state.clone(),
            });
        }
        self.drive(&mut deal, ProcessType::DiscoveryToSow, TriggerKind::Internal)
            .await
    }

    /// Loads a discovery record through the store and submits it.
    pub async fn start_from_store(&self, id: &DiscoveryId) -> Result<StepReport, PipelineError> {
        let store = &self.collaborators.store;
        let mut retries = 0;
        let record = self
            .config
            .retry
            .run("store", &mut retries, || async {
                store.load_discovery_record(id).map_err(PipelineError::from)
            })
            .await?;
        self.submit_discovery(record).await
    }

    /// Runs the internal transition that follows the deal's current state.
    pub async fn advance(&self, deal_id: &DiscoveryId) -> Result<StepReport, PipelineError> {
        let handle = self.handle(deal_id)?;
        let mut deal = handle.lock().await;
        let Some(process) = deal.state.next_internal() else {
            warn!(deal_id = %deal_id, state = %deal.state, "advance requested with no internal step");
            return Err(PipelineError::NothingToAdvance {
                deal_id: deal_id.clone(),
                state: deal.state.clone(),
            });
        };
        self.drive(&mut deal, process, TriggerKind::Internal).await
    }

    /// Applies an external signal such as a signature or payment webhook.
    pub async fn signal(
        &self,
        deal_id: &DiscoveryId,
        signal: Signal,
    ) -> Result<StepReport, PipelineError> {
        let handle = self.handle(deal_id)?;
        let mut deal = handle.lock().await;
        self.drive(&mut deal, signal.process(), TriggerKind::External)
            .await
    }

    /// Restores the last stable state of a halted deal.
    pub async fn resume(&self, deal_id: &DiscoveryId, operator: &str) -> Result<Deal, PipelineError> {
        let handle = self.handle(deal_id)?;
        let mut deal = handle.lock().await;
        if !deal.state.status.is_halted() {
            return Err(PipelineError::NotHalted {
                deal_id: deal_id.clone(),
                state: deal.state.clone(),
            });
        }
        let restored = deal.resume_to.take().ok_or_else(|| PipelineError::MissingRecord {
            deal_id: deal_id.clone(),
            record: "stable state",
        })?;
        let process = deal
            .halted_process
            .take()
            .or_else(|| restored.next_internal())
            .unwrap_or(ProcessType::DiscoveryToSow);
        let reason = deal.state.status.reason().unwrap_or_default().to_string();

        let started_at = Utc::now();
        deal.state = restored;
        deal.updated_at = started_at;
        info!(deal_id = %deal_id, operator, state = %deal.state, "deal resumed by operator");
        self.record(NewLogEntry {
            deal_id: deal_id.clone(),
            process,
            source_record_id: deal
                .source_record_id(process)
                .unwrap_or_else(|| deal_id.to_string()),
            target_record_id: None,
            trigger: TriggerKind::Operator,
            action: format!("resumed by {operator} after: {reason}"),
            status: EntryStatus::Resumed,
            retry_count: 0,
            started_at,
            duration_ms: 0,
            error: None,
            outcome: None,
        });

        Ok(deal.clone())
    }

    pub async fn deal(&self, deal_id: &DiscoveryId) -> Result<Deal, PipelineError> {
        let handle = self.handle(deal_id)?;
        let deal = handle.lock().await;
        Ok(deal.clone())
    }

    pub async fn deals(&self) -> Vec<Deal> {
        let handles: Vec<Arc<DealLock<Deal>>> = {
            let deals = self.deals.lock().unwrap_or_else(PoisonError::into_inner);
            deals.values().cloned().collect()
        };
        let mut snapshot = Vec::with_capacity(handles.len());
        for handle in handles {
            snapshot.push(handle.lock().await.clone());
        }
        snapshot.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.deal_id.cmp(&b.deal_id)));
        snapshot
    }

    /// Deals halted in `failed` or `manual_intervention`, with the reason to act on.
    pub async fn interventions(&self) -> Vec<Intervention> {
        self.deals()
            .await
            .into_iter()
            .filter_map(|deal| {
                let reason = deal.state.status.reason()?.to_string();
                Some(Intervention {
                    deal_id: deal.deal_id.clone(),
                    company_name: deal.record.company_name.clone(),
                    state: deal.state.clone(),
                    process: deal.halted_process,
                    reason,
                    since: deal.updated_at,
                })
            })
            .collect()
    }

    pub fn automation_log(&self, query: &AuditQuery) -> Vec<AutomationLogEntry> {
        self.audit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .query(query)
    }

    pub fn deal_history(&self, deal_id: &DiscoveryId) -> Vec<AutomationLogEntry> {
        self.audit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .for_deal(deal_id)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn analytics(&self) -> PipelineAnalytics {
        let deals = self.deals().await;
        let audit = self.audit.lock().unwrap_or_else(PoisonError::into_inner);
        PipelineAnalytics::compute(&deals, audit.entries())
    }

    fn handle(&self, deal_id: &DiscoveryId) -> Result<Arc<DealLock<Deal>>, PipelineError> {
        self.deals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(deal_id)
            .cloned()
            .ok_or_else(|| PipelineError::UnknownDeal(deal_id.clone()))
    }

    async fn drive(
        &self,
        deal: &mut Deal,
        process: ProcessType,
        trigger: TriggerKind,
    ) -> Result<StepReport, PipelineError> {
        let first = self.run_process(deal, process, trigger).await?;
        let mut last = (process, first.status);
        let mut steps = vec![first];

        while last.1 == EntryStatus::Completed {
            let Some(next) = deal.state.next_internal() else {
                break;
            };
            if next == last.0 || !self.config.auto_advance.allows(next) {
                break;
            }
            match self.run_process(deal, next, TriggerKind::Internal).await {
                Ok(step) => {
                    last = (next, step.status);
                    steps.push(step);
                }
                Err(error) => {
                    steps.push(StepRecord {
                        process: next,
                        status: if deal.state.status.is_halted() {
                            halted_entry_status(&deal.state.status)
                        } else {
                            EntryStatus::Rejected
                        },
                        outcome: None,
                        error: Some(error.to_string()),
                    });
                    break;
                }
            }
        }

        Ok(StepReport {
            deal_id: deal.deal_id.clone(),
            steps,
            state: deal.state.clone(),
        })
    }

    /// One transition attempt: idempotency check, state check, execution, then exactly
    /// one audit entry.
    async fn run_process(
        &self,
        deal: &mut Deal,
        process: ProcessType,
        trigger: TriggerKind,
    ) -> Result<StepRecord, PipelineError> {
        let started_at = Utc::now();
        let clock = tokio::time::Instant::now();
        let source = deal.source_record_id(process);

        if let Some(source_id) = &source {
            let cached = self
                .audit
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .completed(&deal.deal_id, process, source_id)
                .map(|entry| (entry.outcome.clone(), entry.target_record_id.clone()));
            if let Some((outcome, target_record_id)) = cached {
                info!(deal_id = %deal.deal_id, process = %process, source = %source_id, "duplicate trigger ignored");
                self.record(NewLogEntry {
                    deal_id: deal.deal_id.clone(),
                    process,
                    source_record_id: source_id.clone(),
                    target_record_id,
                    trigger,
                    action: format!("{} (duplicate)", action_name(process)),
                    status: EntryStatus::Duplicate,
                    retry_count: 0,
                    started_at,
                    duration_ms: elapsed_ms(clock),
                    error: None,
                    outcome: outcome.clone(),
                });
                return Ok(StepRecord {
                    process,
                    status: EntryStatus::Duplicate,
                    outcome,
                    error: None,
                });
            }
        }

        let source_id = source.unwrap_or_else(|| deal.deal_id.to_string());
        let Some(target) = deal.state.transition(process) else {
            let conflict = PipelineError::StateConflict {
                deal_id: deal.deal_id.clone(),
                process,
                state: deal.state.clone(),
            };
            warn!(deal_id = %deal.deal_id, process = %process, state = %deal.state, "transition rejected");
            self.record(NewLogEntry {
                deal_id: deal.deal_id.clone(),
                process,
                source_record_id: source_id,
                target_record_id: None,
                trigger,
                action: action_name(process).to_string(),
                status: EntryStatus::Rejected,
                retry_count: 0,
                started_at,
                duration_ms: elapsed_ms(clock),
                error: Some(conflict.to_string()),
                outcome: None,
            });
            return Err(conflict);
        };

        let mut retries = 0;
        let result = self.execute(deal, process, &mut retries).await;
        let duration_ms = elapsed_ms(clock);
        deal.updated_at = Utc::now();

        match result {
            Ok(outcome) => {
                deal.apply(&outcome);
                if !matches!(outcome, TransitionOutcome::NotQualified { .. }) {
                    deal.state = target;
                }
                info!(
                    deal_id = %deal.deal_id,
                    process = %process,
                    retry = retries,
                    state = %deal.state,
                    "{}",
                    outcome.summary()
                );
                self.record(NewLogEntry {
                    deal_id: deal.deal_id.clone(),
                    process,
                    source_record_id: source_id,
                    target_record_id: Some(outcome.target_record_id()),
                    trigger,
                    action: action_name(process).to_string(),
                    status: EntryStatus::Completed,
                    retry_count: retries,
                    started_at,
                    duration_ms,
                    error: None,
                    outcome: Some(outcome.clone()),
                });
                Ok(StepRecord {
                    process,
                    status: EntryStatus::Completed,
                    outcome: Some(outcome),
                    error: None,
                })
            }
            Err(failure) => {
                let escalate = !matches!(failure, PipelineError::Validation(_));
                let reason = format!("{} failed: {failure}", action_name(process));
                deal.resume_to = Some(deal.state.clone());
                deal.halted_process = Some(process);
                deal.state = deal.state.halted(reason.clone(), escalate);
                let status = halted_entry_status(&deal.state.status);
                error!(
                    deal_id = %deal.deal_id,
                    process = %process,
                    retry = retries,
                    state = %deal.state,
                    error = %failure,
                    "transition halted"
                );
                self.record(NewLogEntry {
                    deal_id: deal.deal_id.clone(),
                    process,
                    source_record_id: source_id,
                    target_record_id: None,
                    trigger,
                    action: action_name(process).to_string(),
                    status,
                    retry_count: retries,
                    started_at,
                    duration_ms,
                    error: Some(reason.clone()),
                    outcome: None,
                });

                Err(match failure {
                    PipelineError::Validation(_)
                    | PipelineError::Pricing(_)
                    | PipelineError::RetriesExhausted { .. } => failure,
                    _ => PipelineError::ManualInterventionRequired {
                        deal_id: deal.deal_id.clone(),
                        reason,
                    },
                })
            }
        }
    }

    async fn execute(
        &self,
        deal: &mut Deal,
        process: ProcessType,
        retries: &mut u32,
    ) -> Result<TransitionOutcome, PipelineError> {
        match process {
            ProcessType::DiscoveryToSow => self.generate_sow(deal, retries).await,
            ProcessType::SowApproval => {
                let sow = required(deal, deal.sow.as_ref(), "SOW")?;
                Ok(TransitionOutcome::SowApproved {
                    sow_id: sow.sow_id.clone(),
                })
            }
            ProcessType::SowToContract => self.generate_contract(deal, retries).await,
            ProcessType::ContractExecution => {
                let contract = required(deal, deal.contract.as_ref(), "contract")?;
                Ok(TransitionOutcome::ContractExecuted {
                    contract_id: contract.contract_id.clone(),
                })
            }
            ProcessType::ContractToPayment => self.setup_payment(deal, retries).await,
            ProcessType::FirstPayment => {
                let payment = required(deal, deal.payment.as_ref(), "payment configuration")?;
                Ok(TransitionOutcome::PaymentReceived {
                    payment_id: payment.payment_id.clone(),
                })
            }
            ProcessType::PaymentToKickoff => self.schedule_kickoff(deal, retries).await,
            ProcessType::KickoffCompletion => {
                let kickoff = required(deal, deal.kickoff.as_ref(), "kickoff")?;
                Ok(TransitionOutcome::KickoffCompleted {
                    project_code: kickoff.project_code.clone(),
                })
            }
        }
    }

    async fn generate_sow(
        &self,
        deal: &mut Deal,
        retries: &mut u32,
    ) -> Result<TransitionOutcome, PipelineError> {
        let retry = &self.config.retry;
        let store = &self.collaborators.store;

        let score = self.scoring.score(&deal.record)?;
        retry
            .run("store", retries, || async {
                store
                    .save_qualification_score(&score)
                    .map_err(PipelineError::from)
            })
            .await?;
        if deal.record.qualified_status().is_none() {
            deal.record.record_qualification(score.status)?;
        }
        deal.score = Some(score.clone());

        if score.status != QualificationStatus::Qualified {
            return Ok(TransitionOutcome::NotQualified { score });
        }

        let quote = self
            .pricing
            .quote(&deal.record, &score, self.collaborators.catalog.as_ref())?;
        let sow_id = SowId::from_sequence(self.sow_sequence.fetch_add(1, Ordering::Relaxed));
        let created_at = Utc::now();
        let expires_at = sow_expiry(created_at);
        let fields = sow_merge_fields(&sow_id, &deal.record, &score, &quote, expires_at);

        let renderer = &self.collaborators.renderer;
        let document = retry
            .run("content renderer", retries, || async {
                renderer
                    .render(SOW_TEMPLATE_ID, &fields)
                    .await
                    .map_err(PipelineError::from)
            })
            .await?;

        let sow = SowProposal {
            sow_id,
            deal_id: deal.deal_id.clone(),
            project_title: project_title(&deal.record),
            company_name: deal.record.company_name.clone(),
            overall_score: score.overall,
            selection: quote.selection,
            breakdown: quote.breakdown,
            document,
            created_at,
            expires_at,
        };
        retry
            .run("store", retries, || async {
                store.save_sow(&sow).map_err(PipelineError::from)
            })
            .await?;

        Ok(TransitionOutcome::SowProposed(sow))
    }

    async fn generate_contract(
        &self,
        deal: &Deal,
        retries: &mut u32,
    ) -> Result<TransitionOutcome, PipelineError> {
        let retry = &self.config.retry;
        let sow = required(deal, deal.sow.as_ref(), "SOW")?;
        let now = Utc::now();
        let contract_id = ContractId::from_sequence(
            now,
            self.contract_sequence.fetch_add(1, Ordering::Relaxed),
        );
        let signatory = deal
            .record
            .decision_maker
            .clone()
            .filter(|contact| !contact.name.trim().is_empty())
            .unwrap_or_else(|| deal.record.primary_contact.clone());
        let dates = contract_dates(now, sow.breakdown.timeline_weeks);
        let fields = contract_merge_fields(&contract_id, sow, &signatory, dates);

        let renderer = &self.collaborators.renderer;
        let document = retry
            .run("content renderer", retries, || async {
                renderer
                    .render(CONTRACT_TEMPLATE_ID, &fields)
                    .await
                    .map_err(PipelineError::from)
            })
            .await?;

        let request = SignatureRequest {
            contract_id: contract_id.clone(),
            document: document.clone(),
            signatory,
            total_value: sow.breakdown.total_project_cost,
        };
        let signatures = &self.collaborators.signatures;
        let receipt = retry
            .run("signature provider", retries, || async {
                signatures
                    .request_signature(&request)
                    .await
                    .map_err(PipelineError::from)
            })
            .await?;
        if receipt.status == ReceiptStatus::Failed {
            return Err(CollaboratorError::rejected(
                "signature provider",
                format!("signature request {} failed", receipt.external_id),
            )
            .into());
        }

        let (project_start, project_end, effective_date, expires_on) = dates;
        Ok(TransitionOutcome::ContractRequested(ContractRecord {
            contract_id,
            sow_id: sow.sow_id.clone(),
            total_value: sow.breakdown.total_project_cost,
            document,
            signature_request_id: receipt.external_id,
            signature_status: receipt.status,
            project_start,
            project_end,
            effective_date,
            expires_on,
        }))
    }

    async fn setup_payment(
        &self,
        deal: &Deal,
        retries: &mut u32,
    ) -> Result<TransitionOutcome, PipelineError> {
        let sow = required(deal, deal.sow.as_ref(), "SOW")?;
        let contract = required(deal, deal.contract.as_ref(), "contract")?;
        let sequence = self.invoice_sequence.fetch_add(1, Ordering::Relaxed);
        let request = payment_setup_request(contract, sow, Utc::now(), sequence).ok_or_else(
            || PipelineError::MissingRecord {
                deal_id: deal.deal_id.clone(),
                record: "milestone schedule",
            },
        )?;

        let payments = &self.collaborators.payments;
        let receipt = self
            .config
            .retry
            .run("payment provider", retries, || async {
                payments
                    .configure_payments(&request)
                    .await
                    .map_err(PipelineError::from)
            })
            .await?;
        if receipt.status == ReceiptStatus::Failed {
            return Err(CollaboratorError::rejected(
                "payment provider",
                format!("payment configuration {} failed", receipt.external_id),
            )
            .into());
        }

        Ok(TransitionOutcome::PaymentConfigured(PaymentRecord {
            payment_id: receipt.external_id,
            contract_id: request.contract_id,
            first_invoice: request.first_invoice,
            status: receipt.status,
        }))
    }

    async fn schedule_kickoff(
        &self,
        deal: &Deal,
        retries: &mut u32,
    ) -> Result<TransitionOutcome, PipelineError> {
        let sow = required(deal, deal.sow.as_ref(), "SOW")?;
        let contract = required(deal, deal.contract.as_ref(), "contract")?;
        let now = Utc::now();
        let request = KickoffRequest {
            project_code: project_code(now, self.kickoff_sequence.fetch_add(1, Ordering::Relaxed)),
            project_name: sow.project_title.clone(),
            template: KickoffTemplate::select(&sow.selection.categories()),
            kickoff_date: kickoff_date(now),
            contract_id: contract.contract_id.clone(),
            services: sow.selection.categories(),
        };

        let provisioner = &self.collaborators.kickoff;
        let receipt = self
            .config
            .retry
            .run("kickoff provisioner", retries, || async {
                provisioner
                    .provision(&request)
                    .await
                    .map_err(PipelineError::from)
            })
            .await?;
        if receipt.status == ReceiptStatus::Failed {
            return Err(CollaboratorError::rejected(
                "kickoff provisioner",
                format!("provisioning {} failed", receipt.external_id),
            )
            .into());
        }

        Ok(TransitionOutcome::KickoffScheduled(KickoffRecord {
            project_code: request.project_code,
            template: request.template,
            kickoff_date: request.kickoff_date,
            provisioning_id: receipt.external_id,
        }))
    }

    /// Appends to the in-memory log, then mirrors the entry to the store. A store failure
    /// is logged; the in-memory log stays authoritative for idempotency.
    fn record(&self, entry: NewLogEntry) {
        let appended = self
            .audit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .append(entry)
            .clone();
        if let Err(failure) = self
            .collaborators
            .store
            .append_automation_log_entry(&appended)
        {
            error!(
                deal_id = %appended.deal_id,
                entry_id = appended.entry_id,
                error = %failure,
                "failed to persist automation log entry"
            );
        }
    }
}

fn required<'a, T>(
    deal: &Deal,
    value: Option<&'a T>,
    record: &'static str,
) -> Result<&'a T, PipelineError> {
    value.ok_or_else(|| PipelineError::MissingRecord {
        deal_id: deal.deal_id.clone(),
        record,
    })
}

fn halted_entry_status(status: &StageStatus) -> EntryStatus {
    match status {
        StageStatus::Failed { .. } => EntryStatus::Failed,
        _ => EntryStatus::ManualInterventionRequired,
    }
}

fn elapsed_ms(clock: tokio::time::Instant) -> u64 {
    clock.elapsed().as_millis() as u64
}

pub fn action_name(process: ProcessType) -> &'static str {
    match process {
        ProcessType::DiscoveryToSow => "generate_sow",
        ProcessType::SowApproval => "approve_sow",
        ProcessType::SowToContract => "generate_contract",
        ProcessType::ContractExecution => "execute_contract",
        ProcessType::ContractToPayment => "setup_payment",
        ProcessType::FirstPayment => "record_first_payment",
        ProcessType::PaymentToKickoff => "trigger_kickoff",
        ProcessType::KickoffCompletion => "complete_kickoff",
    }
}
