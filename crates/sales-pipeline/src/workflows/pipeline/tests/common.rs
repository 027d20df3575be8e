use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use serde_json::Value;

use crate::workflows::discovery::{
    BudgetRange, CompanySize, ContactInfo, DiscoveryId, DiscoveryRecord, Industry,
    QualificationScore, TimelineUrgency,
};
use crate::workflows::pipeline::audit::AutomationLogEntry;
use crate::workflows::pipeline::collaborators::{
    CollaboratorError, ContentRenderer, DocumentRef, KickoffProvisioner, PaymentProvider,
    PipelineCollaborators, PipelineStore, ProviderReceipt, ReceiptStatus, SignatureProvider,
    StorageError,
};
use crate::workflows::pipeline::config::PipelineConfig;
use crate::workflows::pipeline::orchestrator::PipelineOrchestrator;
use crate::workflows::pipeline::proposal::{
    KickoffRequest, PaymentSetupRequest, SignatureRequest, SowProposal,
};
use crate::workflows::pipeline::retry::RetryPolicy;
use crate::workflows::pricing::{BasisPoints, PricingRule, RuleId, RuleKind, StaticCatalog};

pub(super) fn qualified_record(id: &str) -> DiscoveryRecord {
    let mut record = DiscoveryRecord::new(
        DiscoveryId(id.to_string()),
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
    record.team_size_affected = 12;
    record
}

pub(super) fn disqualified_record(id: &str) -> DiscoveryRecord {
    let mut record = qualified_record(id);
    record.company_name = "Quiet Holdings".to_string();
    record.company_size = Some(CompanySize::Enterprise);
    record.industry = Some(Industry::Other("Mining".to_string()));
    record.budget_range = Some(BudgetRange::NotDisclosed);
    record.timeline_urgency = Some(TimelineUrgency::TwelveMonths);
    record.weekly_hours_wasted = 0;
    record.team_size_affected = 1;
    record
}

pub(super) fn fast_config() -> PipelineConfig {
    PipelineConfig {
        retry: RetryPolicy {
            max_retries: 3,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(40),
            call_timeout: Duration::from_millis(100),
        },
        ..PipelineConfig::default()
    }
}

pub(super) fn giveaway_catalog() -> StaticCatalog {
    StaticCatalog::standard()
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
        .expect("rule is structurally valid")
}

/// How a scripted collaborator answers each call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Behaviour {
    Succeed,
    /// Never answers; every call hits the per-call timeout.
    Hang,
    /// 5xx-equivalent for the first `n` calls, then success.
    FailTimes(u32),
    /// 5xx-equivalent for calls `first..=last`, success otherwise.
    FailBetween(u32, u32),
    Reject,
    /// Answers with a receipt whose status is failed.
    ReceiptFailed,
    /// Succeeds with the same external id on every call.
    FixedReceipt(&'static str),
}

pub(super) struct Scripted {
    name: &'static str,
    behaviour: Behaviour,
    calls: AtomicU32,
}

impl Scripted {
    pub(super) fn new(name: &'static str, behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            name,
            behaviour,
            calls: AtomicU32::new(0),
        })
    }

    pub(super) fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    async fn respond(&self) -> Result<ProviderReceipt, CollaboratorError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let receipt = |status| ProviderReceipt {
            status,
            external_id: format!("{}-{call}", self.name),
        };
        match self.behaviour {
            Behaviour::Succeed => Ok(receipt(ReceiptStatus::Pending)),
            Behaviour::Hang => std::future::pending().await,
            Behaviour::FailTimes(failures) if call <= failures => {
                Err(CollaboratorError::unavailable(self.name, "503 service unavailable"))
            }
            Behaviour::FailTimes(_) => Ok(receipt(ReceiptStatus::Pending)),
            Behaviour::FailBetween(first, last) if (first..=last).contains(&call) => {
                Err(CollaboratorError::unavailable(self.name, "503 service unavailable"))
            }
            Behaviour::FailBetween(..) => Ok(receipt(ReceiptStatus::Pending)),
            Behaviour::FixedReceipt(external_id) => Ok(ProviderReceipt {
                status: ReceiptStatus::Pending,
                external_id: external_id.to_string(),
            }),
            Behaviour::Reject => Err(CollaboratorError::rejected(self.name, "400 bad request")),
            Behaviour::ReceiptFailed => Ok(receipt(ReceiptStatus::Failed)),
        }
    }
}

#[async_trait]
impl ContentRenderer for Scripted {
    async fn render(
        &self,
        template_id: &str,
        merge_fields: &BTreeMap<String, String>,
    ) -> Result<DocumentRef, CollaboratorError> {
        assert!(!merge_fields.is_empty(), "renderer needs merge fields");
        let receipt = self.respond().await?;
        Ok(DocumentRef {
            document_id: receipt.external_id,
            template_id: template_id.to_string(),
        })
    }
}

#[async_trait]
impl SignatureProvider for Scripted {
    async fn request_signature(
        &self,
        _request: &SignatureRequest,
    ) -> Result<ProviderReceipt, CollaboratorError> {
        self.respond().await
    }
}

#[async_trait]
impl PaymentProvider for Scripted {
    async fn configure_payments(
        &self,
        _request: &PaymentSetupRequest,
    ) -> Result<ProviderReceipt, CollaboratorError> {
        self.respond().await
    }
}

#[async_trait]
impl KickoffProvisioner for Scripted {
    async fn provision(&self, _request: &KickoffRequest) -> Result<ProviderReceipt, CollaboratorError> {
        self.respond().await
    }
}

#[derive(Default)]
pub(super) struct MemoryStore {
    records: Mutex<HashMap<DiscoveryId, DiscoveryRecord>>,
    scores: Mutex<Vec<QualificationScore>>,
    sows: Mutex<Vec<SowProposal>>,
    log: Mutex<Vec<AutomationLogEntry>>,
    log_offline: bool,
}

impl MemoryStore {
    pub(super) fn with_log_offline() -> Self {
        Self {
            log_offline: true,
            ..Self::default()
        }
    }

    pub(super) fn insert_record(&self, record: DiscoveryRecord) {
        self.records
            .lock()
            .expect("store mutex poisoned")
            .insert(record.discovery_id.clone(), record);
    }

    pub(super) fn scores(&self) -> Vec<QualificationScore> {
        self.scores.lock().expect("store mutex poisoned").clone()
    }

    pub(super) fn sows(&self) -> Vec<SowProposal> {
        self.sows.lock().expect("store mutex poisoned").clone()
    }

    pub(super) fn log(&self) -> Vec<AutomationLogEntry> {
        self.log.lock().expect("store mutex poisoned").clone()
    }
}

impl PipelineStore for MemoryStore {
    fn load_discovery_record(&self, id: &DiscoveryId) -> Result<DiscoveryRecord, StorageError> {
        self.records
            .lock()
            .expect("store mutex poisoned")
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    fn save_qualification_score(&self, score: &QualificationScore) -> Result<(), StorageError> {
        self.scores
            .lock()
            .expect("store mutex poisoned")
            .push(score.clone());
        Ok(())
    }

    fn save_sow(&self, sow: &SowProposal) -> Result<(), StorageError> {
        self.sows
            .lock()
            .expect("store mutex poisoned")
            .push(sow.clone());
        Ok(())
    }

    fn append_automation_log_entry(&self, entry: &AutomationLogEntry) -> Result<(), StorageError> {
        if self.log_offline {
            return Err(StorageError::Unavailable("log table locked".to_string()));
        }
        self.log
            .lock()
            .expect("store mutex poisoned")
            .push(entry.clone());
        Ok(())
    }
}

/// Collaborator behaviours for one test; everything succeeds by default.
pub(super) struct Script {
    pub(super) catalog: StaticCatalog,
    pub(super) config: PipelineConfig,
    pub(super) store: MemoryStore,
    pub(super) renderer: Behaviour,
    pub(super) signatures: Behaviour,
    pub(super) payments: Behaviour,
    pub(super) kickoff: Behaviour,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            catalog: StaticCatalog::standard(),
            config: fast_config(),
            store: MemoryStore::default(),
            renderer: Behaviour::Succeed,
            signatures: Behaviour::Succeed,
            payments: Behaviour::Succeed,
            kickoff: Behaviour::Succeed,
        }
    }
}

pub(super) struct Harness {
    pub(super) orchestrator: Arc<PipelineOrchestrator>,
    pub(super) store: Arc<MemoryStore>,
    pub(super) renderer: Arc<Scripted>,
    pub(super) signatures: Arc<Scripted>,
    pub(super) payments: Arc<Scripted>,
    pub(super) kickoff: Arc<Scripted>,
}

impl Script {
    pub(super) fn build(self) -> Harness {
        let store = Arc::new(self.store);
        let renderer = Scripted::new("content renderer", self.renderer);
        let signatures = Scripted::new("signature provider", self.signatures);
        let payments = Scripted::new("payment provider", self.payments);
        let kickoff = Scripted::new("kickoff provisioner", self.kickoff);

        let collaborators = PipelineCollaborators {
            store: store.clone(),
            catalog: Arc::new(self.catalog),
            renderer: renderer.clone(),
            signatures: signatures.clone(),
            payments: payments.clone(),
            kickoff: kickoff.clone(),
        };

        Harness {
            orchestrator: Arc::new(PipelineOrchestrator::new(collaborators, self.config)),
            store,
            renderer,
            signatures,
            payments,
            kickoff,
        }
    }
}

pub(super) fn harness() -> Harness {
    Script::default().build()
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 256 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
