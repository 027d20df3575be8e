use async_trait::async_trait;
use chrono::Utc;
use metrics_exporter_prometheus::PrometheusHandle;
use sales_pipeline::error::AppError;
use sales_pipeline::workflows::discovery::{DiscoveryId, DiscoveryRecord, QualificationScore};
use sales_pipeline::workflows::pipeline::{
    AutomationLogEntry, CollaboratorError, ContentRenderer, DocumentRef, KickoffProvisioner,
    KickoffRequest, PaymentProvider, PaymentSetupRequest, PipelineCollaborators, PipelineStore,
    ProviderReceipt, ReceiptStatus, SignatureProvider, SignatureRequest, SowProposal,
    StorageError,
};
use sales_pipeline::workflows::pricing::ServiceCatalog;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

fn guard<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StorageError> {
    mutex
        .lock()
        .map_err(|_| StorageError::Unavailable("in-memory store mutex poisoned".to_string()))
}

/// Process-local stand-in for the relational store.
#[derive(Default)]
pub(crate) struct InMemoryPipelineStore {
    records: Mutex<HashMap<DiscoveryId, DiscoveryRecord>>,
    scores: Mutex<Vec<QualificationScore>>,
    sows: Mutex<Vec<SowProposal>>,
    log: Mutex<Vec<AutomationLogEntry>>,
}

impl InMemoryPipelineStore {
    pub(crate) fn insert_record(&self, record: DiscoveryRecord) -> Result<(), StorageError> {
        let mut records = guard(&self.records)?;
        if records.contains_key(&record.discovery_id) {
            return Err(StorageError::Conflict(record.discovery_id.to_string()));
        }
        records.insert(record.discovery_id.clone(), record);
        Ok(())
    }

    pub(crate) fn log_len(&self) -> usize {
        guard(&self.log).map(|log| log.len()).unwrap_or_default()
    }
}

impl PipelineStore for InMemoryPipelineStore {
    fn load_discovery_record(&self, id: &DiscoveryId) -> Result<DiscoveryRecord, StorageError> {
        guard(&self.records)?
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    fn save_qualification_score(&self, score: &QualificationScore) -> Result<(), StorageError> {
        guard(&self.scores)?.push(score.clone());
        Ok(())
    }

    fn save_sow(&self, sow: &SowProposal) -> Result<(), StorageError> {
        let mut sows = guard(&self.sows)?;
        if sows.iter().any(|existing| existing.sow_id == sow.sow_id) {
            return Err(StorageError::Conflict(sow.sow_id.to_string()));
        }
        sows.push(sow.clone());
        Ok(())
    }

    fn append_automation_log_entry(&self, entry: &AutomationLogEntry) -> Result<(), StorageError> {
        guard(&self.log)?.push(entry.clone());
        Ok(())
    }
}

/// Renders nothing; hands back a document reference per call.
#[derive(Default)]
pub(crate) struct LocalRenderer {
    rendered: AtomicU64,
}

#[async_trait]
impl ContentRenderer for LocalRenderer {
    async fn render(
        &self,
        template_id: &str,
        merge_fields: &BTreeMap<String, String>,
    ) -> Result<DocumentRef, CollaboratorError> {
        if merge_fields.is_empty() {
            return Err(CollaboratorError::rejected(
                "content renderer",
                format!("template {template_id} needs merge fields"),
            ));
        }
        let sequence = self.rendered.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(template_id, fields = merge_fields.len(), "document rendered");
        Ok(DocumentRef {
            document_id: format!("doc-{}-{sequence:04}", Utc::now().format("%Y%m%d")),
            template_id: template_id.to_string(),
        })
    }
}

/// Accepts every request and answers with a pending receipt, like a provider sandbox.
pub(crate) struct SandboxProvider {
    prefix: &'static str,
    issued: AtomicU64,
}

impl SandboxProvider {
    pub(crate) fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            issued: AtomicU64::new(0),
        }
    }

    fn receipt(&self) -> ProviderReceipt {
        let sequence = self.issued.fetch_add(1, Ordering::Relaxed) + 1;
        ProviderReceipt {
            status: ReceiptStatus::Pending,
            external_id: format!("{}-{sequence:04}", self.prefix),
        }
    }
}

#[async_trait]
impl SignatureProvider for SandboxProvider {
    async fn request_signature(
        &self,
        request: &SignatureRequest,
    ) -> Result<ProviderReceipt, CollaboratorError> {
        tracing::debug!(contract_id = %request.contract_id, signatory = %request.signatory.name, "signature requested");
        Ok(self.receipt())
    }
}

#[async_trait]
impl PaymentProvider for SandboxProvider {
    async fn configure_payments(
        &self,
        request: &PaymentSetupRequest,
    ) -> Result<ProviderReceipt, CollaboratorError> {
        tracing::debug!(contract_id = %request.contract_id, invoice = %request.first_invoice.invoice_number, "payments configured");
        Ok(self.receipt())
    }
}

#[async_trait]
impl KickoffProvisioner for SandboxProvider {
    async fn provision(&self, request: &KickoffRequest) -> Result<ProviderReceipt, CollaboratorError> {
        tracing::debug!(project_code = %request.project_code, "project provisioned");
        Ok(self.receipt())
    }
}

/// Wires the in-memory store and sandbox providers around `catalog`.
pub(crate) fn sandbox_collaborators(
    catalog: Arc<dyn ServiceCatalog>,
) -> (PipelineCollaborators, Arc<InMemoryPipelineStore>) {
    let store = Arc::new(InMemoryPipelineStore::default());
    let collaborators = PipelineCollaborators {
        store: store.clone(),
        catalog,
        renderer: Arc::new(LocalRenderer::default()),
        signatures: Arc::new(SandboxProvider::new("envelope")),
        payments: Arc::new(SandboxProvider::new("billing")),
        kickoff: Arc::new(SandboxProvider::new("workspace")),
    };
    (collaborators, store)
}

pub(crate) fn load_record(path: &Path) -> Result<DiscoveryRecord, AppError> {
    let file = std::fs::File::open(path)?;
    let record = serde_json::from_reader(std::io::BufReader::new(file))?;
    Ok(record)
}
