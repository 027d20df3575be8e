use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::audit::AutomationLogEntry;
use super::proposal::{KickoffRequest, PaymentSetupRequest, SignatureRequest, SowProposal};
use crate::workflows::discovery::{DiscoveryId, DiscoveryRecord, QualificationScore};
use crate::workflows::pricing::ServiceCatalog;

/// Relational store. Calls are synchronous and may fail with [`StorageError`].
pub trait PipelineStore: Send + Sync {
    fn load_discovery_record(&self, id: &DiscoveryId) -> Result<DiscoveryRecord, StorageError>;
    fn save_qualification_score(&self, score: &QualificationScore) -> Result<(), StorageError>;
    fn save_sow(&self, sow: &SowProposal) -> Result<(), StorageError>;
    fn append_automation_log_entry(&self, entry: &AutomationLogEntry) -> Result<(), StorageError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("record {0} not found")]
    NotFound(String),
    #[error("record {0} already exists")]
    Conflict(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Document produced by the content renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub document_id: String,
    pub template_id: String,
}

#[async_trait]
pub trait ContentRenderer: Send + Sync {
    async fn render(
        &self,
        template_id: &str,
        merge_fields: &BTreeMap<String, String>,
    ) -> Result<DocumentRef, CollaboratorError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    Pending,
    Completed,
    Failed,
}

/// The only part of a provider response the pipeline reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderReceipt {
    pub status: ReceiptStatus,
    pub external_id: String,
}

#[async_trait]
pub trait SignatureProvider: Send + Sync {
    async fn request_signature(
        &self,
        request: &SignatureRequest,
    ) -> Result<ProviderReceipt, CollaboratorError>;
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn configure_payments(
        &self,
        request: &PaymentSetupRequest,
    ) -> Result<ProviderReceipt, CollaboratorError>;
}

#[async_trait]
pub trait KickoffProvisioner: Send + Sync {
    async fn provision(&self, request: &KickoffRequest) -> Result<ProviderReceipt, CollaboratorError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("{service} timed out")]
    Timeout { service: String },
    #[error("{service} unavailable: {detail}")]
    Unavailable { service: String, detail: String },
    #[error("{service} rejected the request: {detail}")]
    Rejected { service: String, detail: String },
}

impl CollaboratorError {
    pub fn timeout(service: impl Into<String>) -> Self {
        Self::Timeout {
            service: service.into(),
        }
    }

    pub fn unavailable(service: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Unavailable {
            service: service.into(),
            detail: detail.into(),
        }
    }

    pub fn rejected(service: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Rejected {
            service: service.into(),
            detail: detail.into(),
        }
    }

    /// Timeouts and 5xx-equivalent failures.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Unavailable { .. })
    }
}

/// Everything the orchestrator talks to.
#[derive(Clone)]
pub struct PipelineCollaborators {
    pub store: Arc<dyn PipelineStore>,
    pub catalog: Arc<dyn ServiceCatalog>,
    pub renderer: Arc<dyn ContentRenderer>,
    pub signatures: Arc<dyn SignatureProvider>,
    pub payments: Arc<dyn PaymentProvider>,
    pub kickoff: Arc<dyn KickoffProvisioner>,
}
