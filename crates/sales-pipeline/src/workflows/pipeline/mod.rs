//! Stage-transition orchestration from qualified discovery to project kickoff.
//!
//! Each deal moves through discovery, SOW, contract, payment and kickoff. Every transition
//! attempt is recorded once in the automation log, keyed by process type and source record
//! so repeated triggers replay the first result instead of re-running side effects.

pub mod analytics;
pub mod audit;
pub mod collaborators;
pub mod config;
pub mod orchestrator;
pub mod proposal;
pub mod retry;
pub mod router;
pub mod state;

#[cfg(test)]
mod tests;

pub use analytics::{ConversionRates, PipelineAnalytics, ProcessEfficiency};
pub use audit::{AuditLog, AuditQuery, AutomationLogEntry, EntryStatus, DEFAULT_QUERY_LIMIT};
pub use collaborators::{
    CollaboratorError, ContentRenderer, DocumentRef, KickoffProvisioner, PaymentProvider,
    PipelineCollaborators, PipelineStore, ProviderReceipt, ReceiptStatus, SignatureProvider,
    StorageError,
};
pub use config::{AutoAdvance, PipelineConfig};
pub use orchestrator::{
    Deal, Intervention, PipelineError, PipelineOrchestrator, StepRecord, StepReport,
};
pub use proposal::{
    ContractId, ContractRecord, KickoffRecord, KickoffRequest, KickoffTemplate,
    PaymentRecord, PaymentSetupRequest, SignatureRequest, SowId, SowProposal,
    TransitionOutcome,
};
pub use retry::RetryPolicy;
pub use router::pipeline_router;
pub use state::{PipelineStage, PipelineState, ProcessType, Signal, StageStatus, TriggerKind};
