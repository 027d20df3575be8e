use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::collaborators::{DocumentRef, ReceiptStatus};
use crate::workflows::discovery::{ContactInfo, DiscoveryId, DiscoveryRecord, QualificationScore};
use crate::workflows::pricing::{
    Milestone, Money, PriceBreakdown, PricingQuote, ServiceCategory, ServiceSelection,
};

pub const SOW_TEMPLATE_ID: &str = "sow_standard";
pub const CONTRACT_TEMPLATE_ID: &str = "contract_enterprise";
pub const CURRENCY: &str = "USD";

const SOW_VALIDITY_DAYS: i64 = 30;
const PROJECT_START_DELAY_DAYS: i64 = 14;
const CONTRACT_TERM_DAYS: i64 = 365;
const INVOICE_DUE_DAYS: i64 = 7;
const KICKOFF_DELAY_DAYS: i64 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SowId(pub String);

impl SowId {
    pub fn from_sequence(sequence: u64) -> Self {
        Self(format!("SOW-{sequence:04}"))
    }
}

impl fmt::Display for SowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Contract number in the `ENT-YYYYMM-NNNN` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContractId(pub String);

impl ContractId {
    pub fn from_sequence(now: DateTime<Utc>, sequence: u64) -> Self {
        Self(format!("ENT-{}-{sequence:04}", now.format("%Y%m")))
    }
}

impl fmt::Display for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Priced proposal awaiting client approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SowProposal {
    pub sow_id: SowId,
    pub deal_id: DiscoveryId,
    pub project_title: String,
    pub company_name: String,
    pub overall_score: u8,
    pub selection: ServiceSelection,
    pub breakdown: PriceBreakdown,
    pub document: DocumentRef,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

pub fn project_title(record: &DiscoveryRecord) -> String {
    format!("{} Process Automation Initiative", record.company_name)
}

pub fn sow_expiry(created_at: DateTime<Utc>) -> DateTime<Utc> {
    created_at + Duration::days(SOW_VALIDITY_DAYS)
}

/// Merge fields handed to the renderer; the renderer owns all prose.
pub fn sow_merge_fields(
    sow_id: &SowId,
    record: &DiscoveryRecord,
    score: &QualificationScore,
    quote: &PricingQuote,
    expires_at: DateTime<Utc>,
) -> BTreeMap<String, String> {
    let breakdown = &quote.breakdown;
    let mut fields = BTreeMap::new();
    fields.insert("sow_id".to_string(), sow_id.to_string());
    fields.insert("project_title".to_string(), project_title(record));
    fields.insert("company_name".to_string(), record.company_name.clone());
    fields.insert("primary_contact".to_string(), record.primary_contact.name.clone());
    fields.insert("qualification_score".to_string(), score.overall.to_string());
    fields.insert(
        "services".to_string(),
        quote
            .selection
            .lines
            .iter()
            .map(|line| format!("{} x{}", line.service_name, line.quantity))
            .collect::<Vec<_>>()
            .join("; "),
    );
    fields.insert("base_services_cost".to_string(), breakdown.base_services_cost.to_string());
    fields.insert(
        "additional_services_cost".to_string(),
        breakdown.additional_services_cost.to_string(),
    );
    fields.insert(
        "complexity_adjustments".to_string(),
        breakdown.complexity_adjustments.to_string(),
    );
    fields.insert("discounts_applied".to_string(), breakdown.discounts_applied.to_string());
    fields.insert("total_project_cost".to_string(), breakdown.total_project_cost.to_string());
    fields.insert("estimated_hours".to_string(), breakdown.estimated_hours.to_string());
    fields.insert("timeline_weeks".to_string(), breakdown.timeline_weeks.to_string());
    fields.insert("payment_schedule".to_string(), schedule_summary(&breakdown.milestones));
    fields.insert("expires_at".to_string(), expires_at.date_naive().to_string());
    fields
}

fn schedule_summary(milestones: &[Milestone]) -> String {
    milestones
        .iter()
        .map(|m| format!("{} {} ({})", m.name, m.fraction, m.amount))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRequest {
    pub contract_id: ContractId,
    pub document: DocumentRef,
    pub signatory: ContactInfo,
    pub total_value: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractRecord {
    pub contract_id: ContractId,
    pub sow_id: SowId,
    pub total_value: Money,
    pub document: DocumentRef,
    pub signature_request_id: String,
    pub signature_status: ReceiptStatus,
    pub project_start: NaiveDate,
    pub project_end: NaiveDate,
    pub effective_date: NaiveDate,
    pub expires_on: NaiveDate,
}

/// Project start two weeks out, end after the quoted timeline, one-year term.
pub fn contract_dates(now: DateTime<Utc>, timeline_weeks: u32) -> (NaiveDate, NaiveDate, NaiveDate, NaiveDate) {
    let today = now.date_naive();
    let project_start = today + Duration::days(PROJECT_START_DELAY_DAYS);
    let project_end = project_start + Duration::weeks(timeline_weeks as i64);
    (project_start, project_end, today, today + Duration::days(CONTRACT_TERM_DAYS))
}

pub fn contract_merge_fields(
    contract_id: &ContractId,
    sow: &SowProposal,
    signatory: &ContactInfo,
    dates: (NaiveDate, NaiveDate, NaiveDate, NaiveDate),
) -> BTreeMap<String, String> {
    let (project_start, project_end, effective, expires) = dates;
    let mut fields = BTreeMap::new();
    fields.insert("contract_number".to_string(), contract_id.to_string());
    fields.insert("sow_id".to_string(), sow.sow_id.to_string());
    fields.insert("project_title".to_string(), sow.project_title.clone());
    fields.insert("client_legal_name".to_string(), sow.company_name.clone());
    fields.insert("client_signatory_name".to_string(), signatory.name.clone());
    fields.insert(
        "client_signatory_title".to_string(),
        signatory.title.clone().unwrap_or_default(),
    );
    fields.insert(
        "client_signatory_email".to_string(),
        signatory.email.clone().unwrap_or_default(),
    );
    fields.insert(
        "total_contract_value".to_string(),
        sow.breakdown.total_project_cost.to_string(),
    );
    fields.insert(
        "payment_schedule".to_string(),
        schedule_summary(&sow.breakdown.milestones),
    );
    fields.insert("project_start_date".to_string(), project_start.to_string());
    fields.insert("project_end_date".to_string(), project_end.to_string());
    fields.insert("contract_effective_date".to_string(), effective.to_string());
    fields.insert("contract_expiration_date".to_string(), expires.to_string());
    fields
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRequest {
    pub invoice_number: String,
    pub milestone: String,
    pub amount: Money,
    pub due_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSetupRequest {
    pub contract_id: ContractId,
    pub customer_name: String,
    pub currency: String,
    pub total_amount: Money,
    pub schedule: Vec<Milestone>,
    pub first_invoice: InvoiceRequest,
}

/// Milestone-based payment setup. The first milestone is invoiced immediately.
pub fn payment_setup_request(
    contract: &ContractRecord,
    sow: &SowProposal,
    now: DateTime<Utc>,
    sequence: u64,
) -> Option<PaymentSetupRequest> {
    let first = sow.breakdown.first_milestone()?;
    Some(PaymentSetupRequest {
        contract_id: contract.contract_id.clone(),
        customer_name: sow.company_name.clone(),
        currency: CURRENCY.to_string(),
        total_amount: contract.total_value,
        schedule: sow.breakdown.milestones.clone(),
        first_invoice: InvoiceRequest {
            invoice_number: format!("INV-{}-{sequence:04}", now.format("%Y%m%d")),
            milestone: first.name.clone(),
            amount: first.amount,
            due_date: now.date_naive() + Duration::days(INVOICE_DUE_DAYS),
        },
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub payment_id: String,
    pub contract_id: ContractId,
    pub first_invoice: InvoiceRequest,
    pub status: ReceiptStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KickoffTemplate {
    Complex,
    Standard,
    Basic,
}

impl KickoffTemplate {
    /// Complex when the core service ships with more than two services in total.
    pub fn select(categories: &[ServiceCategory]) -> Self {
        let has_core = categories.iter().any(|category| category.is_core());
        if has_core && categories.len() > 2 {
            Self::Complex
        } else if has_core {
            Self::Standard
        } else {
            Self::Basic
        }
    }
}

/// Project code in the `ENTYYMMNNN` form.
pub fn project_code(now: DateTime<Utc>, sequence: u64) -> String {
    format!("ENT{}{sequence:03}", now.format("%y%m"))
}

pub fn kickoff_date(now: DateTime<Utc>) -> NaiveDate {
    now.date_naive() + Duration::days(KICKOFF_DELAY_DAYS)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KickoffRequest {
    pub project_code: String,
    pub project_name: String,
    pub template: KickoffTemplate,
    pub kickoff_date: NaiveDate,
    pub contract_id: ContractId,
    pub services: Vec<ServiceCategory>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KickoffRecord {
    pub project_code: String,
    pub template: KickoffTemplate,
    pub kickoff_date: NaiveDate,
    pub provisioning_id: String,
}

/// Result of one completed transition. Cached in the audit log and replayed for duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TransitionOutcome {
    SowProposed(SowProposal),
    NotQualified { score: QualificationScore },
    SowApproved { sow_id: SowId },
    ContractRequested(ContractRecord),
    ContractExecuted { contract_id: ContractId },
    PaymentConfigured(PaymentRecord),
    PaymentReceived { payment_id: String },
    KickoffScheduled(KickoffRecord),
    KickoffCompleted { project_code: String },
}

impl TransitionOutcome {
    /// Identifier of the record the transition produced or acted on.
    pub fn target_record_id(&self) -> String {
        match self {
            Self::SowProposed(sow) => sow.sow_id.to_string(),
            Self::NotQualified { score } => score.discovery_id.to_string(),
            Self::SowApproved { sow_id } => sow_id.to_string(),
            Self::ContractRequested(contract) => contract.contract_id.to_string(),
            Self::ContractExecuted { contract_id } => contract_id.to_string(),
            Self::PaymentConfigured(payment) => payment.payment_id.clone(),
            Self::PaymentReceived { payment_id } => payment_id.clone(),
            Self::KickoffScheduled(kickoff) => kickoff.project_code.clone(),
            Self::KickoffCompleted { project_code } => project_code.clone(),
        }
    }

    pub fn summary(&self) -> String {
        match self {
            Self::SowProposed(sow) => format!(
                "SOW {} generated at {}",
                sow.sow_id, sow.breakdown.total_project_cost
            ),
            Self::NotQualified { score } => {
                format!("no SOW generated: {}", score.summary())
            }
            Self::SowApproved { sow_id } => format!("SOW {sow_id} approved"),
            Self::ContractRequested(contract) => format!(
                "contract {} sent for signature ({})",
                contract.contract_id, contract.signature_request_id
            ),
            Self::ContractExecuted { contract_id } => format!("contract {contract_id} executed"),
            Self::PaymentConfigured(payment) => format!(
                "payments configured for contract {}; invoice {} issued",
                payment.contract_id, payment.first_invoice.invoice_number
            ),
            Self::PaymentReceived { payment_id } => format!("first payment received ({payment_id})"),
            Self::KickoffScheduled(kickoff) => format!(
                "project {} kickoff scheduled for {}",
                kickoff.project_code, kickoff.kickoff_date
            ),
            Self::KickoffCompleted { project_code } => format!("project {project_code} kicked off"),
        }
    }
}
