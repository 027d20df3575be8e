use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Discovery,
    Sow,
    Contract,
    Payment,
    Kickoff,
}

impl PipelineStage {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Discovery => "discovery",
            Self::Sow => "sow",
            Self::Contract => "contract",
            Self::Payment => "payment",
            Self::Kickoff => "kickoff",
        }
    }
}

/// Sub-state within a stage. The two halted variants carry the reason an operator sees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    InProgress,
    Completed,
    Failed { reason: String },
    ManualIntervention { reason: String },
}

impl StageStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed { .. } => "failed",
            Self::ManualIntervention { .. } => "manual_intervention",
        }
    }

    pub fn is_halted(&self) -> bool {
        matches!(self, Self::Failed { .. } | Self::ManualIntervention { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Failed { reason } | Self::ManualIntervention { reason } => Some(reason),
            _ => None,
        }
    }
}

/// Kind of stage-transition attempt, used with the source record id as the idempotency key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessType {
    DiscoveryToSow,
    SowApproval,
    SowToContract,
    ContractExecution,
    ContractToPayment,
    FirstPayment,
    PaymentToKickoff,
    KickoffCompletion,
}

impl ProcessType {
    pub const fn all() -> [Self; 8] {
        [
            Self::DiscoveryToSow,
            Self::SowApproval,
            Self::SowToContract,
            Self::ContractExecution,
            Self::ContractToPayment,
            Self::FirstPayment,
            Self::PaymentToKickoff,
            Self::KickoffCompletion,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::DiscoveryToSow => "discovery_to_sow",
            Self::SowApproval => "sow_approval",
            Self::SowToContract => "sow_to_contract",
            Self::ContractExecution => "contract_execution",
            Self::ContractToPayment => "contract_to_payment",
            Self::FirstPayment => "first_payment",
            Self::PaymentToKickoff => "payment_to_kickoff",
            Self::KickoffCompletion => "kickoff_completion",
        }
    }

    pub const fn trigger(self) -> TriggerKind {
        match self {
            Self::DiscoveryToSow
            | Self::SowToContract
            | Self::ContractToPayment
            | Self::PaymentToKickoff => TriggerKind::Internal,
            Self::SowApproval
            | Self::ContractExecution
            | Self::FirstPayment
            | Self::KickoffCompletion => TriggerKind::External,
        }
    }
}

impl fmt::Display for ProcessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    Internal,
    External,
    Operator,
}

/// External events delivered by webhooks or operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    SowApproved,
    ContractExecuted,
    FirstPaymentReceived,
    KickoffHeld,
}

impl Signal {
    pub const fn process(self) -> ProcessType {
        match self {
            Self::SowApproved => ProcessType::SowApproval,
            Self::ContractExecuted => ProcessType::ContractExecution,
            Self::FirstPaymentReceived => ProcessType::FirstPayment,
            Self::KickoffHeld => ProcessType::KickoffCompletion,
        }
    }
}

/// Current position of one deal. Every earlier stage is implicitly completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineState {
    pub stage: PipelineStage,
    #[serde(flatten)]
    pub status: StageStatus,
}

impl PipelineState {
    pub fn new(stage: PipelineStage, status: StageStatus) -> Self {
        Self { stage, status }
    }

    pub fn discovery_completed() -> Self {
        Self::new(PipelineStage::Discovery, StageStatus::Completed)
    }

    /// Target state for `process`, or `None` when the transition table has no such row.
    pub fn transition(&self, process: ProcessType) -> Option<PipelineState> {
        use PipelineStage as Stage;
        use ProcessType as P;
        use StageStatus as S;

        let target = match (self.stage, &self.status, process) {
            (Stage::Discovery, S::Completed, P::DiscoveryToSow) => (Stage::Sow, S::Pending),
            (Stage::Sow, S::Pending, P::SowApproval) => (Stage::Sow, S::Completed),
            (Stage::Sow, S::Completed, P::SowToContract) => (Stage::Contract, S::InProgress),
            (Stage::Contract, S::InProgress, P::ContractExecution) => {
                (Stage::Contract, S::Completed)
            }
            (Stage::Contract, S::Completed, P::ContractToPayment) => {
                (Stage::Payment, S::Pending)
            }
            (Stage::Payment, S::Pending, P::FirstPayment) => (Stage::Payment, S::Completed),
            (Stage::Payment, S::Completed, P::PaymentToKickoff) => {
                (Stage::Kickoff, S::InProgress)
            }
            (Stage::Kickoff, S::InProgress, P::KickoffCompletion) => {
                (Stage::Kickoff, S::Completed)
            }
            _ => return None,
        };
        Some(PipelineState::new(target.0, target.1))
    }

    /// The internal transition that follows this state, if any.
    pub fn next_internal(&self) -> Option<ProcessType> {
        match (self.stage, &self.status) {
            (PipelineStage::Discovery, StageStatus::Completed) => Some(ProcessType::DiscoveryToSow),
            (PipelineStage::Sow, StageStatus::Completed) => Some(ProcessType::SowToContract),
            (PipelineStage::Contract, StageStatus::Completed) => {
                Some(ProcessType::ContractToPayment)
            }
            (PipelineStage::Payment, StageStatus::Completed) => Some(ProcessType::PaymentToKickoff),
            _ => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.stage == PipelineStage::Kickoff && self.status == StageStatus::Completed
    }

    pub fn halted(&self, reason: String, escalate: bool) -> Self {
        let status = if escalate {
            StageStatus::ManualIntervention { reason }
        } else {
            StageStatus::Failed { reason }
        };
        Self::new(self.stage, status)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.stage.label(), self.status.label())
    }
}
