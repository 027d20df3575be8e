use serde::{Deserialize, Serialize};

use super::retry::RetryPolicy;
use super::state::ProcessType;
use crate::workflows::discovery::QualificationThresholds;
use crate::workflows::pricing::{MilestoneTiers, RecommenderConfig};

/// Per-stage toggles for chaining internal transitions automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoAdvance {
    pub sow_generation: bool,
    pub contract_generation: bool,
    pub payment_setup: bool,
    pub project_kickoff: bool,
}

impl Default for AutoAdvance {
    fn default() -> Self {
        Self {
            sow_generation: true,
            contract_generation: true,
            payment_setup: true,
            project_kickoff: true,
        }
    }
}

impl AutoAdvance {
    pub fn disabled() -> Self {
        Self {
            sow_generation: false,
            contract_generation: false,
            payment_setup: false,
            project_kickoff: false,
        }
    }

    pub fn allows(&self, process: ProcessType) -> bool {
        match process {
            ProcessType::DiscoveryToSow => self.sow_generation,
            ProcessType::SowToContract => self.contract_generation,
            ProcessType::ContractToPayment => self.payment_setup,
            ProcessType::PaymentToKickoff => self.project_kickoff,
            _ => false,
        }
    }
}

/// Engine settings, loaded once at process start.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub thresholds: QualificationThresholds,
    pub tiers: MilestoneTiers,
    pub retry: RetryPolicy,
    pub auto_advance: AutoAdvance,
    pub recommender: RecommenderConfig,
}
