use crate::workflows::pricing::Money;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a discovery call; doubles as the deal id for the pipeline it starts.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiscoveryId(pub String);

impl fmt::Display for DiscoveryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Headcount bracket, ordered from smallest to largest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CompanySize {
    #[serde(rename = "1-10")]
    Micro,
    #[serde(rename = "11-50")]
    Small,
    #[serde(rename = "51-200")]
    Mid,
    #[serde(rename = "201-500")]
    UpperMid,
    #[serde(rename = "501-1000")]
    Large,
    #[serde(rename = "1000+")]
    Enterprise,
}

impl CompanySize {
    pub const fn ordered() -> [Self; 6] {
        [
            Self::Micro,
            Self::Small,
            Self::Mid,
            Self::UpperMid,
            Self::Large,
            Self::Enterprise,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Micro => "1-10",
            Self::Small => "11-50",
            Self::Mid => "51-200",
            Self::UpperMid => "201-500",
            Self::Large => "501-1000",
            Self::Enterprise => "1000+",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Industry {
    Technology,
    ProfessionalServices,
    Healthcare,
    Finance,
    RealEstate,
    Government,
    Manufacturing,
    Retail,
    Other(String),
}

impl Industry {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let normalized = raw
            .trim()
            .to_ascii_lowercase()
            .replace(['_', '-'], " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        let industry = match normalized.as_str() {
            "" => return Err(ValidationError::MissingField("industry")),
            "technology" | "tech" | "software" => Self::Technology,
            "professional services" => Self::ProfessionalServices,
            "healthcare" | "health care" => Self::Healthcare,
            "finance" | "financial services" => Self::Finance,
            "real estate" => Self::RealEstate,
            "government" | "public sector" => Self::Government,
            "manufacturing" => Self::Manufacturing,
            "retail" => Self::Retail,
            _ => Self::Other(raw.trim().to_string()),
        };
        Ok(industry)
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Technology => "Technology",
            Self::ProfessionalServices => "Professional Services",
            Self::Healthcare => "Healthcare",
            Self::Finance => "Finance",
            Self::RealEstate => "Real Estate",
            Self::Government => "Government",
            Self::Manufacturing => "Manufacturing",
            Self::Retail => "Retail",
            Self::Other(name) => name,
        }
    }
}

impl TryFrom<String> for Industry {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Industry> for String {
    fn from(value: Industry) -> Self {
        value.label().to_string()
    }
}

impl fmt::Display for Industry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RevenueBracket {
    #[serde(rename = "under_1m")]
    UnderOneMillion,
    #[serde(rename = "1m_10m")]
    OneToTenMillion,
    #[serde(rename = "10m_50m")]
    TenToFiftyMillion,
    #[serde(rename = "50m_250m")]
    FiftyToTwoFiftyMillion,
    #[serde(rename = "250m_plus")]
    OverTwoFiftyMillion,
    #[serde(rename = "not_disclosed")]
    NotDisclosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BudgetRange {
    #[serde(rename = "not_disclosed")]
    NotDisclosed,
    #[serde(rename = "under_25k")]
    Under25k,
    #[serde(rename = "25k_50k")]
    From25kTo50k,
    #[serde(rename = "50k_100k")]
    From50kTo100k,
    #[serde(rename = "100k_250k")]
    From100kTo250k,
    #[serde(rename = "250k_plus")]
    Over250k,
}

impl BudgetRange {
    pub const fn label(self) -> &'static str {
        match self {
            Self::NotDisclosed => "not_disclosed",
            Self::Under25k => "under_25k",
            Self::From25kTo50k => "25k_50k",
            Self::From50kTo100k => "50k_100k",
            Self::From100kTo250k => "100k_250k",
            Self::Over250k => "250k_plus",
        }
    }
}

/// Self-reported urgency, ordered from most to least urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TimelineUrgency {
    #[serde(rename = "immediate")]
    Immediate,
    #[serde(rename = "1_month")]
    OneMonth,
    #[serde(rename = "3_months")]
    ThreeMonths,
    #[serde(rename = "6_months")]
    SixMonths,
    #[serde(rename = "12_months")]
    TwelveMonths,
}

impl TimelineUrgency {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::OneMonth => "1_month",
            Self::ThreeMonths => "3_months",
            Self::SixMonths => "6_months",
            Self::TwelveMonths => "12_months",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualificationStatus {
    Qualified,
    Nurture,
    Disqualified,
}

impl QualificationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Qualified => "qualified",
            Self::Nurture => "nurture",
            Self::Disqualified => "disqualified",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// Free-text capture from the call. Only `integration_requirements`,
/// `compliance_requirements` and `security_requirements` feed the recommender heuristics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryNotes {
    pub current_challenges: String,
    pub manual_processes: String,
    pub current_tools_systems: String,
    pub primary_objectives: String,
    pub success_metrics: String,
    pub automation_priorities: String,
    pub integration_requirements: String,
    pub compliance_requirements: String,
    pub security_requirements: String,
    pub roi_expectations: String,
    pub next_steps: String,
    pub call_notes: String,
}

/// Snapshot of one discovery call. Only the qualification status changes after capture,
/// and it changes once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryRecord {
    pub discovery_id: DiscoveryId,
    pub company_name: String,
    #[serde(default)]
    pub company_size: Option<CompanySize>,
    #[serde(default)]
    pub industry: Option<Industry>,
    #[serde(default)]
    pub annual_revenue: Option<RevenueBracket>,
    #[serde(default)]
    pub budget_range: Option<BudgetRange>,
    #[serde(default)]
    pub timeline_urgency: Option<TimelineUrgency>,
    pub primary_contact: ContactInfo,
    #[serde(default)]
    pub decision_maker: Option<ContactInfo>,
    #[serde(default)]
    pub weekly_hours_wasted: u32,
    #[serde(default)]
    pub estimated_cost_inefficiency: Money,
    #[serde(default)]
    pub team_size_affected: u32,
    #[serde(default)]
    pub notes: DiscoveryNotes,
    #[serde(default)]
    pub sales_rep: String,
    #[serde(default)]
    pub call_duration_minutes: u32,
    /// Written by the core after scoring; never accepted from input.
    #[serde(default, skip_deserializing)]
    qualified_status: Option<QualificationStatus>,
}

impl DiscoveryRecord {
    pub fn new(
        discovery_id: DiscoveryId,
        company_name: impl Into<String>,
        primary_contact: ContactInfo,
    ) -> Self {
        Self {
            discovery_id,
            company_name: company_name.into(),
            company_size: None,
            industry: None,
            annual_revenue: None,
            budget_range: None,
            timeline_urgency: None,
            primary_contact,
            decision_maker: None,
            weekly_hours_wasted: 0,
            estimated_cost_inefficiency: Money::ZERO,
            team_size_affected: 0,
            notes: DiscoveryNotes::default(),
            sales_rep: String::new(),
            call_duration_minutes: 60,
            qualified_status: None,
        }
    }

    pub fn qualified_status(&self) -> Option<QualificationStatus> {
        self.qualified_status
    }

    pub fn record_qualification(
        &mut self,
        status: QualificationStatus,
    ) -> Result<(), ValidationError> {
        if self.qualified_status.is_some() {
            return Err(ValidationError::AlreadyQualified(self.discovery_id.clone()));
        }
        self.qualified_status = Some(status);
        Ok(())
    }

    pub fn has_decision_maker(&self) -> bool {
        self.decision_maker
            .as_ref()
            .map(|contact| !contact.name.trim().is_empty())
            .unwrap_or(false)
    }

    /// Validates the required categorical attributes and returns the typed view the
    /// scoring and pricing components work from.
    pub fn profile(&self) -> Result<DiscoveryProfile, ValidationError> {
        if self.discovery_id.0.trim().is_empty() {
            return Err(ValidationError::MissingField("discovery_id"));
        }
        if self.estimated_cost_inefficiency.is_negative() {
            return Err(ValidationError::InvalidValue {
                field: "estimated_cost_inefficiency",
                reason: format!("{} is negative", self.estimated_cost_inefficiency),
            });
        }

        Ok(DiscoveryProfile {
            company_size: self
                .company_size
                .ok_or(ValidationError::MissingField("company_size"))?,
            industry: self
                .industry
                .clone()
                .ok_or(ValidationError::MissingField("industry"))?,
            budget_range: self
                .budget_range
                .ok_or(ValidationError::MissingField("budget_range"))?,
            timeline_urgency: self
                .timeline_urgency
                .ok_or(ValidationError::MissingField("timeline_urgency"))?,
            annual_revenue: self.annual_revenue,
            has_decision_maker: self.has_decision_maker(),
            weekly_hours_wasted: self.weekly_hours_wasted,
            estimated_cost_inefficiency: self.estimated_cost_inefficiency,
            team_size_affected: self.team_size_affected,
        })
    }
}

/// Validated, fully typed attributes of a discovery record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryProfile {
    pub company_size: CompanySize,
    pub industry: Industry,
    pub budget_range: BudgetRange,
    pub timeline_urgency: TimelineUrgency,
    pub annual_revenue: Option<RevenueBracket>,
    pub has_decision_maker: bool,
    pub weekly_hours_wasted: u32,
    pub estimated_cost_inefficiency: Money,
    pub team_size_affected: u32,
}

/// Malformed or missing discovery input. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error("discovery record {0} already has a qualification status")]
    AlreadyQualified(DiscoveryId),
    #[error("score belongs to discovery record {actual}, expected {expected}")]
    RecordMismatch {
        expected: DiscoveryId,
        actual: DiscoveryId,
    },
}
