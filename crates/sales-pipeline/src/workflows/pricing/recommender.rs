use super::catalog::{CatalogService, CatalogError, ServiceCategory, ServiceId};
use super::money::Money;
use super::PricingError;
use crate::workflows::discovery::{
    CompanySize, DiscoveryId, DiscoveryProfile, DiscoveryRecord, QualificationScore,
    ValidationError,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const INTEGRATION_DETAIL_CHARS: usize = 100;
const COMPLIANCE_DETAIL_CHARS: usize = 50;
const SECURITY_DETAIL_CHARS: usize = 50;
const LARGE_TEAM: u32 = 20;

/// Recommender heuristics. The integration predicate counts distinct system keywords
/// found in the integration requirements; `integration_min_systems` of them activate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecommenderConfig {
    pub integration_min_systems: usize,
    pub max_integrations: u32,
    pub training_cohort_size: u32,
    pub integration_keywords: Vec<String>,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        let keywords = [
            "salesforce",
            "hubspot",
            "pipedrive",
            "zendesk",
            "slack",
            "teams",
            "jira",
            "asana",
            "quickbooks",
            "xero",
            "netsuite",
            "sap",
            "oracle",
            "workday",
            "shopify",
            "stripe",
            "epic",
            "cerner",
            "athenahealth",
            "sharepoint",
            "google workspace",
            "microsoft 365",
            "outlook",
            "gmail",
            "airtable",
            "notion",
            "erp",
            "crm",
            "ehr",
            "emr",
            "database",
            "api",
        ];

        Self {
            integration_min_systems: 2,
            max_integrations: 5,
            training_cohort_size: 10,
            integration_keywords: keywords.iter().map(|keyword| keyword.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceLine {
    pub service_id: ServiceId,
    pub service_name: String,
    pub category: ServiceCategory,
    pub quantity: u32,
    pub hours: u32,
    pub unit_price: Money,
}

impl ServiceLine {
    pub fn line_total(&self) -> Money {
        self.unit_price.times(self.quantity)
    }
}

/// Ordered service lines for one discovery record. The core automation line is first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSelection {
    pub discovery_id: DiscoveryId,
    pub lines: Vec<ServiceLine>,
}

impl ServiceSelection {
    pub fn subtotal(&self) -> Money {
        self.lines.iter().map(ServiceLine::line_total).sum()
    }

    pub fn core_cost(&self) -> Money {
        self.lines
            .iter()
            .filter(|line| line.category.is_core())
            .map(ServiceLine::line_total)
            .sum()
    }

    pub fn optional_cost(&self) -> Money {
        self.lines
            .iter()
            .filter(|line| !line.category.is_core())
            .map(ServiceLine::line_total)
            .sum()
    }

    pub fn total_hours(&self) -> u32 {
        self.lines
            .iter()
            .fold(0u32, |total, line| total.saturating_add(line.hours))
    }

    pub fn contains(&self, category: ServiceCategory) -> bool {
        self.lines.iter().any(|line| line.category == category)
    }

    pub fn categories(&self) -> Vec<ServiceCategory> {
        self.lines.iter().map(|line| line.category).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ServiceRecommender {
    config: RecommenderConfig,
}

impl ServiceRecommender {
    pub fn new(config: RecommenderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RecommenderConfig {
        &self.config
    }

    /// Selects and quantifies services. Prices come from `services`; nothing is priced here.
    pub fn recommend(
        &self,
        record: &DiscoveryRecord,
        score: &QualificationScore,
        services: &[CatalogService],
    ) -> Result<ServiceSelection, PricingError> {
        if score.discovery_id != record.discovery_id {
            return Err(ValidationError::RecordMismatch {
                expected: record.discovery_id.clone(),
                actual: score.discovery_id.clone(),
            }
            .into());
        }
        let profile = record.profile()?;
        let systems = detected_systems(
            &record.notes.integration_requirements,
            &self.config.integration_keywords,
        );

        let mut lines = Vec::new();
        let mut total_hours: u32 = 0;
        for category in ServiceCategory::ordered() {
            let quantity = match category {
                ServiceCategory::AutomationDevelopment => 1,
                ServiceCategory::ProcessOptimization if profile.weekly_hours_wasted > 10 => 1,
                ServiceCategory::IntegrationSetup
                    if systems.len() >= self.config.integration_min_systems =>
                {
                    (systems.len() as u32).min(self.config.max_integrations)
                }
                ServiceCategory::OngoingManagement
                    if profile.company_size >= CompanySize::Large =>
                {
                    1
                }
                ServiceCategory::Training if profile.team_size_affected > 10 => {
                    profile
                        .team_size_affected
                        .div_ceil(self.config.training_cohort_size.max(1))
                }
                _ => continue,
            };

            let service = find_active(services, category)?;
            let hours = match category {
                ServiceCategory::AutomationDevelopment => service
                    .base_hours
                    .checked_mul(complexity_percent(record, &profile))
                    .map(|hours| hours / 100),
                _ => service.base_hours.checked_mul(quantity),
            }
            .and_then(|hours| total_hours.checked_add(hours).map(|total| (hours, total)));
            let Some((hours, total)) = hours else {
                return Err(ValidationError::InvalidValue {
                    field: "team_size_affected",
                    reason: format!(
                        "{} affected staff puts the {} estimate beyond {} hours",
                        profile.team_size_affected,
                        service.service_name,
                        u32::MAX
                    ),
                }
                .into());
            };
            total_hours = total;
            lines.push(ServiceLine {
                service_id: service.service_id.clone(),
                service_name: service.service_name.clone(),
                category,
                quantity,
                hours,
                unit_price: service.base_price,
            });
        }

        tracing::debug!(
            discovery_id = %record.discovery_id,
            services = lines.len(),
            systems = systems.len(),
            "services recommended"
        );

        Ok(ServiceSelection {
            discovery_id: record.discovery_id.clone(),
            lines,
        })
    }
}

fn find_active(
    services: &[CatalogService],
    category: ServiceCategory,
) -> Result<&CatalogService, CatalogError> {
    services
        .iter()
        .find(|service| service.active && service.category == category)
        .ok_or(CatalogError::MissingCategory(category))
}

/// Core hours multiplier in percent, starting from 100.
fn complexity_percent(record: &DiscoveryRecord, profile: &DiscoveryProfile) -> u32 {
    let notes = &record.notes;
    let mut percent = 100;
    if notes.integration_requirements.trim().chars().count() > INTEGRATION_DETAIL_CHARS {
        percent += 30;
    }
    if notes.compliance_requirements.trim().chars().count() > COMPLIANCE_DETAIL_CHARS {
        percent += 20;
    }
    if notes.security_requirements.trim().chars().count() > SECURITY_DETAIL_CHARS {
        percent += 20;
    }
    if profile.team_size_affected > LARGE_TEAM {
        percent += 30;
    }
    percent
}

/// Distinct keywords (single words or phrases) mentioned in free text.
pub fn detected_systems(text: &str, keywords: &[String]) -> BTreeSet<String> {
    let tokens: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect();
    if tokens.is_empty() {
        return BTreeSet::new();
    }
    let padded = format!(" {} ", tokens.join(" "));

    keywords
        .iter()
        .map(|keyword| keyword.trim().to_lowercase())
        .filter(|keyword| !keyword.is_empty())
        .filter(|keyword| {
            if keyword.contains(' ') {
                padded.contains(&format!(" {keyword} "))
            } else {
                tokens.iter().any(|token| token == keyword)
            }
        })
        .collect()
}
