//! Discovery call capture and qualification scoring.

pub mod domain;
pub mod scoring;

pub use domain::{
    BudgetRange, CompanySize, ContactInfo, DiscoveryId, DiscoveryNotes, DiscoveryProfile,
    DiscoveryRecord, Industry, QualificationStatus, RevenueBracket, TimelineUrgency,
    ValidationError,
};
pub use scoring::{QualificationScore, QualificationThresholds, ScoringEngine};
