use super::super::domain::{
    BudgetRange, CompanySize, DiscoveryProfile, Industry, TimelineUrgency,
};
use super::{ScoreComponent, ScoreFactor};
use crate::workflows::pricing::Money;

pub(crate) const SUB_SCORE_MAX: u8 = 10;

pub(crate) struct SubScores {
    pub pain: u8,
    pub budget_authority: u8,
    pub timeline_urgency: u8,
    pub technical_fit: u8,
}

impl SubScores {
    /// round(10 x mean of the four sub-scores), half rounded up.
    pub fn overall(&self) -> u8 {
        let sum = self.pain as u32
            + self.budget_authority as u32
            + self.timeline_urgency as u32
            + self.technical_fit as u32;
        ((sum * 10 + 2) / 4) as u8
    }
}

pub(crate) fn score_profile(profile: &DiscoveryProfile) -> (SubScores, Vec<ScoreComponent>) {
    let mut components = Vec::with_capacity(4);

    let pain = pain_score(
        profile.weekly_hours_wasted,
        profile.estimated_cost_inefficiency,
        profile.team_size_affected,
    );
    components.push(ScoreComponent {
        factor: ScoreFactor::Pain,
        score: pain,
        notes: format!(
            "{} hours/week wasted, {} annual inefficiency, {} people affected",
            profile.weekly_hours_wasted,
            profile.estimated_cost_inefficiency,
            profile.team_size_affected
        ),
    });

    let budget_authority = budget_authority_score(profile.budget_range, profile.has_decision_maker);
    components.push(ScoreComponent {
        factor: ScoreFactor::BudgetAuthority,
        score: budget_authority,
        notes: if profile.has_decision_maker {
            format!("budget {} with decision maker identified", profile.budget_range.label())
        } else {
            format!("budget {} without decision maker", profile.budget_range.label())
        },
    });

    let timeline_urgency = timeline_urgency_score(profile.timeline_urgency);
    components.push(ScoreComponent {
        factor: ScoreFactor::TimelineUrgency,
        score: timeline_urgency,
        notes: format!("timeline {}", profile.timeline_urgency.label()),
    });

    let technical_fit = technical_fit_score(profile.company_size, &profile.industry);
    components.push(ScoreComponent {
        factor: ScoreFactor::TechnicalFit,
        score: technical_fit,
        notes: format!(
            "{} employees in {}",
            profile.company_size.label(),
            profile.industry
        ),
    });

    let scores = SubScores {
        pain,
        budget_authority,
        timeline_urgency,
        technical_fit,
    };
    (scores, components)
}

pub(crate) fn pain_score(hours_wasted: u32, inefficiency: Money, team_size: u32) -> u8 {
    let hours = match hours_wasted {
        h if h > 20 => 5,
        h if h > 10 => 4,
        h if h > 5 => 2,
        h if h > 0 => 1,
        _ => 0,
    };

    let cost = match inefficiency {
        c if c > Money::from_dollars(100_000) => 3,
        c if c > Money::from_dollars(50_000) => 2,
        c if c > Money::from_dollars(10_000) => 1,
        _ => 0,
    };

    let team = match team_size {
        t if t > 10 => 2,
        t if t > 5 => 1,
        _ => 0,
    };

    (hours + cost + team).min(SUB_SCORE_MAX)
}

pub(crate) fn budget_authority_score(budget: BudgetRange, has_decision_maker: bool) -> u8 {
    let base = match budget {
        BudgetRange::NotDisclosed => 0,
        BudgetRange::Under25k => 2,
        BudgetRange::From25kTo50k => 4,
        BudgetRange::From50kTo100k => 6,
        BudgetRange::From100kTo250k => 8,
        BudgetRange::Over250k => 10,
    };
    let authority = if has_decision_maker { 2 } else { 0 };
    (base + authority).min(SUB_SCORE_MAX)
}

pub(crate) fn timeline_urgency_score(timeline: TimelineUrgency) -> u8 {
    match timeline {
        TimelineUrgency::Immediate => 10,
        TimelineUrgency::OneMonth => 8,
        TimelineUrgency::ThreeMonths => 6,
        TimelineUrgency::SixMonths => 4,
        TimelineUrgency::TwelveMonths => 2,
    }
}

/// Mid-market companies in the core verticals are the target profile.
pub(crate) fn technical_fit_score(size: CompanySize, industry: &Industry) -> u8 {
    let size_fit = match size {
        CompanySize::Micro => 1,
        CompanySize::Small => 2,
        CompanySize::Mid => 3,
        CompanySize::UpperMid => 2,
        CompanySize::Large | CompanySize::Enterprise => 1,
    };
    let industry_fit = match industry {
        Industry::Technology
        | Industry::ProfessionalServices
        | Industry::Healthcare
        | Industry::Finance
        | Industry::RealEstate => 2,
        _ => 0,
    };
    (5 + size_fit + industry_fit).min(SUB_SCORE_MAX)
}
