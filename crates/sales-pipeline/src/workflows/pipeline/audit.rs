use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::proposal::TransitionOutcome;
use super::state::{ProcessType, TriggerKind};
use crate::workflows::discovery::DiscoveryId;

pub const DEFAULT_QUERY_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Completed,
    Failed,
    ManualInterventionRequired,
    /// Repeat of an already completed transition; no side effects ran.
    Duplicate,
    /// Attempted from a state the transition table does not allow.
    Rejected,
    /// Operator restored the last stable state after a halt.
    Resumed,
}

impl EntryStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::ManualInterventionRequired => "manual_intervention_required",
            Self::Duplicate => "duplicate",
            Self::Rejected => "rejected",
            Self::Resumed => "resumed",
        }
    }
}

/// One transition attempt. Written once, never changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationLogEntry {
    pub entry_id: u64,
    pub deal_id: DiscoveryId,
    pub process: ProcessType,
    pub source_record_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_record_id: Option<String>,
    pub trigger: TriggerKind,
    pub action: String,
    pub status: EntryStatus,
    pub retry_count: u32,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<TransitionOutcome>,
}

/// Fields for an entry that has not been appended yet.
#[derive(Debug, Clone)]
pub struct NewLogEntry {
    pub deal_id: DiscoveryId,
    pub process: ProcessType,
    pub source_record_id: String,
    pub target_record_id: Option<String>,
    pub trigger: TriggerKind,
    pub action: String,
    pub status: EntryStatus,
    pub retry_count: u32,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub outcome: Option<TransitionOutcome>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditQuery {
    #[serde(default)]
    pub deal_id: Option<DiscoveryId>,
    #[serde(default)]
    pub process: Option<ProcessType>,
    #[serde(default)]
    pub status: Option<EntryStatus>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Append-only arena of log entries, indexed by deal and by completed idempotency key.
/// Idempotency keys are scoped to their deal; provider ids may repeat across deals.
#[derive(Debug, Default)]
pub struct AuditLog {
    entries: Vec<AutomationLogEntry>,
    by_deal: HashMap<DiscoveryId, Vec<usize>>,
    completed: HashMap<(DiscoveryId, ProcessType, String), usize>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, entry: NewLogEntry) -> &AutomationLogEntry {
        let index = self.entries.len();
        let record = AutomationLogEntry {
            entry_id: index as u64 + 1,
            deal_id: entry.deal_id,
            process: entry.process,
            source_record_id: entry.source_record_id,
            target_record_id: entry.target_record_id,
            trigger: entry.trigger,
            action: entry.action,
            status: entry.status,
            retry_count: entry.retry_count,
            started_at: entry.started_at,
            duration_ms: entry.duration_ms,
            error: entry.error,
            outcome: entry.outcome,
        };

        self.by_deal
            .entry(record.deal_id.clone())
            .or_default()
            .push(index);
        if record.status == EntryStatus::Completed {
            self.completed
                .entry((
                    record.deal_id.clone(),
                    record.process,
                    record.source_record_id.clone(),
                ))
                .or_insert(index);
        }
        self.entries.push(record);
        &self.entries[index]
    }

    /// The deal's first completed entry for the idempotency key, if any.
    pub fn completed(
        &self,
        deal_id: &DiscoveryId,
        process: ProcessType,
        source_record_id: &str,
    ) -> Option<&AutomationLogEntry> {
        self.completed
            .get(&(deal_id.clone(), process, source_record_id.to_string()))
            .map(|index| &self.entries[*index])
    }

    pub fn for_deal(&self, deal_id: &DiscoveryId) -> Vec<&AutomationLogEntry> {
        self.by_deal
            .get(deal_id)
            .map(|indexes| indexes.iter().map(|index| &self.entries[*index]).collect())
            .unwrap_or_default()
    }

    pub fn entries(&self) -> &[AutomationLogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Matching entries, most recent first, capped at [`DEFAULT_QUERY_LIMIT`].
    pub fn query(&self, query: &AuditQuery) -> Vec<AutomationLogEntry> {
        let limit = query
            .limit
            .unwrap_or(DEFAULT_QUERY_LIMIT)
            .min(DEFAULT_QUERY_LIMIT);
        let candidates: Box<dyn Iterator<Item = &AutomationLogEntry> + '_> = match &query.deal_id {
            Some(deal_id) => Box::new(self.for_deal(deal_id).into_iter()),
            None => Box::new(self.entries.iter()),
        };

        let mut matched: Vec<AutomationLogEntry> = candidates
            .filter(|entry| query.process.map_or(true, |process| entry.process == process))
            .filter(|entry| query.status.map_or(true, |status| entry.status == status))
            .cloned()
            .collect();
        matched.reverse();
        matched.truncate(limit);
        matched
    }
}
