//! Per-window submission bookkeeping.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rollcall_core::types::{AttendanceStatus, GeoPoint, ParticipantId};

/// One accepted submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub participant_id: ParticipantId,
    pub name: String,
    pub location: GeoPoint,
    pub distance_meters: f64,
    pub submitted_at: DateTime<Utc>,
    pub status: AttendanceStatus,
}

/// Who has submitted in the current window, and what they submitted.
///
/// The submitted set and the record map are only ever changed together,
/// so their key sets are always equal.
#[derive(Debug, Default)]
pub struct SubmissionLedger {
    submitted: HashSet<ParticipantId>,
    records: HashMap<ParticipantId, SubmissionRecord>,
    order: Vec<ParticipantId>,
}

impl SubmissionLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the participant already has an accepted submission.
    pub fn has_submitted(&self, participant: &ParticipantId) -> bool {
        self.submitted.contains(participant)
    }

    /// Record a submission. Returns `false`, leaving the existing record
    /// untouched, if the participant already submitted.
    pub fn insert(&mut self, record: SubmissionRecord) -> bool {
        if !self.submitted.insert(record.participant_id.clone()) {
            return false;
        }
        self.order.push(record.participant_id.clone());
        self.records.insert(record.participant_id.clone(), record);
        true
    }

    /// Records in acceptance order.
    pub fn records(&self) -> Vec<SubmissionRecord> {
        self.order
            .iter()
            .filter_map(|id| self.records.get(id).cloned())
            .collect()
    }

    /// Number of accepted submissions.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Forget every submission.
    pub fn reset(&mut self) {
        self.submitted.clear();
        self.records.clear();
        self.order.clear();
    }

    /// Load previously persisted records; participants already present
    /// are skipped. Returns how many were added.
    pub fn hydrate(&mut self, records: impl IntoIterator<Item = SubmissionRecord>) -> usize {
        records
            .into_iter()
            .map(|record| self.insert(record))
            .filter(|added| *added)
            .count()
    }

    /// The submitted set and the record map have identical keys.
    pub fn is_consistent(&self) -> bool {
        self.submitted.len() == self.records.len()
            && self.submitted.iter().all(|id| self.records.contains_key(id))
            && self.order.len() == self.records.len()
    }
}
