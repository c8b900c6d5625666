//! crates/model_test_core/src/answers.rs
//!
//! The local mirror of an attempt's answers, kept as an event log reconciled
//! against the last state the server is known to hold.
//!
//! Every selection is appended as an event and becomes visible immediately.
//! A background save later marks it `Synced` or `LocalOnly`; neither outcome
//! ever rolls the selection back, and the full visible map is what gets
//! submitted at the end.

use crate::domain::{AnswerMap, QuestionId};

/// Delivery state of a single answer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Pending,
    Synced,
    /// The save call failed; the answer only lives in this client until submit.
    LocalOnly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerEvent {
    pub seq: u64,
    pub question_id: QuestionId,
    pub choice: usize,
    pub status: SyncStatus,
}

#[derive(Debug, Default, Clone)]
pub struct AnswerLog {
    snapshot: AnswerMap,
    events: Vec<AnswerEvent>,
    next_seq: u64,
}

impl AnswerLog {
    /// Starts from answers the server already holds (empty for a new attempt).
    pub fn from_snapshot(snapshot: AnswerMap) -> Self {
        Self {
            snapshot,
            events: Vec::new(),
            next_seq: 0,
        }
    }

    /// Appends a selection and returns its sequence number.
    pub fn record(&mut self, question_id: QuestionId, choice: usize) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.events.push(AnswerEvent {
            seq,
            question_id,
            choice,
            status: SyncStatus::Pending,
        });
        seq
    }

    /// Marks the event as persisted. If it is still the newest selection for
    /// its question it becomes part of the server snapshot.
    pub fn mark_synced(&mut self, seq: u64) {
        let Some(event) = self.events.iter_mut().find(|e| e.seq == seq) else {
            return;
        };
        event.status = SyncStatus::Synced;
        let question_id = event.question_id.clone();
        let choice = event.choice;

        if self.latest_seq(&question_id) == Some(seq) {
            self.snapshot.insert(question_id.clone(), choice);
            self.events
                .retain(|e| e.question_id != question_id || e.seq > seq);
        }
    }

    /// Marks the event as not persisted. The selection stays visible.
    pub fn mark_local_only(&mut self, seq: u64) {
        if let Some(event) = self.events.iter_mut().find(|e| e.seq == seq) {
            event.status = SyncStatus::LocalOnly;
        }
    }

    /// The answers as the user currently sees them.
    pub fn current(&self) -> AnswerMap {
        let mut answers = self.snapshot.clone();
        for event in &self.events {
            answers.insert(event.question_id.clone(), event.choice);
        }
        answers
    }

    pub fn selected(&self, question_id: &QuestionId) -> Option<usize> {
        self.events
            .iter()
            .rev()
            .find(|e| &e.question_id == question_id)
            .map(|e| e.choice)
            .or_else(|| self.snapshot.get(question_id).copied())
    }

    /// Questions whose visible answer the server is not known to hold because
    /// the last save for them failed.
    pub fn local_only(&self) -> Vec<QuestionId> {
        let mut questions: Vec<QuestionId> = Vec::new();
        for event in &self.events {
            if self.latest_seq(&event.question_id) == Some(event.seq)
                && event.status == SyncStatus::LocalOnly
            {
                questions.push(event.question_id.clone());
            }
        }
        questions.sort();
        questions
    }

    pub fn pending_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| e.status == SyncStatus::Pending)
            .count()
    }

    pub fn answered_count(&self) -> usize {
        self.current().len()
    }

    pub fn events(&self) -> &[AnswerEvent] {
        &self.events
    }

    fn latest_seq(&self, question_id: &QuestionId) -> Option<u64> {
        self.events
            .iter()
            .filter(|e| &e.question_id == question_id)
            .map(|e| e.seq)
            .max()
    }
}
