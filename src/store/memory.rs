//! In-Memory Store
//!
//! Backs tests and single-process embeddings. One mutex around the whole
//! state: every trait method is one critical section, which is exactly the
//! transactional behavior the trait demands.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::errors::StoreError;
use crate::evidence::types::{AiEvidenceAnalysis, EvidenceJob, EvidenceSnapshot};
use crate::external::TimestampProof;
use crate::feedback::recorder::{LearningPattern, PatternKey, PatternOutcome};
use crate::lifecycle::types::{InfringementRecord, InfringementStatus, StatusTransition};
use crate::enforcement::types::{ActionStatus, EnforcementAction};

use super::{Store, TransitionUpdate};

// ============================================================================
// STATE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobState {
    Queued,
    Running,
    Done,
    Failed,
}

struct JobRow {
    job: EvidenceJob,
    state: JobState,
    last_error: Option<String>,
}

#[derive(Default)]
struct Inner {
    infringements: HashMap<Uuid, InfringementRecord>,
    transitions: Vec<StatusTransition>,
    whitelist: HashSet<(Uuid, String)>,
    snapshots: HashMap<Uuid, EvidenceSnapshot>,
    jobs: Vec<JobRow>,
    actions: HashMap<Uuid, EnforcementAction>,
    patterns: HashMap<PatternKey, LearningPattern>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queued-job count, for tests and worker backoff decisions
    pub fn queued_jobs(&self) -> usize {
        self.inner
            .lock()
            .jobs
            .iter()
            .filter(|r| r.state == JobState::Queued)
            .count()
    }
}

// ============================================================================
// STORE IMPL
// ============================================================================

impl Store for MemoryStore {
    fn insert_infringement(&self, record: &InfringementRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if inner.infringements.contains_key(&record.id) {
            return Err(StoreError::Duplicate {
                entity: "infringement".to_string(),
                id: record.id.to_string(),
            });
        }
        inner.infringements.insert(record.id, record.clone());
        Ok(())
    }

    fn get_infringement(&self, id: Uuid) -> Result<InfringementRecord, StoreError> {
        self.inner
            .lock()
            .infringements
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound { entity: "infringement".to_string(), id: id.to_string() })
    }

    fn commit_transition(
        &self,
        update: &TransitionUpdate,
        audit: &StatusTransition,
        job: Option<&EvidenceJob>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();

        let record = inner
            .infringements
            .get_mut(&audit.infringement_id)
            .ok_or(StoreError::NotFound {
                entity: "infringement".to_string(),
                id: audit.infringement_id.to_string(),
            })?;

        if record.status != update.expected_status {
            return Err(StoreError::Conflict {
                expected: update.expected_status.to_string(),
                actual: record.status.to_string(),
            });
        }

        record.previous_status = Some(record.status);
        record.status = update.new_status;
        record.status_changed_at = Some(update.changed_at);
        if let Some(user_id) = update.verified_by {
            record.verified_by_user_id = Some(user_id);
            record.verified_at = Some(update.changed_at);
        }

        inner.transitions.push(audit.clone());

        if let Some((product_id, url)) = &update.whitelist_url {
            inner.whitelist.insert((*product_id, url.clone()));
        }

        if let Some(job) = job {
            inner.jobs.push(JobRow {
                job: job.clone(),
                state: JobState::Queued,
                last_error: None,
            });
        }

        Ok(())
    }

    fn list_transitions(&self, infringement_id: Uuid) -> Result<Vec<StatusTransition>, StoreError> {
        Ok(self
            .inner
            .lock()
            .transitions
            .iter()
            .filter(|t| t.infringement_id == infringement_id)
            .cloned()
            .collect())
    }

    fn set_next_check(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let record = inner
            .infringements
            .get_mut(&id)
            .ok_or(StoreError::NotFound { entity: "infringement".to_string(), id: id.to_string() })?;
        record.next_check_at = at;
        Ok(())
    }

    fn is_whitelisted(&self, product_id: Uuid, url: &str) -> Result<bool, StoreError> {
        Ok(self.inner.lock().whitelist.contains(&(product_id, url.to_string())))
    }

    fn insert_snapshot(&self, snapshot: &EvidenceSnapshot) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();

        let record = inner
            .infringements
            .get_mut(&snapshot.infringement_id)
            .ok_or(StoreError::NotFound {
                entity: "infringement".to_string(),
                id: snapshot.infringement_id.to_string(),
            })?;

        if record.evidence_snapshot_id.is_some() {
            return Err(StoreError::AlreadyLinked {
                entity: "infringement".to_string(),
                id: record.id.to_string(),
            });
        }

        record.evidence_snapshot_id = Some(snapshot.id);
        inner.snapshots.insert(snapshot.id, snapshot.clone());
        Ok(())
    }

    fn get_snapshot(&self, id: Uuid) -> Result<EvidenceSnapshot, StoreError> {
        self.inner
            .lock()
            .snapshots
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound { entity: "evidence_snapshot".to_string(), id: id.to_string() })
    }

    fn patch_snapshot_analysis(
        &self,
        snapshot_id: Uuid,
        analysis: &AiEvidenceAnalysis,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let snapshot = inner.snapshots.get_mut(&snapshot_id).ok_or(StoreError::NotFound {
            entity: "evidence_snapshot".to_string(),
            id: snapshot_id.to_string(),
        })?;
        snapshot.ai_analysis = Some(analysis.clone());
        Ok(())
    }

    fn update_snapshot_proof(
        &self,
        snapshot_id: Uuid,
        proof: &TimestampProof,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let snapshot = inner.snapshots.get_mut(&snapshot_id).ok_or(StoreError::NotFound {
            entity: "evidence_snapshot".to_string(),
            id: snapshot_id.to_string(),
        })?;
        snapshot.timestamp_proof = Some(proof.clone());
        Ok(())
    }

    fn claim_evidence_jobs(&self, limit: usize) -> Result<Vec<EvidenceJob>, StoreError> {
        let mut inner = self.inner.lock();
        let mut claimed = Vec::new();
        for row in inner.jobs.iter_mut() {
            if claimed.len() >= limit {
                break;
            }
            if row.state == JobState::Queued {
                row.state = JobState::Running;
                row.job.attempts += 1;
                claimed.push(row.job.clone());
            }
        }
        Ok(claimed)
    }

    fn complete_evidence_job(&self, job_id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let row = inner
            .jobs
            .iter_mut()
            .find(|r| r.job.id == job_id)
            .ok_or(StoreError::NotFound { entity: "evidence_job".to_string(), id: job_id.to_string() })?;
        row.state = JobState::Done;
        Ok(())
    }

    fn fail_evidence_job(&self, job_id: Uuid, error: &str, retry: bool) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let row = inner
            .jobs
            .iter_mut()
            .find(|r| r.job.id == job_id)
            .ok_or(StoreError::NotFound { entity: "evidence_job".to_string(), id: job_id.to_string() })?;
        row.state = if retry { JobState::Queued } else { JobState::Failed };
        row.last_error = Some(error.to_string());
        Ok(())
    }

    fn insert_action_if_absent(&self, action: &EnforcementAction) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        let duplicate = inner.actions.values().any(|a| {
            a.infringement_id == action.infringement_id
                && a.action_type == action.action_type
                && !a.status.is_terminal()
        });
        if duplicate {
            return Ok(false);
        }
        inner.actions.insert(action.id, action.clone());
        Ok(true)
    }

    fn get_actions(&self, infringement_id: Uuid) -> Result<Vec<EnforcementAction>, StoreError> {
        let inner = self.inner.lock();
        let mut actions: Vec<EnforcementAction> = inner
            .actions
            .values()
            .filter(|a| a.infringement_id == infringement_id)
            .cloned()
            .collect();
        actions.sort_by_key(|a| a.created_at);
        Ok(actions)
    }

    fn mark_action_sent(
        &self,
        action_id: Uuid,
        sent_at: DateTime<Utc>,
        deadline_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let action = inner.actions.get_mut(&action_id).ok_or(StoreError::NotFound {
            entity: "enforcement_action".to_string(),
            id: action_id.to_string(),
        })?;
        action.status = ActionStatus::Sent;
        action.sent_at = Some(sent_at);
        action.deadline_at = Some(deadline_at);
        Ok(())
    }

    fn list_overdue_sent(&self, now: DateTime<Utc>) -> Result<Vec<EnforcementAction>, StoreError> {
        Ok(self
            .inner
            .lock()
            .actions
            .values()
            .filter(|a| {
                a.status == ActionStatus::Sent
                    && a.deadline_at.map(|d| d <= now).unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    fn resolve_no_response(&self, action_id: Uuid, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        let action = inner.actions.get_mut(&action_id).ok_or(StoreError::NotFound {
            entity: "enforcement_action".to_string(),
            id: action_id.to_string(),
        })?;
        if action.status != ActionStatus::Sent {
            return Ok(false);
        }
        action.status = ActionStatus::NoResponse;
        action.resolved_at = Some(now);
        Ok(true)
    }

    fn list_due_for_review(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<InfringementRecord>, StoreError> {
        let inner = self.inner.lock();
        let mut due: Vec<InfringementRecord> = inner
            .infringements
            .values()
            .filter(|r| {
                matches!(
                    r.status,
                    InfringementStatus::Active | InfringementStatus::TakedownSent
                ) && r.next_check_at <= now
            })
            .cloned()
            .collect();
        due.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(a.next_check_at.cmp(&b.next_check_at))
        });
        due.truncate(limit);
        Ok(due)
    }

    fn record_pattern(
        &self,
        key: &PatternKey,
        outcome: PatternOutcome,
    ) -> Result<LearningPattern, StoreError> {
        let mut inner = self.inner.lock();
        let pattern = inner
            .patterns
            .entry(key.clone())
            .and_modify(|p| p.apply(outcome))
            .or_insert_with(|| LearningPattern::first(key, outcome));
        Ok(pattern.clone())
    }

    fn get_pattern(&self, key: &PatternKey) -> Result<Option<LearningPattern>, StoreError> {
        Ok(self.inner.lock().patterns.get(key).cloned())
    }
}

// ============================================================================
// TESTS
// ============================================================================
