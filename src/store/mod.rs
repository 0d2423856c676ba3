//! Persistence Collaborator
//!
//! One trait over the five entities, with transactional support for the
//! (status update, audit insert, outbox enqueue) triple and the
//! (snapshot insert, back-link update) pair. Two backends: in-memory
//! (tests, embedding) and SQLite.
//!
//! Conditional writes carry the concurrency model: status updates compare
//! against the expected prior status, deadline resolution only fires on
//! `sent` rows, action drafts are idempotent per (infringement, type).

pub mod memory;
pub mod sqlite;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::StoreError;
use crate::evidence::types::{AiEvidenceAnalysis, EvidenceJob, EvidenceSnapshot};
use crate::external::TimestampProof;
use crate::feedback::recorder::{LearningPattern, PatternKey, PatternOutcome};
use crate::lifecycle::types::{InfringementRecord, InfringementStatus, StatusTransition};
use crate::enforcement::types::EnforcementAction;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

// ============================================================================
// TRANSITION UPDATE
// ============================================================================

/// Field set applied by one committed transition
///
/// `expected_status` is the compare-and-swap guard: if the stored status
/// differs at commit time the whole unit of work aborts with `Conflict`.
#[derive(Debug, Clone)]
pub struct TransitionUpdate {
    pub expected_status: InfringementStatus,
    pub new_status: InfringementStatus,
    pub changed_at: DateTime<Utc>,
    /// Set on verify only
    pub verified_by: Option<Uuid>,
    /// Whitelist decisions add the source URL to the product's whitelist
    /// inside the same transaction; duplicate adds are no-ops.
    pub whitelist_url: Option<(Uuid, String)>,
}

// ============================================================================
// STORE TRAIT
// ============================================================================

pub trait Store: Send + Sync {
    // --- infringements -----------------------------------------------------

    /// Insert a freshly detected record. A reused id is `Duplicate`; a
    /// re-detection always gets a new record, never an overwrite.
    fn insert_infringement(&self, record: &InfringementRecord) -> Result<(), StoreError>;

    fn get_infringement(&self, id: Uuid) -> Result<InfringementRecord, StoreError>;

    /// Atomically: CAS the status (+ bookkeeping fields), append exactly one
    /// audit row, and optionally enqueue an evidence job. All or nothing.
    fn commit_transition(
        &self,
        update: &TransitionUpdate,
        audit: &StatusTransition,
        job: Option<&EvidenceJob>,
    ) -> Result<(), StoreError>;

    /// Audit rows for one infringement, oldest first
    fn list_transitions(&self, infringement_id: Uuid) -> Result<Vec<StatusTransition>, StoreError>;

    fn set_next_check(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError>;

    // --- whitelist ---------------------------------------------------------

    fn is_whitelisted(&self, product_id: Uuid, url: &str) -> Result<bool, StoreError>;

    // --- evidence snapshots ------------------------------------------------

    /// Atomically insert the snapshot and back-link it to the infringement.
    /// Fails with `AlreadyLinked` if the record already carries a snapshot.
    fn insert_snapshot(&self, snapshot: &EvidenceSnapshot) -> Result<(), StoreError>;

    fn get_snapshot(&self, id: Uuid) -> Result<EvidenceSnapshot, StoreError>;

    /// Additive AI-analysis patch; the snapshot itself stays immutable
    fn patch_snapshot_analysis(
        &self,
        snapshot_id: Uuid,
        analysis: &AiEvidenceAnalysis,
    ) -> Result<(), StoreError>;

    /// Replace the stored proof; notarization is eventually consistent and
    /// a pending proof may later be confirmed.
    fn update_snapshot_proof(
        &self,
        snapshot_id: Uuid,
        proof: &TimestampProof,
    ) -> Result<(), StoreError>;

    // --- evidence outbox ---------------------------------------------------

    /// Claim up to `limit` queued jobs, marking them running. Claims are
    /// exclusive: two concurrent claimers get disjoint sets.
    fn claim_evidence_jobs(&self, limit: usize) -> Result<Vec<EvidenceJob>, StoreError>;

    fn complete_evidence_job(&self, job_id: Uuid) -> Result<(), StoreError>;

    /// Requeue for another attempt, or mark failed when `retry` is false
    fn fail_evidence_job(&self, job_id: Uuid, error: &str, retry: bool) -> Result<(), StoreError>;

    // --- enforcement actions -----------------------------------------------

    /// Insert unless an active (non-terminal) action of the same type
    /// already exists for the infringement. Returns whether it inserted.
    fn insert_action_if_absent(&self, action: &EnforcementAction) -> Result<bool, StoreError>;

    fn get_actions(&self, infringement_id: Uuid) -> Result<Vec<EnforcementAction>, StoreError>;

    fn mark_action_sent(
        &self,
        action_id: Uuid,
        sent_at: DateTime<Utc>,
        deadline_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Actions with `status = sent` and `deadline_at <= now`
    fn list_overdue_sent(&self, now: DateTime<Utc>) -> Result<Vec<EnforcementAction>, StoreError>;

    /// Conditionally transition one action sent -> no_response, stamping
    /// `resolved_at`. Returns whether this call performed the transition.
    fn resolve_no_response(&self, action_id: Uuid, now: DateTime<Utc>) -> Result<bool, StoreError>;

    // --- review sweep ------------------------------------------------------

    /// Infringements in {active, takedown_sent} whose `next_check_at` has
    /// elapsed, ordered P0 first
    fn list_due_for_review(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<InfringementRecord>, StoreError>;

    // --- learning patterns -------------------------------------------------

    /// Upsert-increment one pattern, returning the updated aggregate
    fn record_pattern(
        &self,
        key: &PatternKey,
        outcome: PatternOutcome,
    ) -> Result<LearningPattern, StoreError>;

    fn get_pattern(&self, key: &PatternKey) -> Result<Option<LearningPattern>, StoreError>;
}
