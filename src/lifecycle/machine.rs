//! Lifecycle State Machine
//!
//! The only writer of `InfringementRecord::status`. Every committed
//! transition pairs the status update with exactly one audit row and,
//! for verify, the evidence outbox job - one transaction, all or nothing.
//!
//! The caller gets success as soon as that transaction is durable.
//! Feedback recording and CRM events run after commit and are best-effort:
//! logged on failure, never surfaced, never able to undo the transition.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{StoreError, TransitionError};
use crate::evidence::types::EvidenceJob;
use crate::external::{events, Authorizer, EventSink};
use crate::feedback::FeedbackRecorder;
use crate::store::{Store, TransitionUpdate};

use super::types::{
    Actor, InfringementRecord, InfringementStatus, ReviewDecision, StatusTransition, TriggeredBy,
};

// ============================================================================
// OUTCOME
// ============================================================================

/// What a successful transition did. Evidence work is reported as
/// scheduled, not done - it runs out-of-band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub infringement_id: Uuid,
    pub from_status: InfringementStatus,
    pub to_status: InfringementStatus,
    pub transition_id: Uuid,
    pub evidence_scheduled: bool,
}

// ============================================================================
// ENGINE
// ============================================================================

pub struct LifecycleEngine {
    store: Arc<dyn Store>,
    authorizer: Arc<dyn Authorizer>,
    sink: Arc<dyn EventSink>,
    feedback: FeedbackRecorder,
}

impl LifecycleEngine {
    pub fn new(
        store: Arc<dyn Store>,
        authorizer: Arc<dyn Authorizer>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let feedback = FeedbackRecorder::new(store.clone());
        Self { store, authorizer, sink, feedback }
    }

    /// Apply one reviewer decision to an infringement
    ///
    /// Validation and authorization reject before any write. The commit is
    /// a compare-and-swap on the status read here, so two racing reviewers
    /// produce one transition and one clean `Conflict` failure.
    pub fn transition(
        &self,
        infringement_id: Uuid,
        decision: ReviewDecision,
        actor: &Actor,
    ) -> Result<TransitionOutcome, TransitionError> {
        let record = match self.store.get_infringement(infringement_id) {
            Ok(record) => record,
            Err(StoreError::NotFound { .. }) => {
                return Err(TransitionError::Validation {
                    reason: format!("unknown infringement {}", infringement_id),
                })
            }
            Err(e) => return Err(e.into()),
        };

        validate_decision(&record, decision)?;
        self.authorize(&record, actor)?;

        let now = Utc::now();
        let to_status = decision.target_status();

        let job = match decision {
            ReviewDecision::Verify => Some(EvidenceJob::new(record.id, actor.clone(), now)),
            _ => None,
        };

        let update = TransitionUpdate {
            expected_status: record.status,
            new_status: to_status,
            changed_at: now,
            verified_by: matches!(decision, ReviewDecision::Verify).then_some(actor.user_id),
            whitelist_url: matches!(decision, ReviewDecision::Whitelist)
                .then(|| (record.product_id, record.source_url.clone())),
        };

        let audit = StatusTransition {
            id: Uuid::new_v4(),
            infringement_id: record.id,
            from_status: record.status,
            to_status,
            reason: decision_reason(decision),
            triggered_by: TriggeredBy::User,
            metadata: serde_json::json!({
                "decision": decision.as_str(),
                "actor_id": actor.user_id,
                "source_url": record.source_url,
                "platform": record.platform,
            }),
            created_at: now,
        };

        self.store.commit_transition(&update, &audit, job.as_ref())?;

        log::info!(
            "Infringement {} transitioned {} -> {} ({})",
            record.id,
            record.status,
            to_status,
            decision
        );

        self.run_post_commit_hooks(&record, decision);

        Ok(TransitionOutcome {
            infringement_id: record.id,
            from_status: record.status,
            to_status,
            transition_id: audit.id,
            evidence_scheduled: job.is_some(),
        })
    }

    fn authorize(&self, record: &InfringementRecord, actor: &Actor) -> Result<(), TransitionError> {
        match self.authorizer.actor_owns_product(actor.user_id, record.product_id) {
            Ok(true) => Ok(()),
            Ok(false) => Err(TransitionError::Authorization {
                actor_id: actor.user_id.to_string(),
                reason: format!("does not own product {}", record.product_id),
            }),
            // Fail closed: an unreachable authorizer denies.
            Err(e) => Err(TransitionError::Authorization {
                actor_id: actor.user_id.to_string(),
                reason: format!("authorization check failed: {}", e),
            }),
        }
    }

    fn run_post_commit_hooks(&self, record: &InfringementRecord, decision: ReviewDecision) {
        if let Err(e) = self.feedback.record_outcome(record, decision) {
            log::warn!("Feedback recording failed for {}: {}", record.id, e);
        }

        let event = match decision {
            ReviewDecision::Verify => events::INFRINGEMENT_VERIFIED,
            ReviewDecision::Reject => events::INFRINGEMENT_REJECTED,
            ReviewDecision::Whitelist => events::INFRINGEMENT_WHITELISTED,
        };
        self.sink.emit(
            event,
            serde_json::json!({
                "infringement_id": record.id,
                "product_id": record.product_id,
                "source_url": record.source_url,
                "priority": record.priority,
            }),
        );
    }
}

// ============================================================================
// VALIDATION
// ============================================================================

fn validate_decision(
    record: &InfringementRecord,
    decision: ReviewDecision,
) -> Result<(), TransitionError> {
    if record.status.is_terminal() {
        return Err(TransitionError::Validation {
            reason: format!("infringement {} is terminal ({})", record.id, record.status),
        });
    }

    let allowed = match decision {
        ReviewDecision::Verify | ReviewDecision::Reject => {
            record.status == InfringementStatus::PendingVerification
        }
        ReviewDecision::Whitelist => matches!(
            record.status,
            InfringementStatus::PendingVerification | InfringementStatus::Active
        ),
    };

    if !allowed {
        return Err(TransitionError::Validation {
            reason: format!("cannot {} an infringement in status {}", decision, record.status),
        });
    }
    Ok(())
}

/// Human-readable audit reason for a decision
fn decision_reason(decision: ReviewDecision) -> String {
    match decision {
        ReviewDecision::Verify => "verified as infringing by reviewer".to_string(),
        ReviewDecision::Reject => "rejected as false positive by reviewer".to_string(),
        ReviewDecision::Whitelist => "source whitelisted by reviewer".to_string(),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CollaboratorError;
    use crate::external::{AllowAllAuthorizer, NullEventSink};
    use crate::scoring::Priority;
    use crate::store::MemoryStore;

    struct DenyAll;
    impl Authorizer for DenyAll {
        fn actor_owns_product(&self, _: Uuid, _: Uuid) -> Result<bool, CollaboratorError> {
            Ok(false)
        }
    }

    fn engine_with_store() -> (Arc<MemoryStore>, LifecycleEngine) {
        let store = Arc::new(MemoryStore::new());
        let engine = LifecycleEngine::new(
            store.clone(),
            Arc::new(AllowAllAuthorizer),
            Arc::new(NullEventSink),
        );
        (store, engine)
    }

    fn seeded_record(store: &MemoryStore) -> InfringementRecord {
        let now = Utc::now();
        let record = InfringementRecord {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            source_url: "https://forum.example.org/thread/9".to_string(),
            platform: "forum".to_string(),
            status: InfringementStatus::PendingVerification,
            priority: Priority::P1,
            severity_score: 55,
            match_confidence: 0.7,
            audience_count: 2_000,
            monetization_detected: false,
            infrastructure: Default::default(),
            raw_matches: vec![],
            first_seen_at: now,
            last_seen_at: now,
            next_check_at: now,
            previous_status: None,
            status_changed_at: None,
            verified_by_user_id: None,
            verified_at: None,
            evidence_snapshot_id: None,
        };
        store.insert_infringement(&record).unwrap();
        record
    }

    #[test]
    fn verify_activates_and_audits_once() {
        let (store, engine) = engine_with_store();
        let record = seeded_record(&store);
        let actor = Actor::new(Uuid::new_v4());

        let outcome = engine.transition(record.id, ReviewDecision::Verify, &actor).unwrap();
        assert_eq!(outcome.from_status, InfringementStatus::PendingVerification);
        assert_eq!(outcome.to_status, InfringementStatus::Active);
        assert!(outcome.evidence_scheduled);

        let loaded = store.get_infringement(record.id).unwrap();
        assert_eq!(loaded.status, InfringementStatus::Active);
        assert_eq!(loaded.previous_status, Some(InfringementStatus::PendingVerification));
        assert_eq!(loaded.verified_by_user_id, Some(actor.user_id));
        assert!(loaded.status_changed_at.is_some());

        let audit = store.list_transitions(record.id).unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].from_status, InfringementStatus::PendingVerification);
        assert_eq!(audit[0].to_status, InfringementStatus::Active);

        // Verify also queued the evidence job.
        assert_eq!(store.queued_jobs(), 1);
    }

    #[test]
    fn reject_marks_false_positive_without_evidence_job() {
        let (store, engine) = engine_with_store();
        let record = seeded_record(&store);

        let outcome = engine
            .transition(record.id, ReviewDecision::Reject, &Actor::new(Uuid::new_v4()))
            .unwrap();
        assert_eq!(outcome.to_status, InfringementStatus::FalsePositive);
        assert!(!outcome.evidence_scheduled);
        assert_eq!(store.queued_jobs(), 0);
    }

    #[test]
    fn whitelist_is_idempotent_on_the_url() {
        let (store, engine) = engine_with_store();
        let record = seeded_record(&store);
        let actor = Actor::new(Uuid::new_v4());

        engine.transition(record.id, ReviewDecision::Whitelist, &actor).unwrap();
        assert!(store.is_whitelisted(record.product_id, &record.source_url).unwrap());

        // The record is terminal now; a second whitelist is a clean
        // validation failure and the whitelist set is unchanged.
        let err = engine
            .transition(record.id, ReviewDecision::Whitelist, &actor)
            .unwrap_err();
        assert!(matches!(err, TransitionError::Validation { .. }));
        assert!(store.is_whitelisted(record.product_id, &record.source_url).unwrap());
        assert_eq!(store.list_transitions(record.id).unwrap().len(), 1);
    }

    #[test]
    fn unauthorized_actor_causes_no_write() {
        let store = Arc::new(MemoryStore::new());
        let engine = LifecycleEngine::new(
            store.clone(),
            Arc::new(DenyAll),
            Arc::new(NullEventSink),
        );
        let record = seeded_record(&store);

        let err = engine
            .transition(record.id, ReviewDecision::Verify, &Actor::new(Uuid::new_v4()))
            .unwrap_err();
        assert!(matches!(err, TransitionError::Authorization { .. }));

        let loaded = store.get_infringement(record.id).unwrap();
        assert_eq!(loaded.status, InfringementStatus::PendingVerification);
        assert!(store.list_transitions(record.id).unwrap().is_empty());
        assert_eq!(store.queued_jobs(), 0);
    }

    #[test]
    fn verify_records_positive_feedback() {
        let (store, engine) = engine_with_store();
        let record = seeded_record(&store);

        engine
            .transition(record.id, ReviewDecision::Verify, &Actor::new(Uuid::new_v4()))
            .unwrap();

        let key = crate::feedback::PatternKey::new("platform", "forum", record.product_id);
        let pattern = store.get_pattern(&key).unwrap().expect("pattern recorded");
        assert_eq!(pattern.occurrences, 1);
        assert_eq!(pattern.verified_count, 1);
    }

    #[test]
    fn audit_reason_names_the_decision() {
        let (store, engine) = engine_with_store();
        let record = seeded_record(&store);

        engine
            .transition(record.id, ReviewDecision::Verify, &Actor::new(Uuid::new_v4()))
            .unwrap();

        let audit = store.list_transitions(record.id).unwrap();
        assert_eq!(audit[0].reason, "verified as infringing by reviewer");

        let rejected = seeded_record(&store);
        engine
            .transition(rejected.id, ReviewDecision::Reject, &Actor::new(Uuid::new_v4()))
            .unwrap();
        let audit = store.list_transitions(rejected.id).unwrap();
        assert_eq!(audit[0].reason, "rejected as false positive by reviewer");
    }

    #[test]
    fn unknown_record_is_a_validation_error() {
        let (_, engine) = engine_with_store();
        let err = engine
            .transition(Uuid::new_v4(), ReviewDecision::Verify, &Actor::new(Uuid::new_v4()))
            .unwrap_err();
        assert!(matches!(err, TransitionError::Validation { .. }));
    }
}
