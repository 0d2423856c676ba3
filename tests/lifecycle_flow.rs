//! End-to-end lifecycle flow against the SQLite backend: score a detected
//! candidate, verify it, let the worker preserve evidence, dispatch a
//! takedown and watch the deadline sweep escalate it.

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use takedown_core::enforcement::{
    ActionStatus, ActionType, DeadlineSweeper, EnforcementAction, EscalationConfig, ReviewSweeper,
};
use takedown_core::errors::CollaboratorError;
use takedown_core::evidence::pipeline::{EvidencePipeline, PipelineConfig};
use takedown_core::evidence::worker::{EvidenceWorker, WorkerConfig};
use takedown_core::external::{
    AllowAllAuthorizer, CapturedPage, ComparisonMatch, ContentComparer, NotaryProvider,
    NullEventSink, PageCaptureProvider, ProofStatus, TimestampProof,
};
use takedown_core::lifecycle::types::{Actor, RawMatch, ReviewDecision};
use takedown_core::lifecycle::{InfringementRecord, InfringementStatus, LifecycleEngine};
use takedown_core::scoring::{score, ScoreInput, ScoringConfig};
use takedown_core::store::{SqliteStore, Store};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// COLLABORATOR DOUBLES
// ============================================================================

struct StubCollaborators;

impl PageCaptureProvider for StubCollaborators {
    fn capture(&self, url: &str) -> Result<CapturedPage, CollaboratorError> {
        Ok(CapturedPage {
            html_hash: "9f2c".to_string(),
            text: format!("full course leaked here, grab it while it lasts ({})", url),
            links: vec!["https://cdn.example.net/dl/1".to_string()],
            archive_url: Some("https://archive.example.org/abc".to_string()),
            captured_at: Utc::now(),
        })
    }
}

impl NotaryProvider for StubCollaborators {
    fn notarize(&self, content_hash: &str) -> Result<TimestampProof, CollaboratorError> {
        Ok(TimestampProof {
            status: ProofStatus::Pending,
            proof: format!("ots:{}", content_hash),
            verification_url: None,
            issued_at: Utc::now(),
        })
    }
}

impl ContentComparer for StubCollaborators {
    fn compare(
        &self,
        original_text: &str,
        _captured_text: &str,
    ) -> Result<Vec<ComparisonMatch>, CollaboratorError> {
        Ok(vec![ComparisonMatch {
            match_type: "verbatim".to_string(),
            original: original_text.to_string(),
            infringing: "full course leaked here".to_string(),
            confidence: 0.93,
            legal_significance: "substantial similarity".to_string(),
            explanation: "verbatim excerpt of protected module text".to_string(),
        }])
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn seeded_infringement(store: &dyn Store) -> InfringementRecord {
    let now = Utc::now();

    let input = ScoreInput {
        match_confidence: 0.88,
        platform: "telegram".to_string(),
        audience_count: 12_400,
        monetization_detected: true,
        estimated_revenue_loss: 1_800.0,
        country: Some("RU".to_string()),
    };
    let severity = score(&input);

    let record = InfringementRecord {
        id: Uuid::new_v4(),
        product_id: Uuid::new_v4(),
        source_url: "https://t.example.me/leaks/42".to_string(),
        platform: input.platform.clone(),
        status: InfringementStatus::PendingVerification,
        priority: severity.priority,
        severity_score: severity.score,
        match_confidence: input.match_confidence,
        audience_count: input.audience_count,
        monetization_detected: input.monetization_detected,
        infrastructure: Default::default(),
        raw_matches: vec![RawMatch {
            kind: "excerpt".to_string(),
            original_excerpt: "Module 3: pricing psychology in depth".to_string(),
            matched_text: "Module 3 pricing psychology".to_string(),
            confidence: 0.9,
        }],
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

fn pipeline_for(store: Arc<SqliteStore>) -> Arc<EvidencePipeline> {
    Arc::new(EvidencePipeline::new(
        store,
        Arc::new(StubCollaborators),
        Arc::new(StubCollaborators),
        Arc::new(StubCollaborators),
        Arc::new(NullEventSink),
        PipelineConfig::default(),
    ))
}

// ============================================================================
// FLOW
// ============================================================================

#[tokio::test]
async fn verify_preserve_dispatch_escalate() {
    init_logging();

    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let record = seeded_infringement(store.as_ref());

    // A monetized, high-confidence telegram hit with a 12k audience
    // lands in the top priority band.
    assert_eq!(record.priority, takedown_core::scoring::Priority::P0);

    // --- Review: verify -----------------------------------------------------
    let engine = LifecycleEngine::new(
        store.clone(),
        Arc::new(AllowAllAuthorizer),
        Arc::new(NullEventSink),
    );
    let actor = Actor::new(Uuid::new_v4());
    let outcome = engine
        .transition(record.id, ReviewDecision::Verify, &actor)
        .unwrap();
    assert_eq!(outcome.to_status, InfringementStatus::Active);
    assert!(outcome.evidence_scheduled);

    // --- Evidence: worker drains the outbox ---------------------------------
    let worker = EvidenceWorker::new(
        store.clone(),
        pipeline_for(store.clone()),
        WorkerConfig::default(),
    );
    assert_eq!(worker.drain_once().await.unwrap(), 1);
    assert_eq!(worker.drain_once().await.unwrap(), 0);

    let active = store.get_infringement(record.id).unwrap();
    let snapshot = store
        .get_snapshot(active.evidence_snapshot_id.expect("snapshot linked"))
        .unwrap();
    assert_eq!(snapshot.content_hash.len(), 64);
    assert!(snapshot.timestamp_proof.is_some());
    let analysis = snapshot.ai_analysis.expect("comparison ran");
    assert_eq!(analysis.matches.len(), 1);
    assert_eq!(snapshot.chain_of_custody.len(), 3);

    // A later confirmation from the notary patches the stored proof.
    let confirmed = TimestampProof {
        status: ProofStatus::Confirmed,
        ..snapshot.timestamp_proof.clone().unwrap()
    };
    store.update_snapshot_proof(snapshot.id, &confirmed).unwrap();
    let patched = store.get_snapshot(snapshot.id).unwrap();
    assert_eq!(patched.timestamp_proof.unwrap().status, ProofStatus::Confirmed);

    // --- Enforcement: dispatch, miss the deadline, escalate -----------------
    let sweeper = DeadlineSweeper::new(
        store.clone(),
        Arc::new(NullEventSink),
        EscalationConfig::default(),
    );

    let now = Utc::now();
    let action = EnforcementAction::draft(record.id, ActionType::DmcaPlatform, now);
    assert!(store.insert_action_if_absent(&action).unwrap());
    let deadline = sweeper.dispatch(&action, now).unwrap();
    assert_eq!(deadline, now + Duration::days(14));

    // One day past the deadline the sweep resolves the notice and drafts
    // the next step in the chain.
    let report = sweeper.sweep(deadline + Duration::days(1)).unwrap();
    assert_eq!(report.resolved, vec![action.id]);
    assert_eq!(report.proposals.len(), 1);
    assert_eq!(report.proposals[0].proposed_type, ActionType::DmcaHost);
    assert_eq!(report.drafts_created.len(), 1);

    let actions = store.get_actions(record.id).unwrap();
    assert_eq!(actions.len(), 2);
    let original = actions.iter().find(|a| a.id == action.id).unwrap();
    assert_eq!(original.status, ActionStatus::NoResponse);
    let draft = actions.iter().find(|a| a.id != action.id).unwrap();
    assert_eq!(draft.action_type, ActionType::DmcaHost);
    assert_eq!(draft.status, ActionStatus::Draft);
    assert_eq!(draft.escalation_step, 2);

    // A second sweep at the same instant does nothing new.
    let rerun = sweeper.sweep(deadline + Duration::days(1)).unwrap();
    assert!(rerun.resolved.is_empty());
    assert!(rerun.proposals.is_empty());
}

#[tokio::test]
async fn review_sweep_reschedules_active_records() {
    init_logging();

    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let record = seeded_infringement(store.as_ref());

    let engine = LifecycleEngine::new(
        store.clone(),
        Arc::new(AllowAllAuthorizer),
        Arc::new(NullEventSink),
    );
    engine
        .transition(record.id, ReviewDecision::Verify, &Actor::new(Uuid::new_v4()))
        .unwrap();

    let sweeper = ReviewSweeper::new(store.clone(), ScoringConfig::default());
    let now = Utc::now();

    let due = sweeper.sweep(now, 50).unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].infringement_id, record.id);

    // P0 records come back every day; the record was pushed forward and
    // an immediate re-sweep finds nothing.
    assert!(sweeper.sweep(now, 50).unwrap().is_empty());
    let rescheduled = store.get_infringement(record.id).unwrap();
    assert_eq!(rescheduled.next_check_at, now + Duration::days(1));
}

#[test]
fn rejected_record_stays_out_of_every_queue() {
    init_logging();

    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let record = seeded_infringement(store.as_ref());

    let engine = LifecycleEngine::new(
        store.clone(),
        Arc::new(AllowAllAuthorizer),
        Arc::new(NullEventSink),
    );
    engine
        .transition(record.id, ReviewDecision::Reject, &Actor::new(Uuid::new_v4()))
        .unwrap();

    assert!(store.claim_evidence_jobs(10).unwrap().is_empty());
    let sweeper = ReviewSweeper::new(store.clone(), ScoringConfig::default());
    assert!(sweeper.sweep(Utc::now() + Duration::days(30), 50).unwrap().is_empty());
}
