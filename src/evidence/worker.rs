//! Evidence Worker
//!
//! Drains the evidence outbox. Jobs are written transactionally with the
//! verify transition, so every verified infringement gets its snapshot
//! at least once, even across process restarts. Jobs for different
//! infringements run in parallel; each job's stages are sequential.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::store::Store;

use super::pipeline::EvidencePipeline;

// ============================================================================
// CONFIG
// ============================================================================

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub poll_interval: Duration,
    pub batch_size: usize,
    /// Attempts before a job is marked failed for good
    pub max_attempts: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            batch_size: 8,
            max_attempts: 3,
        }
    }
}

// ============================================================================
// WORKER
// ============================================================================

pub struct EvidenceWorker {
    store: Arc<dyn Store>,
    pipeline: Arc<EvidencePipeline>,
    config: WorkerConfig,
}

impl EvidenceWorker {
    pub fn new(store: Arc<dyn Store>, pipeline: Arc<EvidencePipeline>, config: WorkerConfig) -> Self {
        Self { store, pipeline, config }
    }

    /// Spawn the drain loop. Runs until the handle is aborted.
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            log::info!(
                "Evidence worker started (poll {:?}, batch {})",
                self.config.poll_interval,
                self.config.batch_size
            );
            loop {
                match self.drain_once().await {
                    Ok(0) => tokio::time::sleep(self.config.poll_interval).await,
                    Ok(n) => log::debug!("Evidence worker processed {} job(s)", n),
                    Err(e) => {
                        log::error!("Evidence worker claim failed: {}", e);
                        tokio::time::sleep(self.config.poll_interval).await;
                    }
                }
            }
        })
    }

    /// Claim and process one batch. Returns the number of claimed jobs.
    pub async fn drain_once(&self) -> Result<usize, crate::errors::StoreError> {
        let jobs = self.store.claim_evidence_jobs(self.config.batch_size)?;
        let claimed = jobs.len();

        let mut handles = Vec::with_capacity(claimed);
        for job in jobs {
            let pipeline = self.pipeline.clone();
            let store = self.store.clone();
            let max_attempts = self.config.max_attempts;
            handles.push(tokio::spawn(async move {
                match pipeline.run(&job).await {
                    Ok(snapshot_id) => {
                        log::debug!("Job {} produced snapshot {}", job.id, snapshot_id);
                        if let Err(e) = store.complete_evidence_job(job.id) {
                            log::error!("Completed job {} could not be marked done: {}", job.id, e);
                        }
                    }
                    Err(e) => {
                        let retry = job.attempts < max_attempts;
                        log::warn!(
                            "Evidence job {} failed (attempt {}/{}, retry={}): {}",
                            job.id,
                            job.attempts,
                            max_attempts,
                            retry,
                            e
                        );
                        if let Err(e) = store.fail_evidence_job(job.id, &e.to_string(), retry) {
                            log::error!("Failed job {} could not be recorded: {}", job.id, e);
                        }
                    }
                }
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }
        Ok(claimed)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CollaboratorError;
    use crate::evidence::pipeline::PipelineConfig;
    use crate::external::{
        AllowAllAuthorizer, CapturedPage, ComparisonMatch, ContentComparer, NotaryProvider,
        NullEventSink, PageCaptureProvider, TimestampProof,
    };
    use crate::lifecycle::types::{Actor, ReviewDecision};
    use crate::lifecycle::LifecycleEngine;
    use crate::scoring::Priority;
    use crate::store::MemoryStore;
    use chrono::Utc;
    use uuid::Uuid;

    struct Collaborators;
    impl PageCaptureProvider for Collaborators {
        fn capture(&self, _: &str) -> Result<CapturedPage, CollaboratorError> {
            Ok(CapturedPage {
                html_hash: "cafe".to_string(),
                text: "text".to_string(),
                links: vec![],
                archive_url: None,
                captured_at: Utc::now(),
            })
        }
    }
    impl NotaryProvider for Collaborators {
        fn notarize(&self, _: &str) -> Result<TimestampProof, CollaboratorError> {
            Err(CollaboratorError::Unavailable {
                service: "notary".to_string(),
                message: "down".to_string(),
            })
        }
    }
    impl ContentComparer for Collaborators {
        fn compare(&self, _: &str, _: &str) -> Result<Vec<ComparisonMatch>, CollaboratorError> {
            Ok(vec![])
        }
    }

    fn seed_pending(store: &MemoryStore) -> crate::lifecycle::InfringementRecord {
        let now = Utc::now();
        let record = crate::lifecycle::InfringementRecord {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            source_url: "https://d.example.com/x".to_string(),
            platform: "discord".to_string(),
            status: crate::lifecycle::InfringementStatus::PendingVerification,
            priority: Priority::P1,
            severity_score: 50,
            match_confidence: 0.8,
            audience_count: 100,
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

    #[tokio::test]
    async fn verify_then_drain_builds_the_snapshot() {
        let store = Arc::new(MemoryStore::new());
        let record = seed_pending(&store);

        let engine = LifecycleEngine::new(
            store.clone(),
            Arc::new(AllowAllAuthorizer),
            Arc::new(NullEventSink),
        );
        engine
            .transition(record.id, ReviewDecision::Verify, &Actor::new(Uuid::new_v4()))
            .unwrap();

        let pipeline = Arc::new(EvidencePipeline::new(
            store.clone(),
            Arc::new(Collaborators),
            Arc::new(Collaborators),
            Arc::new(Collaborators),
            Arc::new(NullEventSink),
            PipelineConfig::default(),
        ));
        let worker = EvidenceWorker::new(store.clone(), pipeline, WorkerConfig::default());

        assert_eq!(worker.drain_once().await.unwrap(), 1);
        // A second drain finds nothing left.
        assert_eq!(worker.drain_once().await.unwrap(), 0);

        let loaded = store.get_infringement(record.id).unwrap();
        let snapshot_id = loaded.evidence_snapshot_id.expect("snapshot linked");
        let snapshot = store.get_snapshot(snapshot_id).unwrap();
        // Notary was down: proof is null, snapshot still valid.
        assert!(snapshot.timestamp_proof.is_none());
    }
}
