//! Evidence Integrity Pipeline
//!
//! Runs once per verified infringement, out-of-band from the verify call.
//! Stages: capture the live page (in parallel with a tracking event),
//! build the canonical document and its SHA-256 content hash, request
//! timestamp notarization, build attestation and chain of custody,
//! persist the snapshot, then patch in the AI comparison.
//!
//! Only the hash and the snapshot persist are load-bearing. Capture,
//! notarization, the tracking event, and AI analysis each degrade
//! gracefully: their failure is logged and the pipeline continues.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tokio::task::spawn_blocking;
use tokio::time::timeout;
use uuid::Uuid;

use crate::errors::{CollaboratorError, StoreError};
use crate::external::{
    events, CapturedPage, ContentComparer, EventSink, NotaryProvider, PageCaptureProvider,
    TimestampProof,
};
use crate::lifecycle::types::InfringementRecord;
use crate::store::Store;

use super::canonical::{canonical_bytes, canonicalize, sha256_hex};
use super::types::{AiEvidenceAnalysis, Attestation, CustodyEvent, EvidenceJob, EvidenceSnapshot};

// ============================================================================
// CONFIG
// ============================================================================

/// Bounded timeouts for every external call
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub capture_timeout: Duration,
    pub notary_timeout: Duration,
    pub compare_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            capture_timeout: Duration::from_secs(20),
            notary_timeout: Duration::from_secs(10),
            compare_timeout: Duration::from_secs(30),
        }
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

pub struct EvidencePipeline {
    store: Arc<dyn Store>,
    capture: Arc<dyn PageCaptureProvider>,
    notary: Arc<dyn NotaryProvider>,
    comparer: Arc<dyn ContentComparer>,
    sink: Arc<dyn EventSink>,
    config: PipelineConfig,
}

impl EvidencePipeline {
    pub fn new(
        store: Arc<dyn Store>,
        capture: Arc<dyn PageCaptureProvider>,
        notary: Arc<dyn NotaryProvider>,
        comparer: Arc<dyn ContentComparer>,
        sink: Arc<dyn EventSink>,
        config: PipelineConfig,
    ) -> Self {
        Self { store, capture, notary, comparer, sink, config }
    }

    /// Build and persist the evidence snapshot for one job
    ///
    /// Idempotent under retries: if a previous attempt already linked a
    /// snapshot, its id is returned instead of a duplicate being written.
    pub async fn run(&self, job: &EvidenceJob) -> Result<Uuid, StoreError> {
        let record = self.store.get_infringement(job.infringement_id)?;

        if let Some(existing) = record.evidence_snapshot_id {
            log::info!("Infringement {} already has snapshot {}", record.id, existing);
            return Ok(existing);
        }

        let page = self.capture_with_tracking(&record).await;

        // Content hash: the integrity anchor for everything downstream.
        let verified_at = record.verified_at.unwrap_or(job.requested_at);
        let canonical = canonicalize(&json!({
            "source_url": record.source_url,
            "infrastructure": record.infrastructure,
            "prior_evidence": record.raw_matches,
            "page_hash": page.as_ref().map(|p| p.html_hash.clone()),
            "text_length": page.as_ref().map(|p| p.text.len()).unwrap_or(0),
            "link_count": page.as_ref().map(|p| p.links.len()).unwrap_or(0),
            "archive_url": page.as_ref().and_then(|p| p.archive_url.clone()),
            "verified_at": verified_at.to_rfc3339(),
        }));
        let canonical_doc = canonical_bytes(&canonical);
        let content_hash = sha256_hex(&canonical_doc);

        let proof = self.notarize(&content_hash).await;

        let signed_at = Utc::now();
        let attestation = Attestation {
            statement: format!(
                "I attest under penalty of perjury that the content at {} was \
                 reviewed and verified as infringing on {}.",
                record.source_url,
                verified_at.to_rfc3339()
            ),
            signature: sha256_hex(
                &[
                    canonical_doc.as_slice(),
                    job.actor.user_id.as_bytes(),
                    signed_at.to_rfc3339().as_bytes(),
                ]
                .concat(),
            ),
            user_id: job.actor.user_id,
            signed_at,
        };

        let chain_of_custody = build_custody_chain(&record, page.as_ref(), job);

        let snapshot = EvidenceSnapshot {
            id: Uuid::new_v4(),
            infringement_id: record.id,
            user_id: job.actor.user_id,
            content_hash,
            page_capture: page.clone(),
            timestamp_proof: proof,
            attestation,
            chain_of_custody,
            ai_analysis: None,
            created_at: signed_at,
        };

        match self.store.insert_snapshot(&snapshot) {
            Ok(()) => {}
            // A retried job raced an earlier attempt past persist; the
            // already-linked snapshot wins.
            Err(StoreError::AlreadyLinked { .. }) => {
                let record = self.store.get_infringement(record.id)?;
                if let Some(existing) = record.evidence_snapshot_id {
                    return Ok(existing);
                }
                return Err(StoreError::Backend {
                    message: format!("infringement {} link state inconsistent", record.id),
                });
            }
            Err(e) => return Err(e),
        }

        log::info!(
            "Evidence snapshot {} persisted for infringement {} (hash {})",
            snapshot.id,
            record.id,
            &snapshot.content_hash[..12]
        );

        self.patch_ai_analysis(&record, page.as_ref(), snapshot.id).await;

        Ok(snapshot.id)
    }

    /// Stage 1 and 2: page capture and the tracking event, concurrently
    async fn capture_with_tracking(&self, record: &InfringementRecord) -> Option<CapturedPage> {
        let capture = self.capture.clone();
        let url = record.source_url.clone();
        let capture_fut = timeout(
            self.config.capture_timeout,
            spawn_blocking(move || capture.capture(&url)),
        );

        let sink = self.sink.clone();
        let payload = json!({
            "infringement_id": record.id,
            "source_url": record.source_url,
        });
        let tracking_fut = spawn_blocking(move || sink.emit(events::EVIDENCE_CAPTURED, payload));

        let (capture_result, _) = tokio::join!(capture_fut, tracking_fut);

        match flatten_call(capture_result, "page-capture", self.config.capture_timeout) {
            Ok(page) => Some(page),
            Err(e) => {
                log::warn!("Page capture failed for {}: {}", record.source_url, e);
                None
            }
        }
    }

    /// Stage 4: notarization. Failure or timeout yields no proof.
    async fn notarize(&self, content_hash: &str) -> Option<TimestampProof> {
        let notary = self.notary.clone();
        let hash = content_hash.to_string();
        let result = timeout(
            self.config.notary_timeout,
            spawn_blocking(move || notary.notarize(&hash)),
        )
        .await;

        match flatten_call(result, "notary", self.config.notary_timeout) {
            Ok(proof) => Some(proof),
            Err(e) => {
                log::warn!("Notarization failed, proceeding without proof: {}", e);
                None
            }
        }
    }

    /// Stage 8: AI comparison, patched additively onto the stored snapshot
    async fn patch_ai_analysis(
        &self,
        record: &InfringementRecord,
        page: Option<&CapturedPage>,
        snapshot_id: Uuid,
    ) {
        let Some(page) = page else { return };
        let original_text: String = record
            .raw_matches
            .iter()
            .map(|m| m.original_excerpt.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        if original_text.is_empty() || page.text.is_empty() {
            return;
        }

        let comparer = self.comparer.clone();
        let captured_text = page.text.clone();
        let result = timeout(
            self.config.compare_timeout,
            spawn_blocking(move || comparer.compare(&original_text, &captured_text)),
        )
        .await;

        match flatten_call(result, "content-comparer", self.config.compare_timeout) {
            Ok(matches) => {
                let analysis = AiEvidenceAnalysis { matches, analyzed_at: Utc::now() };
                if let Err(e) = self.store.patch_snapshot_analysis(snapshot_id, &analysis) {
                    log::warn!("AI analysis patch failed for snapshot {}: {}", snapshot_id, e);
                }
            }
            Err(e) => {
                log::warn!("AI comparison failed for snapshot {}: {}", snapshot_id, e);
            }
        }
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Collapse timeout + join + collaborator layers into one result
fn flatten_call<T>(
    result: Result<
        Result<Result<T, CollaboratorError>, tokio::task::JoinError>,
        tokio::time::error::Elapsed,
    >,
    service: &str,
    limit: Duration,
) -> Result<T, CollaboratorError> {
    match result {
        Ok(Ok(inner)) => inner,
        Ok(Err(join_err)) => Err(CollaboratorError::Unavailable {
            service: service.to_string(),
            message: join_err.to_string(),
        }),
        Err(_) => Err(CollaboratorError::Timeout {
            service: service.to_string(),
            after_ms: limit.as_millis() as u64,
        }),
    }
}

fn build_custody_chain(
    record: &InfringementRecord,
    page: Option<&CapturedPage>,
    job: &EvidenceJob,
) -> Vec<CustodyEvent> {
    let mut chain = vec![CustodyEvent::system("detected", record.first_seen_at)];
    if let Some(page) = page {
        chain.push(CustodyEvent::system("page_captured", page.captured_at));
    }
    chain.push(CustodyEvent::user(
        "user_verified",
        &job.actor,
        record.verified_at.unwrap_or(job.requested_at),
    ));
    chain
}

// ============================================================================
// TESTS
// ============================================================================
