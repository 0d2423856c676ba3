//! External Collaborators
//!
//! Narrow typed interfaces to the services this core depends on but does
//! not implement: page capture, timestamp notarization, AI content
//! comparison, the notification/CRM event sink, and authorization.
//!
//! Implementations live in the embedding service. Every call is expected
//! to bound its own network time; the evidence pipeline additionally wraps
//! calls in hard timeouts, so a slow collaborator degrades one stage and
//! nothing else.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::CollaboratorError;

// ============================================================================
// PAGE CAPTURE
// ============================================================================

/// Snapshot of a live infringing page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturedPage {
    /// SHA-256 of the raw HTML
    pub html_hash: String,
    /// Extracted visible text
    pub text: String,
    /// Outbound links found on the page
    pub links: Vec<String>,
    /// Public archive URL (e.g. web.archive.org), when archiving succeeded
    pub archive_url: Option<String>,
    pub captured_at: DateTime<Utc>,
}

pub trait PageCaptureProvider: Send + Sync {
    fn capture(&self, url: &str) -> Result<CapturedPage, CollaboratorError>;
}

// ============================================================================
// TIMESTAMP NOTARIZATION
// ============================================================================

/// Notarization proof lifecycle
///
/// Eventually consistent: a `Pending` proof stored on a snapshot may later
/// be confirmed by a process outside this core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProofStatus {
    Pending,
    Confirmed,
    Failed,
}

/// Third-party attestation that a content hash existed at a point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampProof {
    pub status: ProofStatus,
    pub proof: String,
    pub verification_url: Option<String>,
    pub issued_at: DateTime<Utc>,
}

pub trait NotaryProvider: Send + Sync {
    fn notarize(&self, content_hash: &str) -> Result<TimestampProof, CollaboratorError>;
}

// ============================================================================
// AI CONTENT COMPARISON
// ============================================================================

/// One original-vs-infringing match found by the comparison model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonMatch {
    /// Match kind (verbatim, paraphrase, structural, ...)
    pub match_type: String,
    pub original: String,
    pub infringing: String,
    pub confidence: f64,
    pub legal_significance: String,
    pub explanation: String,
}

pub trait ContentComparer: Send + Sync {
    fn compare(
        &self,
        original_text: &str,
        captured_text: &str,
    ) -> Result<Vec<ComparisonMatch>, CollaboratorError>;
}

// ============================================================================
// NOTIFICATION / CRM SINK
// ============================================================================

/// Event names emitted to the notification/CRM sink
pub mod events {
    pub const INFRINGEMENT_VERIFIED: &str = "infringement:verified";
    pub const INFRINGEMENT_REJECTED: &str = "infringement:rejected";
    pub const INFRINGEMENT_WHITELISTED: &str = "infringement:whitelisted";
    pub const EVIDENCE_CAPTURED: &str = "evidence:captured";
    pub const ENFORCEMENT_ESCALATED: &str = "enforcement:escalated";
}

/// Fire-and-forget event sink. Implementations must swallow their own
/// failures; callers never observe them.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &str, payload: serde_json::Value);
}

/// Sink that drops every event. Useful default for tests and batch tools.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&self, event: &str, _payload: serde_json::Value) {
        log::debug!("Event '{}' dropped (null sink)", event);
    }
}

// ============================================================================
// AUTHORIZATION
// ============================================================================

/// Resolves product ownership before any transition proceeds
pub trait Authorizer: Send + Sync {
    fn actor_owns_product(
        &self,
        actor_id: Uuid,
        product_id: Uuid,
    ) -> Result<bool, CollaboratorError>;
}

/// Authorizer that grants everything. For tests and trusted internal jobs.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllAuthorizer;

impl Authorizer for AllowAllAuthorizer {
    fn actor_owns_product(
        &self,
        _actor_id: Uuid,
        _product_id: Uuid,
    ) -> Result<bool, CollaboratorError> {
        Ok(true)
    }
}
