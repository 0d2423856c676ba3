//! Evidence Types
//!
//! The immutable evidence snapshot and its parts, plus the outbox job row
//! that schedules snapshot construction after a verify.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::external::{CapturedPage, ComparisonMatch, TimestampProof};
use crate::lifecycle::types::Actor;

// ============================================================================
// CHAIN OF CUSTODY
// ============================================================================

/// One custody event: who touched the evidence, when, from where
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustodyEvent {
    /// What happened (detected, page_captured, user_verified, ...)
    pub action: String,
    /// Actor identity; "system" for automated steps
    pub performed_by: String,
    pub performed_at: DateTime<Utc>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl CustodyEvent {
    pub fn system(action: &str, at: DateTime<Utc>) -> Self {
        Self {
            action: action.to_string(),
            performed_by: "system".to_string(),
            performed_at: at,
            ip: None,
            user_agent: None,
        }
    }

    pub fn user(action: &str, actor: &Actor, at: DateTime<Utc>) -> Self {
        Self {
            action: action.to_string(),
            performed_by: actor.user_id.to_string(),
            performed_at: at,
            ip: actor.ip.clone(),
            user_agent: actor.user_agent.clone(),
        }
    }
}

// ============================================================================
// ATTESTATION
// ============================================================================

/// Sworn statement plus a second hash binding evidence, actor, and time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attestation {
    pub statement: String,
    /// SHA-256 over (canonical evidence + user id + timestamp)
    pub signature: String,
    pub user_id: Uuid,
    pub signed_at: DateTime<Utc>,
}

// ============================================================================
// AI ANALYSIS (additive patch)
// ============================================================================

/// Original-vs-infringing comparison result, patched onto an already
/// persisted snapshot. Its failure never invalidates the snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiEvidenceAnalysis {
    pub matches: Vec<ComparisonMatch>,
    pub analyzed_at: DateTime<Utc>,
}

// ============================================================================
// EVIDENCE SNAPSHOT
// ============================================================================

/// Immutable, hashed, optionally notarized capture of infringing content
/// at verification time
///
/// Immutable after creation, with two sanctioned exceptions: the additive
/// AI-analysis patch, and a notarization proof moving pending -> confirmed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceSnapshot {
    pub id: Uuid,
    pub infringement_id: Uuid,
    /// The verifying user
    pub user_id: Uuid,
    /// SHA-256 over the canonical, field-order-stable serialization.
    /// Recomputable by a third party from the same inputs.
    pub content_hash: String,
    pub page_capture: Option<CapturedPage>,
    pub timestamp_proof: Option<TimestampProof>,
    pub attestation: Attestation,
    pub chain_of_custody: Vec<CustodyEvent>,
    pub ai_analysis: Option<AiEvidenceAnalysis>,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// OUTBOX JOB
// ============================================================================

/// Outbox row written in the same transaction as a verify transition.
/// The evidence worker drains these; at-least-once execution across
/// process restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceJob {
    pub id: Uuid,
    pub infringement_id: Uuid,
    pub actor: Actor,
    pub requested_at: DateTime<Utc>,
    pub attempts: u32,
}

impl EvidenceJob {
    pub fn new(infringement_id: Uuid, actor: Actor, requested_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            infringement_id,
            actor,
            requested_at,
            attempts: 0,
        }
    }
}
