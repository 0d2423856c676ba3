//! Lifecycle Types
//!
//! Infringement record, status enum, and the append-only audit row.
//! No logic here - just data structures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scoring::Priority;

// ============================================================================
// STATUS
// ============================================================================

/// Infringement lifecycle status
///
/// `status` is only ever written by the state machine; every change is
/// paired with exactly one `StatusTransition` row in the same transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfringementStatus {
    PendingVerification,
    Active,
    FalsePositive,
    Archived,
    TakedownSent,
    Disputed,
    Removed,
}

impl InfringementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InfringementStatus::PendingVerification => "pending_verification",
            InfringementStatus::Active => "active",
            InfringementStatus::FalsePositive => "false_positive",
            InfringementStatus::Archived => "archived",
            InfringementStatus::TakedownSent => "takedown_sent",
            InfringementStatus::Disputed => "disputed",
            InfringementStatus::Removed => "removed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending_verification" => Some(InfringementStatus::PendingVerification),
            "active" => Some(InfringementStatus::Active),
            "false_positive" => Some(InfringementStatus::FalsePositive),
            "archived" => Some(InfringementStatus::Archived),
            "takedown_sent" => Some(InfringementStatus::TakedownSent),
            "disputed" => Some(InfringementStatus::Disputed),
            "removed" => Some(InfringementStatus::Removed),
            _ => None,
        }
    }

    /// Terminal states accept no further transitions; re-detection creates
    /// a fresh record instead.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InfringementStatus::Removed
                | InfringementStatus::Archived
                | InfringementStatus::FalsePositive
        )
    }
}

impl std::fmt::Display for InfringementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// SUPPORTING RECORDS
// ============================================================================

/// Hosting infrastructure of the infringing page. Carried for evidence and
/// country scoring; otherwise opaque to this core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InfrastructureProfile {
    pub country: Option<String>,
    pub hosting_provider: Option<String>,
    pub registrar: Option<String>,
    pub cdn: Option<String>,
    #[serde(default)]
    pub ip_addresses: Vec<String>,
}

/// One raw evidence match supplied by the detection collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMatch {
    /// Match kind (keyword, excerpt, image_hash, ...)
    pub kind: String,
    /// The matched excerpt from the protected original
    pub original_excerpt: String,
    /// What was found on the infringing page
    pub matched_text: String,
    pub confidence: f64,
}

// ============================================================================
// INFRINGEMENT RECORD
// ============================================================================

/// A detected instance of potential content infringement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfringementRecord {
    pub id: Uuid,
    pub product_id: Uuid,
    pub source_url: String,
    pub platform: String,

    pub status: InfringementStatus,
    pub priority: Priority,
    /// Severity score 0-100 from the scorer
    pub severity_score: u32,
    pub match_confidence: f64,
    pub audience_count: u64,
    pub monetization_detected: bool,

    pub infrastructure: InfrastructureProfile,
    #[serde(default)]
    pub raw_matches: Vec<RawMatch>,

    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub next_check_at: DateTime<Utc>,

    /// Always reflect the most recent committed transition
    pub previous_status: Option<InfringementStatus>,
    pub status_changed_at: Option<DateTime<Utc>>,

    pub verified_by_user_id: Option<Uuid>,
    pub verified_at: Option<DateTime<Utc>>,

    /// Set once by the evidence pipeline; link only
    pub evidence_snapshot_id: Option<Uuid>,
}

// ============================================================================
// AUDIT TRAIL
// ============================================================================

/// Who initiated a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggeredBy {
    System,
    User,
}

impl TriggeredBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggeredBy::System => "system",
            TriggeredBy::User => "user",
        }
    }
}

/// Append-only audit row. Never mutated, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusTransition {
    pub id: Uuid,
    pub infringement_id: Uuid,
    pub from_status: InfringementStatus,
    pub to_status: InfringementStatus,
    pub reason: String,
    pub triggered_by: TriggeredBy,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// REVIEW DECISIONS
// ============================================================================

/// Reviewer decision on a pending infringement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    /// Confirmed infringement: activate and collect evidence
    Verify,
    /// Not an infringement: mark false positive
    Reject,
    /// Authorized or tolerated source: archive and suppress re-detection
    Whitelist,
}

impl ReviewDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewDecision::Verify => "verify",
            ReviewDecision::Reject => "reject",
            ReviewDecision::Whitelist => "whitelist",
        }
    }

    /// Target status for this decision
    pub fn target_status(&self) -> InfringementStatus {
        match self {
            ReviewDecision::Verify => InfringementStatus::Active,
            ReviewDecision::Reject => InfringementStatus::FalsePositive,
            ReviewDecision::Whitelist => InfringementStatus::Archived,
        }
    }
}

impl std::fmt::Display for ReviewDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The human (or system identity) performing a transition. IP and user
/// agent flow into the evidence chain of custody.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: Uuid,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl Actor {
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id, ip: None, user_agent: None }
    }
}

// ============================================================================
// TESTS
// ============================================================================
