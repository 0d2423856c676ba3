//! Enforcement Types
//!
//! Enforcement actions (dispatched notices with deadlines) and escalation
//! proposals. No logic here - just data structures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// ACTION TYPE
// ============================================================================

/// What kind of notice an enforcement action is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    DmcaPlatform,
    DmcaHost,
    DmcaCdn,
    GoogleDeindex,
    BingDeindex,
    PaymentComplaint,
    CeaseDesist,
    MarketplaceReport,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::DmcaPlatform => "dmca_platform",
            ActionType::DmcaHost => "dmca_host",
            ActionType::DmcaCdn => "dmca_cdn",
            ActionType::GoogleDeindex => "google_deindex",
            ActionType::BingDeindex => "bing_deindex",
            ActionType::PaymentComplaint => "payment_complaint",
            ActionType::CeaseDesist => "cease_desist",
            ActionType::MarketplaceReport => "marketplace_report",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "dmca_platform" => Some(ActionType::DmcaPlatform),
            "dmca_host" => Some(ActionType::DmcaHost),
            "dmca_cdn" => Some(ActionType::DmcaCdn),
            "google_deindex" => Some(ActionType::GoogleDeindex),
            "bing_deindex" => Some(ActionType::BingDeindex),
            "payment_complaint" => Some(ActionType::PaymentComplaint),
            "cease_desist" => Some(ActionType::CeaseDesist),
            "marketplace_report" => Some(ActionType::MarketplaceReport),
            _ => None,
        }
    }

    /// Generic label of the entity this notice targets
    pub fn target_label(&self) -> &'static str {
        match self {
            ActionType::DmcaPlatform => "hosting platform",
            ActionType::DmcaHost => "hosting provider",
            ActionType::DmcaCdn => "CDN provider",
            ActionType::GoogleDeindex => "Google Search",
            ActionType::BingDeindex => "Bing Search",
            ActionType::PaymentComplaint => "payment processor",
            ActionType::CeaseDesist => "site operator",
            ActionType::MarketplaceReport => "marketplace",
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// ACTION STATUS
// ============================================================================

/// Enforcement action status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Draft,
    Sent,
    Acknowledged,
    Removed,
    NoResponse,
    Failed,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Draft => "draft",
            ActionStatus::Sent => "sent",
            ActionStatus::Acknowledged => "acknowledged",
            ActionStatus::Removed => "removed",
            ActionStatus::NoResponse => "no_response",
            ActionStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(ActionStatus::Draft),
            "sent" => Some(ActionStatus::Sent),
            "acknowledged" => Some(ActionStatus::Acknowledged),
            "removed" => Some(ActionStatus::Removed),
            "no_response" => Some(ActionStatus::NoResponse),
            "failed" => Some(ActionStatus::Failed),
            _ => None,
        }
    }

    /// At most one non-terminal action may exist per
    /// (infringement, action_type).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ActionStatus::Removed | ActionStatus::NoResponse | ActionStatus::Failed
        )
    }
}

// ============================================================================
// ENFORCEMENT ACTION
// ============================================================================

/// A dispatched notice/request to a specific target with its own deadline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnforcementAction {
    pub id: Uuid,
    pub infringement_id: Uuid,
    pub action_type: ActionType,
    /// Position in the escalation chain, starting at 1
    pub escalation_step: u32,
    pub status: ActionStatus,
    pub target_entity: String,
    pub target_contact: Option<String>,
    pub deadline_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl EnforcementAction {
    /// New draft at escalation step 1
    pub fn draft(infringement_id: Uuid, action_type: ActionType, now: DateTime<Utc>) -> Self {
        Self::draft_at_step(infringement_id, action_type, 1, now)
    }

    pub fn draft_at_step(
        infringement_id: Uuid,
        action_type: ActionType,
        escalation_step: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            infringement_id,
            action_type,
            escalation_step,
            status: ActionStatus::Draft,
            target_entity: action_type.target_label().to_string(),
            target_contact: None,
            deadline_at: None,
            sent_at: None,
            resolved_at: None,
            created_at: now,
        }
    }
}

// ============================================================================
// ESCALATION PROPOSAL
// ============================================================================

/// Suggested next step for an unanswered notice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationProposal {
    pub infringement_id: Uuid,
    pub overdue_action_id: Uuid,
    pub from_type: ActionType,
    pub proposed_type: ActionType,
    pub escalation_step: u32,
    pub reason: String,
}
