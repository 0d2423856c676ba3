//! Deadline Tracker & Escalation
//!
//! The sweep selects dispatched actions whose deadline has passed, marks
//! them unanswered, and proposes the next step in the escalation chain.
//! Idempotent end to end: resolution is conditional on `status = sent`,
//! and draft creation is unique per (infringement, action_type), so
//! concurrent or repeated sweeps never double-escalate.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::StoreError;
use crate::external::{events, EventSink};
use crate::store::Store;

use super::rules::EscalationConfig;
use super::types::{EnforcementAction, EscalationProposal};

// ============================================================================
// SWEEP REPORT
// ============================================================================

/// What one sweep pass did
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepReport {
    /// Actions transitioned sent -> no_response by this pass
    pub resolved: Vec<Uuid>,
    /// Next steps proposed for the newly overdue actions
    pub proposals: Vec<EscalationProposal>,
    /// Draft actions created from those proposals (empty when
    /// auto-creation is disabled)
    pub drafts_created: Vec<Uuid>,
}

// ============================================================================
// SWEEPER
// ============================================================================

pub struct DeadlineSweeper {
    store: Arc<dyn Store>,
    sink: Arc<dyn EventSink>,
    config: EscalationConfig,
}

impl DeadlineSweeper {
    pub fn new(store: Arc<dyn Store>, sink: Arc<dyn EventSink>, config: EscalationConfig) -> Self {
        Self { store, sink, config }
    }

    /// Dispatch helper: stamp an action sent with its deadline derived
    /// from the target's expected response window
    pub fn dispatch(&self, action: &EnforcementAction, now: DateTime<Utc>) -> Result<DateTime<Utc>, StoreError> {
        let deadline = now + self.config.response_window(action.action_type);
        self.store.mark_action_sent(action.id, now, deadline)?;
        log::info!(
            "Action {} ({}) dispatched, deadline {}",
            action.id,
            action.action_type,
            deadline
        );
        Ok(deadline)
    }

    /// One sweep pass over all overdue actions
    pub fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, StoreError> {
        let overdue = self.store.list_overdue_sent(now)?;
        let mut report = SweepReport::default();

        for action in overdue {
            // Conditional on `sent`: a concurrent sweep that got here
            // first already owns this action.
            if !self.store.resolve_no_response(action.id, now)? {
                continue;
            }
            report.resolved.push(action.id);
            log::info!(
                "Action {} ({}) got no response from {} by {}",
                action.id,
                action.action_type,
                action.target_entity,
                action.deadline_at.map(|d| d.to_rfc3339()).unwrap_or_default()
            );

            let Some(next_type) = self.config.next_in_chain(action.action_type) else {
                log::debug!("Chain terminates after {}", action.action_type);
                continue;
            };

            let proposal = EscalationProposal {
                infringement_id: action.infringement_id,
                overdue_action_id: action.id,
                from_type: action.action_type,
                proposed_type: next_type,
                escalation_step: action.escalation_step + 1,
                reason: format!(
                    "{} to {} went unanswered for {} days; escalate to {} ({})",
                    action.action_type,
                    action.target_entity,
                    self.config.response_window(action.action_type).num_days(),
                    next_type,
                    next_type.target_label()
                ),
            };

            if self.config.auto_create_drafts {
                let draft = EnforcementAction::draft_at_step(
                    action.infringement_id,
                    next_type,
                    proposal.escalation_step,
                    now,
                );
                // Idempotency guard lives in the store: a second sweep
                // (or a concurrent one) cannot create a duplicate draft.
                if self.store.insert_action_if_absent(&draft)? {
                    report.drafts_created.push(draft.id);
                    self.sink.emit(
                        events::ENFORCEMENT_ESCALATED,
                        serde_json::json!({
                            "infringement_id": action.infringement_id,
                            "from": action.action_type,
                            "to": next_type,
                            "escalation_step": proposal.escalation_step,
                        }),
                    );
                }
            }

            report.proposals.push(proposal);
        }

        if !report.resolved.is_empty() {
            log::info!(
                "Deadline sweep: {} resolved, {} proposal(s), {} draft(s)",
                report.resolved.len(),
                report.proposals.len(),
                report.drafts_created.len()
            );
        }
        Ok(report)
    }
}

// ============================================================================
// TESTS
// ============================================================================
