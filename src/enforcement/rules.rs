//! Escalation Rules
//!
//! The escalation chain and per-target response-time table. No sweep
//! logic here - just the tables and the injectable config.

use std::collections::HashMap;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::types::ActionType;

// ============================================================================
// ESCALATION CHAIN
// ============================================================================

/// Fixed, acyclic chain: each entry is (overdue type, next type to try).
/// Types absent from the table terminate the chain.
const ESCALATION_CHAIN: &[(ActionType, ActionType)] = &[
    (ActionType::DmcaPlatform, ActionType::DmcaHost),
    (ActionType::DmcaHost, ActionType::DmcaCdn),
    (ActionType::DmcaCdn, ActionType::GoogleDeindex),
    (ActionType::GoogleDeindex, ActionType::PaymentComplaint),
    (ActionType::CeaseDesist, ActionType::DmcaPlatform),
];

/// Expected response time per target, in days, used to derive
/// `deadline_at` when an action is dispatched
const RESPONSE_DAYS: &[(ActionType, i64)] = &[
    (ActionType::DmcaPlatform, 14),
    (ActionType::DmcaHost, 10),
    (ActionType::DmcaCdn, 7),
    (ActionType::GoogleDeindex, 14),
    (ActionType::BingDeindex, 14),
    (ActionType::PaymentComplaint, 21),
    (ActionType::CeaseDesist, 14),
    (ActionType::MarketplaceReport, 10),
];

const DEFAULT_RESPONSE_DAYS: i64 = 14;

// ============================================================================
// CONFIG (injected, never a global)
// ============================================================================

/// Escalation configuration
///
/// `Default` mirrors the tables above; per-tenant overrides pass their
/// own copy to the sweepers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationConfig {
    pub chain: HashMap<ActionType, ActionType>,
    pub response_days: HashMap<ActionType, i64>,
    pub default_response_days: i64,
    /// When set, the deadline sweep creates the proposed draft itself
    /// instead of only proposing it
    pub auto_create_drafts: bool,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            chain: ESCALATION_CHAIN.iter().copied().collect(),
            response_days: RESPONSE_DAYS.iter().copied().collect(),
            default_response_days: DEFAULT_RESPONSE_DAYS,
            auto_create_drafts: true,
        }
    }
}

impl EscalationConfig {
    /// Next action type in the chain, if any
    pub fn next_in_chain(&self, action_type: ActionType) -> Option<ActionType> {
        self.chain.get(&action_type).copied()
    }

    /// Deadline offset for a freshly dispatched action
    pub fn response_window(&self, action_type: ActionType) -> Duration {
        let days = self
            .response_days
            .get(&action_type)
            .copied()
            .unwrap_or(self.default_response_days);
        Duration::days(days)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_from_dmca_platform_ends_at_payment_complaint() {
        let config = EscalationConfig::default();
        let mut current = ActionType::DmcaPlatform;
        let mut path = vec![current];
        while let Some(next) = config.next_in_chain(current) {
            path.push(next);
            current = next;
            assert!(path.len() <= 10, "chain must be acyclic");
        }
        assert_eq!(
            path,
            vec![
                ActionType::DmcaPlatform,
                ActionType::DmcaHost,
                ActionType::DmcaCdn,
                ActionType::GoogleDeindex,
                ActionType::PaymentComplaint,
            ]
        );
    }

    #[test]
    fn cease_desist_feeds_back_into_the_dmca_chain() {
        let config = EscalationConfig::default();
        assert_eq!(config.next_in_chain(ActionType::CeaseDesist), Some(ActionType::DmcaPlatform));
    }

    #[test]
    fn unmapped_types_terminate() {
        let config = EscalationConfig::default();
        assert_eq!(config.next_in_chain(ActionType::PaymentComplaint), None);
        assert_eq!(config.next_in_chain(ActionType::BingDeindex), None);
        assert_eq!(config.next_in_chain(ActionType::MarketplaceReport), None);
    }

    #[test]
    fn response_windows() {
        let config = EscalationConfig::default();
        assert_eq!(config.response_window(ActionType::DmcaCdn).num_days(), 7);
        assert_eq!(config.response_window(ActionType::PaymentComplaint).num_days(), 21);
    }
}
