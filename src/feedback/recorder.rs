//! Feedback Recorder
//!
//! Turns each review outcome into pattern increments keyed by the signals
//! derivable from the record itself: source domain and platform.
//!
//! Best-effort by contract: the state machine calls this after commit and
//! only logs failures.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::StoreError;
use crate::lifecycle::types::{InfringementRecord, ReviewDecision};
use crate::store::Store;

// ============================================================================
// PATTERN TYPES
// ============================================================================

/// Identity of one aggregated pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatternKey {
    /// Pattern kind (source_domain, platform, whitelisted_domain, ...)
    pub pattern_type: String,
    pub pattern_value: String,
    pub product_id: Uuid,
}

impl PatternKey {
    pub fn new(pattern_type: &str, pattern_value: &str, product_id: Uuid) -> Self {
        Self {
            pattern_type: pattern_type.to_string(),
            pattern_value: pattern_value.to_string(),
            product_id,
        }
    }
}

/// How one outcome counts toward a pattern's confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternOutcome {
    /// Human confirmed: occurrences + 1, verified_count + 1
    Verified,
    /// Human rejected: occurrences + 1 only
    Rejected,
    /// Neither confirms nor refutes (whitelist): occurrences + 1 only
    Neutral,
}

/// Aggregated, confidence-weighted signal from accumulated outcomes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningPattern {
    pub pattern_type: String,
    pub pattern_value: String,
    pub product_id: Uuid,
    /// verified_count / occurrences, in [0, 1]
    pub confidence_score: f64,
    pub occurrences: u64,
    pub verified_count: u64,
}

impl LearningPattern {
    pub fn first(key: &PatternKey, outcome: PatternOutcome) -> Self {
        let mut pattern = Self {
            pattern_type: key.pattern_type.clone(),
            pattern_value: key.pattern_value.clone(),
            product_id: key.product_id,
            confidence_score: 0.0,
            occurrences: 0,
            verified_count: 0,
        };
        pattern.apply(outcome);
        pattern
    }

    /// Apply one more outcome to the running aggregate
    pub fn apply(&mut self, outcome: PatternOutcome) {
        self.occurrences += 1;
        if outcome == PatternOutcome::Verified {
            self.verified_count += 1;
        }
        self.confidence_score =
            (self.verified_count as f64 / self.occurrences as f64).clamp(0.0, 1.0);
    }
}

// ============================================================================
// RECORDER
// ============================================================================

pub struct FeedbackRecorder {
    store: Arc<dyn Store>,
}

impl FeedbackRecorder {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Record the outcome of one review decision
    ///
    /// Whitelist is recorded as neutral under a dedicated pattern type so
    /// detection can skip the domain without treating it as a miss.
    pub fn record_outcome(
        &self,
        record: &InfringementRecord,
        decision: ReviewDecision,
    ) -> Result<(), StoreError> {
        let domain = domain_of(&record.source_url);

        match decision {
            ReviewDecision::Verify | ReviewDecision::Reject => {
                let outcome = if decision == ReviewDecision::Verify {
                    PatternOutcome::Verified
                } else {
                    PatternOutcome::Rejected
                };
                if let Some(domain) = &domain {
                    self.store.record_pattern(
                        &PatternKey::new("source_domain", domain, record.product_id),
                        outcome,
                    )?;
                }
                self.store.record_pattern(
                    &PatternKey::new("platform", &record.platform, record.product_id),
                    outcome,
                )?;
            }
            ReviewDecision::Whitelist => {
                if let Some(domain) = &domain {
                    self.store.record_pattern(
                        &PatternKey::new("whitelisted_domain", domain, record.product_id),
                        PatternOutcome::Neutral,
                    )?;
                }
            }
        }

        log::debug!(
            "Recorded {} outcome for infringement {}",
            decision,
            record.id
        );
        Ok(())
    }
}

/// Host part of a URL, lowercased, without credentials or port
fn domain_of(url: &str) -> Option<String> {
    let rest = url.split("://").nth(1).unwrap_or(url);
    let host = rest.split(['/', '?', '#']).next()?;
    let host = host.rsplit('@').next()?;
    let host = host.split(':').next()?;
    if host.is_empty() {
        return None;
    }
    Some(host.to_ascii_lowercase())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_extraction() {
        assert_eq!(domain_of("https://Files.Example.com/a/b?x=1"), Some("files.example.com".to_string()));
        assert_eq!(domain_of("http://user@host.net:8080/x"), Some("host.net".to_string()));
        assert_eq!(domain_of("t.me/channel"), Some("t.me".to_string()));
        assert_eq!(domain_of(""), None);
    }

    #[test]
    fn confidence_tracks_verified_ratio() {
        let key = PatternKey::new("platform", "telegram", Uuid::new_v4());
        let mut pattern = LearningPattern::first(&key, PatternOutcome::Verified);
        assert_eq!(pattern.confidence_score, 1.0);

        pattern.apply(PatternOutcome::Rejected);
        assert_eq!(pattern.occurrences, 2);
        assert_eq!(pattern.verified_count, 1);
        assert!((pattern.confidence_score - 0.5).abs() < f64::EPSILON);

        pattern.apply(PatternOutcome::Neutral);
        assert_eq!(pattern.occurrences, 3);
        assert_eq!(pattern.verified_count, 1);
    }
}
