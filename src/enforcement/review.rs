//! Re-verification Review Sweep
//!
//! Flags infringements whose `next_check_at` has elapsed as candidates
//! for the detection collaborator to re-scan, P0 first. This module only
//! identifies candidates; it never re-scans anything itself.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::StoreError;
use crate::scoring::{next_check_interval, Priority, ScoringConfig};
use crate::store::Store;

// ============================================================================
// CANDIDATE
// ============================================================================

/// One infringement due for re-verification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewCandidate {
    pub infringement_id: Uuid,
    pub product_id: Uuid,
    pub source_url: String,
    pub priority: Priority,
    pub last_seen_at: DateTime<Utc>,
}

// ============================================================================
// SWEEPER
// ============================================================================

pub struct ReviewSweeper {
    store: Arc<dyn Store>,
    scoring: ScoringConfig,
}

impl ReviewSweeper {
    pub fn new(store: Arc<dyn Store>, scoring: ScoringConfig) -> Self {
        Self { store, scoring }
    }

    /// Collect due candidates and push each record's `next_check_at`
    /// forward by its priority interval, so one due record is flagged
    /// once per interval rather than on every pass.
    pub fn sweep(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<ReviewCandidate>, StoreError> {
        let due = self.store.list_due_for_review(now, limit)?;
        let mut candidates = Vec::with_capacity(due.len());

        for record in due {
            let interval = next_check_interval(record.priority, &self.scoring);
            self.store.set_next_check(record.id, now + interval)?;

            candidates.push(ReviewCandidate {
                infringement_id: record.id,
                product_id: record.product_id,
                source_url: record.source_url,
                priority: record.priority,
                last_seen_at: record.last_seen_at,
            });
        }

        if !candidates.is_empty() {
            log::info!("Review sweep flagged {} candidate(s)", candidates.len());
        }
        Ok(candidates)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::types::{InfringementRecord, InfringementStatus};
    use crate::store::MemoryStore;
    use chrono::Duration;

    fn record(status: InfringementStatus, priority: Priority, due: DateTime<Utc>) -> InfringementRecord {
        let now = Utc::now();
        InfringementRecord {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            source_url: "https://x.example.com".to_string(),
            platform: "social".to_string(),
            status,
            priority,
            severity_score: 40,
            match_confidence: 0.6,
            audience_count: 500,
            monetization_detected: false,
            infrastructure: Default::default(),
            raw_matches: vec![],
            first_seen_at: now,
            last_seen_at: now,
            next_check_at: due,
            previous_status: None,
            status_changed_at: None,
            verified_by_user_id: None,
            verified_at: None,
            evidence_snapshot_id: None,
        }
    }

    #[test]
    fn due_records_surface_p0_first_and_are_rescheduled() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();

        let p2 = record(InfringementStatus::Active, Priority::P2, now - Duration::hours(5));
        let p0 = record(InfringementStatus::TakedownSent, Priority::P0, now - Duration::hours(1));
        let pending = record(InfringementStatus::PendingVerification, Priority::P0, now - Duration::hours(1));
        store.insert_infringement(&p2).unwrap();
        store.insert_infringement(&p0).unwrap();
        store.insert_infringement(&pending).unwrap();

        let sweeper = ReviewSweeper::new(store.clone(), ScoringConfig::default());
        let candidates = sweeper.sweep(now, 10).unwrap();

        // Pending records are not re-verification candidates.
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].infringement_id, p0.id);
        assert_eq!(candidates[1].infringement_id, p2.id);

        // Rescheduled by priority: P0 one day out, P2 seven.
        let p0_next = store.get_infringement(p0.id).unwrap().next_check_at;
        let p2_next = store.get_infringement(p2.id).unwrap().next_check_at;
        assert_eq!((p0_next - now).num_days(), 1);
        assert_eq!((p2_next - now).num_days(), 7);

        // Immediately sweeping again flags nothing.
        assert!(sweeper.sweep(now, 10).unwrap().is_empty());
    }
}
