//! Enforcement Module
//!
//! Tracks dispatched takedown notices against their deadlines and walks
//! unanswered ones up the escalation chain. Also runs the review sweep
//! that feeds re-verification candidates back to detection.
//!
//! ## Structure
//! - `types`: EnforcementAction, action type/status enums, proposals
//! - `rules`: Escalation chain + response-time tables (injectable)
//! - `deadlines`: Overdue sweep and escalation
//! - `review`: Re-verification candidate sweep
//! - `scheduler`: Interval loop driving both sweeps

pub mod types;
pub mod rules;
pub mod deadlines;
pub mod review;
pub mod scheduler;

// Re-export main types for convenience
pub use types::{ActionStatus, ActionType, EnforcementAction, EscalationProposal};

pub use rules::EscalationConfig;

pub use deadlines::{DeadlineSweeper, SweepReport};

pub use review::{ReviewCandidate, ReviewSweeper};

pub use scheduler::{start_sweep_loop, SchedulerConfig};
