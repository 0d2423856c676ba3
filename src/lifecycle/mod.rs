//! Lifecycle Module
//!
//! Governs infringement status. A detection candidate lands as
//! `pending_verification`; a reviewer's verify/reject/whitelist decision
//! moves it through the state machine, which writes the append-only audit
//! trail and schedules downstream effects.
//!
//! ## Structure
//! - `types`: InfringementRecord, status enum, audit row, decisions
//! - `machine`: The state machine (the only writer of `status`)

pub mod types;
pub mod machine;

// Re-export main types for convenience
pub use types::{
    Actor, InfrastructureProfile, InfringementRecord, InfringementStatus, RawMatch,
    ReviewDecision, StatusTransition, TriggeredBy,
};

pub use machine::{LifecycleEngine, TransitionOutcome};
