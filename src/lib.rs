//! Infringement Lifecycle Core
//!
//! Backend library for the content protection platform. Takes detected
//! infringements from severity scoring through verification, evidence
//! preservation, enforcement deadlines and escalation, and feeds review
//! outcomes back into detection as learned patterns.
//!
//! ## Structure
//! - `scoring`: Severity score, priority assignment, re-check intervals
//! - `lifecycle`: Status state machine with append-only audit trail
//! - `evidence`: Canonical hashing, snapshot pipeline, background worker
//! - `enforcement`: Deadline tracking, escalation chain, review sweep
//! - `feedback`: Learned-pattern recorder driven by review decisions
//! - `store`: Persistence trait + in-memory and SQLite backends
//! - `external`: Collaborator traits (capture, notary, comparison, auth)

pub mod errors;
pub mod external;
pub mod scoring;
pub mod lifecycle;
pub mod evidence;
pub mod enforcement;
pub mod feedback;
pub mod store;

pub use errors::{CollaboratorError, StoreError, TransitionError};
pub use lifecycle::{InfringementRecord, InfringementStatus, LifecycleEngine, ReviewDecision};
pub use scoring::{score, Priority, ScoreInput, Severity};
pub use store::{MemoryStore, SqliteStore, Store};
