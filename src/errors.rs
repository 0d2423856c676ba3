//! Error Taxonomy
//!
//! Only three error classes ever reach a caller: validation, authorization,
//! persistence. Everything downstream of a committed transition (capture,
//! notarization, AI analysis, CRM tracking) is best-effort: logged at the
//! point of failure and swallowed, never surfaced, never able to reverse
//! a committed write.

use serde::{Deserialize, Serialize};

// ============================================================================
// STORE ERRORS
// ============================================================================

/// Persistence collaborator failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StoreError {
    /// Entity not found
    NotFound { entity: String, id: String },
    /// Conditional update lost: the record's status changed under us
    Conflict { expected: String, actual: String },
    /// Insert rejected: a row with this id already exists
    Duplicate { entity: String, id: String },
    /// A set-once field was already set
    AlreadyLinked { entity: String, id: String },
    /// Backend failure (SQL error, poisoned state, ...)
    Backend { message: String },
    /// Row could not be (de)serialized
    Serialization { message: String },
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound { entity, id } => write!(f, "{} {} not found", entity, id),
            StoreError::Conflict { expected, actual } => {
                write!(f, "Conditional update lost: expected status '{}', found '{}'", expected, actual)
            }
            StoreError::Duplicate { entity, id } => {
                write!(f, "{} {} already exists", entity, id)
            }
            StoreError::AlreadyLinked { entity, id } => {
                write!(f, "{} {} is already linked", entity, id)
            }
            StoreError::Backend { message } => write!(f, "Store backend error: {}", message),
            StoreError::Serialization { message } => write!(f, "Row serialization error: {}", message),
        }
    }
}

impl std::error::Error for StoreError {}

// ============================================================================
// TRANSITION ERRORS
// ============================================================================

/// Error returned by `LifecycleEngine::transition`
///
/// Ordering matters to callers: validation and authorization fail before
/// any write; persistence failure aborts with no partial state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TransitionError {
    /// Malformed action or missing required field; rejected before any write
    Validation { reason: String },
    /// Actor does not own the linked product; rejected before any write
    Authorization { actor_id: String, reason: String },
    /// The transactional status/audit write failed; nothing was committed
    Persistence(StoreError),
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransitionError::Validation { reason } => write!(f, "Invalid transition: {}", reason),
            TransitionError::Authorization { actor_id, reason } => {
                write!(f, "Actor {} not authorized: {}", actor_id, reason)
            }
            TransitionError::Persistence(e) => write!(f, "Transition not committed: {}", e),
        }
    }
}

impl std::error::Error for TransitionError {}

impl From<StoreError> for TransitionError {
    fn from(e: StoreError) -> Self {
        TransitionError::Persistence(e)
    }
}

// ============================================================================
// COLLABORATOR ERRORS
// ============================================================================

/// External collaborator failure (page capture, notary, AI compare, authz)
///
/// Inside the evidence pipeline these are always best-effort. Only the
/// authorizer's failures become caller-visible, as `Authorization`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CollaboratorError {
    /// Call exceeded its bounded timeout
    Timeout { service: String, after_ms: u64 },
    /// Service reachable but refused the request
    Rejected { service: String, message: String },
    /// Service unreachable or internal failure
    Unavailable { service: String, message: String },
}

impl CollaboratorError {
    pub fn service(&self) -> &str {
        match self {
            CollaboratorError::Timeout { service, .. } => service,
            CollaboratorError::Rejected { service, .. } => service,
            CollaboratorError::Unavailable { service, .. } => service,
        }
    }
}

impl std::fmt::Display for CollaboratorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollaboratorError::Timeout { service, after_ms } => {
                write!(f, "{} timed out after {}ms", service, after_ms)
            }
            CollaboratorError::Rejected { service, message } => {
                write!(f, "{} rejected request: {}", service, message)
            }
            CollaboratorError::Unavailable { service, message } => {
                write!(f, "{} unavailable: {}", service, message)
            }
        }
    }
}

impl std::error::Error for CollaboratorError {}

// ============================================================================
// TESTS
// ============================================================================
