//! Evidence Module
//!
//! Builds the tamper-evident evidence snapshot after a human verifies an
//! infringement: canonical hashing, timestamp notarization, attestation,
//! and chain of custody, all driven by an outbox worker decoupled from
//! the verify call.
//!
//! ## Structure
//! - `types`: EvidenceSnapshot and its parts, the outbox job row
//! - `canonical`: Field-order-stable serialization + SHA-256
//! - `pipeline`: The staged snapshot builder
//! - `worker`: Outbox drain loop

pub mod types;
pub mod canonical;
pub mod pipeline;
pub mod worker;

// Re-export main types for convenience
pub use types::{
    AiEvidenceAnalysis, Attestation, CustodyEvent, EvidenceJob, EvidenceSnapshot,
};

pub use canonical::{canonical_bytes, canonicalize, hash_canonical, sha256_hex};

pub use pipeline::{EvidencePipeline, PipelineConfig};

pub use worker::{EvidenceWorker, WorkerConfig};
