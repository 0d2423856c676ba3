//! Feedback Module
//!
//! Records verify/reject outcomes as confidence-weighted learning
//! patterns. Consumed elsewhere (scoring and search tuning); this core
//! only ever increments.

pub mod recorder;

pub use recorder::{FeedbackRecorder, LearningPattern, PatternKey, PatternOutcome};
