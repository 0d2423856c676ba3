//! Scoring Module
//!
//! Converts raw detection signals into a severity score (0-100) and a
//! priority tier (P0/P1/P2). This is the first step of the lifecycle:
//! everything downstream (review ordering, re-check cadence) keys off it.
//!
//! ## Structure
//! - `types`: Core types (Priority, ScoreInput, Severity, ScoreBreakdown)
//! - `rules`: Weight tables and injectable ScoringConfig
//! - `scorer`: Scoring logic
//! - `audience`: Free-text audience count normalization
//!
//! ## Usage
//! ```ignore
//! use takedown_core::scoring::{score, ScoreInput, Priority};
//!
//! let severity = score(&input);
//! match severity.priority {
//!     Priority::P0 => println!("act today"),
//!     Priority::P1 => println!("this week"),
//!     Priority::P2 => println!("routine queue"),
//! }
//! ```

pub mod types;
pub mod rules;
pub mod scorer;
pub mod audience;

// Re-export main types for convenience
pub use types::{Priority, ScoreBreakdown, ScoreInput, Severity};

pub use rules::{ScoringConfig, SEVERITY_CAP};

pub use scorer::{next_check_interval, score, score_with_config};

pub use audience::parse_audience_count;
