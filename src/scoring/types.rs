//! Scoring Types
//!
//! Core types for severity scoring. No logic here - just data structures.

use serde::{Deserialize, Serialize};

// ============================================================================
// PRIORITY TIER
// ============================================================================

/// Priority tier derived from severity score plus override rules
///
/// Ordering: P0 sorts first (highest priority).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    P0,
    P1,
    P2,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::P0 => "P0",
            Priority::P1 => "P1",
            Priority::P2 => "P2",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "P0" => Some(Priority::P0),
            "P1" => Some(Priority::P1),
            "P2" => Some(Priority::P2),
            _ => None,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// SCORE INPUT
// ============================================================================

/// Raw detection signals, validated at the ingestion boundary
///
/// The detection collaborator supplies these; everything downstream works
/// on typed fields, never on loose JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreInput {
    /// Match confidence from detection (0.0 - 1.0)
    pub match_confidence: f64,
    /// Platform identifier, lowercase (telegram, torrent, forum, ...)
    pub platform: String,
    /// Normalized audience count (see `parse_audience_count`)
    pub audience_count: u64,
    /// Whether the infringing page monetizes the content
    pub monetization_detected: bool,
    /// Estimated revenue loss in USD
    pub estimated_revenue_loss: f64,
    /// ISO country code of the hosting infrastructure, if known
    pub country: Option<String>,
}

impl Default for ScoreInput {
    fn default() -> Self {
        Self {
            match_confidence: 0.0,
            platform: "unknown".to_string(),
            audience_count: 0,
            monetization_detected: false,
            estimated_revenue_loss: 0.0,
            country: None,
        }
    }
}

// ============================================================================
// SCORE OUTPUT
// ============================================================================

/// Per-component contributions, summed then capped at 100
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub match_confidence: u32,
    pub audience: u32,
    pub monetization: u32,
    pub platform_risk: u32,
    pub revenue_impact: u32,
    pub country_bonus: u32,
    /// Sum before the 100 cap
    pub raw_total: u32,
}

/// Result of scoring one candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Severity {
    /// Capped severity score (0 - 100)
    pub score: u32,
    pub priority: Priority,
    pub breakdown: ScoreBreakdown,
    /// Human-readable explanation of what drove the score
    pub reasons: Vec<String>,
}
