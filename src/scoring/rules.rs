//! Scoring Rules & Weight Tables
//!
//! Constant tables and the injectable `ScoringConfig`. No scoring logic
//! here - just the numbers.

use std::collections::HashMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::types::Priority;

// ============================================================================
// SUB-SCORE WEIGHTS
// ============================================================================

/// Match confidence contributes up to 20 points
pub const CONFIDENCE_WEIGHT: f64 = 20.0;

/// Platform risk contributes up to 15 points
pub const PLATFORM_WEIGHT: f64 = 15.0;

/// Monetized infringements get a flat 30 points
pub const MONETIZATION_POINTS: u32 = 30;

/// Weight applied to platforms absent from the table
pub const DEFAULT_PLATFORM_RISK: f64 = 0.5;

/// Severity scale cap. Sub-score maxima sum to 110; capping is intended.
pub const SEVERITY_CAP: u32 = 100;

// ============================================================================
// PRIORITY RULE THRESHOLDS
// ============================================================================

pub const P0_SCORE_MIN: u32 = 75;
pub const P0_MONETIZED_CONFIDENCE_MIN: f64 = 0.75;
pub const P0_AUDIENCE_MIN: u64 = 50_000;
pub const P0_AUDIENCE_CONFIDENCE_MIN: f64 = 0.60;

pub const P1_SCORE_MIN: u32 = 50;
pub const P1_AUDIENCE_MIN: u64 = 5_000;

// ============================================================================
// DEFAULT TABLES
// ============================================================================

/// Platform risk weights (0.0 - 1.0), keyed by lowercase platform name
static PLATFORM_RISK: Lazy<HashMap<&'static str, f64>> = Lazy::new(|| {
    HashMap::from([
        ("telegram", 0.90),
        ("torrent", 0.85),
        ("cyberlocker", 0.80),
        ("google", 0.75),
        ("discord", 0.70),
        ("forum", 0.65),
        ("social", 0.60),
    ])
});

/// Tier-1: strong, fast enforcement channels. +10 points.
const TIER1_COUNTRIES: &[&str] = &["US", "UK", "GB", "CA", "AU", "NZ"];

/// Tier-2: major EU jurisdictions. +5 points.
const TIER2_COUNTRIES: &[&str] = &[
    "DE", "FR", "NL", "ES", "IT", "SE", "DK", "FI", "BE", "AT", "IE", "PL", "PT",
];

/// Tier-3: other developed jurisdictions. +2 points.
const TIER3_COUNTRIES: &[&str] = &["JP", "KR", "SG", "CH", "NO", "IL", "TW", "HK"];

pub const TIER1_BONUS: u32 = 10;
pub const TIER2_BONUS: u32 = 5;
pub const TIER3_BONUS: u32 = 2;

/// Audience bins: (exclusive upper bound, points). Catch-all handled in config.
const AUDIENCE_BINS: &[(u64, u32)] = &[(100, 5), (500, 10), (2_000, 15), (10_000, 20)];
const AUDIENCE_MAX_POINTS: u32 = 25;

/// Revenue-loss bins in USD: (exclusive upper bound, points).
const REVENUE_BINS: &[(f64, u32)] = &[(100.0, 2), (500.0, 4), (1_000.0, 6), (5_000.0, 8)];
const REVENUE_MAX_POINTS: u32 = 10;

// ============================================================================
// CONFIGURABLE RULES (injected, never a global)
// ============================================================================

/// Scoring configuration
///
/// `Default` mirrors the tables above; tenants can override any part of it
/// and pass their own copy to `score_with_config`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Platform risk weights, lowercase keys
    pub platform_risk: HashMap<String, f64>,
    /// Risk weight for unknown platforms
    pub default_platform_risk: f64,
    pub tier1_countries: Vec<String>,
    pub tier2_countries: Vec<String>,
    pub tier3_countries: Vec<String>,
    /// (exclusive upper bound, points), ascending; audience of 0 scores 0
    pub audience_bins: Vec<(u64, u32)>,
    pub audience_max_points: u32,
    /// (exclusive upper bound, points), ascending; loss of 0 scores 0
    pub revenue_bins: Vec<(f64, u32)>,
    pub revenue_max_points: u32,
    /// Re-check interval per priority, in days
    pub check_interval_days: HashMap<Priority, i64>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            platform_risk: PLATFORM_RISK
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
            default_platform_risk: DEFAULT_PLATFORM_RISK,
            tier1_countries: TIER1_COUNTRIES.iter().map(|s| s.to_string()).collect(),
            tier2_countries: TIER2_COUNTRIES.iter().map(|s| s.to_string()).collect(),
            tier3_countries: TIER3_COUNTRIES.iter().map(|s| s.to_string()).collect(),
            audience_bins: AUDIENCE_BINS.to_vec(),
            audience_max_points: AUDIENCE_MAX_POINTS,
            revenue_bins: REVENUE_BINS.to_vec(),
            revenue_max_points: REVENUE_MAX_POINTS,
            check_interval_days: HashMap::from([
                (Priority::P0, 1),
                (Priority::P1, 3),
                (Priority::P2, 7),
            ]),
        }
    }
}

impl ScoringConfig {
    pub fn platform_weight(&self, platform: &str) -> f64 {
        self.platform_risk
            .get(&platform.to_ascii_lowercase())
            .copied()
            .unwrap_or(self.default_platform_risk)
    }

    pub fn country_bonus(&self, country: Option<&str>) -> u32 {
        let Some(code) = country else { return 0 };
        let code = code.to_ascii_uppercase();
        if self.tier1_countries.iter().any(|c| *c == code) {
            TIER1_BONUS
        } else if self.tier2_countries.iter().any(|c| *c == code) {
            TIER2_BONUS
        } else if self.tier3_countries.iter().any(|c| *c == code) {
            TIER3_BONUS
        } else {
            0
        }
    }
}
