//! Severity Scorer
//!
//! Only scoring logic here - no types, no tables.
//! Input: ScoreInput. Output: Severity (score + priority + breakdown).
//!
//! Pure and deterministic: same input always yields the same output, no
//! shared state, safe for unlimited concurrent invocation.

use chrono::Duration;

use super::rules::{
    ScoringConfig, CONFIDENCE_WEIGHT, MONETIZATION_POINTS, P0_AUDIENCE_CONFIDENCE_MIN,
    P0_AUDIENCE_MIN, P0_MONETIZED_CONFIDENCE_MIN, P0_SCORE_MIN, P1_AUDIENCE_MIN, P1_SCORE_MIN,
    PLATFORM_WEIGHT, SEVERITY_CAP,
};
use super::types::{Priority, ScoreBreakdown, ScoreInput, Severity};

// ============================================================================
// MAIN SCORING FUNCTION
// ============================================================================

/// Score one candidate with the default tables
pub fn score(input: &ScoreInput) -> Severity {
    score_with_config(input, &ScoringConfig::default())
}

/// Score one candidate with injected configuration
pub fn score_with_config(input: &ScoreInput, config: &ScoringConfig) -> Severity {
    let mut reasons = Vec::new();

    let confidence = input.match_confidence.clamp(0.0, 1.0);
    let confidence_points = (confidence * CONFIDENCE_WEIGHT).round() as u32;

    let audience_points = bin_points_u64(input.audience_count, &config.audience_bins, config.audience_max_points);
    if input.audience_count >= P0_AUDIENCE_MIN {
        reasons.push(format!("Large audience: {}", input.audience_count));
    }

    let monetization_points = if input.monetization_detected {
        reasons.push("Monetization detected".to_string());
        MONETIZATION_POINTS
    } else {
        0
    };

    let platform_weight = config.platform_weight(&input.platform);
    let platform_points = (platform_weight * PLATFORM_WEIGHT).round() as u32;
    if platform_weight >= 0.8 {
        reasons.push(format!("High-risk platform: {}", input.platform));
    }

    let revenue_points = bin_points_f64(
        input.estimated_revenue_loss.max(0.0),
        &config.revenue_bins,
        config.revenue_max_points,
    );

    let country_bonus = config.country_bonus(input.country.as_deref());

    let raw_total = confidence_points
        + audience_points
        + monetization_points
        + platform_points
        + revenue_points
        + country_bonus;
    let final_score = raw_total.min(SEVERITY_CAP);

    let priority = assign_priority(final_score, input);
    reasons.push(format!("Severity {}, priority {}", final_score, priority));

    Severity {
        score: final_score,
        priority,
        breakdown: ScoreBreakdown {
            match_confidence: confidence_points,
            audience: audience_points,
            monetization: monetization_points,
            platform_risk: platform_points,
            revenue_impact: revenue_points,
            country_bonus,
            raw_total,
        },
        reasons,
    }
}

// ============================================================================
// PRIORITY RULES (first matching rule wins)
// ============================================================================

fn assign_priority(score: u32, input: &ScoreInput) -> Priority {
    let confidence = input.match_confidence;

    if score >= P0_SCORE_MIN
        || (input.monetization_detected && confidence >= P0_MONETIZED_CONFIDENCE_MIN)
        || (input.audience_count >= P0_AUDIENCE_MIN && confidence >= P0_AUDIENCE_CONFIDENCE_MIN)
    {
        return Priority::P0;
    }

    if score >= P1_SCORE_MIN || input.monetization_detected || input.audience_count >= P1_AUDIENCE_MIN
    {
        return Priority::P1;
    }

    Priority::P2
}

/// Re-check interval for a priority tier, from config: P0 1d, P1 3d, P2 7d
pub fn next_check_interval(priority: Priority, config: &ScoringConfig) -> Duration {
    let days = config.check_interval_days.get(&priority).copied().unwrap_or(7);
    Duration::days(days)
}

// ============================================================================
// BIN HELPERS
// ============================================================================

fn bin_points_u64(value: u64, bins: &[(u64, u32)], max_points: u32) -> u32 {
    if value == 0 {
        return 0;
    }
    for (upper, points) in bins {
        if value < *upper {
            return *points;
        }
    }
    max_points
}

fn bin_points_f64(value: f64, bins: &[(f64, u32)], max_points: u32) -> u32 {
    if value <= 0.0 {
        return 0;
    }
    for (upper, points) in bins {
        if value < *upper {
            return *points;
        }
    }
    max_points
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn input(
        confidence: f64,
        platform: &str,
        audience: u64,
        monetized: bool,
        loss: f64,
        country: Option<&str>,
    ) -> ScoreInput {
        ScoreInput {
            match_confidence: confidence,
            platform: platform.to_string(),
            audience_count: audience,
            monetization_detected: monetized,
            estimated_revenue_loss: loss,
            country: country.map(|c| c.to_string()),
        }
    }

    #[test]
    fn maximal_case_caps_at_100_and_is_p0() {
        let result = score(&input(0.9, "telegram", 60_000, true, 6_000.0, Some("US")));
        // 18 + 25 + 30 + 14 + 10 + 10 = 107, capped
        assert_eq!(result.breakdown.raw_total, 107);
        assert_eq!(result.score, 100);
        assert_eq!(result.priority, Priority::P0);
    }

    #[test]
    fn weak_forum_hit_is_p2() {
        let result = score(&input(0.1, "forum", 50, false, 0.0, None));
        // 2 + 5 + round(0.65 * 15) = 17
        assert_eq!(result.breakdown.match_confidence, 2);
        assert_eq!(result.breakdown.audience, 5);
        assert_eq!(result.breakdown.platform_risk, 10);
        assert_eq!(result.score, 17);
        assert_eq!(result.priority, Priority::P2);
    }

    #[test]
    fn monetization_alone_forces_p1() {
        let result = score(&input(0.2, "forum", 0, true, 0.0, None));
        assert!(result.score < P1_SCORE_MIN);
        assert_eq!(result.priority, Priority::P1);
    }

    #[test]
    fn monetized_high_confidence_forces_p0() {
        let result = score(&input(0.8, "forum", 0, true, 0.0, None));
        assert!(result.score < P0_SCORE_MIN);
        assert_eq!(result.priority, Priority::P0);
    }

    #[test]
    fn huge_audience_with_decent_confidence_forces_p0() {
        let result = score(&input(0.65, "social", 50_000, false, 0.0, None));
        assert!(result.score < P0_SCORE_MIN);
        assert_eq!(result.priority, Priority::P0);
    }

    #[test]
    fn unknown_platform_uses_default_weight() {
        let result = score(&input(0.0, "pastebin-clone", 0, false, 0.0, None));
        // 0.5 * 15 = 7.5 -> 8
        assert_eq!(result.breakdown.platform_risk, 8);
    }

    #[test]
    fn country_tiers() {
        let config = ScoringConfig::default();
        assert_eq!(config.country_bonus(Some("US")), 10);
        assert_eq!(config.country_bonus(Some("de")), 5);
        assert_eq!(config.country_bonus(Some("JP")), 2);
        assert_eq!(config.country_bonus(Some("RU")), 0);
        assert_eq!(config.country_bonus(None), 0);
    }

    #[test]
    fn score_is_monotonic_in_confidence() {
        let mut last = 0;
        for step in 0..=10 {
            let c = f64::from(step) / 10.0;
            let result = score(&input(c, "social", 1_000, false, 200.0, Some("US")));
            assert!(result.score >= last, "score dropped at confidence {}", c);
            last = result.score;
        }
    }

    #[test]
    fn score_is_monotonic_in_audience_and_revenue() {
        let audiences = [0u64, 50, 400, 1_500, 9_000, 20_000];
        let mut last = 0;
        for a in audiences {
            let s = score(&input(0.5, "forum", a, false, 0.0, None)).score;
            assert!(s >= last);
            last = s;
        }
        let losses = [0.0, 50.0, 400.0, 900.0, 4_000.0, 9_000.0];
        last = 0;
        for l in losses {
            let s = score(&input(0.5, "forum", 0, false, l, None)).score;
            assert!(s >= last);
            last = s;
        }
    }

    #[test]
    fn score_always_in_range_and_priority_assigned() {
        for confidence in [0.0, 0.33, 1.0] {
            for audience in [0u64, 99, 100_000] {
                for monetized in [false, true] {
                    let result =
                        score(&input(confidence, "torrent", audience, monetized, 12_345.0, Some("US")));
                    assert!(result.score <= 100);
                }
            }
        }
    }

    #[test]
    fn check_intervals_per_priority() {
        let config = ScoringConfig::default();
        assert_eq!(next_check_interval(Priority::P0, &config).num_days(), 1);
        assert_eq!(next_check_interval(Priority::P1, &config).num_days(), 3);
        assert_eq!(next_check_interval(Priority::P2, &config).num_days(), 7);
    }
}
